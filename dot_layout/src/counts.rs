use log::debug;

use crate::config::*;

/// Apportions `sample_size` respondents over the responses, by largest remainder.
///
/// Every response first receives `floor(proportion * sample_size)`. The respondents still
/// missing are then given, one each, to the responses with the largest fractional remainders.
/// Ties go to the response that comes first. The input is not modified.
///
/// ```
/// use dot_layout::{add_counts, Response};
///
/// let responses: Vec<Response> = [0.5, 0.3, 0.2]
///     .iter()
///     .map(|p| Response { response: vec![], proportion: *p })
///     .collect();
/// let counts: Vec<u64> = add_counts(&responses, 10)?.iter().map(|r| r.count).collect();
/// assert_eq!(counts, vec![5, 3, 2]);
/// # Ok::<(), dot_layout::LayoutError>(())
/// ```
pub fn add_counts(
    responses: &[Response],
    sample_size: u64,
) -> Result<Vec<ResponseWithCount>, LayoutError> {
    for (index, r) in responses.iter().enumerate() {
        if !r.proportion.is_finite() || r.proportion < 0.0 {
            return Err(LayoutError::InvalidProportion {
                index,
                value: r.proportion,
            });
        }
    }
    if responses.is_empty() && sample_size > 0 {
        return Err(LayoutError::EmptyResponses { sample_size });
    }

    let float_counts: Vec<f64> = responses
        .iter()
        .map(|r| r.proportion * sample_size as f64)
        .collect();
    let mut counts: Vec<u64> = float_counts.iter().map(|fc| fc.floor() as u64).collect();

    let assigned: u64 = counts.iter().sum();
    if assigned > sample_size {
        return Err(LayoutError::ProportionSum {
            sum: responses.iter().map(|r| r.proportion).sum(),
        });
    }
    let missing = (sample_size - assigned) as usize;
    // Each response may only get one respondent above its floor.
    if missing > responses.len() {
        return Err(LayoutError::ProportionSum {
            sum: responses.iter().map(|r| r.proportion).sum(),
        });
    }

    // Stable sort: on equal remainders, the first response wins.
    let mut by_remainder: Vec<usize> = (0..responses.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let rem_a = float_counts[a] - counts[a] as f64;
        let rem_b = float_counts[b] - counts[b] as f64;
        rem_b.total_cmp(&rem_a)
    });
    for &idx in by_remainder.iter().take(missing) {
        counts[idx] += 1;
    }
    debug!(
        "add_counts: sample_size: {} floors: {} counts: {:?}",
        sample_size, assigned, counts
    );

    Ok(responses
        .iter()
        .zip(counts)
        .map(|(r, count)| ResponseWithCount {
            response: r.response.clone(),
            proportion: r.proportion,
            count,
        })
        .collect())
}
