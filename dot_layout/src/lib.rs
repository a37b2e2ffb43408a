mod config;
use log::{debug, info};
use rand::Rng;

pub mod builder;
mod counts;
pub mod manual;
mod packing;
mod segments;
mod seed;

pub use crate::config::*;
pub use crate::counts::add_counts;
pub use crate::packing::point_positions;
pub use crate::segments::{add_segments, segment_group, split_frame, SegmentGroup, SplitKind};
pub use crate::seed::{unit_rng, unit_seed};

// **** Checks ****

fn check_grouping(responses: &[Response]) -> Result<(), LayoutError> {
    for (index, r) in responses.iter().enumerate() {
        if !(r.proportion.is_finite() && (0.0..=1.0).contains(&r.proportion)) {
            return Err(LayoutError::InvalidProportion {
                index,
                value: r.proportion,
            });
        }
    }
    // An empty grouping is only acceptable for an empty sample, which add_counts checks.
    if responses.is_empty() {
        return Ok(());
    }
    let sum: f64 = responses.iter().map(|r| r.proportion).sum();
    if (sum - 1.0).abs() > PROPORTION_TOLERANCE {
        return Err(LayoutError::ProportionSum { sum });
    }
    Ok(())
}

/// Checks that both response groupings of a split hold proportions in `[0, 1]` summing to one.
pub fn check_split(split: &Split) -> Result<(), LayoutError> {
    if let Some(r) = &split.responses {
        check_grouping(&r.expanded)?;
        check_grouping(&r.collapsed)?;
    }
    Ok(())
}

/// The number of respondents represented by a split.
///
/// A split that is not broken out along a dimension holds the respondents of every group of
/// that dimension.
pub fn split_sample_size(
    split: &Split,
    sample_size: u64,
    num_waves: usize,
    num_parties: usize,
) -> u64 {
    let kind = SplitKind::of(split.wave.as_ref(), split.party.as_ref());
    sample_size * kind.aggregated_cells(num_waves, num_parties) as u64
}

fn split_with_counts(split: &Split, sample_size: u64) -> Result<SplitWithCounts, LayoutError> {
    let responses = match &split.responses {
        None => None,
        Some(r) => Some(SplitResponses {
            expanded: add_counts(&r.expanded, sample_size)?,
            collapsed: add_counts(&r.collapsed, sample_size)?,
        }),
    };
    Ok(SplitOf {
        wave: split.wave.clone(),
        party: split.party.clone(),
        responses,
    })
}

/// Computes the coordinates of every respondent for one characteristic at one breakpoint.
///
/// Arguments:
/// * `splits` all the splits of the characteristic, with their proportions
/// * `waves` the raw values of the waves present for the characteristic. Their number sets the
///   number of wave bands.
/// * `num_parties` the number of party groups, which sets the number of party columns
/// * `layout` the breakpoint configuration
/// * `sample_size` the number of respondents in one (wave, party) cell
/// * `rng` the random source for the placement of the dots
///
/// Every split gets its counts by apportionment, then its segments. The unsplit positions hold
/// all the respondents of the characteristic, packed over the whole canvas.
pub fn build_coordinates<R: Rng + ?Sized>(
    splits: &[Split],
    waves: &[i64],
    num_parties: usize,
    layout: &Layout,
    sample_size: u64,
    rng: &mut R,
) -> Result<CoordinateData, LayoutError> {
    info!(
        "build_coordinates: breakpoint: {} splits: {} waves: {:?} parties: {} sample size: {}",
        layout.breakpoint,
        splits.len(),
        waves,
        num_parties,
        sample_size
    );
    layout.validate()?;
    let num_waves = waves.len();
    // Rejects an empty set of waves or parties.
    split_frame(SplitKind::Aggregate, layout, num_waves, num_parties)?;
    let canvas = Rect::new(0.0, 0.0, layout.viz_width, layout.canvas_height(num_waves));

    let mut res_splits: Vec<SplitWithSegments> = Vec::with_capacity(splits.len());
    for split in splits.iter() {
        check_split(split)?;
        let split_size = split_sample_size(split, sample_size, num_waves, num_parties);
        let with_counts = split_with_counts(split, split_size)?;
        debug!(
            "build_coordinates: split wave: {:?} party: {:?} sample size: {}",
            split.wave.as_ref().map(|w| w.index),
            split.party.as_ref().map(|p| p.index),
            split_size
        );
        res_splits.push(add_segments(
            &with_counts,
            layout,
            num_waves,
            num_parties,
            rng,
        )?);
    }

    let total = sample_size * (num_waves * num_parties) as u64;
    let unsplit_positions =
        point_positions(&canvas, total as usize, layout.point_radius, rng)?;

    let res = CoordinateData {
        splits: res_splits,
        unsplit_positions,
        waves: waves.to_vec(),
    };
    info!(
        "build_coordinates: breakpoint: {}: {} splits, {} respondents, {} overlapping packings",
        layout.breakpoint,
        res.splits.len(),
        total,
        res.overflow_count()
    );
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn layout() -> Layout {
        Layout {
            breakpoint: "small".to_string(),
            screen_width_range: (0.0, 600.0),
            viz_width: 320.0,
            wave_height: 200.0,
            label_height: 20.0,
            response_gap: 4.0,
            party_gap: 8.0,
            point_radius: 1.5,
        }
    }

    fn responses(proportions: &[f64]) -> Vec<Response> {
        proportions
            .iter()
            .enumerate()
            .map(|(idx, p)| Response {
                response: vec![format!("r{}", idx)],
                proportion: *p,
            })
            .collect()
    }

    fn split(wave: Option<usize>, party: Option<usize>) -> Split {
        SplitOf {
            wave: wave.map(|index| Wave {
                value: (format!("W{}", index), vec![index as i64]),
                index,
            }),
            party: party.map(|index| Party {
                value: (format!("P{}", index), vec![format!("{}", index)]),
                index,
            }),
            responses: Some(SplitResponses {
                expanded: responses(&[0.2, 0.3, 0.4, 0.1]),
                collapsed: responses(&[0.5, 0.5]),
            }),
        }
    }

    // Every combination of 2 waves and 3 parties, with the marginals.
    fn all_splits() -> Vec<Split> {
        let mut res = vec![split(None, None)];
        for w in 0..2 {
            res.push(split(Some(w), None));
        }
        for p in 0..3 {
            res.push(split(None, Some(p)));
        }
        for w in 0..2 {
            for p in 0..3 {
                res.push(split(Some(w), Some(p)));
            }
        }
        res
    }

    #[test]
    fn counts_scale_with_aggregation() {
        init();
        let mut rng = StdRng::seed_from_u64(0);
        let res = build_coordinates(&all_splits(), &[3, 4], 3, &layout(), 20, &mut rng).unwrap();
        assert_eq!(res.waves, vec![3, 4]);
        assert_eq!(res.splits.len(), 12);
        for s in res.splits.iter() {
            let expected = match (&s.wave, &s.party) {
                (None, None) => 120,
                (Some(_), None) => 60,
                (None, Some(_)) => 40,
                (Some(_), Some(_)) => 20,
            };
            let r = s.responses.as_ref().unwrap();
            assert_eq!(r.expanded.iter().map(|x| x.count).sum::<u64>(), expected);
            assert_eq!(r.collapsed.iter().map(|x| x.count).sum::<u64>(), expected);
            for x in r.expanded.iter().chain(r.collapsed.iter()) {
                assert_eq!(x.segment.point_positions.len(), x.count as usize);
            }
        }
        assert_eq!(res.unsplit_positions.data.len(), 120);
        assert!(!res.unsplit_positions.error);
        // The unsplit dots stay on the canvas.
        for p in res.unsplit_positions.data.iter() {
            assert!(p.cy - 1.5 >= -1e-9 && p.cy + 1.5 <= layout().canvas_height(2) + 1e-9);
            assert!(p.cx - 1.5 >= -1e-9 && p.cx + 1.5 <= layout().viz_width + 1e-9);
        }
    }

    #[test]
    fn unsplit_dots_use_the_whole_canvas() {
        // A 6x9 canvas holds a 2x3 grid of dots; without the top label strip it
        // would only hold 2x2.
        let layout = Layout {
            breakpoint: "tiny".to_string(),
            screen_width_range: (0.0, 100.0),
            viz_width: 6.0,
            wave_height: 3.0,
            label_height: 3.0,
            response_gap: 0.0,
            party_gap: 0.0,
            point_radius: 1.5,
        };
        let mut rng = StdRng::seed_from_u64(8);
        let res = build_coordinates(&[], &[1], 1, &layout, 6, &mut rng).unwrap();
        assert!(!res.unsplit_positions.error);
        assert_eq!(res.unsplit_positions.data.len(), 6);
        let mut rows: Vec<f64> = res.unsplit_positions.data.iter().map(|p| p.cy).collect();
        rows.sort_by(|a, b| a.partial_cmp(b).unwrap());
        rows.dedup();
        assert_eq!(rows, vec![1.5, 4.5, 7.5]);
    }

    #[test]
    fn the_aggregate_of_split_samples() {
        let s = split(None, Some(1));
        assert_eq!(split_sample_size(&s, 50, 4, 3), 200);
        assert_eq!(split_sample_size(&split(None, None), 50, 4, 3), 600);
    }

    #[test]
    fn rejects_bad_proportions() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut bad = split(Some(0), None);
        if let Some(r) = bad.responses.as_mut() {
            r.collapsed = responses(&[0.5, 0.4]);
        }
        assert!(matches!(
            build_coordinates(&[bad], &[1], 3, &layout(), 10, &mut rng),
            Err(LayoutError::ProportionSum { .. })
        ));
        let mut negative = split(None, None);
        if let Some(r) = negative.responses.as_mut() {
            r.expanded = responses(&[1.5, -0.5]);
        }
        assert_eq!(
            check_split(&negative),
            Err(LayoutError::InvalidProportion {
                index: 0,
                value: 1.5
            })
        );
    }

    #[test]
    fn tolerates_rounding_in_proportions() {
        let mut s = split(None, None);
        if let Some(r) = s.responses.as_mut() {
            r.expanded = responses(&[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        }
        assert_eq!(check_split(&s), Ok(()));
    }

    #[test]
    fn requires_waves_and_parties() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(
            build_coordinates(&[], &[], 3, &layout(), 10, &mut rng),
            Err(LayoutError::EmptyGrouping { dimension: "wave" })
        );
        assert_eq!(
            build_coordinates(&[], &[1], 0, &layout(), 10, &mut rng),
            Err(LayoutError::EmptyGrouping { dimension: "party" })
        );
    }

    #[test]
    fn same_seed_same_coordinates() {
        let a = build_coordinates(
            &all_splits(),
            &[1, 2],
            3,
            &layout(),
            7,
            &mut StdRng::seed_from_u64(11),
        )
        .unwrap();
        let b = build_coordinates(
            &all_splits(),
            &[1, 2],
            3,
            &layout(),
            7,
            &mut StdRng::seed_from_u64(11),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn overflow_is_carried_in_the_data() {
        let mut l = layout();
        l.wave_height = 2.0;
        let mut rng = StdRng::seed_from_u64(3);
        let res = build_coordinates(&all_splits(), &[1, 2], 3, &l, 30, &mut rng).unwrap();
        assert!(res.overflow_count() > 0);
        let r = res.splits[0].responses.as_ref().unwrap();
        assert_eq!(r.expanded.iter().map(|x| x.segment.point_positions.len()).sum::<usize>(), 180);
    }
}
