use log::debug;
use rand::Rng;

use crate::config::*;
use crate::packing::point_positions;

/// Which dimensions a split is broken out along, with the ordinal positions it occupies.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SplitKind {
    /// Aggregated over all waves and all parties.
    Aggregate,
    ByWave { wave: usize },
    ByParty { party: usize },
    ByWaveAndParty { wave: usize, party: usize },
}

impl SplitKind {
    pub fn of(wave: Option<&Wave>, party: Option<&Party>) -> SplitKind {
        match (wave, party) {
            (None, None) => SplitKind::Aggregate,
            (Some(w), None) => SplitKind::ByWave { wave: w.index },
            (None, Some(p)) => SplitKind::ByParty { party: p.index },
            (Some(w), Some(p)) => SplitKind::ByWaveAndParty {
                wave: w.index,
                party: p.index,
            },
        }
    }

    /// The number of elementary (wave, party) cells this split aggregates over.
    pub fn aggregated_cells(&self, num_waves: usize, num_parties: usize) -> usize {
        match self {
            SplitKind::Aggregate => num_waves * num_parties,
            SplitKind::ByWave { .. } => num_parties,
            SplitKind::ByParty { .. } => num_waves,
            SplitKind::ByWaveAndParty { .. } => 1,
        }
    }
}

/// The area shared by all the responses of one split.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct SegmentGroup {
    pub top_left_x: f64,
    pub top_left_y: f64,
    /// The width left for the responses once the gaps between them are removed.
    pub width_to_be_distributed: f64,
    pub height: f64,
}

struct Canvas<'a> {
    layout: &'a Layout,
    num_waves: usize,
    num_parties: usize,
}

// Vertical and horizontal extents, as (start, length).
impl<'a> Canvas<'a> {
    fn all_waves(&self) -> (f64, f64) {
        let l = self.layout;
        (
            l.label_height,
            self.num_waves as f64 * (l.label_height + l.wave_height),
        )
    }

    fn wave_band(&self, wave: usize) -> Result<(f64, f64), LayoutError> {
        if wave >= self.num_waves {
            return Err(LayoutError::WaveOutOfRange {
                index: wave,
                num_waves: self.num_waves,
            });
        }
        let l = self.layout;
        Ok((
            l.label_height + wave as f64 * (l.label_height + l.wave_height),
            l.wave_height,
        ))
    }

    fn all_parties(&self) -> (f64, f64) {
        (0.0, self.layout.viz_width)
    }

    fn party_column(&self, party: usize) -> Result<(f64, f64), LayoutError> {
        if party >= self.num_parties {
            return Err(LayoutError::PartyOutOfRange {
                index: party,
                num_parties: self.num_parties,
            });
        }
        let l = self.layout;
        let n = self.num_parties as f64;
        let column_width = (l.viz_width - l.party_gap * (n - 1.0)) / n;
        Ok((party as f64 * (column_width + l.party_gap), column_width))
    }

    fn frame(&self, kind: SplitKind) -> Result<Rect, LayoutError> {
        let ((x, width), (y, height)) = match kind {
            SplitKind::Aggregate => (self.all_parties(), self.all_waves()),
            SplitKind::ByWave { wave } => (self.all_parties(), self.wave_band(wave)?),
            SplitKind::ByParty { party } => (self.party_column(party)?, self.all_waves()),
            SplitKind::ByWaveAndParty { wave, party } => {
                (self.party_column(party)?, self.wave_band(wave)?)
            }
        };
        Ok(Rect::new(x, y, width, height))
    }
}

/// The rectangle occupied by a whole split (all its responses and the gaps between them).
pub fn split_frame(
    kind: SplitKind,
    layout: &Layout,
    num_waves: usize,
    num_parties: usize,
) -> Result<Rect, LayoutError> {
    if num_waves == 0 {
        return Err(LayoutError::EmptyGrouping { dimension: "wave" });
    }
    if num_parties == 0 {
        return Err(LayoutError::EmptyGrouping { dimension: "party" });
    }
    Canvas {
        layout,
        num_waves,
        num_parties,
    }
    .frame(kind)
}

pub fn segment_group(
    kind: SplitKind,
    num_responses: usize,
    layout: &Layout,
    num_waves: usize,
    num_parties: usize,
) -> Result<SegmentGroup, LayoutError> {
    let frame = split_frame(kind, layout, num_waves, num_parties)?;
    let gaps = layout.response_gap * num_responses.saturating_sub(1) as f64;
    if gaps > frame.width {
        return Err(LayoutError::GapsExceedWidth {
            group_width: frame.width,
            gaps,
        });
    }
    Ok(SegmentGroup {
        top_left_x: frame.x,
        top_left_y: frame.y,
        width_to_be_distributed: frame.width - gaps,
        height: frame.height,
    })
}

fn segments<R: Rng + ?Sized>(
    responses: &[ResponseWithCount],
    group: &SegmentGroup,
    response_gap: f64,
    point_radius: f64,
    rng: &mut R,
) -> Result<Vec<ResponseWithSegment>, LayoutError> {
    let mut res: Vec<ResponseWithSegment> = Vec::with_capacity(responses.len());
    let mut top_left_x = group.top_left_x;
    for response in responses.iter() {
        let width = group.width_to_be_distributed * response.proportion;
        let rect = Rect::new(top_left_x, group.top_left_y, width, group.height);
        let positions = point_positions(&rect, response.count as usize, point_radius, rng)?;
        debug!(
            "segments: response {:?}: {} points in {:?} (error: {})",
            response.response, response.count, rect, positions.error
        );
        res.push(ResponseWithSegment {
            response: response.response.clone(),
            proportion: response.proportion,
            count: response.count,
            segment: Segment {
                top_left_x,
                top_left_y: group.top_left_y,
                width,
                height: group.height,
                point_positions: positions.data,
                error: positions.error,
            },
        });
        top_left_x += width + response_gap;
    }
    Ok(res)
}

/// Computes the segment of every response of a split, for both groupings.
///
/// The split's rectangle depends only on whether it is broken out by wave and by party; the
/// responses are then laid out left to right inside it, each as wide as its share of the
/// respondents, and their dots are packed with [`point_positions`].
///
/// `num_parties` is the number of party groups in the metadata, which sets the number of
/// columns of party splits. The input split is not modified.
pub fn add_segments<R: Rng + ?Sized>(
    split: &SplitWithCounts,
    layout: &Layout,
    num_waves: usize,
    num_parties: usize,
    rng: &mut R,
) -> Result<SplitWithSegments, LayoutError> {
    let kind = SplitKind::of(split.wave.as_ref(), split.party.as_ref());
    // Checks the wave and party indices even when there is nothing to lay out.
    split_frame(kind, layout, num_waves, num_parties)?;
    let responses = match &split.responses {
        None => None,
        Some(r) => {
            let mut grouping = |responses: &[ResponseWithCount]| -> Result<Vec<ResponseWithSegment>, LayoutError> {
                let group =
                    segment_group(kind, responses.len(), layout, num_waves, num_parties)?;
                segments(
                    responses,
                    &group,
                    layout.response_gap,
                    layout.point_radius,
                    rng,
                )
            };
            let expanded = grouping(&r.expanded)?;
            let collapsed = grouping(&r.collapsed)?;
            Some(SplitResponses {
                expanded,
                collapsed,
            })
        }
    };
    Ok(SplitOf {
        wave: split.wave.clone(),
        party: split.party.clone(),
        responses,
    })
}
