// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Tolerance when checking that the proportions of a response grouping sum to one.
pub const PROPORTION_TOLERANCE: f64 = 1e-6;

/// One survey administration, as found in the metadata.
///
/// `value` is the human label and the raw wave values grouped under it. `index` is the
/// ordinal position among the waves actually present for a characteristic.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Wave {
    pub value: (String, Vec<i64>),
    pub index: usize,
}

/// A political-affiliation grouping and its ordinal position.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Party {
    pub value: (String, Vec<String>),
    pub index: usize,
}

/// A response category (a path of raw response labels) and the share of respondents in it.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub response: Vec<String>,
    pub proportion: f64,
}

/// A response once the integer number of respondents has been apportioned.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponseWithCount {
    pub response: Vec<String>,
    pub proportion: f64,
    pub count: u64,
}

/// A response with the rectangle and the dots allocated to it.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponseWithSegment {
    pub response: Vec<String>,
    pub proportion: f64,
    pub count: u64,
    pub segment: Segment,
}

/// The fine-grained and coarse-grained groupings of the responses of one split.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SplitResponses<T> {
    pub expanded: Vec<T>,
    pub collapsed: Vec<T>,
}

/// A view of the data along zero or more of {wave, party}.
///
/// `None` for a dimension means that the split aggregates over it.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SplitOf<T> {
    pub wave: Option<Wave>,
    pub party: Option<Party>,
    pub responses: Option<SplitResponses<T>>,
}

pub type Split = SplitOf<Response>;
pub type SplitWithCounts = SplitOf<ResponseWithCount>;
pub type SplitWithSegments = SplitOf<ResponseWithSegment>;

/// A named response grouping: `[label, member labels]` in the metadata.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponseGroup(pub String, pub Vec<String>);

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponseGroups {
    pub expanded: Vec<ResponseGroup>,
    pub collapsed: Vec<ResponseGroup>,
}

impl ResponseGroups {
    /// For every expanded group, the index of the collapsed group that contains all its members.
    ///
    /// Fails if an expanded group is contained in no collapsed group, or in more than one.
    pub fn collapsed_index_map(&self) -> Result<Vec<usize>, LayoutError> {
        let mut res: Vec<usize> = Vec::with_capacity(self.expanded.len());
        for ResponseGroup(label, members) in self.expanded.iter() {
            let containing: Vec<usize> = self
                .collapsed
                .iter()
                .enumerate()
                .filter(|(_, ResponseGroup(_, coarse))| members.iter().all(|m| coarse.contains(m)))
                .map(|(idx, _)| idx)
                .collect();
            match containing.as_slice() {
                [idx] => res.push(*idx),
                _ => {
                    return Err(LayoutError::UnmappedResponseGroup {
                        label: label.clone(),
                        matches: containing.len(),
                    })
                }
            }
        }
        Ok(res)
    }
}

// ******** Output data structures *********

/// One respondent: `x`, `y` is the top-left corner used to place the dot icon, `cx`, `cy`
/// is the center.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointPosition {
    pub x: f64,
    pub y: f64,
    pub cx: f64,
    pub cy: f64,
}

/// The result of packing points in a rectangle.
///
/// `error` is set when the points could not all be placed without overlapping.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointPositions {
    pub error: bool,
    pub data: Vec<PointPosition>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub top_left_x: f64,
    pub top_left_y: f64,
    pub width: f64,
    pub height: f64,
    pub point_positions: Vec<PointPosition>,
    pub error: bool,
}

/// The precomputed coordinates for one characteristic at one breakpoint.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateData {
    pub splits: Vec<SplitWithSegments>,
    pub unsplit_positions: PointPositions,
    pub waves: Vec<i64>,
}

impl CoordinateData {
    /// Number of segments (and of the unsplit packing) that fell back to overlapping dots.
    pub fn overflow_count(&self) -> usize {
        let segments = self
            .splits
            .iter()
            .filter_map(|s| s.responses.as_ref())
            .flat_map(|r| r.expanded.iter().chain(r.collapsed.iter()))
            .filter(|r| r.segment.error)
            .count();
        segments + usize::from(self.unsplit_positions.error)
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

// ********* Configuration **********

/// A responsive breakpoint configuration.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub breakpoint: String,
    pub screen_width_range: (f64, f64),
    pub viz_width: f64,
    pub wave_height: f64,
    pub label_height: f64,
    pub response_gap: f64,
    pub party_gap: f64,
    pub point_radius: f64,
}

impl Layout {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let invalid = |reason: &str| {
            Err(LayoutError::InvalidLayout {
                breakpoint: self.breakpoint.clone(),
                reason: reason.to_string(),
            })
        };
        if self.breakpoint.is_empty() {
            return invalid("empty breakpoint name");
        }
        let (min_width, max_width) = self.screen_width_range;
        if !(min_width <= max_width) {
            return invalid("screen width range is not ordered");
        }
        let sizes = [
            self.viz_width,
            self.wave_height,
            self.label_height,
            self.response_gap,
            self.party_gap,
        ];
        if !sizes.iter().all(|s| s.is_finite() && *s >= 0.0) {
            return invalid("sizes and gaps must be finite and non-negative");
        }
        if !(self.point_radius.is_finite() && self.point_radius > 0.0) {
            return invalid("point radius must be positive");
        }
        Ok(())
    }

    /// The height of the whole visualization: a leading label strip, then one
    /// label strip and one wave band per wave.
    pub fn canvas_height(&self, num_waves: usize) -> f64 {
        self.label_height + num_waves as f64 * (self.label_height + self.wave_height)
    }
}

/// Errors that reject a unit of work.
#[derive(PartialEq, Debug, Clone)]
pub enum LayoutError {
    InvalidProportion { index: usize, value: f64 },
    ProportionSum { sum: f64 },
    EmptyResponses { sample_size: u64 },
    InvalidRectangle { width: f64, height: f64 },
    InvalidPointRadius { radius: f64 },
    GapsExceedWidth { group_width: f64, gaps: f64 },
    WaveOutOfRange { index: usize, num_waves: usize },
    PartyOutOfRange { index: usize, num_parties: usize },
    EmptyGrouping { dimension: &'static str },
    InvalidLayout { breakpoint: String, reason: String },
    UnmappedResponseGroup { label: String, matches: usize },
}

impl Error for LayoutError {}

impl Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::InvalidProportion { index, value } => {
                write!(f, "response {} has an invalid proportion {}", index, value)
            }
            LayoutError::ProportionSum { sum } => {
                write!(f, "proportions sum to {} instead of 1", sum)
            }
            LayoutError::EmptyResponses { sample_size } => write!(
                f,
                "no responses to distribute a sample of {} respondents over",
                sample_size
            ),
            LayoutError::InvalidRectangle { width, height } => {
                write!(f, "malformed rectangle {}x{}", width, height)
            }
            LayoutError::InvalidPointRadius { radius } => {
                write!(f, "point radius must be positive, got {}", radius)
            }
            LayoutError::GapsExceedWidth { group_width, gaps } => write!(
                f,
                "response gaps ({}) exceed the group width ({})",
                gaps, group_width
            ),
            LayoutError::WaveOutOfRange { index, num_waves } => {
                write!(f, "wave index {} out of range ({} waves)", index, num_waves)
            }
            LayoutError::PartyOutOfRange { index, num_parties } => write!(
                f,
                "party index {} out of range ({} party groups)",
                index, num_parties
            ),
            LayoutError::EmptyGrouping { dimension } => {
                write!(f, "at least one {} group is required", dimension)
            }
            LayoutError::InvalidLayout { breakpoint, reason } => {
                write!(f, "invalid layout {:?}: {}", breakpoint, reason)
            }
            LayoutError::UnmappedResponseGroup { label, matches } => write!(
                f,
                "expanded response group {:?} is contained in {} collapsed groups (expected 1)",
                label, matches
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(label: &str, members: &[&str]) -> ResponseGroup {
        ResponseGroup(
            label.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        )
    }

    #[test]
    fn collapsed_index_map_follows_membership() {
        let groups = ResponseGroups {
            expanded: vec![
                group("Not at all", &["1"]),
                group("Not very", &["2"]),
                group("Somewhat", &["3"]),
                group("Very", &["4"]),
                group("Essential", &["5"]),
            ],
            collapsed: vec![
                group("Not important", &["1", "2"]),
                group("Important", &["3", "4", "5"]),
            ],
        };
        assert_eq!(groups.collapsed_index_map(), Ok(vec![0, 0, 1, 1, 1]));
    }

    #[test]
    fn collapsed_index_map_rejects_ambiguous_groups() {
        let groups = ResponseGroups {
            expanded: vec![group("Both", &["1", "3"])],
            collapsed: vec![group("Low", &["1", "2"]), group("High", &["3"])],
        };
        assert_eq!(
            groups.collapsed_index_map(),
            Err(LayoutError::UnmappedResponseGroup {
                label: "Both".to_string(),
                matches: 0
            })
        );
        let groups = ResponseGroups {
            expanded: vec![group("One", &["1"])],
            collapsed: vec![group("A", &["1"]), group("B", &["1", "2"])],
        };
        assert!(matches!(
            groups.collapsed_index_map(),
            Err(LayoutError::UnmappedResponseGroup { matches: 2, .. })
        ));
    }

    fn layout() -> Layout {
        Layout {
            breakpoint: "medium".to_string(),
            screen_width_range: (768.0, 1200.0),
            viz_width: 700.0,
            wave_height: 250.0,
            label_height: 30.0,
            response_gap: 8.0,
            party_gap: 20.0,
            point_radius: 2.0,
        }
    }

    #[test]
    fn layout_validation() {
        assert_eq!(layout().validate(), Ok(()));
        assert_eq!(layout().canvas_height(3), 30.0 + 3.0 * 280.0);

        let mut l = layout();
        l.screen_width_range = (1200.0, 768.0);
        assert!(l.validate().is_err());
        let mut l = layout();
        l.response_gap = -1.0;
        assert!(l.validate().is_err());
        let mut l = layout();
        l.point_radius = f64::NAN;
        assert!(l.validate().is_err());
        let mut l = layout();
        l.breakpoint = String::new();
        assert!(l.validate().is_err());
    }

    #[test]
    fn serialized_field_names() {
        let data = CoordinateData {
            splits: vec![SplitOf {
                wave: None,
                party: Some(Party {
                    value: ("Democrat".to_string(), vec!["1".to_string()]),
                    index: 0,
                }),
                responses: Some(SplitResponses {
                    expanded: vec![ResponseWithSegment {
                        response: vec!["5".to_string()],
                        proportion: 1.0,
                        count: 1,
                        segment: Segment {
                            top_left_x: 0.0,
                            top_left_y: 30.0,
                            width: 10.0,
                            height: 20.0,
                            point_positions: vec![PointPosition {
                                x: 1.0,
                                y: 31.0,
                                cx: 3.0,
                                cy: 33.0,
                            }],
                            error: true,
                        },
                    }],
                    collapsed: vec![],
                }),
            }],
            unsplit_positions: PointPositions::default(),
            waves: vec![1],
        };
        let js = serde_json::to_value(&data).unwrap();
        assert!(js["splits"][0]["wave"].is_null());
        assert_eq!(js["splits"][0]["party"]["value"][0], "Democrat");
        let segment = &js["splits"][0]["responses"]["expanded"][0]["segment"];
        assert_eq!(segment["topLeftY"], 30.0);
        assert_eq!(segment["pointPositions"][0]["cx"], 3.0);
        assert_eq!(js["unsplitPositions"]["error"], false);
        assert_eq!(data.overflow_count(), 1);
    }
}
