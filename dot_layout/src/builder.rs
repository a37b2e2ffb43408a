pub use crate::config::*;
use rand::Rng;

/// A builder for the coordinates of one characteristic at one breakpoint.
///
/// The splits are checked as they are added, so that a bad split is reported before any
/// layout work happens.
///
/// ```
/// use dot_layout::builder::Builder;
/// use dot_layout::{Layout, Response, SplitOf, SplitResponses};
/// # use dot_layout::LayoutError;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let layout = Layout {
///     breakpoint: "small".to_string(),
///     screen_width_range: (0.0, 600.0),
///     viz_width: 300.0,
///     wave_height: 100.0,
///     label_height: 20.0,
///     response_gap: 5.0,
///     party_gap: 10.0,
///     point_radius: 2.0,
/// };
/// let responses = vec![
///     Response { response: vec!["Yes".to_string()], proportion: 0.6 },
///     Response { response: vec!["No".to_string()], proportion: 0.4 },
/// ];
///
/// let mut builder = Builder::new(&layout, 10)?.waves(&[1])?.parties(1)?;
/// builder.add_split(&SplitOf {
///     wave: None,
///     party: None,
///     responses: Some(SplitResponses { expanded: responses.clone(), collapsed: responses }),
/// })?;
/// let data = builder.build(&mut StdRng::seed_from_u64(0))?;
/// assert_eq!(data.unsplit_positions.data.len(), 10);
///
/// # Ok::<(), LayoutError>(())
/// ```
pub struct Builder {
    pub(crate) _layout: Layout,
    pub(crate) _sample_size: u64,
    pub(crate) _waves: Vec<i64>,
    pub(crate) _num_parties: usize,
    pub(crate) _splits: Vec<Split>,
}

impl Builder {
    pub fn new(layout: &Layout, sample_size: u64) -> Result<Builder, LayoutError> {
        layout.validate()?;
        Ok(Builder {
            _layout: layout.clone(),
            _sample_size: sample_size,
            _waves: Vec::new(),
            _num_parties: 0,
            _splits: Vec::new(),
        })
    }

    /// The raw values of the waves present for the characteristic, in display order.
    pub fn waves(self, waves: &[i64]) -> Result<Builder, LayoutError> {
        if waves.is_empty() {
            return Err(LayoutError::EmptyGrouping { dimension: "wave" });
        }
        Ok(Builder {
            _waves: waves.to_vec(),
            ..self
        })
    }

    pub fn parties(self, num_parties: usize) -> Result<Builder, LayoutError> {
        if num_parties == 0 {
            return Err(LayoutError::EmptyGrouping { dimension: "party" });
        }
        Ok(Builder {
            _num_parties: num_parties,
            ..self
        })
    }

    /// Adds a split, after checking its proportions and its wave and party indices.
    pub fn add_split(&mut self, split: &Split) -> Result<(), LayoutError> {
        crate::check_split(split)?;
        if let Some(w) = &split.wave {
            if w.index >= self._waves.len() {
                return Err(LayoutError::WaveOutOfRange {
                    index: w.index,
                    num_waves: self._waves.len(),
                });
            }
        }
        if let Some(p) = &split.party {
            if p.index >= self._num_parties {
                return Err(LayoutError::PartyOutOfRange {
                    index: p.index,
                    num_parties: self._num_parties,
                });
            }
        }
        self._splits.push(split.clone());
        Ok(())
    }

    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CoordinateData, LayoutError> {
        crate::build_coordinates(
            &self._splits,
            &self._waves,
            self._num_parties,
            &self._layout,
            self._sample_size,
            rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layout() -> Layout {
        Layout {
            breakpoint: "large".to_string(),
            screen_width_range: (1200.0, 10000.0),
            viz_width: 1000.0,
            wave_height: 150.0,
            label_height: 30.0,
            response_gap: 10.0,
            party_gap: 40.0,
            point_radius: 3.0,
        }
    }

    fn by_party(index: usize) -> Split {
        SplitOf {
            wave: None,
            party: Some(Party {
                value: ("Democrat".to_string(), vec!["1".to_string()]),
                index,
            }),
            responses: None,
        }
    }

    #[test]
    fn rejects_invalid_layout() {
        let mut l = layout();
        l.point_radius = 0.0;
        assert!(matches!(
            Builder::new(&l, 10),
            Err(LayoutError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn rejects_empty_groupings() {
        assert!(matches!(
            Builder::new(&layout(), 10).unwrap().waves(&[]),
            Err(LayoutError::EmptyGrouping { dimension: "wave" })
        ));
        assert!(matches!(
            Builder::new(&layout(), 10).unwrap().parties(0),
            Err(LayoutError::EmptyGrouping { dimension: "party" })
        ));
    }

    #[test]
    fn checks_indices_when_adding() {
        let mut builder = Builder::new(&layout(), 10)
            .unwrap()
            .waves(&[1, 2])
            .unwrap()
            .parties(2)
            .unwrap();
        assert_eq!(builder.add_split(&by_party(1)), Ok(()));
        assert_eq!(
            builder.add_split(&by_party(2)),
            Err(LayoutError::PartyOutOfRange {
                index: 2,
                num_parties: 2
            })
        );
        let data = builder.build(&mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(data.splits.len(), 1);
        assert_eq!(data.splits[0].responses, None);
        assert_eq!(data.unsplit_positions.data.len(), 40);
    }
}
