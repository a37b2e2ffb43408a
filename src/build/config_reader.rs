use crate::build::*;

use dot_layout::{Layout, LayoutError, ResponseGroup, ResponseGroups, Split};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::build::io_output::is_safe_path_component;

// ********* Visualization config ***********

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VizConfig {
    /// Respondents in one (wave, party) cell.
    pub sample_size: u64,
    pub layouts: Vec<Layout>,
}

impl VizConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for layout in self.layouts.iter() {
            layout.validate()?;
            if !is_safe_path_component(&layout.breakpoint) {
                return Err(LayoutError::InvalidLayout {
                    breakpoint: layout.breakpoint.clone(),
                    reason: "breakpoint name cannot be used as a file name".to_string(),
                });
            }
            if !seen.insert(layout.breakpoint.as_str()) {
                return Err(LayoutError::InvalidLayout {
                    breakpoint: layout.breakpoint.clone(),
                    reason: "duplicate breakpoint".to_string(),
                });
            }
        }
        Ok(())
    }
}

pub fn read_viz_config(path: &Path) -> BuildResult<VizConfig> {
    let p = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path: p.clone() })?;
    let config: VizConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path: p.clone() })?;
    config.validate().context(LayoutSnafu { unit: p.clone() })?;
    if config.layouts.is_empty() {
        whatever!("No layout defined in {}", p)
    }
    Ok(config)
}

// ********* Survey metadata ***********

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Pid3Meta {
    pub col_idx: i64,
    #[serde(default)]
    pub vals: Vec<String>,
    pub response_groups: Vec<ResponseGroup>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct WaveMeta {
    pub col_idx: i64,
    #[serde(default)]
    pub vals: Vec<i64>,
    #[serde(default)]
    pub response_groups: Vec<(String, Vec<i64>)>,
    /// (wave value, human label)
    #[serde(default)]
    pub dates: Vec<(i64, String)>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct WeightMeta {
    pub col_idx: i64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub characteristics: Option<Vec<JSValue>>,
    #[serde(default)]
    pub vals: Vec<String>,
    pub response_groups: ResponseGroups,
}

/// The metadata of one dimension.
///
/// The characteristics are kept undecoded, so that a malformed one only skips itself.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub characteristics: Option<Vec<JSValue>>,
    pub response: ResponseMeta,
    #[serde(default)]
    pub pid3: Option<Pid3Meta>,
    #[serde(default)]
    pub wave: Option<WaveMeta>,
    #[serde(default)]
    pub weight: Option<WeightMeta>,
}

/// The grouping columns. The weight column is required in the source but
/// nothing reads it here.
pub struct GroupVars<'a> {
    pub pid3: &'a Pid3Meta,
    pub wave: &'a WaveMeta,
}

impl Meta {
    pub fn group_vars(&self) -> BuildResult<GroupVars<'_>> {
        let wave = self
            .wave
            .as_ref()
            .context(SourceDataMissingSnafu { column: "wave" })?;
        let weight = self
            .weight
            .as_ref()
            .context(SourceDataMissingSnafu { column: "weight" })?;
        let pid3 = self
            .pid3
            .as_ref()
            .context(SourceDataMissingSnafu { column: "pid3" })?;
        // A negative index marks a column absent from the raw data.
        for (column, col_idx) in [
            ("wave", wave.col_idx),
            ("weight", weight.col_idx),
            ("pid3", pid3.col_idx),
        ] {
            ensure!(col_idx >= 0, SourceDataMissingSnafu { column });
        }
        Ok(GroupVars { pid3, wave })
    }

    /// The raw characteristic records, found either at the top level or under `response`.
    pub fn characteristics(&self) -> &[JSValue] {
        self.characteristics
            .as_deref()
            .or(self.response.characteristics.as_deref())
            .unwrap_or(&[])
    }
}

pub fn parse_meta(bytes: &[u8], path: &Path) -> BuildResult<Meta> {
    let p = path.display().to_string();
    let js: JSValue = serde_json::from_slice(bytes).context(ParsingJsonSnafu { path: p.clone() })?;
    serde_json::from_value(js).context(SchemaMismatchSnafu { what: p })
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Characteristic {
    pub characteristic_name: String,
    pub col_idx: i64,
    /// The raw values of the waves in which the characteristic was asked.
    #[serde(alias = "in_wave_response_groups")]
    pub in_waves: Vec<i64>,
    pub splits: Vec<Split>,
}

pub fn decode_characteristic(raw: &JSValue) -> BuildResult<Characteristic> {
    let what = raw
        .get("characteristic_name")
        .and_then(|n| n.as_str())
        .unwrap_or("<unnamed characteristic>")
        .to_string();
    let c: Characteristic =
        serde_json::from_value(raw.clone()).context(SchemaMismatchSnafu { what })?;
    ensure!(
        is_safe_path_component(&c.characteristic_name),
        UnsafeNameSnafu {
            name: c.characteristic_name.clone()
        }
    );
    ensure!(
        c.col_idx >= 0,
        SourceDataMissingSnafu {
            column: c.characteristic_name.clone()
        }
    );
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout_js(breakpoint: &str) -> JSValue {
        json!({
            "breakpoint": breakpoint,
            "screenWidthRange": [0, 768],
            "vizWidth": 340,
            "waveHeight": 300,
            "labelHeight": 40,
            "responseGap": 6,
            "partyGap": 12,
            "pointRadius": 1.5
        })
    }

    fn meta_js() -> JSValue {
        json!({
            "response": {
                "characteristics": [
                    {"characteristic_name": "courts", "col_idx": 7, "in_wave_response_groups": [3], "splits": []}
                ],
                "response_groups": {"expanded": [["Yes", ["1"]]], "collapsed": [["Yes", ["1"]]]}
            },
            "pid3": {"col_idx": 3, "response_groups": [["Democrat", ["1"]]]},
            "wave": {"col_idx": 2, "dates": [[3, "Oct 2017"]]},
            "weight": {"col_idx": 4}
        })
    }

    #[test]
    fn reads_layouts() {
        let config: VizConfig = serde_json::from_value(json!({
            "sample_size": 100,
            "layouts": [layout_js("small"), layout_js("large")]
        }))
        .unwrap();
        assert_eq!(config.layouts[0].screen_width_range, (0.0, 768.0));
        assert_eq!(config.layouts[1].point_radius, 1.5);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_duplicate_and_unsafe_breakpoints() {
        let config: VizConfig = serde_json::from_value(json!({
            "sample_size": 100,
            "layouts": [layout_js("small"), layout_js("small")]
        }))
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(LayoutError::InvalidLayout { reason, .. }) if reason == "duplicate breakpoint"
        ));
        let config: VizConfig = serde_json::from_value(json!({
            "sample_size": 100,
            "layouts": [layout_js("../small")]
        }))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn characteristics_under_response() {
        let meta: Meta = serde_json::from_value(meta_js()).unwrap();
        assert_eq!(meta.characteristics().len(), 1);
        let c = decode_characteristic(&meta.characteristics()[0]).unwrap();
        assert_eq!(c.characteristic_name, "courts");
        assert_eq!(c.in_waves, vec![3]);
        let vars = meta.group_vars().unwrap();
        assert_eq!(vars.wave.dates, vec![(3, "Oct 2017".to_string())]);
        assert_eq!(vars.pid3.response_groups.len(), 1);
    }

    #[test]
    fn missing_columns() {
        let mut js = meta_js();
        js["weight"]["col_idx"] = json!(-1);
        let meta: Meta = serde_json::from_value(js).unwrap();
        assert!(matches!(
            meta.group_vars(),
            Err(BuildError::SourceDataMissing { column }) if column == "weight"
        ));

        let mut js = meta_js();
        if let Some(obj) = js.as_object_mut() {
            obj.remove("pid3");
        }
        let meta: Meta = serde_json::from_value(js).unwrap();
        assert!(matches!(
            meta.group_vars(),
            Err(BuildError::SourceDataMissing { column }) if column == "pid3"
        ));
    }

    #[test]
    fn malformed_characteristics() {
        assert!(matches!(
            decode_characteristic(&json!({"characteristic_name": "x", "col_idx": 1})),
            Err(BuildError::SchemaMismatch { what, .. }) if what == "x"
        ));
        assert!(matches!(
            decode_characteristic(&json!({"characteristic_name": "a/b", "col_idx": 1, "in_waves": [], "splits": []})),
            Err(BuildError::UnsafeName { .. })
        ));
        assert!(matches!(
            decode_characteristic(&json!({"characteristic_name": "x", "col_idx": -1, "in_waves": [], "splits": []})),
            Err(BuildError::SourceDataMissing { .. })
        ));
    }

    #[test]
    fn schema_mismatch_of_a_whole_source() {
        let path = Path::new("meta.json");
        assert!(matches!(
            parse_meta(b"{\"response\": 3}", path),
            Err(BuildError::SchemaMismatch { .. })
        ));
        assert!(matches!(
            parse_meta(b"{not json", path),
            Err(BuildError::ParsingJson { .. })
        ));
    }
}
