use crate::build::*;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

/// What the client needs to know about one dimension.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionInfo {
    pub expanded: Vec<String>,
    pub collapsed: Vec<String>,
    /// For every expanded response group, the index of its collapsed group.
    pub response_group_mapping: Vec<usize>,
    pub wave_labels: Vec<(i64, String)>,
}

/// The list of the files that were built.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// characteristic -> dimension -> breakpoints
    pub characteristics: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    pub dimensions: BTreeMap<String, DimensionInfo>,
}

impl Manifest {
    pub fn add_unit(&mut self, dimension: Dimension, characteristic: &str, breakpoint: &str) {
        self.characteristics
            .entry(characteristic.to_string())
            .or_default()
            .entry(dimension.slug().to_string())
            .or_default()
            .push(breakpoint.to_string());
    }
}

/// Names that can be used as a single path component, without escaping the output directory.
pub fn is_safe_path_component(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(|c: char| c == '/' || c == '\\' || c.is_control())
}

pub fn unit_path(
    out_dir: &Path,
    dimension: Dimension,
    characteristic: &str,
    breakpoint: &str,
) -> PathBuf {
    out_dir
        .join(dimension.slug())
        .join(characteristic)
        .join(format!("{}.gz", breakpoint))
}

/// Writes a value as gzip-compressed JSON, creating the parent directories.
pub fn write_gz_json<T: Serialize>(path: &Path, value: &T) -> BuildResult<()> {
    let p = path.display().to_string();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(WritingOutputSnafu { path: p.clone() })?;
    }
    let bytes = serde_json::to_vec(value).context(SerializingJsonSnafu { path: p.clone() })?;
    let file = File::create(path).context(WritingOutputSnafu { path: p.clone() })?;
    let mut encoder = GzEncoder::new(file, Compression::best());
    encoder
        .write_all(&bytes)
        .context(WritingOutputSnafu { path: p.clone() })?;
    encoder.finish().context(WritingOutputSnafu { path: p })?;
    Ok(())
}

pub fn write_manifest(out_dir: &Path, manifest: &Manifest) -> BuildResult<PathBuf> {
    let path = out_dir.join(MANIFEST_FILE);
    let p = path.display().to_string();
    let js = serde_json::to_string_pretty(manifest).context(SerializingJsonSnafu { path: p.clone() })?;
    fs::write(&path, js).context(WritingOutputSnafu { path: p })?;
    Ok(path)
}
