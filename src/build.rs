use log::{debug, info, warn};

use dot_layout::builder::Builder;
use dot_layout::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use crate::build::config_reader::*;
use crate::build::io_meta::read_source;
use crate::build::io_output::*;

pub mod config_reader;
pub mod io_meta;
pub mod io_output;

#[derive(Debug, Snafu)]
pub enum BuildError {
    #[snafu(display("Error reading file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON for {path}"))]
    SerializingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error decompressing {path}"))]
    Decompressing {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid archive {path}: {reason}"))]
    Archive { path: String, reason: String },
    #[snafu(display("Entry {entry} not found in archive {path}"))]
    ArchiveEntryMissing { path: String, entry: String },
    #[snafu(display("Required metadata column {column} is missing"))]
    SourceDataMissing { column: String },
    #[snafu(display("Metadata does not have the expected structure: {what}"))]
    SchemaMismatch {
        source: serde_json::Error,
        what: String,
    },
    #[snafu(display("Response groups do not match"))]
    InconsistentGroups { source: LayoutError },
    #[snafu(display("Name {name} cannot be used in an output path"))]
    UnsafeName { name: String },
    #[snafu(display("Layout error for {unit}"))]
    Layout { source: LayoutError, unit: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type BuildResult<T> = Result<T, BuildError>;

/// The error and all its causes, on one line.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut res = e.to_string();
    let mut cur = e.source();
    while let Some(s) = cur {
        res.push_str(": ");
        res.push_str(&s.to_string());
        cur = s.source();
    }
    res
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Dimension {
    Importance,
    Performance,
}

impl Dimension {
    /// The directory name of the dimension in the output.
    pub fn slug(&self) -> &'static str {
        match self {
            Dimension::Importance => "imp",
            Dimension::Performance => "perf",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BuildOptions {
    pub config_path: PathBuf,
    pub importance: Option<PathBuf>,
    pub performance: Option<PathBuf>,
    pub out_dir: PathBuf,
    /// The entry to read when a source is a zip archive.
    pub archive_entry: String,
    pub seed: Option<String>,
    pub characteristics: Option<Vec<String>>,
    pub breakpoints: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BuildSummary {
    pub units_built: usize,
    pub units_failed: usize,
    pub sources_skipped: usize,
    pub characteristics_skipped: usize,
    /// Segments (and unsplit packings) where the dots overlap.
    pub overlapping_packings: usize,
}

/// Builds the coordinates of every characteristic of every source, at every breakpoint.
///
/// A source or a characteristic that cannot be read is skipped with a warning. Only the
/// visualization config and the output directory can make the whole build fail.
pub fn run_build(options: &BuildOptions) -> BuildResult<BuildSummary> {
    let viz = read_viz_config(&options.config_path)?;
    info!(
        "config: sample size: {} breakpoints: {:?}",
        viz.sample_size,
        viz.layouts.iter().map(|l| &l.breakpoint).collect::<Vec<_>>()
    );

    let layouts: Vec<&Layout> = viz
        .layouts
        .iter()
        .filter(|l| match &options.breakpoints {
            Some(bps) => bps.contains(&l.breakpoint),
            None => true,
        })
        .collect();
    if layouts.is_empty() {
        whatever!(
            "No layout matches the requested breakpoints {:?}",
            options.breakpoints
        )
    }

    let sources: Vec<(Dimension, &PathBuf)> = [
        (Dimension::Importance, options.importance.as_ref()),
        (Dimension::Performance, options.performance.as_ref()),
    ]
    .into_iter()
    .filter_map(|(dim, p)| p.map(|p| (dim, p)))
    .collect();
    if sources.is_empty() {
        whatever!("At least one of the importance or performance metadata is required")
    }

    fs::create_dir_all(&options.out_dir).context(WritingOutputSnafu {
        path: options.out_dir.display().to_string(),
    })?;

    let mut manifest = Manifest::default();
    let mut summary = BuildSummary::default();
    for (dim, path) in sources {
        info!("Reading {} metadata from {}", dim.slug(), path.display());
        if let Err(e) = build_dimension(
            dim,
            path,
            &viz,
            &layouts,
            options,
            &mut manifest,
            &mut summary,
        ) {
            warn!(
                "Skipping {} metadata {}: {}",
                dim.slug(),
                path.display(),
                error_chain(&e)
            );
            summary.sources_skipped += 1;
        }
    }

    let manifest_path = write_manifest(&options.out_dir, &manifest)?;
    info!("Manifest written to {}", manifest_path.display());
    info!(
        "Build finished: {} units built, {} units failed, {} sources skipped, {} characteristics skipped, {} overlapping packings",
        summary.units_built,
        summary.units_failed,
        summary.sources_skipped,
        summary.characteristics_skipped,
        summary.overlapping_packings
    );
    Ok(summary)
}

fn build_dimension(
    dim: Dimension,
    path: &Path,
    viz: &VizConfig,
    layouts: &[&Layout],
    options: &BuildOptions,
    manifest: &mut Manifest,
    summary: &mut BuildSummary,
) -> BuildResult<()> {
    let bytes = read_source(path, &options.archive_entry)?;
    let meta = parse_meta(&bytes, path)?;
    let vars = meta.group_vars()?;
    let groups = &meta.response.response_groups;
    let mapping = groups
        .collapsed_index_map()
        .context(InconsistentGroupsSnafu)?;
    manifest.dimensions.insert(
        dim.slug().to_string(),
        DimensionInfo {
            expanded: groups.expanded.iter().map(|g| g.0.clone()).collect(),
            collapsed: groups.collapsed.iter().map(|g| g.0.clone()).collect(),
            response_group_mapping: mapping,
            wave_labels: vars.wave.dates.clone(),
        },
    );

    let num_parties = vars.pid3.response_groups.len();
    for raw in meta.characteristics() {
        let characteristic = match decode_characteristic(raw) {
            Ok(c) => c,
            Err(e) => {
                warn!("Skipping a {} characteristic: {}", dim.slug(), error_chain(&e));
                summary.characteristics_skipped += 1;
                continue;
            }
        };
        if let Some(names) = &options.characteristics {
            if !names.contains(&characteristic.characteristic_name) {
                debug!(
                    "build_dimension: {} not requested",
                    characteristic.characteristic_name
                );
                continue;
            }
        }
        for layout in layouts.iter() {
            match build_unit(
                dim,
                &characteristic,
                layout,
                num_parties,
                viz.sample_size,
                options,
            ) {
                Ok(overlapping) => {
                    summary.units_built += 1;
                    summary.overlapping_packings += overlapping;
                    manifest.add_unit(dim, &characteristic.characteristic_name, &layout.breakpoint);
                }
                Err(e) => {
                    warn!(
                        "Skipping {}/{}/{}: {}",
                        dim.slug(),
                        characteristic.characteristic_name,
                        layout.breakpoint,
                        error_chain(&e)
                    );
                    summary.units_failed += 1;
                }
            }
        }
    }
    Ok(())
}

// Builds and writes one (dimension, characteristic, breakpoint) unit. Returns the number of
// packings where the dots overlap.
fn build_unit(
    dim: Dimension,
    characteristic: &Characteristic,
    layout: &Layout,
    num_parties: usize,
    sample_size: u64,
    options: &BuildOptions,
) -> BuildResult<usize> {
    let name = characteristic.characteristic_name.as_str();
    let unit = format!("{}/{}/{}", dim.slug(), name, layout.breakpoint);
    let mut rng: StdRng = match &options.seed {
        Some(seed) => unit_rng(seed, &[dim.slug(), name, layout.breakpoint.as_str()]),
        None => StdRng::from_entropy(),
    };

    let mut builder = Builder::new(layout, sample_size)
        .and_then(|b| b.waves(&characteristic.in_waves))
        .and_then(|b| b.parties(num_parties))
        .context(LayoutSnafu { unit: unit.clone() })?;
    for split in characteristic.splits.iter() {
        builder
            .add_split(split)
            .context(LayoutSnafu { unit: unit.clone() })?;
    }
    let data = builder
        .build(&mut rng)
        .context(LayoutSnafu { unit: unit.clone() })?;

    let path = unit_path(&options.out_dir, dim, name, &layout.breakpoint);
    write_gz_json(&path, &data)?;
    debug!("build_unit: {} written to {}", unit, path.display());
    Ok(data.overflow_count())
}
