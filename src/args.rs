use clap::Parser;
use std::path::PathBuf;

use crate::build::BuildOptions;

/// Precomputes the dot coordinates of dot-matrix survey charts.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The visualization config in JSON format: the sample size and the layout of
    /// every breakpoint.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path, optional) The importance metadata. It can be a JSON file, a gzipped JSON file
    /// (.gz) or a zip archive (.zip). At least one of --importance and --performance is required.
    #[clap(short, long, value_parser)]
    pub importance: Option<String>,

    /// (file path, optional) The performance metadata, in the same formats as --importance.
    #[clap(short, long, value_parser)]
    pub performance: Option<String>,

    /// (directory) Where the coordinate files and the manifest are written.
    #[clap(short, long, value_parser)]
    pub out: String,

    /// (default meta.json) The entry to read when a metadata source is a zip archive.
    #[clap(long, value_parser, default_value = "meta.json")]
    pub archive_entry: String,

    /// (string, optional) If specified, the positions of the dots are reproducible: the same
    /// seed always gives the same output.
    #[clap(long, value_parser)]
    pub seed: Option<String>,

    /// (repeatable, optional) Only build the given characteristics.
    #[clap(long, value_parser)]
    pub characteristic: Option<Vec<String>>,

    /// (repeatable, optional) Only build the given breakpoints.
    #[clap(long, value_parser)]
    pub breakpoint: Option<Vec<String>>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

impl Args {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            config_path: PathBuf::from(&self.config),
            importance: self.importance.as_ref().map(PathBuf::from),
            performance: self.performance.as_ref().map(PathBuf::from),
            out_dir: PathBuf::from(&self.out),
            archive_entry: self.archive_entry.clone(),
            seed: self.seed.clone(),
            characteristics: self.characteristic.clone(),
            breakpoints: self.breakpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_filters() {
        let args = Args::try_parse_from([
            "dotmatrix",
            "--config",
            "viz-config.json",
            "-i",
            "meta-imp.zip",
            "--out",
            "public/data",
            "--characteristic",
            "courts",
            "--characteristic",
            "free_elections",
            "--breakpoint",
            "small",
            "--seed",
            "2024",
        ])
        .unwrap();
        let options = args.build_options();
        assert_eq!(options.importance, Some(PathBuf::from("meta-imp.zip")));
        assert_eq!(options.performance, None);
        assert_eq!(options.archive_entry, "meta.json");
        assert_eq!(
            options.characteristics,
            Some(vec!["courts".to_string(), "free_elections".to_string()])
        );
        assert_eq!(options.breakpoints, Some(vec!["small".to_string()]));
        assert_eq!(options.seed, Some("2024".to_string()));
        assert!(!args.verbose);
    }

    #[test]
    fn config_and_out_are_required() {
        assert!(Args::try_parse_from(["dotmatrix", "--out", "x"]).is_err());
        assert!(Args::try_parse_from(["dotmatrix", "--config", "x"]).is_err());
    }
}
