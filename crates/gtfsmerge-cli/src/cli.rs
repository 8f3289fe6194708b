//! Clap CLI definition: the root struct and shared argument types.
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use gtfsmerge_core::{DetectionMode, MergeOptions};

/// Detection mode argument, mirrored onto [`DetectionMode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DetectArg {
    /// Never fold duplicates; rename colliding identifiers (default).
    None,
    /// Fold entities whose primary keys match.
    Identity,
    /// Fold entities the similarity scorers rate above the threshold.
    Fuzzy,
}

impl DetectArg {
    /// The engine-side mode this argument stands for.
    pub fn to_mode(self) -> DetectionMode {
        match self {
            Self::None => DetectionMode::None,
            Self::Identity => DetectionMode::Identity,
            Self::Fuzzy => DetectionMode::Fuzzy,
        }
    }
}

/// Output format for the merge summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain-text summary on stderr (default).
    Human,
    /// A single JSON object on stdout.
    Json,
}

/// One `FILE=MODE` detection override.
#[derive(Clone, Debug)]
pub struct DetectOverride {
    /// The feed file the override applies to (e.g. `stops.txt`).
    pub file: String,
    /// The mode to use for that file.
    pub mode: DetectArg,
}

/// One `FILE=THRESHOLD` fuzzy-threshold override.
#[derive(Clone, Debug)]
pub struct ThresholdOverride {
    /// The feed file the override applies to.
    pub file: String,
    /// The similarity threshold in `[0, 1]`.
    pub threshold: f64,
}

fn parse_detect_override(s: &str) -> Result<DetectOverride, String> {
    let Some((file, mode)) = s.split_once('=') else {
        return Err(format!("expected FILE=MODE, got {s:?}"));
    };
    let mode = DetectArg::from_str(mode, true)?;
    Ok(DetectOverride {
        file: file.to_owned(),
        mode,
    })
}

fn parse_threshold_override(s: &str) -> Result<ThresholdOverride, String> {
    let Some((file, threshold)) = s.split_once('=') else {
        return Err(format!("expected FILE=THRESHOLD, got {s:?}"));
    };
    let threshold: f64 = threshold
        .parse()
        .map_err(|_| format!("threshold {threshold:?} is not a number"))?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("threshold {threshold} must be within [0, 1]"));
    }
    Ok(ThresholdOverride {
        file: file.to_owned(),
        threshold,
    })
}

/// Merge two or more GTFS feeds into one consolidated feed.
///
/// Inputs and the output are feed containers: directories of GTFS text
/// files, or `.zip` archives of them. The last path is the output; it is
/// written as an archive when it ends in `.zip`, as a directory otherwise.
#[derive(Debug, Parser)]
#[command(name = "gtfsmerge", version)]
pub struct Cli {
    /// Two or more input feeds followed by the output path.
    #[arg(value_name = "PATH", num_args = 3.., required = true)]
    pub paths: Vec<PathBuf>,

    /// Duplicate-detection mode applied to every file without an override.
    #[arg(long, value_enum, default_value = "none")]
    pub detect: DetectArg,

    /// Per-file detection override (e.g. `--detect-file stops.txt=fuzzy`).
    /// Repeatable.
    #[arg(long = "detect-file", value_name = "FILE=MODE", value_parser = parse_detect_override)]
    pub detect_file: Vec<DetectOverride>,

    /// Per-file fuzzy threshold (e.g. `--threshold stops.txt=0.8`).
    /// Repeatable.
    #[arg(long, value_name = "FILE=THRESHOLD", value_parser = parse_threshold_override)]
    pub threshold: Vec<ThresholdOverride>,

    /// Log every duplicate decision and rename to stderr.
    #[arg(long)]
    pub debug: bool,

    /// Merge summary format.
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Merge and report, but write nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Splits the positional paths into `(inputs, output)`.
    ///
    /// Clap already enforces at least three paths; `None` can only happen
    /// when a `Cli` is constructed by hand with too few.
    pub fn split_paths(&self) -> Option<(&[PathBuf], &PathBuf)> {
        let (last, inputs) = self.paths.split_last()?;
        if inputs.len() < 2 {
            return None;
        }
        Some((inputs, last))
    }

    /// Builds the engine options this invocation asks for.
    pub fn merge_options(&self) -> MergeOptions {
        let mut options = MergeOptions {
            default_detection: self.detect.to_mode(),
            debug: self.debug,
            ..MergeOptions::default()
        };
        for item in &self.detect_file {
            options
                .per_file_detection
                .insert(item.file.clone(), item.mode.to_mode());
        }
        for item in &self.threshold {
            options.thresholds.insert(item.file.clone(), item.threshold);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gtfsmerge").chain(args.iter().copied()))
            .expect("args parse")
    }

    #[test]
    fn minimal_invocation_splits_paths() {
        let cli = parse(&["in1", "in2", "out"]);
        let (inputs, output) = cli.split_paths().expect("three paths");
        assert_eq!(inputs.len(), 2);
        assert_eq!(output, &PathBuf::from("out"));
        assert_eq!(cli.detect, DetectArg::None);
    }

    #[test]
    fn two_paths_are_rejected() {
        let result = Cli::try_parse_from(["gtfsmerge", "in1", "out"]);
        assert!(result.is_err(), "need at least two inputs and an output");
    }

    #[test]
    fn detect_file_override_parses() {
        let cli = parse(&["--detect-file", "stops.txt=fuzzy", "in1", "in2", "out"]);
        let options = cli.merge_options();
        assert_eq!(
            options.mode_for("stops.txt"),
            DetectionMode::Fuzzy,
            "override applies"
        );
        assert_eq!(options.mode_for("routes.txt"), DetectionMode::None);
    }

    #[test]
    fn bad_detect_file_value_is_rejected() {
        let result = Cli::try_parse_from(["gtfsmerge", "--detect-file", "stops.txt", "a", "b", "c"]);
        assert!(result.is_err(), "missing =MODE must fail");
    }

    #[test]
    fn threshold_override_parses_and_is_bounded() {
        let cli = parse(&["--threshold", "stops.txt=0.8", "in1", "in2", "out"]);
        let options = cli.merge_options();
        assert!((options.threshold_for("stops.txt") - 0.8).abs() < f64::EPSILON);

        let result = Cli::try_parse_from(["gtfsmerge", "--threshold", "stops.txt=1.5", "a", "b", "c"]);
        assert!(result.is_err(), "threshold above 1 must fail");
    }

    #[test]
    fn default_detection_flag_applies_everywhere() {
        let cli = parse(&["--detect", "identity", "in1", "in2", "out"]);
        let options = cli.merge_options();
        assert_eq!(options.mode_for("agency.txt"), DetectionMode::Identity);
        assert_eq!(options.mode_for("trips.txt"), DetectionMode::Identity);
    }

    #[test]
    fn dry_run_and_debug_flags() {
        let cli = parse(&["--dry-run", "--debug", "in1", "in2", "out"]);
        assert!(cli.dry_run);
        assert!(cli.debug);
        assert!(cli.merge_options().debug);
    }
}
