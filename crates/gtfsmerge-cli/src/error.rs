/// CLI error types with associated exit codes.
///
/// [`CliError`] is the top-level error type for the `gtfsmerge` binary.
/// Every variant maps to a stable exit code via [`CliError::exit_code`]:
///
/// - Exit code **2** — input failure: an input feed could not be read or
///   parsed, or is not internally consistent. These terminate before any
///   output is produced.
/// - Exit code **1** — merge or output failure: the inputs were fine but the
///   merge could not complete, or the result could not be written.
use std::fmt;
use std::path::PathBuf;

use gtfsmerge_core::merge::MergeError;
use gtfsmerge_core::reader::InputError;
use gtfsmerge_core::writer::OutputError;

// ---------------------------------------------------------------------------
// CliError
// ---------------------------------------------------------------------------

/// All error conditions the `gtfsmerge` CLI can produce.
#[derive(Debug)]
pub enum CliError {
    /// The argument list is structurally wrong (too few paths).
    Usage {
        /// What was wrong.
        detail: String,
    },

    /// An input feed failed to read or parse.
    FeedRead {
        /// The container that failed.
        path: PathBuf,
        /// The reader's error.
        source: InputError,
    },

    /// The merge engine reported a fatal condition.
    Merge {
        /// The engine's error.
        source: MergeError,
    },

    /// The merged feed could not be written.
    FeedWrite {
        /// The writer's error.
        source: OutputError,
    },

    /// Writing a report stream (stdout/stderr) failed.
    Io {
        /// The stream that failed.
        stream: &'static str,
        /// The underlying I/O error message.
        detail: String,
    },
}

impl CliError {
    /// Returns the process exit code for this error.
    ///
    /// Referential errors surface through the merge engine but are input
    /// failures: the offending feed was inconsistent before any merging
    /// happened, so they exit 2 alongside read and parse failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage { .. } | Self::FeedRead { .. } => 2,
            Self::Merge {
                source: MergeError::Referential(_),
            } => 2,
            Self::Merge { .. } | Self::FeedWrite { .. } | Self::Io { .. } => 1,
        }
    }

    /// Returns the human-readable message printed to stderr before exiting.
    pub fn message(&self) -> String {
        match self {
            Self::Usage { detail } => format!("error: {detail}"),
            Self::FeedRead { path, source } => {
                format!("error: reading {}: {source}", path.display())
            }
            Self::Merge { source } => format!("error: merge failed: {source}"),
            Self::FeedWrite { source } => format!("error: writing output: {source}"),
            Self::Io { stream, detail } => format!("error: writing to {stream}: {detail}"),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CliError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
