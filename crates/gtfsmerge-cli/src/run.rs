//! Implementation of the merge command: read every input, run the engine,
//! report the summary, write the output.
//!
//! Diagnostics and the human summary go to stderr; only the `--format json`
//! summary uses stdout. Exit codes:
//! - 0 = success
//! - 1 = merge or write failure
//! - 2 = read/parse/referential failure on any input feed
use std::io::Write as _;

use gtfsmerge_core::merge::MergeSummary;
use gtfsmerge_core::{merge_feeds, read_feed, write_feed};

use crate::cli::{Cli, OutputFormat};
use crate::error::CliError;

/// Runs the merge described by the parsed CLI arguments.
///
/// # Errors
///
/// Returns a [`CliError`] carrying the first failure encountered; the caller
/// prints its message and exits with its code.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let Some((inputs, output)) = cli.split_paths() else {
        return Err(CliError::Usage {
            detail: "expected at least two input feeds and an output path".to_owned(),
        });
    };

    let mut feeds = Vec::with_capacity(inputs.len());
    for path in inputs {
        let feed = read_feed(path).map_err(|source| CliError::FeedRead {
            path: path.clone(),
            source,
        })?;
        feeds.push(feed);
    }

    let options = cli.merge_options();
    let merged = merge_feeds(&feeds, &options).map_err(|source| CliError::Merge { source })?;

    match cli.format {
        OutputFormat::Human => report_human(&merged.summary)?,
        OutputFormat::Json => report_json(&merged.summary)?,
    }

    if !cli.dry_run {
        write_feed(&merged.feed, output).map_err(|source| CliError::FeedWrite { source })?;
    }

    Ok(())
}

/// Writes the plain-text summary to stderr: one line per file with
/// activity, then any field conflicts.
fn report_human(summary: &MergeSummary) -> Result<(), CliError> {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    let emit = |out: &mut dyn std::io::Write, line: String| -> Result<(), CliError> {
        writeln!(out, "{line}").map_err(|e| CliError::Io {
            stream: "stderr",
            detail: e.to_string(),
        })
    };

    emit(&mut out, format!("merged {} feeds", summary.feeds_merged))?;
    for stage in &summary.stages {
        if stage.inserted == 0 && stage.duplicates == 0 {
            continue;
        }
        emit(
            &mut out,
            format!(
                "  {}: {} added ({} renamed), {} duplicates folded",
                stage.file, stage.inserted, stage.renamed, stage.duplicates
            ),
        )?;
    }
    for conflict in &summary.conflicts {
        emit(&mut out, format!("warning: conflict: {conflict}"))?;
    }
    if !summary.conflicts.is_empty() {
        emit(
            &mut out,
            format!(
                "{} conflict(s) recorded; earlier feeds' values were kept",
                summary.conflicts.len()
            ),
        )?;
    }
    Ok(())
}

/// Writes a single JSON summary object to stdout.
fn report_json(summary: &MergeSummary) -> Result<(), CliError> {
    let stages: Vec<serde_json::Value> = summary
        .stages
        .iter()
        .map(|s| {
            serde_json::json!({
                "file": s.file,
                "inserted": s.inserted,
                "renamed": s.renamed,
                "duplicates": s.duplicates,
            })
        })
        .collect();
    let conflicts: Vec<serde_json::Value> = summary
        .conflicts
        .iter()
        .map(|c| {
            serde_json::json!({
                "file": c.file,
                "entity": c.entity,
                "field": c.field,
                "kept": c.kept,
                "discarded": c.discarded,
            })
        })
        .collect();
    let value = serde_json::json!({
        "feeds_merged": summary.feeds_merged,
        "stages": stages,
        "conflicts": conflicts,
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{value}").map_err(|e| CliError::Io {
        stream: "stdout",
        detail: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
