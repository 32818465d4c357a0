//! One-call conversion entry points.
//!
//! These wrap [`Orchestrator`] for callers that have paths, URLs or bytes
//! and want a [`RunReport`] back, without managing a
//! [`crate::session::ConversionSession`].

use crate::config::{BatchConfig, ConversionMode};
use crate::error::BatchError;
use crate::file_set::{FileSet, PendingFile};
use crate::orchestrator::Orchestrator;
use crate::output::{write_results, RunReport};
use crate::pipeline::input;
use std::path::{Path, PathBuf};
use tracing::info;

/// Convert local files and/or URLs to Markdown.
///
/// Inputs are loaded in order; duplicate names keep the first occurrence.
/// An input that cannot be loaded is skipped with a warning.
///
/// # Errors
/// Fails when no input can be loaded (with that input's error), when no
/// provider can be resolved, or when the run itself fails (see
/// [`BatchError`]). Skipped files are not errors; inspect `report.outcomes`.
pub async fn convert<I, S>(inputs: I, mode: ConversionMode, config: &BatchConfig) -> Result<RunReport, BatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let loaded = input::load_files(inputs, config.download_timeout_secs)
        .await
        .into_files()?;
    convert_files(loaded, mode, config).await
}

/// Convert files that are already in memory.
pub async fn convert_files(
    files: impl IntoIterator<Item = PendingFile>,
    mode: ConversionMode,
    config: &BatchConfig,
) -> Result<RunReport, BatchError> {
    let mut set = FileSet::new();
    set.add(files);
    if set.is_empty() {
        return Err(BatchError::NoFilesSelected);
    }
    let orchestrator = Orchestrator::from_config(config.clone())?;
    orchestrator.run(set.as_slice(), mode).await
}

/// Convert and write one `.md` per result into `output_dir`.
///
/// Returns the report and the written paths.
pub async fn convert_to_dir<I, S>(
    inputs: I,
    mode: ConversionMode,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<(RunReport, Vec<PathBuf>), BatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let report = convert(inputs, mode, config).await?;
    let written = write_results(&report, output_dir.as_ref()).await?;
    info!(
        "Wrote {} files to {}",
        written.len(),
        output_dir.as_ref().display()
    );
    Ok((report, written))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync<I, S>(inputs: I, mode: ConversionMode, config: &BatchConfig) -> Result<RunReport, BatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(inputs, mode, config))
}
