//! Output types produced by a conversion run, and helpers to persist them.

use crate::config::ConversionMode;
use crate::error::{BatchError, FileError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One produced output unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// The combined label, or the originating file's name.
    pub label: String,
    /// Markdown produced by the transformation service.
    pub markdown: String,
}

impl ConversionResult {
    pub fn new(label: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            markdown: markdown.into(),
        }
    }
}

/// What happened to one pending file during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The file contributed to a result.
    Converted { file: String },
    /// Text extraction failed; the file was left out.
    ExtractionSkipped { file: String, reason: String },
    /// Text was extracted but the transformation failed; the file was left out.
    TransformSkipped { file: String, reason: String },
    /// The run ended before this file was reached or its output was kept.
    Pending { file: String },
}

impl FileOutcome {
    pub fn file(&self) -> &str {
        match self {
            FileOutcome::Converted { file }
            | FileOutcome::ExtractionSkipped { file, .. }
            | FileOutcome::TransformSkipped { file, .. }
            | FileOutcome::Pending { file } => file,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, FileOutcome::Converted { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            FileOutcome::ExtractionSkipped { .. } | FileOutcome::TransformSkipped { .. }
        )
    }

    /// The per-file error, for skipped files.
    pub fn error(&self) -> Option<FileError> {
        match self {
            FileOutcome::ExtractionSkipped { file, reason } => Some(FileError::ExtractionFailed {
                file: file.clone(),
                detail: reason.clone(),
            }),
            FileOutcome::TransformSkipped { file, reason } => Some(FileError::TransformFailed {
                file: file.clone(),
                detail: reason.clone(),
            }),
            _ => None,
        }
    }
}

/// Aggregate counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Pending files when the run started.
    pub total_files: usize,
    /// Files whose text was extracted.
    pub extracted_files: usize,
    /// Files that contributed to a result.
    pub converted_files: usize,
    /// Files skipped at either step.
    pub skipped_files: usize,
    /// Sum of prompt tokens reported by the service.
    pub total_input_tokens: u64,
    /// Sum of completion tokens reported by the service.
    pub total_output_tokens: u64,
    /// Wall-clock time spent extracting text.
    pub extraction_duration_ms: u64,
    /// Wall-clock time spent in the transformation service.
    pub transform_duration_ms: u64,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: ConversionMode,
    /// Results in original file order (exactly one in combined mode).
    pub results: Vec<ConversionResult>,
    /// One entry per pending file, in original order.
    pub outcomes: Vec<FileOutcome>,
    pub stats: RunStats,
}

impl RunReport {
    /// Skipped files as non-fatal errors.
    pub fn file_errors(&self) -> Vec<FileError> {
        self.outcomes.iter().filter_map(FileOutcome::error).collect()
    }
}

/// File name used when writing `result` to disk.
///
/// Combined output becomes `combined.md`; per-file results keep the input
/// file stem (`report.pdf` → `report.md`).
pub fn output_file_name(mode: ConversionMode, result: &ConversionResult) -> String {
    let stem = match mode {
        ConversionMode::Combined => "combined".to_string(),
        ConversionMode::Individual => Path::new(&result.label)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string()),
    };
    format!("{}.md", sanitize_file_stem(&stem))
}

fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Return `name`, or `stem-2.md`, `stem-3.md`, ... when it is already taken.
fn unique_file_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let stem = name.strip_suffix(".md").unwrap_or(&name).to_string();
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}.md");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write every result of `report` as a Markdown file inside `dir`.
///
/// Uses atomic writes (temp file + rename) so an interrupted run never
/// leaves a half-written document behind. Results whose names collide
/// (`report.pdf` and `report.txt`) get a numeric suffix. Returns the written
/// paths in result order.
pub async fn write_results(report: &RunReport, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, BatchError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BatchError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(report.results.len());
    let mut used = HashSet::with_capacity(report.results.len());
    for result in &report.results {
        let name = unique_file_name(output_file_name(report.mode, result), &mut used);
        let path = dir.join(name);
        write_atomic(&path, &result.markdown).await?;
        debug!("Wrote {} ({} bytes)", path.display(), result.markdown.len());
        written.push(path);
    }
    Ok(written)
}

/// Write `contents` to `path` via a temp file + rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), BatchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BatchError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| BatchError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| BatchError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(mode: ConversionMode, results: Vec<ConversionResult>) -> RunReport {
        RunReport {
            mode,
            results,
            outcomes: vec![],
            stats: RunStats::default(),
        }
    }

    #[test]
    fn output_names() {
        let r = ConversionResult::new("Combined Output", "x");
        assert_eq!(output_file_name(ConversionMode::Combined, &r), "combined.md");

        let r = ConversionResult::new("Quarterly Report.pdf", "x");
        assert_eq!(
            output_file_name(ConversionMode::Individual, &r),
            "Quarterly Report.md"
        );

        let r = ConversionResult::new("we|ird?.pdf", "x");
        assert_eq!(output_file_name(ConversionMode::Individual, &r), "we_ird_.md");
    }

    #[test]
    fn outcome_accessors() {
        let o = FileOutcome::TransformSkipped {
            file: "a.pdf".into(),
            reason: "timeout".into(),
        };
        assert_eq!(o.file(), "a.pdf");
        assert!(o.is_skipped());
        assert!(!o.is_converted());
        assert!(matches!(o.error(), Some(FileError::TransformFailed { .. })));
        assert!(FileOutcome::Pending { file: "b".into() }.error().is_none());
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let o = FileOutcome::ExtractionSkipped {
            file: "a.pdf".into(),
            reason: "no text".into(),
        };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["status"], "extraction_skipped");
        assert_eq!(json["file"], "a.pdf");
    }

    #[tokio::test]
    async fn write_results_creates_one_file_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let rep = report(
            ConversionMode::Individual,
            vec![
                ConversionResult::new("a.pdf", "# A\n"),
                ConversionResult::new("b.txt", "# B\n"),
            ],
        );

        let paths = write_results(&rep, dir.path().join("out")).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), "# A\n");
        assert!(paths[1].ends_with("b.md"));
        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn write_results_keeps_results_with_same_stem() {
        let dir = tempfile::tempdir().unwrap();
        let rep = report(
            ConversionMode::Individual,
            vec![
                ConversionResult::new("report.pdf", "# FROM PDF\n"),
                ConversionResult::new("report.txt", "# FROM TXT\n"),
                ConversionResult::new("sub/report.md", "# FROM MD\n"),
            ],
        );

        let paths = write_results(&rep, dir.path()).await.unwrap();

        assert!(paths[0].ends_with("report.md"));
        assert!(paths[1].ends_with("report-2.md"));
        assert!(paths[2].ends_with("report-3.md"));
        assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), "# FROM PDF\n");
        assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), "# FROM TXT\n");
        assert_eq!(std::fs::read_to_string(&paths[2]).unwrap(), "# FROM MD\n");
    }

    #[test]
    fn unique_file_name_skips_taken_suffixes() {
        let mut used: HashSet<String> = ["a.md", "a-2.md"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_file_name("a.md".into(), &mut used), "a-3.md");
        assert_eq!(unique_file_name("b.md".into(), &mut used), "b.md");
    }
}
