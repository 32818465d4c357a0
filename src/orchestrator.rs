//! The conversion orchestrator: drives extraction and transformation over
//! every pending file in one of two modes.
//!
//! ## Combined
//!
//! ```text
//! files ──▶ extract (concurrent, order-preserving) ──▶ drop failures
//!       ──▶ join with separator ──▶ transform once ──▶ 1 result
//! ```
//!
//! All-or-nothing: either exactly one combined result, or a fatal error.
//! Files that fail extraction are skipped as long as at least one survives.
//!
//! ## Individual
//!
//! ```text
//! for each file, in order:  extract ──▶ transform ──▶ append result
//! ```
//!
//! Strictly sequential, so the transformation service sees at most one
//! request at a time and status messages count up deterministically. A file
//! that fails at either step is recorded as skipped and the loop moves on.
//! A run where every file was skipped is an error, the same as in combined
//! mode.

use crate::config::{BatchConfig, ConversionMode};
use crate::error::BatchError;
use crate::file_set::PendingFile;
use crate::output::{ConversionResult, FileOutcome, RunReport, RunStats};
use crate::pipeline::extract::{AutoExtractor, TextExtractor};
use crate::pipeline::transform::{LlmTransformer, Markup, MarkupTransformer};
use crate::progress::{ConversionProgressCallback, NoopProgressCallback};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-run bookkeeping that survives a failed run.
///
/// The session keeps the outcomes of failed runs too, so a UI can show
/// which files were skipped even when no result exists.
#[derive(Debug, Clone, Default)]
pub struct RunLedger {
    pub outcomes: Vec<FileOutcome>,
    pub stats: RunStats,
}

impl RunLedger {
    /// A ledger with every file marked [`FileOutcome::Pending`].
    pub fn new(files: &[PendingFile]) -> Self {
        Self {
            outcomes: files
                .iter()
                .map(|f| FileOutcome::Pending {
                    file: f.name().to_string(),
                })
                .collect(),
            stats: RunStats {
                total_files: files.len(),
                ..Default::default()
            },
        }
    }

    fn record(&mut self, index: usize, outcome: FileOutcome) {
        if let Some(slot) = self.outcomes.get_mut(index) {
            *slot = outcome;
        }
    }

    fn add_tokens(&mut self, markup: &Markup) {
        self.stats.total_input_tokens += markup.input_tokens as u64;
        self.stats.total_output_tokens += markup.output_tokens as u64;
    }

    fn finalize_counts(&mut self) {
        self.stats.converted_files = self.outcomes.iter().filter(|o| o.is_converted()).count();
        self.stats.skipped_files = self.outcomes.iter().filter(|o| o.is_skipped()).count();
    }
}

/// Coordinates a [`TextExtractor`] and a [`MarkupTransformer`] over a batch.
#[derive(Clone)]
pub struct Orchestrator {
    extractor: Arc<dyn TextExtractor>,
    transformer: Arc<dyn MarkupTransformer>,
    config: BatchConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        transformer: Arc<dyn MarkupTransformer>,
        config: BatchConfig,
    ) -> Self {
        Self {
            extractor,
            transformer,
            config,
        }
    }

    /// Orchestrator with the default extractor ([`AutoExtractor`]) and an
    /// LLM transformer resolved from `config` / the environment.
    pub fn from_config(config: BatchConfig) -> Result<Self, BatchError> {
        let extractor = Arc::new(AutoExtractor::new(config.password.clone()));
        let transformer = Arc::new(LlmTransformer::from_config(&config)?);
        Ok(Self::new(extractor, transformer, config))
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run a conversion, reporting to the configured progress callback.
    pub async fn run(&self, files: &[PendingFile], mode: ConversionMode) -> Result<RunReport, BatchError> {
        match self.config.progress_callback.clone() {
            Some(cb) => self.run_with_progress(files, mode, cb.as_ref()).await,
            None => self.run_with_progress(files, mode, &NoopProgressCallback).await,
        }
    }

    /// Run a conversion, reporting to `progress`.
    pub async fn run_with_progress(
        &self,
        files: &[PendingFile],
        mode: ConversionMode,
        progress: &dyn ConversionProgressCallback,
    ) -> Result<RunReport, BatchError> {
        let mut ledger = RunLedger::new(files);
        let results = self.execute(files, mode, progress, &mut ledger).await?;
        Ok(RunReport {
            mode,
            results,
            outcomes: ledger.outcomes,
            stats: ledger.stats,
        })
    }

    /// Run a conversion, filling `ledger` whether or not the run succeeds.
    pub async fn execute(
        &self,
        files: &[PendingFile],
        mode: ConversionMode,
        progress: &dyn ConversionProgressCallback,
        ledger: &mut RunLedger,
    ) -> Result<Vec<ConversionResult>, BatchError> {
        if files.is_empty() {
            return Err(BatchError::NoFilesSelected);
        }

        let start = Instant::now();
        info!("Starting {} conversion of {} files", mode, files.len());
        progress.on_run_start(files.len(), mode);

        let outcome = match mode {
            ConversionMode::Combined => self.run_combined(files, progress, ledger).await,
            ConversionMode::Individual => self.run_individual(files, progress, ledger).await,
        };

        ledger.finalize_counts();
        ledger.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        progress.on_run_complete(ledger.stats.converted_files, files.len());

        match &outcome {
            Ok(results) => info!(
                "Conversion complete: {} results, {}/{} files converted, {}ms",
                results.len(),
                ledger.stats.converted_files,
                files.len(),
                ledger.stats.total_duration_ms
            ),
            Err(e) => warn!("Conversion failed after {}ms: {}", ledger.stats.total_duration_ms, e),
        }
        outcome
    }

    async fn run_combined(
        &self,
        files: &[PendingFile],
        progress: &dyn ConversionProgressCallback,
        ledger: &mut RunLedger,
    ) -> Result<Vec<ConversionResult>, BatchError> {
        let total = files.len();
        progress.on_status(format!("Extracting text from {} files...", total));

        // `buffered` (not `buffer_unordered`) yields in input order, whatever
        // order the extractions complete in.
        let extract_start = Instant::now();
        let extracted: Vec<_> = stream::iter(files.iter().enumerate().map(|(idx, file)| {
            let extractor = Arc::clone(&self.extractor);
            async move {
                let result = extractor.extract(file).await;
                if let Ok(ref text) = result {
                    progress.on_file_extracted(
                        file.name().to_string(),
                        idx + 1,
                        total,
                        text.chars().count(),
                    );
                }
                result
            }
        }))
        .buffered(self.config.concurrency.max(1))
        .collect()
        .await;
        ledger.stats.extraction_duration_ms = extract_start.elapsed().as_millis() as u64;

        let mut survivors: Vec<(usize, &str, String)> = Vec::with_capacity(total);
        for (idx, (file, result)) in files.iter().zip(extracted).enumerate() {
            match result {
                Ok(text) => survivors.push((idx, file.name(), text)),
                Err(e) => {
                    warn!("{}: skipped, extraction failed: {}", file.name(), e);
                    progress.on_file_skipped(file.name().to_string(), e.to_string());
                    ledger.record(
                        idx,
                        FileOutcome::ExtractionSkipped {
                            file: file.name().to_string(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
        ledger.stats.extracted_files = survivors.len();

        if survivors.is_empty() {
            return Err(BatchError::NothingExtracted);
        }

        let combined = self
            .config
            .separator
            .join(survivors.iter().map(|(_, name, text)| (*name, text.as_str())));
        debug!(
            "Combined {} documents into {} chars",
            survivors.len(),
            combined.len()
        );

        progress.on_status(format!(
            "Converting combined text from {} files...",
            survivors.len()
        ));
        let transform_start = Instant::now();
        let markup = self.transformer.transform(&combined).await;
        ledger.stats.transform_duration_ms = transform_start.elapsed().as_millis() as u64;

        let markup = markup.map_err(|e| BatchError::TransformFailed {
            message: e.to_string(),
        })?;
        ledger.add_tokens(&markup);

        for (idx, name, _) in &survivors {
            ledger.record(
                *idx,
                FileOutcome::Converted {
                    file: name.to_string(),
                },
            );
        }

        let result = ConversionResult::new(self.config.combined_label.clone(), markup.content);
        progress.on_result(result.clone());
        Ok(vec![result])
    }

    async fn run_individual(
        &self,
        files: &[PendingFile],
        progress: &dyn ConversionProgressCallback,
        ledger: &mut RunLedger,
    ) -> Result<Vec<ConversionResult>, BatchError> {
        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (idx, file) in files.iter().enumerate() {
            let name = file.name();
            progress.on_status(format!("Converting {} ({}/{})...", name, idx + 1, total));

            let extract_start = Instant::now();
            let extracted = self.extractor.extract(file).await;
            ledger.stats.extraction_duration_ms += extract_start.elapsed().as_millis() as u64;

            let text = match extracted {
                Ok(text) => text,
                Err(e) => {
                    warn!("{}: skipped, extraction failed: {}", name, e);
                    progress.on_file_skipped(name.to_string(), e.to_string());
                    ledger.record(
                        idx,
                        FileOutcome::ExtractionSkipped {
                            file: name.to_string(),
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };
            ledger.stats.extracted_files += 1;
            progress.on_file_extracted(name.to_string(), idx + 1, total, text.chars().count());

            let transform_start = Instant::now();
            let transformed = self.transformer.transform(&text).await;
            ledger.stats.transform_duration_ms += transform_start.elapsed().as_millis() as u64;

            match transformed {
                Ok(markup) => {
                    ledger.add_tokens(&markup);
                    ledger.record(
                        idx,
                        FileOutcome::Converted {
                            file: name.to_string(),
                        },
                    );
                    let result = ConversionResult::new(name, markup.content);
                    progress.on_result(result.clone());
                    results.push(result);
                }
                Err(e) => {
                    warn!("{}: skipped, conversion failed: {}", name, e);
                    progress.on_file_skipped(name.to_string(), e.to_string());
                    ledger.record(
                        idx,
                        FileOutcome::TransformSkipped {
                            file: name.to_string(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        if results.is_empty() {
            let first_error = ledger
                .outcomes
                .iter()
                .find_map(FileOutcome::error)
                .map(|e| e.to_string())
                .unwrap_or_else(|| crate::error::GENERIC_FAILURE_MESSAGE.to_string());
            return Err(BatchError::NothingConverted { total, first_error });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, TransformError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Extractor that returns canned text per file name; unknown names fail.
    /// An optional delay makes early files finish last.
    struct MapExtractor {
        texts: HashMap<String, String>,
        reverse_delay: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MapExtractor {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                texts: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                reverse_delay: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextExtractor for MapExtractor {
        async fn extract(&self, file: &PendingFile) -> Result<String, ExtractError> {
            self.calls.lock().unwrap().push(file.name().to_string());
            if self.reverse_delay {
                let n = file.name().len() as u64;
                tokio::time::sleep(Duration::from_millis(60 / n.max(1))).await;
            }
            self.texts.get(file.name()).cloned().ok_or(ExtractError::NoText)
        }
    }

    /// Transformer that wraps its input, failing for inputs in `fail_on`.
    #[derive(Default)]
    struct EchoTransformer {
        fail_on: Vec<String>,
        error: Option<String>,
        inputs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MarkupTransformer for EchoTransformer {
        async fn transform(&self, text: &str) -> Result<Markup, TransformError> {
            self.inputs.lock().unwrap().push(text.to_string());
            if self.fail_on.iter().any(|f| f == text) {
                return Err(TransformError::Api {
                    message: self.error.clone().unwrap_or_else(|| "service down".into()),
                });
            }
            Ok(Markup {
                content: format!("MD({text})"),
                input_tokens: 10,
                output_tokens: 5,
            })
        }
    }

    fn files(names: &[&str]) -> Vec<PendingFile> {
        names
            .iter()
            .map(|n| PendingFile::new(*n, n.as_bytes().to_vec()))
            .collect()
    }

    fn orchestrator(ex: Arc<MapExtractor>, tr: Arc<EchoTransformer>) -> Orchestrator {
        Orchestrator::new(ex, tr, BatchConfig::default())
    }

    #[tokio::test]
    async fn combined_joins_in_order_and_transforms_once() {
        let ex = Arc::new(MapExtractor::new(&[("a.pdf", "TextA"), ("b.pdf", "TextB")]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(ex, Arc::clone(&tr));

        let report = orch
            .run(&files(&["a.pdf", "b.pdf"]), ConversionMode::Combined)
            .await
            .unwrap();

        assert_eq!(*tr.inputs.lock().unwrap(), vec!["TextA\n\n<hr />\n\nTextB".to_string()]);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].label, "Combined Output");
        assert_eq!(report.results[0].markdown, "MD(TextA\n\n<hr />\n\nTextB)");
        assert!(report.outcomes.iter().all(FileOutcome::is_converted));
        assert_eq!(report.stats.converted_files, 2);
        assert_eq!(report.stats.total_input_tokens, 10);
    }

    #[tokio::test]
    async fn combined_keeps_input_order_when_extraction_finishes_out_of_order() {
        // Shorter names sleep longer, so "a" finishes last.
        let mut ex = MapExtractor::new(&[("a", "1"), ("bb", "2"), ("ccc", "3"), ("dddd", "4")]);
        ex.reverse_delay = true;
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(Arc::new(ex), Arc::clone(&tr));

        orch.run(&files(&["a", "bb", "ccc", "dddd"]), ConversionMode::Combined)
            .await
            .unwrap();

        let sep = "\n\n<hr />\n\n";
        let expected = ["1", "2", "3", "4"].join(sep);
        assert_eq!(tr.inputs.lock().unwrap()[0], expected);
    }

    #[tokio::test]
    async fn combined_skips_failed_extractions() {
        let ex = Arc::new(MapExtractor::new(&[("a.pdf", "TextA"), ("c.pdf", "TextC")]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(ex, Arc::clone(&tr));

        let report = orch
            .run(&files(&["a.pdf", "b.pdf", "c.pdf"]), ConversionMode::Combined)
            .await
            .unwrap();

        assert_eq!(tr.inputs.lock().unwrap()[0], "TextA\n\n<hr />\n\nTextC");
        assert!(matches!(report.outcomes[1], FileOutcome::ExtractionSkipped { .. }));
        assert_eq!(report.stats.extracted_files, 2);
        assert_eq!(report.stats.skipped_files, 1);
        assert_eq!(report.file_errors().len(), 1);
    }

    #[tokio::test]
    async fn combined_with_no_text_never_calls_transformer() {
        let ex = Arc::new(MapExtractor::new(&[]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(ex, Arc::clone(&tr));

        let err = orch
            .run(&files(&["a.pdf", "b.pdf"]), ConversionMode::Combined)
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::NothingExtracted));
        assert_eq!(
            err.user_message(),
            "Could not extract text from any of the provided files."
        );
        assert!(tr.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn combined_transform_failure_is_fatal_with_message() {
        let ex = Arc::new(MapExtractor::new(&[("a.pdf", "TextA")]));
        let tr = Arc::new(EchoTransformer {
            fail_on: vec!["TextA".into()],
            error: Some("quota exceeded".into()),
            ..Default::default()
        });
        let orch = orchestrator(ex, tr);

        let err = orch
            .run(&files(&["a.pdf"]), ConversionMode::Combined)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "quota exceeded");
    }

    #[tokio::test]
    async fn individual_converts_each_file_in_order() {
        let ex = Arc::new(MapExtractor::new(&[("a.pdf", "TextA"), ("b.pdf", "TextB")]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(ex, Arc::clone(&tr));

        let report = orch
            .run(&files(&["a.pdf", "b.pdf"]), ConversionMode::Individual)
            .await
            .unwrap();

        assert_eq!(
            report.results,
            vec![
                ConversionResult::new("a.pdf", "MD(TextA)"),
                ConversionResult::new("b.pdf", "MD(TextB)"),
            ]
        );
        assert_eq!(*tr.inputs.lock().unwrap(), vec!["TextA", "TextB"]);
        assert_eq!(report.stats.total_output_tokens, 10);
    }

    #[tokio::test]
    async fn individual_skips_failures_and_continues() {
        let ex = Arc::new(MapExtractor::new(&[("a.pdf", "TextA"), ("c.pdf", "TextC")]));
        let tr = Arc::new(EchoTransformer {
            fail_on: vec!["TextA".into()],
            ..Default::default()
        });
        let orch = orchestrator(ex, tr);

        let report = orch
            .run(&files(&["a.pdf", "b.pdf", "c.pdf"]), ConversionMode::Individual)
            .await
            .unwrap();

        assert_eq!(report.results, vec![ConversionResult::new("c.pdf", "MD(TextC)")]);
        assert!(matches!(report.outcomes[0], FileOutcome::TransformSkipped { .. }));
        assert!(matches!(report.outcomes[1], FileOutcome::ExtractionSkipped { .. }));
        assert!(report.outcomes[2].is_converted());
    }

    /// Extractor and transformer that append to one shared trace.
    struct Traced {
        trace: Arc<Mutex<Vec<String>>>,
        transforms: Mutex<usize>,
    }

    #[async_trait]
    impl TextExtractor for Traced {
        async fn extract(&self, file: &PendingFile) -> Result<String, ExtractError> {
            self.trace.lock().unwrap().push(format!("extract {}", file.name()));
            Ok(file.name().to_string())
        }
    }

    #[async_trait]
    impl MarkupTransformer for Traced {
        async fn transform(&self, text: &str) -> Result<Markup, TransformError> {
            let first = {
                let mut n = self.transforms.lock().unwrap();
                *n += 1;
                *n == 1
            };
            if first {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            self.trace.lock().unwrap().push(format!("transform {text}"));
            Ok(Markup::new(text))
        }
    }

    #[tokio::test]
    async fn individual_finishes_each_file_before_extracting_the_next() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let traced = Arc::new(Traced {
            trace: Arc::clone(&trace),
            transforms: Mutex::new(0),
        });
        let orch = Orchestrator::new(traced.clone(), traced, BatchConfig::default());

        let report = orch
            .run(&files(&["a", "b"]), ConversionMode::Individual)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["extract a", "transform a", "extract b", "transform b"]
        );
    }

    #[tokio::test]
    async fn individual_with_nothing_converted_is_an_error() {
        let ex = Arc::new(MapExtractor::new(&[]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(ex, Arc::clone(&tr));

        let mut ledger = RunLedger::new(&files(&["a.pdf", "b.pdf"]));
        let err = orch
            .execute(
                &files(&["a.pdf", "b.pdf"]),
                ConversionMode::Individual,
                &NoopProgressCallback,
                &mut ledger,
            )
            .await
            .unwrap_err();

        match err {
            BatchError::NothingConverted { total, first_error } => {
                assert_eq!(total, 2);
                assert!(first_error.starts_with("a.pdf"), "got: {first_error}");
            }
            other => panic!("expected NothingConverted, got {other:?}"),
        }
        assert_eq!(ledger.stats.skipped_files, 2);
        assert!(tr.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_fails_without_io() {
        let ex = Arc::new(MapExtractor::new(&[]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(Arc::clone(&ex), tr);

        let err = orch.run(&[], ConversionMode::Combined).await.unwrap_err();
        assert!(matches!(err, BatchError::NoFilesSelected));
        assert!(ex.calls.lock().unwrap().is_empty());
    }

    #[derive(Default)]
    struct StatusLog(Mutex<Vec<String>>);

    impl ConversionProgressCallback for StatusLog {
        fn on_status(&self, status: String) {
            self.0.lock().unwrap().push(status);
        }
    }

    #[tokio::test]
    async fn individual_status_counts_up() {
        let ex = Arc::new(MapExtractor::new(&[("a.pdf", "A"), ("b.pdf", "B")]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(ex, tr);
        let log = StatusLog::default();

        orch.run_with_progress(&files(&["a.pdf", "b.pdf"]), ConversionMode::Individual, &log)
            .await
            .unwrap();

        assert_eq!(
            *log.0.lock().unwrap(),
            vec!["Converting a.pdf (1/2)...", "Converting b.pdf (2/2)..."]
        );
    }

    #[tokio::test]
    async fn combined_status_names_surviving_count() {
        let ex = Arc::new(MapExtractor::new(&[("a.pdf", "A")]));
        let tr = Arc::new(EchoTransformer::default());
        let orch = orchestrator(ex, tr);
        let log = StatusLog::default();

        orch.run_with_progress(&files(&["a.pdf", "b.pdf"]), ConversionMode::Combined, &log)
            .await
            .unwrap();

        let statuses = log.0.lock().unwrap();
        assert_eq!(statuses.last().unwrap(), "Converting combined text from 1 files...");
    }
}
