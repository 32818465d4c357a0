//! Conversion session: the pending file set, the run state and the latest
//! results, owned in one place.
//!
//! Everything a presentation layer renders lives in a [`SessionSnapshot`]
//! published through a `tokio::sync::watch` channel. Every mutation goes
//! through `send_modify`, so observers never see a torn state (for example
//! a cleared file list next to stale results).
//!
//! ```rust,no_run
//! use edgequake_pdf_batch::{BatchConfig, ConversionMode, ConversionSession, PendingFile};
//!
//! # async fn demo() -> Result<(), edgequake_pdf_batch::BatchError> {
//! let mut session = ConversionSession::from_config(BatchConfig::default())?;
//! let mut view = session.subscribe();
//! tokio::spawn(async move {
//!     while view.changed().await.is_ok() {
//!         let snap = view.borrow().clone();
//!         eprintln!("{} {}", snap.run.in_progress, snap.run.status);
//!     }
//! });
//!
//! session.add_files([PendingFile::new("notes.txt", b"hello".to_vec())]);
//! let report = session.run(ConversionMode::Combined).await?;
//! println!("{}", report.results[0].markdown);
//! # Ok(())
//! # }
//! ```

use crate::config::{BatchConfig, ConversionMode};
use crate::error::BatchError;
use crate::file_set::{FileSet, PendingFile};
use crate::orchestrator::{Orchestrator, RunLedger};
use crate::output::{ConversionResult, FileOutcome, RunReport};
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Status shown between the start of a run and the first stage message.
pub const STARTING_STATUS: &str = "Starting extraction...";

/// Whether a run is active, what it is doing, and how the last one failed.
///
/// `status` is empty whenever `in_progress` is false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub in_progress: bool,
    pub status: String,
    /// User-facing message of the last failed run, if any.
    pub error: Option<String>,
}

/// Name and size of a pending file, without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub name: String,
    pub size: usize,
}

/// Everything a presentation layer needs to render the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub files: Vec<FileSummary>,
    pub run: RunState,
    /// Results of the latest run. Grows during an individual-mode run.
    pub results: Vec<ConversionResult>,
    /// Per-file outcomes of the latest run, successful or not.
    pub outcomes: Vec<FileOutcome>,
}

type StateTx = Arc<watch::Sender<SessionSnapshot>>;

/// Owns the pending files and drives runs through an [`Orchestrator`].
pub struct ConversionSession {
    files: FileSet,
    orchestrator: Orchestrator,
    state: StateTx,
}

impl std::fmt::Debug for ConversionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionSession")
            .field("files", &self.files)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ConversionSession {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self {
            files: FileSet::new(),
            orchestrator,
            state: Arc::new(tx),
        }
    }

    /// Session with the default extractor and an LLM transformer.
    pub fn from_config(config: BatchConfig) -> Result<Self, BatchError> {
        Ok(Self::new(Orchestrator::from_config(config)?))
    }

    /// Receive every state change. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn run_state(&self) -> RunState {
        self.state.borrow().run.clone()
    }

    pub fn results(&self) -> Vec<ConversionResult> {
        self.state.borrow().results.clone()
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    /// Append files not already pending. Drops any previous results and
    /// error. Returns how many files were added.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = PendingFile>) -> usize {
        let added = self.files.add(files);
        debug!("Added {} files ({} pending)", added, self.files.len());
        let summaries = summarise(&self.files);
        self.state.send_modify(|s| {
            s.files = summaries;
            s.results.clear();
            s.outcomes.clear();
            s.run.error = None;
        });
        added
    }

    /// Remove the pending file called `name`. Results are left alone.
    pub fn remove_file(&mut self, name: &str) -> Option<PendingFile> {
        let removed = self.files.remove(name);
        if removed.is_some() {
            let summaries = summarise(&self.files);
            self.state.send_modify(|s| s.files = summaries);
        }
        removed
    }

    /// Drop every pending file, every result and the error in one step.
    pub fn clear(&mut self) {
        self.files.clear();
        self.state.send_modify(|s| {
            s.files.clear();
            s.results.clear();
            s.outcomes.clear();
            s.run.error = None;
        });
    }

    /// Convert every pending file.
    ///
    /// On success the results replace the previous ones. On failure the
    /// results are empty and `run.error` holds the user-facing message.
    /// If the returned future is dropped mid-run, `in_progress` is still
    /// reset. Runs cannot overlap: `run` borrows the session mutably.
    pub async fn run(&mut self, mode: ConversionMode) -> Result<RunReport, BatchError> {
        if self.files.is_empty() {
            let err = BatchError::NoFilesSelected;
            let message = err.user_message();
            self.state.send_modify(|s| {
                s.results.clear();
                s.outcomes.clear();
                s.run.error = Some(message);
            });
            return Err(err);
        }

        info!("Session run: {} files, {} mode", self.files.len(), mode);
        self.state.send_modify(|s| {
            s.results.clear();
            s.outcomes.clear();
            s.run = RunState {
                in_progress: true,
                status: STARTING_STATUS.to_string(),
                error: None,
            };
        });
        let _guard = RunGuard {
            state: Arc::clone(&self.state),
        };

        let publisher = StatePublisher {
            state: Arc::clone(&self.state),
            forward: self.orchestrator.config().progress_callback.clone(),
        };
        let mut ledger = RunLedger::new(self.files.as_slice());
        let outcome = self
            .orchestrator
            .execute(self.files.as_slice(), mode, &publisher, &mut ledger)
            .await;

        match outcome {
            Ok(results) => {
                let published = results.clone();
                let outcomes = ledger.outcomes.clone();
                self.state.send_modify(|s| {
                    s.results = published;
                    s.outcomes = outcomes;
                });
                Ok(RunReport {
                    mode,
                    results,
                    outcomes: ledger.outcomes,
                    stats: ledger.stats,
                })
            }
            Err(err) => {
                let message = err.user_message();
                self.state.send_modify(|s| {
                    s.results.clear();
                    s.outcomes = ledger.outcomes;
                    s.run.error = Some(message);
                });
                Err(err)
            }
        }
    }
}

fn summarise(files: &FileSet) -> Vec<FileSummary> {
    files
        .iter()
        .map(|f| FileSummary {
            name: f.name().to_string(),
            size: f.size(),
        })
        .collect()
}

/// Resets `in_progress` and `status` when a run ends, however it ends.
struct RunGuard {
    state: StateTx,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            s.run.in_progress = false;
            s.run.status.clear();
        });
    }
}

/// Mirrors orchestrator progress into the published state, then forwards
/// it to the user's callback.
struct StatePublisher {
    state: StateTx,
    forward: Option<ProgressCallback>,
}

impl ConversionProgressCallback for StatePublisher {
    fn on_run_start(&self, total_files: usize, mode: ConversionMode) {
        if let Some(cb) = &self.forward {
            cb.on_run_start(total_files, mode);
        }
    }

    fn on_status(&self, status: String) {
        self.state.send_modify(|s| s.run.status = status.clone());
        if let Some(cb) = &self.forward {
            cb.on_status(status);
        }
    }

    fn on_file_extracted(&self, name: String, index: usize, total: usize, chars: usize) {
        if let Some(cb) = &self.forward {
            cb.on_file_extracted(name, index, total, chars);
        }
    }

    fn on_file_skipped(&self, name: String, reason: String) {
        if let Some(cb) = &self.forward {
            cb.on_file_skipped(name, reason);
        }
    }

    fn on_result(&self, result: ConversionResult) {
        self.state.send_modify(|s| s.results.push(result.clone()));
        if let Some(cb) = &self.forward {
            cb.on_result(result);
        }
    }

    fn on_run_complete(&self, converted: usize, total_files: usize) {
        if let Some(cb) = &self.forward {
            cb.on_run_complete(converted, total_files);
        }
    }
}
