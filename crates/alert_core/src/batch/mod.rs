//! Bounded concurrent orchestration over many alert sources.
//!
//! A fixed pool of scoped worker threads pulls source indices from a job channel and pushes
//! results onto a result channel. The calling thread is the single consumer: it owns the
//! aggregate map and drives the observer, so observers never need to be `Sync`.

pub mod sources;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AlertConfig;
use crate::error::{codes, AppError};

pub use sources::{
    analyze_files, analyze_source_file, discover_sources, process_directory, SourceReport,
};

/// Outcome of one source. Serialized as `{"status": "success", "payload": ...}` or
/// `{"status": "error", "code": ..., "message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome<P> {
    Success {
        payload: P,
    },
    Error {
        code: String,
        message: String,
        details: Option<String>,
    },
}

impl<P> JobOutcome<P> {
    pub fn from_error(err: AppError) -> Self {
        JobOutcome::Error {
            code: err.code,
            message: err.message,
            details: err.details,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&P> {
        match self {
            JobOutcome::Success { payload } => Some(payload),
            JobOutcome::Error { .. } => None,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            JobOutcome::Success { .. } => None,
            JobOutcome::Error { code, .. } => Some(code),
        }
    }
}

/// One unit of orchestrated work, written once by the worker that ran it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchJob<P> {
    pub source_path: String,
    #[serde(flatten)]
    pub outcome: JobOutcome<P>,
    /// `None` when the source was never picked up (cancelled batch).
    pub worker_id: Option<usize>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport<P> {
    pub results: BTreeMap<String, BatchJob<P>>,
    pub success_count: usize,
    pub error_count: usize,
    pub elapsed_ms: u64,
}

impl<P> BatchReport<P> {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn get(&self, source: &str) -> Option<&BatchJob<P>> {
        self.results.get(source)
    }
}

/// Progress hooks, called on the orchestrating thread in completion order.
pub trait BatchObserver<P> {
    fn on_job_started(&self, _source: &str) {}
    fn on_job_finished(&self, job: &BatchJob<P>);
}

impl<P, F> BatchObserver<P> for F
where
    F: Fn(&BatchJob<P>),
{
    fn on_job_finished(&self, job: &BatchJob<P>) {
        self(job)
    }
}

/// Observer that only emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl<P> BatchObserver<P> for TracingObserver {
    fn on_job_started(&self, source: &str) {
        tracing::debug!(source, "batch job started");
    }

    fn on_job_finished(&self, job: &BatchJob<P>) {
        match &job.outcome {
            JobOutcome::Success { .. } => {
                tracing::info!(source = %job.source_path, worker = ?job.worker_id, "batch job succeeded")
            }
            JobOutcome::Error { code, message, .. } => {
                tracing::warn!(source = %job.source_path, code = %code, message = %message, "batch job failed")
            }
        }
    }
}

/// Cooperative stop signal. In-flight sources finish; queued ones are reported as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_workers: usize,
    pub cancel: CancelToken,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            cancel: CancelToken::new(),
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

enum WorkerMsg<P> {
    Started(usize),
    Finished(usize, BatchJob<P>),
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn source_key(path: &Path) -> String {
    path.display().to_string()
}

/// Run `work` once per distinct source with at most `max_workers` threads.
///
/// The returned map always holds one entry per distinct source: successes, per-source
/// errors, panics and never-started (cancelled) sources alike.
pub fn run_batch<P, F, O>(
    sources: &[PathBuf],
    options: &BatchOptions,
    work: F,
    observer: &O,
) -> BatchReport<P>
where
    P: Send,
    F: Fn(&Path) -> Result<P, AppError> + Sync,
    O: BatchObserver<P> + ?Sized,
{
    let clock = Instant::now();

    let mut jobs: Vec<(String, &Path)> = Vec::with_capacity(sources.len());
    for path in sources {
        let key = source_key(path);
        if jobs.iter().any(|(k, _)| *k == key) {
            tracing::warn!(source = %key, "duplicate source ignored");
            continue;
        }
        jobs.push((key, path.as_path()));
    }

    let mut results = BTreeMap::new();
    if !jobs.is_empty() {
        let worker_count = options.max_workers.max(1).min(jobs.len());
        tracing::info!(sources = jobs.len(), workers = worker_count, "batch started");

        let (job_tx, job_rx) = unbounded::<usize>();
        for index in 0..jobs.len() {
            // Receivers are alive until the scope below ends.
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<WorkerMsg<P>>();
        let jobs_ref = &jobs;
        let work = &work;

        std::thread::scope(|scope| {
            for worker_id in 0..worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let cancel = options.cancel.clone();
                scope.spawn(move || {
                    while !cancel.is_cancelled() {
                        let Ok(index) = job_rx.recv() else { break };
                        let (key, path) = (&jobs_ref[index].0, jobs_ref[index].1);
                        let _ = result_tx.send(WorkerMsg::Started(index));

                        let started_at = OffsetDateTime::now_utc();
                        let outcome = match catch_unwind(AssertUnwindSafe(|| work(path))) {
                            Ok(Ok(payload)) => JobOutcome::Success { payload },
                            Ok(Err(err)) => JobOutcome::from_error(err),
                            Err(panic) => JobOutcome::from_error(
                                AppError::new(
                                    codes::BATCH_WORKER_PANICKED,
                                    "Worker panicked while processing source",
                                )
                                .with_details(panic_message(panic.as_ref())),
                            ),
                        };
                        let job = BatchJob {
                            source_path: key.clone(),
                            outcome,
                            worker_id: Some(worker_id),
                            started_at,
                            finished_at: OffsetDateTime::now_utc(),
                        };
                        let _ = result_tx.send(WorkerMsg::Finished(index, job));
                    }
                });
            }
            drop(result_tx);

            for msg in result_rx.iter() {
                match msg {
                    WorkerMsg::Started(index) => observer.on_job_started(&jobs[index].0),
                    WorkerMsg::Finished(index, job) => {
                        observer.on_job_finished(&job);
                        results.insert(jobs[index].0.clone(), job);
                    }
                }
            }
        });

        for (key, _) in &jobs {
            if results.contains_key(key) {
                continue;
            }
            let now = OffsetDateTime::now_utc();
            let job = BatchJob {
                source_path: key.clone(),
                outcome: JobOutcome::from_error(AppError::new(
                    codes::BATCH_CANCELLED,
                    "Batch cancelled before this source started",
                )),
                worker_id: None,
                started_at: now,
                finished_at: now,
            };
            observer.on_job_finished(&job);
            results.insert(key.clone(), job);
        }
    }

    let success_count = results.values().filter(|j| j.outcome.is_success()).count();
    let error_count = results.len() - success_count;
    let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        total = results.len(),
        success_count,
        error_count,
        elapsed_ms,
        "batch finished"
    );

    BatchReport {
        results,
        success_count,
        error_count,
        elapsed_ms,
    }
}
