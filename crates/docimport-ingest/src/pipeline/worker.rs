//! Workers and per-file job execution
//!
//! Each file is parsed on a blocking thread that streams loader events over a
//! bounded channel to the async side, which applies the hooks, batches the
//! output and writes batches to the sink. The channel holds at most one batch
//! worth of records (with a fixed cap), so a slow sink slows the
//! parser down.

use std::sync::Arc;
use std::time::Instant;

use async_channel::Receiver;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::producer::Job;
use crate::error::{JobError, LoadError};
use crate::hooks::{self, Record};
use crate::loader::open_input;
use crate::result::PartialResult;
use crate::sink::Sink;

/// Upper bound on loader events in flight and on the up-front batch allocation
const MAX_QUEUED_EVENTS: usize = 1024;

/// Pull jobs until the queue is closed and empty, or the run is cancelled.
///
/// Each job runs in its own task, so a panicking hook fails that file only and
/// the worker keeps pulling jobs.
pub(crate) async fn run_worker(
    id: usize,
    jobs: Receiver<Job>,
    results: UnboundedSender<PartialResult>,
    sink: Arc<dyn Sink>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "Worker started");
    let mut completed = 0u64;

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Ok(job) => job,
                Err(_) => break,
            },
        };

        let (source, file, collection) = (job.source.index, job.file.clone(), job.collection.clone());
        let result = match tokio::spawn(execute(job, Arc::clone(&sink))).await {
            Ok(result) => result,
            Err(e) => {
                error!(worker = id, file = %file.display(), error = %e, "Import task aborted");
                PartialResult::failed(source, file, collection, JobError::Aborted(e.to_string()))
            },
        };
        completed += 1;
        if results.send(result).is_err() {
            break;
        }
    }

    debug!(worker = id, jobs = completed, "Worker finished");
}

enum LoadEvent {
    Record(Record),
    Error(LoadError),
    /// The file cannot be read at all
    Fatal(JobError),
}

/// Counts and errors of one file while it is being imported
struct Tally {
    result: PartialResult,
    keep_errors: bool,
}

impl Tally {
    /// Record-level failure: counted, kept only when error collection is on
    fn record_failure(&mut self, count: u64, error: JobError) {
        self.result.failed += count;
        if self.keep_errors {
            self.result.errors.push(error);
        }
    }

    /// Job-level failure: always kept
    fn job_failure(&mut self, error: JobError) {
        self.result.failed += 1;
        self.result.errors.push(error);
    }
}

async fn flush(sink: &dyn Sink, job: &Job, batch: Vec<Record>, tally: &mut Tally) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len();

    let written = match &job.source.options.update_filter {
        Some(update_filter) => {
            let mut pairs = Vec::with_capacity(count);
            for record in batch {
                match update_filter.filter(&record) {
                    Ok(filter) => pairs.push((filter, record)),
                    Err(e) => tally.record_failure(1, JobError::Hook(e)),
                }
            }
            let n = pairs.len();
            sink.upsert_batch(&job.database, &job.collection, pairs)
                .await
                .map(|_| n)
                .map_err(|e| (n, e))
        },
        None => sink
            .bulk_insert(&job.database, &job.collection, batch)
            .await
            .map(|_| count)
            .map_err(|e| (count, e)),
    };

    match written {
        Ok(n) => tally.result.succeeded += n as u64,
        Err((n, error)) => {
            warn!(file = %job.file.display(), collection = %job.collection, error = %error, "Batch write failed");
            tally.record_failure(n as u64, JobError::Sink { count: n, error });
        },
    }
}

/// Import one file. Never fails: every problem ends up in the result.
pub(crate) async fn execute(job: Job, sink: Arc<dyn Sink>) -> PartialResult {
    let sink = sink.as_ref();
    let started = Instant::now();
    let options = &job.source.options;
    let batch_size = options.batch_size.max(1);
    let fail_fast = options.fail_on_first_error;

    let mut tally = Tally {
        result: PartialResult::new(job.source.index, job.file.clone(), job.collection.clone()),
        keep_errors: options.collect_errors,
    };

    let Some(template) = options.loader.clone() else {
        error!(file = %job.file.display(), "No loader configured");
        tally.job_failure(JobError::MissingLoader);
        return tally.result;
    };

    debug!(file = %job.file.display(), loader = template.describe(), "Importing file");
    let size = std::fs::metadata(&job.file).map(|m| m.len()).unwrap_or(0);
    let progress = job.source.progress.start_file(&job.file, size);

    let (tx, mut rx) = mpsc::channel::<LoadEvent>(batch_size.min(MAX_QUEUED_EVENTS));
    let parser = {
        let path = job.file.clone();
        let progress = progress.clone();
        let sanitize = options.sanitize;

        tokio::task::spawn_blocking(move || {
            let input = match open_input(&path, progress) {
                Ok(input) => input,
                Err(error) => {
                    let _ = tx.blocking_send(LoadEvent::Fatal(JobError::Open { path, error }));
                    return;
                },
            };

            let mut loader = template.instantiate(input, sanitize);
            if let Err(e) = loader.start() {
                let _ = tx.blocking_send(LoadEvent::Fatal(JobError::Start(e)));
                return;
            }

            loop {
                match loader.load() {
                    Ok(Some(record)) => {
                        if tx.blocking_send(LoadEvent::Record(record)).is_err() {
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        if tx.blocking_send(LoadEvent::Error(e)).is_err() || fail_fast {
                            break;
                        }
                    },
                }
            }

            if let Err(e) = loader.finish() {
                warn!(file = %path.display(), error = %e, "Loader did not finish cleanly");
            }
        })
    };

    let mut batch: Vec<Record> = Vec::with_capacity(batch_size.min(MAX_QUEUED_EVENTS));
    while let Some(event) = rx.recv().await {
        match event {
            LoadEvent::Record(record) => {
                match hooks::transform(options.post_load.as_ref(), options.pre_dump.as_ref(), record) {
                    Ok(records) => batch.extend(records),
                    Err(e) => {
                        warn!(file = %job.file.display(), error = %e, "Hook rejected record");
                        tally.record_failure(1, JobError::Hook(e));
                    },
                }
                while batch.len() >= batch_size {
                    let rest = batch.split_off(batch_size);
                    let full = std::mem::replace(&mut batch, rest);
                    flush(sink, &job, full, &mut tally).await;
                }
            },
            LoadEvent::Error(e) => {
                warn!(file = %job.file.display(), error = %e, "Failed to load record");
                if fail_fast {
                    tally.job_failure(JobError::Load(e));
                    break;
                }
                tally.record_failure(1, JobError::Load(e));
            },
            LoadEvent::Fatal(e) => {
                error!(file = %job.file.display(), error = %e, "Cannot import file");
                tally.job_failure(e);
            },
        }
    }
    flush(sink, &job, std::mem::take(&mut batch), &mut tally).await;

    // Unblocks the parser if it is still sending after an early stop
    drop(rx);
    if let Err(e) = parser.await {
        error!(file = %job.file.display(), error = %e, "Loader task aborted");
        tally.job_failure(JobError::Aborted(e.to_string()));
    }

    progress.complete();
    tally.result.bytes = progress.bytes_read();
    tally.result.elapsed = started.elapsed();
    debug!(
        file = %job.file.display(),
        succeeded = tally.result.succeeded,
        failed = tally.result.failed,
        "File imported"
    );
    tally.result
}
