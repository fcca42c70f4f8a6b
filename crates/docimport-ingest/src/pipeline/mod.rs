//! Import pipeline
//!
//! A run goes through these phases:
//!
//! 1. **Prepare**: every enabled datasource's provider is prepared. The first
//!    failure aborts the run before any job exists.
//! 2. **Clear**: collections that asked to be emptied are dropped, once per
//!    `(database, collection)` pair. Failures are logged and ignored.
//! 3. **Produce / consume**: a producer thread turns files into jobs on a
//!    bounded queue (`2 × workers`); a fixed pool of workers imports them and
//!    sends one [`PartialResult`] per file.
//! 4. **Drain**: the run loop folds partial results into per-source and total
//!    results until every worker has exited.
//!
//! Only the workers hold the queue's receivers. On cancellation they stop
//! pulling and drop them, which makes a producer blocked on a full queue give
//! up.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ImportOptions;
use crate::datasource::{Datasource, SourceContext};
use crate::error::{ImportError, Result};
use crate::progress::ProgressCoordinator;
use crate::provider::FileProvider;
use crate::result::{PartialResult, SourceResult, TotalResult};
use crate::sink::{MongoConnection, MongoSink, Sink};

mod producer;
mod worker;

/// Runs imports against one sink
pub struct Importer {
    sink: Arc<dyn Sink>,
    options: ImportOptions,
    parallelism: usize,
    show_progress: bool,
    cancel: CancellationToken,
}

impl Importer {
    pub fn new(sink: Arc<dyn Sink>, options: ImportOptions) -> Self {
        Self {
            sink,
            options,
            parallelism: num_cpus::get(),
            show_progress: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Connect to MongoDB. The connection's database becomes the default for
    /// sources that do not name one.
    pub async fn connect(connection: &MongoConnection, options: ImportOptions) -> Result<Self> {
        let sink = MongoSink::connect(connection)
            .await
            .map_err(ImportError::Connection)?;
        let defaults = ImportOptions {
            database: connection.database.clone(),
            ..Default::default()
        };
        Ok(Self::new(Arc::new(sink), ImportOptions::merge(&defaults, &options)))
    }

    /// Number of workers; zero means one per CPU
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = if parallelism == 0 {
            num_cpus::get()
        } else {
            parallelism
        };
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Token that stops the current run: no new jobs start, running jobs finish.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Import every enabled datasource.
    pub async fn run(&self, sources: Vec<Datasource>) -> Result<TotalResult> {
        let started = Instant::now();
        let sources: Vec<Datasource> = sources.into_iter().filter(Datasource::is_enabled).collect();
        if sources.is_empty() {
            return Err(ImportError::NoSources);
        }
        let workers = self.parallelism.max(1);
        info!(sources = sources.len(), workers, "Starting import");

        let coordinator = ProgressCoordinator::new(self.show_progress);
        let mut contexts = Vec::with_capacity(sources.len());
        let mut providers: Vec<Box<dyn FileProvider>> = Vec::with_capacity(sources.len());

        for (index, mut source) in sources.into_iter().enumerate() {
            source
                .provider
                .prepare()
                .map_err(|error| ImportError::Prepare {
                    datasource: source.name().to_string(),
                    error,
                })?;

            let options = source.resolve(&self.options);
            debug!(source = source.name(), ?options, "Prepared datasource");
            let progress = coordinator.source(
                source.name(),
                options.individual_progress,
                options.show_current_file,
            );
            contexts.push(Arc::new(SourceContext {
                index,
                name: source.name().to_string(),
                options,
                progress,
            }));
            providers.push(source.provider);
        }

        self.clear_collections(&contexts).await;

        let run_token = self.cancel.child_token();
        self.spawn_metadata(&contexts, &providers, &run_token);

        let (job_tx, job_rx) = async_channel::bounded(2 * workers);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<PartialResult>();

        let producer = {
            let sources: Vec<_> = contexts.iter().cloned().zip(providers).collect();
            let results = result_tx.clone();
            let token = run_token.clone();
            tokio::task::spawn_blocking(move || producer::produce(sources, job_tx, results, token))
        };

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                tokio::spawn(worker::run_worker(
                    id,
                    job_rx.clone(),
                    result_tx.clone(),
                    Arc::clone(&self.sink),
                    run_token.clone(),
                ))
            })
            .collect();
        drop(job_rx);
        drop(result_tx);

        let mut total = TotalResult::new(contexts.len());
        let mut per_source: Vec<SourceResult> = contexts
            .iter()
            .map(|c| SourceResult::new(&c.name, c.collection_label()))
            .collect();

        while let Some(partial) = result_rx.recv().await {
            debug!("{}", partial.summary());
            total.add(&partial);
            let context = &contexts[partial.source];
            per_source[partial.source].add(partial, started.elapsed(), context.retains_partials());
        }

        if let Err(e) = producer.await {
            error!(error = %e, "Producer task failed");
        }
        for handle in join_all(handles).await {
            if let Err(e) = handle {
                error!(error = %e, "Worker task failed");
            }
        }
        // Releases the metadata scanners
        run_token.cancel();

        for context in &contexts {
            context.progress.finish();
        }

        total.elapsed = started.elapsed();
        total.source_results = per_source;
        report(&total);
        Ok(total)
    }

    /// Drop each requested collection once, concurrently.
    async fn clear_collections(&self, contexts: &[Arc<SourceContext>]) {
        let targets: BTreeSet<(String, String)> = contexts
            .iter()
            .filter(|c| c.options.empty_collection)
            .filter_map(|c| match (&c.options.database, &c.options.collection) {
                (Some(db), Some(coll)) => Some((db.clone(), coll.clone())),
                _ => {
                    warn!(source = %c.name, "Cannot empty collection without database and collection names");
                    None
                },
            })
            .collect();

        let clears = targets.iter().map(|(db, coll)| async move {
            if let Err(e) = self.sink.clear_collection(db, coll).await {
                warn!(database = %db, collection = %coll, error = %e, "Failed to empty collection");
            }
        });
        join_all(clears).await;
    }

    fn spawn_metadata(
        &self,
        contexts: &[Arc<SourceContext>],
        providers: &[Box<dyn FileProvider>],
        token: &CancellationToken,
    ) {
        for (context, provider) in contexts.iter().zip(providers) {
            let stream = provider.fetch_metadata();
            let progress = Arc::clone(&context.progress);
            let token = token.clone();
            tokio::task::spawn_blocking(move || {
                for metadata in stream {
                    if token.is_cancelled() {
                        break;
                    }
                    progress.update_metadata(&metadata);
                }
            });
        }
    }
}

fn report(total: &TotalResult) {
    for source in &total.source_results {
        info!("{}", source.summary());
    }
    for (file, error) in total.errors() {
        warn!(file = %file.display(), "{}", error);
    }
    info!("{}", total.summary());
}
