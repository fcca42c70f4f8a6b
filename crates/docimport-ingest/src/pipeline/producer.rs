//! Job producer
//!
//! Runs on a blocking thread: providers do synchronous filesystem work. Sources
//! are drained one after another in run order; the bounded job queue blocks
//! the producer whenever all workers are busy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::Sender;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::datasource::SourceContext;
use crate::error::JobError;
use crate::provider::FileProvider;
use crate::result::PartialResult;

/// One file of one datasource, ready to import
pub(crate) struct Job {
    pub source: Arc<SourceContext>,
    pub file: PathBuf,
    pub database: String,
    pub collection: String,
}

pub(crate) fn produce(
    sources: Vec<(Arc<SourceContext>, Box<dyn FileProvider>)>,
    jobs: Sender<Job>,
    results: UnboundedSender<PartialResult>,
    cancel: CancellationToken,
) {
    let mut produced = 0u64;

    'sources: for (source, mut provider) in sources {
        debug!(source = %source.name, "Producing jobs");

        loop {
            if cancel.is_cancelled() {
                debug!("Import cancelled, no more jobs are produced");
                break 'sources;
            }

            let file = match provider.next_file() {
                Ok(Some(file)) => file,
                Ok(None) => break,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(source = %source.name, path = %path.display(), error = %e, "Skipping unreadable entry");
                    let failed = PartialResult::entry_failed(
                        source.index,
                        path,
                        source.collection_label(),
                        JobError::Provider(e),
                    );
                    if results.send(failed).is_err() {
                        break 'sources;
                    }
                    continue;
                },
            };
            source.progress.file_discovered();

            let target = match (&source.options.database, &source.options.collection) {
                (None, _) => Err(JobError::MissingDatabase),
                (_, None) => Err(JobError::MissingCollection),
                (Some(db), Some(coll)) => Ok((db.clone(), coll.clone())),
            };
            let (database, collection) = match target {
                Ok(target) => target,
                Err(e) => {
                    warn!(source = %source.name, file = %file.display(), error = %e, "Cannot import file");
                    let failed =
                        PartialResult::failed(source.index, file, source.collection_label(), e);
                    if results.send(failed).is_err() {
                        break 'sources;
                    }
                    continue;
                },
            };

            let job = Job {
                source: Arc::clone(&source),
                file,
                database,
                collection,
            };
            if jobs.send_blocking(job).is_err() {
                // Queue closed early by cancellation
                break 'sources;
            }
            produced += 1;
        }
    }

    jobs.close();
    debug!(jobs = produced, "Producer finished");
}
