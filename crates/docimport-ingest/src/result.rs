//! Import outcomes per file, per source and per run

use std::path::PathBuf;
use std::time::Duration;

use docimport_common::byte_count_si;

use crate::error::JobError;

/// Outcome of one file
#[derive(Debug)]
pub struct PartialResult {
    pub file: PathBuf,
    /// Index of the datasource in run order
    pub source: usize,
    pub collection: String,
    pub succeeded: u64,
    pub failed: u64,
    /// Bytes read from disk
    pub bytes: u64,
    pub elapsed: Duration,
    pub errors: Vec<JobError>,
    /// False for provider entries that never became a file to import
    pub is_file: bool,
}

impl PartialResult {
    pub fn new(source: usize, file: PathBuf, collection: impl Into<String>) -> Self {
        Self {
            file,
            source,
            collection: collection.into(),
            succeeded: 0,
            failed: 0,
            bytes: 0,
            elapsed: Duration::ZERO,
            errors: Vec::new(),
            is_file: true,
        }
    }

    /// A file that failed before any record was read
    pub fn failed(source: usize, file: PathBuf, collection: impl Into<String>, error: JobError) -> Self {
        let mut result = Self::new(source, file, collection);
        result.failed = 1;
        result.errors.push(error);
        result
    }

    /// A provider entry that could not be listed. Counts as one failure but
    /// not as a file.
    pub fn entry_failed(source: usize, path: PathBuf, collection: impl Into<String>, error: JobError) -> Self {
        let mut result = Self::failed(source, path, collection, error);
        result.is_file = false;
        result
    }

    pub fn summary(&self) -> String {
        format!(
            "[{} -> {}]: {} rows ({}) were imported successfully and {} failed in {:.2?}",
            self.file.display(),
            self.collection,
            self.succeeded,
            byte_count_si(self.bytes),
            self.failed,
            self.elapsed
        )
    }
}

/// Accumulated outcome of one datasource
#[derive(Debug, Default)]
pub struct SourceResult {
    pub source: String,
    pub collection: String,
    pub succeeded: u64,
    pub failed: u64,
    pub files: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    /// Per-file results, kept only when individual progress or error
    /// collection is enabled
    pub partials: Vec<PartialResult>,
}

impl SourceResult {
    pub fn new(source: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Fold in one file. `elapsed` is the run time at which it completed.
    pub fn add(&mut self, partial: PartialResult, elapsed: Duration, retain: bool) {
        self.succeeded += partial.succeeded;
        self.failed += partial.failed;
        self.bytes += partial.bytes;
        self.files += u64::from(partial.is_file);
        self.elapsed = self.elapsed.max(elapsed);
        if retain {
            self.partials.push(partial);
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "[{} -> {}]: {} rows from {} files ({}) were imported successfully and {} failed in {:.2?}",
            self.source,
            self.collection,
            self.succeeded,
            self.files,
            byte_count_si(self.bytes),
            self.failed,
            self.elapsed
        )
    }
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct TotalResult {
    pub succeeded: u64,
    pub failed: u64,
    pub files: u64,
    pub sources: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    pub source_results: Vec<SourceResult>,
}

impl TotalResult {
    pub fn new(sources: usize) -> Self {
        Self {
            sources: sources as u64,
            ..Default::default()
        }
    }

    pub fn add(&mut self, partial: &PartialResult) {
        self.succeeded += partial.succeeded;
        self.failed += partial.failed;
        self.bytes += partial.bytes;
        self.files += u64::from(partial.is_file);
    }

    pub fn summary(&self) -> String {
        format!(
            "[TOTAL]: {} rows from {} sources ({} files, {}) were imported successfully and {} failed in {:.2?}",
            self.succeeded,
            self.sources,
            self.files,
            byte_count_si(self.bytes),
            self.failed,
            self.elapsed
        )
    }

    /// Every retained error with the file it belongs to
    pub fn errors(&self) -> impl Iterator<Item = (&PathBuf, &JobError)> {
        self.source_results
            .iter()
            .flat_map(|s| s.partials.iter())
            .flat_map(|p| p.errors.iter().map(move |e| (&p.file, e)))
    }
}
