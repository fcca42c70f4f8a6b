//! File providers
//!
//! A provider streams the file paths of one datasource. The pipeline calls
//! [`FileProvider::prepare`] once before the run starts, then pulls paths with
//! [`FileProvider::next_file`] until it returns `Ok(None)`. An `Err` from
//! `next_file` is recorded against the source and enumeration continues.
//!
//! [`FileProvider::fetch_metadata`] is advisory: it re-scans the same files on
//! a separate blocking thread and yields running totals for progress display.

use std::fs;
use std::path::PathBuf;

use crate::error::ProviderError;

pub mod glob;
pub mod list;
pub mod walk;

pub use self::glob::GlobProvider;
pub use self::list::ListProvider;
pub use self::walk::WalkProvider;

/// Running totals over the files a provider will yield
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub file_count: u64,
    pub total_bytes: u64,
    /// Length of the longest file name seen so far
    pub longest_name: usize,
}

/// Stream of running totals; each item supersedes the previous one
pub type MetadataStream = Box<dyn Iterator<Item = ProviderMetadata> + Send>;

pub trait FileProvider: Send {
    /// Compile patterns, check roots. Safe to call more than once.
    fn prepare(&mut self) -> Result<(), ProviderError>;

    fn next_file(&mut self) -> Result<Option<PathBuf>, ProviderError>;

    fn fetch_metadata(&self) -> MetadataStream;
}

/// Turn a stream of paths into running totals. Unreadable files count with
/// zero bytes.
pub(crate) fn running_totals<I>(paths: I) -> MetadataStream
where
    I: Iterator<Item = PathBuf> + Send + 'static,
{
    Box::new(paths.scan(ProviderMetadata::default(), |acc, path| {
        acc.file_count += 1;
        acc.total_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let name_len = path
            .file_name()
            .map(|n| n.to_string_lossy().chars().count())
            .unwrap_or(0);
        acc.longest_name = acc.longest_name.max(name_len);
        Some(*acc)
    }))
}
