//! Explicit file list

use std::path::PathBuf;

use super::{running_totals, FileProvider, MetadataStream};
use crate::error::ProviderError;

/// Yields the given paths in order. Missing files surface when the job opens them.
#[derive(Debug, Clone, Default)]
pub struct ListProvider {
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ListProvider {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            cursor: 0,
        }
    }
}

impl FileProvider for ListProvider {
    fn prepare(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn next_file(&mut self) -> Result<Option<PathBuf>, ProviderError> {
        let next = self.files.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    fn fetch_metadata(&self) -> MetadataStream {
        running_totals(self.files.clone().into_iter())
    }
}
