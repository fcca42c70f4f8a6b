//! Shell pattern matching

use std::path::PathBuf;

use ::glob::{MatchOptions, Paths};

use super::{running_totals, FileProvider, MetadataStream};
use crate::error::ProviderError;

/// Yields the regular files matching a shell pattern such as `data/**/*.csv`.
///
/// Matches are produced lazily, sorted within each directory.
pub struct GlobProvider {
    pattern: String,
    options: MatchOptions,
    paths: Option<Paths>,
}

impl GlobProvider {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: MatchOptions::new(),
            paths: None,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.options.case_sensitive = false;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn compile(&self) -> Result<Paths, ProviderError> {
        ::glob::glob_with(&self.pattern, self.options).map_err(|e| ProviderError::Pattern {
            pattern: self.pattern.clone(),
            message: e.msg.to_string(),
        })
    }
}

impl FileProvider for GlobProvider {
    fn prepare(&mut self) -> Result<(), ProviderError> {
        if self.paths.is_none() {
            self.paths = Some(self.compile()?);
        }
        Ok(())
    }

    fn next_file(&mut self) -> Result<Option<PathBuf>, ProviderError> {
        let paths = self.paths.as_mut().ok_or(ProviderError::NotPrepared)?;
        for entry in paths.by_ref() {
            let path = entry?;
            if !path.is_dir() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn fetch_metadata(&self) -> MetadataStream {
        match self.compile() {
            Ok(paths) => running_totals(paths.filter_map(Result::ok).filter(|p| !p.is_dir())),
            Err(_) => Box::new(std::iter::empty()),
        }
    }
}
