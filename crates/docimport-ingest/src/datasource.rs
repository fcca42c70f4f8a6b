//! Datasources
//!
//! A [`Datasource`] is what callers hand to the importer: a provider plus the
//! options that override the run-wide ones. Once a run starts, each enabled
//! datasource is split into its provider (moved to the producer) and a shared
//! [`SourceContext`] that every job of the source points back to.

use std::fmt;
use std::sync::Arc;

use crate::config::{ImportOptions, ResolvedOptions};
use crate::progress::SourceProgress;
use crate::provider::FileProvider;

pub struct Datasource {
    name: String,
    pub(crate) provider: Box<dyn FileProvider>,
    options: ImportOptions,
    enabled: bool,
}

impl Datasource {
    pub fn new(name: impl Into<String>, provider: impl FileProvider + 'static) -> Self {
        Self {
            name: name.into(),
            provider: Box::new(provider),
            options: ImportOptions::default(),
            enabled: true,
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Disabled datasources are skipped entirely
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Effective options: `global` overridden by this source's options
    pub fn resolve(&self, global: &ImportOptions) -> ResolvedOptions {
        ImportOptions::merge(global, &self.options).resolve()
    }
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Per-run state of one datasource, shared by its jobs
pub(crate) struct SourceContext {
    pub index: usize,
    pub name: String,
    pub options: ResolvedOptions,
    pub progress: Arc<SourceProgress>,
}

impl SourceContext {
    /// Collection name used in results, even when none is configured
    pub fn collection_label(&self) -> &str {
        self.options.collection.as_deref().unwrap_or("?")
    }

    /// Whether per-file results are kept after they are counted
    pub fn retains_partials(&self) -> bool {
        self.options.individual_progress || self.options.collect_errors
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::ListProvider;

    #[test]
    fn test_source_options_override_global() {
        let global = ImportOptions::new()
            .with_database("data")
            .with_collection("everything")
            .with_batch_size(10);
        let source = Datasource::new("people", ListProvider::new(["a.csv"]))
            .with_options(ImportOptions::new().with_collection("people").with_sanitize(true));

        let resolved = source.resolve(&global);
        assert_eq!(resolved.database.as_deref(), Some("data"));
        assert_eq!(resolved.collection.as_deref(), Some("people"));
        assert_eq!(resolved.batch_size, 10);
        assert!(resolved.sanitize);
        assert!(source.is_enabled());
        assert!(!source.with_enabled(false).is_enabled());
    }
}
