//! Layered import options
//!
//! Options are set at two levels: run-wide (global) and per datasource. Every
//! field is optional so that "not specified" can be told apart from "explicitly
//! off"; [`ImportOptions::merge`] layers an override on top of a base and
//! [`ImportOptions::resolve`] fills the remaining gaps with defaults.

use std::fmt;
use std::sync::Arc;

use crate::hooks::{IdentityHook, PostLoadHook, PreDumpHook, UpdateFilterHook};
use crate::loader::LoaderTemplate;

/// Batch size used when none is configured at any level
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Import settings with tri-state semantics.
///
/// `None` means unset. For names an empty string also counts as unset, and a
/// batch size of zero counts as unset.
#[derive(Clone, Default)]
pub struct ImportOptions {
    pub database: Option<String>,
    pub collection: Option<String>,
    pub loader: Option<Arc<dyn LoaderTemplate>>,
    pub post_load: Option<Arc<dyn PostLoadHook>>,
    pub pre_dump: Option<Arc<dyn PreDumpHook>>,
    pub update_filter: Option<Arc<dyn UpdateFilterHook>>,
    /// Drop the target collection before the run starts
    pub empty_collection: Option<bool>,
    /// Sanitize field names produced by the loader
    pub sanitize: Option<bool>,
    /// Stop a file at its first failing record
    pub fail_on_first_error: Option<bool>,
    /// Keep every record-level error in the file's result
    pub collect_errors: Option<bool>,
    /// Show the file currently being imported in the source's progress line
    pub show_current_file: Option<bool>,
    /// One progress bar per file instead of one per source
    pub individual_progress: Option<bool>,
    pub insertion_batch_size: Option<usize>,
}

fn set_name(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer `overrides` on top of `base`: every field set in `overrides` wins,
    /// every unset field falls back to `base`.
    pub fn merge(base: &ImportOptions, overrides: &ImportOptions) -> ImportOptions {
        ImportOptions {
            database: set_name(&overrides.database).or_else(|| set_name(&base.database)),
            collection: set_name(&overrides.collection).or_else(|| set_name(&base.collection)),
            loader: overrides.loader.clone().or_else(|| base.loader.clone()),
            post_load: overrides.post_load.clone().or_else(|| base.post_load.clone()),
            pre_dump: overrides.pre_dump.clone().or_else(|| base.pre_dump.clone()),
            update_filter: overrides
                .update_filter
                .clone()
                .or_else(|| base.update_filter.clone()),
            empty_collection: overrides.empty_collection.or(base.empty_collection),
            sanitize: overrides.sanitize.or(base.sanitize),
            fail_on_first_error: overrides.fail_on_first_error.or(base.fail_on_first_error),
            collect_errors: overrides.collect_errors.or(base.collect_errors),
            show_current_file: overrides.show_current_file.or(base.show_current_file),
            individual_progress: overrides.individual_progress.or(base.individual_progress),
            insertion_batch_size: overrides
                .insertion_batch_size
                .filter(|n| *n > 0)
                .or(base.insertion_batch_size.filter(|n| *n > 0)),
        }
    }

    /// Fill unset fields with defaults: toggles off, identity hooks,
    /// [`DEFAULT_BATCH_SIZE`].
    pub fn resolve(&self) -> ResolvedOptions {
        ResolvedOptions {
            database: set_name(&self.database),
            collection: set_name(&self.collection),
            loader: self.loader.clone(),
            post_load: self
                .post_load
                .clone()
                .unwrap_or_else(|| Arc::new(IdentityHook)),
            pre_dump: self
                .pre_dump
                .clone()
                .unwrap_or_else(|| Arc::new(IdentityHook)),
            update_filter: self.update_filter.clone(),
            empty_collection: self.empty_collection.unwrap_or(false),
            sanitize: self.sanitize.unwrap_or(false),
            fail_on_first_error: self.fail_on_first_error.unwrap_or(false),
            collect_errors: self.collect_errors.unwrap_or(false),
            show_current_file: self.show_current_file.unwrap_or(false),
            individual_progress: self.individual_progress.unwrap_or(false),
            batch_size: self
                .insertion_batch_size
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_loader(mut self, loader: impl LoaderTemplate + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn with_post_load(mut self, hook: impl PostLoadHook + 'static) -> Self {
        self.post_load = Some(Arc::new(hook));
        self
    }

    pub fn with_pre_dump(mut self, hook: impl PreDumpHook + 'static) -> Self {
        self.pre_dump = Some(Arc::new(hook));
        self
    }

    pub fn with_update_filter(mut self, hook: impl UpdateFilterHook + 'static) -> Self {
        self.update_filter = Some(Arc::new(hook));
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.insertion_batch_size = Some(size);
        self
    }

    pub fn with_empty_collection(mut self, on: bool) -> Self {
        self.empty_collection = Some(on);
        self
    }

    pub fn with_sanitize(mut self, on: bool) -> Self {
        self.sanitize = Some(on);
        self
    }

    pub fn with_fail_on_first_error(mut self, on: bool) -> Self {
        self.fail_on_first_error = Some(on);
        self
    }

    pub fn with_collect_errors(mut self, on: bool) -> Self {
        self.collect_errors = Some(on);
        self
    }

    pub fn with_show_current_file(mut self, on: bool) -> Self {
        self.show_current_file = Some(on);
        self
    }

    pub fn with_individual_progress(mut self, on: bool) -> Self {
        self.individual_progress = Some(on);
        self
    }
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("loader", &self.loader.as_ref().map(|l| l.describe().to_string()))
            .field("post_load", &self.post_load.is_some())
            .field("pre_dump", &self.pre_dump.is_some())
            .field("update_filter", &self.update_filter.is_some())
            .field("empty_collection", &self.empty_collection)
            .field("sanitize", &self.sanitize)
            .field("fail_on_first_error", &self.fail_on_first_error)
            .field("collect_errors", &self.collect_errors)
            .field("show_current_file", &self.show_current_file)
            .field("individual_progress", &self.individual_progress)
            .field("insertion_batch_size", &self.insertion_batch_size)
            .finish()
    }
}

/// Effective settings of one datasource after all layers are merged
#[derive(Clone)]
pub struct ResolvedOptions {
    pub database: Option<String>,
    pub collection: Option<String>,
    pub loader: Option<Arc<dyn LoaderTemplate>>,
    pub post_load: Arc<dyn PostLoadHook>,
    pub pre_dump: Arc<dyn PreDumpHook>,
    pub update_filter: Option<Arc<dyn UpdateFilterHook>>,
    pub empty_collection: bool,
    pub sanitize: bool,
    pub fail_on_first_error: bool,
    pub collect_errors: bool,
    pub show_current_file: bool,
    pub individual_progress: bool,
    pub batch_size: usize,
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("loader", &self.loader.as_ref().map(|l| l.describe().to_string()))
            .field("update_filter", &self.update_filter.is_some())
            .field("empty_collection", &self.empty_collection)
            .field("sanitize", &self.sanitize)
            .field("fail_on_first_error", &self.fail_on_first_error)
            .field("collect_errors", &self.collect_errors)
            .field("show_current_file", &self.show_current_file)
            .field("individual_progress", &self.individual_progress)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::hooks::Record;
    use proptest::prelude::*;

    type Scalars = (
        Option<String>,
        Option<String>,
        [Option<bool>; 6],
        Option<usize>,
    );

    fn scalars(o: &ImportOptions) -> Scalars {
        (
            o.database.clone(),
            o.collection.clone(),
            [
                o.empty_collection,
                o.sanitize,
                o.fail_on_first_error,
                o.collect_errors,
                o.show_current_file,
                o.individual_progress,
            ],
            o.insertion_batch_size,
        )
    }

    fn options() -> impl Strategy<Value = ImportOptions> {
        (
            proptest::option::of("[a-z]{1,8}"),
            proptest::option::of("[a-z]{1,8}"),
            proptest::array::uniform6(proptest::option::of(any::<bool>())),
            proptest::option::of(1usize..1000),
        )
            .prop_map(|(database, collection, toggles, batch)| ImportOptions {
                database,
                collection,
                empty_collection: toggles[0],
                sanitize: toggles[1],
                fail_on_first_error: toggles[2],
                collect_errors: toggles[3],
                show_current_file: toggles[4],
                individual_progress: toggles[5],
                insertion_batch_size: batch,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn merge_with_self_is_identity(o in options()) {
            prop_assert_eq!(scalars(&ImportOptions::merge(&o, &o)), scalars(&o));
        }

        #[test]
        fn set_override_fields_always_win(base in options(), over in options()) {
            let merged = scalars(&ImportOptions::merge(&base, &over));
            let (b, o) = (scalars(&base), scalars(&over));

            prop_assert_eq!(&merged.0, if o.0.is_some() { &o.0 } else { &b.0 });
            prop_assert_eq!(&merged.1, if o.1.is_some() { &o.1 } else { &b.1 });
            for i in 0..6 {
                prop_assert_eq!(merged.2[i], o.2[i].or(b.2[i]));
            }
            prop_assert_eq!(merged.3, o.3.or(b.3));
        }
    }

    #[test]
    fn test_explicit_false_beats_true() {
        let base = ImportOptions::new().with_sanitize(true).with_fail_on_first_error(true);
        let over = ImportOptions::new().with_sanitize(false);

        let merged = ImportOptions::merge(&base, &over);
        assert_eq!(merged.sanitize, Some(false));
        assert_eq!(merged.fail_on_first_error, Some(true));
    }

    #[test]
    fn test_empty_and_zero_are_unset() {
        let base = ImportOptions::new()
            .with_database("data")
            .with_collection("people")
            .with_batch_size(50);
        let over = ImportOptions::new()
            .with_database("")
            .with_collection("")
            .with_batch_size(0);

        let merged = ImportOptions::merge(&base, &over);
        assert_eq!(merged.database.as_deref(), Some("data"));
        assert_eq!(merged.collection.as_deref(), Some("people"));
        assert_eq!(merged.insertion_batch_size, Some(50));
    }

    #[test]
    fn test_hooks_follow_override() {
        let base_hook: Arc<dyn PostLoadHook> =
            Arc::new(|r: Record| -> Result<Vec<Record>, HookError> { Ok(vec![r]) });
        let over_hook: Arc<dyn PostLoadHook> =
            Arc::new(|_: Record| -> Result<Vec<Record>, HookError> { Ok(vec![]) });

        let base = ImportOptions {
            post_load: Some(base_hook.clone()),
            ..Default::default()
        };
        let merged = ImportOptions::merge(&base, &ImportOptions::new());
        assert!(Arc::ptr_eq(merged.post_load.as_ref().unwrap(), &base_hook));

        let over = ImportOptions {
            post_load: Some(over_hook.clone()),
            ..Default::default()
        };
        let merged = ImportOptions::merge(&base, &over);
        assert!(Arc::ptr_eq(merged.post_load.as_ref().unwrap(), &over_hook));
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = ImportOptions::new().resolve();
        assert_eq!(resolved.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!resolved.empty_collection);
        assert!(!resolved.sanitize);
        assert!(!resolved.fail_on_first_error);
        assert!(!resolved.collect_errors);
        assert!(!resolved.individual_progress);
        assert!(resolved.database.is_none());
        assert!(resolved.loader.is_none());

        let out = resolved.post_load.apply(Record::new()).unwrap();
        assert_eq!(out.len(), 1);
    }
}
