//! Record transformation hooks
//!
//! A record leaves its loader, passes the post-load hook, and each resulting
//! record passes the pre-dump hook. Both stages may fan a record out into zero
//! or more records; downstream batching sees the flattened sequence in order.
//!
//! Any `Fn(Record) -> Result<Vec<Record>, HookError>` closure is a hook:
//!
//! ```
//! use std::sync::Arc;
//! use docimport_ingest::hooks::{PostLoadHook, Record};
//! use docimport_ingest::HookError;
//!
//! let drop_empty: Arc<dyn PostLoadHook> = Arc::new(|record: Record| -> Result<Vec<Record>, HookError> {
//!     if record.is_empty() {
//!         Ok(vec![])
//!     } else {
//!         Ok(vec![record])
//!     }
//! });
//! assert!(drop_empty.apply(Record::new()).unwrap().is_empty());
//! ```

use crate::error::HookError;

/// A loaded document: string keys mapped to scalar or nested values
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Transformation applied to every record a loader yields
pub trait PostLoadHook: Send + Sync {
    fn apply(&self, record: Record) -> Result<Vec<Record>, HookError>;
}

/// Transformation applied to every post-load output before it is batched
pub trait PreDumpHook: Send + Sync {
    fn apply(&self, record: Record) -> Result<Vec<Record>, HookError>;
}

/// Derives the filter document used to upsert a record.
///
/// When a datasource has an update filter, its batches are written as
/// replace-or-insert operations keyed by the filter instead of plain inserts.
pub trait UpdateFilterHook: Send + Sync {
    fn filter(&self, record: &Record) -> Result<Record, HookError>;
}

impl<F> PostLoadHook for F
where
    F: Fn(Record) -> Result<Vec<Record>, HookError> + Send + Sync,
{
    fn apply(&self, record: Record) -> Result<Vec<Record>, HookError> {
        self(record)
    }
}

impl<F> PreDumpHook for F
where
    F: Fn(Record) -> Result<Vec<Record>, HookError> + Send + Sync,
{
    fn apply(&self, record: Record) -> Result<Vec<Record>, HookError> {
        self(record)
    }
}

impl<F> UpdateFilterHook for F
where
    F: Fn(&Record) -> Result<Record, HookError> + Send + Sync,
{
    fn filter(&self, record: &Record) -> Result<Record, HookError> {
        self(record)
    }
}

/// Passes every record through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHook;

impl PostLoadHook for IdentityHook {
    fn apply(&self, record: Record) -> Result<Vec<Record>, HookError> {
        Ok(vec![record])
    }
}

impl PreDumpHook for IdentityHook {
    fn apply(&self, record: Record) -> Result<Vec<Record>, HookError> {
        Ok(vec![record])
    }
}

/// Filters on a fixed set of keys copied from the record.
///
/// Keys missing from the record are omitted from the filter; a record with
/// none of the keys is an error, since an empty filter would match any document.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    keys: Vec<String>,
}

impl KeyFilter {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl UpdateFilterHook for KeyFilter {
    fn filter(&self, record: &Record) -> Result<Record, HookError> {
        let filter: Record = self
            .keys
            .iter()
            .filter_map(|k| record.get(k).map(|v| (k.clone(), v.clone())))
            .collect();

        if filter.is_empty() {
            return Err(HookError::new(format!(
                "record has none of the filter keys [{}]",
                self.keys.join(", ")
            )));
        }
        Ok(filter)
    }
}

/// Run one record through both hook stages, preserving order.
pub(crate) fn transform(
    post_load: &dyn PostLoadHook,
    pre_dump: &dyn PreDumpHook,
    record: Record,
) -> Result<Vec<Record>, HookError> {
    let mut out = Vec::new();
    for loaded in post_load.apply(record)? {
        out.extend(pre_dump.apply(loaded)?);
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_identity_hooks() {
        let r = rec(json!({"a": 1}));
        let out = transform(&IdentityHook, &IdentityHook, r.clone()).unwrap();
        assert_eq!(out, vec![r]);
    }

    #[test]
    fn test_fan_out_preserves_order() {
        let split = |r: Record| -> Result<Vec<Record>, HookError> {
            let n = r["n"].as_i64().unwrap();
            Ok((0..n).map(|i| rec(json!({ "i": i }))).collect())
        };
        let double = |r: Record| -> Result<Vec<Record>, HookError> { Ok(vec![r.clone(), r]) };

        let out = transform(&split, &double, rec(json!({"n": 2}))).unwrap();
        let seq: Vec<i64> = out.iter().map(|r| r["i"].as_i64().unwrap()).collect();
        assert_eq!(seq, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_hook_error_propagates() {
        let reject = |_: Record| -> Result<Vec<Record>, HookError> { Err(HookError::new("nope")) };
        let err = transform(&IdentityHook, &reject, Record::new()).unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_key_filter() {
        let hook = KeyFilter::new(["id", "region"]);
        let filter = hook.filter(&rec(json!({"id": 7, "name": "x"}))).unwrap();
        assert_eq!(serde_json::Value::Object(filter), json!({"id": 7}));

        assert!(hook.filter(&rec(json!({"name": "x"}))).is_err());
    }
}
