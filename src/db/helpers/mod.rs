use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Split a document path into its parent collection and document id.
///
/// Paths alternate collection and document segments, so a document path has
/// an even number of segments: `users/u1`, `users/u1/commits/<id>`.
pub fn split_document_path(path: &str) -> Result<(&str, &str)> {
    let count = segment_count(path)?;
    if count % 2 != 0 {
        bail!("path '{path}' names a collection, not a document");
    }
    path.rsplit_once('/')
        .ok_or_else(|| anyhow!("path '{path}' has no collection"))
}

/// Validate that a path names a collection (odd number of segments).
pub fn ensure_collection_path(path: &str) -> Result<()> {
    let count = segment_count(path)?;
    if count % 2 == 0 {
        bail!("path '{path}' names a document, not a collection");
    }
    Ok(())
}

fn segment_count(path: &str) -> Result<usize> {
    if path.is_empty() {
        bail!("empty store path");
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        bail!("store path '{path}' has an empty segment");
    }
    Ok(segments.len())
}

/// Lay the fields of `incoming` over `existing`. Both sides are expected to
/// be JSON objects; anything else makes `incoming` win outright.
pub fn merge_objects(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut base), Value::Object(update)) => {
            for (key, value) in update {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}
