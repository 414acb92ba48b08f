//! The per-user progress document.

use crate::db::connection::{ChangeStream, Document, DocumentStore};
use crate::db::models::{UserId, UserProgress};
use crate::errors::PersistenceError;

pub fn progress_path(user: &UserId) -> String {
    format!("users/{user}")
}

fn document_to_progress(doc: Document) -> Result<UserProgress, PersistenceError> {
    let Document { path, data, .. } = doc;
    serde_json::from_value(data).map_err(|source| PersistenceError::Malformed { path, source })
}

pub async fn get_progress(
    store: &dyn DocumentStore,
    user: &UserId,
) -> Result<Option<UserProgress>, PersistenceError> {
    match store.get_document(&progress_path(user)).await? {
        Some(doc) => document_to_progress(doc).map(Some),
        None => Ok(None),
    }
}

/// Read the progress document, creating the zero-value one the first time a
/// user is seen.
pub async fn ensure_progress(
    store: &dyn DocumentStore,
    user: &UserId,
) -> Result<UserProgress, PersistenceError> {
    if let Some(progress) = get_progress(store, user).await? {
        return Ok(progress);
    }
    let zero = UserProgress::zero();
    set_progress(store, user, &zero).await?;
    Ok(zero)
}

/// Write the progress fields, merging so unrelated fields on the user
/// document survive.
pub async fn set_progress(
    store: &dyn DocumentStore,
    user: &UserId,
    progress: &UserProgress,
) -> Result<(), PersistenceError> {
    let path = progress_path(user);
    let data = serde_json::to_value(progress).map_err(|source| PersistenceError::Malformed {
        path: path.clone(),
        source,
    })?;
    store.set_document(&path, data, true).await
}

pub fn watch_progress(store: &dyn DocumentStore, user: &UserId) -> ChangeStream {
    store.watch(&progress_path(user))
}
