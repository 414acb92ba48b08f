//! Commit records, one append-only collection per user.

use crate::db::connection::{ChangeStream, Document, DocumentStore};
use crate::db::models::{Commit, NewCommit, UserId};
use crate::errors::PersistenceError;

pub fn commits_collection(user: &UserId) -> String {
    format!("users/{user}/commits")
}

fn document_to_commit(doc: Document) -> Result<Commit, PersistenceError> {
    let Document { id, path, data, .. } = doc;
    let payload: NewCommit = serde_json::from_value(data)
        .map_err(|source| PersistenceError::Malformed { path, source })?;
    Ok(payload.into_commit(id))
}

pub async fn append_commit(
    store: &dyn DocumentStore,
    user: &UserId,
    commit: NewCommit,
) -> Result<Commit, PersistenceError> {
    let collection = commits_collection(user);
    let data = serde_json::to_value(&commit).map_err(|source| PersistenceError::Malformed {
        path: collection.clone(),
        source,
    })?;
    let id = store.append_to_collection(&collection, data).await?;
    Ok(commit.into_commit(id))
}

/// Every commit for `user`, newest capture first.
pub async fn list_commits(
    store: &dyn DocumentStore,
    user: &UserId,
) -> Result<Vec<Commit>, PersistenceError> {
    let docs = store.list_collection(&commits_collection(user)).await?;
    let mut commits = docs
        .into_iter()
        .map(document_to_commit)
        .collect::<Result<Vec<_>, _>>()?;
    commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(commits)
}

pub fn watch_commits(store: &dyn DocumentStore, user: &UserId) -> ChangeStream {
    store.watch(&commits_collection(user))
}
