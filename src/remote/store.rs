// SPDX-License-Identifier: MPL-2.0

use crate::remote::listeners::Subscription;
use crate::remote::types::{DocPath, Document, FieldUpdates};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("invalid field path: {0}")]
    InvalidPath(String),
    #[error("invalid field {path}: {reason}")]
    InvalidField { path: String, reason: String },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database path error: {0}")]
    Path(String),
}

impl StoreError {
    /// Worth a retry affordance in the UI.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// The hosted document database, as consumed by the progress core.
///
/// Implementations apply each `update_fields` call atomically, including
/// increments, and notify subscribers of the document after every committed
/// write with the full post-write document. Notifications arrive in commit
/// order and before the writing call returns. Callbacks may read the store
/// but must not write to it.
pub trait DocumentStore: Send + Sync + 'static {
    fn get_document(
        &self,
        path: &DocPath,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Full overwrite.
    fn set_document(
        &self,
        path: &DocPath,
        data: Document,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    fn update_fields(
        &self,
        path: &DocPath,
        updates: FieldUpdates,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every document in a collection as `(id, data)`, ordered by id.
    fn list_collection(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<(String, Document)>, StoreError>> + Send;

    /// Register for change notifications on one document.
    fn subscribe(
        &self,
        path: &DocPath,
        callback: impl Fn(&Document) + Send + Sync + 'static,
    ) -> Subscription;
}
