// SPDX-License-Identifier: MPL-2.0

use crate::progress::ProgressError;
use crate::progress::delta::Delta;
use crate::progress::record::{ProgressRecord, StudentProfile};
use crate::remote::{DocPath, DocumentStore, FieldUpdates, StoreError};

/// Tags each progress write so its change notification can be matched to
/// the local change that caused it.
pub const WRITE_ID_FIELD: &str = "lastWriteId";

fn path_for(make: fn(&str) -> Option<DocPath>, student_id: &str) -> Result<DocPath, StoreError> {
    make(student_id).ok_or_else(|| StoreError::InvalidPath(student_id.to_string()))
}

/// Reads and writes the `students/{id}` and `progress/{id}` documents.
pub struct ProgressService<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> ProgressService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn fetch_profile(&self, student_id: &str) -> Result<Option<StudentProfile>, ProgressError> {
        let path = path_for(DocPath::student, student_id)?;
        match self.store.get_document(&path).await? {
            Some(doc) => Ok(Some(StudentProfile::from_document(student_id, &doc)?)),
            None => Ok(None),
        }
    }

    pub async fn fetch_progress(&self, student_id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        let path = path_for(DocPath::progress, student_id)?;
        let Some(doc) = self.store.get_document(&path).await? else {
            return Ok(None);
        };

        let record = ProgressRecord::from_document(&doc)?;
        if !doc.contains_key("totalCoins") {
            // Pin the legacy balance before any increment lands on a missing field
            self.store
                .update_fields(&path, FieldUpdates::new().set("totalCoins", record.total_coins))
                .await?;
            log::info!(
                "[PROGRESS] migrated legacy coins student:{} coins:{}",
                student_id,
                record.total_coins
            );
        }
        Ok(Some(record))
    }

    pub async fn save_profile(&self, profile: &StudentProfile) -> Result<(), ProgressError> {
        let path = path_for(DocPath::student, &profile.id)?;
        self.store.set_document(&path, profile.to_document()?).await?;
        Ok(())
    }

    pub async fn save_progress(&self, student_id: &str, record: &ProgressRecord) -> Result<(), ProgressError> {
        let path = path_for(DocPath::progress, student_id)?;
        self.store.set_document(&path, record.to_document()?).await?;
        Ok(())
    }

    /// Persist one change as a single atomic update tagged with `write_id`.
    pub async fn submit(&self, student_id: &str, write_id: &str, delta: &Delta) -> Result<(), ProgressError> {
        let updates = delta.to_updates()?;
        if updates.is_empty() {
            return Ok(());
        }
        let updates = updates.set(WRITE_ID_FIELD, write_id);
        let path = path_for(DocPath::progress, student_id)?;
        self.store.update_fields(&path, updates).await?;
        Ok(())
    }
}
