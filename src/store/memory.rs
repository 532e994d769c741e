// SPDX-License-Identifier: MPL-2.0

//! In-process document store.
//!
//! Used for offline sessions and as the backend in tests. Failure injection
//! (`set_offline`, `fail_writes_to`, `fail_update_number`) and `set_yielding`
//! simulate a flaky, slow hosted backend.

use crate::remote::{
    DocPath, Document, DocumentStore, FieldUpdates, ListenerRegistry, StoreError, Subscription,
};
use crate::store::fields::apply_updates;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MemoryStore {
    docs: Mutex<BTreeMap<DocPath, Document>>,
    listeners: ListenerRegistry<Document>,
    /// Held from commit through notification so subscribers see commit order
    dispatch: Mutex<()>,
    offline: AtomicBool,
    failing_collections: Mutex<Vec<String>>,
    /// Counts down update calls; the one that brings it to zero fails
    failing_update: AtomicUsize,
    yielding: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(BTreeMap::new()),
            listeners: ListenerRegistry::new(),
            dispatch: Mutex::new(()),
            offline: AtomicBool::new(false),
            failing_collections: Mutex::new(Vec::new()),
            failing_update: AtomicUsize::new(0),
            yielding: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make writes to one collection fail until [`Self::clear_failures`].
    pub fn fail_writes_to(&self, collection: &str) {
        self.failing_collections
            .lock()
            .expect("store lock poisoned")
            .push(collection.to_string());
    }

    /// Fail the `n`-th `update_fields` call from now (1-based), once.
    pub fn fail_update_number(&self, n: usize) {
        self.failing_update.store(n, Ordering::SeqCst);
    }

    /// Yield to the scheduler before every write, so overlapping writers
    /// interleave the way they do against a remote backend.
    pub fn set_yielding(&self, yielding: bool) {
        self.yielding.store(yielding, Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        self.failing_collections
            .lock()
            .expect("store lock poisoned")
            .clear();
        self.failing_update.store(0, Ordering::SeqCst);
        self.set_offline(false);
    }

    /// Number of committed writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Synchronous read for tests and debugging.
    pub fn peek(&self, path: &DocPath) -> Option<Document> {
        self.docs.lock().expect("store lock poisoned").get(path).cloned()
    }

    pub fn listener_count(&self, path: &DocPath) -> usize {
        self.listeners.listener_count(&path.to_string())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, path: &DocPath) -> Result<(), StoreError> {
        self.check_online()?;
        let failing = self.failing_collections.lock().expect("store lock poisoned");
        if failing.iter().any(|c| c == path.collection()) {
            return Err(StoreError::Unavailable(format!("write to {path} rejected")));
        }
        Ok(())
    }

    fn check_update_countdown(&self, path: &DocPath) -> Result<(), StoreError> {
        let previous = self
            .failing_update
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            return Err(StoreError::Unavailable(format!("update of {path} dropped")));
        }
        Ok(())
    }

    async fn maybe_yield(&self) {
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    /// Store `doc` and notify subscribers. Callers hold the dispatch lock.
    fn commit(&self, path: &DocPath, doc: Document) {
        self.docs
            .lock()
            .expect("store lock poisoned")
            .insert(path.clone(), doc.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        // Notify outside the document lock so callbacks may read the store
        self.listeners.notify(&path.to_string(), &doc);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.check_online()?;
        Ok(self.peek(path))
    }

    async fn set_document(&self, path: &DocPath, data: Document) -> Result<(), StoreError> {
        self.maybe_yield().await;
        self.check_writable(path)?;

        let _dispatch = self.dispatch.lock().expect("store lock poisoned");
        self.commit(path, data);
        Ok(())
    }

    async fn update_fields(&self, path: &DocPath, updates: FieldUpdates) -> Result<(), StoreError> {
        self.maybe_yield().await;
        self.check_writable(path)?;
        self.check_update_countdown(path)?;

        let _dispatch = self.dispatch.lock().expect("store lock poisoned");
        let mut next = self
            .peek(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        apply_updates(&mut next, &updates)?;
        self.commit(path, next);
        Ok(())
    }

    async fn list_collection(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        self.check_online()?;
        let docs = self.docs.lock().expect("store lock poisoned");
        Ok(docs
            .iter()
            .filter(|(path, _)| path.collection() == collection)
            .map(|(path, doc)| (path.id().to_string(), doc.clone()))
            .collect())
    }

    fn subscribe(
        &self,
        path: &DocPath,
        callback: impl Fn(&Document) + Send + Sync + 'static,
    ) -> Subscription {
        self.listeners.register(&path.to_string(), callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn path() -> DocPath {
        DocPath::progress("student-1").unwrap()
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let store = MemoryStore::new();
        let err = store
            .update_fields(&path(), FieldUpdates::new().increment("totalPoints", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_subscriber_sees_post_write_document() {
        let store = MemoryStore::new();
        store.set_document(&path(), Document::new()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(&path(), move |doc| {
            sink.lock().unwrap().push(doc.get("totalPoints").cloned());
        });

        store
            .update_fields(&path(), FieldUpdates::new().increment("totalPoints", 7))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some(json!(7))]);
    }

    #[tokio::test]
    async fn test_offline_rejects_everything() {
        let store = MemoryStore::new();
        store.set_offline(true);

        assert!(store.get_document(&path()).await.unwrap_err().is_transient());
        assert!(store.set_document(&path(), Document::new()).await.is_err());

        store.clear_failures();
        assert!(store.get_document(&path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_writes_to_one_collection() {
        let store = MemoryStore::new();
        store.fail_writes_to("leaderboard");

        let board = DocPath::leaderboard("student-1").unwrap();
        assert!(store.set_document(&board, Document::new()).await.is_err());
        assert!(store.set_document(&path(), Document::new()).await.is_ok());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_list_collection_filters() {
        let store = MemoryStore::new();
        store
            .set_document(&DocPath::leaderboard("b").unwrap(), Document::new())
            .await
            .unwrap();
        store
            .set_document(&DocPath::leaderboard("a").unwrap(), Document::new())
            .await
            .unwrap();
        store.set_document(&path(), Document::new()).await.unwrap();

        let ids: Vec<String> = store
            .list_collection("leaderboard")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_fail_update_number_fails_once() {
        let store = MemoryStore::new();
        store.set_document(&path(), Document::new()).await.unwrap();
        store.fail_update_number(2);

        let bump = || FieldUpdates::new().increment("totalPoints", 1);
        assert!(store.update_fields(&path(), bump()).await.is_ok());
        assert!(store.update_fields(&path(), bump()).await.is_err());
        assert!(store.update_fields(&path(), bump()).await.is_ok());
        assert_eq!(store.peek(&path()).unwrap()["totalPoints"], json!(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_notifications_follow_commit_order() {
        let store = Arc::new(MemoryStore::new());
        store.set_yielding(true);
        store.set_document(&path(), Document::new()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(&path(), move |doc| {
            let points = doc.get("totalPoints").and_then(|v| v.as_i64()).unwrap_or(0);
            sink.lock().unwrap().push(points);
        });

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for _ in 0..25 {
                        store
                            .update_fields(&path(), FieldUpdates::new().increment("totalPoints", 1))
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 200);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
