// SPDX-License-Identifier: MPL-2.0

use crate::remote::{DocPath, Document, DocumentStore, FieldUpdates, StoreError, Subscription};
use crate::store::SqliteStore;
use crate::store::fields::apply_updates;
use rusqlite::{Connection, OptionalExtension, params};

fn read_doc(conn: &Connection, path: &DocPath) -> Result<Option<Document>, StoreError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT data_json FROM documents WHERE path = ?",
            [path.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    json.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
        .transpose()
}

fn write_doc(conn: &Connection, path: &DocPath, doc: &Document) -> Result<(), StoreError> {
    let json = serde_json::to_string(doc)?;

    conn.execute(
        r#"
        INSERT INTO documents (path, collection, doc_id, data_json, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(path) DO UPDATE SET
            data_json = excluded.data_json,
            updated_at = excluded.updated_at
        "#,
        params![
            path.to_string(),
            path.collection(),
            path.id(),
            json,
            SqliteStore::now(),
        ],
    )?;

    Ok(())
}

impl DocumentStore for SqliteStore {
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let conn = self.conn();
        read_doc(&conn, path)
    }

    async fn set_document(&self, path: &DocPath, data: Document) -> Result<(), StoreError> {
        let _dispatch = self.dispatch();
        {
            let conn = self.conn();
            write_doc(&conn, path, &data)?;
        }
        self.listeners.notify(&path.to_string(), &data);
        Ok(())
    }

    async fn update_fields(&self, path: &DocPath, updates: FieldUpdates) -> Result<(), StoreError> {
        let _dispatch = self.dispatch();
        let updated = {
            let mut conn = self.conn();
            let tx = conn.transaction()?;

            let mut doc =
                read_doc(&tx, path)?.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            apply_updates(&mut doc, &updates)?;
            write_doc(&tx, path, &doc)?;

            tx.commit()?;
            doc
        };

        self.listeners.notify(&path.to_string(), &updated);
        Ok(())
    }

    async fn list_collection(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT doc_id, data_json
            FROM documents
            WHERE collection = ?
            ORDER BY doc_id ASC
            "#,
        )?;

        let mut rows = stmt.query([collection])?;
        let mut docs = Vec::new();

        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let json: String = row.get(1)?;
            docs.push((id, serde_json::from_str(&json)?));
        }

        Ok(docs)
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
    use std::sync::{Arc, Mutex};

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        let path = DocPath::student("kid-1").unwrap();

        store
            .set_document(&path, doc(json!({ "name": "Ada", "grade": 2 })))
            .await
            .unwrap();

        let loaded = store.get_document(&path).await.unwrap().unwrap();
        assert_eq!(loaded["name"], json!("Ada"));
        assert!(store
            .get_document(&DocPath::student("nobody").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_applies_nested_increment_and_notifies() {
        let store = SqliteStore::open_in_memory().unwrap();
        let path = DocPath::progress("kid-1").unwrap();
        store
            .set_document(&path, doc(json!({ "totalPoints": 10 })))
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(&path, move |d| {
            *sink.lock().unwrap() = d.get("totalPoints").cloned();
        });

        store
            .update_fields(
                &path,
                FieldUpdates::new()
                    .increment("totalPoints", 5)
                    .increment("subjectProgress.gk.points", 5),
            )
            .await
            .unwrap();

        let loaded = store.get_document(&path).await.unwrap().unwrap();
        assert_eq!(loaded["totalPoints"], json!(15));
        assert_eq!(loaded["subjectProgress"]["gk"]["points"], json!(5));
        assert_eq!(*seen.lock().unwrap(), Some(json!(15)));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_document_untouched() {
        let store = SqliteStore::open_in_memory().unwrap();
        let path = DocPath::progress("kid-1").unwrap();
        store
            .set_document(&path, doc(json!({ "totalPoints": 10, "name": "x" })))
            .await
            .unwrap();

        let result = store
            .update_fields(
                &path,
                FieldUpdates::new()
                    .increment("totalPoints", 5)
                    .increment("name", 1),
            )
            .await;
        assert!(result.is_err());

        let loaded = store.get_document(&path).await.unwrap().unwrap();
        assert_eq!(loaded["totalPoints"], json!(10));
    }

    #[tokio::test]
    async fn test_list_collection_ordered_by_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        for id in ["c", "a", "b"] {
            store
                .set_document(&DocPath::leaderboard(id).unwrap(), doc(json!({ "id": id })))
                .await
                .unwrap();
        }

        let ids: Vec<String> = store
            .list_collection("leaderboard")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_notify_in_commit_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let path = DocPath::progress("kid-1").unwrap();
        store.set_document(&path, Document::new()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(&path, move |d| {
            let points = d.get("totalPoints").and_then(|v| v.as_i64()).unwrap_or(0);
            sink.lock().unwrap().push(points);
        });

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let (store, path) = (store.clone(), path.clone());
                tokio::spawn(async move {
                    for _ in 0..20 {
                        store
                            .update_fields(&path, FieldUpdates::new().increment("totalPoints", 1))
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
        assert_eq!(seen.len(), 80);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
