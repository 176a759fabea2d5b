//! In-memory document store for development and testing.

use crate::document::{Filter, Update};
use crate::error::{Result, StoreError};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Thread-safe in-memory [`DocumentStore`].
///
/// The whole map sits behind one mutex, so every `update_one` is trivially
/// atomic. Ephemeral; intended for tests and single-process development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all documents. Test isolation helper.
    pub fn clear(&self) {
        self.docs.lock().unwrap().clear();
    }
}

fn doc_id(doc: &Value) -> Result<String> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Malformed("document missing string id".to_string()))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, doc: Value) -> Result<()> {
        let id = doc_id(&doc)?;
        self.docs.lock().unwrap().insert(id, doc);
        Ok(())
    }

    async fn find_one(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.docs.lock().unwrap().get(id).cloned())
    }

    async fn update_one(&self, id: &str, filter: Filter, update: Update) -> Result<u64> {
        let mut docs = self.docs.lock().unwrap();
        let Some(doc) = docs.get_mut(id) else {
            return Ok(0);
        };
        if !filter.matches(doc) {
            return Ok(0);
        }
        update.apply(doc);
        Ok(1)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Value>> {
        let docs = self.docs.lock().unwrap();
        let mut owned: Vec<Value> = docs
            .values()
            .filter(|doc| doc.get("ownerId").and_then(Value::as_str) == Some(owner_id))
            .cloned()
            .collect();
        owned.sort_by_key(|doc| {
            std::cmp::Reverse(doc.get("createdAt").and_then(Value::as_i64).unwrap_or(0))
        });
        Ok(owned)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::new();
        store
            .insert_one(json!({"id": "b1", "ownerId": "u1"}))
            .await
            .unwrap();

        let doc = store.find_one("b1").await.unwrap().unwrap();
        assert_eq!(doc["ownerId"], "u1");
        assert!(store.find_one("b2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_requires_id() {
        let store = MemoryStore::new();
        let result = store.insert_one(json!({"ownerId": "u1"})).await;
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_conditional_update_matched() {
        let store = MemoryStore::new();
        store
            .insert_one(json!({"id": "b1", "planUpdating": false}))
            .await
            .unwrap();

        let matched = store
            .update_one(
                "b1",
                Filter::new().eq("planUpdating", false),
                Update::new().set("planUpdating", true),
            )
            .await
            .unwrap();
        assert_eq!(matched, 1);

        // Second attempt no longer matches.
        let matched = store
            .update_one(
                "b1",
                Filter::new().eq("planUpdating", false),
                Update::new().set("planUpdating", true),
            )
            .await
            .unwrap();
        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryStore::new();
        let matched = store
            .update_one("nope", Filter::new(), Update::new().set("x", 1))
            .await
            .unwrap();
        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn test_claim_race_single_winner() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_one(json!({"id": "b1", "story": {}}))
            .await
            .unwrap();

        let mut handles = vec![];
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_one(
                        "b1",
                        Filter::new()
                            .exists("story.branchCache.0:__next__", false)
                            .exists("story.branchPending.0:__next__", false),
                        Update::new().set("story.branchPending.0:__next__", 1000),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            winners += handle.await.unwrap();
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_list_for_owner_sorted() {
        let store = MemoryStore::new();
        store
            .insert_one(json!({"id": "a", "ownerId": "u1", "createdAt": 10}))
            .await
            .unwrap();
        store
            .insert_one(json!({"id": "b", "ownerId": "u1", "createdAt": 20}))
            .await
            .unwrap();
        store
            .insert_one(json!({"id": "c", "ownerId": "u2", "createdAt": 30}))
            .await
            .unwrap();

        let owned = store.list_for_owner("u1").await.unwrap();
        assert_eq!(owned.len(), 2);
        assert_eq!(owned[0]["id"], "b");
        assert_eq!(owned[1]["id"], "a");
    }
}
