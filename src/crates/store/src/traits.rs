//! Storage trait the coordination layer is written against.
//!
//! The engine coordinates concurrent workers exclusively through
//! [`DocumentStore::update_one`]: a conditional update that evaluates a
//! [`Filter`] against the current document and applies an [`Update`] only
//! when it matches, atomically with respect to other writers of the same
//! document. Backends must guarantee per-document compare-and-set semantics
//! and strong read-your-writes consistency for a single writer.

use crate::document::{Filter, Update};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A store of JSON documents keyed by id, with conditional updates.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. The document must carry a string `id` field.
    async fn insert_one(&self, doc: Value) -> Result<()>;

    /// Fetch a whole document by id.
    async fn find_one(&self, id: &str) -> Result<Option<Value>>;

    /// Conditionally update the document with the given id.
    ///
    /// Returns the matched count: 1 when the filter held and the update was
    /// applied, 0 when the document is missing or the filter did not match.
    /// The evaluate-and-apply step is atomic per document.
    async fn update_one(&self, id: &str, filter: Filter, update: Update) -> Result<u64>;

    /// List documents owned by the given user, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Value>>;

    /// Cheap backend liveness probe.
    async fn health_check(&self) -> Result<()>;
}
