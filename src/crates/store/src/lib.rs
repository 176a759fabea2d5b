//! Document store adapter for taletwo.
//!
//! The engine coordinates multiple workers through conditional updates on a
//! single book document; this crate supplies that primitive. It defines the
//! [`DocumentStore`] trait, the typed [`Filter`]/[`Update`] language its
//! conditional updates are expressed in, and two backends:
//!
//! - [`MemoryStore`] — mutex-guarded map for tests and development
//! - [`SqliteStore`] — sqlx-backed, one JSON document per row, optimistic
//!   version CAS so concurrent conditional updates never lose writes
//!
//! Backends are interchangeable behind `Arc<dyn DocumentStore>`.

pub mod document;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use document::{get_path, Filter, Update};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::DocumentStore;
