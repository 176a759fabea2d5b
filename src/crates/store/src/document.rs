//! Typed filter/update language over JSON documents.
//!
//! The branch coordinator's claims and takeovers are expressed as
//! conditional updates: a [`Filter`] of conditions that must all hold on the
//! current document, and an [`Update`] of set/unset operations applied when
//! it does. Paths are dotted and may address dynamic map keys
//! (`story.branchPending.3:__next__`); intermediate objects are created on
//! set, mirroring `$set` semantics in document databases.

use serde_json::{Map, Value};

/// One condition in a filter. All conditions are conjunctive.
#[derive(Debug, Clone)]
enum Cond {
    /// Field presence (or required absence).
    Exists { path: String, exists: bool },
    /// Equality on a nested field.
    Eq { path: String, value: Value },
    /// `field <= value`, for timestamp comparisons. Missing fields and
    /// non-numeric values never match.
    Lte { path: String, value: i64 },
}

/// Conjunction of conditions evaluated against a document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conds: Vec<Cond>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the field at `path` to exist (`exists = true`) or be absent.
    pub fn exists(mut self, path: impl Into<String>, exists: bool) -> Self {
        self.conds.push(Cond::Exists {
            path: path.into(),
            exists,
        });
        self
    }

    /// Require equality with the given value.
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conds.push(Cond::Eq {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    /// Require a numeric field to be `<=` the given value.
    pub fn lte(mut self, path: impl Into<String>, value: i64) -> Self {
        self.conds.push(Cond::Lte {
            path: path.into(),
            value,
        });
        self
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        self.conds.iter().all(|cond| match cond {
            Cond::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
            Cond::Eq { path, value } => get_path(doc, path) == Some(value),
            Cond::Lte { path, value } => get_path(doc, path)
                .and_then(Value::as_i64)
                .map(|field| field <= *value)
                .unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone)]
enum Op {
    Set { path: String, value: Value },
    Unset { path: String },
}

/// Ordered list of set/unset operations on dotted paths.
#[derive(Debug, Clone, Default)]
pub struct Update {
    ops: Vec<Op>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field at `path`, creating intermediate objects as needed.
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(Op::Set {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    /// Remove the field at `path`. Missing fields are a no-op.
    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.ops.push(Op::Unset { path: path.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all operations to the document, in order.
    pub fn apply(&self, doc: &mut Value) {
        for op in &self.ops {
            match op {
                Op::Set { path, value } => set_path(doc, path, value.clone()),
                Op::Unset { path } => unset_path(doc, path),
            }
        }
    }
}

/// Navigate a dotted path through nested objects.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments[..segments.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just coerced to object")
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        if let Some(last) = segments.last() {
            map.insert(last.to_string(), value);
        }
    }
}

fn unset_path(doc: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = doc;
    for segment in &segments[..segments.len() - 1] {
        match current.as_object_mut().and_then(|m| m.get_mut(*segment)) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let (Some(map), Some(last)) = (current.as_object_mut(), segments.last()) {
        map.remove(*last);
    }
}
