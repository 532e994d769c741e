// SPDX-License-Identifier: MPL-2.0

use crate::config::{LEADERBOARD_COLLECTION, PROGRESS_COLLECTION, STUDENTS_COLLECTION};
use serde_json::{Map, Value};
use std::fmt;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Address of a single document, `{collection}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: &str, id: &str) -> Option<Self> {
        let valid = |s: &str| !s.is_empty() && !s.contains('/');
        if !valid(collection) || !valid(id) {
            return None;
        }
        Some(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// Parse `collection/id`
    pub fn parse(path: &str) -> Option<Self> {
        let (collection, id) = path.split_once('/')?;
        Self::new(collection, id)
    }

    pub fn student(student_id: &str) -> Option<Self> {
        Self::new(STUDENTS_COLLECTION, student_id)
    }

    pub fn progress(student_id: &str) -> Option<Self> {
        Self::new(PROGRESS_COLLECTION, student_id)
    }

    pub fn leaderboard(student_id: &str) -> Option<Self> {
        Self::new(LEADERBOARD_COLLECTION, student_id)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A single field mutation. Applied atomically by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Add to a numeric field; a missing field counts as zero.
    Increment(i64),
    /// Append each value not already present.
    ArrayUnion(Vec<Value>),
    ArrayRemove(Vec<Value>),
    Delete,
}

/// Field updates addressed by dotted path (`subjectProgress.maths.points`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates {
    ops: Vec<(String, FieldOp)>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((path.into(), FieldOp::Set(value.into())));
        self
    }

    pub fn increment(mut self, path: impl Into<String>, by: i64) -> Self {
        self.ops.push((path.into(), FieldOp::Increment(by)));
        self
    }

    pub fn array_union(mut self, path: impl Into<String>, values: Vec<Value>) -> Self {
        self.ops.push((path.into(), FieldOp::ArrayUnion(values)));
        self
    }

    pub fn array_remove(mut self, path: impl Into<String>, values: Vec<Value>) -> Self {
        self.ops.push((path.into(), FieldOp::ArrayRemove(values)));
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.ops.push((path.into(), FieldOp::Delete));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldOp)> {
        self.ops.iter().map(|(path, op)| (path.as_str(), op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_path_parse() {
        let path = DocPath::parse("progress/abc123").unwrap();
        assert_eq!(path.collection(), "progress");
        assert_eq!(path.id(), "abc123");
        assert_eq!(path.to_string(), "progress/abc123");
    }

    #[test]
    fn test_doc_path_rejects_bad_segments() {
        assert!(DocPath::parse("progress").is_none());
        assert!(DocPath::parse("progress/").is_none());
        assert!(DocPath::parse("/abc").is_none());
        assert!(DocPath::parse("progress/abc/extra").is_none());
        assert!(DocPath::student("").is_none());
    }

    #[test]
    fn test_field_updates_keep_order() {
        let updates = FieldUpdates::new()
            .increment("totalPoints", 10)
            .set("level", 2)
            .delete("legacy");
        let paths: Vec<&str> = updates.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["totalPoints", "level", "legacy"]);
        assert_eq!(updates.len(), 3);
    }
}
