//! Structured documents exchanged with persistence.
//!
//! A [`Document`] is a tree of named fields holding booleans, integers,
//! strings, lists and nested sections. Areas save themselves into one and
//! load from one; a [`DocumentStore`] decides where documents live.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::area::AreaKind;
use crate::error::DocumentError;

/// A field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Section(Document),
}

impl Value {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Section(_) => "section",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Self::Section(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// A section of named fields. Keys are kept sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    entries: BTreeMap<String, Value>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Create (or replace) a nested section and return it for filling.
    pub fn create_section(&mut self, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.entries.insert(key.clone(), Value::Section(Self::new()));
        match self.entries.get_mut(&key) {
            Some(Value::Section(section)) => section,
            _ => unreachable!("section was just inserted"),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ==================== Typed accessors ====================

    /// A boolean field. Absent fields read as `false`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    #[must_use]
    pub fn get_section(&self, key: &str) -> Option<&Self> {
        match self.get(key) {
            Some(Value::Section(section)) => Some(section),
            _ => None,
        }
    }

    pub fn require_int(&self, key: &str) -> Result<i64, DocumentError> {
        match self.require(key)? {
            Value::Int(v) => Ok(*v),
            other => Err(wrong_type(key, other, "integer")),
        }
    }

    /// An integer field that must fit in `i32`.
    pub fn require_i32(&self, key: &str) -> Result<i32, DocumentError> {
        let v = self.require_int(key)?;
        i32::try_from(v).map_err(|_| DocumentError::InvalidValue {
            path: key.to_owned(),
            reason: format!("{v} does not fit in 32 bits"),
        })
    }

    pub fn require_str(&self, key: &str) -> Result<&str, DocumentError> {
        match self.require(key)? {
            Value::String(v) => Ok(v),
            other => Err(wrong_type(key, other, "string")),
        }
    }

    pub fn require_section(&self, key: &str) -> Result<&Self, DocumentError> {
        match self.require(key)? {
            Value::Section(v) => Ok(v),
            other => Err(wrong_type(key, other, "section")),
        }
    }

    /// A list of strings. Absent fields read as empty.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, DocumentError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(wrong_type(key, other, "string list")),
                })
                .collect(),
            Some(other) => Err(wrong_type(key, other, "list")),
        }
    }

    fn require(&self, key: &str) -> Result<&Value, DocumentError> {
        self.get(key)
            .ok_or_else(|| DocumentError::MissingField(key.to_owned()))
    }
}

fn wrong_type(key: &str, found: &Value, expected: &'static str) -> DocumentError {
    DocumentError::WrongType {
        path: key.to_owned(),
        expected,
        found: found.type_name(),
    }
}

/// Where area documents are kept.
///
/// Documents are addressed by area kind and name. The manager never touches
/// files itself; it only calls this contract.
pub trait DocumentStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Names of every stored document of a kind.
    fn list(&self, kind: AreaKind) -> Result<Vec<String>, Self::Error>;

    fn read(&self, kind: AreaKind, name: &str) -> Result<Document, Self::Error>;

    fn write(&mut self, kind: AreaKind, name: &str, document: &Document)
    -> Result<(), Self::Error>;

    /// Delete a document. Deleting an absent document is not an error.
    fn remove(&mut self, kind: AreaKind, name: &str) -> Result<(), Self::Error>;
}

/// In-memory store, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: BTreeMap<(AreaKind, String), Document>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, kind: AreaKind, name: &str) -> Option<&Document> {
        self.documents.get(&(kind, name.to_owned()))
    }

    pub fn insert(&mut self, kind: AreaKind, name: impl Into<String>, document: Document) {
        self.documents.insert((kind, name.into()), document);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Reading a document that does not exist.
#[derive(Debug, thiserror::Error)]
#[error("no {kind} document named {name}")]
pub struct MissingDocument {
    pub kind: AreaKind,
    pub name: String,
}

impl DocumentStore for MemoryStore {
    type Error = MissingDocument;

    fn list(&self, kind: AreaKind) -> Result<Vec<String>, Self::Error> {
        Ok(self
            .documents
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn read(&self, kind: AreaKind, name: &str) -> Result<Document, Self::Error> {
        self.get(kind, name).cloned().ok_or_else(|| MissingDocument {
            kind,
            name: name.to_owned(),
        })
    }

    fn write(
        &mut self,
        kind: AreaKind,
        name: &str,
        document: &Document,
    ) -> Result<(), Self::Error> {
        self.insert(kind, name, document.clone());
        Ok(())
    }

    fn remove(&mut self, kind: AreaKind, name: &str) -> Result<(), Self::Error> {
        self.documents.remove(&(kind, name.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut doc = Document::new();
        doc.set("name", "spawn");
        doc.set("x", -12);
        doc.set("flag", true);
        doc.set("parents", vec!["a", "b"]);

        assert_eq!(doc.require_str("name").unwrap(), "spawn");
        assert_eq!(doc.require_i32("x").unwrap(), -12);
        assert!(doc.get_bool("flag"));
        assert!(!doc.get_bool("absent"));
        assert_eq!(doc.string_list("parents").unwrap(), vec!["a", "b"]);
        assert!(doc.string_list("children").unwrap().is_empty());
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let mut doc = Document::new();
        doc.set("x", "not a number");

        assert_eq!(
            doc.require_int("y"),
            Err(DocumentError::MissingField("y".into()))
        );
        assert!(matches!(
            doc.require_int("x"),
            Err(DocumentError::WrongType { expected: "integer", .. })
        ));
        assert!(doc.require_section("x").is_err());
    }

    #[test]
    fn test_i32_range_is_checked() {
        let mut doc = Document::new();
        doc.set("x", i64::from(i32::MAX) + 1);
        assert!(matches!(
            doc.require_i32("x"),
            Err(DocumentError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_create_section_nests() {
        let mut doc = Document::new();
        doc.create_section("box").create_section("min").set("x", 1);

        let min = doc.require_section("box").unwrap().require_section("min").unwrap();
        assert_eq!(min.require_int("x").unwrap(), 1);
    }

    #[test]
    fn test_json_shape() {
        let mut doc = Document::new();
        doc.set("type", "region");
        doc.create_section("protections").set("pvp", false);
        doc.set("parents", Vec::<String>::new());

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(
            json,
            r#"{"parents":[],"protections":{"pvp":false},"type":"region"}"#
        );

        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_memory_store_lists_by_kind() {
        let mut store = MemoryStore::new();
        store.write(AreaKind::World, "world", &Document::new()).unwrap();
        store.write(AreaKind::Region, "spawn", &Document::new()).unwrap();

        assert_eq!(store.list(AreaKind::Region).unwrap(), vec!["spawn"]);
        assert!(store.read(AreaKind::Region, "nether").is_err());

        store.remove(AreaKind::Region, "spawn").unwrap();
        assert!(store.list(AreaKind::Region).unwrap().is_empty());
    }
}
