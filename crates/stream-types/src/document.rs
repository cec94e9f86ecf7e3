//! Indexed documents and index mutations.
//!
//! An [`IndexedDocument`] is the projection of a source record that the
//! index stores. Its [`DocumentId`] is derived from the record's primary key
//! so that every version of a record maps to the same document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stable identity of an indexed document: `PK` or `PK:SK`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Compose the id from partition key and optional sort key.
    pub fn from_keys(partition_key: &str, sort_key: Option<&str>) -> Self {
        match sort_key {
            Some(sort_key) => Self(format!("{}:{}", partition_key, sort_key)),
            None => Self(partition_key.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Value of a single indexed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Tokenized full-text value
    Text(String),
    /// Exact-match value, not tokenized
    Keyword(String),
    /// Present in the source record but null
    Null,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn keyword(value: impl Into<String>) -> Self {
        FieldValue::Keyword(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) | FieldValue::Keyword(value) => Some(value.as_str()),
            FieldValue::Null => None,
        }
    }

    /// Plain JSON rendering used in query responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self.as_str() {
            Some(value) => serde_json::Value::String(value.to_string()),
            None => serde_json::Value::Null,
        }
    }
}

/// A document ready to be written to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub document_id: DocumentId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl IndexedDocument {
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Full-text values, in field-name order.
    pub fn text_values(&self) -> impl Iterator<Item = &str> {
        self.fields.values().filter_map(|value| match value {
            FieldValue::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Keyword values, in field-name order.
    pub fn keyword_values(&self) -> impl Iterator<Item = &str> {
        self.fields.values().filter_map(|value| match value {
            FieldValue::Keyword(keyword) => Some(keyword.as_str()),
            _ => None,
        })
    }

    /// Fields as a plain JSON object (null for null fields).
    pub fn fields_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

/// What a change event does to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Replace (or create) the document with this id
    Upsert(IndexedDocument),
    /// Remove the document with this id, if present
    Delete(DocumentId),
}

impl Mutation {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            Mutation::Upsert(doc) => &doc.document_id,
            Mutation::Delete(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_from_keys() {
        assert_eq!(DocumentId::from_keys("a", Some("b")).as_str(), "a:b");
        assert_eq!(DocumentId::from_keys("a", None).as_str(), "a");
        assert!(DocumentId::from("doc1") < DocumentId::from("doc2"));
    }

    #[test]
    fn test_field_value_storage_format() {
        let json = serde_json::to_string(&FieldValue::keyword("42")).unwrap();
        assert_eq!(json, r#"{"type":"keyword","value":"42"}"#);

        let null: FieldValue = serde_json::from_str(r#"{"type":"null"}"#).unwrap();
        assert_eq!(null, FieldValue::Null);
    }

    #[test]
    fn test_value_iterators() {
        let doc = IndexedDocument::new(DocumentId::new("d"))
            .with_field("body", FieldValue::text("red fox"))
            .with_field("PK", FieldValue::keyword("d"))
            .with_field("deleted_at", FieldValue::Null);

        assert_eq!(doc.text_values().collect::<Vec<_>>(), vec!["red fox"]);
        assert_eq!(doc.keyword_values().collect::<Vec<_>>(), vec!["d"]);

        let json = doc.fields_json();
        assert_eq!(json["body"], serde_json::json!("red fox"));
        assert!(json["deleted_at"].is_null());
    }

    #[test]
    fn test_mutation_document_id() {
        let id = DocumentId::new("x");
        assert_eq!(Mutation::Delete(id.clone()).document_id(), &id);
        assert_eq!(
            Mutation::Upsert(IndexedDocument::new(id.clone())).document_id(),
            &id
        );
    }
}
