//! Document codec: change event -> index mutation.
//!
//! Pure transformation. A record that cannot be mapped is reported through
//! [`SkipReason`] so the caller can fail that record alone.

use thiserror::Error;
use tracing::trace;

use crate::attribute::{AttributeValue, Image};
use crate::config::Settings;
use crate::document::{DocumentId, FieldValue, IndexedDocument, Mutation};
use crate::event::{ChangeEvent, Operation};

/// Why a change event produced no mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// Undecodable record, missing image, or a missing or mistyped key
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// eventName the indexer does not handle
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// Key layout of the source table and field typing overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Partition key attribute name
    pub partition_key: String,
    /// Sort key attribute name (None for hash-only tables)
    pub sort_key: Option<String>,
    /// String attributes indexed as exact-match keywords
    pub keyword_attributes: Vec<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            partition_key: "PK".to_string(),
            sort_key: Some("SK".to_string()),
            keyword_attributes: Vec::new(),
        }
    }
}

impl CodecConfig {
    /// Hash-only table keyed by `partition_key`.
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
            keyword_attributes: Vec::new(),
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn with_keyword_attributes(mut self, names: Vec<String>) -> Self {
        self.keyword_attributes = names;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            partition_key: settings.partition_key.clone(),
            sort_key: settings.sort_key.clone().filter(|s| !s.is_empty()),
            keyword_attributes: settings.keyword_attributes.clone(),
        }
    }

    fn is_key_attribute(&self, name: &str) -> bool {
        name == self.partition_key || self.sort_key.as_deref() == Some(name)
    }

    fn is_keyword(&self, name: &str) -> bool {
        self.is_key_attribute(name) || self.keyword_attributes.iter().any(|k| k == name)
    }
}

/// Maps change events to [`Mutation`]s.
#[derive(Debug, Clone, Default)]
pub struct DocumentCodec {
    config: CodecConfig,
}

impl DocumentCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode one change event.
    ///
    /// Insert and modify project the new image; remove resolves the document
    /// id from the old image, falling back to the record keys.
    pub fn encode(&self, event: &ChangeEvent) -> Result<Mutation, SkipReason> {
        if let Some(error) = event.decode_error() {
            return Err(SkipReason::Malformed(format!("undecodable record: {}", error)));
        }
        match event.operation {
            Operation::Insert | Operation::Modify => {
                let image = event.new_image().ok_or_else(|| {
                    SkipReason::Malformed(format!("{} without NewImage", event.operation))
                })?;
                Ok(Mutation::Upsert(self.project(image)?))
            }
            Operation::Remove => {
                let image = event
                    .old_image()
                    .or_else(|| event.keys())
                    .ok_or_else(|| {
                        SkipReason::Malformed("REMOVE without OldImage or Keys".to_string())
                    })?;
                Ok(Mutation::Delete(self.document_id(image)?))
            }
            Operation::Unknown => Err(SkipReason::UnsupportedOperation(
                "unrecognized eventName".to_string(),
            )),
        }
    }

    /// Derive the document id from the key attributes of an image.
    pub fn document_id(&self, image: &Image) -> Result<DocumentId, SkipReason> {
        let partition = key_value(image, &self.config.partition_key)?;
        let sort = match &self.config.sort_key {
            Some(name) => Some(key_value(image, name)?),
            None => None,
        };
        Ok(DocumentId::from_keys(partition, sort))
    }

    /// Project every supported attribute of the image.
    pub fn project(&self, image: &Image) -> Result<IndexedDocument, SkipReason> {
        let mut doc = IndexedDocument::new(self.document_id(image)?);
        for (name, value) in image {
            match self.project_value(name, value) {
                Some(field) => {
                    doc.fields.insert(name.clone(), field);
                }
                None => trace!(attribute = %name, kind = value.type_name(), "Omitting attribute"),
            }
        }
        Ok(doc)
    }

    fn project_value(&self, name: &str, value: &AttributeValue) -> Option<FieldValue> {
        match value {
            AttributeValue::S(s) if self.config.is_keyword(name) => Some(FieldValue::keyword(s)),
            AttributeValue::S(s) => Some(FieldValue::text(s)),
            AttributeValue::N(n) => Some(FieldValue::keyword(n)),
            AttributeValue::Bool(b) => Some(FieldValue::keyword(b.to_string())),
            AttributeValue::Null(_) => Some(FieldValue::Null),
            AttributeValue::Ss(values) => Some(FieldValue::text(values.join(" "))),
            AttributeValue::Ns(_)
            | AttributeValue::B(_)
            | AttributeValue::Bs(_)
            | AttributeValue::L(_)
            | AttributeValue::M(_) => None,
        }
    }
}

fn key_value<'a>(image: &'a Image, name: &str) -> Result<&'a str, SkipReason> {
    let attr = image
        .get(name)
        .ok_or_else(|| SkipReason::Malformed(format!("{} missing", name)))?;
    match attr.as_key() {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(SkipReason::Malformed(format!("{} is empty", name))),
        None => Err(SkipReason::Malformed(format!(
            "{} has non-key type {}",
            name,
            attr.type_name()
        ))),
    }
}
