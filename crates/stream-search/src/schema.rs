//! Tantivy schema for projected change-stream records.
//!
//! Every document carries its id, a catch-all text field, a keyword field,
//! a JSON object of all projected attributes (so `name:term` targets a single
//! attribute) and the serialized field map used to rebuild the document.

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

use crate::SearchError;

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct SearchSchema {
    schema: Schema,
    /// Document id `PK` or `PK:SK` (STRING | STORED)
    pub doc_id: Field,
    /// Text attribute values, one value per attribute (TEXT)
    pub text: Field,
    /// Keyword attribute values, untokenized (STRING)
    pub keywords: Field,
    /// Attribute name -> value (JSON, TEXT)
    pub fields: Field,
    /// Serialized field map (STORED)
    pub source: Field,
}

impl SearchSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create a SearchSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {} field", name)))
        };

        Ok(Self {
            doc_id: field("doc_id")?,
            text: field("text")?,
            keywords: field("keywords")?,
            fields: field("fields")?,
            source: field("source")?,
            schema,
        })
    }

    /// Fields a bare query term is matched against.
    pub fn default_search_fields(&self) -> Vec<Field> {
        vec![self.text, self.keywords, self.fields]
    }
}

/// Build the record index schema.
pub fn build_record_schema() -> SearchSchema {
    let mut schema_builder = Schema::builder();

    let doc_id = schema_builder.add_text_field("doc_id", STRING | STORED);
    let text = schema_builder.add_text_field("text", TEXT);
    let keywords = schema_builder.add_text_field("keywords", STRING);
    let fields = schema_builder.add_json_field("fields", TEXT);
    let source = schema_builder.add_text_field("source", STORED);

    let schema = schema_builder.build();

    SearchSchema {
        schema,
        doc_id,
        text,
        keywords,
        fields,
        source,
    }
}
