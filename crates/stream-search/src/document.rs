//! Mapping between indexed documents and Tantivy documents.

use std::collections::BTreeMap;

use tantivy::schema::{OwnedValue, Value};
use tantivy::TantivyDocument;

use stream_types::{DocumentId, FieldValue, IndexedDocument};

use crate::error::SearchError;
use crate::schema::SearchSchema;

/// Convert an IndexedDocument to a Tantivy document.
///
/// Text values go to `text`, keyword values to `keywords`, every non-null
/// value to the `fields` object, and the whole field map to `source`.
pub fn record_to_doc(
    schema: &SearchSchema,
    record: &IndexedDocument,
) -> Result<TantivyDocument, SearchError> {
    let mut doc = TantivyDocument::default();
    doc.add_text(schema.doc_id, record.document_id.as_str());

    for text in record.text_values() {
        doc.add_text(schema.text, text);
    }
    for keyword in record.keyword_values() {
        doc.add_text(schema.keywords, keyword);
    }

    let object: BTreeMap<String, OwnedValue> = record
        .fields
        .iter()
        .filter_map(|(name, value)| {
            value
                .as_str()
                .map(|s| (name.clone(), OwnedValue::Str(s.to_string())))
        })
        .collect();
    if !object.is_empty() {
        doc.add_object(schema.fields, object);
    }

    doc.add_text(schema.source, serde_json::to_string(&record.fields)?);
    Ok(doc)
}

/// Rebuild the IndexedDocument from the stored fields of a Tantivy document.
pub fn doc_to_record(
    schema: &SearchSchema,
    doc: &TantivyDocument,
) -> Result<IndexedDocument, SearchError> {
    let doc_id = doc
        .get_first(schema.doc_id)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SearchError::Corrupted("document without doc_id".to_string()))?;

    let source = doc
        .get_first(schema.source)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SearchError::Corrupted(format!("{} has no stored source", doc_id)))?;

    let fields: BTreeMap<String, FieldValue> = serde_json::from_str(source)
        .map_err(|e| SearchError::Corrupted(format!("{}: {}", doc_id, e)))?;

    Ok(IndexedDocument {
        document_id: DocumentId::new(doc_id),
        fields,
    })
}
