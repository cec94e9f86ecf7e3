//! Change events as delivered by the change stream.
//!
//! A change event is one DynamoDB Streams record. Insert and modify events
//! carry the new image; remove events carry the old image (or only the keys
//! for KEYS_ONLY streams). The sequence number is used for diagnostics and
//! failure reporting, never for deduplication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attribute::Image;
use crate::error::TypesError;

/// Kind of change applied to the source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "MODIFY")]
    Modify,
    #[serde(rename = "REMOVE")]
    Remove,
    /// Any eventName this indexer does not understand
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Insert => write!(f, "INSERT"),
            Operation::Modify => write!(f, "MODIFY"),
            Operation::Remove => write!(f, "REMOVE"),
            Operation::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// The `dynamodb` section of a stream record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamChange {
    /// Opaque, non-decreasing within a shard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,

    /// Primary key attributes of the changed record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Image>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Image>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Image>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_view_type: Option<String>,
}

/// A single change-stream record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    #[serde(rename = "eventName")]
    pub operation: Operation,

    #[serde(rename = "dynamodb", default)]
    pub change: StreamChange,

    /// Set when the record itself could not be decoded
    #[serde(skip)]
    pub decode_error: Option<String>,
}

impl ChangeEvent {
    fn build(
        operation: Operation,
        sequence_number: impl Into<String>,
        old_image: Option<Image>,
        new_image: Option<Image>,
    ) -> Self {
        Self {
            event_id: None,
            operation,
            change: StreamChange {
                sequence_number: Some(sequence_number.into()),
                keys: None,
                new_image,
                old_image,
                stream_view_type: None,
            },
            decode_error: None,
        }
    }

    /// Decode one raw stream record.
    ///
    /// A record that does not decode still yields an event carrying its
    /// eventID, eventName and SequenceNumber where those are readable, so it
    /// can be failed on its own.
    pub fn from_value(raw: Value) -> Self {
        match serde_json::from_value::<ChangeEvent>(raw.clone()) {
            Ok(event) => event,
            Err(e) => Self::undecodable(&raw, e.to_string()),
        }
    }

    fn undecodable(raw: &Value, error: String) -> Self {
        let text = |pointer: &str| raw.pointer(pointer).and_then(Value::as_str).map(String::from);
        let operation = raw
            .get("eventName")
            .and_then(|name| Operation::deserialize(name).ok())
            .unwrap_or(Operation::Unknown);

        Self {
            event_id: text("/eventID"),
            operation,
            change: StreamChange {
                sequence_number: text("/dynamodb/SequenceNumber"),
                ..StreamChange::default()
            },
            decode_error: Some(error),
        }
    }

    /// Create an insert event
    pub fn insert(sequence_number: impl Into<String>, new_image: Image) -> Self {
        Self::build(Operation::Insert, sequence_number, None, Some(new_image))
    }

    /// Create a modify event
    pub fn modify(
        sequence_number: impl Into<String>,
        old_image: Option<Image>,
        new_image: Image,
    ) -> Self {
        Self::build(Operation::Modify, sequence_number, old_image, Some(new_image))
    }

    /// Create a remove event
    pub fn remove(sequence_number: impl Into<String>, old_image: Image) -> Self {
        Self::build(Operation::Remove, sequence_number, Some(old_image), None)
    }

    /// Attach the primary key map
    pub fn with_keys(mut self, keys: Image) -> Self {
        self.change.keys = Some(keys);
        self
    }

    /// Attach the stream eventID
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.change.sequence_number.as_deref()
    }

    pub fn new_image(&self) -> Option<&Image> {
        self.change.new_image.as_ref()
    }

    pub fn old_image(&self) -> Option<&Image> {
        self.change.old_image.as_ref()
    }

    pub fn keys(&self) -> Option<&Image> {
        self.change.keys.as_ref()
    }

    pub fn decode_error(&self) -> Option<&str> {
        self.decode_error.as_deref()
    }
}

/// A batch of change events in arrival order.
///
/// Only the envelope must be well formed; records are decoded one at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawChangeBatch")]
pub struct ChangeBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<ChangeEvent>,
}

#[derive(Deserialize)]
struct RawChangeBatch {
    #[serde(rename = "Records", default)]
    records: Vec<Value>,
}

impl From<RawChangeBatch> for ChangeBatch {
    fn from(raw: RawChangeBatch) -> Self {
        Self {
            records: raw.records.into_iter().map(ChangeEvent::from_value).collect(),
        }
    }
}

impl ChangeBatch {
    pub fn new(records: Vec<ChangeEvent>) -> Self {
        Self { records }
    }

    /// Decode a `{"Records": [...]}` envelope.
    pub fn from_json(json: &str) -> Result<Self, TypesError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
