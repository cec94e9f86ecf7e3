//! # stream-types
//!
//! Shared domain types for the stream indexer.
//!
//! This crate defines the data that flows from the change stream into the
//! index:
//! - Change events: DynamoDB Streams records (insert/modify/remove with images)
//! - Indexed documents: the projection of a source record that gets indexed
//! - Document codec: pure mapping from a change event to an index mutation
//! - Settings: layered configuration shared by the writer and reader paths
//!
//! ## Usage
//!
//! ```rust
//! use stream_types::{ChangeBatch, CodecConfig, DocumentCodec};
//!
//! let batch = ChangeBatch::from_json(r#"{"Records": []}"#).unwrap();
//! let codec = DocumentCodec::new(CodecConfig::default());
//! assert!(batch.records.iter().all(|event| codec.encode(event).is_ok()));
//! ```

pub mod attribute;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod event;

pub use attribute::{AttributeValue, Image};
pub use codec::{CodecConfig, DocumentCodec, SkipReason};
pub use config::{ApplyErrorPolicy, Settings};
pub use document::{DocumentId, FieldValue, IndexedDocument, Mutation};
pub use error::TypesError;
pub use event::{ChangeBatch, ChangeEvent, Operation, StreamChange};
