//! DynamoDB attribute values as they appear in stream record images.
//!
//! Images use the typed JSON encoding of DynamoDB, one key per value:
//! `{"S": "text"}`, `{"N": "42"}`, `{"SS": ["a", "b"]}` and so on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A record snapshot: attribute name to typed value.
pub type Image = HashMap<String, AttributeValue>;

/// A single typed DynamoDB attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String
    #[serde(rename = "S")]
    S(String),
    /// Number, transported as its decimal string
    #[serde(rename = "N")]
    N(String),
    /// Boolean
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Explicit null
    #[serde(rename = "NULL")]
    Null(bool),
    /// String set
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    /// Number set
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    /// Binary, base64 encoded
    #[serde(rename = "B")]
    B(String),
    /// Binary set, base64 encoded
    #[serde(rename = "BS")]
    Bs(Vec<String>),
    /// List of values
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    /// Nested map
    #[serde(rename = "M")]
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// DynamoDB type descriptor ("S", "N", ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null(_) => "NULL",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::B(_) => "B",
            AttributeValue::Bs(_) => "BS",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
        }
    }

    /// String payload of an `S` value.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Key-compatible scalar rendering: `S` and `N` values only.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            AttributeValue::S(value) | AttributeValue::N(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn s(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    pub fn n(value: impl ToString) -> Self {
        AttributeValue::N(value.to_string())
    }
}
