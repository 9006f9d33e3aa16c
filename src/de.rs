//! # Strict JSON decoding
//!
//! Serialization uses `serde` impls on the model types directly; decoding has
//! to resolve type names against a live [`Schema`](crate::Schema), so it goes
//! through `from_json` constructors that share the helpers in this module.
use crate::schema::Attrs;
use displaydoc::Display;
use serde_json::{Map, Value};
use thiserror::Error;

/// Error decoding a document value
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum JsonError {
    /// Invalid input for {what}: expected an object
    ExpectedObject {
        /// What was being decoded
        what: &'static str,
    },
    /// Invalid input for {what}: expected an array
    ExpectedArray {
        /// What was being decoded
        what: &'static str,
    },
    /// Invalid input for {what}: expected a string
    ExpectedString {
        /// What was being decoded
        what: &'static str,
    },
    /// Missing property "{key}" on {what}
    MissingProperty {
        /// The property that was missing
        key: &'static str,
        /// What was being decoded
        what: &'static str,
    },
    /// Unknown node type: {name}
    UnknownNodeType {
        /// The name that did not resolve
        name: String,
    },
    /// Unknown mark type: {name}
    UnknownMarkType {
        /// The name that did not resolve
        name: String,
    },
    /// Empty text nodes are not allowed
    EmptyText,
    /// Invalid attributes: {0}
    Attrs(String),
}

pub(crate) fn expect_object<'v>(
    value: &'v Value,
    what: &'static str,
) -> Result<&'v Map<String, Value>, JsonError> {
    value.as_object().ok_or(JsonError::ExpectedObject { what })
}

pub(crate) fn expect_array<'v>(
    value: &'v Value,
    what: &'static str,
) -> Result<&'v [Value], JsonError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or(JsonError::ExpectedArray { what })
}

pub(crate) fn expect_str<'v>(value: &'v Value, what: &'static str) -> Result<&'v str, JsonError> {
    value.as_str().ok_or(JsonError::ExpectedString { what })
}

pub(crate) fn expect_attrs(value: &Value) -> Result<Attrs, JsonError> {
    value
        .as_object()
        .cloned()
        .ok_or(JsonError::ExpectedObject { what: "attrs" })
}

pub(crate) fn require<'v>(
    obj: &'v Map<String, Value>,
    key: &'static str,
    what: &'static str,
) -> Result<&'v Value, JsonError> {
    obj.get(key).ok_or(JsonError::MissingProperty { key, what })
}
