//! # DOM output descriptions
//!
//! The core model never touches a real DOM. What it shares with a serializer
//! is a small recursive description language: a piece of output is either
//! text, an element with attributes and children, or the "hole" marking the
//! unique place where a node's children belong. This module defines that
//! structure and the validation a serializer relies on.
use displaydoc::Display;
use serde_json::Value;
use thiserror::Error;

/// Error in a DOM output description
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DomSpecError {
    /// Multiple content holes
    MultipleHoles,
    /// Content hole must be the only child of its parent node
    HoleNotSoleChild,
    /// Content hole may not be the root of the output
    RootHole,
    /// Malformed output description: {0}
    Malformed(String),
}

/// A description of a DOM structure. Can be either a string, which is
/// interpreted as a text node, an element description, or the number zero in
/// the JSON encoding, which is the "hole" that indicates the place where a
/// node's child nodes should be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomOutputSpec {
    /// A text node with the given content.
    Text(String),
    /// An element, with a tag name (which may carry an `"<ns> "` namespace
    /// prefix), string-valued attributes, and child output descriptions.
    Element {
        /// The tag name
        name: String,
        /// Attribute name/value pairs. Names may also carry a namespace
        /// prefix.
        attrs: Vec<(String, String)>,
        /// The element's children
        children: Vec<DomOutputSpec>,
    },
    /// The position at which a node's children are placed.
    Hole,
}

impl DomOutputSpec {
    /// Split a possibly namespaced name into its namespace and local part.
    pub fn split_namespace(name: &str) -> (Option<&str>, &str) {
        if let Some(rest) = name.strip_prefix('<') {
            if let Some((ns, local)) = rest.split_once("> ") {
                return (Some(ns), local);
            }
        }
        (None, name)
    }

    /// Check the hole invariants: at most one hole anywhere in the
    /// description, never at the root, and always the sole child of its
    /// parent.
    pub fn validate(&self) -> Result<(), DomSpecError> {
        if matches!(self, DomOutputSpec::Hole) {
            return Err(DomSpecError::RootHole);
        }
        let mut holes = 0;
        self.count_holes(&mut holes)?;
        Ok(())
    }

    fn count_holes(&self, holes: &mut usize) -> Result<(), DomSpecError> {
        if let DomOutputSpec::Element { children, .. } = self {
            let has_hole = children.iter().any(|c| matches!(c, DomOutputSpec::Hole));
            if has_hole && children.len() != 1 {
                return Err(DomSpecError::HoleNotSoleChild);
            }
            for child in children {
                if matches!(child, DomOutputSpec::Hole) {
                    *holes += 1;
                    if *holes > 1 {
                        return Err(DomSpecError::MultipleHoles);
                    }
                } else {
                    child.count_holes(holes)?;
                }
            }
        }
        Ok(())
    }

    /// Whether this description contains a content hole.
    pub fn has_hole(&self) -> bool {
        match self {
            DomOutputSpec::Hole => true,
            DomOutputSpec::Text(_) => false,
            DomOutputSpec::Element { children, .. } => children.iter().any(Self::has_hole),
        }
    }

    /// Decode the array encoding of an output description: a string is a
    /// text node, the number `0` is the hole, and an array is
    /// `[tag_name, attrs?, ...children]` where `attrs` is an object with
    /// string values. The result is validated.
    pub fn from_json(value: &Value) -> Result<DomOutputSpec, DomSpecError> {
        let spec = Self::decode(value)?;
        spec.validate()?;
        Ok(spec)
    }

    fn decode(value: &Value) -> Result<DomOutputSpec, DomSpecError> {
        match value {
            Value::String(text) => Ok(DomOutputSpec::Text(text.clone())),
            Value::Number(n) if n.as_u64() == Some(0) => Ok(DomOutputSpec::Hole),
            Value::Array(items) => {
                let name = items
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| DomSpecError::Malformed("missing tag name".to_owned()))?
                    .to_owned();
                let mut attrs = Vec::new();
                let mut rest = &items[1..];
                if let Some(Value::Object(map)) = rest.first() {
                    for (key, value) in map {
                        let value = value.as_str().ok_or_else(|| {
                            DomSpecError::Malformed(format!("non-string attribute {}", key))
                        })?;
                        attrs.push((key.clone(), value.to_owned()));
                    }
                    rest = &rest[1..];
                }
                let children = rest.iter().map(Self::decode).collect::<Result<_, _>>()?;
                Ok(DomOutputSpec::Element {
                    name,
                    attrs,
                    children,
                })
            }
            other => Err(DomSpecError::Malformed(format!(
                "unexpected value {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DomOutputSpec, DomSpecError};
    use serde_json::json;

    #[test]
    fn decodes_the_array_encoding() {
        let spec = DomOutputSpec::from_json(&json!(["p", 0])).unwrap();
        assert_eq!(
            spec,
            DomOutputSpec::Element {
                name: "p".to_owned(),
                attrs: vec![],
                children: vec![DomOutputSpec::Hole],
            }
        );

        let spec =
            DomOutputSpec::from_json(&json!(["a", {"href": "http://x"}, "label"])).unwrap();
        match spec {
            DomOutputSpec::Element { attrs, children, .. } => {
                assert_eq!(attrs, vec![("href".to_owned(), "http://x".to_owned())]);
                assert_eq!(children, vec![DomOutputSpec::Text("label".to_owned())]);
            }
            other => panic!("unexpected spec {:?}", other),
        }
    }

    #[test]
    fn rejects_multiple_holes() {
        let err = DomOutputSpec::from_json(&json!(["div", ["p", 0], ["p", 0]])).unwrap_err();
        assert_eq!(err, DomSpecError::MultipleHoles);
    }

    #[test]
    fn hole_must_be_sole_child() {
        let err = DomOutputSpec::from_json(&json!(["p", "before", 0])).unwrap_err();
        assert_eq!(err, DomSpecError::HoleNotSoleChild);
    }

    #[test]
    fn hole_may_not_be_root() {
        assert_eq!(
            DomOutputSpec::from_json(&json!(0)).unwrap_err(),
            DomSpecError::RootHole
        );
    }

    #[test]
    fn splits_namespaces() {
        assert_eq!(
            DomOutputSpec::split_namespace("<http://www.w3.org/2000/svg> svg"),
            (Some("http://www.w3.org/2000/svg"), "svg")
        );
        assert_eq!(DomOutputSpec::split_namespace("div"), (None, "div"));
    }
}
