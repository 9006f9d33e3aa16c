#![warn(missing_docs)]
//! # An immutable rich-text document model
//!
//! This crate implements the content layer of a rich-text editing system: a
//! persistent tree of [`Node`]s and [`Mark`]s constrained by a runtime
//! [`Schema`], a resolver that turns flat integer positions into structural
//! paths ([`ResolvedPos`]), and a schema-validated structural replace over
//! partially open [`Slice`]s.
//!
//! Documents are values. Every operation that "changes" a document returns a
//! new root node that shares all untouched subtrees with the old one, so old
//! versions stay valid and cheap to keep around.
//!
//! ```
//! use vellum_model::basic::helper::{doc, p};
//!
//! let d = doc((p("hello"), p("world")));
//! let slice = d.slice(3..9, false).unwrap();
//! assert_eq!(d.replace(3..9, &slice), Ok(d.clone()));
//! ```
pub mod basic;
mod content;
mod de;
mod dom;
mod fragment;
mod mark;
mod node;
mod replace;
mod resolved_pos;
mod schema;

pub use content::{ContentMatch, ContentMatchError};
pub use de::JsonError;
pub use dom::{DomOutputSpec, DomSpecError};
pub use fragment::{DiffEnd, Fragment, IndexError};
pub use mark::Mark;
pub use node::{CheckError, Node, Text};
pub use replace::{InsertError, ReplaceError, Slice, SliceError};
pub use resolved_pos::{NodeRange, ResolveErr, ResolvedNode, ResolvedPos};
pub use schema::{
    AttributeSpec, Attrs, MarkSpec, MarkType, NodeSpec, NodeType, Schema, SchemaError, SchemaSpec,
};
