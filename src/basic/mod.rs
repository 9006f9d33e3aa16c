//! # The basic schema
//!
//! A ready-made schema with the common document vocabulary: paragraphs,
//! blockquotes, headings, code blocks, images, hard breaks and a horizontal
//! rule, plus emphasis, strong, link and code marks. The crate's test suite
//! is written against this schema, and it doubles as a worked example of how
//! to put a [`SchemaSpec`] together.
pub mod helper;

use crate::schema::{AttributeSpec, MarkSpec, NodeSpec, Schema, SchemaSpec};
use serde_json::json;
use std::sync::OnceLock;

fn attr(name: &str, default: Option<serde_json::Value>) -> (String, AttributeSpec) {
    (name.to_owned(), AttributeSpec { default })
}

fn node(name: &str, spec: NodeSpec) -> (String, NodeSpec) {
    (name.to_owned(), spec)
}

fn mark(name: &str, spec: MarkSpec) -> (String, MarkSpec) {
    (name.to_owned(), spec)
}

/// The spec for the basic schema.
pub fn spec() -> SchemaSpec {
    SchemaSpec {
        nodes: vec![
            node(
                "doc",
                NodeSpec {
                    content: Some("block+".to_owned()),
                    ..Default::default()
                },
            ),
            node(
                "paragraph",
                NodeSpec {
                    content: Some("inline*".to_owned()),
                    group: Some("block".to_owned()),
                    ..Default::default()
                },
            ),
            node(
                "blockquote",
                NodeSpec {
                    content: Some("block+".to_owned()),
                    group: Some("block".to_owned()),
                    ..Default::default()
                },
            ),
            node(
                "horizontal_rule",
                NodeSpec {
                    group: Some("block".to_owned()),
                    ..Default::default()
                },
            ),
            node(
                "heading",
                NodeSpec {
                    content: Some("inline*".to_owned()),
                    group: Some("block".to_owned()),
                    attrs: vec![attr("level", Some(json!(1)))],
                    ..Default::default()
                },
            ),
            node(
                "code_block",
                NodeSpec {
                    content: Some("text*".to_owned()),
                    marks: Some(String::new()),
                    group: Some("block".to_owned()),
                    ..Default::default()
                },
            ),
            node(
                "text",
                NodeSpec {
                    group: Some("inline".to_owned()),
                    ..Default::default()
                },
            ),
            node(
                "image",
                NodeSpec {
                    inline: true,
                    group: Some("inline".to_owned()),
                    attrs: vec![
                        attr("src", None),
                        attr("alt", Some(json!(""))),
                        attr("title", Some(json!(""))),
                    ],
                    ..Default::default()
                },
            ),
            node(
                "hard_break",
                NodeSpec {
                    inline: true,
                    group: Some("inline".to_owned()),
                    ..Default::default()
                },
            ),
        ],
        marks: vec![
            mark("em", MarkSpec::default()),
            mark("strong", MarkSpec::default()),
            mark(
                "link",
                MarkSpec {
                    attrs: vec![attr("href", None), attr("title", Some(json!("")))],
                    inclusive: Some(false),
                    ..Default::default()
                },
            ),
            mark("code", MarkSpec::default()),
        ],
        top_node: Some("doc".to_owned()),
    }
}

/// The compiled basic schema, built once per process.
pub fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema::new(spec()).expect("the basic schema compiles"))
}
