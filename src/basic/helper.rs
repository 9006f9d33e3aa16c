//! # Node builders
//!
//! Functions to create documents in the [basic schema](super)
//! programmatically, in the style of the original test builders. These
//! builders panic on invalid input (unknown attributes, empty text where text
//! is required), which makes them convenient for tests, examples and fixture
//! construction, and unsuitable for untrusted input.
use super::schema as basic_schema;
use crate::fragment::Fragment;
use crate::mark::Mark;
use crate::node::Node;
use crate::schema::{Attrs, Schema};
use serde_json::json;

/// The schema the builders produce nodes in.
pub fn schema() -> &'static Schema {
    basic_schema()
}

/// Conversion of builder arguments into a fragment.
pub trait IntoFragment {
    /// Build the fragment.
    fn into_fragment(self) -> Fragment;
}

impl IntoFragment for Fragment {
    fn into_fragment(self) -> Fragment {
        self
    }
}

impl IntoFragment for &str {
    fn into_fragment(self) -> Fragment {
        if self.is_empty() {
            Fragment::new()
        } else {
            Fragment::from(text(self))
        }
    }
}

impl IntoFragment for Node {
    fn into_fragment(self) -> Fragment {
        Fragment::from(self)
    }
}

impl IntoFragment for Vec<Node> {
    fn into_fragment(self) -> Fragment {
        Fragment::from(self)
    }
}

/// Conversion of a single builder argument into a node.
pub trait IntoNode {
    /// Build the node.
    fn into_node(self) -> Node;
}

impl IntoNode for Node {
    fn into_node(self) -> Node {
        self
    }
}

impl IntoNode for &str {
    fn into_node(self) -> Node {
        text(self)
    }
}

impl<A: IntoNode> IntoFragment for (A,) {
    fn into_fragment(self) -> Fragment {
        Fragment::from(vec![self.0.into_node()])
    }
}

impl<A: IntoNode, B: IntoNode> IntoFragment for (A, B) {
    fn into_fragment(self) -> Fragment {
        Fragment::from(vec![self.0.into_node(), self.1.into_node()])
    }
}

impl<A: IntoNode, B: IntoNode, C: IntoNode> IntoFragment for (A, B, C) {
    fn into_fragment(self) -> Fragment {
        Fragment::from(vec![
            self.0.into_node(),
            self.1.into_node(),
            self.2.into_node(),
        ])
    }
}

impl<A: IntoNode, B: IntoNode, C: IntoNode, D: IntoNode> IntoFragment for (A, B, C, D) {
    fn into_fragment(self) -> Fragment {
        Fragment::from(vec![
            self.0.into_node(),
            self.1.into_node(),
            self.2.into_node(),
            self.3.into_node(),
        ])
    }
}

fn block(name: &str, content: Fragment) -> Node {
    schema()
        .node(name, None, content, vec![])
        .expect("builder arguments form a constructible node")
}

/// Create a document node.
pub fn doc<A: IntoFragment>(content: A) -> Node {
    block("doc", content.into_fragment())
}

/// Create a document node without content.
pub fn doc_empty() -> Node {
    block("doc", Fragment::new())
}

/// Create a paragraph node.
pub fn p<A: IntoFragment>(content: A) -> Node {
    block("paragraph", content.into_fragment())
}

/// Create a blockquote node.
pub fn blockquote<A: IntoFragment>(content: A) -> Node {
    block("blockquote", content.into_fragment())
}

/// Create a heading node with the given level.
pub fn h<A: IntoFragment>(level: u8, content: A) -> Node {
    let mut attrs = Attrs::new();
    attrs.insert("level".to_owned(), json!(level));
    schema()
        .node("heading", Some(&attrs), content.into_fragment(), vec![])
        .expect("builder arguments form a constructible node")
}

/// Create a heading (level 1) node.
pub fn h1<A: IntoFragment>(content: A) -> Node {
    h(1, content)
}

/// Create a heading (level 2) node.
pub fn h2<A: IntoFragment>(content: A) -> Node {
    h(2, content)
}

/// Create a code block node.
pub fn pre(content: &str) -> Node {
    block("code_block", content.into_fragment())
}

/// Create a horizontal rule node.
pub fn hr() -> Node {
    block("horizontal_rule", Fragment::new())
}

/// Create a hard break node.
pub fn br() -> Node {
    block("hard_break", Fragment::new())
}

/// Create an image node.
pub fn img(src: &str) -> Node {
    let mut attrs = Attrs::new();
    attrs.insert("src".to_owned(), json!(src));
    schema()
        .node("image", Some(&attrs), Fragment::new(), vec![])
        .expect("builder arguments form a constructible node")
}

/// Create a text node.
pub fn text(content: &str) -> Node {
    schema().text(content, vec![])
}

fn marked(content: &str, mark: Mark) -> Node {
    schema().text(content, vec![mark])
}

fn simple_mark(name: &str) -> Mark {
    schema()
        .mark(name, None)
        .expect("the basic schema has this mark")
}

/// Create an emphasized text node.
pub fn em(content: &str) -> Node {
    marked(content, simple_mark("em"))
}

/// Create a strong text node.
pub fn strong(content: &str) -> Node {
    marked(content, simple_mark("strong"))
}

/// Create a code text node.
pub fn code(content: &str) -> Node {
    marked(content, simple_mark("code"))
}

/// Create a linked text node.
pub fn a(href: &str, content: &str) -> Node {
    let mut attrs = Attrs::new();
    attrs.insert("href".to_owned(), json!(href));
    let mark = schema()
        .mark("link", Some(attrs))
        .expect("the basic schema has a link mark");
    marked(content, mark)
}
