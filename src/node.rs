use crate::content::{ContentMatch, ContentMatchError};
use crate::de::{self, JsonError};
use crate::fragment::{bounds, Fragment};
use crate::mark::Mark;
use crate::replace::{self, ReplaceError, Slice, SliceError};
use crate::resolved_pos::{ResolveErr, ResolvedPos};
use crate::schema::{Attrs, MarkType, NodeType, Schema};
use displaydoc::Display;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by [`Node::check`]
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum CheckError {
    /// Invalid content for node {name}
    InvalidContent {
        /// Name of the node type
        name: String,
    },
    /// Invalid attributes for node {name}
    InvalidAttrs {
        /// Name of the node type
        name: String,
    },
    /// Invalid collection of marks for node {name}
    InvalidMarks {
        /// Name of the node type
        name: String,
    },
}

/// A string that stores its length in UTF-16 code units, which is the unit
/// the position scheme counts text in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    len_utf16: usize,
    content: String,
}

impl Text {
    /// Return the contained string.
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// The length of this string if it were encoded in UTF-16.
    pub fn len_utf16(&self) -> usize {
        self.len_utf16
    }

    /// Concatenate two texts.
    pub fn join(&self, other: &Text) -> Text {
        Text {
            len_utf16: self.len_utf16 + other.len_utf16,
            content: format!("{}{}", self.content, other.content),
        }
    }

    /// Borrow the substring between two offsets given in UTF-16 code units.
    /// Offsets past the end of the text are clamped. Panics when an offset
    /// falls inside a surrogate pair.
    pub fn slice_utf16(&self, from: usize, to: usize) -> &str {
        let start = byte_index(&self.content, from);
        let rest = &self.content[start..];
        let len = byte_index(rest, to.saturating_sub(from));
        &rest[..len]
    }
}

fn byte_index(text: &str, mut index: usize) -> usize {
    let mut iter = text.chars();
    while index > 0 {
        let Some(c) = iter.next() else {
            return text.len();
        };
        let l = c.len_utf16();
        if l > index {
            panic!("Can't split in the middle of a character")
        }
        index -= l;
    }
    text.len() - iter.as_str().len()
}

impl From<String> for Text {
    fn from(src: String) -> Text {
        Text {
            len_utf16: src.encode_utf16().count(),
            content: src,
        }
    }
}

impl From<&str> for Text {
    fn from(src: &str) -> Text {
        Text::from(src.to_owned())
    }
}

impl Serialize for Text {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.content.serialize(serializer)
    }
}

/// This type represents a node in the tree that makes up a document. So a
/// document is an instance of `Node`, with children that are also instances
/// of `Node`.
///
/// Nodes are persistent data structures. Instead of changing them, you create
/// new ones with the content you want. Old ones keep pointing at the old
/// document shape. This is made cheaper by sharing structure between the old
/// and new data as much as possible.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeData>,
}

struct NodeData {
    r#type: NodeType,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<Text>,
}

impl Node {
    pub(crate) fn new(r#type: NodeType, attrs: Attrs, content: Fragment, marks: Vec<Mark>) -> Node {
        Node {
            inner: Arc::new(NodeData {
                r#type,
                attrs,
                content,
                marks,
                text: None,
            }),
        }
    }

    pub(crate) fn new_text(r#type: NodeType, attrs: Attrs, marks: Vec<Mark>, text: Text) -> Node {
        Node {
            inner: Arc::new(NodeData {
                r#type,
                attrs,
                content: Fragment::new(),
                marks,
                text: Some(text),
            }),
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The type of this node.
    pub fn r#type(&self) -> &NodeType {
        &self.inner.r#type
    }

    /// An object mapping attribute names to values.
    pub fn attrs(&self) -> &Attrs {
        &self.inner.attrs
    }

    /// The marks (things like whether it is emphasized or part of a link)
    /// applied to this node.
    pub fn marks(&self) -> &[Mark] {
        &self.inner.marks
    }

    /// A container holding the node's children.
    pub fn content(&self) -> &Fragment {
        &self.inner.content
    }

    /// For text nodes, this contains the node's text content.
    pub fn text(&self) -> Option<&Text> {
        self.inner.text.as_ref()
    }

    /// True when this is a text node.
    pub fn is_text(&self) -> bool {
        self.inner.text.is_some()
    }

    /// True when this is a block (non-inline) node.
    pub fn is_block(&self) -> bool {
        self.r#type().is_block()
    }

    /// True when this is an inline node (a text node or a node that can
    /// appear among text).
    pub fn is_inline(&self) -> bool {
        self.r#type().is_inline()
    }

    /// True when this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        self.r#type().is_leaf()
    }

    /// True when this is an atom, i.e. when it does not have directly
    /// editable content.
    pub fn is_atom(&self) -> bool {
        self.r#type().is_atom()
    }

    /// True when this is a textblock node, a block node with inline content.
    pub fn is_textblock(&self) -> bool {
        self.r#type().is_textblock()
    }

    /// True when this node allows inline content.
    pub fn inline_content(&self) -> bool {
        self.r#type().inline_content()
    }

    /// The size of this node, as defined by the integer-based indexing
    /// scheme. For text nodes, this is the amount of characters. For other
    /// leaf nodes, it is one. For non-leaf nodes, it is the size of the
    /// content plus two (the start and end token).
    pub fn node_size(&self) -> usize {
        if let Some(text) = self.text() {
            text.len_utf16()
        } else if self.is_leaf() {
            1
        } else {
            self.content().size() + 2
        }
    }

    /// The size of the node's content.
    pub fn content_size(&self) -> usize {
        self.content().size()
    }

    /// The number of children that the node has.
    pub fn child_count(&self) -> usize {
        self.content().child_count()
    }

    /// Get the child node at the given index. Panics when the index is out of
    /// range.
    pub fn child(&self, index: usize) -> &Node {
        self.content().child(index)
    }

    /// Get the child node at the given index, if it exists.
    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.content().maybe_child(index)
    }

    /// The first child of the node, or `None` if there are no children.
    pub fn first_child(&self) -> Option<&Node> {
        self.content().first_child()
    }

    /// The last child of the node, or `None` if there are no children.
    pub fn last_child(&self) -> Option<&Node> {
        self.content().last_child()
    }

    /// Concatenates all the text nodes found in this node and its children.
    pub fn text_content(&self) -> String {
        if let Some(text) = self.text() {
            return text.as_str().to_owned();
        }
        let mut buf = String::new();
        self.content()
            .text_between(&mut buf, true, 0, self.content().size(), Some(""), None);
        buf
    }

    /// Get all text between positions `from` and `to`.
    pub fn text_between<R: RangeBounds<usize>>(
        &self,
        range: R,
        block_separator: Option<&str>,
        leaf_text: Option<&str>,
    ) -> String {
        let (from, to) = bounds(&range, self.content().size());
        let mut buf = String::new();
        self.content()
            .text_between(&mut buf, true, from, to, block_separator, leaf_text);
        buf
    }

    /// Compare the markup (type, attributes, and marks) of this node to those
    /// of another. Returns true if both have the same markup.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.has_markup(other.r#type(), other.attrs(), other.marks())
    }

    /// Check whether this node's markup corresponds to the given type,
    /// attributes, and marks.
    pub fn has_markup(&self, r#type: &NodeType, attrs: &Attrs, marks: &[Mark]) -> bool {
        self.r#type() == r#type && self.attrs() == attrs && Mark::same_set(self.marks(), marks)
    }

    /// Create a new node with the same markup as this node, containing the
    /// content produced by the given mapping function. Returns a shared
    /// handle to this node when the content is unchanged.
    pub fn copy<F>(&self, map: F) -> Node
    where
        F: FnOnce(&Fragment) -> Fragment,
    {
        if self.is_text() {
            return self.clone();
        }
        let content = map(self.content());
        if content == *self.content() {
            return self.clone();
        }
        Node::new(
            self.r#type().clone(),
            self.attrs().clone(),
            content,
            self.marks().to_vec(),
        )
    }

    /// Create a copy of this node, with the given set of marks instead of the
    /// node's own marks.
    pub fn mark(&self, marks: Vec<Mark>) -> Node {
        if Mark::same_set(&marks, self.marks()) {
            return self.clone();
        }
        Node {
            inner: Arc::new(NodeData {
                r#type: self.r#type().clone(),
                attrs: self.attrs().clone(),
                content: self.content().clone(),
                marks,
                text: self.inner.text.clone(),
            }),
        }
    }

    /// Create a new text node with the given text and this node's markup.
    /// Only valid on text nodes.
    pub fn with_text(&self, text: Text) -> Node {
        debug_assert!(self.is_text());
        Node {
            inner: Arc::new(NodeData {
                r#type: self.r#type().clone(),
                attrs: self.attrs().clone(),
                content: Fragment::new(),
                marks: self.marks().to_vec(),
                text: Some(text),
            }),
        }
    }

    /// Create a copy of this node with only the content between the given
    /// positions.
    pub fn cut<R: RangeBounds<usize>>(&self, range: R) -> Cow<Node> {
        if let Some(text) = self.text() {
            let (from, to) = bounds(&range, text.len_utf16());
            if from == 0 && to == text.len_utf16() {
                return Cow::Borrowed(self);
            }
            Cow::Owned(self.with_text(Text::from(text.slice_utf16(from, to).to_owned())))
        } else {
            let content_size = self.content().size();
            let (from, to) = bounds(&range, content_size);
            if from == 0 && to == content_size {
                Cow::Borrowed(self)
            } else {
                Cow::Owned(self.copy(|c| c.cut(from..to)))
            }
        }
    }

    /// Cut out the part of the document between the given positions, and
    /// return it as a `Slice` object. Unless `include_parents` is set, the
    /// slice is closed to the depth both endpoints share.
    pub fn slice<R: RangeBounds<usize>>(
        &self,
        range: R,
        include_parents: bool,
    ) -> Result<Slice, SliceError> {
        let (from, to) = bounds(&range, self.content().size());
        if from == to {
            return Ok(Slice::default());
        }
        let rp_from = self.resolve(from)?;
        let rp_to = self.resolve(to)?;
        let depth = if include_parents {
            0
        } else {
            rp_from.shared_depth(to)
        };
        let start = rp_from.start(depth);
        let node = rp_from.node(depth);
        let content = node.content().cut(rp_from.pos() - start..rp_to.pos() - start);
        Ok(Slice::new(
            content,
            rp_from.depth() - depth,
            rp_to.depth() - depth,
        ))
    }

    /// Replace the part of the document between the given positions with the
    /// given slice. The slice must "fit", meaning its open sides must be able
    /// to connect to the surrounding content, and its content nodes must be
    /// valid children for the node they are placed into. If any of this is
    /// violated, an error of type [`ReplaceError`] is returned.
    pub fn replace<R: RangeBounds<usize>>(
        &self,
        range: R,
        slice: &Slice,
    ) -> Result<Node, ReplaceError> {
        let (from, to) = bounds(&range, self.content().size());
        replace::replace(&self.resolve(from)?, &self.resolve(to)?, slice)
    }

    /// Resolve the given position in the document, returning a struct with
    /// information about its context.
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ResolveErr> {
        ResolvedPos::resolve_cached(self, pos)
    }

    /// Find the node directly after the given position.
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut node = self;
        let mut pos = pos;
        loop {
            let index = node.content().find_index(pos, false).ok()?;
            let child = node.maybe_child(index.index)?;
            if index.offset == pos || child.is_text() {
                return Some(child);
            }
            node = child;
            pos -= index.offset + 1;
        }
    }

    /// Invoke a callback for all descendant nodes recursively between the
    /// given two positions that are relative to start of this node's content.
    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.content().nodes_between(from, to, f, 0, Some(self));
    }

    /// Test whether a given mark is in the inline content between `from` and
    /// `to`.
    pub fn range_has_mark<R: RangeBounds<usize>>(&self, range: R, mark: &Mark) -> bool {
        let (from, to) = bounds(&range, self.content().size());
        let mut found = false;
        if to > from {
            self.nodes_between(from, to, &mut |node, _, _, _| {
                if mark.is_in_set(node.marks()) {
                    found = true;
                }
                !found
            });
        }
        found
    }

    /// Test whether a mark of the given type appears in the inline content
    /// between `from` and `to`.
    pub fn range_has_mark_type<R: RangeBounds<usize>>(
        &self,
        range: R,
        r#type: &MarkType,
    ) -> bool {
        let (from, to) = bounds(&range, self.content().size());
        let mut found = false;
        if to > from {
            self.nodes_between(from, to, &mut |node, _, _, _| {
                if r#type.is_in_set(node.marks()).is_some() {
                    found = true;
                }
                !found
            });
        }
        found
    }

    /// Get the content match in this node at the given index.
    pub fn content_match_at(&self, index: usize) -> Result<ContentMatch, ContentMatchError> {
        self.r#type()
            .content_match()
            .match_fragment_range(self.content(), 0..index)
            .ok_or(ContentMatchError::InvalidContent)
    }

    /// Test whether replacing the range between `from` and `to` (by child
    /// index) with the given replacement fragment (which defaults to the
    /// empty fragment) would leave the node's content valid. You may pass a
    /// range into the replacement fragment to only use part of it.
    pub fn can_replace<R: RangeBounds<usize>>(
        &self,
        from: usize,
        to: usize,
        replacement: Option<&Fragment>,
        range: R,
    ) -> Result<bool, ContentMatchError> {
        let replacement = replacement.unwrap_or_else(|| Fragment::empty());
        let (start, end) = bounds(&range, replacement.child_count());

        let one = self
            .content_match_at(from)?
            .match_fragment_range(replacement, start..end);
        let two = one.and_then(|m| m.match_fragment_range(self.content(), to..));
        match two {
            Some(m) if m.valid_end() => {
                for i in start..end {
                    if !self.r#type().allows_marks(replacement.child(i).marks()) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Check whether this node and its descendants conform to the schema.
    pub fn check(&self) -> Result<(), CheckError> {
        let name = || self.r#type().name().to_owned();
        if !self.r#type().valid_content(self.content()) {
            return Err(CheckError::InvalidContent { name: name() });
        }
        if !self.r#type().attrs_valid(self.attrs()) {
            return Err(CheckError::InvalidAttrs { name: name() });
        }
        let mut copy: Vec<Mark> = Vec::new();
        for mark in self.marks() {
            copy = mark.add_to_set(&copy);
        }
        if !Mark::same_set(&copy, self.marks()) {
            return Err(CheckError::InvalidMarks { name: name() });
        }
        for child in self.content().children() {
            child.check()?;
        }
        Ok(())
    }

    /// Deserialize a node from its JSON representation.
    pub fn from_json(schema: &Schema, value: &Value) -> Result<Node, JsonError> {
        let obj = de::expect_object(value, "node")?;
        let name = de::expect_str(de::require(obj, "type", "node")?, "node type")?;
        let r#type = schema
            .node_type(name)
            .ok_or_else(|| JsonError::UnknownNodeType {
                name: name.to_owned(),
            })?;
        let attrs = match obj.get("attrs") {
            Some(v) => Some(de::expect_attrs(v)?),
            None => None,
        };
        let marks = match obj.get("marks") {
            Some(v) => de::expect_array(v, "marks")?
                .iter()
                .map(|m| Mark::from_json(schema, m))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        if r#type.is_text() {
            let text = de::expect_str(de::require(obj, "text", "text node")?, "text")?;
            if text.is_empty() {
                return Err(JsonError::EmptyText);
            }
            return Ok(schema.text(text, marks));
        }
        let content = match obj.get("content") {
            Some(v) => {
                let items = de::expect_array(v, "content")?;
                let nodes = items
                    .iter()
                    .map(|item| Node::from_json(schema, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Fragment::from_array(nodes)
            }
            None => Fragment::new(),
        };
        r#type
            .create(attrs.as_ref(), content, marks)
            .map_err(|e| JsonError::Attrs(e.to_string()))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.same_markup(other)
                && self.inner.text == other.inner.text
                && self.content() == other.content())
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for mark in self.marks() {
            write!(f, "{}(", mark.r#type().name())?;
        }
        if let Some(text) = self.text() {
            write!(f, "{:?}", text.as_str())?;
        } else {
            f.write_str(self.r#type().name())?;
            if self.content().size() > 0 {
                f.write_str("(")?;
                for (i, child) in self.content().children().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt::Debug::fmt(child, f)?;
                }
                f.write_str(")")?;
            }
        }
        for _ in self.marks() {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl Serialize for Node {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.r#type().name())?;
        if !self.attrs().is_empty() {
            map.serialize_entry("attrs", self.attrs())?;
        }
        if self.content().size() > 0 {
            map.serialize_entry("content", self.content().children())?;
        }
        if !self.marks().is_empty() {
            map.serialize_entry("marks", self.marks())?;
        }
        if let Some(text) = self.text() {
            map.serialize_entry("text", text)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, Text};
    use crate::basic::helper::*;
    use serde_json::json;

    #[test]
    fn text_slices_by_utf16_offset() {
        let t = Text::from("hello");
        assert_eq!(t.slice_utf16(1, 4), "ell");
        assert_eq!(t.slice_utf16(0, 9), "hello");
        assert_eq!(t.slice_utf16(5, 5), "");

        // U+1F60A is two UTF-16 code units
        let t = Text::from("a\u{1F60A}b");
        assert_eq!(t.len_utf16(), 4);
        assert_eq!(t.slice_utf16(1, 3), "\u{1F60A}");
        assert_eq!(t.slice_utf16(3, 4), "b");
    }

    #[test]
    fn node_sizes() {
        assert_eq!(text("Hello").node_size(), 5);
        assert_eq!(text("\u{1F60A}").node_size(), 2);
        assert_eq!(p(("Hallo", "Foo")).node_size(), 10);
        assert_eq!(hr().node_size(), 1);
        assert_eq!(doc(p("ab")).node_size(), 6);
    }

    #[test]
    fn text_content_concatenates() {
        let d = doc((p(("one", em("two"))), p("three")));
        assert_eq!(d.text_content(), "onetwothree");
    }

    #[test]
    fn cut_preserves_wrapping_node() {
        let d = doc(p("abcd"));
        let cut = d.cut(2..4).into_owned();
        assert_eq!(cut, doc(p("bc")));
        assert_eq!(d.cut(..).into_owned(), d);
    }

    #[test]
    fn node_at_returns_following_node() {
        let d = doc((p("ab"), p("cd")));
        assert_eq!(d.node_at(0).unwrap(), &p("ab"));
        assert_eq!(d.node_at(1).unwrap().text_content(), "ab");
        assert_eq!(d.node_at(4).unwrap(), &p("cd"));
        assert!(d.node_at(8).is_none());
    }

    #[test]
    fn range_has_mark_scans_text() {
        let d = doc(p(("one ", em("two"))));
        let em_mark = schema().mark("em", None).unwrap();
        assert!(d.range_has_mark(0..d.content().size(), &em_mark));
        assert!(!d.range_has_mark(0..4, &em_mark));
    }

    #[test]
    fn can_replace_checks_content() {
        let d = doc(p("ab"));
        let para = d.child(0);
        // Splicing text into a paragraph is fine
        let frag = p("xy").content().clone();
        assert!(para.can_replace(0, 0, Some(&frag), ..).unwrap());
        // A paragraph does not accept another paragraph as a child
        let bad = doc(p("x")).content().clone();
        assert!(!para.can_replace(0, 0, Some(&bad), ..).unwrap());
    }

    #[test]
    fn check_validates_recursively() {
        let d = doc((p("ab"), blockquote(p("cd"))));
        assert_eq!(d.check(), Ok(()));
    }

    #[test]
    fn json_round_trip() {
        let d = doc((p(("ab", em("cd"))), blockquote(p("ef")), h1("hi")));
        let encoded = serde_json::to_value(&d).unwrap();
        let decoded = Node::from_json(schema(), &encoded).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn json_shape() {
        let d = doc(p("hi"));
        assert_eq!(
            serde_json::to_value(&d).unwrap(),
            json!({
                "type": "doc",
                "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "hi"}]}
                ]
            })
        );
    }

    #[test]
    fn json_rejects_bad_input() {
        assert!(Node::from_json(schema(), &json!({"type": "nope"})).is_err());
        assert!(Node::from_json(schema(), &json!({"type": "text", "text": ""})).is_err());
        assert!(Node::from_json(schema(), &json!({"type": "text"})).is_err());
        assert!(
            Node::from_json(schema(), &json!({"type": "paragraph", "content": {}})).is_err()
        );
    }
}
