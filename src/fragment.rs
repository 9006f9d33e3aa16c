use crate::de::{self, JsonError};
use crate::node::Node;
use crate::resolved_pos::Index;
use crate::schema::Schema;
use displaydoc::Display;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Resolve a generic range into concrete `(from, to)` offsets within an
/// offset space of the given size. All range-taking operations on fragments,
/// nodes and content matches share this resolution.
pub(crate) fn bounds<R: RangeBounds<usize>>(range: &R, size: usize) -> (usize, usize) {
    let from = match range.start_bound() {
        Bound::Unbounded => 0,
        Bound::Included(x) => *x,
        Bound::Excluded(x) => x + 1,
    };
    let to = match range.end_bound() {
        Bound::Unbounded => size,
        Bound::Included(x) => x + 1,
        Bound::Excluded(x) => *x,
    };
    (from, to)
}

/// Position {pos} outside of fragment (size {size})
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, Error)]
pub struct IndexError {
    /// The position that was looked up
    pub pos: usize,
    /// The size of the fragment
    pub size: usize,
}

/// Two offsets into a pair of fragments, marking the end of the range in
/// which they differ. The offsets differ because the matching tails of the
/// two fragments align to different absolute positions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DiffEnd {
    /// Offset into the first fragment
    pub a: usize,
    /// Offset into the second fragment
    pub b: usize,
}

/// A fragment represents a node's collection of child nodes.
///
/// Like nodes, fragments are persistent data structures, and you should not
/// mutate them or their content. Rather, you create new instances whenever
/// needed. The API tries to make this easy.
#[derive(Clone)]
pub struct Fragment {
    inner: Arc<Vec<Node>>,
    size: usize,
}

impl Fragment {
    /// Create a new empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference to the shared empty fragment.
    pub fn empty() -> &'static Self {
        static EMPTY: OnceLock<Fragment> = OnceLock::new();
        EMPTY.get_or_init(Fragment::new)
    }

    /// Build a fragment from a sequence of nodes. Adjacent text nodes with
    /// the same markup are joined, so the invariant that no two mergeable
    /// text children sit next to each other holds by construction.
    pub fn from_array(nodes: Vec<Node>) -> Self {
        let mut inner: Vec<Node> = Vec::with_capacity(nodes.len());
        let mut size = 0;
        for node in nodes {
            match inner.last_mut() {
                Some(last) if last.is_text() && last.same_markup(&node) => {
                    size -= last.node_size();
                    let joined = last
                        .text()
                        .expect("is_text")
                        .join(node.text().expect("same markup as a text node"));
                    *last = last.with_text(joined);
                    size += last.node_size();
                }
                _ => {
                    size += node.node_size();
                    inner.push(node);
                }
            }
        }
        Fragment {
            inner: Arc::new(inner),
            size,
        }
    }

    /// The size of the fragment, which is the total of the size of its
    /// content nodes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get a slice of all child nodes.
    pub fn children(&self) -> &[Node] {
        &self.inner[..]
    }

    /// The first child of the fragment, or `None` if it is empty.
    pub fn first_child(&self) -> Option<&Node> {
        self.inner.first()
    }

    /// The last child of the fragment, or `None` if it is empty.
    pub fn last_child(&self) -> Option<&Node> {
        self.inner.last()
    }

    /// The number of child nodes in this fragment.
    pub fn child_count(&self) -> usize {
        self.inner.len()
    }

    /// Get the child node at the given index. Panics when the index is out of
    /// range.
    pub fn child(&self, index: usize) -> &Node {
        &self.inner[index]
    }

    /// Get the child node at the given index, if it exists.
    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.inner.get(index)
    }

    /// Create a new fragment containing the combined content of this fragment
    /// and the other. A text node at the boundary is merged with its
    /// neighbor when both carry the same markup.
    pub fn append(self, other: Self) -> Self {
        if other.inner.is_empty() {
            return self;
        }
        if self.inner.is_empty() {
            return other;
        }
        let size = self.size + other.size;
        let mut inner = Arc::try_unwrap(self.inner).unwrap_or_else(|rc| (*rc).clone());
        let mut rest = other.inner.iter();
        let first = rest.next().expect("checked non-empty");
        let last = inner.last_mut().expect("checked non-empty");
        if last.is_text() && last.same_markup(first) {
            let joined = last
                .text()
                .expect("is_text")
                .join(first.text().expect("same markup as a text node"));
            *last = last.with_text(joined);
        } else {
            inner.push(first.clone());
        }
        inner.extend(rest.cloned());
        Fragment {
            inner: Arc::new(inner),
            size,
        }
    }

    /// Cut out the sub-fragment between the two given positions.
    pub fn cut<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let (from, to) = bounds(&range, self.size);

        if from == 0 && to == self.size {
            return self.clone();
        }

        let mut result = vec![];
        let mut size = 0;
        if to > from {
            let mut pos = 0;
            let mut i = 0;
            while pos < to {
                let child = &self.inner[i];
                let end = pos + child.node_size();
                if end > from {
                    let new_child = if pos < from || end > to {
                        if child.is_text() {
                            let len = child.text().expect("is_text").len_utf16();
                            let start = from.saturating_sub(pos);
                            let end = usize::min(len, to - pos);
                            child.cut(start..end)
                        } else {
                            let t = pos + 1;
                            let start = from.saturating_sub(t);
                            let end = usize::min(child.content().size(), to.saturating_sub(t));
                            child.cut(start..end)
                        }
                        .into_owned()
                    } else {
                        child.clone()
                    };
                    size += new_child.node_size();
                    result.push(new_child);
                }
                pos = end;
                i += 1;
            }
        }
        Fragment {
            inner: Arc::new(result),
            size,
        }
    }

    /// Create a new fragment in which the node at the given index is replaced
    /// by the given node.
    pub fn replace_child(&self, index: usize, node: Node) -> Cow<Self> {
        let current = &self.inner[index];
        if *current == node {
            Cow::Borrowed(self)
        } else {
            let size = self.size + node.node_size() - current.node_size();
            let mut copy = Vec::with_capacity(self.inner.len());
            copy.extend_from_slice(&self.inner[..index]);
            copy.push(node);
            copy.extend_from_slice(&self.inner[index + 1..]);
            Cow::Owned(Fragment {
                inner: Arc::new(copy),
                size,
            })
        }
    }

    /// Invoke a callback for all descendant nodes between the given two
    /// positions (relative to the start of this fragment). The callback
    /// receives the node, its position, its parent (when known) and its index
    /// in that parent. It may return `false` to prevent descent into a node.
    pub fn nodes_between<F>(
        &self,
        from: usize,
        to: usize,
        f: &mut F,
        node_start: usize,
        parent: Option<&Node>,
    ) where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        let mut pos = 0;
        for (i, child) in self.inner.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, i) {
                let content = child.content();
                if content.size() > 0 {
                    let start = pos + 1;
                    content.nodes_between(
                        from.saturating_sub(start),
                        usize::min(content.size(), to - start),
                        f,
                        node_start + start,
                        Some(child),
                    );
                }
            }
            pos = end;
        }
    }

    /// Get all text between positions `from` and `to`. When
    /// `block_separator` is given, it will be inserted whenever a new block
    /// node is started. When `leaf_text` is given, it'll be inserted for
    /// every non-text leaf node encountered.
    pub fn text_between(
        &self,
        text: &mut String,
        mut separated: bool,
        from: usize,
        to: usize,
        block_separator: Option<&str>,
        leaf_text: Option<&str>,
    ) {
        self.nodes_between(
            from,
            to,
            &mut |node, pos, _parent, _index| {
                if let Some(txt) = node.text() {
                    let skip = from.saturating_sub(pos);
                    let end = usize::min(to - pos, txt.len_utf16());
                    text.push_str(txt.slice_utf16(skip, end));
                    separated = block_separator.is_none();
                } else if node.is_leaf() {
                    if let Some(leaf_text) = leaf_text {
                        text.push_str(leaf_text);
                    }
                    separated = block_separator.is_none();
                } else if !separated && node.is_block() {
                    text.push_str(block_separator.unwrap_or(""));
                    separated = true;
                }
                true
            },
            0,
            None,
        )
    }

    /// Find the first position at which this fragment and another fragment
    /// differ, or `None` if they are the same.
    pub fn find_diff_start(&self, other: &Fragment) -> Option<usize> {
        diff_start(self, other, 0)
    }

    /// Find the first position, searching from the end, at which this
    /// fragment and the given fragment differ, or `None` when they are the
    /// same. Since this position will not be the same in both fragments, a
    /// pair of positions is returned.
    pub fn find_diff_end(&self, other: &Fragment) -> Option<DiffEnd> {
        diff_end(self, other, self.size, other.size)
    }

    /// Find the index and inner offset corresponding to a given relative
    /// position in this fragment. When `round` is set, a position that falls
    /// exactly on a child boundary is attributed to the later index.
    pub(crate) fn find_index(&self, pos: usize, round: bool) -> Result<Index, IndexError> {
        let len = self.inner.len();
        match pos {
            0 => Ok(Index::new(0, 0)),
            p if p == self.size => Ok(Index::new(len, pos)),
            p if p > self.size => Err(IndexError {
                pos,
                size: self.size,
            }),
            p => {
                let mut cur_pos = 0;
                for (i, cur) in self.inner.iter().enumerate() {
                    let end = cur_pos + cur.node_size();
                    if end >= p {
                        if end == p || round {
                            return Ok(Index::new(i + 1, end));
                        }
                        return Ok(Index::new(i, cur_pos));
                    }
                    cur_pos = end;
                }
                panic!("Invariant failed: self.size must be the sum of all node sizes")
            }
        }
    }

    /// Deserialize a fragment from its JSON representation.
    pub fn from_json(schema: &Schema, value: &Value) -> Result<Fragment, JsonError> {
        if value.is_null() {
            return Ok(Fragment::new());
        }
        let items = de::expect_array(value, "fragment")?;
        let nodes = items
            .iter()
            .map(|item| Node::from_json(schema, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Fragment::from_array(nodes))
    }
}

fn diff_start(a: &Fragment, b: &Fragment, pos: usize) -> Option<usize> {
    let mut pos = pos;
    for i in 0.. {
        if i == a.child_count() || i == b.child_count() {
            return if a.child_count() == b.child_count() {
                None
            } else {
                Some(pos)
            };
        }
        let child_a = a.child(i);
        let child_b = b.child(i);
        if child_a == child_b {
            pos += child_a.node_size();
            continue;
        }
        if !child_a.same_markup(child_b) {
            return Some(pos);
        }
        if let (Some(text_a), Some(text_b)) = (child_a.text(), child_b.text()) {
            if text_a != text_b {
                let mut at = pos;
                for (ca, cb) in text_a.as_str().chars().zip(text_b.as_str().chars()) {
                    if ca != cb {
                        break;
                    }
                    at += ca.len_utf16();
                }
                return Some(at);
            }
        }
        if child_a.content().size() > 0 || child_b.content().size() > 0 {
            if let Some(inner) = diff_start(child_a.content(), child_b.content(), pos + 1) {
                return Some(inner);
            }
        }
        pos += child_a.node_size();
    }
    unreachable!()
}

fn diff_end(a: &Fragment, b: &Fragment, pos_a: usize, pos_b: usize) -> Option<DiffEnd> {
    let mut i_a = a.child_count();
    let mut i_b = b.child_count();
    let mut pos_a = pos_a;
    let mut pos_b = pos_b;
    loop {
        if i_a == 0 || i_b == 0 {
            return if i_a == i_b {
                None
            } else {
                Some(DiffEnd { a: pos_a, b: pos_b })
            };
        }
        i_a -= 1;
        i_b -= 1;
        let child_a = a.child(i_a);
        let child_b = b.child(i_b);
        let size = child_a.node_size();
        if child_a == child_b {
            pos_a -= size;
            pos_b -= size;
            continue;
        }
        if !child_a.same_markup(child_b) {
            return Some(DiffEnd { a: pos_a, b: pos_b });
        }
        if let (Some(text_a), Some(text_b)) = (child_a.text(), child_b.text()) {
            if text_a != text_b {
                for (ca, cb) in text_a
                    .as_str()
                    .chars()
                    .rev()
                    .zip(text_b.as_str().chars().rev())
                {
                    if ca != cb {
                        break;
                    }
                    pos_a -= ca.len_utf16();
                    pos_b -= ca.len_utf16();
                }
                return Some(DiffEnd { a: pos_a, b: pos_b });
            }
        }
        if child_a.content().size() > 0 || child_b.content().size() > 0 {
            if let Some(inner) = diff_end(child_a.content(), child_b.content(), pos_a - 1, pos_b - 1)
            {
                return Some(inner);
            }
        }
        pos_a -= size;
        pos_b -= size;
    }
}

impl Default for Fragment {
    fn default() -> Self {
        Fragment {
            inner: Arc::new(Vec::new()),
            size: 0,
        }
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && (Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner)
    }
}

impl Eq for Fragment {}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}

impl Serialize for Fragment {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        if self.inner.is_empty() {
            serializer.serialize_none()
        } else {
            self.inner.serialize(serializer)
        }
    }
}

impl From<Vec<Node>> for Fragment {
    fn from(src: Vec<Node>) -> Fragment {
        Fragment::from_array(src)
    }
}

impl From<Node> for Fragment {
    fn from(node: Node) -> Fragment {
        Fragment::from_array(vec![node])
    }
}

impl From<Option<Node>> for Fragment {
    fn from(node: Option<Node>) -> Fragment {
        match node {
            Some(node) => Fragment::from(node),
            None => Fragment::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Fragment;
    use crate::basic::helper::*;

    #[test]
    fn merges_text_on_construction() {
        let merged = Fragment::from_array(vec![text("foo"), text("bar")]);
        assert_eq!(merged.child_count(), 1);
        assert_eq!(merged.size(), 6);
        assert_eq!(merged.child(0).text().unwrap().as_str(), "foobar");
    }

    #[test]
    fn keeps_differently_marked_text_apart() {
        let frag = Fragment::from_array(vec![text("foo"), em("bar")]);
        assert_eq!(frag.child_count(), 2);
        assert_eq!(frag.size(), 6);
    }

    #[test]
    fn append_merges_boundary() {
        let a = Fragment::from(text("ab"));
        let b = Fragment::from(text("cd"));
        let joined = a.append(b);
        assert_eq!(joined.child_count(), 1);
        assert_eq!(joined.size(), 4);

        let empty = Fragment::new();
        let c = Fragment::from(text("x"));
        assert_eq!(empty.clone().append(c.clone()), c);
        assert_eq!(c.clone().append(empty), c);
    }

    #[test]
    fn cut_descends_into_children() {
        let d = doc((p("foo"), p("bar")));
        let content = d.content();
        // Cut through both paragraphs
        let cut = content.cut(2..8);
        assert_eq!(cut.child_count(), 2);
        assert_eq!(cut.child(0).text_content(), "oo");
        assert_eq!(cut.child(1).text_content(), "ba");
        // A full-range cut is the fragment itself
        assert_eq!(content.cut(..), *content);
    }

    #[test]
    fn cut_composes_on_flat_content() {
        let frag = p("abcdef").content().clone();
        let outer = frag.cut(1..5);
        assert_eq!(outer.cut(1..3), frag.cut(2..4));
    }

    #[test]
    fn replace_child_updates_size() {
        let d = doc((p("one"), p("two")));
        let replaced = d.content().replace_child(1, p("three")).into_owned();
        assert_eq!(replaced.size(), 5 + 7);
        // Replacing a child with itself is the identity
        let same = d.content().replace_child(0, d.content().child(0).clone());
        assert!(matches!(same, std::borrow::Cow::Borrowed(_)));
    }

    #[test]
    fn nodes_between_respects_bounds() {
        let d = doc((p("one"), p("two")));
        let mut seen = vec![];
        d.content().nodes_between(
            0,
            5,
            &mut |node, pos, _, _| {
                seen.push((node.r#type().name().to_owned(), pos));
                true
            },
            0,
            None,
        );
        assert_eq!(
            seen,
            vec![("paragraph".to_owned(), 0), ("text".to_owned(), 1)]
        );
    }

    #[test]
    fn text_between_separates_blocks() {
        let d = doc((p("one"), p("two")));
        let mut buf = String::new();
        d.content()
            .text_between(&mut buf, true, 0, d.content().size(), Some("\n"), None);
        assert_eq!(buf, "one\ntwo");
    }

    #[test]
    fn diff_start_finds_divergence() {
        let a = doc((p("hello"), p("world")));
        let b = doc((p("hellp"), p("world")));
        assert_eq!(a.content().find_diff_start(b.content()), Some(5));
        assert_eq!(a.content().find_diff_start(a.content()), None);
    }

    #[test]
    fn diff_end_returns_both_offsets() {
        let a = doc((p("hello"),));
        let b = doc((p("jello"),));
        let diff = a.content().find_diff_end(b.content()).unwrap();
        assert_eq!((diff.a, diff.b), (2, 2));

        let c = doc((p("xhello"),));
        let diff = a.content().find_diff_end(c.content()).unwrap();
        assert_eq!((diff.a, diff.b), (1, 2));
    }
}
