use crate::content::ContentMatchError;
use crate::de::{self, JsonError};
use crate::fragment::{Fragment, IndexError};
use crate::node::Node;
use crate::resolved_pos::{ResolveErr, ResolvedPos};
use crate::schema::{NodeType, Schema};
use displaydoc::Display;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

/// Error when cutting a slice out of a document
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, Error)]
pub enum SliceError {
    /// Could not resolve an endpoint
    Resolve(#[from] ResolveErr),
    /// Index error
    Index(#[from] IndexError),
    /// Removing a non-flat range
    NonFlatRange,
}

/// Error on insertion into a slice
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, Error)]
pub enum InsertError {
    /// Index error
    Index(#[from] IndexError),
    /// Content match error
    Content(#[from] ContentMatchError),
}

/// An error that can occur when replacing a slice
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ReplaceError {
    /// Inserted content deeper than insertion position
    InsertTooDeep,
    /// Inconsistent open depths
    InconsistentOpenDepths {
        /// Depth at the start
        from_depth: usize,
        /// How many nodes are "open" at the start
        open_start: usize,
        /// Depth at the end
        to_depth: usize,
        /// How many nodes are "open" at the end
        open_end: usize,
    },
    /// Could not resolve a position
    Resolve(#[from] ResolveErr),
    /// Cannot join {0:?} onto {1:?}
    CannotJoin(NodeType, NodeType),
    /// Invalid content for node {0:?}
    InvalidContent(NodeType),
}

/// A slice represents a piece cut out of a larger document. It stores not
/// only a fragment, but also the depth up to which nodes on both sides are
/// ‘open’ (cut through).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slice {
    /// The slice's content.
    pub content: Fragment,
    /// The open depth at the start.
    pub open_start: usize,
    /// The open depth at the end.
    pub open_end: usize,
}

impl Slice {
    /// Create a slice. When specifying a non-zero open depth, you must make
    /// sure that there are nodes of at least that depth at the appropriate
    /// side of the fragment — i.e. if the fragment is an empty paragraph
    /// node, `open_start` and `open_end` can't be greater than 1.
    ///
    /// It is not necessary for the content of open nodes to conform to the
    /// schema's content constraints, though it should be a valid
    /// start/end/middle for such a node, depending on which sides are open.
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Slice {
        Slice {
            content,
            open_start,
            open_end,
        }
    }

    /// Create a slice where both sides are open as far as possible: the open
    /// depths are the depths of the first/last leaf-free spine of the
    /// fragment. When `open_isolating` is false, nodes marked as isolating
    /// stop the opening.
    pub fn max_open(fragment: Fragment, open_isolating: bool) -> Slice {
        let mut open_start = 0;
        let mut node = fragment.first_child();
        while let Some(n) = node {
            if n.is_leaf() || (!open_isolating && n.r#type().is_isolating()) {
                break;
            }
            open_start += 1;
            node = n.first_child();
        }
        let mut open_end = 0;
        let mut node = fragment.last_child();
        while let Some(n) = node {
            if n.is_leaf() || (!open_isolating && n.r#type().is_isolating()) {
                break;
            }
            open_end += 1;
            node = n.last_child();
        }
        Slice::new(fragment, open_start, open_end)
    }

    /// The size a slice would add when inserted into a document.
    pub fn size(&self) -> usize {
        self.content.size() - self.open_start - self.open_end
    }

    /// Insert the given fragment at `pos` in the slice's own offset space,
    /// keeping the open depths. Returns `None` when the content around the
    /// insertion point does not accept the fragment.
    pub fn insert_at(&self, pos: usize, fragment: Fragment) -> Result<Option<Slice>, InsertError> {
        let content = insert_into(&self.content, pos + self.open_start, fragment, None)?;
        Ok(content.map(|c| Slice::new(c, self.open_start, self.open_end)))
    }

    /// Remove the content between the given positions in the slice's own
    /// offset space. The range must be flat: both endpoints must land in the
    /// same child, or both directly at this slice's depth.
    pub fn remove_between(&self, from: usize, to: usize) -> Result<Slice, SliceError> {
        let content = remove_range(
            &self.content,
            from + self.open_start,
            to + self.open_start,
        )?;
        Ok(Slice::new(content, self.open_start, self.open_end))
    }

    /// Deserialize a slice from its JSON representation.
    pub fn from_json(schema: &Schema, value: &Value) -> Result<Slice, JsonError> {
        if value.is_null() {
            return Ok(Slice::default());
        }
        let obj = de::expect_object(value, "slice")?;
        let content = Fragment::from_json(schema, de::require(obj, "content", "slice")?)?;
        let open = |key: &'static str| -> usize {
            obj.get(key).and_then(Value::as_u64).unwrap_or(0) as usize
        };
        Ok(Slice::new(content, open("openStart"), open("openEnd")))
    }
}

impl Serialize for Slice {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        if self.content.size() == 0 {
            return serializer.serialize_none();
        }
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("content", self.content.children())?;
        if self.open_start > 0 {
            map.serialize_entry("openStart", &self.open_start)?;
        }
        if self.open_end > 0 {
            map.serialize_entry("openEnd", &self.open_end)?;
        }
        map.end()
    }
}

fn insert_into(
    content: &Fragment,
    dist: usize,
    insert: Fragment,
    parent: Option<&Node>,
) -> Result<Option<Fragment>, InsertError> {
    let index = content.find_index(dist, false)?;
    let child = content.maybe_child(index.index);
    if index.offset == dist || matches!(child, Some(c) if c.is_text()) {
        if let Some(p) = parent {
            if !p.can_replace(index.index, index.index, Some(&insert), ..)? {
                return Ok(None);
            }
        }
        Ok(Some(
            content
                .cut(..dist)
                .append(insert)
                .append(content.cut(dist..)),
        ))
    } else {
        let child = child.expect("offset != dist, so the position is inside a child");
        let inner = insert_into(child.content(), dist - index.offset - 1, insert, Some(child))?;
        match inner {
            Some(i) => Ok(Some(
                content
                    .replace_child(index.index, child.copy(|_| i))
                    .into_owned(),
            )),
            None => Ok(None),
        }
    }
}

fn remove_range(content: &Fragment, from: usize, to: usize) -> Result<Fragment, SliceError> {
    let index = content.find_index(from, false)?;
    let child = content.maybe_child(index.index);
    let index_to = content.find_index(to, false)?;
    if index.offset == from || matches!(child, Some(c) if c.is_text()) {
        if index_to.offset != to && !content.child(index_to.index).is_text() {
            return Err(SliceError::NonFlatRange);
        }
        return Ok(content.cut(..from).append(content.cut(to..)));
    }
    if index.index != index_to.index {
        return Err(SliceError::NonFlatRange);
    }
    let child = child.expect("offset != from, so the position is inside a child");
    let inner = remove_range(
        child.content(),
        from - index.offset - 1,
        to - index.offset - 1,
    )?;
    Ok(content
        .replace_child(index.index, child.copy(|_| inner))
        .into_owned())
}

pub(crate) fn replace(
    rp_from: &ResolvedPos,
    rp_to: &ResolvedPos,
    slice: &Slice,
) -> Result<Node, ReplaceError> {
    if slice.open_start > rp_from.depth() {
        Err(ReplaceError::InsertTooDeep)
    } else if rp_from.depth() - slice.open_start != rp_to.depth() - slice.open_end {
        Err(ReplaceError::InconsistentOpenDepths {
            from_depth: rp_from.depth(),
            open_start: slice.open_start,
            to_depth: rp_to.depth(),
            open_end: slice.open_end,
        })
    } else {
        replace_outer(rp_from, rp_to, slice, 0)
    }
}

fn replace_outer(
    rp_from: &ResolvedPos,
    rp_to: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ReplaceError> {
    let index = rp_from.index(depth);
    let node = rp_from.node(depth);
    if index == rp_to.index(depth) && depth < rp_from.depth() - slice.open_start {
        // Both endpoints descend into the same child, and the slice is not
        // yet open here: recurse into that child.
        let inner = replace_outer(rp_from, rp_to, slice, depth + 1)?;
        Ok(node.copy(|c| c.replace_child(index, inner).into_owned()))
    } else if slice.content.size() == 0 {
        // Pure deletion: join the two sides.
        let content = replace_two_way(rp_from, rp_to, depth)?;
        close(node, content)
    } else if slice.open_start == 0
        && slice.open_end == 0
        && rp_from.depth() == depth
        && rp_to.depth() == depth
    {
        // Simple, flat case: splice the slice content directly between the
        // parent offsets.
        let parent = rp_from.parent();
        let content = parent.content();
        let new_content = content
            .cut(0..rp_from.parent_offset())
            .append(slice.content.clone())
            .append(content.cut(rp_to.parent_offset()..));
        close(parent, new_content)
    } else {
        let (node_for_slice, start, end) = prepare_slice_for_replace(slice, rp_from);
        let rp_start = ResolvedPos::resolve(&node_for_slice, start)?;
        let rp_end = ResolvedPos::resolve(&node_for_slice, end)?;
        let content = replace_three_way(rp_from, &rp_start, &rp_end, rp_to, depth)?;
        close(node, content)
    }
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ReplaceError> {
    if sub.r#type().compatible_content(main.r#type()) {
        Ok(())
    } else {
        Err(ReplaceError::CannotJoin(
            sub.r#type().clone(),
            main.r#type().clone(),
        ))
    }
}

fn joinable<'a>(
    rp_before: &ResolvedPos<'a>,
    rp_after: &ResolvedPos,
    depth: usize,
) -> Result<&'a Node, ReplaceError> {
    let node = rp_before.node(depth);
    check_join(node, rp_after.node(depth))?;
    Ok(node)
}

fn add_node(child: Cow<Node>, target: &mut Vec<Node>) {
    if let Some(last) = target.last_mut() {
        if child.is_text() && last.is_text() && last.same_markup(&child) {
            let joined = last
                .text()
                .expect("is_text")
                .join(child.text().expect("is_text"));
            *last = last.with_text(joined);
            return;
        }
    }
    target.push(child.into_owned());
}

/// The resolved endpoints bounding a run of siblings emitted at one depth of
/// the merge.
enum ChildRange<'b, 'a> {
    /// Everything before the position
    Before(&'b ResolvedPos<'a>),
    /// Everything after the position
    After(&'b ResolvedPos<'a>),
    /// The children between the two positions
    Between(&'b ResolvedPos<'a>, &'b ResolvedPos<'a>),
}

impl<'b, 'a> ChildRange<'b, 'a> {
    /// The bound the emitted run starts after, if any.
    fn starts_after(&self) -> Option<&'b ResolvedPos<'a>> {
        match self {
            Self::Before(_) => None,
            Self::After(rp) => Some(rp),
            Self::Between(rp, _) => Some(rp),
        }
    }

    /// The bound the emitted run stops at, if any.
    fn stops_at(&self) -> Option<&'b ResolvedPos<'a>> {
        match self {
            Self::Before(rp) => Some(rp),
            Self::After(_) => None,
            Self::Between(_, rp) => Some(rp),
        }
    }

    /// A position whose path reaches the parent the run is emitted from.
    fn anchor(&self) -> &'b ResolvedPos<'a> {
        match self {
            Self::Before(rp) | Self::After(rp) | Self::Between(_, rp) => rp,
        }
    }
}

fn add_range(range: ChildRange, depth: usize, target: &mut Vec<Node>) {
    let node = range.anchor().node(depth);
    let mut start_index = 0;

    let end_index = match range.stops_at() {
        Some(rp_end) => rp_end.index(depth),
        None => node.child_count(),
    };

    if let Some(rp_start) = range.starts_after() {
        start_index = rp_start.index(depth);
        if rp_start.depth() > depth {
            start_index += 1;
        } else if rp_start.text_offset() > 0 {
            add_node(
                rp_start.node_after().expect("positions inside text have a node after"),
                target,
            );
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        add_node(Cow::Borrowed(node.child(i)), target);
    }
    if let Some(rp_end) = range.stops_at() {
        if rp_end.depth() == depth && rp_end.text_offset() > 0 {
            add_node(
                rp_end.node_before().expect("positions inside text have a node before"),
                target,
            );
        }
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ReplaceError> {
    if node.r#type().valid_content(&content) {
        Ok(node.copy(|_| content))
    } else {
        Err(ReplaceError::InvalidContent(node.r#type().clone()))
    }
}

fn replace_three_way(
    rp_from: &ResolvedPos,
    rp_start: &ResolvedPos,
    rp_end: &ResolvedPos,
    rp_to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let open_start = if rp_from.depth() > depth {
        Some(joinable(rp_from, rp_start, depth + 1)?)
    } else {
        None
    };
    let open_end = if rp_to.depth() > depth {
        Some(joinable(rp_end, rp_to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(ChildRange::Before(rp_from), depth, &mut content);
    match (open_start, open_end) {
        (Some(os), Some(oe)) if rp_start.index(depth) == rp_end.index(depth) => {
            check_join(os, oe)?;
            let inner = replace_three_way(rp_from, rp_start, rp_end, rp_to, depth + 1)?;
            let closed = close(os, inner)?;
            add_node(Cow::Owned(closed), &mut content);
        }
        _ => {
            if let Some(os) = open_start {
                let inner = replace_two_way(rp_from, rp_start, depth + 1)?;
                let closed = close(os, inner)?;
                add_node(Cow::Owned(closed), &mut content);
            }
            add_range(ChildRange::Between(rp_start, rp_end), depth, &mut content);
            if let Some(oe) = open_end {
                let inner = replace_two_way(rp_end, rp_to, depth + 1)?;
                let closed = close(oe, inner)?;
                add_node(Cow::Owned(closed), &mut content);
            }
        }
    }
    add_range(ChildRange::After(rp_to), depth, &mut content);
    Ok(Fragment::from_array(content))
}

fn replace_two_way(
    rp_from: &ResolvedPos,
    rp_to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let mut content = Vec::new();
    add_range(ChildRange::Before(rp_from), depth, &mut content);
    if rp_from.depth() > depth {
        let r#type = joinable(rp_from, rp_to, depth + 1)?;
        let inner = replace_two_way(rp_from, rp_to, depth + 1)?;
        let child = close(r#type, inner)?;
        add_node(Cow::Owned(child), &mut content);
    }
    add_range(ChildRange::After(rp_to), depth, &mut content);
    Ok(Fragment::from_array(content))
}

/// Rebuild the slice's content as a full node whose spine copies `rp_along`'s
/// ancestors, so that its boundaries can be resolved like document positions.
fn prepare_slice_for_replace(slice: &Slice, rp_along: &ResolvedPos) -> (Node, usize, usize) {
    let extra = rp_along.depth() - slice.open_start;
    let parent = rp_along.node(extra);
    let mut node = parent.copy(|_| slice.content.clone());
    for i in (0..extra).rev() {
        let wrapped = Fragment::from(node);
        node = rp_along.node(i).copy(|_| wrapped);
    }
    let start = slice.open_start + extra;
    let end = node.content().size() - slice.open_end - extra;
    (node, start, end)
}

#[cfg(test)]
mod tests {
    use super::{ReplaceError, Slice, SliceError};
    use crate::basic::helper::*;
    use crate::fragment::Fragment;
    use crate::node::Node;
    use std::fmt::Debug;
    use std::ops::{Range, RangeBounds};

    fn rpl<DR, SR>(
        (doc, range): (Node, DR),
        insert: Option<(Node, SR)>,
        expected: Node,
    ) where
        DR: RangeBounds<usize> + Debug,
        SR: RangeBounds<usize> + Debug,
    {
        let slice = insert
            .map(|(n, r)| n.slice(r, false).unwrap())
            .unwrap_or_default();
        assert_eq!(doc.replace(range, &slice), Ok(expected));
    }

    fn bad<DR, SR>(
        (doc, range): (Node, DR),
        insert: Option<(Node, SR)>,
        pattern: ReplaceError,
    ) where
        DR: RangeBounds<usize> + Debug,
        SR: RangeBounds<usize> + Debug,
    {
        let slice = insert
            .map(|(n, r)| n.slice(r, false).unwrap())
            .unwrap_or_default();
        assert_eq!(doc.replace(range, &slice), Err(pattern));
    }

    #[test]
    fn join_on_delete() {
        let t = doc((p("one"), p("two")));
        let e = doc((p("onwo"),));
        rpl::<_, Range<usize>>((t, 3..7), None, e);
    }

    #[test]
    fn merges_matching_blocks() {
        let t = doc((p("one"), p("two")));
        let i = doc((p("xxxx"), p("yyyy")));

        let f: Fragment = Fragment::from(vec![p("xx"), p("yy")]);
        assert_eq!(i.slice(3..9, false), Ok(Slice::new(f, 1, 1)));

        let e = doc((p("onxx"), p("yywo")));
        rpl((t, 3..7), Some((i, 3..9)), e);
    }

    #[test]
    fn merges_when_adding_text() {
        rpl(
            (doc((p("one"), p("two"))), 3..7),
            Some((doc(p("H")), 1..2)),
            doc(p("onHwo")),
        );
    }

    #[test]
    fn can_insert_text() {
        rpl(
            (doc((p("before"), p("one"), p("after"))), 11..11),
            Some((doc(p("H")), 1..2)),
            doc((p("before"), p("onHe"), p("after"))),
        );
    }

    #[test]
    fn keeps_the_receiving_block_on_heading_insert() {
        rpl(
            (doc((p("one"), p("two"))), 3..7),
            Some((doc(h1("H")), 1..2)),
            doc(p("onHwo")),
        );
    }

    #[test]
    fn can_merge_a_nested_node() {
        rpl(
            (doc(blockquote(blockquote((p("one"), p("two"))))), 5..9),
            Some((doc(p("H")), 1..2)),
            doc(blockquote(blockquote(p("onHwo")))),
        );
    }

    #[test]
    fn can_replace_within_a_block() {
        rpl(
            (doc(blockquote(p("abcd"))), 3..5),
            Some((doc(p("xyz")), 2..3)),
            doc(blockquote(p("ayd"))),
        );
    }

    #[test]
    fn can_insert_a_lopsided_slice() {
        let t = doc(blockquote(blockquote((p("one"), p("two"), p("three")))));
        let i = doc(blockquote((p("aaaa"), p("bb"), p("cc"), p("dd"))));
        let e = doc(blockquote(blockquote((
            p("onaa"),
            p("bb"),
            p("cc"),
            p("three"),
        ))));
        rpl((t, 5..12), Some((i, 4..15)), e);
    }

    #[test]
    fn can_insert_a_deep_lopsided_slice() {
        let t = doc(blockquote((
            blockquote((p("one"), p("two"), p("three"))),
            p("x"),
        )));
        let i = doc((blockquote((p("aaaa"), p("bb"), p("cc"))), p("dd")));
        let e = doc(blockquote((
            blockquote((p("onaa"), p("bb"), p("cc"))),
            p("x"),
        )));
        rpl((t, 5..20), Some((i, 4..16)), e);
    }

    #[test]
    fn can_merge_multiple_levels() {
        let t = doc((
            blockquote(blockquote(p("hello"))),
            blockquote(blockquote(p("a"))),
        ));
        let e = doc(blockquote(blockquote(p("hella"))));
        rpl::<_, Range<usize>>((t, 7..14), None, e);
    }

    #[test]
    fn can_merge_multiple_levels_while_inserting() {
        let t = doc((
            blockquote(blockquote(p("hello"))),
            blockquote(blockquote(p("a"))),
        ));
        let i = doc(p("i"));
        let e = doc(blockquote(blockquote(p("hellia"))));
        rpl((t, 7..14), Some((i, 1..2)), e);
    }

    #[test]
    fn can_insert_a_split() {
        rpl(
            (doc(p("foobar")), 4..4),
            Some((doc((p("x"), p("y"))), 1..5)),
            doc((p("foox"), p("ybar"))),
        );
    }

    #[test]
    fn can_insert_a_deep_split() {
        rpl(
            (doc(blockquote(p("fooxbar"))), 5..6),
            Some((doc((blockquote(p("x")), blockquote(p("y")))), 2..8)),
            doc((blockquote(p("foox")), blockquote(p("ybar")))),
        );
    }

    #[test]
    fn can_add_a_split_one_level_up() {
        rpl(
            (doc(blockquote((p("foou"), p("vbar")))), 5..9),
            Some((doc((blockquote(p("x")), blockquote(p("y")))), 2..8)),
            doc((blockquote(p("foox")), blockquote(p("ybar")))),
        );
    }

    #[test]
    fn keeps_the_node_type_of_the_left_node() {
        rpl(
            (doc(h1("foobar")), 4..8),
            Some((doc(p("foobaz")), 4..8)),
            doc(h1("foobaz")),
        );
    }

    #[test]
    fn keeps_the_node_type_even_when_empty() {
        rpl(
            (doc(h1("bar")), 1..5),
            Some((doc(p("foobaz")), 4..8)),
            doc(h1("baz")),
        );
    }

    #[test]
    fn doesnt_allow_the_left_side_to_be_too_deep() {
        bad(
            (doc(p("")), 1..1),
            Some((doc(blockquote(p(""))), 2..4)),
            ReplaceError::InsertTooDeep,
        );
    }

    #[test]
    fn doesnt_allow_a_depth_mismatch() {
        bad(
            (doc(p("")), 1..1),
            Some((doc(p("")), 0..1)),
            ReplaceError::InconsistentOpenDepths {
                from_depth: 1,
                open_start: 0,
                to_depth: 1,
                open_end: 1,
            },
        );
    }

    #[test]
    fn rejects_a_bad_fit() {
        let e = ReplaceError::InvalidContent(schema().node_type("doc").unwrap());
        bad((doc_empty(), 0..0), Some((doc(p("foo")), 1..4)), e);
    }

    #[test]
    fn rejects_a_nested_paragraph() {
        // A paragraph cannot host another paragraph
        let t = doc(p("x"));
        let slice = Slice::new(Fragment::from(p("y")), 0, 0);
        assert_eq!(
            t.replace(1..1, &slice),
            Err(ReplaceError::InvalidContent(
                schema().node_type("paragraph").unwrap()
            ))
        );
    }

    #[test]
    fn rejects_an_unjoinable_delete() {
        let t = doc((blockquote(p("a")), pre("b")));
        let e = ReplaceError::CannotJoin(
            schema().node_type("code_block").unwrap(),
            schema().node_type("blockquote").unwrap(),
        );
        bad::<_, Range<usize>>((t, 4..6), None, e);
    }

    #[test]
    fn check_content_validity() {
        bad(
            (doc(blockquote(p("hi"))), 1..6),
            Some((doc(blockquote("hi")), 3..4)),
            ReplaceError::InvalidContent(schema().node_type("blockquote").unwrap()),
        );
    }

    #[test]
    fn slice_replace_is_identity() {
        let d = doc(p("abcdef"));
        let slice = d.slice(2..4, false).unwrap();
        assert_eq!(d.replace(2..4, &slice), Ok(d.clone()));

        let nested = doc((p("one"), blockquote((p("two"), p("three")))));
        for (from, to) in [(0, 13), (2, 11), (6, 6), (1, 3)] {
            let slice = nested.slice(from..to, false).unwrap();
            assert_eq!(nested.replace(from..to, &slice), Ok(nested.clone()));
        }
    }

    #[test]
    fn max_open_finds_spine_depths() {
        let frag = doc(blockquote(p("ab"))).content().clone();
        let slice = Slice::max_open(frag, true);
        assert_eq!((slice.open_start, slice.open_end), (2, 2));

        let flat = Fragment::from(hr());
        let slice = Slice::max_open(flat, true);
        assert_eq!((slice.open_start, slice.open_end), (0, 0));
    }

    #[test]
    fn insert_at_respects_content_rules() {
        let base = doc((p("ab"), p("cd"))).slice(1..7, false).unwrap();
        // Inserting text into the open paragraph works
        let inserted = base
            .insert_at(1, Fragment::from(text("x")))
            .unwrap()
            .unwrap();
        assert_eq!(inserted.content.size(), base.content.size() + 1);
        // Inserting a paragraph inside a paragraph is refused
        let refused = base.insert_at(1, Fragment::from(p("x"))).unwrap();
        assert!(refused.is_none());
    }

    #[test]
    fn remove_between_requires_flat_range() {
        let slice = doc(p("abcd")).slice(1..5, false).unwrap();
        let removed = slice.remove_between(1, 3).unwrap();
        assert_eq!(removed.content.size(), 4);
        assert_eq!(removed.content.child(0).text_content(), "ad");

        let deep = doc((p("ab"), p("cd"))).slice(1..7, false).unwrap();
        assert_eq!(deep.remove_between(1, 5), Err(SliceError::NonFlatRange));
    }

    #[test]
    fn slice_json_round_trip() {
        let slice = doc((p("ab"), p("cd"))).slice(2..6, false).unwrap();
        let encoded = serde_json::to_value(&slice).unwrap();
        assert_eq!(Slice::from_json(schema(), &encoded).unwrap(), slice);

        let empty = Slice::default();
        assert_eq!(serde_json::to_value(&empty).unwrap(), serde_json::Value::Null);
        assert_eq!(
            Slice::from_json(schema(), &serde_json::Value::Null).unwrap(),
            empty
        );
    }
}
