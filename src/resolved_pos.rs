use crate::fragment::IndexError;
use crate::mark::Mark;
use crate::node::Node;
use derive_new::new;
use displaydoc::Display;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use thiserror::Error;

/// Errors at `resolve`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, Error)]
pub enum ResolveErr {
    /// Position {pos} out of range
    RangeError {
        /// The position that was out of range
        pos: usize,
    },
    /// Index error
    Index(#[from] IndexError),
}

/// The index and start offset of a child inside a fragment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, new)]
pub(crate) struct Index {
    pub index: usize,
    pub offset: usize,
}

/// A node in the resolution path
#[derive(Copy, Clone, PartialEq, new)]
pub struct ResolvedNode<'a> {
    /// Reference to the node
    pub node: &'a Node,
    /// Index into the node's parent fragment
    pub index: usize,
    /// Offset immediately before the node
    pub before: usize,
}

impl<'a> fmt::Debug for ResolvedNode<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNode")
            .field("node.type", self.node.r#type())
            .field("index", &self.index)
            .field("before", &self.before)
            .finish()
    }
}

/// You can resolve a position to get more information about it. Objects of
/// this class represent such a resolved position, providing various pieces of
/// context information, and some helper methods.
///
/// Throughout this interface, methods that take a depth parameter refer to
/// the ancestor at that depth: `0` is the root node, `depth()` is the direct
/// parent of the position.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPos<'a> {
    pub(crate) pos: usize,
    path: Vec<ResolvedNode<'a>>,
    pub(crate) parent_offset: usize,
    pub(crate) depth: usize,
}

impl<'a> ResolvedPos<'a> {
    pub(crate) fn new(pos: usize, path: Vec<ResolvedNode<'a>>, parent_offset: usize) -> Self {
        Self {
            depth: path.len() - 1,
            pos,
            path,
            parent_offset,
        }
    }

    /// The position that was resolved.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The number of levels the parent node is from the root. If this
    /// position points directly into the root node, it is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The offset this position has into its parent node.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// The parent node that the position points into. Note that even if a
    /// position points into a text node, that node is not considered the
    /// parent — text nodes are ‘flat’ in this model, and have no content.
    pub fn parent(&self) -> &'a Node {
        self.node(self.depth)
    }

    /// The root node in which the position was resolved.
    pub fn doc(&self) -> &'a Node {
        self.node(0)
    }

    /// The ancestor node at the given level. `p.node(p.depth())` is the same
    /// as `p.parent()`.
    pub fn node(&self, depth: usize) -> &'a Node {
        self.path[depth].node
    }

    /// The index into the ancestor at the given level. If this points at the
    /// 3rd node in the 2nd paragraph on the top level, for example,
    /// `p.index(0)` is 1 and `p.index(1)` is 2.
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// The index pointing after this position into the ancestor at the given
    /// level.
    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    /// The (absolute) position at the start of the node at the given level.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].before + 1
        }
    }

    /// The (absolute) position at the end of the node at the given level.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content().size()
    }

    /// The (absolute) position directly before the wrapping node at the
    /// given level, or, when depth is `self.depth() + 1`, the original
    /// position.
    pub fn before(&self, depth: usize) -> Option<usize> {
        if depth == 0 {
            None
        } else if depth == self.depth + 1 {
            Some(self.pos)
        } else {
            Some(self.path[depth - 1].before)
        }
    }

    /// The (absolute) position directly after the wrapping node at the given
    /// level, or the original position when depth is `self.depth() + 1`.
    pub fn after(&self, depth: usize) -> Option<usize> {
        if depth == 0 {
            None
        } else if depth == self.depth + 1 {
            Some(self.pos)
        } else {
            Some(self.path[depth - 1].before + self.path[depth].node.node_size())
        }
    }

    /// When this position points into a text node, this returns the distance
    /// between the position and the start of the text node. Will be zero for
    /// positions that point between nodes.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path.last().expect("path is never empty").before
    }

    /// Get the node directly before the position, if any. If the position
    /// points into a text node, only the part of that node before the
    /// position is returned.
    pub fn node_before(&self) -> Option<Cow<'a, Node>> {
        let index = self.index(self.depth);
        let d_off = self.text_offset();
        if d_off > 0 {
            Some(self.parent().child(index).cut(0..d_off))
        } else if index == 0 {
            None
        } else {
            Some(Cow::Borrowed(self.parent().child(index - 1)))
        }
    }

    /// Get the node directly after the position, if any. If the position
    /// points into a text node, only the part of that node after the position
    /// is returned.
    pub fn node_after(&self) -> Option<Cow<'a, Node>> {
        let parent = self.parent();
        let index = self.index(self.depth);
        if index == parent.child_count() {
            return None;
        }
        let d_off = self.text_offset();
        let child = parent.child(index);
        if d_off > 0 {
            Some(child.cut(d_off..))
        } else {
            Some(Cow::Borrowed(child))
        }
    }

    /// Get the position at the given index in the parent node at the given
    /// depth.
    pub fn pos_at_index(&self, index: usize, depth: usize) -> usize {
        let node = self.node(depth);
        let mut pos = self.start(depth);
        for i in 0..index {
            pos += node.child(i).node_size();
        }
        pos
    }

    /// Get the marks at this position, factoring in the surrounding marks'
    /// inclusivity. When the position is at the start of a non-empty node, the
    /// marks of the node after it (if any) are returned.
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth);

        if parent.content().size() == 0 {
            return Vec::new();
        }

        // When inside a text node, just take the marks of that node.
        if self.text_offset() > 0 {
            return parent.child(index).marks().to_vec();
        }

        let before = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
        let (main, other) = match before {
            Some(main) => (main, parent.maybe_child(index)),
            None => match parent.maybe_child(index) {
                Some(main) => (main, None),
                None => return Vec::new(),
            },
        };

        keep_inclusive(main.marks().to_vec(), other)
    }

    /// Get the marks after the current position, if any, except those that
    /// are non-inclusive and not present at position `end`. This is mostly
    /// useful for getting the set of marks to preserve after a deletion.
    /// Will return `None` if this position is at the end of its parent node
    /// or its parent node isn't a textblock (in which case no marks should be
    /// preserved).
    pub fn marks_across(&self, end: &ResolvedPos) -> Option<Vec<Mark>> {
        let after = self.parent().maybe_child(self.index(self.depth))?;
        if !after.is_inline() {
            return None;
        }
        let next = end.parent().maybe_child(end.index(end.depth));
        Some(keep_inclusive(after.marks().to_vec(), next))
    }

    /// The depth up to which this position and the given (non-resolved)
    /// position share the same parent nodes.
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth).rev() {
            if self.start(depth) <= pos && self.end(depth) >= pos {
                return depth;
            }
        }
        0
    }

    /// Returns a range based on the place where this position and the given
    /// position diverge around block content. If both point into the same
    /// textblock, for example, a range around that textblock will be
    /// returned. If they point into different blocks, the range around those
    /// blocks in their shared ancestor is returned. You can pass a predicate
    /// that will be called with a parent node, and which can be used to
    /// restrict the upward search.
    pub fn block_range(
        &self,
        other: &ResolvedPos<'a>,
        pred: Option<&dyn Fn(&Node) -> bool>,
    ) -> Option<NodeRange<'a>> {
        if other.pos < self.pos {
            return other.block_range(self, pred);
        }
        let adjust = if self.parent().inline_content() || self.pos == other.pos {
            1
        } else {
            0
        };
        let top = self.depth.checked_sub(adjust)?;
        for depth in (0..=top).rev() {
            if other.pos <= self.end(depth) && pred.map_or(true, |p| p(self.node(depth))) {
                return Some(NodeRange::new(self.clone(), other.clone(), depth));
            }
        }
        None
    }

    /// Resolve a position, never consulting the cache.
    pub(crate) fn resolve(doc: &'a Node, pos: usize) -> Result<Self, ResolveErr> {
        if pos > doc.content().size() {
            return Err(ResolveErr::RangeError { pos });
        }
        let mut path = vec![];
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc;

        loop {
            let Index { index, offset } = node.content().find_index(parent_offset, false)?;
            let rem = parent_offset - offset;
            path.push(ResolvedNode {
                node,
                index,
                before: start + offset,
            });
            if rem == 0 {
                break;
            }
            node = node.child(index);
            if node.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(ResolvedPos::new(pos, path, parent_offset))
    }

    /// Resolve a position through the per-thread memoisation buffer. Repeated
    /// resolutions of the same position in the same document reuse the stored
    /// index path instead of searching again.
    pub(crate) fn resolve_cached(doc: &'a Node, pos: usize) -> Result<Self, ResolveErr> {
        let hit = RESOLVE_CACHE.with(|cache| {
            let cache = cache.borrow();
            cache
                .entries
                .iter()
                .find(|e| e.pos == pos && e.doc.ptr_eq(doc))
                .map(|e| (e.steps.clone(), e.parent_offset))
        });
        if let Some((steps, parent_offset)) = hit {
            let mut path = Vec::with_capacity(steps.len());
            let mut node = doc;
            for (i, step) in steps.iter().enumerate() {
                path.push(ResolvedNode {
                    node,
                    index: step.index,
                    before: step.offset,
                });
                if i + 1 < steps.len() {
                    node = node.child(step.index);
                }
            }
            return Ok(ResolvedPos::new(pos, path, parent_offset));
        }

        let resolved = Self::resolve(doc, pos)?;
        RESOLVE_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            let entry = CacheEntry {
                doc: doc.clone(),
                pos,
                steps: resolved
                    .path
                    .iter()
                    .map(|rn| Index::new(rn.index, rn.before))
                    .collect(),
                parent_offset: resolved.parent_offset,
            };
            cache.put(entry);
        });
        Ok(resolved)
    }
}

fn keep_inclusive(mut marks: Vec<Mark>, other: Option<&Node>) -> Vec<Mark> {
    let mut i = 0;
    while i < marks.len() {
        let keep = marks[i].r#type().inclusive()
            || other.map_or(false, |o| marks[i].is_in_set(o.marks()));
        if keep {
            i += 1;
        } else {
            marks.remove(i);
        }
    }
    marks
}

const RESOLVE_CACHE_SIZE: usize = 12;

struct CacheEntry {
    doc: Node,
    pos: usize,
    steps: Vec<Index>,
    parent_offset: usize,
}

struct ResolveCache {
    entries: Vec<CacheEntry>,
    next: usize,
}

impl ResolveCache {
    fn put(&mut self, entry: CacheEntry) {
        if self.entries.len() < RESOLVE_CACHE_SIZE {
            self.entries.push(entry);
        } else {
            self.entries[self.next] = entry;
            self.next = (self.next + 1) % RESOLVE_CACHE_SIZE;
        }
    }
}

thread_local! {
    static RESOLVE_CACHE: RefCell<ResolveCache> = RefCell::new(ResolveCache {
        entries: Vec::with_capacity(RESOLVE_CACHE_SIZE),
        next: 0,
    });
}

/// Represents a flat range of content, i.e. one that starts and ends in the
/// same node.
#[derive(Debug, Clone, PartialEq, new)]
pub struct NodeRange<'a> {
    /// A resolved position along the start of the content. May have a depth
    /// greater than this object's depth property, since these are the
    /// positions that were used to compute the range, not re-resolved
    /// positions directly at its boundaries.
    pub from: ResolvedPos<'a>,
    /// A position along the end of the content.
    pub to: ResolvedPos<'a>,
    /// The depth of the node that this range points into.
    pub depth: usize,
}

impl<'a> NodeRange<'a> {
    /// The position at the start of the range.
    pub fn start(&self) -> usize {
        self.from.before(self.depth + 1).unwrap_or(self.from.pos)
    }

    /// The position at the end of the range.
    pub fn end(&self) -> usize {
        self.to.after(self.depth + 1).unwrap_or(self.to.pos)
    }

    /// The parent node that the range points into.
    pub fn parent(&self) -> &'a Node {
        self.from.node(self.depth)
    }

    /// The start index of the range in the parent node.
    pub fn start_index(&self) -> usize {
        self.from.index(self.depth)
    }

    /// The end index of the range in the parent node.
    pub fn end_index(&self) -> usize {
        self.to.index_after(self.depth)
    }
}

#[cfg(test)]
mod tests {
    use crate::basic::helper::*;
    use crate::node::Node;
    use std::borrow::Cow;

    fn text_of(node: Option<Cow<Node>>) -> Option<String> {
        node.map(|n| n.text_content())
    }

    #[test]
    fn resolves_positions_through_the_tree() {
        let d = doc((p("ab"), blockquote(p((em("cd"), "ef")))));
        let p1 = d.child(0).clone();
        let blk = d.child(1).clone();
        let p2 = blk.child(0).clone();

        // (depth, parent, start, end, parent_offset, before, after)
        let expected: Vec<(usize, &Node, usize, usize, usize)> = vec![
            (0, &d, 0, 12, 0),   // 0: before first paragraph
            (1, &p1, 1, 3, 0),   // 1: start of first paragraph
            (1, &p1, 1, 3, 1),   // 2: between a and b
            (1, &p1, 1, 3, 2),   // 3: end of first paragraph
            (0, &d, 0, 12, 4),   // 4: between paragraph and blockquote
            (1, &blk, 5, 11, 0), // 5: start of blockquote
            (2, &p2, 6, 10, 0),  // 6: start of inner paragraph
            (2, &p2, 6, 10, 1),  // 7: inside em text
            (2, &p2, 6, 10, 2),  // 8: between cd and ef
            (2, &p2, 6, 10, 3),  // 9: inside plain text
            (2, &p2, 6, 10, 4),  // 10: end of inner paragraph
            (1, &blk, 5, 11, 6), // 11: end of blockquote
            (0, &d, 0, 12, 12),  // 12: after blockquote
        ];

        for (pos, (depth, parent, start, end, parent_offset)) in expected.iter().enumerate() {
            let rp = d.resolve(pos).unwrap();
            assert_eq!(rp.pos(), pos);
            assert_eq!(rp.depth(), *depth, "depth at {}", pos);
            assert_eq!(rp.parent(), *parent, "parent at {}", pos);
            assert_eq!(rp.start(rp.depth()), *start, "start at {}", pos);
            assert_eq!(rp.end(rp.depth()), *end, "end at {}", pos);
            assert_eq!(rp.parent_offset(), *parent_offset, "offset at {}", pos);
            // resolve(p).start(depth) + parent_offset == p
            assert_eq!(rp.start(rp.depth()) + rp.parent_offset(), pos);
        }
    }

    #[test]
    fn node_before_and_after() {
        let d = doc((p("ab"),));
        let rp = d.resolve(2).unwrap();
        assert_eq!(text_of(rp.node_before()), Some("a".to_owned()));
        assert_eq!(text_of(rp.node_after()), Some("b".to_owned()));

        let rp = d.resolve(0).unwrap();
        assert_eq!(text_of(rp.node_before()), None);
        assert_eq!(rp.node_after().unwrap().as_ref(), d.child(0));
    }

    #[test]
    fn cached_resolution_matches_fresh() {
        let d = doc((p("hello"), p("world")));
        for _ in 0..3 {
            for pos in 0..=d.content().size() {
                let rp = d.resolve(pos).unwrap();
                assert_eq!(rp.pos(), pos);
                assert_eq!(rp.start(rp.depth()) + rp.parent_offset(), pos);
            }
        }
    }

    #[test]
    fn shared_depth_finds_common_parent() {
        let d = doc((p("ab"), blockquote(p("cd"))));
        let rp = d.resolve(6).unwrap();
        assert_eq!(rp.shared_depth(7), rp.depth());
        assert_eq!(rp.shared_depth(1), 0);
    }

    #[test]
    fn marks_inherit_at_end_of_inclusive_mark() {
        let d = doc(p((em("hi"), " there")));
        let marks = d.resolve(3).unwrap().marks();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].r#type().name(), "em");
    }

    #[test]
    fn marks_do_not_reach_before_a_mark() {
        let d = doc(p(("one ", em("two"))));
        let marks = d.resolve(5).unwrap().marks();
        assert!(marks.is_empty());
    }

    #[test]
    fn non_inclusive_marks_stop_at_their_end() {
        let d = doc(p((a("http://x", "link"), "after")));
        // Position after the link text
        let marks = d.resolve(5).unwrap().marks();
        assert!(marks.is_empty());
        // Inside the link the mark is active
        let marks = d.resolve(2).unwrap().marks();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].r#type().name(), "link");
    }

    #[test]
    fn marks_across_preserves_shared_marks() {
        let d = doc((p((em("ab"), "cd")), p(em("ef"))));
        let from = d.resolve(1).unwrap();
        let to = d.resolve(9).unwrap();
        let across = from.marks_across(&to).unwrap();
        assert_eq!(across.len(), 1);

        // At the end of a parent there is nothing after
        let end = d.resolve(5).unwrap();
        assert_eq!(end.marks_across(&to), None);
    }

    #[test]
    fn block_range_finds_enclosing_blocks() {
        let d = doc(blockquote((p("ab"), p("cd"))));
        let from = d.resolve(3).unwrap();
        let to = d.resolve(7).unwrap();
        let range = from.block_range(&to, None).unwrap();
        assert_eq!(range.depth, 1);
        assert_eq!(range.parent().r#type().name(), "blockquote");
        assert_eq!(range.start(), 1);
        assert_eq!(range.end(), 9);
        assert_eq!((range.start_index(), range.end_index()), (0, 2));
    }

    #[test]
    fn pos_at_index_walks_children() {
        let d = doc((p("ab"), p("cd")));
        let rp = d.resolve(5).unwrap();
        assert_eq!(rp.pos_at_index(0, 0), 0);
        assert_eq!(rp.pos_at_index(1, 0), 4);
        assert_eq!(rp.pos_at_index(2, 0), 8);
    }

    #[test]
    fn out_of_range_positions_error() {
        let d = doc(p("ab"));
        assert!(d.resolve(7).is_err());
        assert!(d.resolve(4).is_ok());
    }
}
