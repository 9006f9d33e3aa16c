//! # Content expressions
//!
//! A node type's `content` spec — for example `"paragraph+"`,
//! `"heading block*"` or `"(text | image)*"` — is a regular expression over
//! child node types and groups. It is parsed into a nondeterministic finite
//! automaton and then subset-converted into a deterministic one whose states
//! are the [`ContentMatch`] values handed out by the schema.
use crate::fragment::{bounds, Fragment};
use crate::schema::{NodeType, Schema, SchemaError};
use displaydoc::Display;
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeBounds;
use thiserror::Error;

/// Error on content matching
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, Error)]
pub enum ContentMatchError {
    /// Called content_match_at on a node with invalid content
    InvalidContent,
}

/// A deterministic automaton over child node types, stored per schema. One
/// automaton is shared by all node types with the same content expression.
pub(crate) struct Dfa {
    pub(crate) states: Vec<DfaState>,
}

pub(crate) struct DfaState {
    pub(crate) accept: bool,
    /// `(node type index, target state)` pairs, in the order the types first
    /// appear in the expression.
    pub(crate) edges: Vec<(usize, usize)>,
}

/// Instances of this class represent a match state of a node type's content
/// expression, and can be used to find out whether further content matches
/// here, and whether a given position is a valid end of the node.
#[derive(Clone)]
pub struct ContentMatch {
    pub(crate) schema: Schema,
    pub(crate) dfa: usize,
    pub(crate) state: usize,
}

impl ContentMatch {
    fn dfa_state(&self) -> &DfaState {
        &self.schema.data().dfas[self.dfa].states[self.state]
    }

    fn at(&self, state: usize) -> ContentMatch {
        ContentMatch {
            schema: self.schema.clone(),
            dfa: self.dfa,
            state,
        }
    }

    /// True when this match state represents a valid end of the node.
    pub fn valid_end(&self) -> bool {
        self.dfa_state().accept
    }

    /// True when this match state only allows inline content.
    pub fn inline_content(&self) -> bool {
        match self.dfa_state().edges.first() {
            Some((r#type, _)) => self.schema.node_type_by_id(*r#type).is_inline(),
            None => false,
        }
    }

    /// Match a node type, returning a match after that node if successful.
    pub fn match_type(&self, r#type: &NodeType) -> Option<ContentMatch> {
        self.dfa_state()
            .edges
            .iter()
            .find(|(id, _)| *id == r#type.id())
            .map(|(_, next)| self.at(*next))
    }

    /// Try to match a fragment. Returns the resulting match when successful.
    pub fn match_fragment(&self, fragment: &Fragment) -> Option<ContentMatch> {
        self.match_fragment_range(fragment, ..)
    }

    /// Try to match a part of a fragment. Returns the resulting match when
    /// successful.
    pub fn match_fragment_range<R: RangeBounds<usize>>(
        &self,
        fragment: &Fragment,
        range: R,
    ) -> Option<ContentMatch> {
        let (start, end) = bounds(&range, fragment.child_count());

        let mut test = self.clone();
        for child in &fragment.children()[start..end] {
            test = test.match_type(child.r#type())?;
        }
        Some(test)
    }

    /// The number of outgoing edges this node has in the finite automaton
    /// that describes the content expression.
    pub fn edge_count(&self) -> usize {
        self.dfa_state().edges.len()
    }

    /// Get the _n_'th outgoing edge from this node in the finite automaton
    /// that describes the content expression.
    pub fn edge(&self, index: usize) -> Option<(NodeType, ContentMatch)> {
        self.dfa_state()
            .edges
            .get(index)
            .map(|(r#type, next)| (self.schema.node_type_by_id(*r#type), self.at(*next)))
    }

    /// Get the first matching node type at this match position that can be
    /// generated (is not a text node and does not have required attributes).
    pub fn default_type(&self) -> Option<NodeType> {
        self.dfa_state()
            .edges
            .iter()
            .map(|(r#type, _)| self.schema.node_type_by_id(*r#type))
            .find(|r#type| !r#type.is_text() && !r#type.has_required_attrs())
    }

    /// Test whether the two match states are compatible, i.e. whether there
    /// is a node type that both could consume next.
    pub fn compatible(&self, other: &ContentMatch) -> bool {
        self.dfa_state().edges.iter().any(|(r#type, _)| {
            other
                .dfa_state()
                .edges
                .iter()
                .any(|(other_type, _)| r#type == other_type)
        })
    }

    /// Try to match the given fragment, and if that fails, see if it can be
    /// made to match by inserting nodes in front of it. When successful,
    /// return a fragment of inserted nodes (which may be empty if nothing had
    /// to be inserted). When `to_end` is true, only return a fragment if the
    /// resulting match goes to the end of the content expression.
    pub fn fill_before(
        &self,
        after: &Fragment,
        to_end: bool,
        start_index: usize,
    ) -> Option<Fragment> {
        let mut seen = vec![self.state];
        self.search(after, to_end, start_index, &mut seen, &mut Vec::new())
    }

    fn search(
        &self,
        after: &Fragment,
        to_end: bool,
        start_index: usize,
        seen: &mut Vec<usize>,
        types: &mut Vec<NodeType>,
    ) -> Option<Fragment> {
        if let Some(finished) = self.match_fragment_range(after, start_index..) {
            if !to_end || finished.valid_end() {
                let mut filled = Vec::with_capacity(types.len());
                for r#type in types.iter() {
                    filled.push(r#type.create_and_fill(None, Fragment::new(), Vec::new()).ok()??);
                }
                return Some(Fragment::from_array(filled));
            }
        }
        for i in 0..self.edge_count() {
            let (r#type, next) = self.edge(i).expect("index in range");
            if r#type.is_text() || r#type.has_required_attrs() || seen.contains(&next.state) {
                continue;
            }
            seen.push(next.state);
            types.push(r#type);
            let found = next.search(after, to_end, start_index, seen, types);
            types.pop();
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

impl PartialEq for ContentMatch {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.dfa == other.dfa && self.state == other.state
    }
}

impl Eq for ContentMatch {}

impl fmt::Debug for ContentMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.dfa_state();
        f.debug_struct("ContentMatch")
            .field("valid_end", &state.accept)
            .field(
                "next",
                &state
                    .edges
                    .iter()
                    .map(|(r#type, _)| self.schema.node_type_by_id(*r#type).name().to_owned())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Compile a content expression into a deterministic automaton. `resolve`
/// maps a type or group name to the matching node type indices.
pub(crate) fn compile_expr<F>(expr: &str, resolve: &F) -> Result<Dfa, SchemaError>
where
    F: Fn(&str) -> Option<Vec<usize>>,
{
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Ok(Dfa {
            states: vec![DfaState {
                accept: true,
                edges: vec![],
            }],
        });
    }
    let mut stream = TokenStream::new(expr, trimmed);
    let parsed = parse_expr(&mut stream, resolve)?;
    if stream.peek().is_some() {
        return Err(stream.error("unexpected trailing input"));
    }
    let nfa = build_nfa(&parsed);
    let dfa = build_dfa(&nfa);
    tracing::debug!(
        expr,
        nfa_states = nfa.states.len(),
        dfa_states = dfa.states.len(),
        "compiled content expression"
    );
    Ok(dfa)
}

enum Expr {
    Choice(Vec<Expr>),
    Seq(Vec<Expr>),
    Star(Box<Expr>),
    Plus(Box<Expr>),
    Opt(Box<Expr>),
    Range {
        min: usize,
        max: Option<usize>,
        inner: Box<Expr>,
    },
    Name(Vec<usize>),
}

struct TokenStream<'a> {
    expr: &'a str,
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> TokenStream<'a> {
    fn new(expr: &'a str, trimmed: &'a str) -> Self {
        let mut tokens = vec![];
        let mut rest = trimmed;
        while !rest.is_empty() {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            let word_len = rest
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let len = if word_len == 0 {
                rest.chars().next().map(char::len_utf8).unwrap_or(0)
            } else {
                word_len
            };
            tokens.push(&rest[..len]);
            rest = &rest[len..];
        }
        TokenStream {
            expr,
            tokens,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> SchemaError {
        SchemaError::ContentExpression {
            expr: self.expr.to_owned(),
            message: message.to_owned(),
        }
    }
}

fn parse_expr<F>(stream: &mut TokenStream, resolve: &F) -> Result<Expr, SchemaError>
where
    F: Fn(&str) -> Option<Vec<usize>>,
{
    let mut exprs = vec![parse_expr_seq(stream, resolve)?];
    while stream.eat("|") {
        exprs.push(parse_expr_seq(stream, resolve)?);
    }
    if exprs.len() == 1 {
        Ok(exprs.pop().expect("one expression"))
    } else {
        Ok(Expr::Choice(exprs))
    }
}

fn parse_expr_seq<F>(stream: &mut TokenStream, resolve: &F) -> Result<Expr, SchemaError>
where
    F: Fn(&str) -> Option<Vec<usize>>,
{
    let mut exprs = vec![parse_expr_subscript(stream, resolve)?];
    while matches!(stream.peek(), Some(t) if t != ")" && t != "|") {
        exprs.push(parse_expr_subscript(stream, resolve)?);
    }
    if exprs.len() == 1 {
        Ok(exprs.pop().expect("one expression"))
    } else {
        Ok(Expr::Seq(exprs))
    }
}

fn parse_expr_subscript<F>(stream: &mut TokenStream, resolve: &F) -> Result<Expr, SchemaError>
where
    F: Fn(&str) -> Option<Vec<usize>>,
{
    let mut expr = parse_expr_atom(stream, resolve)?;
    loop {
        if stream.eat("+") {
            expr = Expr::Plus(Box::new(expr));
        } else if stream.eat("*") {
            expr = Expr::Star(Box::new(expr));
        } else if stream.eat("?") {
            expr = Expr::Opt(Box::new(expr));
        } else if stream.eat("{") {
            expr = parse_expr_range(stream, expr)?;
        } else {
            break;
        }
    }
    Ok(expr)
}

fn parse_num(stream: &mut TokenStream) -> Result<usize, SchemaError> {
    match stream.peek() {
        Some(token) => match token.parse::<usize>() {
            Ok(num) => {
                stream.pos += 1;
                Ok(num)
            }
            Err(_) => Err(stream.error("expected number")),
        },
        None => Err(stream.error("expected number")),
    }
}

fn parse_expr_range(stream: &mut TokenStream, inner: Expr) -> Result<Expr, SchemaError> {
    let min = parse_num(stream)?;
    let max = if stream.eat(",") {
        if stream.peek() == Some("}") {
            None
        } else {
            Some(parse_num(stream)?)
        }
    } else {
        Some(min)
    };
    if !stream.eat("}") {
        return Err(stream.error("unclosed braced count"));
    }
    Ok(Expr::Range {
        min,
        max,
        inner: Box::new(inner),
    })
}

fn parse_expr_atom<F>(stream: &mut TokenStream, resolve: &F) -> Result<Expr, SchemaError>
where
    F: Fn(&str) -> Option<Vec<usize>>,
{
    if stream.eat("(") {
        let expr = parse_expr(stream, resolve)?;
        if !stream.eat(")") {
            return Err(stream.error("missing closing paren"));
        }
        return Ok(expr);
    }
    match stream.peek() {
        Some(token) if token.chars().all(|c| c.is_alphanumeric() || c == '_') => {
            let types = resolve(token).ok_or_else(|| SchemaError::UnknownContentName {
                name: token.to_owned(),
            })?;
            stream.pos += 1;
            Ok(Expr::Name(types))
        }
        Some(token) => {
            let message = format!("unexpected token '{}'", token);
            Err(SchemaError::ContentExpression {
                expr: stream.expr.to_owned(),
                message,
            })
        }
        None => Err(stream.error("unexpected end of expression")),
    }
}

// NFA construction, Thompson style. Edges with a `None` term are null edges;
// a dangling edge (`to == None`) is patched by `connect`.

struct Nfa {
    states: Vec<Vec<NfaEdge>>,
}

#[derive(Copy, Clone)]
struct NfaEdge {
    term: Option<usize>,
    to: Option<usize>,
}

type Dangling = Vec<(usize, usize)>;

fn build_nfa(expr: &Expr) -> Nfa {
    let mut nfa = Nfa { states: vec![vec![]] };
    let dangling = compile_nfa(&mut nfa, expr, 0);
    let end = new_state(&mut nfa);
    connect(&mut nfa, dangling, end);
    nfa
}

fn new_state(nfa: &mut Nfa) -> usize {
    nfa.states.push(vec![]);
    nfa.states.len() - 1
}

fn add_edge(nfa: &mut Nfa, from: usize, term: Option<usize>, to: Option<usize>) -> (usize, usize) {
    nfa.states[from].push(NfaEdge { term, to });
    (from, nfa.states[from].len() - 1)
}

fn connect(nfa: &mut Nfa, dangling: Dangling, to: usize) {
    for (state, edge) in dangling {
        nfa.states[state][edge].to = Some(to);
    }
}

fn compile_nfa(nfa: &mut Nfa, expr: &Expr, from: usize) -> Dangling {
    match expr {
        Expr::Choice(exprs) => exprs
            .iter()
            .flat_map(|e| compile_nfa(nfa, e, from))
            .collect(),
        Expr::Seq(exprs) => {
            let mut cur = from;
            for (i, e) in exprs.iter().enumerate() {
                let next = compile_nfa(nfa, e, cur);
                if i == exprs.len() - 1 {
                    return next;
                }
                cur = new_state(nfa);
                connect(nfa, next, cur);
            }
            unreachable!("sequences are never empty")
        }
        Expr::Star(inner) => {
            let looped = new_state(nfa);
            add_edge(nfa, from, None, Some(looped));
            let body = compile_nfa(nfa, inner, looped);
            connect(nfa, body, looped);
            vec![add_edge(nfa, looped, None, None)]
        }
        Expr::Plus(inner) => {
            let looped = new_state(nfa);
            let first = compile_nfa(nfa, inner, from);
            connect(nfa, first, looped);
            let again = compile_nfa(nfa, inner, looped);
            connect(nfa, again, looped);
            vec![add_edge(nfa, looped, None, None)]
        }
        Expr::Opt(inner) => {
            let mut edges = vec![add_edge(nfa, from, None, None)];
            edges.extend(compile_nfa(nfa, inner, from));
            edges
        }
        Expr::Range { min, max, inner } => {
            let mut cur = from;
            for _ in 0..*min {
                let next = new_state(nfa);
                let body = compile_nfa(nfa, inner, cur);
                connect(nfa, body, next);
                cur = next;
            }
            match max {
                None => {
                    let body = compile_nfa(nfa, inner, cur);
                    connect(nfa, body, cur);
                }
                Some(max) => {
                    for _ in *min..*max {
                        let next = new_state(nfa);
                        add_edge(nfa, cur, None, Some(next));
                        let body = compile_nfa(nfa, inner, cur);
                        connect(nfa, body, next);
                        cur = next;
                    }
                }
            }
            vec![add_edge(nfa, cur, None, None)]
        }
        Expr::Name(types) => types
            .iter()
            .map(|t| add_edge(nfa, from, Some(*t), None))
            .collect(),
    }
}

/// Subset-construct the deterministic automaton. States are canonicalised as
/// sorted sets of NFA nodes so identical subsets intern to one DFA state.
fn build_dfa(nfa: &Nfa) -> Dfa {
    let accept = nfa.states.len() - 1;
    let mut dfa = Dfa { states: vec![] };
    let mut labeled: HashMap<Vec<usize>, usize> = HashMap::new();
    let start = null_from(nfa, 0);
    explore(nfa, accept, start, &mut dfa, &mut labeled);
    dfa
}

fn explore(
    nfa: &Nfa,
    accept: usize,
    states: Vec<usize>,
    dfa: &mut Dfa,
    labeled: &mut HashMap<Vec<usize>, usize>,
) -> usize {
    let mut out: Vec<(usize, Vec<usize>)> = vec![];
    for &node in &states {
        for edge in &nfa.states[node] {
            let Some(term) = edge.term else { continue };
            let to = edge.to.expect("all edges connected");
            let entry = match out.iter().position(|(t, _)| *t == term) {
                Some(i) => i,
                None => {
                    out.push((term, vec![]));
                    out.len() - 1
                }
            };
            let set = &mut out[entry].1;
            for reached in null_from(nfa, to) {
                if !set.contains(&reached) {
                    set.push(reached);
                }
            }
        }
    }

    let id = dfa.states.len();
    dfa.states.push(DfaState {
        accept: states.contains(&accept),
        edges: vec![],
    });
    labeled.insert(states, id);

    for (term, mut set) in out {
        set.sort_unstable();
        let next = match labeled.get(&set) {
            Some(&next) => next,
            None => explore(nfa, accept, set, dfa, labeled),
        };
        dfa.states[id].edges.push((term, next));
    }
    id
}

/// The set of NFA nodes reachable from `node` over null edges, with
/// pass-through nodes (a single outgoing null edge) compressed away.
fn null_from(nfa: &Nfa, node: usize) -> Vec<usize> {
    let mut result = vec![];
    scan(nfa, node, &mut result);
    result.sort_unstable();
    result
}

fn scan(nfa: &Nfa, node: usize, result: &mut Vec<usize>) {
    let edges = &nfa.states[node];
    if edges.len() == 1 && edges[0].term.is_none() {
        return scan(nfa, edges[0].to.expect("all edges connected"), result);
    }
    result.push(node);
    for edge in edges {
        if edge.term.is_none() {
            let to = edge.to.expect("all edges connected");
            if !result.contains(&to) {
                scan(nfa, to, result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::basic::helper::*;
    use crate::fragment::Fragment;

    #[test]
    fn matches_simple_sequences() {
        let d = schema().node_type("doc").unwrap();
        let para = schema().node_type("paragraph").unwrap();
        let m = d.content_match();
        assert!(!m.valid_end());
        let m = m.match_type(&para).unwrap();
        assert!(m.valid_end());
        // block+ keeps accepting blocks
        assert!(m.match_type(&para).is_some());
        // and rejects inline types
        let txt = schema().node_type("text").unwrap();
        assert!(m.match_type(&txt).is_none());
    }

    #[test]
    fn match_fragment_steps_over_children() {
        let d = doc((p("a"), blockquote(p("b"))));
        let m = schema()
            .node_type("doc")
            .unwrap()
            .content_match()
            .match_fragment(d.content())
            .unwrap();
        assert!(m.valid_end());
    }

    #[test]
    fn empty_expression_is_a_leaf() {
        let txt = schema().node_type("text").unwrap();
        assert!(txt.content_match().valid_end());
        assert_eq!(txt.content_match().edge_count(), 0);
        assert!(txt.is_leaf());
    }

    #[test]
    fn compatible_states_share_a_next_type() {
        let para = schema().node_type("paragraph").unwrap();
        let heading = schema().node_type("heading").unwrap();
        let d = schema().node_type("doc").unwrap();
        assert!(para.content_match().compatible(&heading.content_match()));
        assert!(!para.content_match().compatible(&d.content_match()));
    }

    #[test]
    fn fill_before_produces_missing_nodes() {
        // Deleting everything from a doc: fill must produce nothing when the
        // rest already matches, and a paragraph when content is required.
        let d = schema().node_type("doc").unwrap();
        let filled = d
            .content_match()
            .fill_before(Fragment::empty(), true, 0)
            .unwrap();
        assert_eq!(filled.child_count(), 1);
        assert_eq!(filled.child(0).r#type().name(), "paragraph");

        let already = Fragment::from(p("hi"));
        let filled = d.content_match().fill_before(&already, true, 0).unwrap();
        assert_eq!(filled.child_count(), 0);
    }

    #[test]
    fn fill_before_gives_up_when_impossible() {
        // text can never appear directly in a doc
        let d = schema().node_type("doc").unwrap();
        let frag = Fragment::from(text("loose"));
        assert!(d.content_match().fill_before(&frag, true, 0).is_none());
    }

    #[test]
    fn inline_content_reflects_edges() {
        let para = schema().node_type("paragraph").unwrap();
        let d = schema().node_type("doc").unwrap();
        assert!(para.content_match().inline_content());
        assert!(!d.content_match().inline_content());
    }
}
