use crate::content::{self, ContentMatch, Dfa};
use crate::fragment::Fragment;
use crate::mark::Mark;
use crate::node::{Node, Text};
use displaydoc::Display;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// An attribute map, from attribute name to a JSON value.
pub type Attrs = serde_json::Map<String, Value>;

/// Error while compiling or using a schema
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SchemaError {
    /// Duplicate use of name "{name}" in schema
    DuplicateName {
        /// The name used twice
        name: String,
    },
    /// Every schema needs a "text" node type
    MissingTextType,
    /// The text node type should not have attributes
    TextTypeAttrs,
    /// Unknown top node type "{name}"
    UnknownTopNode {
        /// The name that did not resolve
        name: String,
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
    /// No node type or group "{name}" found
    UnknownContentName {
        /// The name that did not resolve
        name: String,
    },
    /// Invalid content expression "{expr}": {message}
    ContentExpression {
        /// The expression being parsed
        expr: String,
        /// What went wrong
        message: String,
    },
    /// No value supplied for attribute "{name}"
    MissingAttr {
        /// The attribute without a value
        name: String,
    },
    /// The text node must be created with `Schema::text`
    CreateText,
    /// Invalid content for node type {name}
    InvalidContent {
        /// Name of the node type
        name: String,
    },
}

/// Used to define attributes on nodes or marks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSpec {
    /// The default value for this attribute, to use when no explicit value is
    /// provided. Attributes that have no default must be provided whenever a
    /// node or mark of a type that has them is created.
    pub default: Option<Value>,
}

impl AttributeSpec {
    fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A description of a node type, used when defining a schema.
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    /// The content expression for this node, as described in the module
    /// documentation of [`crate::content`]. When not given, the node does not
    /// allow any content.
    pub content: Option<String>,
    /// The marks that are allowed inside of this node. May be a
    /// space-separated string referring to mark names or groups, `"_"` to
    /// explicitly allow all marks, or `""` to disallow marks. When not given,
    /// nodes with inline content default to allowing all marks, other nodes
    /// default to not allowing marks.
    pub marks: Option<String>,
    /// The group or space-separated groups to which this node belongs, which
    /// can be referred to in the content expressions for the schema.
    pub group: Option<String>,
    /// Should be set to true for inline nodes.
    pub inline: bool,
    /// Can be set to true to indicate that, though this isn't a leaf node, it
    /// doesn't have directly editable content.
    pub atom: bool,
    /// When enabled, the sides of nodes of this type count as boundaries that
    /// content like the maximally open sides of slices must not cross.
    pub isolating: bool,
    /// The attributes that nodes of this type get, in declaration order.
    pub attrs: Vec<(String, AttributeSpec)>,
}

/// A description of a mark type, used when defining a schema.
#[derive(Debug, Clone, Default)]
pub struct MarkSpec {
    /// The attributes that marks of this type get, in declaration order.
    pub attrs: Vec<(String, AttributeSpec)>,
    /// Whether this mark should be active when the cursor is positioned at
    /// its end (or at its start when that is also the start of the parent
    /// node). Defaults to true.
    pub inclusive: Option<bool>,
    /// Determines which other marks this mark can coexist with. A
    /// space-separated string naming other marks or groups of marks. When a
    /// mark is added to a set, all marks that it excludes are removed in the
    /// process. If the set contains any mark that excludes the new mark but
    /// is not, itself, excluded by the new mark, the mark can not be added to
    /// the set.
    ///
    /// When not given, marks exclude only marks of the same type. You can set
    /// it to an empty string to allow multiple marks of a given type to
    /// coexist (as long as they have different attributes), or to `"_"` to
    /// make it exclude every mark in the schema.
    pub excludes: Option<String>,
    /// The group or space-separated groups to which this mark belongs.
    pub group: Option<String>,
}

/// An object describing a schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaSpec {
    /// The node types in this schema, in order. The order determines which
    /// parse rules take precedence by default, and which nodes come first in
    /// a given group.
    pub nodes: Vec<(String, NodeSpec)>,
    /// The mark types that exist in this schema, in order. The order
    /// determines the [rank](MarkType::rank) of each mark, and thus the order
    /// in which marks are sorted within a mark set.
    pub marks: Vec<(String, MarkSpec)>,
    /// The name of the default top-level node for the schema. Defaults to
    /// `"doc"`.
    pub top_node: Option<String>,
}

pub(crate) struct NodeTypeData {
    name: String,
    groups: Vec<String>,
    attrs: Vec<(String, AttributeSpec)>,
    default_attrs: Option<Attrs>,
    content_dfa: usize,
    inline_content: bool,
    inline: bool,
    leaf: bool,
    atom: bool,
    isolating: bool,
    /// `None` means all marks are allowed.
    mark_set: Option<Vec<usize>>,
}

pub(crate) struct MarkTypeData {
    name: String,
    attrs: Vec<(String, AttributeSpec)>,
    default_attrs: Option<Attrs>,
    excluded: Vec<usize>,
    inclusive: bool,
}

pub(crate) struct SchemaData {
    pub(crate) nodes: Vec<NodeTypeData>,
    pub(crate) marks: Vec<MarkTypeData>,
    pub(crate) dfas: Vec<Dfa>,
    node_ids: HashMap<String, usize>,
    mark_ids: HashMap<String, usize>,
    top_node: usize,
}

/// A document schema. Holds node and mark type objects for the nodes and
/// marks that may occur in conforming documents, and provides functionality
/// for creating and deserializing such documents.
#[derive(Clone)]
pub struct Schema {
    data: Arc<SchemaData>,
}

impl Schema {
    /// Compile a schema from a spec. The spec's node and mark order is
    /// significant: it determines content-expression group membership order
    /// and mark ranks.
    pub fn new(spec: SchemaSpec) -> Result<Schema, SchemaError> {
        let mut node_ids = HashMap::new();
        let mut mark_ids = HashMap::new();
        for (i, (name, _)) in spec.nodes.iter().enumerate() {
            if node_ids.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateName { name: name.clone() });
            }
        }
        for (i, (name, _)) in spec.marks.iter().enumerate() {
            if node_ids.contains_key(name) || mark_ids.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateName { name: name.clone() });
            }
        }

        let text_id = *node_ids
            .get("text")
            .ok_or(SchemaError::MissingTextType)?;
        if !spec.nodes[text_id].1.attrs.is_empty() {
            return Err(SchemaError::TextTypeAttrs);
        }

        let groups: Vec<Vec<String>> = spec
            .nodes
            .iter()
            .map(|(_, s)| {
                s.group
                    .as_deref()
                    .map(|g| g.split_whitespace().map(str::to_owned).collect())
                    .unwrap_or_default()
            })
            .collect();
        let resolve_name = |name: &str| -> Option<Vec<usize>> {
            if let Some(&id) = node_ids.get(name) {
                return Some(vec![id]);
            }
            let members: Vec<usize> = groups
                .iter()
                .enumerate()
                .filter(|(_, gs)| gs.iter().any(|g| g == name))
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                None
            } else {
                Some(members)
            }
        };

        // Compile content expressions, interning by expression string so
        // identical expressions share one automaton.
        let mut dfas: Vec<Dfa> = Vec::new();
        let mut by_expr: HashMap<String, usize> = HashMap::new();
        let mut content_dfas = Vec::with_capacity(spec.nodes.len());
        for (_, node_spec) in &spec.nodes {
            let expr = node_spec.content.as_deref().unwrap_or("");
            let dfa_id = match by_expr.get(expr) {
                Some(&id) => id,
                None => {
                    let dfa = content::compile_expr(expr, &resolve_name)?;
                    dfas.push(dfa);
                    let id = dfas.len() - 1;
                    by_expr.insert(expr.to_owned(), id);
                    id
                }
            };
            content_dfas.push(dfa_id);
        }

        let inline_flags: Vec<bool> = spec
            .nodes
            .iter()
            .enumerate()
            .map(|(i, (_, s))| s.inline || i == text_id)
            .collect();

        let gather_marks = |names: &str| -> Result<Vec<usize>, SchemaError> {
            let mut found = Vec::new();
            for name in names.split_whitespace() {
                if let Some(&id) = mark_ids.get(name) {
                    if !found.contains(&id) {
                        found.push(id);
                    }
                    continue;
                }
                let mut any = false;
                for (i, (_, mark_spec)) in spec.marks.iter().enumerate() {
                    let in_group = mark_spec
                        .group
                        .as_deref()
                        .map(|g| g.split_whitespace().any(|x| x == name))
                        .unwrap_or(false);
                    if name == "_" || in_group {
                        any = true;
                        if !found.contains(&i) {
                            found.push(i);
                        }
                    }
                }
                if !any {
                    return Err(SchemaError::UnknownMarkType {
                        name: name.to_owned(),
                    });
                }
            }
            Ok(found)
        };

        let mut nodes = Vec::with_capacity(spec.nodes.len());
        for (i, (name, node_spec)) in spec.nodes.iter().enumerate() {
            let dfa = &dfas[content_dfas[i]];
            let first_state = &dfa.states[0];
            let inline_content = first_state
                .edges
                .first()
                .map(|(r#type, _)| inline_flags[*r#type])
                .unwrap_or(false);
            let leaf = first_state.edges.is_empty();
            let mark_set = match node_spec.marks.as_deref() {
                Some("_") => None,
                Some("") => Some(vec![]),
                Some(names) => Some(gather_marks(names)?),
                None => {
                    if inline_content {
                        None
                    } else {
                        Some(vec![])
                    }
                }
            };
            let default_attrs = default_attrs(&node_spec.attrs);
            nodes.push(NodeTypeData {
                name: name.clone(),
                groups: groups[i].clone(),
                attrs: node_spec.attrs.clone(),
                default_attrs,
                content_dfa: content_dfas[i],
                inline_content,
                inline: inline_flags[i],
                leaf,
                atom: node_spec.atom,
                isolating: node_spec.isolating,
                mark_set,
            });
        }

        let mut marks = Vec::with_capacity(spec.marks.len());
        for (i, (name, mark_spec)) in spec.marks.iter().enumerate() {
            let excluded = match mark_spec.excludes.as_deref() {
                None => vec![i],
                Some("") => vec![],
                Some(names) => gather_marks(names)?,
            };
            marks.push(MarkTypeData {
                name: name.clone(),
                attrs: mark_spec.attrs.clone(),
                default_attrs: default_attrs(&mark_spec.attrs),
                excluded,
                inclusive: mark_spec.inclusive.unwrap_or(true),
            });
        }

        let top_name = spec.top_node.as_deref().unwrap_or("doc");
        let top_node = *node_ids
            .get(top_name)
            .ok_or_else(|| SchemaError::UnknownTopNode {
                name: top_name.to_owned(),
            })?;

        tracing::debug!(
            nodes = nodes.len(),
            marks = marks.len(),
            automata = dfas.len(),
            top = top_name,
            "compiled schema"
        );

        Ok(Schema {
            data: Arc::new(SchemaData {
                nodes,
                marks,
                dfas,
                node_ids,
                mark_ids,
                top_node,
            }),
        })
    }

    pub(crate) fn data(&self) -> &SchemaData {
        &self.data
    }

    /// Get the node type with the given name, if it is part of this schema.
    pub fn node_type(&self, name: &str) -> Option<NodeType> {
        self.data
            .node_ids
            .get(name)
            .map(|&id| self.node_type_by_id(id))
    }

    /// Get the mark type with the given name, if it is part of this schema.
    pub fn mark_type(&self, name: &str) -> Option<MarkType> {
        self.data
            .mark_ids
            .get(name)
            .map(|&id| self.mark_type_by_id(id))
    }

    /// The type of the default top node for this schema.
    pub fn top_node_type(&self) -> NodeType {
        self.node_type_by_id(self.data.top_node)
    }

    /// The names of the node types in this schema, in declaration order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.data.nodes.iter().map(|n| n.name.as_str())
    }

    /// The names of the mark types in this schema, in declaration order.
    pub fn mark_names(&self) -> impl Iterator<Item = &str> {
        self.data.marks.iter().map(|m| m.name.as_str())
    }

    pub(crate) fn node_type_by_id(&self, id: usize) -> NodeType {
        NodeType {
            schema: self.clone(),
            id,
        }
    }

    pub(crate) fn mark_type_by_id(&self, id: usize) -> MarkType {
        MarkType {
            schema: self.clone(),
            id,
        }
    }

    /// Create a node in this schema. The type is looked up by name, and the
    /// content may be a fragment, a node, or a vector of nodes.
    pub fn node(
        &self,
        name: &str,
        attrs: Option<&Attrs>,
        content: impl Into<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Node, SchemaError> {
        let r#type = self
            .node_type(name)
            .ok_or_else(|| SchemaError::UnknownNodeType {
                name: name.to_owned(),
            })?;
        r#type.create(attrs, content, marks)
    }

    /// Create a text node in the schema. This method is the only way to
    /// create text nodes.
    ///
    /// Panics when given an empty string: empty text nodes are not allowed.
    pub fn text(&self, text: impl Into<String>, marks: Vec<Mark>) -> Node {
        let text: String = text.into();
        assert!(!text.is_empty(), "Empty text nodes are not allowed");
        let text_id = self.data.node_ids["text"];
        Node::new_text(
            self.node_type_by_id(text_id),
            Attrs::new(),
            Mark::set_from(&marks),
            Text::from(text),
        )
    }

    /// Create a mark with the given type name and attributes.
    pub fn mark(&self, name: &str, attrs: Option<Attrs>) -> Result<Mark, SchemaError> {
        let r#type = self
            .mark_type(name)
            .ok_or_else(|| SchemaError::UnknownMarkType {
                name: name.to_owned(),
            })?;
        r#type.create(attrs.as_ref())
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.node_names().collect::<Vec<_>>())
            .field("marks", &self.mark_names().collect::<Vec<_>>())
            .finish()
    }
}

fn default_attrs(attrs: &[(String, AttributeSpec)]) -> Option<Attrs> {
    let mut defaults = Attrs::new();
    for (name, spec) in attrs {
        defaults.insert(name.clone(), spec.default.clone()?);
    }
    Some(defaults)
}

fn compute_attrs(
    declared: &[(String, AttributeSpec)],
    given: Option<&Attrs>,
) -> Result<Attrs, SchemaError> {
    let mut built = Attrs::new();
    for (name, spec) in declared {
        let value = match given.and_then(|g| g.get(name)) {
            Some(value) => value.clone(),
            None => spec
                .default
                .clone()
                .ok_or_else(|| SchemaError::MissingAttr { name: name.clone() })?,
        };
        built.insert(name.clone(), value);
    }
    Ok(built)
}

/// Node types are objects allocated once per schema and used to tag node
/// instances. They contain information about the node type, such as its name
/// and what kind of node it represents.
#[derive(Clone)]
pub struct NodeType {
    schema: Schema,
    id: usize,
}

impl NodeType {
    fn data(&self) -> &NodeTypeData {
        &self.schema.data().nodes[self.id]
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// The name the node type has in this schema.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// The schema this type belongs to.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The groups this node type belongs to.
    pub fn groups(&self) -> &[String] {
        &self.data().groups
    }

    /// True if this is the text node type.
    pub fn is_text(&self) -> bool {
        self.name() == "text"
    }

    /// True if this is a block type.
    pub fn is_block(&self) -> bool {
        !self.data().inline
    }

    /// True if this is an inline type.
    pub fn is_inline(&self) -> bool {
        self.data().inline
    }

    /// True if this is a textblock type, a block that contains inline
    /// content.
    pub fn is_textblock(&self) -> bool {
        self.is_block() && self.inline_content()
    }

    /// True for node types that allow no content.
    pub fn is_leaf(&self) -> bool {
        self.data().leaf
    }

    /// True when this node is an atom, i.e. when it does not have directly
    /// editable content.
    pub fn is_atom(&self) -> bool {
        self.data().leaf || self.data().atom
    }

    /// True when the sides of this node count as boundaries that slices must
    /// not be opened across.
    pub fn is_isolating(&self) -> bool {
        self.data().isolating
    }

    /// True if this node type has inline content.
    pub fn inline_content(&self) -> bool {
        self.data().inline_content
    }

    /// The starting match of the node type's content expression.
    pub fn content_match(&self) -> ContentMatch {
        ContentMatch {
            schema: self.schema.clone(),
            dfa: self.data().content_dfa,
            state: 0,
        }
    }

    /// Tells you whether this node type has any required attributes.
    pub fn has_required_attrs(&self) -> bool {
        self.data().attrs.iter().any(|(_, spec)| spec.is_required())
    }

    /// The default attributes of this type, when every attribute has a
    /// default.
    pub fn default_attrs(&self) -> Option<&Attrs> {
        self.data().default_attrs.as_ref()
    }

    pub(crate) fn compute_attrs(&self, given: Option<&Attrs>) -> Result<Attrs, SchemaError> {
        if given.is_none() {
            if let Some(defaults) = &self.data().default_attrs {
                return Ok(defaults.clone());
            }
        }
        compute_attrs(&self.data().attrs, given)
    }

    pub(crate) fn attrs_valid(&self, attrs: &Attrs) -> bool {
        let declared = &self.data().attrs;
        attrs.iter().all(|(name, _)| {
            declared.iter().any(|(n, _)| n == name)
        }) && declared
            .iter()
            .all(|(name, spec)| !spec.is_required() || attrs.contains_key(name))
    }

    /// Create a node of this type.
    ///
    /// Attributes are filled in from the type's defaults; an attribute with
    /// no default must be supplied. The given marks are sorted into a proper
    /// mark set.
    pub fn create(
        &self,
        attrs: Option<&Attrs>,
        content: impl Into<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Node, SchemaError> {
        if self.is_text() {
            return Err(SchemaError::CreateText);
        }
        Ok(Node::new(
            self.clone(),
            self.compute_attrs(attrs)?,
            content.into(),
            Mark::set_from(&marks),
        ))
    }

    /// Like [`create`](NodeType::create), but checks that the given content
    /// is valid (and the marks allowed) for this type.
    pub fn create_checked(
        &self,
        attrs: Option<&Attrs>,
        content: impl Into<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Node, SchemaError> {
        let content = content.into();
        if !self.valid_content(&content) {
            return Err(SchemaError::InvalidContent {
                name: self.name().to_owned(),
            });
        }
        self.create(attrs, content, marks)
    }

    /// Like [`create`](NodeType::create), but see if it is necessary to add
    /// nodes to the start or end of the given fragment to make it fit the
    /// node. If no fitting wrapping can be found, return `None`.
    pub fn create_and_fill(
        &self,
        attrs: Option<&Attrs>,
        content: impl Into<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Option<Node>, SchemaError> {
        if self.is_text() {
            return Err(SchemaError::CreateText);
        }
        let attrs = self.compute_attrs(attrs)?;
        let mut content: Fragment = content.into();
        if content.size() > 0 {
            let Some(before) = self.content_match().fill_before(&content, false, 0) else {
                return Ok(None);
            };
            content = before.append(content);
        }
        let Some(matched) = self.content_match().match_fragment(&content) else {
            return Ok(None);
        };
        let Some(after) = matched.fill_before(Fragment::empty(), true, 0) else {
            return Ok(None);
        };
        Ok(Some(Node::new(
            self.clone(),
            attrs,
            content.append(after),
            Mark::set_from(&marks),
        )))
    }

    /// Returns true if the given fragment is valid content for this node
    /// type.
    pub fn valid_content(&self, content: &Fragment) -> bool {
        match self.content_match().match_fragment(content) {
            Some(result) if result.valid_end() => content
                .children()
                .iter()
                .all(|child| self.allows_marks(child.marks())),
            _ => false,
        }
    }

    /// Tells you whether this node type is compatible with the given node
    /// type, i.e. whether there is a node type that both could contain next.
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other || self.content_match().compatible(&other.content_match())
    }

    /// Check whether the given mark type is allowed in this node.
    pub fn allows_mark_type(&self, mark_type: &MarkType) -> bool {
        match &self.data().mark_set {
            None => true,
            Some(set) => set.contains(&mark_type.id),
        }
    }

    /// Test whether the given set of marks are allowed in this node.
    pub fn allows_marks(&self, marks: &[Mark]) -> bool {
        match &self.data().mark_set {
            None => true,
            Some(set) => marks.iter().all(|m| set.contains(&m.r#type().id)),
        }
    }

    /// Removes the marks that are not allowed in this node from the given
    /// set.
    pub fn allowed_marks(&self, marks: Vec<Mark>) -> Vec<Mark> {
        match &self.data().mark_set {
            None => marks,
            Some(set) => marks
                .into_iter()
                .filter(|m| set.contains(&m.r#type().id))
                .collect(),
        }
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.id == other.id
    }
}

impl Eq for NodeType {}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", self.name())
    }
}

/// Like nodes, marks (which are associated with nodes to signify things like
/// emphasis or being part of a link) are tagged with type objects, which are
/// instantiated once per schema.
#[derive(Clone)]
pub struct MarkType {
    schema: Schema,
    pub(crate) id: usize,
}

impl MarkType {
    fn data(&self) -> &MarkTypeData {
        &self.schema.data().marks[self.id]
    }

    /// The name of the mark type.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// The schema this type belongs to.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The position of this mark type in the schema's declared mark order.
    /// Mark sets are kept sorted by rank.
    pub fn rank(&self) -> usize {
        self.id
    }

    /// Whether this mark extends to content inserted at its end boundary.
    pub fn inclusive(&self) -> bool {
        self.data().inclusive
    }

    /// Queries whether a given mark type is excluded by this one.
    pub fn excludes(&self, other: &MarkType) -> bool {
        self.data().excluded.contains(&other.id)
    }

    /// Create a mark of this type with the given attributes.
    pub fn create(&self, attrs: Option<&Attrs>) -> Result<Mark, SchemaError> {
        if attrs.is_none() {
            if let Some(defaults) = &self.data().default_attrs {
                return Ok(Mark::new(self.clone(), defaults.clone()));
            }
        }
        let attrs = compute_attrs(&self.data().attrs, attrs)?;
        Ok(Mark::new(self.clone(), attrs))
    }

    /// When there is a mark of this type in the given set, return it.
    pub fn is_in_set<'a>(&self, set: &'a [Mark]) -> Option<&'a Mark> {
        set.iter().find(|m| m.r#type() == self)
    }

    /// Remove all marks of this type from the given set.
    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| m.r#type() != self).cloned().collect()
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.id == other.id
    }
}

impl Eq for MarkType {}

impl fmt::Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkType({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeSpec, MarkSpec, NodeSpec, Schema, SchemaError, SchemaSpec};
    use crate::basic::helper::*;
    use crate::fragment::Fragment;
    use serde_json::json;

    fn spec_with(nodes: Vec<(&str, NodeSpec)>) -> SchemaSpec {
        SchemaSpec {
            nodes: nodes
                .into_iter()
                .map(|(name, spec)| (name.to_owned(), spec))
                .collect(),
            marks: vec![],
            top_node: None,
        }
    }

    #[test]
    fn compiles_the_basic_schema() {
        let s = schema();
        assert_eq!(s.top_node_type().name(), "doc");
        assert!(s.node_type("paragraph").unwrap().is_textblock());
        assert!(s.node_type("text").unwrap().is_inline());
        assert!(s.node_type("horizontal_rule").unwrap().is_leaf());
        assert!(s.node_type("image").unwrap().is_inline());
    }

    #[test]
    fn requires_a_text_type() {
        let err = Schema::new(spec_with(vec![(
            "doc",
            NodeSpec {
                content: Some("block+".to_owned()),
                ..Default::default()
            },
        )]))
        .unwrap_err();
        assert_eq!(err, SchemaError::MissingTextType);
    }

    #[test]
    fn rejects_duplicate_names() {
        let spec = SchemaSpec {
            nodes: vec![
                ("doc".to_owned(), NodeSpec::default()),
                ("text".to_owned(), NodeSpec::default()),
            ],
            marks: vec![("text".to_owned(), MarkSpec::default())],
            top_node: None,
        };
        assert_eq!(
            Schema::new(spec).unwrap_err(),
            SchemaError::DuplicateName {
                name: "text".to_owned()
            }
        );
    }

    #[test]
    fn rejects_attrs_on_text() {
        let spec = spec_with(vec![
            ("doc", NodeSpec::default()),
            (
                "text",
                NodeSpec {
                    attrs: vec![("weird".to_owned(), AttributeSpec::default())],
                    ..Default::default()
                },
            ),
        ]);
        assert_eq!(Schema::new(spec).unwrap_err(), SchemaError::TextTypeAttrs);
    }

    #[test]
    fn rejects_unknown_content_names() {
        let spec = spec_with(vec![
            (
                "doc",
                NodeSpec {
                    content: Some("mystery+".to_owned()),
                    ..Default::default()
                },
            ),
            ("text", NodeSpec::default()),
        ]);
        assert_eq!(
            Schema::new(spec).unwrap_err(),
            SchemaError::UnknownContentName {
                name: "mystery".to_owned()
            }
        );
    }

    #[test]
    fn node_factory_fills_default_attrs() {
        let node = schema()
            .node("heading", None, p("x").content().clone(), vec![])
            .unwrap();
        assert_eq!(node.attrs().get("level"), Some(&json!(1)));
    }

    #[test]
    fn node_factory_requires_missing_attrs() {
        let err = schema()
            .node("image", None, Fragment::new(), vec![])
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingAttr {
                name: "src".to_owned()
            }
        );
    }

    #[test]
    fn create_checked_validates_content() {
        let para = schema().node_type("paragraph").unwrap();
        assert!(para
            .create_checked(None, text("hi"), vec![])
            .is_ok());
        let err = para.create_checked(None, p("nested"), vec![]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidContent {
                name: "paragraph".to_owned()
            }
        );
    }

    #[test]
    fn create_and_fill_completes_content() {
        let d = schema().node_type("doc").unwrap();
        let filled = d
            .create_and_fill(None, Fragment::new(), vec![])
            .unwrap()
            .unwrap();
        assert_eq!(filled.child_count(), 1);
        assert_eq!(filled.child(0).r#type().name(), "paragraph");
        assert!(filled.check().is_ok());
    }

    #[test]
    fn code_block_allows_no_marks() {
        let code = schema().node_type("code_block").unwrap();
        let em_mark = schema().mark("em", None).unwrap();
        assert!(!code.allows_mark_type(em_mark.r#type()));
        assert!(code.allowed_marks(vec![em_mark]).is_empty());
        let para = schema().node_type("paragraph").unwrap();
        assert!(para.allows_mark_type(schema().mark("em", None).unwrap().r#type()));
    }

    #[test]
    fn mark_exclusion_defaults_to_self() {
        let em = schema().mark_type("em").unwrap();
        let strong = schema().mark_type("strong").unwrap();
        assert!(em.excludes(&em));
        assert!(!em.excludes(&strong));
    }

    #[test]
    fn top_node_must_exist() {
        let spec = SchemaSpec {
            nodes: vec![("text".to_owned(), NodeSpec::default())],
            marks: vec![],
            top_node: Some("document".to_owned()),
        };
        assert_eq!(
            Schema::new(spec).unwrap_err(),
            SchemaError::UnknownTopNode {
                name: "document".to_owned()
            }
        );
    }
}
