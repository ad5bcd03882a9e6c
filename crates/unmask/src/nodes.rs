//! The ESTree-shaped tree the deobfuscation passes operate on.
//!
//! Obfuscated programs arrive through an ecosystem parser and leave through
//! the printer; in between, every pass works on this crate-owned model. A
//! node is a discriminant [`NodeKind`] plus an insertion-ordered map of named
//! attributes, each attribute holding a single child, an ordered child list,
//! or a scalar payload (`name`, `operator`, `value`, …). Traversal follows
//! attribute insertion order, which the lowering keeps aligned with document
//! order.
//!
//! Nodes are shared as [`NodeRef`] (`Rc<RefCell<Node>>`). The parent
//! back-edge is a `Weak` reference held outside the attribute map: it is
//! advisory only, never used for ownership, and is refreshed by the walker on
//! descent because rewrites invalidate it.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;

/// Shared handle to a tree node.
pub type NodeRef = Rc<RefCell<Node>>;

/// Discriminant tag of a tree node.
///
/// The set covers the ES subset the lowering models; anything else is
/// captured as a [`NodeKind::Raw`] leaf carrying verbatim source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunctionExpression,
    VariableDeclaration,
    VariableDeclarator,
    ExpressionStatement,
    BlockStatement,
    IfStatement,
    ReturnStatement,
    ForStatement,
    ForInStatement,
    WhileStatement,
    DoWhileStatement,
    SwitchStatement,
    SwitchCase,
    BreakStatement,
    ContinueStatement,
    LabeledStatement,
    ThrowStatement,
    TryStatement,
    CatchClause,
    EmptyStatement,
    CallExpression,
    NewExpression,
    MemberExpression,
    Identifier,
    Literal,
    BinaryExpression,
    LogicalExpression,
    UnaryExpression,
    UpdateExpression,
    AssignmentExpression,
    ConditionalExpression,
    SequenceExpression,
    ArrayExpression,
    ObjectExpression,
    Property,
    ThisExpression,
    /// Opaque source text outside the modeled subset. A leaf in both
    /// statement and expression position; printed verbatim.
    Raw,
}

/// Scalar payload of a non-node attribute, and the value space of `Literal`
/// nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl Scalar {
    /// JavaScript truthiness of the value.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Num(n) => *n != 0.0 && !n.is_nan(),
            Self::Bool(b) => *b,
            Self::Null => false,
        }
    }

    /// The `typeof` string for the value (`null` types as `"object"`).
    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Num(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Null => "object",
        }
    }

    /// Returns the value as a non-negative integer index, if it is a number
    /// with integral value representable as `usize`.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Num(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= 2f64.powi(53) => {
                Some(*n as usize)
            }
            _ => None,
        }
    }
}

/// One named attribute of a node.
#[derive(Debug, Clone)]
pub enum Attr {
    /// A single child node.
    Child(NodeRef),
    /// An ordered list of child nodes.
    Children(Vec<NodeRef>),
    /// A scalar payload; never descended by the walker.
    Scalar(Scalar),
}

/// A tree node: tag, named attributes, advisory parent back-edge.
#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    attrs: IndexMap<&'static str, Attr>,
    parent: Weak<RefCell<Node>>,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: IndexMap::new(),
            parent: Weak::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }

    /// Builder: attach a single child attribute.
    #[must_use]
    pub fn with_child(mut self, name: &'static str, child: NodeRef) -> Self {
        self.attrs.insert(name, Attr::Child(child));
        self
    }

    /// Builder: attach a child-list attribute.
    #[must_use]
    pub fn with_children(mut self, name: &'static str, children: Vec<NodeRef>) -> Self {
        self.attrs.insert(name, Attr::Children(children));
        self
    }

    /// Builder: attach a scalar attribute.
    #[must_use]
    pub fn with_scalar(mut self, name: &'static str, value: Scalar) -> Self {
        self.attrs.insert(name, Attr::Scalar(value));
        self
    }

    /// Wraps the node in a shared handle.
    #[must_use]
    pub fn into_ref(self) -> NodeRef {
        Rc::new(RefCell::new(self))
    }

    /// Attribute names in insertion (document) order.
    #[must_use]
    pub fn attr_names(&self) -> Vec<&'static str> {
        self.attrs.keys().copied().collect()
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.get(name)
    }

    /// The single child stored under `name`, if any.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<NodeRef> {
        match self.attrs.get(name) {
            Some(Attr::Child(node)) => Some(Rc::clone(node)),
            _ => None,
        }
    }

    /// A clone of the child list stored under `name`, if any.
    #[must_use]
    pub fn children(&self, name: &str) -> Option<Vec<NodeRef>> {
        match self.attrs.get(name) {
            Some(Attr::Children(list)) => Some(list.clone()),
            _ => None,
        }
    }

    /// The scalar stored under `name`, if any.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<Scalar> {
        match self.attrs.get(name) {
            Some(Attr::Scalar(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// The string scalar stored under `name`, if any.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<String> {
        match self.scalar(name) {
            Some(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// The boolean scalar stored under `name`; absent reads as `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.scalar(name), Some(Scalar::Bool(true)))
    }

    pub fn set_child(&mut self, name: &'static str, child: NodeRef) {
        self.attrs.insert(name, Attr::Child(child));
    }

    pub fn set_children(&mut self, name: &'static str, children: Vec<NodeRef>) {
        self.attrs.insert(name, Attr::Children(children));
    }

    pub fn set_scalar(&mut self, name: &'static str, value: Scalar) {
        self.attrs.insert(name, Attr::Scalar(value));
    }

    /// Drops the attribute, shifting nothing else; used to clear optional
    /// slots.
    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.shift_remove(name);
    }

    /// All child nodes in document order, flattening lists.
    #[must_use]
    pub fn child_nodes(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        for attr in self.attrs.values() {
            match attr {
                Attr::Child(node) => out.push(Rc::clone(node)),
                Attr::Children(list) => out.extend(list.iter().map(Rc::clone)),
                Attr::Scalar(_) => {}
            }
        }
        out
    }

    /// Upgrades the advisory parent edge. Only meaningful for edges the
    /// walker refreshed on the current descent path.
    #[must_use]
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade()
    }

    pub(crate) fn set_parent(&mut self, parent: Weak<RefCell<Node>>) {
        self.parent = parent;
    }

    pub(crate) fn parent_weak(&self) -> Weak<RefCell<Node>> {
        self.parent.clone()
    }
}

/// The kind of the node behind a handle.
#[must_use]
pub fn kind_of(node: &NodeRef) -> NodeKind {
    node.borrow().kind()
}

/// The literal value of the node, if it is a `Literal`.
#[must_use]
pub fn literal_value(node: &NodeRef) -> Option<Scalar> {
    let node = node.borrow();
    if node.is(NodeKind::Literal) {
        node.scalar("value")
    } else {
        None
    }
}

/// Builds an `Identifier` node.
#[must_use]
pub fn identifier(name: &str) -> NodeRef {
    Node::new(NodeKind::Identifier)
        .with_scalar("name", Scalar::Str(name.to_owned()))
        .into_ref()
}

/// Builds a `Literal` node carrying `value` and no raw form; the printer
/// synthesizes one.
#[must_use]
pub fn literal(value: Scalar) -> NodeRef {
    Node::new(NodeKind::Literal)
        .with_scalar("value", value)
        .into_ref()
}

/// Builds the node for a numeric result.
///
/// Negative values come out as `UnaryExpression('-', Literal(|n|))` so the
/// printer never has to emit a numeric literal token starting with `-`.
#[must_use]
pub fn number(n: f64) -> NodeRef {
    if n.is_sign_negative() && !n.is_nan() && n != 0.0 {
        Node::new(NodeKind::UnaryExpression)
            .with_scalar("operator", Scalar::Str("-".to_owned()))
            .with_child("argument", literal(Scalar::Num(-n)))
            .into_ref()
    } else {
        literal(Scalar::Num(n))
    }
}

/// Builds the node for a folded scalar result (numbers go through
/// [`number`]).
#[must_use]
pub fn folded(value: Scalar) -> NodeRef {
    match value {
        Scalar::Num(n) => number(n),
        other => literal(other),
    }
}

/// Builds a `Raw` leaf holding verbatim source text.
#[must_use]
pub fn raw(source: &str) -> NodeRef {
    Node::new(NodeKind::Raw)
        .with_scalar("source", Scalar::Str(source.to_owned()))
        .into_ref()
}

/// Replaces the node behind `slot` in place, preserving the parent edge.
///
/// Every handle to the slot observes the replacement; this is how passes
/// substitute a node without touching the parent's attribute map.
pub fn replace(slot: &NodeRef, with: Node) {
    let parent = slot.borrow().parent_weak();
    let mut node = with;
    node.set_parent(parent);
    *slot.borrow_mut() = node;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_truthiness_follows_javascript() {
        assert!(Scalar::Str("x".to_owned()).truthy());
        assert!(!Scalar::Str(String::new()).truthy());
        assert!(!Scalar::Num(0.0).truthy());
        assert!(!Scalar::Num(f64::NAN).truthy());
        assert!(Scalar::Num(-1.0).truthy());
        assert!(!Scalar::Null.truthy());
    }

    #[test]
    fn negative_numbers_synthesize_as_unary_minus() {
        let node = number(-3.0);
        assert_eq!(kind_of(&node), NodeKind::UnaryExpression);
        let arg = node.borrow().child("argument").unwrap();
        assert_eq!(literal_value(&arg), Some(Scalar::Num(3.0)));
    }

    #[test]
    fn replace_preserves_identity_of_the_slot() {
        let slot = identifier("before");
        let alias = Rc::clone(&slot);
        replace(&slot, Node::new(NodeKind::ThisExpression));
        assert_eq!(kind_of(&alias), NodeKind::ThisExpression);
    }
}
