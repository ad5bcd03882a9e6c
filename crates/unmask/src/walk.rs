//! Traversal framework: pure visitation and rewriting share one recursion.
//!
//! Both drivers refresh the parent back-edges of a node's immediate children
//! before dispatching to the pass, so a hook can always trust the chain of
//! edges along its own descent path. Scalar attributes are never descended;
//! the tag and the parent edge live outside the attribute map, so the
//! equivalent of skipping `type` / `loc` / `range` / `parent` falls out of
//! the model.
//!
//! Visit mode is pre-order: the pass hook runs first and descends itself
//! (the default descends into everything), which lets a census-style pass
//! skip declaration slots. Rewrite mode is post-order: children are rewritten
//! first, then the hook sees the node and answers with an [`Edit`].

use std::rc::Rc;

use crate::nodes::{NodeKind, NodeRef};

/// Outcome of a rewrite hook, mirroring the three shapes a handler can
/// produce: a node, nothing, or a list to splice.
#[derive(Debug)]
pub enum Edit {
    /// Keep this node (possibly a different one than was passed in).
    Node(NodeRef),
    /// Delete this node from its parent.
    Remove,
    /// Splice these nodes into the parent list in place of the original.
    /// In a scalar slot a one-element list unwraps; any other length leaves
    /// the original in place.
    Many(Vec<NodeRef>),
}

/// A pure pass over the tree. The default hook descends into all children.
pub trait Visitor {
    fn visit(&mut self, node: &NodeRef) {
        visit_children(self, node);
    }
}

/// A rewriting pass over the tree. The hook runs post-order, after the
/// node's children have been rewritten.
pub trait Rewriter {
    fn rewrite(&mut self, node: NodeRef) -> Edit {
        Edit::Node(node)
    }
}

/// Drives a [`Visitor`] over `node`: refreshes child parent edges, then
/// dispatches.
pub fn visit<V: Visitor + ?Sized>(visitor: &mut V, node: &NodeRef) {
    refresh_parents(node);
    visitor.visit(node);
}

/// Descends into every child of `node` in document order. The default
/// [`Visitor::visit`] calls this; handlers call it to resume the generic
/// walk, or call [`visit`] on selected children instead.
pub fn visit_children<V: Visitor + ?Sized>(visitor: &mut V, node: &NodeRef) {
    for child in node.borrow().child_nodes() {
        visit(visitor, &child);
    }
}

/// Drives a [`Rewriter`] over `node` and returns the edit for the node
/// itself. Children are rewritten first; a deletion in a required scalar
/// slot deletes the containing node, bubbling up to the nearest list.
pub fn rewrite<R: Rewriter + ?Sized>(rewriter: &mut R, node: &NodeRef) -> Edit {
    refresh_parents(node);
    if !rewrite_children(rewriter, node) {
        return Edit::Remove;
    }
    rewriter.rewrite(Rc::clone(node))
}

/// Rewrites a whole tree from the root, which itself is never replaced.
pub fn rewrite_tree<R: Rewriter + ?Sized>(rewriter: &mut R, root: &NodeRef) {
    if !matches!(rewrite(rewriter, root), Edit::Node(_)) {
        log::warn!("rewrite pass tried to replace the root node; ignored");
    }
}

/// Rewrites the children of `node` in place. Returns `false` when a
/// required scalar slot was emptied, which deletes the containing node.
fn rewrite_children<R: Rewriter + ?Sized>(rewriter: &mut R, node: &NodeRef) -> bool {
    let (kind, names) = {
        let node = node.borrow();
        (node.kind(), node.attr_names())
    };
    for name in names {
        let single = node.borrow().child(name);
        if let Some(child) = single {
            match rewrite(rewriter, &child) {
                Edit::Node(new) => {
                    if !Rc::ptr_eq(&new, &child) {
                        node.borrow_mut().set_child(name, new);
                    }
                }
                Edit::Many(mut list) => {
                    if list.len() == 1 {
                        if let Some(new) = list.pop() {
                            node.borrow_mut().set_child(name, new);
                        }
                    }
                    // a longer splice cannot land in a scalar slot; the
                    // original stays
                }
                Edit::Remove => {
                    if is_optional_slot(kind, name) {
                        node.borrow_mut().remove_attr(name);
                    } else {
                        return false;
                    }
                }
            }
            continue;
        }
        let list = node.borrow().children(name);
        if let Some(list) = list {
            let mut out = Vec::with_capacity(list.len());
            for child in &list {
                match rewrite(rewriter, child) {
                    Edit::Node(new) => out.push(new),
                    Edit::Many(new) => out.extend(new),
                    Edit::Remove => {}
                }
            }
            node.borrow_mut().set_children(name, out);
        }
    }
    true
}

/// Points every immediate child's parent edge back at `node`.
fn refresh_parents(node: &NodeRef) {
    for child in node.borrow().child_nodes() {
        child.borrow_mut().set_parent(Rc::downgrade(node));
    }
}

/// Scalar child slots that may simply be cleared when their occupant is
/// deleted; a deletion anywhere else removes the containing node.
fn is_optional_slot(kind: NodeKind, name: &str) -> bool {
    matches!(
        (kind, name),
        (NodeKind::VariableDeclarator, "init")
            | (NodeKind::IfStatement, "alternate")
            | (NodeKind::ReturnStatement, "argument")
            | (NodeKind::ForStatement, "init" | "test" | "update")
            | (NodeKind::TryStatement, "handler" | "finalizer")
            | (NodeKind::CatchClause, "param")
            | (NodeKind::SwitchCase, "test")
            | (NodeKind::FunctionExpression, "id")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Node, NodeKind, Scalar, identifier, kind_of, literal};

    fn block(stmts: Vec<NodeRef>) -> NodeRef {
        Node::new(NodeKind::BlockStatement)
            .with_children("body", stmts)
            .into_ref()
    }

    fn expr_stmt(expr: NodeRef) -> NodeRef {
        Node::new(NodeKind::ExpressionStatement)
            .with_child("expression", expr)
            .into_ref()
    }

    struct DropIdentifiers;

    impl Rewriter for DropIdentifiers {
        fn rewrite(&mut self, node: NodeRef) -> Edit {
            if kind_of(&node) == NodeKind::Identifier {
                Edit::Remove
            } else {
                Edit::Node(node)
            }
        }
    }

    struct DoubleStatements;

    impl Rewriter for DoubleStatements {
        fn rewrite(&mut self, node: NodeRef) -> Edit {
            if kind_of(&node) == NodeKind::EmptyStatement {
                Edit::Many(vec![
                    Node::new(NodeKind::EmptyStatement).into_ref(),
                    Node::new(NodeKind::EmptyStatement).into_ref(),
                ])
            } else {
                Edit::Node(node)
            }
        }
    }

    #[test]
    fn removing_a_required_slot_deletes_the_containing_statement() {
        let stmt = expr_stmt(identifier("gone"));
        let root = block(vec![stmt, expr_stmt(literal(Scalar::Num(1.0)))]);
        rewrite_tree(&mut DropIdentifiers, &root);
        let body = root.borrow().children("body").unwrap();
        assert_eq!(body.len(), 1, "statement with deleted expression must go");
    }

    #[test]
    fn removing_an_optional_slot_clears_it_in_place() {
        let declarator = Node::new(NodeKind::VariableDeclarator)
            .with_child("id", identifier("u"))
            .with_child("init", identifier("gone"))
            .into_ref();
        struct DropInitOnly;
        impl Rewriter for DropInitOnly {
            fn rewrite(&mut self, node: NodeRef) -> Edit {
                let is_gone = node.borrow().string("name").as_deref() == Some("gone");
                if is_gone { Edit::Remove } else { Edit::Node(node) }
            }
        }
        let root = block(vec![declarator]);
        rewrite_tree(&mut DropInitOnly, &root);
        let body = root.borrow().children("body").unwrap();
        assert!(body[0].borrow().child("init").is_none());
        assert!(body[0].borrow().child("id").is_some());
    }

    #[test]
    fn list_splice_expands_in_place() {
        let root = block(vec![
            Node::new(NodeKind::EmptyStatement).into_ref(),
            expr_stmt(literal(Scalar::Bool(true))),
        ]);
        rewrite_tree(&mut DoubleStatements, &root);
        assert_eq!(root.borrow().children("body").unwrap().len(), 3);
    }

    #[test]
    fn parents_are_refreshed_on_descent() {
        struct CheckParents {
            checked: usize,
        }
        impl Visitor for CheckParents {
            fn visit(&mut self, node: &NodeRef) {
                for child in node.borrow().child_nodes() {
                    let parent = child.borrow().parent().expect("parent must be set");
                    assert!(Rc::ptr_eq(&parent, node));
                    self.checked += 1;
                }
                visit_children(self, node);
            }
        }
        let root = block(vec![expr_stmt(identifier("x"))]);
        let mut pass = CheckParents { checked: 0 };
        visit(&mut pass, &root);
        assert_eq!(pass.checked, 2);
    }
}
