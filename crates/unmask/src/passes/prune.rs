//! Dead-code elimination driven by the usage census.
//!
//! Two rewrites: an `if` whose test already folded to a literal collapses
//! into the taken branch (or disappears), and declarations the census never
//! saw referenced are dropped. A declarator whose initializer is a call or
//! constructor invocation always survives, since evaluating it may have
//! side effects. Declarations in a `for` head are left alone.
//!
//! The pass runs inside the pipeline's fixpoint loop: census → eliminate →
//! regenerate, until the printed program stops changing.

use ahash::AHashMap;

use crate::{
    nodes::{NodeKind, NodeRef, kind_of, literal_value},
    walk::{Edit, Rewriter},
};

use super::is_reserved;

/// One elimination sweep. Construct per iteration with the current census.
#[derive(Debug)]
pub struct Pruner<'a> {
    counts: &'a AHashMap<String, u64>,
    pub branches_removed: usize,
    pub symbols_removed: usize,
}

impl<'a> Pruner<'a> {
    #[must_use]
    pub fn new(counts: &'a AHashMap<String, u64>) -> Self {
        Self {
            counts,
            branches_removed: 0,
            symbols_removed: 0,
        }
    }

    fn references(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// An `if` with a literal test collapses into the branch that runs.
    fn prune_if(&mut self, node: &NodeRef) -> Option<Edit> {
        let (test, consequent, alternate) = {
            let node = node.borrow();
            (
                node.child("test")?,
                node.child("consequent"),
                node.child("alternate"),
            )
        };
        let value = literal_value(&test)?;
        let branch = if value.truthy() { consequent } else { alternate };
        self.branches_removed += 1;
        let Some(branch) = branch else {
            return Some(Edit::Remove);
        };
        // in a statement list the block unwraps; anywhere else the branch
        // must stay a single statement
        let in_list = node.borrow().parent().is_some_and(|parent| {
            matches!(
                kind_of(&parent),
                NodeKind::Program | NodeKind::BlockStatement | NodeKind::SwitchCase
            )
        });
        if in_list && kind_of(&branch) == NodeKind::BlockStatement {
            let body = branch.borrow().children("body").unwrap_or_default();
            return Some(Edit::Many(body));
        }
        Some(Edit::Node(branch))
    }

    /// An unreferenced function declaration disappears.
    fn prune_function(&mut self, node: &NodeRef) -> Option<Edit> {
        let name = {
            let node = node.borrow();
            node.child("id")?.borrow().string("name")?
        };
        if is_reserved(&name) || self.references(&name) > 0 {
            return None;
        }
        log::debug!("removing unused function `{name}`");
        self.symbols_removed += 1;
        Some(Edit::Remove)
    }

    /// Unreferenced declarators without side-effectful initializers drop
    /// out of the declaration list; an emptied declaration disappears.
    fn prune_declaration(&mut self, node: &NodeRef) -> Option<Edit> {
        // a `for` head owns its declaration even when nothing else uses it
        if node.borrow().parent().is_some_and(|parent| {
            matches!(
                kind_of(&parent),
                NodeKind::ForStatement | NodeKind::ForInStatement
            )
        }) {
            return None;
        }
        let declarations = node.borrow().children("declarations")?;
        let mut kept = Vec::with_capacity(declarations.len());
        for declarator in declarations {
            if self.keeps(&declarator) {
                kept.push(declarator);
            } else {
                self.symbols_removed += 1;
            }
        }
        if kept.is_empty() {
            return Some(Edit::Remove);
        }
        node.borrow_mut().set_children("declarations", kept);
        None
    }

    fn keeps(&self, declarator: &NodeRef) -> bool {
        let (id, init) = {
            let declarator = declarator.borrow();
            (declarator.child("id"), declarator.child("init"))
        };
        let Some(id) = id else {
            return true;
        };
        // opaque binding patterns are kept untouched
        let Some(name) = id.borrow().string("name") else {
            return true;
        };
        if is_reserved(&name) || self.references(&name) > 0 {
            return true;
        }
        // possible side effect in the initializer
        init.is_some_and(|init| {
            matches!(
                kind_of(&init),
                NodeKind::CallExpression | NodeKind::NewExpression
            )
        })
    }
}

impl Rewriter for Pruner<'_> {
    fn rewrite(&mut self, node: NodeRef) -> Edit {
        let edit = match kind_of(&node) {
            NodeKind::IfStatement => self.prune_if(&node),
            NodeKind::FunctionDeclaration => self.prune_function(&node),
            NodeKind::VariableDeclaration => self.prune_declaration(&node),
            _ => None,
        };
        edit.unwrap_or(Edit::Node(node))
    }
}

/// Convenience used by tests and the pipeline: one census + one sweep.
pub fn prune_once(program: &NodeRef) -> (usize, usize) {
    let counts = super::census::count_usages(program);
    let mut pruner = Pruner::new(&counts);
    crate::walk::rewrite_tree(&mut pruner, program);
    (pruner.branches_removed, pruner.symbols_removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codegen::generate, parse::parse_program};

    fn pruned(src: &str) -> (String, usize, usize) {
        let program = parse_program(src).expect("fixture must parse");
        let (branches, symbols) = prune_once(&program);
        (generate(&program), branches, symbols)
    }

    #[test]
    fn literal_test_takes_the_truthy_branch() {
        let (out, branches, _) = pruned("if (true) { x = 1; } else { x = 2; }");
        assert_eq!(out, "x = 1;\n");
        assert_eq!(branches, 1);
    }

    #[test]
    fn falsy_test_without_else_deletes_the_statement() {
        let (out, branches, _) = pruned("if (false) { x = 1; }y = 2;");
        assert_eq!(out, "y = 2;\n");
        assert_eq!(branches, 1);
    }

    #[test]
    fn unused_declarations_drop() {
        let (out, _, symbols) = pruned("var u1 = unused1;keep1();");
        assert_eq!(out, "keep1();\n");
        assert_eq!(symbols, 1);
    }

    #[test]
    fn call_initializers_survive_as_possible_side_effects() {
        let (out, _, symbols) = pruned("var u1 = effect1();");
        assert!(out.contains("var u1 = effect1();"), "got: {out}");
        assert_eq!(symbols, 0);
    }

    #[test]
    fn new_initializers_survive_too() {
        let (out, _, _) = pruned("var u1 = new Effect1();");
        assert!(out.contains("new Effect1()"), "got: {out}");
    }

    #[test]
    fn used_declarators_stay_while_dead_ones_go() {
        let (out, _, symbols) = pruned("var live1 = 1, dead1 = 2;use(live1);");
        assert!(out.contains("var live1 = 1;"), "got: {out}");
        assert!(!out.contains("dead1"), "got: {out}");
        assert_eq!(symbols, 1);
    }

    #[test]
    fn unused_functions_drop_but_reserved_names_stay() {
        let (out, _, symbols) = pruned("function gone1() { return 1; }use();");
        assert_eq!(out, "use();\n");
        assert_eq!(symbols, 1);
    }

    #[test]
    fn for_head_declarations_are_untouched() {
        let (out, _, symbols) = pruned("for (var n1 = 0; ; ) { stop(); }");
        assert!(out.contains("for (var n1 = 0; ; )"), "got: {out}");
        assert_eq!(symbols, 0);
    }
}
