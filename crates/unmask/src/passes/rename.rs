//! Scope-aware alpha-renaming of obfuscated identifiers.
//!
//! A name qualifies when it is hex-tagged (`_0x1a2b`), suspiciously short,
//! or built only from homoglyph characters. Qualifying declarations get
//! `var_<n>` with a single monotonically increasing counter; everything
//! else is identity-mapped into its scope frame so shadowing keeps
//! working. References resolve innermost-first; unknown names pass
//! through untouched.
//!
//! Hoisting is approximated: a function declaration's name enters the
//! enclosing scope before descent, a function expression's name is only
//! visible inside its own body.

use std::sync::LazyLock;

use ahash::AHashSet;
use indexmap::IndexMap;
use regex::Regex;

use crate::{
    nodes::{NodeKind, NodeRef, Scalar, kind_of},
    walk::{self, Visitor},
};

static HEX_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^_0x[0-9a-fA-F]+$").expect("pattern is valid")
});

/// Short names that read fine and are left alone.
const SHORT_WHITELIST: [&str; 10] = ["i", "j", "k", "t", "a", "b", "c", "x", "y", "z"];

/// The renaming pass. Drive it over a program with [`walk::visit`].
#[derive(Debug)]
pub struct Renamer {
    scopes: Vec<IndexMap<String, String>>,
    counter: usize,
    /// Names that occur inside `Raw` segments; renaming them could break
    /// code the model cannot see into.
    raw_names: AHashSet<String>,
    pub renamed: usize,
}

impl Renamer {
    #[must_use]
    pub fn new(raw_names: AHashSet<String>) -> Self {
        Self {
            // the stack is never empty: this is the global frame
            scopes: vec![IndexMap::new()],
            counter: 0,
            raw_names,
            renamed: 0,
        }
    }

    fn qualifies(&self, name: &str) -> bool {
        if self.raw_names.contains(name) {
            return false;
        }
        if HEX_TAG.is_match(name) {
            return true;
        }
        if name.len() <= 2 {
            return !SHORT_WHITELIST.contains(&name);
        }
        name.chars().all(|c| matches!(c, 'I' | 'l' | '1' | 'O' | '0'))
    }

    fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declares `name` in the innermost scope and returns its new name.
    fn declare(&mut self, name: &str) -> String {
        let mapped = if self.qualifies(name) {
            let fresh = format!("var_{}", self.counter);
            self.counter += 1;
            self.renamed += 1;
            fresh
        } else {
            name.to_owned()
        };
        if let Some(frame) = self.scopes.last_mut() {
            frame.insert(name.to_owned(), mapped.clone());
        }
        mapped
    }

    /// Resolves a reference innermost-first; unknown names pass through.
    fn lookup(&self, name: &str) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
    }

    /// Declares the identifier node and rewrites its name in place.
    fn declare_node(&mut self, id: &NodeRef) {
        if kind_of(id) != NodeKind::Identifier {
            return;
        }
        let name = id.borrow().string("name");
        if let Some(name) = name {
            let mapped = self.declare(&name);
            if mapped != name {
                id.borrow_mut().set_scalar("name", Scalar::Str(mapped));
            }
        }
    }

    fn rename_reference(&mut self, id: &NodeRef) {
        let name = id.borrow().string("name");
        if let Some(name) = name {
            if let Some(mapped) = self.lookup(&name) {
                if mapped != name {
                    id.borrow_mut().set_scalar("name", Scalar::Str(mapped));
                }
            }
        }
    }

    fn enter_function(&mut self, node: &NodeRef, declaration: bool) {
        let (id, params, body) = {
            let node = node.borrow();
            (
                node.child("id"),
                node.children("params").unwrap_or_default(),
                node.child("body"),
            )
        };
        if declaration {
            if let Some(id) = &id {
                self.declare_node(id);
            }
        }
        self.push_scope();
        if !declaration {
            if let Some(id) = &id {
                self.declare_node(id);
            }
        }
        for param in &params {
            self.declare_node(param);
        }
        if let Some(body) = &body {
            walk::visit(self, body);
        }
        self.pop_scope();
    }
}

impl Visitor for Renamer {
    fn visit(&mut self, node: &NodeRef) {
        match kind_of(node) {
            NodeKind::FunctionDeclaration => self.enter_function(node, true),
            NodeKind::FunctionExpression => self.enter_function(node, false),
            NodeKind::ArrowFunctionExpression => self.enter_function(node, false),
            NodeKind::VariableDeclarator => {
                let (id, init) = {
                    let node = node.borrow();
                    (node.child("id"), node.child("init"))
                };
                if let Some(id) = &id {
                    self.declare_node(id);
                }
                if let Some(init) = &init {
                    walk::visit(self, init);
                }
            }
            NodeKind::CatchClause => {
                let (param, body) = {
                    let node = node.borrow();
                    (node.child("param"), node.child("body"))
                };
                if let Some(param) = &param {
                    self.declare_node(param);
                }
                if let Some(body) = &body {
                    walk::visit(self, body);
                }
            }
            NodeKind::MemberExpression => {
                let (object, property, computed) = {
                    let node = node.borrow();
                    (
                        node.child("object"),
                        node.child("property"),
                        node.flag("computed"),
                    )
                };
                if let Some(object) = &object {
                    walk::visit(self, object);
                }
                // a non-computed property names a field, not a variable
                if computed {
                    if let Some(property) = &property {
                        walk::visit(self, property);
                    }
                }
            }
            NodeKind::Property => {
                let (key, value, computed) = {
                    let node = node.borrow();
                    (node.child("key"), node.child("value"), node.flag("computed"))
                };
                if computed {
                    if let Some(key) = &key {
                        walk::visit(self, key);
                    }
                }
                if let Some(value) = &value {
                    walk::visit(self, value);
                }
            }
            NodeKind::Identifier => self.rename_reference(node),
            _ => walk::visit_children(self, node),
        }
    }
}

/// Collects identifier-shaped tokens from every `Raw` segment, so renaming
/// and elimination stay conservative around code the model cannot see into.
#[must_use]
pub fn collect_raw_names(program: &NodeRef) -> AHashSet<String> {
    struct RawScan {
        names: AHashSet<String>,
    }

    impl Visitor for RawScan {
        fn visit(&mut self, node: &NodeRef) {
            if kind_of(node) == NodeKind::Raw {
                let source = node.borrow().string("source").unwrap_or_default();
                for token in super::IDENT_TOKENS.find_iter(&source) {
                    self.names.insert(token.as_str().to_owned());
                }
            }
            walk::visit_children(self, node);
        }
    }

    let mut scan = RawScan {
        names: AHashSet::new(),
    };
    walk::visit(&mut scan, program);
    scan.names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codegen::generate, parse::parse_program};

    fn renamed(src: &str) -> String {
        let program = parse_program(src).expect("fixture must parse");
        let raw_names = collect_raw_names(&program);
        let mut renamer = Renamer::new(raw_names);
        walk::visit(&mut renamer, &program);
        generate(&program)
    }

    #[test]
    fn hex_tagged_names_rename_in_declaration_order() {
        let out = renamed("var _0x1a = 1, _0x1b = 2;var s = _0x1a + _0x1b;");
        assert!(out.contains("var var_0 = 1, var_1 = 2;"), "got: {out}");
        assert!(out.contains("var_0 + var_1"), "got: {out}");
    }

    #[test]
    fn whitelisted_short_names_stay() {
        let out = renamed("var i = 0;var q = 1;use(i, q);");
        assert!(out.contains("var i = 0;"), "got: {out}");
        assert!(out.contains("var var_0 = 1;"), "got: {out}");
        assert!(out.contains("use(i, var_0);"), "got: {out}");
    }

    #[test]
    fn homoglyph_names_rename() {
        let out = renamed("var Il1O0 = 5;use(Il1O0);");
        assert!(out.contains("var var_0 = 5;"), "got: {out}");
        assert!(out.contains("use(var_0);"), "got: {out}");
    }

    #[test]
    fn shadowing_declarations_stay_distinct() {
        let out = renamed(concat!(
            "var _0xa = 1;",
            "function make(_0xa) { return _0xa; }",
            "use(_0xa);",
        ));
        assert!(out.contains("var var_0 = 1;"), "got: {out}");
        assert!(out.contains("function make(var_1) {"), "got: {out}");
        assert!(out.contains("return var_1;"), "got: {out}");
        assert!(out.contains("use(var_0);"), "got: {out}");
    }

    #[test]
    fn member_properties_are_never_renamed() {
        let out = renamed("var _0xa = {};_0xa.qq = 1;use(_0xa[qq]);");
        assert!(out.contains("var_0.qq = 1;"), "got: {out}");
        // the computed read refers to a variable named qq, which is
        // undeclared and passes through
        assert!(out.contains("var_0[qq]"), "got: {out}");
    }

    #[test]
    fn function_expression_names_stay_inner() {
        let out = renamed("var g = function _0xf() { return _0xf; };use(g);");
        // `g` is declared first, then the expression's own name inside it
        assert!(out.contains("var var_0 = function var_1() {"), "got: {out}");
        assert!(out.contains("return var_1;"), "got: {out}");
        assert!(out.contains("use(var_0);"), "got: {out}");
    }

    #[test]
    fn unknown_references_pass_through() {
        let out = renamed("use(console, qq);");
        assert!(out.contains("use(console, qq);"), "got: {out}");
    }
}
