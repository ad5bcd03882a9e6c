//! The usage census: a multiset of identifier names counted at referential
//! use sites only.
//!
//! Declarations do not count: the `id` of a declarator or function, the
//! parameters of a function, a catch parameter. Neither do non-computed
//! member properties or non-computed object keys, which name fields rather
//! than variables. Identifier-shaped tokens inside `Raw` segments count
//! conservatively so elimination never drops something opaque code still
//! reaches.
//!
//! Counts key on the current (possibly renamed) name, which is why the
//! pipeline renames before it counts.

use ahash::AHashMap;

use crate::{
    nodes::{NodeKind, NodeRef, kind_of},
    walk::{self, Visitor},
};

/// Counts identifier references under `program`.
#[must_use]
pub fn count_usages(program: &NodeRef) -> AHashMap<String, u64> {
    let mut census = UsageCensus {
        counts: AHashMap::new(),
    };
    walk::visit(&mut census, program);
    census.counts
}

struct UsageCensus {
    counts: AHashMap<String, u64>,
}

impl UsageCensus {
    fn count(&mut self, name: String) {
        *self.counts.entry(name).or_insert(0) += 1;
    }
}

impl Visitor for UsageCensus {
    fn visit(&mut self, node: &NodeRef) {
        match kind_of(node) {
            NodeKind::Identifier => {
                let name = node.borrow().string("name");
                if let Some(name) = name {
                    self.count(name);
                }
            }
            NodeKind::VariableDeclarator => {
                let init = node.borrow().child("init");
                if let Some(init) = &init {
                    walk::visit(self, init);
                }
            }
            NodeKind::FunctionDeclaration
            | NodeKind::FunctionExpression
            | NodeKind::ArrowFunctionExpression => {
                let body = node.borrow().child("body");
                if let Some(body) = &body {
                    walk::visit(self, body);
                }
            }
            NodeKind::CatchClause => {
                let body = node.borrow().child("body");
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
            NodeKind::Raw => {
                let source = node.borrow().string("source").unwrap_or_default();
                for token in super::IDENT_TOKENS.find_iter(&source) {
                    self.count(token.as_str().to_owned());
                }
            }
            _ => walk::visit_children(self, node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;

    fn counts(src: &str) -> AHashMap<String, u64> {
        count_usages(&parse_program(src).expect("fixture must parse"))
    }

    #[test]
    fn declarations_do_not_count() {
        let counts = counts("var a1 = 1;function f1(p1) { return p1 + a1; }");
        assert_eq!(counts.get("a1"), Some(&1));
        assert_eq!(counts.get("f1"), None);
        assert_eq!(counts.get("p1"), Some(&1));
    }

    #[test]
    fn member_properties_do_not_count() {
        let counts = counts("obj.field;obj[key];");
        assert_eq!(counts.get("obj"), Some(&2));
        assert_eq!(counts.get("field"), None);
        assert_eq!(counts.get("key"), Some(&1));
    }

    #[test]
    fn assignment_targets_count_as_uses() {
        let counts = counts("x1 = 1;x1 += 2;");
        assert_eq!(counts.get("x1"), Some(&2));
    }

    #[test]
    fn raw_segments_count_conservatively() {
        // the class body is outside the modeled subset and becomes raw
        let counts = counts("class Z1 { m() { return helper1(); } }");
        assert!(counts.contains_key("helper1"));
    }
}
