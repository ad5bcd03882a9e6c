//! String-array detection: the literal table and its accessor wrapper.

use crate::{
    codegen::generate,
    nodes::{NodeKind, NodeRef, Scalar, kind_of, literal_value},
    walk::{self, Visitor},
};

/// Facts handed from the finder to the string-array resolver.
#[derive(Debug, Clone)]
pub struct TableFacts {
    /// The literal values of the table, in index order.
    pub table: Vec<Scalar>,
    /// Name the table is declared under.
    pub table_name: String,
    /// Name of the accessor wrapper, when one was detected.
    pub accessor_name: Option<String>,
}

/// Scans the program for the first plausible string table and, once one is
/// known, for the first subsequent function whose printed text mentions it.
///
/// No cryptographic analysis of the accessor happens here; the resolver
/// treats it as a pure indexer.
#[must_use]
pub fn find_string_table(program: &NodeRef) -> Option<TableFacts> {
    let mut scan = TableScan { facts: None };
    walk::visit(&mut scan, program);
    if let Some(facts) = &scan.facts {
        log::debug!(
            "string table `{}` with {} entries, accessor {:?}",
            facts.table_name,
            facts.table.len(),
            facts.accessor_name
        );
    }
    scan.facts
}

struct TableScan {
    facts: Option<TableFacts>,
}

impl TableScan {
    /// A table is an array literal of more than two elements, every one a
    /// literal.
    fn try_table(&mut self, declarator: &NodeRef) {
        let (id, init) = {
            let declarator = declarator.borrow();
            (declarator.child("id"), declarator.child("init"))
        };
        let (Some(id), Some(init)) = (id, init) else {
            return;
        };
        if kind_of(&id) != NodeKind::Identifier || kind_of(&init) != NodeKind::ArrayExpression {
            return;
        }
        let Some(elements) = init.borrow().children("elements") else {
            return;
        };
        if elements.len() <= 2 {
            return;
        }
        let mut table = Vec::with_capacity(elements.len());
        for element in &elements {
            match literal_value(element) {
                Some(value) => table.push(value),
                None => return,
            }
        }
        let Some(table_name) = id.borrow().string("name") else {
            return;
        };
        self.facts = Some(TableFacts {
            table,
            table_name,
            accessor_name: None,
        });
    }

    /// The accessor is the first function after the table whose generated
    /// text mentions the table's name.
    fn try_accessor(&mut self, name: &str, function: &NodeRef) {
        let Some(facts) = &mut self.facts else {
            return;
        };
        if facts.accessor_name.is_some() {
            return;
        }
        if generate(function).contains(facts.table_name.as_str()) {
            facts.accessor_name = Some(name.to_owned());
        }
    }
}

impl Visitor for TableScan {
    fn visit(&mut self, node: &NodeRef) {
        match kind_of(node) {
            NodeKind::VariableDeclarator => {
                if self.facts.is_none() {
                    self.try_table(node);
                } else {
                    let (id, init) = {
                        let node = node.borrow();
                        (node.child("id"), node.child("init"))
                    };
                    if let (Some(id), Some(init)) = (id, init) {
                        if kind_of(&init) == NodeKind::FunctionExpression {
                            if let Some(name) = id.borrow().string("name") {
                                self.try_accessor(&name, &init);
                            }
                        }
                    }
                }
            }
            NodeKind::FunctionDeclaration => {
                let id = node.borrow().child("id");
                if let Some(id) = id {
                    if let Some(name) = id.borrow().string("name") {
                        self.try_accessor(&name, node);
                    }
                }
            }
            _ => {}
        }
        walk::visit_children(self, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;

    fn scan(src: &str) -> Option<TableFacts> {
        find_string_table(&parse_program(src).expect("fixture must parse"))
    }

    #[test]
    fn finds_table_and_accessor() {
        let facts = scan(concat!(
            "var words = [\"a\", \"b\", \"c\"];",
            "function pick(i) { return words[i]; }",
        ))
        .expect("table must be found");
        assert_eq!(facts.table_name, "words");
        assert_eq!(facts.table.len(), 3);
        assert_eq!(facts.accessor_name.as_deref(), Some("pick"));
    }

    #[test]
    fn accessor_may_be_a_function_expression() {
        let facts = scan(concat!(
            "var t = [1, 2, 3, 4];",
            "var get = function (i) { return t[i + 0]; };",
        ))
        .expect("table must be found");
        assert_eq!(facts.accessor_name.as_deref(), Some("get"));
    }

    #[test]
    fn two_element_arrays_are_below_the_threshold() {
        assert!(scan("var a = [\"x\", \"y\"];").is_none());
    }

    #[test]
    fn non_literal_elements_disqualify_a_table() {
        assert!(scan("var a = [1, 2, f()];").is_none());
    }

    #[test]
    fn unrelated_functions_are_not_the_accessor() {
        let facts = scan(concat!(
            "var tab = [\"a\", \"b\", \"c\"];",
            "function noise() { return 7; }",
            "function reader(i) { return tab[i]; }",
        ))
        .expect("table must be found");
        assert_eq!(facts.accessor_name.as_deref(), Some("reader"));
    }
}
