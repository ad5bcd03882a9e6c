//! String-array resolution: rewrites accessor calls and indexed reads into
//! inline literals.

use indexmap::IndexMap;

use crate::{
    codegen::{generate, quote_string},
    nodes::{Node, NodeKind, NodeRef, Scalar, kind_of, literal_value, number},
    walk::{Edit, Rewriter},
};

use super::finder::TableFacts;

/// Inlines `accessor(N)` calls and `table[N]` reads whose index is an
/// in-range integer literal. Everything else is left untouched.
#[derive(Debug)]
pub struct TableInliner<'a> {
    facts: &'a TableFacts,
    /// Telemetry: how often each table index was inlined.
    pub histogram: IndexMap<usize, u64>,
    pub inlined: usize,
}

impl<'a> TableInliner<'a> {
    #[must_use]
    pub fn new(facts: &'a TableFacts) -> Self {
        Self {
            facts,
            histogram: IndexMap::new(),
            inlined: 0,
        }
    }

    /// The top table indices by inlined use, best first.
    #[must_use]
    pub fn top_indices(&self, count: usize) -> Vec<(usize, u64)> {
        let mut entries: Vec<(usize, u64)> =
            self.histogram.iter().map(|(i, n)| (*i, *n)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries.truncate(count);
        entries
    }

    fn entry(&mut self, index: usize) -> Option<NodeRef> {
        let value = self.facts.table.get(index)?.clone();
        *self.histogram.entry(index).or_insert(0) += 1;
        self.inlined += 1;
        Some(match value {
            Scalar::Str(s) => {
                let raw = quote_string(&s);
                Node::new(NodeKind::Literal)
                    .with_scalar("value", Scalar::Str(s))
                    .with_scalar("raw", Scalar::Str(raw))
                    .into_ref()
            }
            Scalar::Num(n) => number(n),
            other => crate::nodes::literal(other),
        })
    }

    /// `accessor(N)` with a single in-range integer-literal argument.
    fn resolve_call(&mut self, node: &NodeRef) -> Option<NodeRef> {
        let accessor = self.facts.accessor_name.as_deref()?;
        let (callee, arguments) = {
            let node = node.borrow();
            (node.child("callee"), node.children("arguments")?)
        };
        let callee = callee?;
        if callee.borrow().string("name").as_deref() != Some(accessor) {
            return None;
        }
        let [argument] = arguments.as_slice() else {
            return None;
        };
        let index = literal_value(argument)?.as_index()?;
        if index >= self.facts.table.len() {
            return None;
        }
        let replacement = self.entry(index)?;
        log::debug!("inlined {}({index}) -> {}", accessor, generate(&replacement));
        Some(replacement)
    }

    /// `table[N]` with an in-range integer-literal index.
    fn resolve_member(&mut self, node: &NodeRef) -> Option<NodeRef> {
        let (object, property, computed) = {
            let node = node.borrow();
            (
                node.child("object"),
                node.child("property"),
                node.flag("computed"),
            )
        };
        if !computed {
            return None;
        }
        let object = object?;
        if object.borrow().string("name").as_deref() != Some(self.facts.table_name.as_str()) {
            return None;
        }
        let index = literal_value(&property?)?.as_index()?;
        if index >= self.facts.table.len() {
            return None;
        }
        self.entry(index)
    }
}

impl Rewriter for TableInliner<'_> {
    fn rewrite(&mut self, node: NodeRef) -> Edit {
        let replacement = match kind_of(&node) {
            NodeKind::CallExpression => self.resolve_call(&node),
            NodeKind::MemberExpression => self.resolve_member(&node),
            _ => None,
        };
        Edit::Node(replacement.unwrap_or(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parse::parse_program,
        passes::finder::find_string_table,
        walk::rewrite_tree,
    };

    fn inline(src: &str) -> (String, Vec<(usize, u64)>) {
        let program = parse_program(src).expect("fixture must parse");
        let facts = find_string_table(&program).expect("table must be found");
        let mut inliner = TableInliner::new(&facts);
        rewrite_tree(&mut inliner, &program);
        let top = inliner.top_indices(5);
        (generate(&program), top)
    }

    #[test]
    fn accessor_calls_become_literals() {
        let (out, top) = inline(concat!(
            "var w = [\"alpha\", \"beta\", \"gamma\"];",
            "function g(i) { return w[i]; }",
            "use(g(0), g(2), g(2));",
        ));
        assert!(out.contains("use(\"alpha\", \"gamma\", \"gamma\");"), "got: {out}");
        assert_eq!(top, vec![(2, 2), (0, 1)]);
    }

    #[test]
    fn indexed_reads_become_literals() {
        let (out, _) = inline(concat!(
            "var w = [\"a\", \"b\", \"c\"];",
            "function g(i) { return w[i]; }",
            "use(w[1]);",
        ));
        assert!(out.contains("use(\"b\");"), "got: {out}");
    }

    #[test]
    fn out_of_range_and_non_integer_indices_are_untouched() {
        let (out, top) = inline(concat!(
            "var w = [\"a\", \"b\", \"c\"];",
            "function g(i) { return w[i]; }",
            "use(g(9), g(0.5), w[x]);",
        ));
        assert!(out.contains("g(9)"), "got: {out}");
        assert!(out.contains("g(0.5)"), "got: {out}");
        assert!(out.contains("w[x]"), "got: {out}");
        assert!(top.is_empty());
    }
}
