//! Expression simplification: constant folding with JavaScript semantics,
//! constant propagation, and computed-to-dotted property rewriting.
//!
//! Folding never raises: division by zero is `Infinity`, `0/0` is `NaN`,
//! and anything the fold rules do not cover leaves the node unchanged.
//! Negative numeric results come back as `-N` unary expressions via
//! [`crate::nodes::number`].

use std::sync::LazyLock;

use ahash::{AHashMap, AHashSet};
use regex::Regex;

use crate::{
    nodes::{NodeKind, NodeRef, Scalar, folded, identifier, kind_of, literal_value},
    walk::{self, Edit, Rewriter, Visitor},
};

pub(crate) static IDENT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("pattern is valid")
});

/// Runs the simplifier over a program and returns how many rewrites it
/// made. Folding runs first, then constants are collected and a second
/// fold substitutes them, until nothing changes (bounded).
pub fn simplify_program(program: &NodeRef) -> usize {
    let mut total = 0;
    let mut bindings = ConstBindings::collect(program);
    for _ in 0..4 {
        let mut pass = Simplifier {
            bindings,
            simplified: 0,
        };
        walk::rewrite_tree(&mut pass, program);
        total += pass.simplified;
        if pass.simplified == 0 {
            break;
        }
        bindings = ConstBindings::collect(program);
    }
    total
}

/// Scalar-constant bindings usable for propagation: declared exactly once
/// in the whole program and never written.
#[derive(Debug, Default)]
pub struct ConstBindings {
    values: AHashMap<String, Scalar>,
    declared: AHashMap<String, usize>,
    written: AHashSet<String>,
}

impl ConstBindings {
    #[must_use]
    pub fn collect(program: &NodeRef) -> Self {
        let mut scan = Self::default();
        walk::visit(&mut scan, program);
        scan
    }

    fn declare(&mut self, name: &str) {
        *self.declared.entry(name.to_owned()).or_insert(0) += 1;
    }

    fn get(&self, name: &str) -> Option<&Scalar> {
        if self.declared.get(name).copied() != Some(1) || self.written.contains(name) {
            return None;
        }
        self.values.get(name)
    }
}

impl Visitor for ConstBindings {
    fn visit(&mut self, node: &NodeRef) {
        match kind_of(node) {
            NodeKind::VariableDeclarator => {
                let (id, init) = {
                    let node = node.borrow();
                    (node.child("id"), node.child("init"))
                };
                if let Some(id) = &id {
                    if let Some(name) = id.borrow().string("name") {
                        self.declare(&name);
                        if let Some(value) = init.as_ref().and_then(literal_value) {
                            self.values.insert(name, value);
                        }
                    }
                }
                if let Some(init) = &init {
                    walk::visit(self, init);
                }
            }
            NodeKind::FunctionDeclaration
            | NodeKind::FunctionExpression
            | NodeKind::ArrowFunctionExpression => {
                let (id, params, body) = {
                    let node = node.borrow();
                    (
                        node.child("id"),
                        node.children("params").unwrap_or_default(),
                        node.child("body"),
                    )
                };
                for declared in id.iter().chain(params.iter()) {
                    if let Some(name) = declared.borrow().string("name") {
                        self.declare(&name);
                    }
                }
                if let Some(body) = &body {
                    walk::visit(self, body);
                }
            }
            NodeKind::CatchClause => {
                let param = node.borrow().child("param");
                if let Some(param) = param {
                    if let Some(name) = param.borrow().string("name") {
                        self.declare(&name);
                    }
                }
                walk::visit_children(self, node);
            }
            NodeKind::AssignmentExpression => {
                let left = node.borrow().child("left");
                if let Some(left) = left {
                    if let Some(name) = left.borrow().string("name") {
                        self.written.insert(name);
                    }
                }
                walk::visit_children(self, node);
            }
            NodeKind::UpdateExpression => {
                let argument = node.borrow().child("argument");
                if let Some(argument) = argument {
                    if let Some(name) = argument.borrow().string("name") {
                        self.written.insert(name);
                    }
                }
                walk::visit_children(self, node);
            }
            NodeKind::ForInStatement => {
                let left = node.borrow().child("left");
                if let Some(left) = left {
                    if let Some(name) = left.borrow().string("name") {
                        self.written.insert(name);
                    }
                }
                walk::visit_children(self, node);
            }
            _ => walk::visit_children(self, node),
        }
    }
}

/// The folding pass itself.
#[derive(Debug, Default)]
pub struct Simplifier {
    bindings: ConstBindings,
    pub simplified: usize,
}

impl Simplifier {
    /// A foldable operand: a literal, the canonical `-N` rendering of a
    /// negative number, or an identifier bound to a known constant.
    fn operand(&self, node: &NodeRef) -> Option<Scalar> {
        if let Some(value) = literal_value(node) {
            return Some(value);
        }
        match kind_of(node) {
            NodeKind::Identifier => {
                let name = node.borrow().string("name")?;
                self.bindings.get(&name).cloned()
            }
            NodeKind::UnaryExpression => {
                let (operator, argument) = {
                    let node = node.borrow();
                    (node.string("operator")?, node.child("argument")?)
                };
                if operator != "-" {
                    return None;
                }
                match literal_value(&argument) {
                    Some(Scalar::Num(n)) => Some(Scalar::Num(-n)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn fold_binary(&mut self, node: &NodeRef) -> Option<NodeRef> {
        let (operator, left, right) = {
            let node = node.borrow();
            (
                node.string("operator")?,
                node.child("left")?,
                node.child("right")?,
            )
        };
        let left = self.operand(&left)?;
        let right = self.operand(&right)?;
        let result = eval_binary(&operator, &left, &right)?;
        self.simplified += 1;
        Some(folded(result))
    }

    fn fold_unary(&mut self, node: &NodeRef) -> Option<NodeRef> {
        let (operator, argument) = {
            let node = node.borrow();
            (node.string("operator")?, node.child("argument")?)
        };
        // `-N` over a plain number literal is already the canonical
        // rendering of a negative number; rewriting it would churn forever
        if operator == "-" && matches!(literal_value(&argument), Some(Scalar::Num(_))) {
            return None;
        }
        let value = self.operand(&argument)?;
        let result = eval_unary(&operator, &value)?;
        self.simplified += 1;
        Some(folded(result))
    }

    /// `obj["prop"]` becomes `obj.prop` when the string is identifier
    /// shaped.
    fn fold_member(&mut self, node: &NodeRef) -> Option<NodeRef> {
        let property = {
            let node = node.borrow();
            if !node.flag("computed") {
                return None;
            }
            node.child("property")?
        };
        let Some(Scalar::Str(name)) = literal_value(&property) else {
            return None;
        };
        if !IDENT_SHAPE.is_match(&name) {
            return None;
        }
        {
            let mut node = node.borrow_mut();
            node.set_scalar("computed", Scalar::Bool(false));
            node.set_child("property", identifier(&name));
        }
        self.simplified += 1;
        Some(node.clone())
    }
}

impl Rewriter for Simplifier {
    fn rewrite(&mut self, node: NodeRef) -> Edit {
        let replacement = match kind_of(&node) {
            NodeKind::BinaryExpression | NodeKind::LogicalExpression => self.fold_binary(&node),
            NodeKind::UnaryExpression => self.fold_unary(&node),
            NodeKind::MemberExpression => self.fold_member(&node),
            _ => None,
        };
        Edit::Node(replacement.unwrap_or(node))
    }
}

/// JavaScript `ToNumber` over the scalar domain.
fn to_number(value: &Scalar) -> f64 {
    match value {
        Scalar::Num(n) => *n,
        Scalar::Bool(true) => 1.0,
        Scalar::Bool(false) | Scalar::Null => 0.0,
        Scalar::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64)
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
    }
}

/// JavaScript `ToString` over the scalar domain.
fn to_js_string(value: &Scalar) -> String {
    match value {
        Scalar::Str(s) => s.clone(),
        Scalar::Num(n) => crate::codegen::js_number(*n),
        Scalar::Bool(true) => "true".to_owned(),
        Scalar::Bool(false) => "false".to_owned(),
        Scalar::Null => "null".to_owned(),
    }
}

/// JavaScript `ToInt32`.
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulus = 4_294_967_296.0;
    let mut m = n.trunc() % modulus;
    if m < 0.0 {
        m += modulus;
    }
    if m >= 2_147_483_648.0 {
        (m - modulus) as i32
    } else {
        m as i32
    }
}

/// JavaScript `ToUint32`.
fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulus = 4_294_967_296.0;
    let mut m = n.trunc() % modulus;
    if m < 0.0 {
        m += modulus;
    }
    m as u32
}

fn loose_equals(left: &Scalar, right: &Scalar) -> bool {
    match (left, right) {
        (Scalar::Null, Scalar::Null) => true,
        (Scalar::Null, _) | (_, Scalar::Null) => false,
        (Scalar::Str(a), Scalar::Str(b)) => a == b,
        // numbers, booleans, and mixed pairs coerce to number
        _ => to_number(left) == to_number(right),
    }
}

fn strict_equals(left: &Scalar, right: &Scalar) -> bool {
    match (left, right) {
        (Scalar::Str(a), Scalar::Str(b)) => a == b,
        (Scalar::Num(a), Scalar::Num(b)) => a == b,
        (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
        (Scalar::Null, Scalar::Null) => true,
        _ => false,
    }
}

fn eval_binary(operator: &str, left: &Scalar, right: &Scalar) -> Option<Scalar> {
    let result = match operator {
        "+" => {
            if matches!(left, Scalar::Str(_)) || matches!(right, Scalar::Str(_)) {
                Scalar::Str(format!("{}{}", to_js_string(left), to_js_string(right)))
            } else {
                Scalar::Num(to_number(left) + to_number(right))
            }
        }
        "-" => Scalar::Num(to_number(left) - to_number(right)),
        "*" => Scalar::Num(to_number(left) * to_number(right)),
        // division and modulo by zero follow IEEE semantics: Infinity / NaN
        "/" => Scalar::Num(to_number(left) / to_number(right)),
        "%" => Scalar::Num(to_number(left) % to_number(right)),
        "<" | "<=" | ">" | ">=" => {
            let holds = if let (Scalar::Str(a), Scalar::Str(b)) = (left, right) {
                match operator {
                    "<" => a < b,
                    "<=" => a <= b,
                    ">" => a > b,
                    _ => a >= b,
                }
            } else {
                let (a, b) = (to_number(left), to_number(right));
                match operator {
                    "<" => a < b,
                    "<=" => a <= b,
                    ">" => a > b,
                    _ => a >= b,
                }
            };
            Scalar::Bool(holds)
        }
        "==" => Scalar::Bool(loose_equals(left, right)),
        "!=" => Scalar::Bool(!loose_equals(left, right)),
        "===" => Scalar::Bool(strict_equals(left, right)),
        "!==" => Scalar::Bool(!strict_equals(left, right)),
        // logical operators yield an operand, not a boolean
        "&&" => {
            if left.truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        "||" => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
        "&" => Scalar::Num(f64::from(to_int32(to_number(left)) & to_int32(to_number(right)))),
        "|" => Scalar::Num(f64::from(to_int32(to_number(left)) | to_int32(to_number(right)))),
        "^" => Scalar::Num(f64::from(to_int32(to_number(left)) ^ to_int32(to_number(right)))),
        "<<" => Scalar::Num(f64::from(
            to_int32(to_number(left)).wrapping_shl(to_uint32(to_number(right)) & 31),
        )),
        ">>" => Scalar::Num(f64::from(
            to_int32(to_number(left)).wrapping_shr(to_uint32(to_number(right)) & 31),
        )),
        ">>>" => Scalar::Num(f64::from(
            to_uint32(to_number(left)) >> (to_uint32(to_number(right)) & 31),
        )),
        _ => return None,
    };
    Some(result)
}

fn eval_unary(operator: &str, value: &Scalar) -> Option<Scalar> {
    let result = match operator {
        "!" => Scalar::Bool(!value.truthy()),
        "-" => Scalar::Num(-to_number(value)),
        "+" => Scalar::Num(to_number(value)),
        "~" => Scalar::Num(f64::from(!to_int32(to_number(value)))),
        "typeof" => Scalar::Str(value.type_of().to_owned()),
        _ => return None,
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codegen::generate, parse::parse_program};

    fn simplified(src: &str) -> String {
        let program = parse_program(src).expect("fixture must parse");
        simplify_program(&program);
        generate(&program)
    }

    #[test]
    fn string_concatenation_folds() {
        assert_eq!(simplified("x = \"Hello\" + \" \" + \"World\";"), "x = \"Hello World\";\n");
    }

    #[test]
    fn typeof_comparison_folds_to_true() {
        assert_eq!(simplified("x = typeof \"x\" === \"string\";"), "x = true;\n");
    }

    #[test]
    fn division_by_zero_is_infinity_not_an_error() {
        assert_eq!(simplified("x = 1 / 0;"), "x = Infinity;\n");
        assert_eq!(simplified("x = 0 / 0;"), "x = NaN;\n");
        assert_eq!(simplified("x = 5 % 0;"), "x = NaN;\n");
    }

    #[test]
    fn negative_results_come_out_as_unary_minus() {
        assert_eq!(simplified("x = 2 - 5;"), "x = -3;\n");
    }

    #[test]
    fn computed_string_property_becomes_dotted() {
        assert_eq!(simplified("obj[\"a\" + \"b\"];"), "obj.ab;\n");
        // non-identifier shapes keep the brackets
        assert_eq!(simplified("obj[\"a b\"];"), "obj[\"a b\"];\n");
    }

    #[test]
    fn logical_operators_yield_operands() {
        assert_eq!(simplified("x = 1 && \"kept\";"), "x = \"kept\";\n");
        assert_eq!(simplified("x = 0 || \"fallback\";"), "x = \"fallback\";\n");
    }

    #[test]
    fn bitwise_operators_use_int32_semantics() {
        assert_eq!(simplified("x = 1 << 3;"), "x = 8;\n");
        assert_eq!(simplified("x = -1 >>> 28;"), "x = 15;\n");
        assert_eq!(simplified("x = 5 & 3;"), "x = 1;\n");
    }

    #[test]
    fn constants_propagate_into_folds() {
        let out = simplified("var _a1 = 1, _b1 = 2;var s1 = _a1 + _b1;");
        assert!(out.contains("var s1 = 3;"), "got: {out}");
    }

    #[test]
    fn written_constants_do_not_propagate() {
        let out = simplified("var n1 = 1;n1 = 2;var s1 = n1 + 1;");
        assert!(out.contains("var s1 = n1 + 1;"), "got: {out}");
    }

    #[test]
    fn chained_constants_fold_across_rounds() {
        let out = simplified("var p1 = 1 + 2;var q1 = p1 * 2;");
        assert!(out.contains("var p1 = 3;"), "got: {out}");
        assert!(out.contains("var q1 = 6;"), "got: {out}");
    }

    #[test]
    fn folding_failures_leave_the_node_alone() {
        let out = simplified("x = \"a\" instanceof b;");
        assert!(out.contains("instanceof"), "got: {out}");
    }
}
