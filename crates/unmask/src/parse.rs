//! Parsing: oxc front end lowered into the crate's own node model.
//!
//! The parser is an external collaborator; everything downstream works on
//! [`crate::nodes`]. Lowering models the ES subset the passes understand and
//! captures anything else as an opaque `Raw` leaf carrying its verbatim
//! source text, which the printer re-emits unchanged. That keeps the
//! pipeline tolerant: one exotic construct degrades to passthrough instead
//! of failing the file.
//!
//! Recoverable parse diagnostics are logged and the recovered tree is used;
//! only a panicked parse is an error.

use std::fmt;

use oxc_allocator::Allocator;
use oxc_ast::{
    ast,
    ast::{Argument, ArrayExpressionElement, ForStatementInit, PropertyKey},
    match_expression,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::nodes::{Node, NodeKind, NodeRef, Scalar, identifier, raw};

/// The source could not be parsed at all.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses JavaScript source into a `Program` node.
///
/// # Errors
/// Returns [`ParseError`] when the parser gives up entirely; recoverable
/// diagnostics are tolerated.
pub fn parse_program(source: &str) -> Result<NodeRef, ParseError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::default()).parse();
    let nothing_recovered =
        ret.program.body.is_empty() && ret.program.directives.is_empty() && !ret.errors.is_empty();
    if ret.panicked || nothing_recovered {
        let message = ret
            .errors
            .first()
            .map_or_else(|| "parser panicked".to_owned(), ToString::to_string);
        return Err(ParseError { message });
    }
    if !ret.errors.is_empty() {
        log::warn!(
            "{} recoverable parse diagnostic(s); continuing with the recovered tree",
            ret.errors.len()
        );
    }
    Ok(Lower { source }.program(&ret.program))
}

/// Lowers the borrowed oxc tree into owned nodes.
struct Lower<'a> {
    source: &'a str,
}

impl Lower<'_> {
    fn raw(&self, span: Span) -> NodeRef {
        raw(&self.source[span.start as usize..span.end as usize])
    }

    fn program(&self, program: &ast::Program<'_>) -> NodeRef {
        let mut body = Vec::with_capacity(program.directives.len() + program.body.len());
        for directive in &program.directives {
            body.push(self.directive(directive));
        }
        for stmt in &program.body {
            body.push(self.stmt(stmt));
        }
        Node::new(NodeKind::Program)
            .with_children("body", body)
            .into_ref()
    }

    fn directive(&self, directive: &ast::Directive<'_>) -> NodeRef {
        let lit = self.string_literal(&directive.expression);
        Node::new(NodeKind::ExpressionStatement)
            .with_child("expression", lit)
            .into_ref()
    }

    fn stmt(&self, stmt: &ast::Statement<'_>) -> NodeRef {
        match stmt {
            ast::Statement::BlockStatement(block) => self.block_from(&block.body),
            ast::Statement::ExpressionStatement(s) => Node::new(NodeKind::ExpressionStatement)
                .with_child("expression", self.expr(&s.expression))
                .into_ref(),
            ast::Statement::EmptyStatement(_) => Node::new(NodeKind::EmptyStatement).into_ref(),
            ast::Statement::IfStatement(s) => {
                let mut node = Node::new(NodeKind::IfStatement)
                    .with_child("test", self.expr(&s.test))
                    .with_child("consequent", self.stmt(&s.consequent));
                if let Some(alternate) = &s.alternate {
                    node = node.with_child("alternate", self.stmt(alternate));
                }
                node.into_ref()
            }
            ast::Statement::ReturnStatement(s) => {
                let mut node = Node::new(NodeKind::ReturnStatement);
                if let Some(argument) = &s.argument {
                    node = node.with_child("argument", self.expr(argument));
                }
                node.into_ref()
            }
            ast::Statement::VariableDeclaration(decl) => self.var_decl(decl),
            ast::Statement::FunctionDeclaration(func) => {
                self.function(func, NodeKind::FunctionDeclaration)
            }
            ast::Statement::ForStatement(s) => {
                let mut node = Node::new(NodeKind::ForStatement);
                if let Some(init) = &s.init {
                    let lowered = match init {
                        ast::ForStatementInit::VariableDeclaration(decl) => self.var_decl(decl),
                        match_expression!(ForStatementInit) => self.expr(init.to_expression()),
                    };
                    node = node.with_child("init", lowered);
                }
                if let Some(test) = &s.test {
                    node = node.with_child("test", self.expr(test));
                }
                if let Some(update) = &s.update {
                    node = node.with_child("update", self.expr(update));
                }
                node.with_child("body", self.stmt(&s.body)).into_ref()
            }
            ast::Statement::ForInStatement(s) => {
                let left = match &s.left {
                    ast::ForStatementLeft::VariableDeclaration(decl) => self.var_decl(decl),
                    ast::ForStatementLeft::AssignmentTargetIdentifier(id) => {
                        identifier(id.name.as_str())
                    }
                    _ => return self.raw(stmt.span()),
                };
                Node::new(NodeKind::ForInStatement)
                    .with_child("left", left)
                    .with_child("right", self.expr(&s.right))
                    .with_child("body", self.stmt(&s.body))
                    .into_ref()
            }
            ast::Statement::WhileStatement(s) => Node::new(NodeKind::WhileStatement)
                .with_child("test", self.expr(&s.test))
                .with_child("body", self.stmt(&s.body))
                .into_ref(),
            ast::Statement::DoWhileStatement(s) => Node::new(NodeKind::DoWhileStatement)
                .with_child("body", self.stmt(&s.body))
                .with_child("test", self.expr(&s.test))
                .into_ref(),
            ast::Statement::SwitchStatement(s) => {
                let cases = s.cases.iter().map(|case| self.switch_case(case)).collect();
                Node::new(NodeKind::SwitchStatement)
                    .with_child("discriminant", self.expr(&s.discriminant))
                    .with_children("cases", cases)
                    .into_ref()
            }
            ast::Statement::BreakStatement(s) => {
                let mut node = Node::new(NodeKind::BreakStatement);
                if let Some(label) = &s.label {
                    node = node.with_scalar("label", Scalar::Str(label.name.to_string()));
                }
                node.into_ref()
            }
            ast::Statement::ContinueStatement(s) => {
                let mut node = Node::new(NodeKind::ContinueStatement);
                if let Some(label) = &s.label {
                    node = node.with_scalar("label", Scalar::Str(label.name.to_string()));
                }
                node.into_ref()
            }
            ast::Statement::LabeledStatement(s) => Node::new(NodeKind::LabeledStatement)
                .with_scalar("label", Scalar::Str(s.label.name.to_string()))
                .with_child("body", self.stmt(&s.body))
                .into_ref(),
            ast::Statement::ThrowStatement(s) => Node::new(NodeKind::ThrowStatement)
                .with_child("argument", self.expr(&s.argument))
                .into_ref(),
            ast::Statement::TryStatement(s) => {
                let mut node =
                    Node::new(NodeKind::TryStatement).with_child("block", self.block_from(&s.block.body));
                if let Some(handler) = &s.handler {
                    node = node.with_child("handler", self.catch_clause(handler));
                }
                if let Some(finalizer) = &s.finalizer {
                    node = node.with_child("finalizer", self.block_from(&finalizer.body));
                }
                node.into_ref()
            }
            _ => self.raw(stmt.span()),
        }
    }

    fn block_from(&self, stmts: &[ast::Statement<'_>]) -> NodeRef {
        let body = stmts.iter().map(|s| self.stmt(s)).collect();
        Node::new(NodeKind::BlockStatement)
            .with_children("body", body)
            .into_ref()
    }

    fn switch_case(&self, case: &ast::SwitchCase<'_>) -> NodeRef {
        let mut node = Node::new(NodeKind::SwitchCase);
        if let Some(test) = &case.test {
            node = node.with_child("test", self.expr(test));
        }
        let consequent = case.consequent.iter().map(|s| self.stmt(s)).collect();
        node.with_children("consequent", consequent).into_ref()
    }

    fn catch_clause(&self, clause: &ast::CatchClause<'_>) -> NodeRef {
        let mut node = Node::new(NodeKind::CatchClause);
        if let Some(param) = &clause.param {
            node = node.with_child("param", self.binding(&param.pattern));
        }
        node.with_child("body", self.block_from(&clause.body.body))
            .into_ref()
    }

    fn var_decl(&self, decl: &ast::VariableDeclaration<'_>) -> NodeRef {
        let declarations = decl
            .declarations
            .iter()
            .map(|d| {
                let mut node =
                    Node::new(NodeKind::VariableDeclarator).with_child("id", self.binding(&d.id));
                if let Some(init) = &d.init {
                    node = node.with_child("init", self.expr(init));
                }
                node.into_ref()
            })
            .collect();
        Node::new(NodeKind::VariableDeclaration)
            .with_scalar("kind", Scalar::Str(decl.kind.as_str().to_owned()))
            .with_children("declarations", declarations)
            .into_ref()
    }

    fn binding(&self, pattern: &ast::BindingPattern<'_>) -> NodeRef {
        match pattern {
            ast::BindingPattern::BindingIdentifier(id) => identifier(id.name.as_str()),
            other => self.raw(other.span()),
        }
    }

    fn function(&self, func: &ast::Function<'_>, kind: NodeKind) -> NodeRef {
        if func.generator || func.r#async {
            return self.raw(func.span);
        }
        let Some(body) = &func.body else {
            return self.raw(func.span);
        };
        let mut node = Node::new(kind);
        if let Some(id) = &func.id {
            node = node.with_child("id", identifier(id.name.as_str()));
        }
        node.with_children("params", self.params(&func.params))
            .with_child("body", self.function_body(body))
            .into_ref()
    }

    fn params(&self, params: &ast::FormalParameters<'_>) -> Vec<NodeRef> {
        let mut out: Vec<NodeRef> = params
            .items
            .iter()
            .map(|param| self.binding(&param.pattern))
            .collect();
        if let Some(rest) = &params.rest {
            out.push(self.raw(rest.span));
        }
        out
    }

    fn function_body(&self, body: &ast::FunctionBody<'_>) -> NodeRef {
        let mut stmts = Vec::with_capacity(body.directives.len() + body.statements.len());
        for directive in &body.directives {
            stmts.push(self.directive(directive));
        }
        for stmt in &body.statements {
            stmts.push(self.stmt(stmt));
        }
        Node::new(NodeKind::BlockStatement)
            .with_children("body", stmts)
            .into_ref()
    }

    fn string_literal(&self, lit: &ast::StringLiteral<'_>) -> NodeRef {
        let mut node =
            Node::new(NodeKind::Literal).with_scalar("value", Scalar::Str(lit.value.to_string()));
        if let Some(raw) = &lit.raw {
            node = node.with_scalar("raw", Scalar::Str(raw.to_string()));
        }
        node.into_ref()
    }

    fn expr(&self, expr: &ast::Expression<'_>) -> NodeRef {
        match expr {
            ast::Expression::BooleanLiteral(lit) => Node::new(NodeKind::Literal)
                .with_scalar("value", Scalar::Bool(lit.value))
                .into_ref(),
            ast::Expression::NullLiteral(_) => Node::new(NodeKind::Literal)
                .with_scalar("value", Scalar::Null)
                .into_ref(),
            ast::Expression::NumericLiteral(lit) => {
                let mut node =
                    Node::new(NodeKind::Literal).with_scalar("value", Scalar::Num(lit.value));
                if let Some(raw) = &lit.raw {
                    node = node.with_scalar("raw", Scalar::Str(raw.to_string()));
                }
                node.into_ref()
            }
            ast::Expression::StringLiteral(lit) => self.string_literal(lit),
            ast::Expression::Identifier(id) => identifier(id.name.as_str()),
            ast::Expression::ThisExpression(_) => Node::new(NodeKind::ThisExpression).into_ref(),
            ast::Expression::ArrayExpression(array) => self.array(array),
            ast::Expression::ObjectExpression(object) => self.object(object),
            ast::Expression::FunctionExpression(func) => {
                self.function(func, NodeKind::FunctionExpression)
            }
            ast::Expression::ArrowFunctionExpression(arrow) => self.arrow(arrow),
            ast::Expression::ParenthesizedExpression(inner) => self.expr(&inner.expression),
            ast::Expression::SequenceExpression(seq) => {
                let expressions = seq.expressions.iter().map(|e| self.expr(e)).collect();
                Node::new(NodeKind::SequenceExpression)
                    .with_children("expressions", expressions)
                    .into_ref()
            }
            ast::Expression::CallExpression(call) => {
                if call.optional {
                    return self.raw(call.span);
                }
                Node::new(NodeKind::CallExpression)
                    .with_child("callee", self.expr(&call.callee))
                    .with_children("arguments", self.arguments(&call.arguments))
                    .into_ref()
            }
            ast::Expression::NewExpression(new) => Node::new(NodeKind::NewExpression)
                .with_child("callee", self.expr(&new.callee))
                .with_children("arguments", self.arguments(&new.arguments))
                .into_ref(),
            ast::Expression::StaticMemberExpression(member) => {
                if member.optional {
                    return self.raw(member.span);
                }
                Node::new(NodeKind::MemberExpression)
                    .with_child("object", self.expr(&member.object))
                    .with_child("property", identifier(member.property.name.as_str()))
                    .with_scalar("computed", Scalar::Bool(false))
                    .into_ref()
            }
            ast::Expression::ComputedMemberExpression(member) => {
                if member.optional {
                    return self.raw(member.span);
                }
                Node::new(NodeKind::MemberExpression)
                    .with_child("object", self.expr(&member.object))
                    .with_child("property", self.expr(&member.expression))
                    .with_scalar("computed", Scalar::Bool(true))
                    .into_ref()
            }
            ast::Expression::BinaryExpression(bin) => Node::new(NodeKind::BinaryExpression)
                .with_scalar("operator", Scalar::Str(bin.operator.as_str().to_owned()))
                .with_child("left", self.expr(&bin.left))
                .with_child("right", self.expr(&bin.right))
                .into_ref(),
            ast::Expression::LogicalExpression(logical) => Node::new(NodeKind::LogicalExpression)
                .with_scalar("operator", Scalar::Str(logical.operator.as_str().to_owned()))
                .with_child("left", self.expr(&logical.left))
                .with_child("right", self.expr(&logical.right))
                .into_ref(),
            ast::Expression::UnaryExpression(unary) => Node::new(NodeKind::UnaryExpression)
                .with_scalar("operator", Scalar::Str(unary.operator.as_str().to_owned()))
                .with_child("argument", self.expr(&unary.argument))
                .into_ref(),
            ast::Expression::UpdateExpression(update) => {
                let Some(argument) = self.simple_target(&update.argument) else {
                    return self.raw(update.span);
                };
                Node::new(NodeKind::UpdateExpression)
                    .with_scalar("operator", Scalar::Str(update.operator.as_str().to_owned()))
                    .with_scalar("prefix", Scalar::Bool(update.prefix))
                    .with_child("argument", argument)
                    .into_ref()
            }
            ast::Expression::AssignmentExpression(assign) => {
                let Some(left) = self.assignment_target(&assign.left) else {
                    return self.raw(assign.span);
                };
                Node::new(NodeKind::AssignmentExpression)
                    .with_scalar("operator", Scalar::Str(assign.operator.as_str().to_owned()))
                    .with_child("left", left)
                    .with_child("right", self.expr(&assign.right))
                    .into_ref()
            }
            ast::Expression::ConditionalExpression(cond) => {
                Node::new(NodeKind::ConditionalExpression)
                    .with_child("test", self.expr(&cond.test))
                    .with_child("consequent", self.expr(&cond.consequent))
                    .with_child("alternate", self.expr(&cond.alternate))
                    .into_ref()
            }
            _ => self.raw(expr.span()),
        }
    }

    fn array(&self, array: &ast::ArrayExpression<'_>) -> NodeRef {
        // sparse arrays have no faithful rendering here, so they stay raw
        if array
            .elements
            .iter()
            .any(|el| matches!(el, ast::ArrayExpressionElement::Elision(_)))
        {
            return self.raw(array.span);
        }
        let elements = array
            .elements
            .iter()
            .map(|el| match el {
                ast::ArrayExpressionElement::SpreadElement(spread) => self.raw(spread.span),
                ast::ArrayExpressionElement::Elision(_) => unreachable!("checked above"),
                match_expression!(ArrayExpressionElement) => self.expr(el.to_expression()),
            })
            .collect();
        Node::new(NodeKind::ArrayExpression)
            .with_children("elements", elements)
            .into_ref()
    }

    fn object(&self, object: &ast::ObjectExpression<'_>) -> NodeRef {
        let properties = object
            .properties
            .iter()
            .map(|prop| match prop {
                ast::ObjectPropertyKind::ObjectProperty(p) => {
                    if p.kind != ast::PropertyKind::Init || p.method {
                        return self.raw(p.span);
                    }
                    let key = match &p.key {
                        ast::PropertyKey::StaticIdentifier(id) => identifier(id.name.as_str()),
                        ast::PropertyKey::PrivateIdentifier(id) => return self.raw(id.span),
                        match_expression!(PropertyKey) => self.expr(p.key.to_expression()),
                    };
                    Node::new(NodeKind::Property)
                        .with_child("key", key)
                        .with_child("value", self.expr(&p.value))
                        .with_scalar("computed", Scalar::Bool(p.computed))
                        .into_ref()
                }
                ast::ObjectPropertyKind::SpreadProperty(spread) => self.raw(spread.span),
            })
            .collect();
        Node::new(NodeKind::ObjectExpression)
            .with_children("properties", properties)
            .into_ref()
    }

    fn arrow(&self, arrow: &ast::ArrowFunctionExpression<'_>) -> NodeRef {
        if arrow.r#async {
            return self.raw(arrow.span);
        }
        let node = Node::new(NodeKind::ArrowFunctionExpression)
            .with_children("params", self.params(&arrow.params));
        if arrow.expression {
            if let Some(ast::Statement::ExpressionStatement(stmt)) = arrow.body.statements.first() {
                return node
                    .with_scalar("expression", Scalar::Bool(true))
                    .with_child("body", self.expr(&stmt.expression))
                    .into_ref();
            }
        }
        node.with_scalar("expression", Scalar::Bool(false))
            .with_child("body", self.function_body(&arrow.body))
            .into_ref()
    }

    fn arguments(&self, arguments: &[ast::Argument<'_>]) -> Vec<NodeRef> {
        arguments
            .iter()
            .map(|arg| match arg {
                ast::Argument::SpreadElement(spread) => self.raw(spread.span),
                match_expression!(Argument) => self.expr(arg.to_expression()),
            })
            .collect()
    }

    fn assignment_target(&self, target: &ast::AssignmentTarget<'_>) -> Option<NodeRef> {
        match target {
            ast::AssignmentTarget::AssignmentTargetIdentifier(id) => {
                Some(identifier(id.name.as_str()))
            }
            ast::AssignmentTarget::StaticMemberExpression(member) if !member.optional => {
                Some(
                    Node::new(NodeKind::MemberExpression)
                        .with_child("object", self.expr(&member.object))
                        .with_child("property", identifier(member.property.name.as_str()))
                        .with_scalar("computed", Scalar::Bool(false))
                        .into_ref(),
                )
            }
            ast::AssignmentTarget::ComputedMemberExpression(member) if !member.optional => {
                Some(
                    Node::new(NodeKind::MemberExpression)
                        .with_child("object", self.expr(&member.object))
                        .with_child("property", self.expr(&member.expression))
                        .with_scalar("computed", Scalar::Bool(true))
                        .into_ref(),
                )
            }
            _ => None,
        }
    }

    fn simple_target(&self, target: &ast::SimpleAssignmentTarget<'_>) -> Option<NodeRef> {
        match target {
            ast::SimpleAssignmentTarget::AssignmentTargetIdentifier(id) => {
                Some(identifier(id.name.as_str()))
            }
            ast::SimpleAssignmentTarget::StaticMemberExpression(member) if !member.optional => {
                Some(
                    Node::new(NodeKind::MemberExpression)
                        .with_child("object", self.expr(&member.object))
                        .with_child("property", identifier(member.property.name.as_str()))
                        .with_scalar("computed", Scalar::Bool(false))
                        .into_ref(),
                )
            }
            ast::SimpleAssignmentTarget::ComputedMemberExpression(member) if !member.optional => {
                Some(
                    Node::new(NodeKind::MemberExpression)
                        .with_child("object", self.expr(&member.object))
                        .with_child("property", self.expr(&member.expression))
                        .with_scalar("computed", Scalar::Bool(true))
                        .into_ref(),
                )
            }
            _ => None,
        }
    }
}
