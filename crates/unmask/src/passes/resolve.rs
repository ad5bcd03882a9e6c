//! Contextual resolution: sandboxed evaluation of selected calls.
//!
//! Some obfuscators install nested decoders only on the first invocation of
//! a wrapper (`if (!g) { g = function () { … }; } …`). A static resolver
//! cannot see those bodies, so this pass runs the obfuscated prelude inside
//! a sandbox instead: it evaluates the program minus its final top-level
//! statement (assumed to be the wrapper call that fires the payload), calls
//! the wrapper once with no arguments to force lazy decoder installation,
//! then restores the tree for the static passes.
//!
//! During traversal, any call whose callee names a sandbox function — and
//! which is not itself a statement's top expression, and not inside a
//! function declaration — is evaluated; primitive results replace the call.
//! `obj[call(…)]` with a string result becomes a dotted access when the
//! string is identifier shaped.
//!
//! Every failure is local: a failed priming disables the pass, a failed
//! evaluation leaves its node unchanged.

use crate::{
    codegen::{generate, quote_string},
    nodes::{Node, NodeKind, NodeRef, Scalar, identifier, kind_of, number},
    sandbox::{BoaSandbox, Evaluated, Sandbox, SandboxError, SandboxLimits},
    walk::{Edit, Rewriter},
};

use super::simplify::IDENT_SHAPE;

/// The dynamic pass. Owns the sandbox for exactly one pipeline run; the
/// context is released when the resolver is dropped, on every exit path.
#[derive(Debug)]
pub struct ContextualResolver<S: Sandbox> {
    sandbox: Option<S>,
    limits: SandboxLimits,
    pub calls_resolved: usize,
    pub members_resolved: usize,
}

impl ContextualResolver<BoaSandbox> {
    /// Creates the resolver with the production sandbox.
    #[must_use]
    pub fn with_boa(limits: SandboxLimits) -> Self {
        let sandbox = BoaSandbox::new(&limits);
        Self::new(sandbox, limits)
    }
}

impl<S: Sandbox> ContextualResolver<S> {
    #[must_use]
    pub fn new(sandbox: S, limits: SandboxLimits) -> Self {
        Self {
            sandbox: Some(sandbox),
            limits,
            calls_resolved: 0,
            members_resolved: 0,
        }
    }

    /// Loads the prelude into the sandbox and fires the wrapper once.
    ///
    /// The final top-level statement is removed, the remainder is evaluated
    /// to define every top-level function, and if the removed statement was
    /// a plain `name(…)` call, `name()` is invoked with no arguments. The
    /// statement is restored afterwards regardless.
    pub fn prime(&mut self, program: &NodeRef) {
        let Some(mut body) = program.borrow().children("body") else {
            self.sandbox = None;
            return;
        };
        let Some(last) = body.pop() else {
            self.sandbox = None;
            return;
        };
        program.borrow_mut().set_children("body", body.clone());
        let prelude = generate(program);
        body.push(last.clone());
        program.borrow_mut().set_children("body", body);

        let wrapper = wrapper_name(&last);
        match self.prime_inner(&prelude, wrapper.as_deref()) {
            Ok(()) => log::info!("sandbox primed"),
            Err(err) => {
                log::warn!("disabling dynamic pass: {err}");
                self.sandbox = None;
            }
        }
    }

    fn prime_inner(&mut self, prelude: &str, wrapper: Option<&str>) -> Result<(), SandboxError> {
        let budget = self.limits.priming_budget;
        let Some(sandbox) = self.sandbox.as_mut() else {
            return Err(SandboxError::Init("no sandbox".to_owned()));
        };
        sandbox
            .eval("var console = { log: function () {} };", budget)
            .and_then(|_| sandbox.eval(prelude, budget))
            .map_err(|err| SandboxError::Init(err.to_string()))?;
        if let Some(wrapper) = wrapper {
            // fires the `if (!g) { g = function … }` blocks that install
            // nested decoders
            sandbox
                .eval(&format!("{wrapper}()"), budget)
                .map_err(|err| SandboxError::Init(err.to_string()))?;
        }
        Ok(())
    }

    /// Whether the node sits lexically inside a function declaration, in
    /// which case its value may depend on parameters and must not be
    /// captured.
    fn inside_function_declaration(node: &NodeRef) -> bool {
        let mut current = node.borrow().parent();
        while let Some(ancestor) = current {
            if kind_of(&ancestor) == NodeKind::FunctionDeclaration {
                return true;
            }
            current = ancestor.borrow().parent();
        }
        false
    }

    fn callee_is_sandbox_function(&mut self, name: &str) -> bool {
        let budget = self.limits.call_budget;
        let Some(sandbox) = self.sandbox.as_mut() else {
            return false;
        };
        matches!(
            sandbox.eval(&format!("typeof {name} === 'function'"), budget),
            Ok(Evaluated::Bool(true))
        )
    }

    fn literal_of(result: Evaluated) -> Option<NodeRef> {
        match result {
            Evaluated::Str(s) => {
                let raw = quote_string(&s);
                Some(
                    Node::new(NodeKind::Literal)
                        .with_scalar("value", Scalar::Str(s))
                        .with_scalar("raw", Scalar::Str(raw))
                        .into_ref(),
                )
            }
            Evaluated::Num(n) => Some(number(n)),
            Evaluated::Bool(b) => Some(crate::nodes::literal(Scalar::Bool(b))),
            Evaluated::Other => None,
        }
    }

    fn resolve_call(&mut self, node: &NodeRef) -> Option<NodeRef> {
        self.sandbox.as_ref()?;
        if Self::inside_function_declaration(node) {
            return None;
        }
        // the payload call itself stays: a call that is the whole statement
        // is being run for effect, not value
        if node
            .borrow()
            .parent()
            .is_some_and(|parent| kind_of(&parent) == NodeKind::ExpressionStatement)
        {
            return None;
        }
        let callee_name = {
            let node = node.borrow();
            let callee = node.child("callee")?;
            let callee = callee.borrow();
            if !callee.is(NodeKind::Identifier) {
                return None;
            }
            callee.string("name")?
        };
        if !self.callee_is_sandbox_function(&callee_name) {
            return None;
        }
        let code = generate(node);
        let budget = self.limits.call_budget;
        let result = self.sandbox.as_mut()?.eval(&code, budget).ok()?;
        let literal = Self::literal_of(result)?;
        log::debug!("resolved `{code}` to {}", generate(&literal));
        self.calls_resolved += 1;
        Some(literal)
    }

    /// `obj[call(…)]` → `obj.name` when the call yields an
    /// identifier-shaped string. Unlike plain call resolution this also
    /// fires inside function declarations, where decoder-keyed member
    /// reads usually live; the property call reaches the sandbox only when
    /// call resolution left it in place.
    fn resolve_member(&mut self, node: &NodeRef) -> bool {
        if self.sandbox.is_none() {
            return false;
        }
        let property = {
            let node = node.borrow();
            if !node.flag("computed") {
                return false;
            }
            let Some(property) = node.child("property") else {
                return false;
            };
            property
        };
        if kind_of(&property) != NodeKind::CallExpression {
            return false;
        }
        let code = generate(&property);
        let budget = self.limits.call_budget;
        let Some(sandbox) = self.sandbox.as_mut() else {
            return false;
        };
        let Ok(Evaluated::Str(name)) = sandbox.eval(&code, budget) else {
            return false;
        };
        if !IDENT_SHAPE.is_match(&name) {
            return false;
        }
        log::debug!("resolved member key `{code}` to `{name}`");
        {
            let mut node = node.borrow_mut();
            node.set_scalar("computed", Scalar::Bool(false));
            node.set_child("property", identifier(&name));
        }
        self.members_resolved += 1;
        true
    }
}

impl<S: Sandbox> Rewriter for ContextualResolver<S> {
    fn rewrite(&mut self, node: NodeRef) -> Edit {
        match kind_of(&node) {
            NodeKind::CallExpression => {
                if let Some(literal) = self.resolve_call(&node) {
                    return Edit::Node(literal);
                }
            }
            NodeKind::MemberExpression => {
                self.resolve_member(&node);
            }
            _ => {}
        }
        Edit::Node(node)
    }
}

fn wrapper_name(stmt: &NodeRef) -> Option<String> {
    let stmt = stmt.borrow();
    if !stmt.is(NodeKind::ExpressionStatement) {
        return None;
    }
    let expression = stmt.child("expression")?;
    let expression = expression.borrow();
    if !expression.is(NodeKind::CallExpression) {
        return None;
    }
    let callee = expression.child("callee")?;
    let callee = callee.borrow();
    if callee.is(NodeKind::Identifier) {
        callee.string("name")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse::parse_program, walk::rewrite_tree};

    fn resolve(src: &str) -> (String, usize) {
        let program = parse_program(src).expect("fixture must parse");
        let mut resolver = ContextualResolver::with_boa(SandboxLimits::default());
        resolver.prime(&program);
        rewrite_tree(&mut resolver, &program);
        (generate(&program), resolver.calls_resolved)
    }

    #[test]
    fn nested_decoders_resolve_after_priming() {
        // the decoder only exists after boot() runs; priming fires it
        let (out, resolved) = resolve(concat!(
            "var d;",
            "function boot() { if (!d) { d = function () { return \"secret\"; }; } }",
            "var go = function () { return d(); };",
            "boot();",
        ));
        assert!(out.contains("return \"secret\";"), "got: {out}");
        assert_eq!(resolved, 1);
    }

    #[test]
    fn calls_outside_functions_resolve_to_literals() {
        let (out, resolved) = resolve(concat!(
            "function dub(n) { return n * 2; }",
            "var r = dub(21);",
            "dub(0);",
        ));
        assert!(out.contains("var r = 42;"), "got: {out}");
        assert_eq!(resolved, 1);
    }

    #[test]
    fn calls_inside_function_declarations_are_skipped() {
        let (out, resolved) = resolve(concat!(
            "function dub(n) { return n * 2; }",
            "function wrap(n) { return dub(n); }",
            "wrap(1);",
        ));
        assert!(out.contains("return dub(n);"), "got: {out}");
        assert_eq!(resolved, 0);
    }

    #[test]
    fn the_payload_statement_itself_is_not_replaced() {
        let (out, _) = resolve(concat!(
            "function fire() { return 1; }",
            "fire();",
        ));
        assert!(out.contains("fire();"), "got: {out}");
    }

    #[test]
    fn member_keys_resolve_to_dotted_access_inside_functions() {
        // call resolution skips the body of a declaration, so the member
        // key is still a call when the member rewrite sees it
        let (out, resolved) = resolve(concat!(
            "function key() { return \"prop\"; }",
            "function reader(obj) { return obj[key()]; }",
            "key();",
        ));
        assert!(out.contains("return obj.prop;"), "got: {out}");
        assert_eq!(resolved, 0);
    }

    #[test]
    fn string_results_inline_with_quotes() {
        let (out, resolved) = resolve(concat!(
            "function s() { return \"hi\"; }",
            "var r = s();",
            "s();",
        ));
        assert!(out.contains("var r = \"hi\";"), "got: {out}");
        assert_eq!(resolved, 1);
    }
}
