//! Sandboxed JavaScript evaluation for the contextual resolver.
//!
//! The resolver only needs one operation — evaluate a source fragment and
//! classify the result — so that is the whole [`Sandbox`] trait. The
//! production implementation wraps a `boa_engine` context with its globals
//! isolated per instance and its work bounded by [`SandboxLimits`]: the
//! engine's loop-iteration, recursion and stack caps bound runaway
//! evaluations up front, and the wall-clock budget is checked per call.
//! Obfuscated input is hostile by assumption; the sandbox has no host
//! hooks, no filesystem and no network.
//!
//! One sandbox is owned by one pipeline run. Dropping the resolver drops
//! the context on every exit path, including failures.

use std::{
    fmt,
    time::{Duration, Instant},
};

use boa_engine::{Context, Source};

/// Resource caps for sandbox evaluation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SandboxLimits {
    /// Wall-clock budget for a single resolution call.
    pub call_budget: Duration,
    /// Wall-clock budget for the priming evaluation of the whole prelude.
    pub priming_budget: Duration,
    /// Engine loop-iteration cap per evaluation.
    pub loop_iteration_limit: u64,
    /// Engine recursion cap per evaluation.
    pub recursion_limit: usize,
    /// Engine value-stack cap per evaluation.
    pub stack_size_limit: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            call_budget: Duration::from_millis(500),
            priming_budget: Duration::from_secs(10),
            loop_iteration_limit: 4_194_304,
            recursion_limit: 512,
            stack_size_limit: 1_048_576,
        }
    }
}

/// Error raised by a sandbox evaluation.
#[derive(Debug, Clone)]
pub enum SandboxError {
    /// Priming the context failed; the dynamic pass is disabled.
    Init(String),
    /// A single evaluation threw; the offending node stays unchanged.
    Eval(String),
    /// An evaluation exceeded its wall-clock budget.
    Timeout { budget: Duration, elapsed: Duration },
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(message) => write!(f, "sandbox initialization failed: {message}"),
            Self::Eval(message) => write!(f, "sandbox evaluation failed: {message}"),
            Self::Timeout { budget, elapsed } => {
                write!(f, "sandbox budget exceeded: {elapsed:?} > {budget:?}")
            }
        }
    }
}

impl std::error::Error for SandboxError {}

/// Classified result of a sandbox evaluation. Only primitive results are
/// ever inlined back into the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Str(String),
    Num(f64),
    Bool(bool),
    /// Objects, functions, undefined — nothing the resolver can inline.
    Other,
}

/// Trait seam over the evaluator, so the resolver can be driven by a fake
/// in tests.
pub trait Sandbox {
    /// Evaluates `code` within `budget` and classifies the result.
    fn eval(&mut self, code: &str, budget: Duration) -> Result<Evaluated, SandboxError>;
}

/// The production sandbox: one isolated `boa_engine` context.
pub struct BoaSandbox {
    context: Context,
}

impl fmt::Debug for BoaSandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoaSandbox").finish_non_exhaustive()
    }
}

impl BoaSandbox {
    /// Creates a fresh context with the given caps applied.
    #[must_use]
    pub fn new(limits: &SandboxLimits) -> Self {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(limits.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(limits.recursion_limit);
        context
            .runtime_limits_mut()
            .set_stack_size_limit(limits.stack_size_limit);
        Self { context }
    }
}

impl Sandbox for BoaSandbox {
    fn eval(&mut self, code: &str, budget: Duration) -> Result<Evaluated, SandboxError> {
        let start = Instant::now();
        let result = self.context.eval(Source::from_bytes(code));
        let elapsed = start.elapsed();
        if elapsed > budget {
            // the engine cannot be preempted mid-evaluation; an overrun
            // still fails the call so nothing slow gets trusted
            return Err(SandboxError::Timeout { budget, elapsed });
        }
        let value = result.map_err(|err| SandboxError::Eval(err.to_string()))?;
        if let Some(b) = value.as_boolean() {
            return Ok(Evaluated::Bool(b));
        }
        if let Some(n) = value.as_number() {
            return Ok(Evaluated::Num(n));
        }
        if let Some(s) = value.as_string() {
            return Ok(Evaluated::Str(s.to_std_string_escaped()));
        }
        Ok(Evaluated::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(sandbox: &mut BoaSandbox, code: &str) -> Evaluated {
        sandbox
            .eval(code, Duration::from_secs(5))
            .expect("evaluation must succeed")
    }

    #[test]
    fn primitives_classify_by_type() {
        let mut sandbox = BoaSandbox::new(&SandboxLimits::default());
        assert_eq!(eval(&mut sandbox, "1 + 2"), Evaluated::Num(3.0));
        assert_eq!(
            eval(&mut sandbox, "'a' + 'b'"),
            Evaluated::Str("ab".to_owned())
        );
        assert_eq!(eval(&mut sandbox, "1 < 2"), Evaluated::Bool(true));
        assert_eq!(eval(&mut sandbox, "({})"), Evaluated::Other);
    }

    #[test]
    fn state_persists_between_evaluations() {
        let mut sandbox = BoaSandbox::new(&SandboxLimits::default());
        eval(&mut sandbox, "function f(x) { return x * 2; }");
        assert_eq!(eval(&mut sandbox, "f(21)"), Evaluated::Num(42.0));
    }

    #[test]
    fn globals_are_isolated_per_instance() {
        let mut first = BoaSandbox::new(&SandboxLimits::default());
        eval(&mut first, "var leak = 1;");
        let mut second = BoaSandbox::new(&SandboxLimits::default());
        let result = second.eval("leak", Duration::from_secs(5));
        assert!(result.is_err(), "fresh context must not see old globals");
    }

    #[test]
    fn throwing_code_reports_eval_failure() {
        let mut sandbox = BoaSandbox::new(&SandboxLimits::default());
        let result = sandbox.eval("missing()", Duration::from_secs(5));
        assert!(matches!(result, Err(SandboxError::Eval(_))));
    }
}
