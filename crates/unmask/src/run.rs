//! Public interface for running the deobfuscation pipeline.

use std::fmt;

use crate::{
    codegen::generate,
    parse::{ParseError, parse_program},
    passes::{
        census::count_usages,
        finder::find_string_table,
        prune::Pruner,
        rename::{Renamer, collect_raw_names},
        resolve::ContextualResolver,
        simplify::simplify_program,
        strings::TableInliner,
    },
    report::Report,
    sandbox::SandboxLimits,
    walk,
};

/// Upper bound on census → eliminate → regenerate iterations. The loop
/// almost always converges in two or three; the cap only guards pathological
/// trees.
const MAX_PRUNE_ITERATIONS: usize = 16;

/// What to do when the source cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ParseMode {
    /// Fail the run with [`UnmaskError::Parse`].
    Strict,
    /// Return the input verbatim, with an empty report.
    Lenient,
}

/// Pipeline configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Options {
    /// Run the sandboxed contextual resolver. Off by default: evaluating
    /// hostile input, even sandboxed, is something callers opt into.
    pub dynamic: bool,
    /// Resource caps for the sandbox when the dynamic pass runs.
    pub limits: SandboxLimits,
    /// Parse failure behavior.
    pub parse_mode: ParseMode,
    /// Prepend the cleanup report as a leading block comment.
    pub annotate: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dynamic: false,
            limits: SandboxLimits::default(),
            parse_mode: ParseMode::Strict,
            annotate: false,
        }
    }
}

/// Error surface of the pipeline. Everything except a parse failure is
/// handled locally inside the passes.
#[derive(Debug, Clone)]
pub enum UnmaskError {
    Parse(ParseError),
}

impl fmt::Display for UnmaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for UnmaskError {}

impl From<ParseError> for UnmaskError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

/// Result of one deobfuscation.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The cleaned source, annotated when the options ask for it.
    pub code: String,
    /// What the pipeline did.
    pub report: Report,
}

/// The deobfuscation pipeline.
///
/// Pass order matters and is fixed: the contextual resolver (when enabled)
/// runs before the renamer, which would otherwise rename the identifiers
/// the sandbox knows; string-array inlining precedes simplification so
/// inlined literals participate in folding; the elimination loop runs last.
///
/// # Example
/// ```
/// use unmask::{Deobfuscator, Options};
///
/// let deobfuscator = Deobfuscator::new(Options::default());
/// let outcome = deobfuscator.run("if (true) { x = 1; } else { x = 2; }").unwrap();
/// assert_eq!(outcome.code, "x = 1;\n");
/// ```
#[derive(Debug, Clone)]
pub struct Deobfuscator {
    options: Options,
}

impl Deobfuscator {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Runs the whole pipeline over `source`.
    ///
    /// # Errors
    /// Returns [`UnmaskError::Parse`] in strict mode when the source cannot
    /// be parsed; lenient mode returns the input verbatim instead.
    pub fn run(&self, source: &str) -> Result<Outcome, UnmaskError> {
        let program = match parse_program(source) {
            Ok(program) => program,
            Err(err) => match self.options.parse_mode {
                ParseMode::Strict => return Err(err.into()),
                ParseMode::Lenient => {
                    log::warn!("returning input unchanged: {err}");
                    return Ok(Outcome {
                        code: source.to_owned(),
                        report: Report::default(),
                    });
                }
            },
        };

        let mut report = Report::default();

        // dynamic pass first: the sandbox lives exactly this long
        if self.options.dynamic {
            let mut resolver = ContextualResolver::with_boa(self.options.limits.clone());
            resolver.prime(&program);
            walk::rewrite_tree(&mut resolver, &program);
            report.calls_resolved = resolver.calls_resolved + resolver.members_resolved;
        }

        if let Some(facts) = find_string_table(&program) {
            let mut inliner = TableInliner::new(&facts);
            walk::rewrite_tree(&mut inliner, &program);
            report.strings_inlined = inliner.inlined;
            report.top_indices = inliner.top_indices(5);
        }

        let raw_names = collect_raw_names(&program);
        let mut renamer = Renamer::new(raw_names);
        walk::visit(&mut renamer, &program);
        report.variables_renamed = renamer.renamed;

        report.expressions_simplified = simplify_program(&program);

        // census → eliminate → regenerate until the printed form settles
        let mut printed = generate(&program);
        for iteration in 0..MAX_PRUNE_ITERATIONS {
            let counts = count_usages(&program);
            let mut pruner = Pruner::new(&counts);
            walk::rewrite_tree(&mut pruner, &program);
            report.if_branches_removed += pruner.branches_removed;
            report.symbols_removed += pruner.symbols_removed;
            let current = generate(&program);
            if current == printed {
                log::debug!("elimination converged after {} iteration(s)", iteration + 1);
                break;
            }
            printed = current;
        }

        let mut counts: Vec<(String, u64)> = count_usages(&program).into_iter().collect();
        counts.sort_by(|a, b| a.0.cmp(&b.0));
        report.reference_counts = counts;

        let code = if self.options.annotate {
            let mut annotated = report.as_comment();
            annotated.push_str(&printed);
            annotated
        } else {
            printed
        };
        Ok(Outcome { code, report })
    }
}
