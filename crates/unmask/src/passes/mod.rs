//! The deobfuscation passes, one module each.
//!
//! Static passes: [`finder`] locates the string table, [`strings`] inlines
//! its lookups, [`rename`] canonicalizes identifiers, [`simplify`] folds
//! constants, [`census`] counts identifier uses and [`prune`] removes what
//! the census proved dead. The dynamic pass, [`resolve`], evaluates
//! suspicious calls in a sandbox after priming the obfuscated prelude.

use std::sync::LazyLock;

use regex::Regex;

pub mod census;
pub mod finder;
pub mod prune;
pub mod rename;
pub mod resolve;
pub mod simplify;
pub mod strings;

/// Identifier-shaped tokens, used to scan `Raw` segments conservatively.
pub(crate) static IDENT_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("pattern is valid"));

/// Host-provided identifiers that are never renamed away or removed.
pub const RESERVED_GLOBALS: [&str; 9] = [
    "console", "window", "document", "Array", "Object", "String", "Number", "Boolean", "Function",
];

/// Whether `name` is treated as host-provided.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_GLOBALS.contains(&name)
}
