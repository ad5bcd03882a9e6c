//! The cleanup report: what the pipeline did to a program.

use std::fmt::Write as _;

/// Statistics collected across one deobfuscation.
///
/// Rendered as a leading block comment with [`Report::as_comment`] when
/// annotation is on, and serializable for callers that want the numbers.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Report {
    /// Identifiers given canonical `var_<n>` names.
    pub variables_renamed: usize,
    /// Expressions folded or rewritten by the simplifier.
    pub expressions_simplified: usize,
    /// `if` statements collapsed because their test was a literal.
    pub if_branches_removed: usize,
    /// Unused functions and declarators removed.
    pub symbols_removed: usize,
    /// Calls the sandbox resolved to literals.
    pub calls_resolved: usize,
    /// String-table lookups inlined.
    pub strings_inlined: usize,
    /// Reference count per retained name, sorted by name.
    pub reference_counts: Vec<(String, u64)>,
    /// The five most-used string-table indices, best first.
    pub top_indices: Vec<(usize, u64)>,
}

impl Report {
    /// Renders the report as the leading block comment described by the
    /// output contract.
    #[must_use]
    pub fn as_comment(&self) -> String {
        let mut out = String::new();
        out.push_str("/*\n * deobfuscation report\n");
        let _ = writeln!(out, " * variables renamed:       {}", self.variables_renamed);
        let _ = writeln!(out, " * expressions simplified:  {}", self.expressions_simplified);
        let _ = writeln!(out, " * dead if-branches removed: {}", self.if_branches_removed);
        let _ = writeln!(out, " * unused symbols removed:  {}", self.symbols_removed);
        if self.calls_resolved > 0 {
            let _ = writeln!(out, " * sandbox calls resolved:  {}", self.calls_resolved);
        }
        if self.strings_inlined > 0 {
            let _ = writeln!(out, " * string lookups inlined:  {}", self.strings_inlined);
        }
        if !self.reference_counts.is_empty() {
            out.push_str(" * reference counts:\n");
            for (name, count) in &self.reference_counts {
                let _ = writeln!(out, " *   {name}: {count}");
            }
        }
        if !self.top_indices.is_empty() {
            out.push_str(" * top string-table indices:\n");
            for (index, count) in &self.top_indices {
                let _ = writeln!(out, " *   #{index}: {count} use(s)");
            }
        }
        out.push_str(" */\n");
        out
    }

    /// JSON rendering of the raw numbers.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_lists_the_core_fields() {
        let report = Report {
            variables_renamed: 3,
            if_branches_removed: 1,
            reference_counts: vec![("console".to_owned(), 2)],
            top_indices: vec![(4, 12)],
            ..Report::default()
        };
        let comment = report.as_comment();
        assert!(comment.starts_with("/*"));
        assert!(comment.contains("variables renamed:       3"));
        assert!(comment.contains("dead if-branches removed: 1"));
        assert!(comment.contains("console: 2"));
        assert!(comment.contains("#4: 12 use(s)"));
        assert!(comment.trim_end().ends_with("*/"));
    }

    #[test]
    fn json_round_trips_the_numbers() {
        let report = Report {
            symbols_removed: 5,
            ..Report::default()
        };
        let json = report.to_json();
        assert!(json.contains("\"symbols_removed\": 5"), "got: {json}");
    }
}
