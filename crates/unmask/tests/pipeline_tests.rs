//! End-to-end tests for the deobfuscation pipeline.
//!
//! Static scenarios run with default options; scenarios that need the
//! sandboxed contextual resolver opt into the dynamic pass.

use unmask::{Deobfuscator, Options, Outcome, ParseMode};

fn clean(src: &str) -> Outcome {
    Deobfuscator::new(Options::default())
        .run(src)
        .expect("static pipeline must succeed")
}

fn clean_dynamic(src: &str) -> Outcome {
    let options = Options {
        dynamic: true,
        ..Options::default()
    };
    Deobfuscator::new(options)
        .run(src)
        .expect("dynamic pipeline must succeed")
}

// =============================================================================
// 1. Whole-program scenarios
// =============================================================================

/// A two-element table is below the finder's threshold, so recovering the
/// payload takes the dynamic pass: prime, resolve `f(0)` / `f(1)`, fold the
/// concatenation, then eliminate the scaffolding.
#[test]
fn accessor_scaffolding_collapses_to_the_payload() {
    let outcome = clean_dynamic(concat!(
        "var a = [\"Hello\", \"World\"];",
        "function f(i) { return a[i]; }",
        "console.log(f(0) + \" \" + f(1));",
    ));
    assert!(
        outcome.code.contains("console.log(\"Hello World\");"),
        "got: {}",
        outcome.code
    );
    assert!(!outcome.code.contains("var a"), "table must be removed: {}", outcome.code);
    assert!(!outcome.code.contains("function"), "accessor must be removed: {}", outcome.code);
}

/// A bigger table is found statically: accessor calls and indexed reads
/// inline without any sandbox.
#[test]
fn string_table_inlines_statically() {
    let outcome = clean(concat!(
        "var table1 = [\"alpha\", \"beta\", \"gamma\"];",
        "function pick1(i) { return table1[i]; }",
        "console.log(pick1(0) + \"-\" + pick1(2));",
    ));
    assert!(
        outcome.code.contains("console.log(\"alpha-gamma\");"),
        "got: {}",
        outcome.code
    );
    assert!(!outcome.code.contains("table1"), "got: {}", outcome.code);
    assert_eq!(outcome.report.strings_inlined, 2);
    assert_eq!(outcome.report.top_indices, vec![(0, 1), (2, 1)]);
}

#[test]
fn literal_if_test_keeps_only_the_taken_branch() {
    let outcome = clean("if (true) { x = 1; } else { x = 2; }");
    assert_eq!(outcome.code, "x = 1;\n");
    assert_eq!(outcome.report.if_branches_removed, 1);
}

/// Hex-tagged declarations rename, the constant sum folds, and the
/// then-dead constants fall to the census (census soundness outranks
/// keeping them around).
#[test]
fn renamed_constants_fold_and_then_die() {
    let outcome = clean("var _0x1a = 1, _0x1b = 2;var s = _0x1a + _0x1b;console.log(s);");
    assert!(!outcome.code.contains("_0x"), "got: {}", outcome.code);
    assert!(outcome.code.contains("= 3;"), "sum must fold: {}", outcome.code);
    assert!(outcome.report.variables_renamed >= 3);
    assert!(outcome.report.symbols_removed >= 2);
}

#[test]
fn unused_declaration_with_plain_initializer_is_removed() {
    let outcome = clean("var u = unused;keep1();");
    assert_eq!(outcome.code, "keep1();\n");
    assert!(outcome.report.symbols_removed >= 1);
}

#[test]
fn typeof_comparison_folds_to_true() {
    let outcome = clean("typeof \"x\" === \"string\";");
    assert_eq!(outcome.code, "true;\n");
}

#[test]
fn folded_string_key_becomes_dotted_access() {
    let outcome = clean("obj[\"a\" + \"b\"];");
    assert_eq!(outcome.code, "obj.ab;\n");
}

// =============================================================================
// 2. Properties
// =============================================================================

/// Running the pipeline on its own output changes nothing.
#[test]
fn pipeline_is_idempotent_on_its_own_output() {
    let src = concat!(
        "var _0xa = 1, _0xb = 2;",
        "if (false) { dead1(); }",
        "var s1 = _0xa + _0xb;",
        "console.log(s1);",
    );
    let once = clean(src);
    let twice = clean(&once.code);
    assert_eq!(once.code, twice.code, "second run must be a fixpoint");
}

/// A removal cascade (each declaration only feeding the next dead one)
/// converges inside the iteration cap.
#[test]
fn elimination_cascades_to_a_fixpoint() {
    let outcome = clean(concat!(
        "var a1 = 1;",
        "var b1 = a1;",
        "var c1 = b1;",
        "var d1 = c1;",
        "keep1();",
    ));
    assert_eq!(outcome.code, "keep1();\n");
    assert_eq!(outcome.report.symbols_removed, 4);
}

/// Declarators whose initializer is a call survive elimination even when
/// nothing reads them.
#[test]
fn call_initializers_are_preserved_as_side_effects() {
    let outcome = clean("var token1 = fetchToken1();done1();");
    assert!(
        outcome.code.contains("var token1 = fetchToken1();"),
        "got: {}",
        outcome.code
    );
    assert_eq!(outcome.report.symbols_removed, 0);
}

/// After convergence, every retained non-reserved identifier is referenced
/// at least once.
#[test]
fn census_is_sound_after_elimination() {
    let outcome = clean(concat!(
        "var _0xa = [\"x1\", \"y1\", \"z1\"];",
        "function helper1(i) { return _0xa[i]; }",
        "var keep1 = helper1(1);",
        "console.log(keep1);",
    ));
    let program = unmask::parse::parse_program(&outcome.code).expect("output must parse");
    let counts = unmask::passes::census::count_usages(&program);

    struct DeclScan {
        declared: Vec<String>,
    }
    impl unmask::walk::Visitor for DeclScan {
        fn visit(&mut self, node: &unmask::nodes::NodeRef) {
            if unmask::nodes::kind_of(node) == unmask::nodes::NodeKind::VariableDeclarator {
                let id = node.borrow().child("id");
                if let Some(id) = id {
                    if let Some(name) = id.borrow().string("name") {
                        self.declared.push(name);
                    }
                }
            }
            unmask::walk::visit_children(self, node);
        }
    }
    let mut scan = DeclScan { declared: vec![] };
    unmask::walk::visit(&mut scan, &program);
    for name in scan.declared {
        assert!(
            counts.get(&name).copied().unwrap_or(0) >= 1,
            "retained declaration `{name}` is unreferenced in: {}",
            outcome.code
        );
    }
}

/// Literals that are not part of the string table or dead code survive with
/// their values intact.
#[test]
fn unrelated_literals_are_preserved() {
    let outcome = clean("send1(\"payload\", 42, true, null);");
    assert!(outcome.code.contains("\"payload\""), "got: {}", outcome.code);
    assert!(outcome.code.contains("42"), "got: {}", outcome.code);
    assert!(outcome.code.contains("true"), "got: {}", outcome.code);
    assert!(outcome.code.contains("null"), "got: {}", outcome.code);
}

// =============================================================================
// 3. Options and error modes
// =============================================================================

#[test]
fn strict_mode_fails_on_unparsable_input() {
    let result = Deobfuscator::new(Options::default()).run(")(");
    assert!(result.is_err(), "strict mode must surface the parse failure");
}

#[test]
fn lenient_mode_returns_the_input_verbatim() {
    let options = Options {
        parse_mode: ParseMode::Lenient,
        ..Options::default()
    };
    let outcome = Deobfuscator::new(options)
        .run(")(")
        .expect("lenient mode must not fail");
    assert_eq!(outcome.code, ")(");
    assert_eq!(outcome.report.symbols_removed, 0);
}

#[test]
fn annotation_prepends_the_report_comment() {
    let options = Options {
        annotate: true,
        ..Options::default()
    };
    let outcome = Deobfuscator::new(options)
        .run("if (true) { x = 1; }")
        .expect("pipeline must succeed");
    assert!(outcome.code.starts_with("/*\n * deobfuscation report"), "got: {}", outcome.code);
    assert!(outcome.code.contains("dead if-branches removed: 1"));
    assert!(outcome.code.trim_end().ends_with("x = 1;"), "got: {}", outcome.code);
}

#[test]
fn reference_counts_are_sorted_by_name() {
    let outcome = clean("zebra1();alpha1();zebra1();");
    let names: Vec<&str> = outcome
        .report
        .reference_counts
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
    assert!(outcome.report.reference_counts.contains(&("zebra1".to_owned(), 2)));
}
