//! Grammar construction, validation and inheritance

use grove::{Expr, GrammarBuilder, GrammarError, ParseError, ScannerlessParser};
use std::sync::Arc;

fn base() -> Arc<grove::Grammar> {
    GrammarBuilder::new("lang", "Values")
        .skip_rule("WS", Expr::pattern(r"\s+"))
        .rule(
            "list",
            Expr::concatenation([
                Expr::literal("["),
                Expr::separated_list(0, None, ",", Expr::non_terminal("value")),
                Expr::literal("]"),
            ]),
        )
        .rule("value", Expr::choice([Expr::non_terminal("number"), Expr::literal("null")]))
        .rule("number", Expr::pattern("[0-9]+"))
        .build()
        .expect("valid base grammar")
}

#[test]
fn test_build_rejects_malformed_rules() {
    let duplicate = GrammarBuilder::new("test", "Dup")
        .rule("a", Expr::literal("a"))
        .rule("a", Expr::literal("b"))
        .build();
    assert!(matches!(duplicate, Err(GrammarError::DuplicateRule { ref name, .. }) if name == "a"));

    let empty = GrammarBuilder::new("test", "Empty")
        .rule("a", Expr::concatenation(Vec::<Expr>::new()))
        .build();
    assert!(matches!(empty, Err(GrammarError::EmptyConcatenation { .. })));

    let bounds = GrammarBuilder::new("test", "Bounds")
        .rule("a", Expr::multi(3, Some(1), Expr::literal("a")))
        .build();
    assert!(matches!(
        bounds,
        Err(GrammarError::InvalidMultiplicity { min: 3, max: 1, .. })
    ));

    let literal = GrammarBuilder::new("test", "Literal")
        .rule("a", Expr::literal(""))
        .build();
    assert!(matches!(literal, Err(GrammarError::EmptyLiteral { .. })));
}

#[test]
fn test_compile_errors() {
    let unresolved = GrammarBuilder::new("test", "Unresolved")
        .rule("a", Expr::non_terminal("missing"))
        .build()
        .expect("shape is valid");
    assert!(matches!(
        ScannerlessParser::new(&unresolved),
        Err(GrammarError::RuleNotFound { ref name, .. }) if name == "missing"
    ));

    let pattern = GrammarBuilder::new("test", "Pattern")
        .rule("a", Expr::pattern("[unclosed"))
        .build()
        .expect("shape is valid");
    assert!(matches!(
        ScannerlessParser::new(&pattern),
        Err(GrammarError::InvalidPattern { .. })
    ));
}

#[test]
fn test_inherited_rules_parse() {
    let derived = GrammarBuilder::new("lang", "More")
        .extends(base())
        .rule("pair", Expr::concatenation([Expr::non_terminal("value"), Expr::literal(":"), Expr::non_terminal("value")]))
        .build()
        .expect("valid derived grammar");
    let parser = ScannerlessParser::new(&derived).expect("compiles");

    let tree = parser.parse("pair", "1 : null").expect("parses");
    assert_eq!(tree.reconstruct_text(), "1 : null");
    assert!(parser.parse("list", "[1, 2, null]").is_ok());
}

#[test]
fn test_override_changes_inherited_references() {
    let parent = base();
    let derived = GrammarBuilder::new("lang", "Decimals")
        .extends(Arc::clone(&parent))
        .rule("number", Expr::pattern(r"[0-9]+\.[0-9]+"))
        .build()
        .expect("valid derived grammar");

    let base_parser = ScannerlessParser::new(&parent).expect("compiles");
    let derived_parser = ScannerlessParser::new(&derived).expect("compiles");

    assert!(base_parser.parse("list", "[1, 2]").is_ok());
    assert!(derived_parser.parse("list", "[1, 2]").is_err());
    assert!(derived_parser.parse("list", "[1.5, null]").is_ok());
    assert!(base_parser.parse("list", "[1.5]").is_err());
}

#[test]
fn test_rule_lookup_through_extends() {
    let parent = base();
    let derived = GrammarBuilder::new("lang", "Child")
        .extends(Arc::clone(&parent))
        .rule("value", Expr::literal("true"))
        .build()
        .expect("valid derived grammar");

    assert_eq!(derived.qualified_name(), "lang.Child");
    assert!(derived.find_rule("number").is_err());
    let number = derived.find_all_rule("number").expect("inherited");
    assert_eq!(number.grammar().qualified_name(), "lang.Values");
    let value = derived.find_all_rule("value").expect("local override");
    assert_eq!(value.grammar().qualified_name(), "lang.Child");
    assert_eq!(derived.all_skip_rules().len(), 1);
}

#[test]
fn test_rule_set_is_cached_and_shared() {
    let grammar = base();
    let first = grammar.runtime_rule_set().expect("compiles");
    let second = grammar.runtime_rule_set().expect("compiles");
    assert!(Arc::ptr_eq(&first, &second));

    let parser = ScannerlessParser::new(&grammar).expect("compiles");
    assert!(Arc::ptr_eq(parser.rule_set(), &first));
    assert_eq!(first.skip_rules().len(), 1);
}

#[test]
fn test_goal_from_parent_only_grammar() {
    let parser = ScannerlessParser::new(&base()).expect("compiles");
    let error = parser.parse("pair", "1:1").expect_err("pair is not declared here");
    assert!(matches!(error, ParseError::Grammar(GrammarError::RuleNotFound { .. })));
}
