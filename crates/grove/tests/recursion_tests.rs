//! Left recursion, cycles and ambiguity in the parse forest

use grove::parser::DEFAULT_MAX_DEPTH;
use grove::{
    AlternativeSelection, Expr, GrammarBuilder, LeafRef, ParseError, ScannerlessParser,
    SppfVisitor,
};
use std::ops::ControlFlow;
use std::sync::Arc;

fn init() {
    let _ = pretty_env_logger::try_init();
}

fn left_recursive() -> Arc<grove::Grammar> {
    GrammarBuilder::new("test", "Left")
        .rule(
            "S",
            Expr::choice([
                Expr::concatenation([Expr::non_terminal("S"), Expr::literal("a")]),
                Expr::literal("a"),
            ]),
        )
        .build()
        .expect("valid grammar")
}

fn sums() -> Arc<grove::Grammar> {
    GrammarBuilder::new("test", "Sums")
        .rule(
            "E",
            Expr::choice([
                Expr::concatenation([Expr::non_terminal("E"), Expr::literal("+"), Expr::non_terminal("E")]),
                Expr::literal("a"),
            ]),
        )
        .build()
        .expect("valid grammar")
}

#[derive(Default)]
struct Leaves(Vec<String>);

impl SppfVisitor for Leaves {
    fn visit_leaf(&mut self, leaf: LeafRef<'_>) -> ControlFlow<()> {
        self.0.push(leaf.text().to_string());
        ControlFlow::Continue(())
    }
}

#[test]
fn test_long_left_recursive_input() {
    init();
    const N: usize = 200;
    let text = "a".repeat(N);
    let parser = ScannerlessParser::new(&left_recursive()).expect("compiles");
    let tree = parser.parse("S", &text).expect("parses");

    let root = tree.root().as_branch().expect("branch");
    assert_eq!(root.child_count(), 2);
    assert_eq!(root.child(0).expect("inner S").end(), N - 1);
    assert_eq!(root.child(1).expect("last a").matched_text(), "a");
    assert_eq!(tree.count_trees(), 1);
    assert_eq!(tree.reconstruct_text(), text);
}

#[test]
fn test_left_recursion_partial_match() {
    init();
    let parser = ScannerlessParser::new(&left_recursive()).expect("compiles");
    let error = parser.parse("S", "aaab").expect_err("trailing b");
    let failed = error.as_failed().expect("parse failure");
    assert_eq!(failed.failure_offset.to_usize(), 3);
    assert_eq!(
        failed.longest_match.as_ref().map(|tree| tree.to_string()),
        Some("S{S{S{'a'} 'a'} 'a'}".to_string())
    );
}

#[test]
fn test_ambiguous_sum_packs_both_groupings() {
    init();
    let parser = ScannerlessParser::new(&sums()).expect("compiles");
    let tree = parser.parse("E", "a+a+a").expect("parses");

    assert!(tree.is_ambiguous());
    assert_eq!(tree.count_trees(), 2);
    let root = tree.root().as_branch().expect("branch");
    assert_eq!(root.alternative_count(), 2);

    let mut shapes: Vec<(usize, usize)> = root
        .alternatives()
        .map(|alternative| {
            let left = alternative.child(0).expect("left operand");
            (left.end(), alternative.len())
        })
        .collect();
    shapes.sort_unstable();
    assert_eq!(shapes, vec![(1, 3), (3, 3)]);
}

#[test]
fn test_walk_all_alternatives() {
    init();
    let parser = ScannerlessParser::new(&sums()).expect("compiles");
    let tree = parser.parse("E", "a+a+a").expect("parses");

    let mut first = Leaves::default();
    let _ = tree.walk(&mut first, AlternativeSelection::First);
    assert_eq!(first.0.concat(), "a+a+a");

    let mut all = Leaves::default();
    let _ = tree.walk(&mut all, AlternativeSelection::All);
    assert_eq!(all.0.len(), 10);
}

#[test]
fn test_unit_cycle_terminates() {
    init();
    let grammar = GrammarBuilder::new("test", "Cycle")
        .rule("A", Expr::choice([Expr::non_terminal("B"), Expr::literal("a")]))
        .rule("B", Expr::non_terminal("A"))
        .build()
        .expect("valid grammar");
    let tree = ScannerlessParser::new(&grammar)
        .expect("compiles")
        .parse("A", "a")
        .expect("parses");
    assert_eq!(tree.count_trees(), 1);
    assert_eq!(tree.to_string(), "A{'a'}");
}

#[test]
fn test_same_input_gives_equal_forests() {
    init();
    let parser = ScannerlessParser::new(&sums()).expect("compiles");
    let first = parser.parse("E", "a+a+a").expect("parses");
    let second = parser.parse("E", "a+a+a").expect("parses");
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());

    let other = parser.parse("E", "a+a").expect("parses");
    assert_ne!(first, other);
}

#[test]
fn test_deep_right_recursion_stops_at_depth_limit() {
    init();
    let grammar = GrammarBuilder::new("test", "Right")
        .rule(
            "S",
            Expr::choice([
                Expr::concatenation([Expr::literal("a"), Expr::non_terminal("S")]),
                Expr::literal("a"),
            ]),
        )
        .build()
        .expect("valid grammar");
    let parser = ScannerlessParser::new(&grammar).expect("compiles");

    let shallow = "a".repeat(200);
    let tree = parser.parse("S", &shallow).expect("within the default depth");
    assert_eq!(tree.root().end(), 200);
    assert_eq!(tree.count_trees(), 1);
    assert_eq!(tree.reconstruct_text(), shallow);

    let deep = "a".repeat(3000);
    assert!(matches!(
        parser.parse("S", &deep),
        Err(ParseError::DepthLimitExceeded { limit: DEFAULT_MAX_DEPTH })
    ));
}

#[test]
fn test_hidden_left_recursion() {
    init();
    let grammar = GrammarBuilder::new("test", "Hidden")
        .rule(
            "S",
            Expr::choice([
                Expr::concatenation([
                    Expr::non_terminal("A"),
                    Expr::non_terminal("S"),
                    Expr::literal("b"),
                ]),
                Expr::literal("x"),
            ]),
        )
        .rule("A", Expr::multi(0, Some(1), Expr::literal("a")))
        .build()
        .expect("valid grammar");
    let parser = ScannerlessParser::new(&grammar).expect("compiles");

    let tree = parser.parse("S", "aaxbbb").expect("parses");
    // three b levels, two of which take an a
    assert_eq!(tree.count_trees(), 3);
    assert!(tree.is_ambiguous());
    assert_eq!((tree.root().start(), tree.root().end()), (0, 6));
    assert_eq!(tree.reconstruct_text(), "aaxbbb");

    let single = parser.parse("S", "xb").expect("parses");
    assert_eq!(single.to_string(), "S{A{<EMPTY>} S{'x'} 'b'}");
    assert!(parser.parse("S", "aaxb").is_err());
}

#[test]
fn test_left_recursion_inside_separated_list_with_skip() {
    init();
    let grammar = GrammarBuilder::new("test", "Lists")
        .skip_rule("WS", Expr::pattern(r"\s+"))
        .rule("list", Expr::separated_list(0, None, ";", Expr::non_terminal("e")))
        .rule(
            "e",
            Expr::choice([
                Expr::concatenation([Expr::non_terminal("e"), Expr::literal("-"), Expr::literal("a")]),
                Expr::literal("a"),
            ]),
        )
        .build()
        .expect("valid grammar");
    let parser = ScannerlessParser::new(&grammar).expect("compiles");

    let text = " a - a ; a-a-a ;a ";
    let tree = parser.parse("list", text).expect("parses");
    assert_eq!((tree.root().start(), tree.root().end()), (0, text.len()));
    assert_eq!(tree.reconstruct_text(), text);
    assert_eq!(tree.count_trees(), 1);

    let root = tree.root().as_branch().expect("branch");
    let items: Vec<String> = root
        .non_skip_children()
        .filter(|child| child.name() == "e")
        .map(|child| child.matched_text().trim().to_string())
        .collect();
    assert_eq!(items, vec!["a - a", "a-a-a", "a"]);

    let nested = root
        .non_skip_children()
        .find(|child| child.matched_text().trim() == "a-a-a")
        .and_then(|child| child.as_branch().ok())
        .and_then(|child| child.child(0).ok())
        .expect("inner e");
    assert_eq!(nested.name(), "e");
    assert_eq!(nested.matched_text(), "a-a");
}
