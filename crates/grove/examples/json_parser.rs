//! JSON Parser Example
//!
//! Parses JSON directly over characters with a scannerless grammar: string,
//! number and keyword terminals are patterns and literals, whitespace is a
//! skip rule, and no lexer is involved.

use grove::error::diagnostics::format_failure_with_context;
use grove::{Expr, GrammarBuilder, NodeRef, ScannerlessParser};
use std::sync::Arc;

fn build_json_grammar() -> Result<Arc<grove::Grammar>, grove::GrammarError> {
    GrammarBuilder::new("examples", "Json")
        .skip_rule("WS", Expr::pattern(r"[ \t\r\n]+"))
        .rule(
            "value",
            Expr::choice([
                Expr::non_terminal("object"),
                Expr::non_terminal("array"),
                Expr::non_terminal("string"),
                Expr::non_terminal("number"),
                Expr::literal("true"),
                Expr::literal("false"),
                Expr::literal("null"),
            ]),
        )
        .rule(
            "object",
            Expr::concatenation([
                Expr::literal("{"),
                Expr::separated_list(0, None, ",", Expr::non_terminal("pair")),
                Expr::literal("}"),
            ]),
        )
        .rule(
            "pair",
            Expr::concatenation([
                Expr::non_terminal("string"),
                Expr::literal(":"),
                Expr::non_terminal("value"),
            ]),
        )
        .rule(
            "array",
            Expr::concatenation([
                Expr::literal("["),
                Expr::separated_list(0, None, ",", Expr::non_terminal("value")),
                Expr::literal("]"),
            ]),
        )
        .rule("string", Expr::pattern(r#""([^"\\]|\\.)*""#))
        .rule("number", Expr::pattern(r"-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?"))
        .build()
}

/// Count the declared rules used in the first tree of the forest
fn count_named(node: NodeRef<'_>, name: &str) -> usize {
    let own = usize::from(node.name() == name);
    match node.as_branch() {
        Ok(branch) => own + branch.children().map(|child| count_named(child, name)).sum::<usize>(),
        Err(_) => own,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== JSON Parser Example ===\n");

    println!("1. Building JSON grammar...");
    let grammar = build_json_grammar()?;
    let parser = ScannerlessParser::new(&grammar)?;
    println!("   ✓ Grammar built successfully");
    println!("   Runtime rules: {}\n", parser.rule_set().len());

    let test_cases = [
        ("42", "number"),
        (r#""hello""#, "string"),
        ("true", "boolean"),
        ("null", "null"),
        (r#"{"key": "value"}"#, "object"),
        ("[1, 2, 3]", "array"),
        (r#"{"name": "John", "tags": ["a", "b"], "age": 30}"#, "nested object"),
    ];

    println!("2. Testing JSON parsing:");
    for (input, description) in test_cases {
        match parser.parse("value", input) {
            Ok(tree) => {
                println!("   ✓ {description}: {tree}");
                println!(
                    "     {} nodes, {} strings, {} steps",
                    tree.node_count(),
                    count_named(tree.root(), "string"),
                    tree.metrics().steps
                );
            }
            Err(error) => println!("   ✗ {description}: {error}"),
        }
    }

    println!("\n3. Reporting an error:");
    let broken = r#"{"name": "John",, "age": 30}"#;
    if let Err(error) = parser.parse("value", broken) {
        if let Some(failed) = error.as_failed() {
            println!("{}", format_failure_with_context(failed, broken, 10));
        }
    }

    println!("\n4. Indented forest:");
    let tree = parser.parse("value", r#"{"a": [true]}"#)?;
    print!("{}", tree.to_string_indented());

    Ok(())
}
