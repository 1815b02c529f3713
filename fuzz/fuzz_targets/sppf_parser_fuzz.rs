#![no_main]
use grove::{Expr, Grammar, GrammarBuilder, ParseError, ParserConfig, ScannerlessParser};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};

fn grammar() -> Arc<Grammar> {
    GrammarBuilder::new("fuzz", "Expressions")
        .skip_rule("WS", Expr::pattern(r"\s+"))
        .rule(
            "e",
            Expr::choice([
                Expr::concatenation([Expr::non_terminal("e"), Expr::literal("+"), Expr::non_terminal("e")]),
                Expr::concatenation([Expr::literal("("), Expr::non_terminal("args"), Expr::literal(")")]),
                Expr::pattern("[a-z0-9]+"),
            ]),
        )
        .rule("args", Expr::separated_list(0, Some(4), ",", Expr::non_terminal("e")))
        .build()
        .expect("fuzz grammar is valid")
}

fn parser() -> &'static ScannerlessParser {
    static PARSER: OnceLock<ScannerlessParser> = OnceLock::new();
    PARSER.get_or_init(|| {
        ScannerlessParser::new(&grammar())
            .expect("fuzz grammar compiles")
            .with_config(ParserConfig::default().with_max_steps(200_000))
    })
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 256 {
        return;
    }

    match parser().parse("e", text) {
        Ok(tree) => {
            assert_eq!(tree.reconstruct_text(), text);
            assert_eq!(tree.root().end(), text.len());
        }
        Err(ParseError::Failed(failed)) => {
            assert!(failed.failure_offset.to_usize() <= text.len());
            if let Some(longest) = &failed.longest_match {
                assert!(longest.root().end() <= text.len());
            }
        }
        Err(_) => {}
    }
});
