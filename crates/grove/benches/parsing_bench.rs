use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use grove::parser::{ParallelParser, ParseBatch};
use grove::{Expr, GrammarBuilder, ScannerlessParser};
use std::hint::black_box;
use std::sync::Arc;

fn arithmetic() -> Arc<grove::Grammar> {
    GrammarBuilder::new("bench", "Arithmetic")
        .skip_rule("WS", Expr::pattern(r"\s+"))
        .rule(
            "e",
            Expr::priority_choice([
                Expr::non_terminal("number"),
                Expr::non_terminal("group"),
                Expr::non_terminal("multiply"),
                Expr::non_terminal("plus"),
            ]),
        )
        .rule("number", Expr::pattern("[0-9]+"))
        .rule(
            "group",
            Expr::concatenation([Expr::literal("("), Expr::non_terminal("e"), Expr::literal(")")]),
        )
        .rule(
            "multiply",
            Expr::concatenation([Expr::non_terminal("e"), Expr::literal("*"), Expr::non_terminal("e")]),
        )
        .rule(
            "plus",
            Expr::concatenation([Expr::non_terminal("e"), Expr::literal("+"), Expr::non_terminal("e")]),
        )
        .build()
        .unwrap()
}

fn expression(terms: usize) -> String {
    (0..terms)
        .map(|index| {
            if index % 3 == 0 {
                format!("({index} * 2)")
            } else {
                index.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_rule_set", |b| {
        b.iter(|| {
            let grammar = arithmetic();
            black_box(grammar.runtime_rule_set().unwrap());
        });
    });
}

fn bench_full_parse(c: &mut Criterion) {
    let parser = ScannerlessParser::new(&arithmetic()).unwrap();
    let mut group = c.benchmark_group("full_parse");
    for terms in [4, 16, 64] {
        let text = expression(terms);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &text, |b, text| {
            b.iter(|| black_box(parser.parse("e", black_box(text)).unwrap()));
        });
    }
    group.finish();
}

fn bench_left_recursion(c: &mut Criterion) {
    let grammar = GrammarBuilder::new("bench", "Left")
        .rule(
            "S",
            Expr::choice([
                Expr::concatenation([Expr::non_terminal("S"), Expr::literal("a")]),
                Expr::literal("a"),
            ]),
        )
        .build()
        .unwrap();
    let parser = ScannerlessParser::new(&grammar).unwrap();
    let text = "a".repeat(500);

    c.bench_function("left_recursion_500", |b| {
        b.iter(|| black_box(parser.parse("S", black_box(&text)).unwrap()));
    });
}

fn bench_batch(c: &mut Criterion) {
    let parser = ParallelParser::new(ScannerlessParser::new(&arithmetic()).unwrap());
    let mut batch = ParseBatch::new();
    for index in 0..64 {
        batch.add(format!("{index}"), expression(8 + index % 8), "e");
    }

    c.bench_function("parse_batch_64", |b| {
        b.iter(|| black_box(parser.parse_batch(black_box(&batch))));
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_full_parse,
    bench_left_recursion,
    bench_batch
);
criterion_main!(benches);
