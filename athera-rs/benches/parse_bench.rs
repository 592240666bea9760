use criterion::{black_box, criterion_group, criterion_main, Criterion};
use athera::script::lexer::tokenize;
use athera::script::stmt::parse;
use athera::script::Interpreter;

fn make_script(tasks: usize) -> String {
    let mut src = String::new();
    for i in 0..tasks {
        src.push_str(&format!(
            "task step{i} with a, b:\n    set total = a + b\n    repeat 2 times:\n        greet total\n    return total\n"
        ));
    }
    src.push_str("protect:\n    run step0 1, 2\nhandle:\n    greet failed\n");
    src
}

fn bench_parse(c: &mut Criterion) {
    let small = make_script(10);
    let large = make_script(1000);

    let mut g = c.benchmark_group("parse");
    g.bench_function("tokenize_small", |b| b.iter(|| tokenize(black_box(&small))));
    g.bench_function("tokenize_large", |b| b.iter(|| tokenize(black_box(&large))));

    let tokens_small = tokenize(&small);
    let tokens_large = tokenize(&large);
    g.bench_function("parse_small", |b| b.iter(|| parse(black_box(&tokens_small))));
    g.bench_function("parse_large", |b| b.iter(|| parse(black_box(&tokens_large))));
    g.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut interp = Interpreter::new();
    interp
        .exec_source("set xs = [1, 2, 3]\nset m = {\"k\": \"v\"}")
        .expect("setup");

    let mut g = c.benchmark_group("eval");
    for expr in ["42", "\"quoted\"", "xs", "[1, [2, 3], \"x\"]", "1 + 2.5", "text.upper \"abc\""] {
        g.bench_function(expr, |b| b.iter(|| interp.eval(black_box(expr))));
    }
    g.finish();
}

criterion_group!(benches, bench_parse, bench_eval);
criterion_main!(benches);
