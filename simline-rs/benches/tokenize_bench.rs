use std::collections::HashSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use simline::config::Settings;
use simline::host::{BufferOutput, StaticHost};
use simline::script::lexer::tokenize;
use simline::script::Interp;

fn make_script(repeats: usize) -> String {
    let chunk = "$n = 0\nwhile $n < 10 { $n += 1; if $n % 2 == 0 { echo \"even\" } }\n$l = [1, 2, (3 + 4)]\n";
    chunk.repeat(repeats)
}

fn bench_tokenize(c: &mut Criterion) {
    let symbols: HashSet<String> = ["+", "-", "*", "/", "%", "==", "<", "->"].iter().map(|s| (*s).to_owned()).collect();
    let small = make_script(10);
    let large = make_script(1000);

    let mut g = c.benchmark_group("tokenize");
    g.bench_function("small", |b| b.iter(|| tokenize(black_box(&small), &symbols)));
    g.bench_function("large", |b| b.iter(|| tokenize(black_box(&large), &symbols)));
    g.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut interp = match Interp::new(Arc::new(StaticHost::new()), Settings::default(), Box::new(BufferOutput::new())) {
        Ok(i) => i,
        Err(e) => panic!("cannot create interpreter: {e}"),
    };
    let prog = "$s = 0; foreach $i in [1, 2, 3, 4, 5, 6, 7, 8] { $s += $i * 2 }; $s";
    c.bench_function("eval_foreach", |b| b.iter(|| interp.run(black_box(prog))));
}

criterion_group!(benches, bench_tokenize, bench_eval);
criterion_main!(benches);
