mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use py2c::Translator;

fn bench_translator(c: &mut Criterion) {
    let translator = Translator::default();

    for (label, source) in common::workloads("translator") {
        let module = common::load_module(&source);

        c.bench_function(&format!("translator_emit_only_{label}"), |b| {
            b.iter(|| {
                let output = translator.translate(black_box(&module)).expect("translate");
                black_box(output);
            })
        });

        c.bench_function(&format!("translator_total_{label}"), |b| {
            b.iter(|| {
                let output = translator
                    .translate_source(black_box(&source))
                    .expect("translate");
                black_box(output);
            })
        });
    }
}

criterion_group!(benches, bench_translator);
criterion_main!(benches);
