use criterion::{criterion_group, criterion_main, Criterion};
use rastro_core::analyzer::{analyze, normalize};
use rastro_core::Language;

const SAMPLE: &str = "La recuperación de información estudia la búsqueda de documentos \
relevantes dentro de colecciones de gran tamaño, combinando análisis léxico, eliminación \
de palabras vacías y radicación para construir índices invertidos eficientes. ";

fn bench_analyze(c: &mut Criterion) {
    let text = SAMPLE.repeat(50);
    c.bench_function("normalize_es", |b| b.iter(|| normalize(&text)));
    let normalized = normalize(&text);
    c.bench_function("analyze_es", |b| {
        b.iter(|| analyze(&normalized, Language::Spanish, 2))
    });
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
