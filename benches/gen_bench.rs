use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sinegen::format::SampleFormatter;
use sinegen::rt::Engine;
use sinegen::{BitDepth, GeneratorConfig, GlitchKind, IntervalPolicy};

fn engine(glitch: GlitchKind, interval: f64) -> Engine {
    let config = GeneratorConfig::builder()
        .frequencies(&[440.0, 660.0])
        .block_size(1024)
        .bit_depth(16)
        .glitch(glitch)
        .interval(IntervalPolicy::Fixed { seconds: interval })
        .glitch_seed(7)
        .build()
        .unwrap();
    Engine::new(&config)
}

fn bench_process_block(c: &mut Criterion) {
    let mut clean = engine(GlitchKind::None, 1.0);
    let mut out = vec![0.0; 1024 * 2];
    c.bench_function("process_block_1024_stereo", |b| {
        b.iter(|| {
            clean.process_block(black_box(&mut out));
            black_box(&out);
        })
    });

    // Interval shorter than one block: a glitch on every block.
    let mut skipping = engine(GlitchKind::Skip { size: 10 }, 0.001);
    c.bench_function("process_block_1024_skip_every_block", |b| {
        b.iter(|| {
            skipping.process_block(black_box(&mut out));
            black_box(&out);
        })
    });
}

fn bench_formatted_stream(c: &mut Criterion) {
    let mut engine = engine(GlitchKind::Dropout { size: 100 }, 1.0);
    c.bench_function("next_formatted_block_i16", |b| {
        b.iter(|| {
            for _ in 0..100 {
                black_box(engine.next_formatted_block());
            }
        })
    });

    let block: Vec<f32> = (0..2048).map(|i| (i as f32 / 2048.0) * 2.0 - 1.0).collect();
    let mut bytes = Vec::new();
    for depth in [BitDepth::Int16, BitDepth::Int24, BitDepth::Float32] {
        let formatter = SampleFormatter::new(depth);
        c.bench_function(&format!("encode_{}bit", depth.bits()), |b| {
            b.iter(|| {
                formatter.encode_into(black_box(&block), &mut bytes);
                black_box(&bytes);
            })
        });
    }
}

criterion_group!(benches, bench_process_block, bench_formatted_stream);
criterion_main!(benches);
