//! Decision engine throughput benchmark.
//!
//! One video's worth of samples (450 frames) through the full threshold and
//! debounce machinery.

use bscan_vision::{BlinkConfig, BlinkEngine};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Synthetic openness trace: steady baseline with a dip every 25 frames.
fn sample_trace(frames: usize) -> Vec<f64> {
    (0..frames)
        .map(|i| if i > 20 && i % 25 == 0 { 0.14 } else { 0.30 })
        .collect()
}

fn bench_engine(c: &mut Criterion) {
    let trace = sample_trace(450);

    c.bench_function("engine_450_frames", |b| {
        b.iter(|| {
            let mut engine = BlinkEngine::new(BlinkConfig::default());
            for &sample in &trace {
                black_box(engine.observe(black_box(sample)));
            }
            engine.finish();
            black_box(engine.blink_count())
        })
    });
}

criterion_group!(benches, bench_engine);
criterion_main!(benches);
