use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use signflow::classifier::RollingLogitsWindow;
use signflow::defaults::FEATURES_PER_FRAME;
use signflow::features::{FeatureConfig, FeatureExtractionBuffer};
use signflow::{FeatureScaler, Landmark, LandmarkFrame};
use std::hint::black_box;

fn hand(offset: f32) -> Vec<Landmark> {
    (0..21)
        .map(|i| Landmark::new(0.3 + offset + i as f32 * 0.012, 0.6 - i as f32 * 0.01, -0.01))
        .collect()
}

fn face() -> Vec<Landmark> {
    (0..37)
        .map(|i| Landmark::new(0.4 + (i % 20) as f32 * 0.005, 0.2 + (i / 20) as f32 * 0.004, 0.0))
        .collect()
}

fn frame(ts: u64) -> LandmarkFrame {
    let wobble = (ts % 7) as f32 * 0.002;
    LandmarkFrame::empty(ts)
        .with_left_hand(hand(wobble))
        .with_right_hand(hand(0.3 - wobble))
        .with_face(face())
}

/// Buffer primed to one frame short of a ready window.
fn primed_buffer(scaler: Option<FeatureScaler>) -> FeatureExtractionBuffer {
    let mut buffer = FeatureExtractionBuffer::new(FeatureConfig::default()).with_scaler(scaler);
    for ts in 0..29 {
        buffer.push_frame(&frame(ts * 33));
    }
    buffer
}

fn bench_ready_tensor(c: &mut Criterion) {
    let mut group = c.benchmark_group("ready_tensor");
    let scaler = FeatureScaler::new(
        vec![0.1; FEATURES_PER_FRAME],
        vec![2.0; FEATURES_PER_FRAME],
    )
    .ok();

    for (name, scaler) in [("unscaled", None), ("scaled", scaler)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &scaler, |b, scaler| {
            let mut buffer = primed_buffer(scaler.clone());
            let mut ts = 29 * 33;
            b.iter(|| {
                ts += 33;
                buffer.push_frame(&frame(ts));
                black_box(buffer.ready_tensor())
            });
        });
    }
    group.finish();
}

fn bench_logits_average(c: &mut Criterion) {
    let mut group = c.benchmark_group("logits_average");
    for classes in [100usize, 2000] {
        group.bench_with_input(BenchmarkId::from_parameter(classes), &classes, |b, &n| {
            let mut window = RollingLogitsWindow::new(3);
            let logits: Vec<f32> = (0..n).map(|i| (i % 13) as f32 * 0.1).collect();
            b.iter(|| {
                window.push(logits.clone());
                black_box(window.average())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ready_tensor, bench_logits_average);
criterion_main!(benches);
