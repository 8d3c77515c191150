//! Per-frame analysis cost
//!
//! Run with: cargo bench --bench spectrum

use arrvee_signal::audio::{AnalyserNode, SpectrumSampler};
use arrvee_signal::{AnalyzerConfig, SpectrumFrame};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::f32::consts::PI;

/// Two tones, one in the bass bins and one in the treble bins
fn test_window(size: usize, sample_rate: f32) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / sample_rate;
            0.4 * (2.0 * PI * 110.0 * t).sin() + 0.2 * (2.0 * PI * 6000.0 * t).sin()
        })
        .collect()
}

fn bench_analyser(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyser");

    for fft_size in [256usize, 1024, 4096] {
        let config = AnalyzerConfig {
            fft_size,
            ..AnalyzerConfig::default()
        };
        let window = test_window(fft_size, 44100.0);

        group.bench_with_input(BenchmarkId::new("byte_frequency_data", fft_size), &window, |b, window| {
            let mut analyser = AnalyserNode::new(&config);
            b.iter(|| {
                analyser.time_domain_mut().copy_from_slice(black_box(window));
                black_box(analyser.byte_frequency_data())
            });
        });
    }

    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let config = AnalyzerConfig::default();
    let window = test_window(config.fft_size, 44100.0);

    c.bench_function("full_frame", |b| {
        let mut analyser = AnalyserNode::new(&config);
        let mut sampler = SpectrumSampler::new(&config);
        sampler.start();
        b.iter(|| {
            analyser.time_domain_mut().copy_from_slice(black_box(&window));
            let frame = analyser.byte_frequency_data();
            black_box(sampler.sample(&frame, 44100.0, true))
        });
    });

    let frame = SpectrumFrame::new((0..128).map(|i| (i * 2) as u8).collect());
    c.bench_function("sample_only", |b| {
        let mut sampler = SpectrumSampler::new(&config);
        b.iter(|| black_box(sampler.sample(black_box(&frame), 44100.0, true)));
    });
}

criterion_group!(benches, bench_analyser, bench_frame);
criterion_main!(benches);
