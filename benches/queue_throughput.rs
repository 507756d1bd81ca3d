//! Benchmarks for the pipeline hot paths
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use yuv_pipeline::media::YuvFrame;
use yuv_pipeline::pipeline::{BoundedQueue, Pipeline, PipelineOptions};
use yuv_pipeline::trace::EventTracer;

const ITEMS: u64 = 10_000;

fn bench_queue_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_handoff");
    group.throughput(Throughput::Elements(ITEMS));

    for capacity in [1usize, 10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::new("spsc", capacity),
            capacity,
            |b, &capacity| {
                b.iter(|| {
                    let queue = Arc::new(BoundedQueue::new("bench", capacity));
                    let consumer = {
                        let queue = Arc::clone(&queue);
                        thread::spawn(move || queue.iter().map(black_box).count())
                    };
                    for i in 0..ITEMS {
                        let _ = queue.push(i);
                    }
                    queue.close();
                    consumer.join().unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_three_stage_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("three_stage_chain");
    group.throughput(Throughput::Elements(ITEMS));

    for traced in [false, true].iter() {
        group.bench_with_input(
            BenchmarkId::new("traced", traced),
            traced,
            |b, &traced| {
                b.iter(|| {
                    let tracer = if traced {
                        EventTracer::new()
                    } else {
                        EventTracer::disabled()
                    };
                    let options = PipelineOptions {
                        monitor_enabled: false,
                        ..Default::default()
                    };
                    let running = Pipeline::builder(options, tracer)
                        .stage("inc", |x: u64| Ok(x + 1))
                        .stage("double", |x: u64| Ok(x * 2))
                        .sink("drop", |x: u64| {
                            black_box(x);
                            Ok(())
                        })
                        .start()
                        .unwrap();
                    for i in 0..ITEMS {
                        let _ = running.push(i);
                    }
                    running.finish()
                });
            },
        );
    }

    group.finish();
}

fn bench_i420_to_rgb(c: &mut Criterion) {
    let mut group = c.benchmark_group("i420_to_rgb");

    for (width, height) in [(320u32, 240u32), (1280, 720), (1920, 1080)].iter() {
        let size = (*width as usize) * (*height as usize) * 3 / 2;
        let frame = YuvFrame::from_bytes(*width, *height, vec![128; size], "bench.png").unwrap();

        group.throughput(Throughput::Elements(u64::from(width * height)));
        group.bench_with_input(
            BenchmarkId::new("to_rgb", format!("{width}x{height}")),
            &frame,
            |b, frame| {
                b.iter(|| black_box(frame.to_rgb()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_queue_handoff,
    bench_three_stage_chain,
    bench_i420_to_rgb
);
criterion_main!(benches);
