use audio_ring::audio::RingBuffer;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const CAPACITY: usize = 48_000;

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    for &frames in &[128usize, 512, 2048] {
        group.throughput(Throughput::Elements(frames as u64));

        let buffer = RingBuffer::new(CAPACITY, 2).unwrap();
        let mono = vec![0.1f32; frames];
        group.bench_with_input(BenchmarkId::new("add_frames", frames), &frames, |b, &n| {
            b.iter(|| buffer.add_frames(black_box(&mono), n, 0).unwrap())
        });

        let stereo_i16 = vec![1000i16; frames * 2];
        group.bench_with_input(
            BenchmarkId::new("add_interleaved_frames_i16", frames),
            &frames,
            |b, &n| b.iter(|| buffer.add_interleaved_frames(black_box(&stereo_i16), n, 2).unwrap()),
        );
    }

    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");

    for &frames in &[128usize, 512, 2048] {
        group.throughput(Throughput::Elements(frames as u64));

        let buffer = RingBuffer::new(CAPACITY, 2).unwrap();
        let source = vec![0.2f32; frames * 2];

        let mut out = vec![0.0f32; frames];
        group.bench_with_input(BenchmarkId::new("fetch_fresh_data", frames), &frames, |b, &n| {
            b.iter(|| {
                buffer.add_interleaved_frames(&source, n, 2).unwrap();
                buffer.fetch_fresh_data(black_box(&mut out), n, 0, 1).unwrap()
            })
        });

        let mut interleaved = vec![0.0f32; frames * 2];
        group.bench_with_input(
            BenchmarkId::new("fetch_interleaved_data", frames),
            &frames,
            |b, &n| {
                b.iter(|| {
                    buffer.add_interleaved_frames(&source, n, 2).unwrap();
                    buffer
                        .fetch_interleaved_data(black_box(&mut interleaved), n, 2)
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let buffer = RingBuffer::new(CAPACITY, 1).unwrap();
    let data: Vec<f32> = (0..CAPACITY).map(|i| (i as f32 * 0.01).sin()).collect();
    buffer.add_frames(&data, CAPACITY, 0).unwrap();

    c.bench_function("stats_full_buffer", |b| b.iter(|| buffer.stats(black_box(0)).unwrap()));
}

criterion_group!(benches, bench_ingest, bench_extract, bench_stats);
criterion_main!(benches);
