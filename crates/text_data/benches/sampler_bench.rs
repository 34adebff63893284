use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use text_data::{LanguageModelPreLoader, LmConfig, SortishSampler};

/// Benchmarks for the two epoch-construction hot paths:
/// 1. Sortish permutation: shuffle + megabatch sort + minibatch shuffle
/// 2. Language-model epoch fill: stream concatenation + row split
///
/// To run these, use:
/// ```bash
/// cargo bench
/// ```

/// All tests sweep across dataset sizes from 1K to 100K documents.
const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

fn bench_sortish_permutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sortish_permutation");

    for &size in &SIZES {
        let lengths: Vec<usize> = (0..size).map(|i| (i * 37) % 512 + 1).collect();
        let sampler = SortishSampler::new(size, move |i| lengths[i], 32, 42).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &sampler, |b, sampler| {
            let mut epoch = 0;
            b.iter(|| {
                epoch += 1;
                black_box(sampler.permutation(epoch))
            })
        });
    }
    group.finish();
}

fn bench_lm_epoch_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("lm_epoch_fill");

    for &size in &SIZES {
        let documents: Vec<Vec<i64>> = (0..size)
            .map(|d| (0..32).map(|t| (d * 32 + t) as i64).collect())
            .collect();
        let config = LmConfig::builder()
            .batch_size(64)
            .bptt(70)
            .shuffle(true)
            .seed(42)
            .build();

        group.throughput(Throughput::Elements((size * 32) as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            let mut loader =
                LanguageModelPreLoader::new(documents.clone().into(), config.clone()).unwrap();
            let mut epoch = 0;
            b.iter(|| {
                // A fresh epoch forces a full stream rebuild and row refill.
                epoch += 1;
                let (inputs, _) = loader.batch(epoch, 0).unwrap();
                black_box(inputs[[0, 0]]);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sortish_permutation, bench_lm_epoch_fill);
criterion_main!(benches);
