use cifar_data::cifar::format::{parse_records, RECORD_SIZE};
use cifar_data::transforms::vision::{Normalize, RandomCrop, RandomHorizontalFlip, ToTensor};
use cifar_data::transforms::{ImageClassificationPipeline, Transform};
use cifar_data::{CifarImage, DataLoader, DataLoaderConfig, InMemoryDataset};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;

/// Loader throughput on synthetic CIFAR-10 records.
///
/// Measures:
/// 1. Decoding raw batch-file bytes into images
/// 2. One epoch with the usual train augmentation, across worker counts
///
/// ```bash
/// cargo bench --bench loader_bench
/// ```
const RECORDS: usize = 2_048;
const BATCH_SIZE: usize = 128;
const WORKERS: [usize; 3] = [0, 2, 4];

fn synthetic_bytes(n: usize) -> Vec<u8> {
    (0..n)
        .flat_map(|i| {
            let mut record = vec![(i % 10) as u8];
            record.extend((0..RECORD_SIZE - 1).map(|p| ((i + p) % 256) as u8));
            record
        })
        .collect()
}

fn synthetic_images(n: usize) -> Vec<CifarImage> {
    parse_records(&synthetic_bytes(n), Path::new("bench.bin")).expect("valid synthetic records")
}

fn bench_decode(c: &mut Criterion) {
    let bytes = synthetic_bytes(RECORDS);
    let mut group = c.benchmark_group("Decode");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.bench_function("parse_records", |b| {
        b.iter(|| {
            let records = parse_records(black_box(&bytes), Path::new("bench.bin")).unwrap();
            black_box(records.len());
        })
    });
    group.finish();
}

fn bench_epoch(c: &mut Criterion) {
    let images = synthetic_images(RECORDS);
    let mut group = c.benchmark_group("Train Epoch");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.sample_size(10);

    for &workers in &WORKERS {
        let pipeline = ImageClassificationPipeline::new(
            RandomCrop::new(32, 4)
                .unwrap()
                .then(RandomHorizontalFlip::new(0.5).unwrap())
                .then(ToTensor)
                .then(Normalize::cifar10()),
        );
        let dataset = InMemoryDataset::new(images.clone()).with_transform(pipeline);
        let config = DataLoaderConfig::builder()
            .batch_size(BATCH_SIZE)
            .shuffle(true)
            .seed(0)
            .num_workers(workers)
            .build();
        let loader = DataLoader::new(dataset, config).unwrap();

        group.bench_with_input(BenchmarkId::new("workers", workers), &loader, |b, loader| {
            b.iter(|| {
                let mut batches = 0;
                for batch in loader.iter().unwrap() {
                    black_box(batch.unwrap());
                    batches += 1;
                }
                black_box(batches);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_epoch);
criterion_main!(benches);
