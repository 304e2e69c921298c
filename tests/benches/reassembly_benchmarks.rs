//! # Chunk Reassembly Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | ChunkAccumulator | Raw append throughput by chunk size |
//! | ReassemblyEngine | Decode + append + flush of a whole file into memory |
//! | Chunking | Splitting and base64-encoding a file |
//! | Partitioning | Key → worker assignment |

use ap_02_chunk_reassembly::{
    assign_partition, split_into_chunks, ChunkAccumulator, ChunkRecord, InMemorySink,
    ReassemblyApi, ReassemblyConfig, ReassemblyEngine,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::RngCore;

const FILE_SIZE: usize = 1024 * 1024;
const CHUNK_SIZES: [usize; 3] = [1024, 16 * 1024, 64 * 1024];

fn random_file(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

fn bench_accumulator_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ap-02-accumulator");
    let data = random_file(FILE_SIZE);
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for chunk_size in CHUNK_SIZES {
        let chunks: Vec<&[u8]> = data.chunks(chunk_size).collect();
        let total = chunks.len() as u32;

        group.bench_with_input(
            BenchmarkId::new("append_file", chunk_size),
            &chunks,
            |b, chunks| {
                b.iter(|| {
                    let mut acc = ChunkAccumulator::new(FILE_SIZE, 0);
                    for (i, chunk) in chunks.iter().enumerate() {
                        acc.append(chunk, i as u32 + 1, total).unwrap();
                    }
                    black_box(acc.flush().len())
                })
            },
        );
    }

    group.finish();
}

fn bench_engine_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("ap-02-engine");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let data = random_file(FILE_SIZE);
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for chunk_size in CHUNK_SIZES {
        let records: Vec<ChunkRecord> = split_into_chunks(&data, chunk_size)
            .unwrap()
            .into_iter()
            .map(|chunk| ChunkRecord::from_message("bench".to_string(), chunk).unwrap())
            .collect();

        group.bench_with_input(
            BenchmarkId::new("process_file", chunk_size),
            &records,
            |b, records| {
                let mut engine =
                    ReassemblyEngine::new(InMemorySink::new(), ReassemblyConfig::default());
                b.iter(|| {
                    runtime.block_on(async {
                        for record in records.iter().cloned() {
                            black_box(engine.process_chunk(record).await.unwrap());
                        }
                    })
                })
            },
        );
    }

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("ap-02-chunking");
    let data = random_file(FILE_SIZE);
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for chunk_size in CHUNK_SIZES {
        group.bench_with_input(
            BenchmarkId::new("split_into_chunks", chunk_size),
            &chunk_size,
            |b, &chunk_size| b.iter(|| black_box(split_into_chunks(&data, chunk_size).unwrap())),
        );
    }

    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let keys: Vec<String> = (0..1000).map(|i| format!("file-{i}")).collect();

    c.bench_function("ap-02-assign_partition_1000_keys", |b| {
        b.iter(|| {
            keys.iter()
                .map(|key| assign_partition(key, 8))
                .sum::<usize>()
        })
    });
}

criterion_group!(
    benches,
    bench_accumulator_append,
    bench_engine_file,
    bench_split,
    bench_partition
);
criterion_main!(benches);
