use chrono::NaiveDate;
use core::hint::black_box;
use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use sernum::{
    Allocator, Batch, BatchMetadata, MemoryStore, RandSource, Role, SerialFormat, SerialStore,
    ThreadRandom, UserStore,
};

// Serials allocated per benchmark iteration.
const TOTAL_SERIALS: usize = 1024;

struct FixedRand;

impl RandSource for FixedRand {
    fn rand_below(&self, bound: usize) -> usize {
        bound / 2
    }
}

fn batch<S: UserStore>(store: &S) -> Batch {
    let owner = store.insert_user("bench", "hash", Role::User).unwrap().id;
    Batch::new(
        owner,
        BatchMetadata {
            model_number: "HX-200".into(),
            quantity: 1,
            date_of_manufacturing: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            brazer_name: "bench".into(),
            operator_code: "OP-0".into(),
            code_a: None,
            code_b: None,
            code_c: None,
            code_d: None,
        },
    )
}

fn benchmark_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.throughput(Throughput::Elements(TOTAL_SERIALS as u64));

    group.bench_function("thread_random", |b| {
        b.iter(|| {
            for _ in 0..TOTAL_SERIALS {
                black_box(SerialFormat::STANDARD.generate(&ThreadRandom));
            }
        });
    });
    group.bench_function("fixed_rand", |b| {
        b.iter(|| {
            for _ in 0..TOTAL_SERIALS {
                black_box(SerialFormat::STANDARD.generate(&FixedRand));
            }
        });
    });
    group.finish();
}

fn bench_allocate<S, F>(c: &mut Criterion, group_name: &str, store_factory: F)
where
    S: SerialStore + UserStore,
    F: Fn() -> S,
{
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_SERIALS as u64));

    group.bench_function(format!("elems/{TOTAL_SERIALS}"), |b| {
        b.iter_batched(
            || {
                let store = store_factory();
                let batch = batch(&store);
                (store, batch)
            },
            |(store, batch)| {
                let allocator = Allocator::new(&store);
                black_box(allocator.allocate(&batch, TOTAL_SERIALS).unwrap());
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn benchmark_allocate_memory(c: &mut Criterion) {
    bench_allocate(c, "allocate/memory", MemoryStore::new);
}

fn benchmark_allocate_sqlite(c: &mut Criterion) {
    bench_allocate(c, "allocate/sqlite", || {
        sernum::SqliteStore::open_in_memory().unwrap()
    });
}

criterion_group!(
    benches,
    benchmark_generate,
    benchmark_allocate_memory,
    benchmark_allocate_sqlite,
);
criterion_main!(benches);
