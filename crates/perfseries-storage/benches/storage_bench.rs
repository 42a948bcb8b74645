//! perfseries-storage 성능 벤치마크
//!
//! 실행: cargo bench -p perfseries-storage
//!
//! 벤치마크 대상:
//! - 백엔드별 기록 + 잠금 + 전체 순회
//! - 외부 정렬 버퍼 크기별 병합 비용
//! - 잠긴 시리즈 구간 슬라이스

// 벤치마크 코드에서 criterion 패턴 관련 clippy 경고 허용
#![allow(clippy::redundant_closure, clippy::unit_arg)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use perfseries_core::models::key::SeriesKey;
use perfseries_core::models::period::TimePeriod;
use perfseries_core::models::sample::Sample;
use perfseries_core::ports::series_store::SeriesStore;
use perfseries_storage::registry::NameRegistry;
use perfseries_storage::series::KeyedSeriesStore;
use perfseries_storage::sqlite::SqliteDatabase;
use tempfile::TempDir;

/// 역순 섞인 테스트 샘플 생성
fn create_test_samples(n: usize) -> Vec<(SeriesKey, Sample)> {
    (0..n)
        .map(|i| {
            let ts = ((i * 7919) % n) as u64;
            let key = SeriesKey::new(format!("/api/{}", i % 8));
            (key, Sample::new(ts, (i % 250) as u64))
        })
        .collect()
}

fn drain(store: &KeyedSeriesStore) -> usize {
    store.total().iter().unwrap().count()
}

/// 백엔드별 기록 → 잠금 → 순회
fn bench_record_and_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_and_read");
    group.sample_size(10);

    for size in [1_000, 10_000, 50_000] {
        group.throughput(Throughput::Elements(size as u64));
        let samples = create_test_samples(size);

        group.bench_with_input(BenchmarkId::new("memory", size), &samples, |b, samples| {
            b.iter(|| {
                let mut store = KeyedSeriesStore::in_memory("bench", TimePeriod::unbounded());
                for (key, sample) in samples {
                    store.add(key, *sample).unwrap();
                }
                store.lock_all().unwrap();
                black_box(drain(&store));
            });
        });

        group.bench_with_input(
            BenchmarkId::new("external_sort", size),
            &samples,
            |b, samples| {
                b.iter_with_setup(
                    || TempDir::new().expect("임시 디렉토리 생성 실패"),
                    |temp| {
                        let mut store = KeyedSeriesStore::external_sort(
                            "bench",
                            temp.path().to_path_buf(),
                            NameRegistry::shared(),
                            1_000,
                            TimePeriod::unbounded(),
                        )
                        .unwrap();
                        for (key, sample) in samples {
                            store.add(key, *sample).unwrap();
                        }
                        store.lock_all().unwrap();
                        black_box(drain(&store));
                    },
                );
            },
        );

        group.bench_with_input(BenchmarkId::new("database", size), &samples, |b, samples| {
            b.iter_with_setup(
                || {
                    let temp = TempDir::new().expect("임시 디렉토리 생성 실패");
                    let db = SqliteDatabase::open(&temp.path().join("bench.db"))
                        .expect("DB 생성 실패");
                    (db, temp)
                },
                |(db, _temp): (SqliteDatabase, TempDir)| {
                    let mut store =
                        KeyedSeriesStore::database("bench", db, 5_000, TimePeriod::unbounded())
                            .unwrap();
                    for (key, sample) in samples {
                        store.add(key, *sample).unwrap();
                    }
                    store.lock_all().unwrap();
                    black_box(drain(&store));
                },
            );
        });
    }

    group.finish();
}

/// 외부 정렬 버퍼 크기별 (슬라이스 수가 많을수록 병합 fan-in 증가)
fn bench_external_sort_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("external_sort_buffer");
    group.sample_size(10);
    let samples = create_test_samples(20_000);

    for capacity in [100, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter_with_setup(
                    || TempDir::new().expect("임시 디렉토리 생성 실패"),
                    |temp| {
                        let mut store = KeyedSeriesStore::external_sort(
                            "bench",
                            temp.path().to_path_buf(),
                            NameRegistry::shared(),
                            capacity,
                            TimePeriod::unbounded(),
                        )
                        .unwrap();
                        for (key, sample) in &samples {
                            store.add(key, *sample).unwrap();
                        }
                        store.lock_all().unwrap();
                        black_box(drain(&store));
                    },
                );
            },
        );
    }

    group.finish();
}

/// 잠긴 메모리 시리즈 구간 슬라이스
fn bench_time_slice(c: &mut Criterion) {
    let mut store = KeyedSeriesStore::in_memory("bench", TimePeriod::unbounded());
    for (key, sample) in create_test_samples(100_000) {
        store.add(&key, sample).unwrap();
    }
    store.lock_all().unwrap();

    c.bench_function("time_slice_middle", |b| {
        b.iter(|| {
            let slice = store
                .total()
                .slice(black_box(TimePeriod::new(40_000, 60_000)))
                .unwrap();
            black_box(slice.to_vec().unwrap().len());
        });
    });
}

criterion_group!(
    benches,
    bench_record_and_read,
    bench_external_sort_buffer,
    bench_time_slice
);
criterion_main!(benches);
