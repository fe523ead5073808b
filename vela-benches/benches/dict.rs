use criterion::BenchmarkGroup;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use std::hint::black_box;
use vela::dict::Dict;

const SIZES: &[usize] = &[1_000, 10_000, 100_000];

fn filled(count: usize) -> Dict<u64, u64> {
  let mut dict: Dict<u64, u64> = Dict::new();

  for key in 0..count as u64 {
    dict.add(key, key).unwrap();
  }

  while dict.rehash(1024) {}

  dict
}

fn bench_add(criterion: &mut Criterion) {
  let mut group: BenchmarkGroup<'_, _> = criterion.benchmark_group("add");

  for &size in SIZES {
    let id: BenchmarkId = BenchmarkId::from_parameter(size);

    group.bench_with_input(id, &size, |bench, &size| {
      bench.iter(|| {
        let mut dict: Dict<u64, u64> = Dict::new();

        for key in 0..size as u64 {
          dict.add(black_box(key), key).unwrap();
        }

        black_box(dict.len())
      })
    });
  }

  group.finish();
}

fn bench_find(criterion: &mut Criterion) {
  let mut group: BenchmarkGroup<'_, _> = criterion.benchmark_group("find");

  for &size in SIZES {
    let mut dict: Dict<u64, u64> = filled(size);
    let id: BenchmarkId = BenchmarkId::from_parameter(size);

    group.bench_with_input(id, &size, |bench, &size| {
      bench.iter(|| {
        for key in 0..1_000u64 {
          black_box(dict.fetch_value(&(key % size as u64)));
        }
      })
    });
  }

  group.finish();
}

fn bench_rehash(criterion: &mut Criterion) {
  let mut group: BenchmarkGroup<'_, _> = criterion.benchmark_group("rehash");

  for &size in SIZES {
    let id: BenchmarkId = BenchmarkId::from_parameter(size);

    group.bench_with_input(id, &size, |bench, &size| {
      bench.iter_with_setup(
        || {
          let mut dict: Dict<u64, u64> = filled(size);

          dict.expand(size * 4).unwrap();
          dict
        },
        |mut dict| {
          while dict.rehash(1024) {}

          black_box(dict.len())
        },
      )
    });
  }

  group.finish();
}

fn bench_scan(criterion: &mut Criterion) {
  let mut group: BenchmarkGroup<'_, _> = criterion.benchmark_group("scan");

  for &size in SIZES {
    let dict: Dict<u64, u64> = filled(size);
    let id: BenchmarkId = BenchmarkId::from_parameter(size);

    group.bench_with_input(id, &size, |bench, _| {
      bench.iter(|| {
        let mut cursor: u64 = 0;
        let mut visited: usize = 0;

        loop {
          cursor = dict.scan(cursor, |_| visited += 1);

          if cursor == 0 {
            break;
          }
        }

        black_box(visited)
      })
    });
  }

  group.finish();
}

criterion_group! {
  name = benches;
  config = Criterion::default();
  targets = bench_add, bench_find, bench_rehash, bench_scan
}

criterion_main!(benches);
