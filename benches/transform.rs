use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use sales_ingest::processing::transform;
use sales_ingest::types::{DataSet, DataType, Field, Schema, Value};

fn vendas(rows: usize, int_prices: bool) -> DataSet {
    let valor_type = if int_prices {
        DataType::Int64
    } else {
        DataType::Float64
    };
    let schema = Schema::new(vec![
        Field::new("produto", DataType::Utf8),
        Field::new("quantidade", DataType::Int64),
        Field::new("valor", valor_type),
    ]);

    let data = (0..rows)
        .map(|i| {
            let quantidade = if i % 17 == 0 {
                Value::Null
            } else {
                Value::Int64((i % 50) as i64)
            };
            let valor = if int_prices {
                Value::Int64((i % 200) as i64)
            } else {
                Value::Float64((i % 200) as f64 * 0.75)
            };
            vec![Value::Utf8(format!("produto-{}", i % 100)), quantidade, valor]
        })
        .collect();

    DataSet::new(schema, data)
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    for rows in [1_000usize, 100_000] {
        group.throughput(Throughput::Elements(rows as u64));

        let float_ds = vendas(rows, false);
        group.bench_with_input(BenchmarkId::new("int_x_float", rows), &float_ds, |b, ds| {
            b.iter(|| transform(black_box(ds.clone())).unwrap())
        });

        let int_ds = vendas(rows, true);
        group.bench_with_input(BenchmarkId::new("int_x_int", rows), &int_ds, |b, ds| {
            b.iter(|| transform(black_box(ds.clone())).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transform);
criterion_main!(benches);
