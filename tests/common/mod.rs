#![allow(dead_code)]

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

/// Rows of `tests/fixtures/vendas.csv` / `vendas.json`.
pub const VENDAS: &[(&str, Option<i64>, f64)] = &[
    ("caneta", Some(2), 5.5),
    ("caderno", Some(3), 10.0),
    ("borracha", Some(1), 4.25),
];

/// Write `rows` as a `produto`/`quantidade`/`valor` Parquet file. `None` quantities are nulls.
pub fn write_vendas_parquet(path: &Path, rows: &[(&str, Option<i64>, f64)]) {
    let schema = Arc::new(
        parse_message_type(
            r#"
            message schema {
              REQUIRED BINARY produto (UTF8);
              OPTIONAL INT64 quantidade;
              REQUIRED DOUBLE valor;
            }
            "#,
        )
        .unwrap(),
    );
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).unwrap();
    let mut writer = SerializedFileWriter::new(file, schema, props).unwrap();

    let produtos: Vec<ByteArray> = rows.iter().map(|r| ByteArray::from(r.0)).collect();
    let quantidades: Vec<i64> = rows.iter().filter_map(|r| r.1).collect();
    let def_levels: Vec<i16> = rows.iter().map(|r| i16::from(r.1.is_some())).collect();
    let valores: Vec<f64> = rows.iter().map(|r| r.2).collect();

    let mut rg = writer.next_row_group().unwrap();
    while let Some(mut col) = rg.next_column().unwrap() {
        match col.untyped() {
            ColumnWriter::ByteArrayColumnWriter(w) => {
                w.write_batch(&produtos, None, None).unwrap();
            }
            ColumnWriter::Int64ColumnWriter(w) => {
                w.write_batch(&quantidades, Some(&def_levels), None).unwrap();
            }
            ColumnWriter::DoubleColumnWriter(w) => {
                w.write_batch(&valores, None, None).unwrap();
            }
            _ => panic!("unexpected column writer in test"),
        }
        col.close().unwrap();
    }
    rg.close().unwrap();
    writer.close().unwrap();
}
