use sales_ingest::ingestion::csv::{ingest_csv_from_path, ingest_csv_from_reader, read_csv_from_path};
use sales_ingest::types::{DataType, Field, Schema, Value};

fn vendas_schema() -> Schema {
    Schema::new(vec![
        Field::new("produto", DataType::Utf8),
        Field::new("quantidade", DataType::Int64),
        Field::new("valor", DataType::Float64),
    ])
}

#[test]
fn read_csv_infers_column_types() {
    let ds = read_csv_from_path("tests/fixtures/vendas.csv").unwrap();

    assert_eq!(ds.schema, vendas_schema());
    assert_eq!(ds.row_count(), 3);
    assert_eq!(
        ds.rows[0],
        vec![
            Value::Utf8("caneta".to_string()),
            Value::Int64(2),
            Value::Float64(5.5),
        ]
    );
}

#[test]
fn ingest_csv_from_path_with_explicit_schema() {
    let schema = Schema::new(vec![
        Field::new("valor", DataType::Float64),
        Field::new("produto", DataType::Utf8),
    ]);
    let ds = ingest_csv_from_path("tests/fixtures/vendas.csv", &schema).unwrap();

    assert_eq!(ds.row_count(), 3);
    assert_eq!(ds.rows[1][0], Value::Float64(10.0));
    assert_eq!(ds.rows[1][1], Value::Utf8("caderno".to_string()));
}

#[test]
fn empty_cells_become_nulls() {
    let input = "produto,quantidade,valor\ncaneta,,4.0\n,2,\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let ds = ingest_csv_from_reader(&mut rdr, &vendas_schema()).unwrap();
    assert_eq!(ds.rows[0][1], Value::Null);
    assert_eq!(ds.rows[1][0], Value::Null);
    assert_eq!(ds.rows[1][2], Value::Null);
}

#[test]
fn ingest_csv_errors_on_missing_required_column() {
    let input = "produto,quantidade\ncaneta,2\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = ingest_csv_from_reader(&mut rdr, &vendas_schema()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("schema mismatch"));
    assert!(msg.contains("missing required column 'valor'"));
}

#[test]
fn ingest_csv_errors_on_type_parse() {
    let input = "produto,quantidade,valor\ncaneta,duas,5.5\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = ingest_csv_from_reader(&mut rdr, &vendas_schema()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("failed to parse value"));
    assert!(msg.contains("column 'quantidade'"));
}
