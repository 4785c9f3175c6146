#![cfg(feature = "io-parquet")]

use anyhow::Result;
use arrow::array::{Array, Date32Array, Int64Array, StringArray, UInt64Array};
use arrow::datatypes::DataType;
use chrono::NaiveDate;
use flightconv::io::parquet::{INDEX_COLUMN, date32_days, inspect_parquet, read_parquet_batches};
use flightconv::*;
use parquet::basic::Compression;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, PartialEq, Deserialize)]
struct Row {
    tailnumber: Option<String>,
    distance: Option<i64>,
}

fn columns() -> Vec<(String, ColumnType)> {
    vec![
        ("date".to_owned(), ColumnType::Date),
        ("tailnumber".to_owned(), ColumnType::Str),
        ("distance".to_owned(), ColumnType::Int),
    ]
}

fn rows() -> Vec<ConvertedRecord> {
    let cols: Columns = Arc::from(vec![
        "date".to_owned(),
        "tailnumber".to_owned(),
        "distance".to_owned(),
    ]);
    let d = NaiveDate::from_ymd_opt(2019, 11, 28).unwrap();
    vec![
        ConvertedRecord::new(
            cols.clone(),
            vec![Value::Date(d), Value::from("12345"), Value::Int(1200)],
            2,
        ),
        ConvertedRecord::new(
            cols.clone(),
            vec![Value::Null, Value::from("67890"), Value::Null],
            3,
        ),
        ConvertedRecord::new(
            cols,
            vec![Value::Date(d), Value::Null, Value::Int(402)],
            4,
        ),
    ]
}

#[test]
fn date32_counts_days_from_unix_epoch() {
    assert_eq!(date32_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
    assert_eq!(date32_days(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    assert_eq!(date32_days(NaiveDate::from_ymd_opt(2019, 11, 28).unwrap()), 18_228);
}

#[test]
fn compression_names_parse() {
    assert_eq!("SNAPPY".parse::<ParquetCompression>(), Ok(ParquetCompression::Snappy));
    assert_eq!("none".parse::<ParquetCompression>(), Ok(ParquetCompression::None));
    assert_eq!(
        "lzo".parse::<ParquetCompression>(),
        Err(ConvertError::UnknownCompression("lzo".into()))
    );
    assert_eq!(ParquetCompression::default(), ParquetCompression::Snappy);
}

#[test]
fn sink_writes_declared_types() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("flights.parquet");

    let mut sink = ParquetSink::create(&path, &columns(), &ParquetWriteOptions::default())?;
    sink.write(&rows())?;
    assert_eq!(sink.finish()?, 3);

    let batches = read_parquet_batches(&path)?;
    let batch = &batches[0];
    let schema = batch.schema();
    assert_eq!(schema.field(0).data_type(), &DataType::Date32);
    assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    assert_eq!(schema.field(2).data_type(), &DataType::Int64);

    let dates = batch
        .column(0)
        .as_any()
        .downcast_ref::<Date32Array>()
        .unwrap();
    assert_eq!(
        dates.value_as_date(0),
        NaiveDate::from_ymd_opt(2019, 11, 28)
    );
    assert!(dates.is_null(1));

    let tails = batch
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(tails.value(1), "67890");
    assert!(tails.is_null(2));

    let distance = batch
        .column(2)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(distance.value(0), 1200);
    assert!(distance.is_null(1));

    Ok(())
}

#[test]
fn typed_read_back() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("typed.parquet");
    let cols: Columns = Arc::from(vec!["tailnumber".to_owned(), "distance".to_owned()]);
    let data = vec![
        ConvertedRecord::new(cols.clone(), vec![Value::from("12345"), Value::Int(1200)], 2),
        ConvertedRecord::new(cols.clone(), vec![Value::from("67890"), Value::Null], 3),
        ConvertedRecord::new(cols, vec![Value::Null, Value::Int(402)], 4),
    ];
    let schema = vec![
        ("tailnumber".to_owned(), ColumnType::Str),
        ("distance".to_owned(), ColumnType::Int),
    ];

    let mut sink = ParquetSink::create(&path, &schema, &ParquetWriteOptions::default())?;
    sink.write(&data)?;
    sink.finish()?;

    let typed: Vec<Row> = read_parquet_vec(&path)?;
    assert_eq!(
        typed,
        vec![
            Row {
                tailnumber: Some("12345".into()),
                distance: Some(1200)
            },
            Row {
                tailnumber: Some("67890".into()),
                distance: None
            },
            Row {
                tailnumber: None,
                distance: Some(402)
            },
        ]
    );
    Ok(())
}

#[test]
fn index_column_counts_across_batches() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("indexed.parquet");
    let opts = ParquetWriteOptions {
        index: true,
        ..Default::default()
    };

    let mut sink = ParquetSink::create(&path, &columns(), &opts)?;
    sink.write(&rows())?;
    sink.write(&rows()[..1])?;
    sink.finish()?;

    let summary = inspect_parquet(&path)?;
    assert_eq!(summary.rows, 4);
    assert_eq!(summary.columns[0], INDEX_COLUMN);

    let mut index = Vec::new();
    for batch in read_parquet_batches(&path)? {
        let col = batch
            .column_by_name(INDEX_COLUMN)
            .unwrap()
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap()
            .clone();
        index.extend(col.values().iter().copied());
    }
    assert_eq!(index, vec![0, 1, 2, 3]);
    Ok(())
}

#[test]
fn codec_and_row_groups_follow_options() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("zstd.parquet");
    let opts = ParquetWriteOptions {
        compression: ParquetCompression::Zstd,
        index: false,
        row_group_size: Some(2),
    };

    let mut sink = ParquetSink::create(&path, &columns(), &opts)?;
    sink.write(&rows())?;
    sink.write(&rows())?;
    sink.finish()?;

    let summary = inspect_parquet(&path)?;
    assert_eq!(summary.rows, 6);
    assert_eq!(summary.row_groups, 3);
    assert!(matches!(summary.compression, Some(Compression::ZSTD(_))));
    assert_eq!(summary.columns, vec!["date", "tailnumber", "distance"]);
    Ok(())
}

#[test]
fn empty_output_keeps_schema() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("empty.parquet");

    let sink = ParquetSink::create(&path, &columns(), &ParquetWriteOptions::default())?;
    assert_eq!(sink.finish()?, 0);

    let summary = inspect_parquet(&path)?;
    assert_eq!(summary.rows, 0);
    assert_eq!(summary.columns.len(), 3);
    Ok(())
}

#[test]
fn type_mismatch_names_the_column_and_discards_output() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("bad.parquet");
    let cols: Columns = Arc::from(vec![
        "date".to_owned(),
        "tailnumber".to_owned(),
        "distance".to_owned(),
    ]);
    let bad = ConvertedRecord::new(
        cols,
        vec![Value::Null, Value::from("1"), Value::from("far")],
        9,
    );

    {
        let mut sink = ParquetSink::create(&path, &columns(), &ParquetWriteOptions::default())?;
        let err = sink.write(&[bad]).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 9"), "{msg}");
        assert!(msg.contains("`distance`"), "{msg}");
    }
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(tmp.path())?.count(), 0);
    Ok(())
}

#[test]
fn failed_commit_removes_staging_file() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    // a non-empty directory at the target makes the final rename fail
    let path = tmp.path().join("taken.parquet");
    std::fs::create_dir(&path)?;
    std::fs::write(path.join("keep"), "x")?;

    let mut sink = ParquetSink::create(&path, &columns(), &ParquetWriteOptions::default())?;
    sink.write(&rows())?;
    let err = sink.finish().unwrap_err();
    assert!(format!("{err:#}").contains("rename"), "{err:#}");
    assert!(!tmp.path().join("taken.parquet.tmp").exists());
    assert!(path.join("keep").exists());
    Ok(())
}
