#![cfg(feature = "io-parquet")]

use anyhow::Result;
use flightconv::ingest::{self, IngestOptions, convert_batch};
use flightconv::io::parquet::inspect_parquet;
use flightconv::testing::{fixture_dir, write_fixture, write_sample_flights};
use flightconv::*;
use serde::Deserialize;
use std::fs;

#[derive(Debug, PartialEq, Deserialize)]
struct Flight {
    date: Option<String>,
    tailnumber: String,
    flight_time: i64,
    distance: i64,
}

fn flight_options(input: &std::path::Path) -> IngestOptions {
    let mut opts = IngestOptions::new(input);
    opts.csv = CsvReadOptions::default()
        .with_usecols(["date", "tailnumber", "flight_time", "distance"])
        .with_converters(ConverterMap::flight_defaults());
    opts
}

#[test]
fn converts_sample_to_both_sinks() -> Result<()> {
    let dir = fixture_dir()?;
    let input = write_sample_flights(dir.path())?;
    let mut opts = flight_options(&input);
    opts.jsonl = Some(dir.path().join("out/flights.jsonl"));
    opts.parquet = Some(dir.path().join("out/flights.parquet"));
    opts.batch_size = 2;

    let report = ingest::run(&opts)?;
    assert_eq!(
        report,
        IngestReport {
            rows: 5,
            unparseable: 1,
            jsonl_rows: Some(5),
            parquet_rows: Some(5),
        }
    );

    let flights: Vec<Flight> = read_jsonl_vec(dir.path().join("out/flights.jsonl"))?;
    assert_eq!(
        flights[0],
        Flight {
            date: Some("2019-11-28".into()),
            tailnumber: "12345".into(),
            flight_time: 183,
            distance: 1200,
        }
    );
    assert_eq!(flights[3].date, None);
    assert_eq!(
        flights.iter().map(|f| f.tailnumber.as_str()).collect::<Vec<_>>(),
        ["12345", "67890", "24680", "13579", "98765"]
    );

    let summary = inspect_parquet(dir.path().join("out/flights.parquet"))?;
    assert_eq!(summary.rows, 5);
    assert_eq!(
        summary.columns,
        vec!["date", "tailnumber", "flight_time", "distance"]
    );
    Ok(())
}

#[test]
fn fatal_conversion_aborts_without_output() -> Result<()> {
    let dir = fixture_dir()?;
    let input = write_fixture(
        dir.path(),
        "bad.csv",
        "date,tailnumber,flight_time,distance\n\
         2019-11-28,N1,183.0,1200.0\n\
         2019-11-28,N2,n/a,731.0\n",
    )?;
    let jsonl = dir.path().join("bad.jsonl");
    let parquet = dir.path().join("bad.parquet");
    let mut opts = flight_options(&input);
    opts.jsonl = Some(jsonl.clone());
    opts.parquet = Some(parquet.clone());

    let err = ingest::run(&opts).unwrap_err();
    let rec = err.downcast_ref::<RecordError>().expect("a RecordError");
    assert_eq!(rec.line, 3);
    assert_eq!(rec.column, "flight_time");
    assert!(format!("{err:#}").contains("n/a"));

    assert!(!jsonl.exists());
    assert!(!parquet.exists());
    let leftovers: Vec<_> = fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn dtype_hints_apply_to_unconverted_columns() -> Result<()> {
    let dir = fixture_dir()?;
    let input = write_sample_flights(dir.path())?;
    let mut opts = IngestOptions::new(&input);
    opts.csv = CsvReadOptions::default()
        .with_usecols(["airline", "distance"])
        .with_dtype("distance", ColumnType::Float)
        .with_nrows(2);
    opts.jsonl = Some(dir.path().join("hinted.jsonl"));

    let report = ingest::run(&opts)?;
    assert_eq!(report.rows, 2);
    assert_eq!(report.parquet_rows, None);
    let rows: Vec<serde_json::Value> = read_jsonl_vec(dir.path().join("hinted.jsonl"))?;
    assert_eq!(
        rows[1],
        serde_json::json!({"airline": "AA", "distance": 731.0})
    );
    Ok(())
}

#[test]
fn without_sinks_the_run_only_converts() -> Result<()> {
    let dir = fixture_dir()?;
    let input = write_sample_flights(dir.path())?;
    let report = ingest::run(&flight_options(&input))?;
    assert_eq!(report.rows, 5);
    assert_eq!(report.jsonl_rows, None);
    assert_eq!(fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[test]
fn parallel_conversion_preserves_order() -> Result<()> {
    let dir = fixture_dir()?;
    let mut csv = String::from("tailnumber,distance\n");
    for i in 0..2_000 {
        csv.push_str(&format!("N{i},{i}.7\n"));
    }
    let input = write_fixture(dir.path(), "many.csv", &csv)?;
    let mut converters = ConverterMap::new();
    converters
        .bind_arc("tailnumber", BuiltinConverter::StripTag.into_converter())?
        .bind_arc("distance", BuiltinConverter::Int.into_converter())?;
    let csv_opts = CsvReadOptions::default().with_converters(converters);

    let records = read_csv_records(&input, &csv_opts)?;
    let plan = ConversionPlan::new(
        records[0].columns(),
        &csv_opts.converters,
        &csv_opts.dtype,
        true,
    );
    let (seq, _) = convert_batch(&plan, &records, false)?;
    let (par, _) = convert_batch(&plan, &records, true)?;
    assert_eq!(seq, par);
    assert_eq!(par[1999].get("tailnumber"), Some(&Value::from("1999")));
    assert_eq!(par[1999].get("distance"), Some(&Value::Int(1999)));

    let mut opts = IngestOptions::new(&input);
    opts.csv = csv_opts;
    opts.parallel = true;
    opts.batch_size = 300;
    opts.jsonl = Some(dir.path().join("many.jsonl"));
    ingest::run(&opts)?;
    let back: Vec<serde_json::Value> = read_jsonl_vec(dir.path().join("many.jsonl"))?;
    let tails: Vec<String> = back
        .iter()
        .map(|v| v["tailnumber"].as_str().unwrap_or_default().to_owned())
        .collect();
    let expected: Vec<String> = (0..2_000).map(|i| i.to_string()).collect();
    assert_eq!(tails, expected);
    Ok(())
}
