use anyhow::Result;
use flightconv::testing::{fixture_dir, write_sample_flights};
use flightconv::*;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Flight {
    date: Option<String>,
    tailnumber: String,
    flight_time: i64,
    distance: i64,
}

fn converted_sample() -> Result<Vec<ConvertedRecord>> {
    let dir = fixture_dir()?;
    let path = write_sample_flights(dir.path())?;
    let opts = CsvReadOptions::default()
        .with_usecols(["date", "tailnumber", "flight_time", "distance"])
        .with_converters(ConverterMap::flight_defaults());
    let records = read_csv_records(&path, &opts)?;
    let plan = ConversionPlan::new(records[0].columns(), &opts.converters, &opts.dtype, true);
    let mut out = Vec::new();
    for rec in &records {
        out.push(plan.apply(rec)?.0);
    }
    Ok(out)
}

#[test]
fn sink_writes_one_object_per_line_in_order() -> Result<()> {
    let rows = converted_sample()?;
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("nested/out.jsonl");

    let mut sink = JsonlSink::create(&path)?;
    sink.write(&rows[..2])?;
    sink.write(&rows[2..])?;
    assert_eq!(sink.rows(), 5);
    assert_eq!(sink.finish()?, 5);

    let text = fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        r#"{"date":"2019-11-28","tailnumber":"12345","flight_time":183,"distance":1200}"#
    );
    // unparseable date is null, untagged tail number is unchanged
    assert_eq!(
        lines[3],
        r#"{"date":null,"tailnumber":"13579","flight_time":44,"distance":216}"#
    );
    assert!(lines[4].contains(r#""tailnumber":"98765""#));

    let back: Vec<Flight> = read_jsonl_vec(&path)?;
    assert_eq!(back[1].flight_time, 95);
    assert_eq!(back[4].flight_time, 320);
    Ok(())
}

#[test]
fn unfinished_sink_leaves_nothing_behind() -> Result<()> {
    let rows = converted_sample()?;
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("out.jsonl");

    {
        let mut sink = JsonlSink::create(&path)?;
        sink.write(&rows)?;
    }
    assert!(!path.exists());
    assert_eq!(fs::read_dir(tmp.path())?.count(), 0);
    Ok(())
}

#[test]
fn typed_vec_helpers() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("flights.jsonl");
    let data = vec![
        Flight {
            date: Some("2019-11-28".into()),
            tailnumber: "12345".into(),
            flight_time: 183,
            distance: 1200,
        },
        Flight {
            date: None,
            tailnumber: "".into(),
            flight_time: 0,
            distance: 0,
        },
    ];
    assert_eq!(write_jsonl_vec(&path, &data)?, 2);
    let back: Vec<Flight> = read_jsonl_vec(&path)?;
    assert_eq!(back, data);
    Ok(())
}

#[test]
fn reader_skips_blank_lines_and_reports_bad_ones() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("mixed.jsonl");
    fs::write(&path, "{\"a\":1}\n\n   \n{\"a\":2}\n")?;
    let back: Vec<serde_json::Value> = read_jsonl_vec(&path)?;
    assert_eq!(back.len(), 2);

    fs::write(&path, "{\"a\":1}\nnot json\n")?;
    let err = read_jsonl_vec::<serde_json::Value>(&path).unwrap_err();
    assert!(format!("{err:#}").contains("line 2"));
    Ok(())
}

#[test]
fn failed_commit_removes_staging_file() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("taken.jsonl");
    fs::create_dir(&path)?;
    fs::write(path.join("keep"), "x")?;

    let mut sink = JsonlSink::create(&path)?;
    sink.write(&[serde_json::json!({"a": 1})])?;
    let err = sink.finish().unwrap_err();
    assert!(format!("{err:#}").contains("rename"), "{err:#}");
    assert!(!tmp.path().join("taken.jsonl.tmp").exists());
    assert_eq!(fs::read_dir(tmp.path())?.count(), 1);
    Ok(())
}
