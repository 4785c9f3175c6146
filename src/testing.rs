//! Test fixtures for the flight dataset.
//!
//! ```
//! use flightconv::testing::{fixture_dir, write_sample_flights};
//! use flightconv::{read_csv_records, CsvReadOptions};
//!
//! let dir = fixture_dir().unwrap();
//! let path = write_sample_flights(dir.path()).unwrap();
//! let rows = read_csv_records(&path, &CsvReadOptions::default()).unwrap();
//! assert_eq!(rows.len(), 5);
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Header of [`SAMPLE_FLIGHTS_CSV`].
pub const SAMPLE_FLIGHT_COLUMNS: [&str; 6] = [
    "date",
    "airline",
    "tailnumber",
    "origin",
    "flight_time",
    "distance",
];

/// Five flights. Row 4 has an unparseable date, row 5 a numeric tail number.
pub const SAMPLE_FLIGHTS_CSV: &str = "\
date,airline,tailnumber,origin,flight_time,distance
2019-11-28,DL,N12345,ATL,183.0,1200.0
2019-11-28,AA,N67890,DFW,95.5,731.0
2019-11-29,UA,N24680,ORD,61.0,402.0
11/29/2019,WN,N13579,MDW,44.0,216.0
2019-11-30,B6,98765,JFK,320.9,2475.0
";

/// A fresh temporary directory, removed when dropped.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn fixture_dir() -> Result<TempDir> {
    tempfile::tempdir().context("create fixture dir")
}

/// Write `contents` to `dir/name` and return the path.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Write [`SAMPLE_FLIGHTS_CSV`] to `dir/flights.csv`.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_sample_flights(dir: &Path) -> Result<PathBuf> {
    write_fixture(dir, "flights.csv", SAMPLE_FLIGHTS_CSV)
}
