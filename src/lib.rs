//! # flightconv
//!
//! Read delimited flight data, apply per-column converters, and write the
//! result as JSON Lines and Parquet.
//!
//! ## Pieces
//!
//! - [`convert`]: the field converters ([`decode_date`], [`strip_tag`],
//!   [`coerce_int`]), the [`ConverterMap`] binding them to columns, and the
//!   [`ConversionPlan`] that applies converters and dtype hints to records
//! - [`record`]: raw [`Record`]s, typed [`Value`]s, and [`ConvertedRecord`]s
//! - [`io`]: the CSV reader, JSONL and Parquet sinks, and transparent
//!   gzip/zstd/bzip2/xz handling for text files
//! - [`ingest`]: the read → convert → write driver
//!
//! ## Quick Start
//!
//! ```no_run
//! use flightconv::ingest::{self, IngestOptions};
//! use flightconv::io::csv::CsvReadOptions;
//! use flightconv::ConverterMap;
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut opts = IngestOptions::new("flights.csv");
//! opts.csv = CsvReadOptions::default()
//!     .with_usecols(["date", "tailnumber", "flight_time", "distance"])
//!     .with_converters(ConverterMap::flight_defaults());
//! opts.jsonl = Some("out/flights.jsonl".into());
//! opts.parquet = Some("out/flights.parquet".into());
//!
//! let report = ingest::run(&opts)?;
//! println!("{} rows", report.rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure model
//!
//! Unparseable dates become nulls and the run continues. A value that cannot
//! be coerced to an integer aborts the run with the offending line and column,
//! and no output file is left behind.
//!
//! ## Feature Flags
//!
//! - `io-parquet`: Parquet sink and readers (`arrow`, `parquet`, `serde_arrow`)
//! - `parallel-io`: parallel per-batch conversion with `rayon`
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz`: compressed CSV inputs and JSONL outputs
//!
//! All are enabled by default.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod convert;
pub mod ingest;
pub mod io;
pub mod record;
pub mod testing;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod cli;

pub use convert::{
    BuiltinConverter, ColumnConverter, ConversionPlan, ConvertError, ConverterMap, Decoded,
    RecordError, coerce_int, decode_date, strip_tag,
};
pub use ingest::{IngestOptions, IngestReport};
pub use io::csv::{CsvReadOptions, CsvSource, read_csv_records};
pub use io::jsonl::{JsonlSink, read_jsonl_vec, write_jsonl_vec};
pub use record::{ColumnType, Columns, ConvertedRecord, Record, Value};

#[cfg(feature = "io-parquet")]
pub use io::parquet::{ParquetCompression, ParquetSink, ParquetWriteOptions, read_parquet_vec};
