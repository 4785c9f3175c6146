//! Command-line arguments.
//!
//! ```bash
//! flightconv flights.csv --flight-defaults --jsonl out/flights.jsonl --parquet out/flights.parquet
//! flightconv flights.csv.gz --sep ';' --usecols date,tailnumber,distance --nrows 1000 \
//!     --convert tailnumber=strip-tag --convert distance=int --dtype origin=str \
//!     --parquet out/flights.parquet --compression zstd --index
//! ```

use crate::convert::{BuiltinConverter, ConvertError, ConverterMap};
use crate::ingest::{DEFAULT_BATCH_SIZE, IngestOptions};
use crate::io::csv::CsvReadOptions;
use crate::io::parquet::{ParquetCompression, ParquetWriteOptions};
use crate::record::ColumnType;
use clap::Parser;
use std::path::PathBuf;

/// Convert delimited flight data to JSON Lines and Parquet
#[derive(Parser, Debug)]
#[command(name = "flightconv")]
#[command(about = "Convert delimited flight data to JSON Lines and Parquet", long_about = None)]
pub struct CliArgs {
    /// Input CSV file (optionally .gz/.zst/.bz2/.xz compressed)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Field delimiter: a single ASCII character, or `tab`
    #[arg(long, value_name = "CHAR", default_value = ",", value_parser = parse_delimiter)]
    pub sep: u8,

    /// 0-based row holding the column names
    #[arg(long, value_name = "ROW", default_value_t = 0, conflicts_with = "no_header")]
    pub header: usize,

    /// The input has no header row
    #[arg(long)]
    pub no_header: bool,

    /// Explicit column names (comma separated), overriding any header row
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub names: Option<Vec<String>>,

    /// Only keep these columns (comma separated)
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    pub usecols: Option<Vec<String>>,

    /// Read at most this many data rows
    #[arg(long, value_name = "N")]
    pub nrows: Option<usize>,

    /// Type hint for a column without a converter: str, int, float, bool, date
    #[arg(long = "dtype", value_name = "COLUMN=TYPE", value_parser = parse_dtype)]
    pub dtype: Vec<(String, ColumnType)>,

    /// Bind a converter to a column: date, strip-tag, int
    #[arg(long = "convert", value_name = "COLUMN=KIND", value_parser = parse_binding)]
    pub convert: Vec<(String, BuiltinConverter)>,

    /// Start from the flight dataset bindings (date, tailnumber, flight_time, distance)
    #[arg(long)]
    pub flight_defaults: bool,

    /// Keep empty fields as empty strings instead of nulls
    #[arg(long)]
    pub keep_empty: bool,

    /// Write JSON Lines here
    #[arg(long, value_name = "PATH")]
    pub jsonl: Option<PathBuf>,

    /// Write Parquet here
    #[arg(long, value_name = "PATH")]
    pub parquet: Option<PathBuf>,

    /// Parquet codec: snappy, gzip, brotli, zstd, lz4, none
    #[arg(long, value_name = "CODEC", default_value = "snappy")]
    pub compression: ParquetCompression,

    /// Persist the positional row index in the Parquet output
    #[arg(long)]
    pub index: bool,

    /// Rows per Parquet row group
    #[arg(long, value_name = "ROWS")]
    pub row_group_size: Option<usize>,

    /// Records converted and written per batch
    #[arg(long, value_name = "SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Convert each batch on all cores (output order is unchanged)
    #[arg(long)]
    pub parallel: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Build run options from the parsed arguments.
    ///
    /// Explicit `--convert` bindings override `--flight-defaults`; binding the
    /// same column twice with `--convert` is an error.
    ///
    /// # Errors
    /// Returns [`ConvertError::DuplicateBinding`] for repeated `--convert` columns.
    pub fn into_options(self) -> Result<IngestOptions, ConvertError> {
        let mut explicit = ConverterMap::new();
        for (column, kind) in &self.convert {
            explicit.bind_arc(column.clone(), kind.into_converter())?;
        }
        let converters = if self.flight_defaults {
            let mut base = ConverterMap::flight_defaults();
            for (column, kind) in self.convert {
                base.rebind(column, kind.into_converter());
            }
            base
        } else {
            explicit
        };

        let csv = CsvReadOptions {
            delimiter: self.sep,
            header: (!self.no_header).then_some(self.header),
            names: self.names,
            usecols: self.usecols,
            nrows: self.nrows,
            dtype: self.dtype.into_iter().collect(),
            na_filter: !self.keep_empty,
            converters,
        };
        Ok(IngestOptions {
            input: self.input,
            csv,
            jsonl: self.jsonl,
            parquet: self.parquet,
            parquet_options: ParquetWriteOptions {
                compression: self.compression,
                index: self.index,
                row_group_size: self.row_group_size,
            },
            batch_size: self.batch_size,
            parallel: self.parallel,
        })
    }
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(format!("delimiter must be a single ASCII character, got `{s}`")),
        },
    }
}

fn split_pair(s: &str) -> Result<(&str, &str), String> {
    let (column, rhs) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got `{s}`"))?;
    if column.is_empty() {
        return Err(format!("empty column name in `{s}`"));
    }
    Ok((column, rhs))
}

fn parse_dtype(s: &str) -> Result<(String, ColumnType), String> {
    let (column, ty) = split_pair(s)?;
    let ty = ty.parse::<ColumnType>().map_err(|e| e.to_string())?;
    Ok((column.to_owned(), ty))
}

fn parse_binding(s: &str) -> Result<(String, BuiltinConverter), String> {
    let (column, kind) = split_pair(s)?;
    let kind = kind.parse::<BuiltinConverter>().map_err(|e| e.to_string())?;
    Ok((column.to_owned(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("flightconv").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn delimiters() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn pairs() {
        assert_eq!(
            parse_dtype("origin=str"),
            Ok(("origin".to_owned(), ColumnType::Str))
        );
        assert_eq!(
            parse_binding("tailnumber=strip-tag"),
            Ok(("tailnumber".to_owned(), BuiltinConverter::StripTag))
        );
        assert!(parse_binding("tailnumber").is_err());
        assert!(parse_binding("=int").is_err());
        assert!(parse_binding("x=bogus").is_err());
    }

    #[test]
    fn builds_options() {
        let opts = parse(&[
            "in.csv",
            "--sep",
            ";",
            "--usecols",
            "a,b",
            "--nrows",
            "10",
            "--convert",
            "a=int",
            "--dtype",
            "b=float",
            "--parquet",
            "out.parquet",
            "--compression",
            "zstd",
            "--index",
        ])
        .into_options()
        .unwrap();
        assert_eq!(opts.csv.delimiter, b';');
        assert_eq!(opts.csv.header, Some(0));
        assert_eq!(opts.csv.usecols, Some(vec!["a".to_owned(), "b".to_owned()]));
        assert_eq!(opts.csv.nrows, Some(10));
        assert_eq!(opts.csv.converters.get("a").map(|c| c.name()), Some("int"));
        assert_eq!(opts.csv.dtype.get("b"), Some(&ColumnType::Float));
        assert_eq!(opts.parquet_options.compression, ParquetCompression::Zstd);
        assert!(opts.parquet_options.index);
        assert!(opts.jsonl.is_none());
    }

    #[test]
    fn no_header_clears_header_row() {
        let opts = parse(&["in.csv", "--no-header"]).into_options().unwrap();
        assert_eq!(opts.csv.header, None);
    }

    #[test]
    fn explicit_bindings_override_defaults() {
        let opts = parse(&["in.csv", "--flight-defaults", "--convert", "flight_time=date"])
            .into_options()
            .unwrap();
        let conv = &opts.csv.converters;
        assert_eq!(conv.get("flight_time").map(|c| c.name()), Some("date"));
        assert_eq!(conv.get("tailnumber").map(|c| c.name()), Some("strip-tag"));
        assert_eq!(conv.len(), 4);
    }

    #[test]
    fn repeated_binding_is_rejected() {
        let err = parse(&["in.csv", "--convert", "a=int", "--convert", "a=date"])
            .into_options()
            .unwrap_err();
        assert_eq!(
            err,
            ConvertError::DuplicateBinding {
                column: "a".to_owned()
            }
        );
    }
}
