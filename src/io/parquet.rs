//! Parquet sink and readers.
//!
//! [`ParquetSink`] writes [`ConvertedRecord`] batches through
//! `parquet::arrow::ArrowWriter`. The Arrow schema comes from the declared
//! column types, not from the data, so an all-null or empty input still gets
//! the intended types:
//!
//! | [`ColumnType`] | Arrow type |
//! |---|---|
//! | `Str` | `Utf8` |
//! | `Int` | `Int64` |
//! | `Float` | `Float64` |
//! | `Bool` | `Boolean` |
//! | `Date` | `Date32` |
//!
//! All fields are nullable. With [`ParquetWriteOptions::index`] set, a
//! positional `UInt64` column named [`INDEX_COLUMN`] comes first.
//!
//! [`read_parquet_vec`] (Serde + `serde_arrow`) and [`read_parquet_batches`]
//! read files back; [`inspect_parquet`] summarizes footer metadata.

use crate::convert::ConvertError;
use crate::io::{commit, ensure_parent, staging_path};
use crate::record::{ColumnType, ConvertedRecord, Value};
use anyhow::{Context, Result, bail};
use arrow::array::{
    ArrayRef, BooleanBuilder, Date32Builder, Float64Builder, Int64Builder, StringBuilder,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde::de::DeserializeOwned;
use serde_arrow::from_record_batch;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Name of the positional row-index column.
pub const INDEX_COLUMN: &str = "__index_level_0__";

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Column-chunk codec for Parquet output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParquetCompression {
    #[default]
    Snappy,
    Gzip,
    Brotli,
    Zstd,
    Lz4,
    None,
}

impl ParquetCompression {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ParquetCompression::Snappy => "snappy",
            ParquetCompression::Gzip => "gzip",
            ParquetCompression::Brotli => "brotli",
            ParquetCompression::Zstd => "zstd",
            ParquetCompression::Lz4 => "lz4",
            ParquetCompression::None => "none",
        }
    }

    /// The `parquet` crate codec, at its default level.
    #[must_use]
    pub fn codec(self) -> Compression {
        match self {
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Brotli => Compression::BROTLI(BrotliLevel::default()),
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Lz4 => Compression::LZ4_RAW,
            ParquetCompression::None => Compression::UNCOMPRESSED,
        }
    }
}

impl fmt::Display for ParquetCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParquetCompression {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snappy" => Ok(ParquetCompression::Snappy),
            "gzip" => Ok(ParquetCompression::Gzip),
            "brotli" => Ok(ParquetCompression::Brotli),
            "zstd" => Ok(ParquetCompression::Zstd),
            "lz4" => Ok(ParquetCompression::Lz4),
            "none" | "uncompressed" => Ok(ParquetCompression::None),
            _ => Err(ConvertError::UnknownCompression(s.to_owned())),
        }
    }
}

/// Options for [`ParquetSink`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParquetWriteOptions {
    pub compression: ParquetCompression,
    /// Persist a positional row index as the first column.
    pub index: bool,
    /// Close a row group after this many rows. `None` keeps the writer default.
    pub row_group_size: Option<usize>,
}

/// Arrow type for a declared column type.
#[must_use]
pub fn arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Str => DataType::Utf8,
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
    }
}

/// Arrow schema for `columns`, optionally led by the index column.
#[must_use]
pub fn arrow_schema(columns: &[(String, ColumnType)], index: bool) -> Schema {
    let mut fields = Vec::with_capacity(columns.len() + usize::from(index));
    if index {
        fields.push(Field::new(INDEX_COLUMN, DataType::UInt64, false));
    }
    fields.extend(
        columns
            .iter()
            .map(|(name, ty)| Field::new(name, arrow_type(*ty), true)),
    );
    Schema::new(fields)
}

/// Days since 1970-01-01, as Arrow `Date32` stores them.
#[must_use]
pub fn date32_days(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Streaming Parquet writer for converted records.
pub struct ParquetSink {
    path: PathBuf,
    staging: PathBuf,
    writer: Option<ArrowWriter<File>>,
    schema: SchemaRef,
    columns: Vec<(String, ColumnType)>,
    options: ParquetWriteOptions,
    rows: usize,
}

impl ParquetSink {
    /// Create the staging file for `path` with a schema derived from `columns`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the writer cannot open.
    pub fn create(
        path: impl AsRef<Path>,
        columns: &[(String, ColumnType)],
        options: &ParquetWriteOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;
        let staging = staging_path(&path);
        let schema: SchemaRef = Arc::new(arrow_schema(columns, options.index));
        let file = File::create(&staging).with_context(|| format!("create {}", staging.display()))?;
        let mut props = WriterProperties::builder().set_compression(options.compression.codec());
        if let Some(limit) = options.row_group_size.filter(|&n| n > 0) {
            props = props.set_max_row_group_size(limit);
        }
        let props = props.build();
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(props))
            .context("create ArrowWriter")?;
        Ok(Self {
            path,
            staging,
            writer: Some(writer),
            schema,
            columns: columns.to_vec(),
            options: options.clone(),
            rows: 0,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append `rows` as one record batch.
    ///
    /// # Errors
    /// Returns an error if a record does not match the declared columns or
    /// a value does not match its column type, or if the write fails.
    pub fn write(&mut self, rows: &[ConvertedRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let batch = self.to_batch(rows)?;
        let Some(writer) = self.writer.as_mut() else {
            bail!("write to finished sink {}", self.path.display());
        };
        writer.write(&batch).context("write batch to parquet")?;
        self.rows += rows.len();
        Ok(())
    }

    /// Close the writer and move the file into place.
    ///
    /// # Errors
    /// Returns an error if closing or renaming fails.
    pub fn finish(mut self) -> Result<usize> {
        let closed = match self.writer.take() {
            Some(writer) => writer.close().map(drop).context("close ArrowWriter"),
            None => Ok(()),
        };
        closed
            .and_then(|()| commit(&self.staging, &self.path))
            .inspect_err(|_| {
                let _ = std::fs::remove_file(&self.staging);
            })?;
        Ok(self.rows)
    }

    fn to_batch(&self, rows: &[ConvertedRecord]) -> Result<RecordBatch> {
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.schema.fields().len());
        if self.options.index {
            let start = self.rows as u64;
            arrays.push(Arc::new(UInt64Array::from_iter_values(
                start..start + rows.len() as u64,
            )));
        }
        for rec in rows {
            if rec.values().len() != self.columns.len() {
                bail!(
                    "line {}: record has {} columns, parquet schema has {}",
                    rec.line(),
                    rec.values().len(),
                    self.columns.len()
                );
            }
        }
        for (j, (name, ty)) in self.columns.iter().enumerate() {
            arrays.push(build_column(name, *ty, rows, j)?);
        }
        RecordBatch::try_new(Arc::clone(&self.schema), arrays).context("assemble RecordBatch")
    }
}

impl Drop for ParquetSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}

fn mismatch(name: &str, ty: ColumnType, rec: &ConvertedRecord, found: &Value) -> anyhow::Error {
    anyhow::anyhow!(
        "line {}: column `{name}` is declared {ty} but holds {found:?}",
        rec.line()
    )
}

fn build_column(
    name: &str,
    ty: ColumnType,
    rows: &[ConvertedRecord],
    j: usize,
) -> Result<ArrayRef> {
    let cells = rows.iter().map(|rec| (rec, &rec.values()[j]));
    let array: ArrayRef = match ty {
        ColumnType::Str => {
            let mut b = StringBuilder::with_capacity(rows.len(), rows.len() * 8);
            for (rec, v) in cells {
                match v {
                    Value::Null => b.append_null(),
                    Value::Str(s) => b.append_value(s),
                    other => return Err(mismatch(name, ty, rec, other)),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Int => {
            let mut b = Int64Builder::with_capacity(rows.len());
            for (rec, v) in cells {
                match v {
                    Value::Null => b.append_null(),
                    Value::Int(i) => b.append_value(*i),
                    other => return Err(mismatch(name, ty, rec, other)),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Float => {
            let mut b = Float64Builder::with_capacity(rows.len());
            for (rec, v) in cells {
                match v {
                    Value::Null => b.append_null(),
                    Value::Float(f) => b.append_value(*f),
                    other => return Err(mismatch(name, ty, rec, other)),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Bool => {
            let mut b = BooleanBuilder::with_capacity(rows.len());
            for (rec, v) in cells {
                match v {
                    Value::Null => b.append_null(),
                    Value::Bool(x) => b.append_value(*x),
                    other => return Err(mismatch(name, ty, rec, other)),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Date => {
            let mut b = Date32Builder::with_capacity(rows.len());
            for (rec, v) in cells {
                match v {
                    Value::Null => b.append_null(),
                    Value::Date(d) => b.append_value(date32_days(*d)),
                    other => return Err(mismatch(name, ty, rec, other)),
                }
            }
            Arc::new(b.finish())
        }
    };
    Ok(array)
}

/// Read a Parquet file into a typed `Vec<T>`.
///
/// Batches from `ParquetRecordBatchReaderBuilder` are converted with
/// `serde_arrow::from_record_batch` and appended in file order.
///
/// # Errors
/// Returns an error if the file cannot be opened or read, or if conversion to
/// `T` fails.
pub fn read_parquet_vec<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let mut out: Vec<T> = Vec::new();
    for batch in read_parquet_batches(path)? {
        let mut rows: Vec<T> =
            from_record_batch(&batch).context("deserialize RecordBatch rows to T")?;
        out.append(&mut rows);
    }
    Ok(out)
}

/// Read all record batches of a Parquet file.
///
/// # Errors
/// Returns an error if the file cannot be opened or a batch fails to decode.
pub fn read_parquet_batches(path: impl AsRef<Path>) -> Result<Vec<RecordBatch>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("open ParquetRecordBatchReader")?
        .with_batch_size(64 * 1024)
        .build()
        .context("build ParquetRecordBatchReader")?;
    reader
        .map(|batch| batch.context("read next batch"))
        .collect()
}

/// Footer summary of a Parquet file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParquetSummary {
    pub rows: u64,
    pub row_groups: usize,
    pub columns: Vec<String>,
    /// Codec of the first column chunk, if any row group exists.
    pub compression: Option<Compression>,
}

/// Summarize footer metadata without decoding data pages.
///
/// # Errors
/// Returns an error if the file cannot be opened or its footer is invalid.
pub fn inspect_parquet(path: impl AsRef<Path>) -> Result<ParquetSummary> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(f).context("open SerializedFileReader")?;
    let meta = reader.metadata();
    let row_groups = meta.num_row_groups();
    let rows = (0..row_groups)
        .map(|i| meta.row_group(i).num_rows().cast_unsigned())
        .sum();
    let columns = meta
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_owned())
        .collect();
    let compression = (row_groups > 0 && meta.row_group(0).num_columns() > 0)
        .then(|| meta.row_group(0).column(0).compression());
    Ok(ParquetSummary {
        rows,
        row_groups,
        columns,
        compression,
    })
}
