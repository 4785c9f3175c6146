//! Delimited-text reader.
//!
//! [`CsvSource`] opens a file (decompressing `.gz`/`.zst`/... transparently)
//! and yields [`Record`]s lazily, one per data row. [`CsvReadOptions`] carries
//! the reader options plus the dtype hints and converters that the ingest
//! driver resolves against the header:
//!
//! - `delimiter`: field separator byte (default `,`)
//! - `header`: 0-based row holding column names; rows above it are skipped.
//!   `None` means the file has no header row.
//! - `names`: explicit column names, overriding any header row
//! - `usecols`: subset of columns to keep, in file order
//! - `nrows`: upper bound on data rows materialized
//! - `dtype`, `na_filter`, `converters`: see [`ConversionPlan`](crate::convert::ConversionPlan)
//!
//! Rows may be shorter than the header; missing trailing fields are absent
//! (`None`). Rows longer than the header are an error.

use crate::convert::ConverterMap;
use crate::io::compression::auto_detect_reader;
use crate::record::{ColumnType, Columns, Record};
use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Reader options for [`CsvSource`].
#[derive(Clone, Debug)]
pub struct CsvReadOptions {
    pub delimiter: u8,
    pub header: Option<usize>,
    pub names: Option<Vec<String>>,
    pub usecols: Option<Vec<String>>,
    pub nrows: Option<usize>,
    pub dtype: BTreeMap<String, ColumnType>,
    pub na_filter: bool,
    pub converters: ConverterMap,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header: Some(0),
            names: None,
            usecols: None,
            nrows: None,
            dtype: BTreeMap::new(),
            na_filter: true,
            converters: ConverterMap::new(),
        }
    }
}

impl CsvReadOptions {
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_header(mut self, header: Option<usize>) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub fn with_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_usecols<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.usecols = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_nrows(mut self, nrows: usize) -> Self {
        self.nrows = Some(nrows);
        self
    }

    #[must_use]
    pub fn with_dtype(mut self, column: impl Into<String>, ty: ColumnType) -> Self {
        self.dtype.insert(column.into(), ty);
        self
    }

    #[must_use]
    pub fn with_na_filter(mut self, na_filter: bool) -> Self {
        self.na_filter = na_filter;
        self
    }

    #[must_use]
    pub fn with_converters(mut self, converters: ConverterMap) -> Self {
        self.converters = converters;
        self
    }
}

/// Lazy record iterator over one delimited file.
pub struct CsvSource {
    path: PathBuf,
    columns: Columns,
    keep: Vec<usize>,
    width: usize,
    records: csv::StringRecordsIntoIter<Box<dyn Read>>,
    pending: Option<StringRecord>,
    remaining: Option<usize>,
    rows_read: u64,
}

impl CsvSource {
    /// Open `path` and resolve its header against `opts`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or decompressed, the
    /// header row cannot be parsed, or a `usecols` entry names an unknown column.
    pub fn open(path: impl AsRef<Path>, opts: &CsvReadOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let rdr = auto_detect_reader(f, &path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        let mut records = csv::ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr)
            .into_records();

        let mut header_row = None;
        if let Some(header_idx) = opts.header {
            for i in 0..=header_idx {
                let Some(row) = records.next() else { break };
                let row = row.with_context(|| {
                    format!("parse CSV header row #{} in {}", i + 1, path.display())
                })?;
                if i == header_idx {
                    header_row = Some(row);
                }
            }
        }

        let mut pending = None;
        let file_columns: Vec<String> = match (&opts.names, header_row) {
            (Some(names), _) => names.clone(),
            (None, Some(row)) => dedupe_columns(row.iter().map(str::to_owned).collect()),
            (None, None) if opts.header.is_some() => Vec::new(),
            (None, None) => {
                pending = records
                    .next()
                    .transpose()
                    .with_context(|| format!("parse CSV record #1 in {}", path.display()))?;
                let width = pending.as_ref().map_or(0, StringRecord::len);
                (0..width).map(|i| i.to_string()).collect()
            }
        };

        let keep: Vec<usize> = match &opts.usecols {
            Some(wanted) => {
                let mut idx = Vec::with_capacity(wanted.len());
                for name in wanted {
                    let i = file_columns
                        .iter()
                        .position(|c| c == name)
                        .with_context(|| {
                            format!("usecols column `{name}` not found in {}", path.display())
                        })?;
                    idx.push(i);
                }
                idx.sort_unstable();
                idx.dedup();
                idx
            }
            None => (0..file_columns.len()).collect(),
        };
        let columns: Columns = keep.iter().map(|&i| file_columns[i].clone()).collect();

        Ok(Self {
            path,
            columns,
            keep,
            width: file_columns.len(),
            records,
            pending,
            remaining: opts.nrows,
            rows_read: 0,
        })
    }

    /// Retained column names, in file order.
    #[must_use]
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows yielded so far.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn to_record(&self, row: &StringRecord) -> Result<Record> {
        let line = row.position().map_or(self.rows_read, |p| p.line());
        if row.len() > self.width {
            return Err(anyhow!(
                "line {line} of {}: expected {} fields, found {}",
                self.path.display(),
                self.width,
                row.len()
            ));
        }
        let values = self
            .keep
            .iter()
            .map(|&i| row.get(i).map(str::to_owned))
            .collect();
        Ok(Record::new(self.columns.clone(), values, line))
    }
}

impl Iterator for CsvSource {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let row = match self.pending.take() {
            Some(row) => row,
            None => match self.records.next()? {
                Ok(row) => row,
                Err(e) => {
                    self.remaining = Some(0);
                    return Some(Err(anyhow::Error::new(e).context(format!(
                        "parse CSV record #{} in {}",
                        self.rows_read + 1,
                        self.path.display()
                    ))));
                }
            },
        };
        self.rows_read += 1;
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        let rec = self.to_record(&row);
        if rec.is_err() {
            self.remaining = Some(0);
        }
        Some(rec)
    }
}

/// Read every record of `path` into memory.
///
/// # Errors
/// See [`CsvSource::open`]; also fails on the first malformed row.
pub fn read_csv_records(path: impl AsRef<Path>, opts: &CsvReadOptions) -> Result<Vec<Record>> {
    CsvSource::open(path, opts)?.collect()
}

/// Suffix repeated header names: `a, a, a` becomes `a, a.1, a.2`.
fn dedupe_columns(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{name}.{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::dedupe_columns;

    #[test]
    fn repeated_header_names_get_suffixes() {
        let cols = dedupe_columns(vec!["a".into(), "b".into(), "a".into(), "a".into()]);
        assert_eq!(cols, vec!["a", "b", "a.1", "a.2"]);
    }
}
