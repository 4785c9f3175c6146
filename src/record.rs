//! Row types shared by readers, converters, and sinks.
//!
//! - [`Record`]: one tokenized input row, holding raw text per column.
//! - [`Value`]: a typed cell produced by a converter or a dtype hint.
//! - [`ConvertedRecord`]: the typed row handed to the JSONL and Parquet sinks.
//! - [`ColumnType`]: the declared type of a column, used for dtype hints and
//!   to derive the Parquet schema.
//!
//! Column names are shared between all rows of a source through [`Columns`]
//! (an `Arc<[String]>`), so cloning a record never copies the header.

use crate::convert::ConvertError;
use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Ordered column names shared by all rows of one source.
pub type Columns = Arc<[String]>;

/// One row of delimited input: column name to raw field text.
///
/// Values are positionally aligned with [`Record::columns`]. A field is `None`
/// when the source row was shorter than the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    columns: Columns,
    values: Vec<Option<String>>,
    line: u64,
}

impl Record {
    /// Build a record from shared column names and aligned raw values.
    ///
    /// `values` is padded with `None` (or truncated) to match `columns`.
    #[must_use]
    pub fn new(columns: Columns, mut values: Vec<Option<String>>, line: u64) -> Self {
        values.resize(columns.len(), None);
        Self {
            columns,
            values,
            line,
        }
    }

    /// Convenience constructor from `(column, raw)` pairs. The line number is 1.
    ///
    /// ```
    /// use flightconv::Record;
    ///
    /// let rec = Record::from_pairs(&[("tailnumber", "N12345"), ("distance", "1200.0")]);
    /// assert_eq!(rec.get("tailnumber"), Some("N12345"));
    /// ```
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let columns: Columns = pairs.iter().map(|(c, _)| (*c).to_owned()).collect();
        let values = pairs.iter().map(|(_, v)| Some((*v).to_owned())).collect();
        Self::new(columns, values, 1)
    }

    #[must_use]
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// 1-based line number of this row in the source file.
    #[must_use]
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Raw value at column position `idx`.
    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// Raw value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.value(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(|v| v.as_deref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Declared type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    Str,
    Int,
    Float,
    Bool,
    Date,
}

impl ColumnType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Str => "str",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Bool => "bool",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "str" | "string" | "utf8" => Ok(ColumnType::Str),
            "int" | "int64" | "integer" => Ok(ColumnType::Int),
            "float" | "float64" | "double" => Ok(ColumnType::Float),
            "bool" | "boolean" => Ok(ColumnType::Bool),
            "date" => Ok(ColumnType::Date),
            other => Err(ConvertError::UnknownColumnType(other.to_owned())),
        }
    }
}

/// A typed cell value.
///
/// Serializes untagged: `Null` as JSON `null`, dates as ISO `YYYY-MM-DD` strings.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
}

impl Value {
    /// The column type this value belongs to, or `None` for `Null`.
    #[must_use]
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Int(_) => Some(ColumnType::Int),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Str(_) => Some(ColumnType::Str),
            Value::Date(_) => Some(ColumnType::Date),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// A record after conversion: the same columns, each holding a [`Value`].
///
/// Serializes as a JSON object whose keys keep the source column order.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertedRecord {
    columns: Columns,
    values: Vec<Value>,
    line: u64,
}

impl ConvertedRecord {
    #[must_use]
    pub fn new(columns: Columns, values: Vec<Value>, line: u64) -> Self {
        Self {
            columns,
            values,
            line,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Source line the record was converted from.
    #[must_use]
    pub fn line(&self) -> u64 {
        self.line
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

impl Serialize for ConvertedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
