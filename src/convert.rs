//! Field converters: per-column functions applied to raw values as rows are
//! materialized from a delimited source.
//!
//! Three built-in converters cover the flight dataset:
//! - [`decode_date`] / [`DateDecoder`]: `YYYY-MM-DD` to a calendar date, with
//!   unparseable input mapped to a null sentinel ([`Decoded::Unparseable`]).
//! - [`strip_tag`] / [`TagStripper`]: drops a single leading tag character
//!   (`'N'` for tail numbers).
//! - [`coerce_int`] / [`IntCoercer`]: float-then-truncate integer coercion.
//!   Failures are fatal.
//!
//! Recoverable and fatal outcomes are kept apart by the converter signature:
//! `Ok(Decoded::Unparseable)` becomes `Value::Null` and processing continues,
//! `Err(ConvertError)` aborts the record.
//!
//! A [`ConverterMap`] binds converters to column names. Binding a column twice
//! is an error; use [`ConverterMap::rebind`] to replace a converter on purpose.
//! A [`ConversionPlan`] resolves the map and dtype hints against a concrete
//! header once, then converts records positionally.

use crate::record::{ColumnType, Columns, ConvertedRecord, Record, Value};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Leading character carried by registered tail numbers (`N12345`).
pub const TAIL_NUMBER_TAG: char = 'N';

/// The single accepted date layout.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors raised by converters and converter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("invalid number `{value}`: {reason}")]
    InvalidNumber { value: String, reason: &'static str },

    #[error("invalid boolean `{value}`")]
    InvalidBool { value: String },

    #[error("missing value")]
    MissingValue,

    #[error("column `{column}` already has a converter bound")]
    DuplicateBinding { column: String },

    #[error("unknown converter `{0}` (expected one of: date, strip-tag, int)")]
    UnknownConverter(String),

    #[error("unknown column type `{0}` (expected one of: str, int, float, bool, date)")]
    UnknownColumnType(String),

    #[error("unknown parquet codec `{0}` (expected one of: snappy, gzip, brotli, zstd, lz4, none)")]
    UnknownCompression(String),

    #[error("{0}")]
    Custom(String),
}

/// A fatal conversion failure, located by source line and column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("convert line {line}, column `{column}`")]
pub struct RecordError {
    pub line: u64,
    pub column: String,
    #[source]
    pub source: ConvertError,
}

/// Outcome of a lenient decode: a value, or an explicit "could not parse" marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded<T> {
    Parsed(T),
    Unparseable,
}

impl<T> Decoded<T> {
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, Decoded::Parsed(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Decoded::Parsed(v) => Some(v),
            Decoded::Unparseable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Parsed(v) => Decoded::Parsed(f(v)),
            Decoded::Unparseable => Decoded::Unparseable,
        }
    }
}

/// Parse exactly `YYYY-MM-DD`. Never fails: bad or missing input yields [`Decoded::Unparseable`].
///
/// ```
/// use chrono::NaiveDate;
/// use flightconv::convert::{decode_date, Decoded};
///
/// assert_eq!(
///     decode_date(Some("2019-11-28")),
///     Decoded::Parsed(NaiveDate::from_ymd_opt(2019, 11, 28).unwrap())
/// );
/// assert_eq!(decode_date(Some("not-a-date")), Decoded::Unparseable);
/// assert_eq!(decode_date(None), Decoded::Unparseable);
/// ```
#[must_use]
pub fn decode_date(raw: Option<&str>) -> Decoded<NaiveDate> {
    let Some(raw) = raw else {
        return Decoded::Unparseable;
    };
    if !is_iso_date_shape(raw) {
        return Decoded::Unparseable;
    }
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(d) => Decoded::Parsed(d),
        Err(_) => Decoded::Unparseable,
    }
}

/// `DDDD-DD-DD` with ASCII digits. chrono's `%Y` alone also takes signs,
/// short years and leading whitespace.
fn is_iso_date_shape(raw: &str) -> bool {
    let b = raw.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

/// Drop a leading [`TAIL_NUMBER_TAG`] from the textual form of `value`.
///
/// ```
/// use flightconv::convert::strip_tag;
///
/// assert_eq!(strip_tag("N12345"), "12345");
/// assert_eq!(strip_tag("12345"), "12345");
/// assert_eq!(strip_tag(987), "987");
/// assert_eq!(strip_tag("N"), "");
/// ```
#[must_use]
pub fn strip_tag(value: impl fmt::Display) -> String {
    strip_tag_with(value, TAIL_NUMBER_TAG)
}

/// Like [`strip_tag`] with a caller-chosen tag character. Strips at most one.
#[must_use]
pub fn strip_tag_with(value: impl fmt::Display, tag: char) -> String {
    let s = value.to_string();
    match s.strip_prefix(tag) {
        Some(rest) => rest.to_owned(),
        None => s,
    }
}

/// Parse as floating point, then truncate toward zero.
///
/// ```
/// use flightconv::convert::coerce_int;
///
/// assert_eq!(coerce_int("123.0").unwrap(), 123);
/// assert_eq!(coerce_int("123.9").unwrap(), 123);
/// assert!(coerce_int("abc").is_err());
/// ```
///
/// # Errors
/// Returns [`ConvertError::InvalidNumber`] if `raw` is not numeric, or if the
/// number is NaN, infinite, or outside the `i64` range.
pub fn coerce_int(raw: &str) -> Result<i64, ConvertError> {
    let parsed: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ConvertError::InvalidNumber {
            value: raw.to_owned(),
            reason: "not a number",
        })?;
    truncate_to_int(parsed).map_err(|err| match err {
        ConvertError::InvalidNumber { reason, .. } => ConvertError::InvalidNumber {
            value: raw.to_owned(),
            reason,
        },
        other => other,
    })
}

/// Truncate an already-numeric value toward zero.
///
/// # Errors
/// Returns [`ConvertError::InvalidNumber`] for non-finite or out-of-range values.
pub fn truncate_to_int(value: f64) -> Result<i64, ConvertError> {
    if !value.is_finite() {
        return Err(ConvertError::InvalidNumber {
            value: value.to_string(),
            reason: "not finite",
        });
    }
    let truncated = value.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(ConvertError::InvalidNumber {
            value: value.to_string(),
            reason: "out of range for a 64-bit integer",
        });
    }
    Ok(truncated as i64)
}

/// A pure function bound to exactly one column.
///
/// `raw` is `None` when the field is absent from a short row.
pub trait ColumnConverter: Send + Sync {
    /// Short name used in logs and CLI bindings.
    fn name(&self) -> &str;

    /// Type of every non-null value this converter produces.
    fn output_type(&self) -> ColumnType;

    /// Convert one raw value.
    ///
    /// # Errors
    /// A returned error is fatal to the record.
    fn convert(&self, raw: Option<&str>) -> Result<Decoded<Value>, ConvertError>;
}

/// [`decode_date`] as a converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct DateDecoder;

impl ColumnConverter for DateDecoder {
    fn name(&self) -> &str {
        "date"
    }

    fn output_type(&self) -> ColumnType {
        ColumnType::Date
    }

    fn convert(&self, raw: Option<&str>) -> Result<Decoded<Value>, ConvertError> {
        Ok(decode_date(raw).map(Value::Date))
    }
}

/// [`strip_tag_with`] as a converter. Absent fields become `""`.
#[derive(Clone, Copy, Debug)]
pub struct TagStripper {
    tag: char,
}

impl TagStripper {
    #[must_use]
    pub fn new(tag: char) -> Self {
        Self { tag }
    }
}

impl Default for TagStripper {
    fn default() -> Self {
        Self::new(TAIL_NUMBER_TAG)
    }
}

impl ColumnConverter for TagStripper {
    fn name(&self) -> &str {
        "strip-tag"
    }

    fn output_type(&self) -> ColumnType {
        ColumnType::Str
    }

    fn convert(&self, raw: Option<&str>) -> Result<Decoded<Value>, ConvertError> {
        Ok(Decoded::Parsed(Value::Str(strip_tag_with(
            raw.unwrap_or(""),
            self.tag,
        ))))
    }
}

/// [`coerce_int`] as a converter. Absent fields are an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntCoercer;

impl ColumnConverter for IntCoercer {
    fn name(&self) -> &str {
        "int"
    }

    fn output_type(&self) -> ColumnType {
        ColumnType::Int
    }

    fn convert(&self, raw: Option<&str>) -> Result<Decoded<Value>, ConvertError> {
        let raw = raw.ok_or(ConvertError::MissingValue)?;
        Ok(Decoded::Parsed(Value::Int(coerce_int(raw)?)))
    }
}

/// Wrap a closure as a converter with a declared output type.
///
/// ```
/// use flightconv::convert::{ColumnConverter, Decoded, FnConverter};
/// use flightconv::{ColumnType, Value};
///
/// let upper = FnConverter::new("upper", ColumnType::Str, |raw: Option<&str>| {
///     Ok(Decoded::Parsed(Value::Str(raw.unwrap_or("").to_uppercase())))
/// });
/// assert_eq!(upper.convert(Some("lax")).unwrap(), Decoded::Parsed(Value::from("LAX")));
/// ```
pub struct FnConverter<F> {
    name: String,
    output_type: ColumnType,
    f: F,
}

impl<F> FnConverter<F>
where
    F: Fn(Option<&str>) -> Result<Decoded<Value>, ConvertError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, output_type: ColumnType, f: F) -> Self {
        Self {
            name: name.into(),
            output_type,
            f,
        }
    }
}

impl<F> ColumnConverter for FnConverter<F>
where
    F: Fn(Option<&str>) -> Result<Decoded<Value>, ConvertError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn output_type(&self) -> ColumnType {
        self.output_type
    }

    fn convert(&self, raw: Option<&str>) -> Result<Decoded<Value>, ConvertError> {
        (self.f)(raw)
    }
}

/// Built-in converters addressable by name (`date`, `strip-tag`, `int`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinConverter {
    Date,
    StripTag,
    Int,
}

impl BuiltinConverter {
    #[must_use]
    pub fn into_converter(self) -> Arc<dyn ColumnConverter> {
        match self {
            BuiltinConverter::Date => Arc::new(DateDecoder),
            BuiltinConverter::StripTag => Arc::new(TagStripper::default()),
            BuiltinConverter::Int => Arc::new(IntCoercer),
        }
    }
}

impl FromStr for BuiltinConverter {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(BuiltinConverter::Date),
            "strip-tag" | "strip_tag" | "tag" => Ok(BuiltinConverter::StripTag),
            "int" | "integer" => Ok(BuiltinConverter::Int),
            other => Err(ConvertError::UnknownConverter(other.to_owned())),
        }
    }
}

/// Ordered column-name to converter bindings.
#[derive(Clone, Default)]
pub struct ConverterMap {
    bindings: Vec<(String, Arc<dyn ColumnConverter>)>,
}

impl fmt::Debug for ConverterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.bindings.iter().map(|(c, conv)| (c, conv.name())))
            .finish()
    }
}

impl ConverterMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for the flight dataset.
    ///
    /// `flight_time` is numeric (minutes), not a date.
    #[must_use]
    pub fn flight_defaults() -> Self {
        Self {
            bindings: vec![
                ("date".to_owned(), BuiltinConverter::Date.into_converter()),
                (
                    "tailnumber".to_owned(),
                    BuiltinConverter::StripTag.into_converter(),
                ),
                (
                    "flight_time".to_owned(),
                    BuiltinConverter::Int.into_converter(),
                ),
                ("distance".to_owned(), BuiltinConverter::Int.into_converter()),
            ],
        }
    }

    /// Bind `converter` to `column`.
    ///
    /// # Errors
    /// Returns [`ConvertError::DuplicateBinding`] if `column` is already bound.
    pub fn bind(
        &mut self,
        column: impl Into<String>,
        converter: impl ColumnConverter + 'static,
    ) -> Result<&mut Self, ConvertError> {
        self.bind_arc(column, Arc::new(converter))
    }

    /// [`bind`](Self::bind) for an already shared converter.
    ///
    /// # Errors
    /// Returns [`ConvertError::DuplicateBinding`] if `column` is already bound.
    pub fn bind_arc(
        &mut self,
        column: impl Into<String>,
        converter: Arc<dyn ColumnConverter>,
    ) -> Result<&mut Self, ConvertError> {
        let column = column.into();
        if self.get(&column).is_some() {
            return Err(ConvertError::DuplicateBinding { column });
        }
        self.bindings.push((column, converter));
        Ok(self)
    }

    /// Replace (or add) the binding for `column`, returning the previous converter.
    pub fn rebind(
        &mut self,
        column: impl Into<String>,
        converter: Arc<dyn ColumnConverter>,
    ) -> Option<Arc<dyn ColumnConverter>> {
        let column = column.into();
        match self.bindings.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, converter)),
            None => {
                self.bindings.push((column, converter));
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Arc<dyn ColumnConverter>> {
        self.bindings
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, conv)| conv)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(c, _)| c.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Convert one record with these bindings, no dtype hints, and NA filtering on.
    ///
    /// For batches, build a [`ConversionPlan`] once and reuse it.
    ///
    /// # Errors
    /// Returns a [`RecordError`] when a converter fails fatally.
    pub fn convert_record(&self, record: &Record) -> Result<ConvertedRecord, RecordError> {
        let plan = ConversionPlan::new(record.columns(), self, &BTreeMap::new(), true);
        plan.apply(record).map(|(rec, _)| rec)
    }
}

#[derive(Clone)]
enum ColumnRule {
    Converter(Arc<dyn ColumnConverter>),
    Hint(ColumnType),
    Raw,
}

/// Converters and dtype hints resolved against one header.
#[derive(Clone)]
pub struct ConversionPlan {
    columns: Columns,
    rules: Vec<ColumnRule>,
    na_filter: bool,
    shadowed_hints: Vec<String>,
    unused_bindings: Vec<String>,
}

impl ConversionPlan {
    /// Resolve rules for `columns`.
    ///
    /// A converter takes precedence over a dtype hint on the same column.
    /// Bindings for columns not present in `columns` are recorded in
    /// [`unused_bindings`](Self::unused_bindings) and otherwise ignored.
    #[must_use]
    pub fn new(
        columns: &Columns,
        converters: &ConverterMap,
        dtype: &BTreeMap<String, ColumnType>,
        na_filter: bool,
    ) -> Self {
        let mut shadowed_hints = Vec::new();
        let rules = columns
            .iter()
            .map(|column| match (converters.get(column), dtype.get(column)) {
                (Some(conv), hint) => {
                    if hint.is_some() {
                        shadowed_hints.push(column.clone());
                    }
                    ColumnRule::Converter(Arc::clone(conv))
                }
                (None, Some(ty)) => ColumnRule::Hint(*ty),
                (None, None) => ColumnRule::Raw,
            })
            .collect();
        let unused_bindings = converters
            .columns()
            .filter(|c| !columns.iter().any(|col| col == c))
            .map(str::to_owned)
            .collect();
        Self {
            columns: Arc::clone(columns),
            rules,
            na_filter,
            shadowed_hints,
            unused_bindings,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// `(column, type)` pairs in column order, as the sinks need them.
    #[must_use]
    pub fn output_columns(&self) -> Vec<(String, ColumnType)> {
        self.columns
            .iter()
            .zip(&self.rules)
            .map(|(column, rule)| {
                let ty = match rule {
                    ColumnRule::Converter(conv) => conv.output_type(),
                    ColumnRule::Hint(ty) => *ty,
                    ColumnRule::Raw => ColumnType::Str,
                };
                (column.clone(), ty)
            })
            .collect()
    }

    /// Columns carrying both a converter and a dtype hint (the hint is ignored).
    #[must_use]
    pub fn shadowed_hints(&self) -> &[String] {
        &self.shadowed_hints
    }

    /// Bound columns absent from the header.
    #[must_use]
    pub fn unused_bindings(&self) -> &[String] {
        &self.unused_bindings
    }

    /// Convert one record. Also returns how many cells were unparseable and nulled.
    ///
    /// `record` must share this plan's column layout.
    ///
    /// # Errors
    /// Returns a [`RecordError`] for the first fatal conversion failure.
    pub fn apply(&self, record: &Record) -> Result<(ConvertedRecord, usize), RecordError> {
        let mut values = Vec::with_capacity(self.rules.len());
        let mut unparseable = 0usize;
        for (idx, rule) in self.rules.iter().enumerate() {
            let raw = record.value(idx);
            let decoded = match rule {
                ColumnRule::Converter(conv) => conv.convert(raw),
                ColumnRule::Hint(ty) => apply_hint(*ty, raw, self.na_filter),
                ColumnRule::Raw => Ok(Decoded::Parsed(raw_value(raw, self.na_filter))),
            }
            .map_err(|source| RecordError {
                line: record.line(),
                column: self.columns[idx].clone(),
                source,
            })?;
            match decoded {
                Decoded::Parsed(v) => values.push(v),
                Decoded::Unparseable => {
                    unparseable += 1;
                    values.push(Value::Null);
                }
            }
        }
        Ok((
            ConvertedRecord::new(Arc::clone(&self.columns), values, record.line()),
            unparseable,
        ))
    }
}

fn raw_value(raw: Option<&str>, na_filter: bool) -> Value {
    match raw {
        Some(s) if !(na_filter && s.is_empty()) => Value::Str(s.to_owned()),
        Some(_) | None if na_filter => Value::Null,
        _ => Value::Str(String::new()),
    }
}

fn apply_hint(
    ty: ColumnType,
    raw: Option<&str>,
    na_filter: bool,
) -> Result<Decoded<Value>, ConvertError> {
    if ty == ColumnType::Str {
        return Ok(Decoded::Parsed(raw_value(raw, na_filter)));
    }
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(Decoded::Parsed(Value::Null)),
    };
    let value = match ty {
        ColumnType::Int => Value::Int(raw.trim().parse().map_err(|_| {
            ConvertError::InvalidNumber {
                value: raw.to_owned(),
                reason: "not an integer",
            }
        })?),
        ColumnType::Float => Value::Float(raw.trim().parse().map_err(|_| {
            ConvertError::InvalidNumber {
                value: raw.to_owned(),
                reason: "not a number",
            }
        })?),
        ColumnType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => {
                return Err(ConvertError::InvalidBool {
                    value: raw.to_owned(),
                });
            }
        },
        ColumnType::Date => return Ok(decode_date(Some(raw)).map(Value::Date)),
        ColumnType::Str => Value::Str(raw.to_owned()),
    };
    Ok(Decoded::Parsed(value))
}
