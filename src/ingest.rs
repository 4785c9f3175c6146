//! Read → convert → write driver.
//!
//! [`run`] streams records from a [`CsvSource`] in batches, converts each
//! batch with a [`ConversionPlan`], and appends the converted rows to the
//! configured sinks. Row order is preserved end to end, including when a
//! batch is converted in parallel (feature `parallel-io`).
//!
//! A fatal conversion error aborts the run. Sinks are dropped unfinished,
//! which removes their staging files, so no partial output is left behind.

use crate::convert::{ConversionPlan, RecordError};
use crate::io::csv::{CsvReadOptions, CsvSource};
use crate::io::jsonl::JsonlSink;
use crate::record::{ConvertedRecord, Record};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[cfg(feature = "io-parquet")]
use crate::io::parquet::{ParquetSink, ParquetWriteOptions};

/// Default number of records converted and written per batch.
pub const DEFAULT_BATCH_SIZE: usize = 65_536;

/// Everything one ingest run needs.
#[derive(Clone, Debug)]
pub struct IngestOptions {
    pub input: PathBuf,
    pub csv: CsvReadOptions,
    pub jsonl: Option<PathBuf>,
    #[cfg(feature = "io-parquet")]
    pub parquet: Option<PathBuf>,
    #[cfg(feature = "io-parquet")]
    pub parquet_options: ParquetWriteOptions,
    pub batch_size: usize,
    /// Convert each batch with rayon. Ignored without the `parallel-io` feature.
    pub parallel: bool,
}

impl IngestOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            csv: CsvReadOptions::default(),
            jsonl: None,
            #[cfg(feature = "io-parquet")]
            parquet: None,
            #[cfg(feature = "io-parquet")]
            parquet_options: ParquetWriteOptions::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
        }
    }
}

/// Counters from a completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Data rows read and converted.
    pub rows: usize,
    /// Cells nulled because a lenient decoder could not parse them.
    pub unparseable: usize,
    pub jsonl_rows: Option<usize>,
    pub parquet_rows: Option<usize>,
}

/// Run one ingest.
///
/// # Errors
/// Returns an error if the source cannot be read, a record fails conversion
/// fatally, or a sink fails to write or finish.
pub fn run(opts: &IngestOptions) -> Result<IngestReport> {
    let mut source = CsvSource::open(&opts.input, &opts.csv)?;
    let plan = ConversionPlan::new(
        source.columns(),
        &opts.csv.converters,
        &opts.csv.dtype,
        opts.csv.na_filter,
    );
    for column in plan.shadowed_hints() {
        warn!(%column, "both a converter and a dtype hint are set; using the converter");
    }
    for column in plan.unused_bindings() {
        debug!(%column, "converter bound to a column not in the input");
    }
    info!(
        input = %opts.input.display(),
        columns = plan.columns().len(),
        converters = opts.csv.converters.len(),
        "ingest started"
    );

    let mut jsonl = opts.jsonl.as_ref().map(JsonlSink::create).transpose()?;
    #[cfg(feature = "io-parquet")]
    let mut parquet = match &opts.parquet {
        Some(path) => Some(ParquetSink::create(
            path,
            &plan.output_columns(),
            &opts.parquet_options,
        )?),
        None => None,
    };

    let batch_size = opts.batch_size.max(1);
    let mut report = IngestReport::default();
    let mut batch: Vec<Record> = Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE));
    loop {
        batch.clear();
        for rec in source.by_ref().take(batch_size) {
            batch.push(rec?);
        }
        if batch.is_empty() {
            break;
        }
        let (converted, unparseable) = convert_batch(&plan, &batch, opts.parallel)?;
        report.rows += converted.len();
        report.unparseable += unparseable;

        if let Some(sink) = jsonl.as_mut() {
            sink.write(&converted)?;
        }
        #[cfg(feature = "io-parquet")]
        if let Some(sink) = parquet.as_mut() {
            sink.write(&converted)?;
        }
        debug!(rows = report.rows, "batch written");
    }

    if let Some(sink) = jsonl {
        report.jsonl_rows = Some(sink.finish()?);
    }
    #[cfg(feature = "io-parquet")]
    if let Some(sink) = parquet {
        report.parquet_rows = Some(sink.finish()?);
    }

    if report.unparseable > 0 {
        info!(cells = report.unparseable, "unparseable values replaced with null");
    }
    info!(
        rows = report.rows,
        jsonl_rows = ?report.jsonl_rows,
        parquet_rows = ?report.parquet_rows,
        "ingest finished"
    );
    Ok(report)
}

/// Convert a batch in input order, returning the rows and the unparseable count.
///
/// # Errors
/// Returns the first fatal [`RecordError`] (in parallel mode, any one of them).
pub fn convert_batch(
    plan: &ConversionPlan,
    batch: &[Record],
    parallel: bool,
) -> Result<(Vec<ConvertedRecord>, usize), RecordError> {
    let results: Vec<(ConvertedRecord, usize)> = if parallel && cfg!(feature = "parallel-io") {
        convert_par(plan, batch)?
    } else {
        batch
            .iter()
            .map(|rec| plan.apply(rec))
            .collect::<Result<_, _>>()?
    };
    let unparseable = results.iter().map(|(_, n)| n).sum();
    Ok((results.into_iter().map(|(rec, _)| rec).collect(), unparseable))
}

#[cfg(feature = "parallel-io")]
fn convert_par(
    plan: &ConversionPlan,
    batch: &[Record],
) -> Result<Vec<(ConvertedRecord, usize)>, RecordError> {
    use rayon::prelude::*;
    batch.par_iter().map(|rec| plan.apply(rec)).collect()
}

#[cfg(not(feature = "parallel-io"))]
fn convert_par(
    plan: &ConversionPlan,
    batch: &[Record],
) -> Result<Vec<(ConvertedRecord, usize)>, RecordError> {
    batch.iter().map(|rec| plan.apply(rec)).collect()
}
