//! JSON Lines sink and helpers.
//!
//! - [`JsonlSink`]: streaming writer, one compact JSON object per line,
//!   staged and renamed into place on [`finish`](JsonlSink::finish)
//! - [`write_jsonl_vec`] / [`read_jsonl_vec`]: whole-file typed helpers
//!
//! Output is compressed when the target name ends in a codec extension
//! (`.jsonl.gz`, `.jsonl.zst`, ...). Empty and whitespace-only lines are
//! skipped on read.

use crate::io::compression::{TextWriter, auto_detect_reader, auto_detect_writer};
use crate::io::{commit, ensure_parent, staging_path};
use anyhow::{Context, Result, bail};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Streaming JSONL writer.
pub struct JsonlSink {
    path: PathBuf,
    staging: PathBuf,
    writer: Option<TextWriter>,
    rows: usize,
}

impl JsonlSink {
    /// Create the staging file for `path`, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the directories or file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;
        let staging = staging_path(&path);
        let f = File::create(&staging).with_context(|| format!("create {}", staging.display()))?;
        // codec comes from the final name; the staging name ends in `.tmp`
        let writer = auto_detect_writer(f, &path)
            .with_context(|| format!("setup compression for {}", path.display()))?;
        Ok(Self {
            path,
            staging,
            writer: Some(writer),
            rows: 0,
        })
    }

    /// Append `rows`, one line each, in slice order.
    ///
    /// # Errors
    /// Returns an error if a row fails to serialize or the write fails.
    pub fn write<T: Serialize>(&mut self, rows: &[T]) -> Result<()> {
        let Some(w) = self.writer.as_mut() else {
            bail!("write to finished sink {}", self.path.display());
        };
        for item in rows {
            serde_json::to_writer(&mut *w, item).with_context(|| {
                format!("serialize row #{} to {}", self.rows + 1, self.path.display())
            })?;
            w.write_all(b"\n")?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush, finalize compression, and move the file into place.
    ///
    /// On error the staging file is removed and nothing is committed.
    ///
    /// # Errors
    /// Returns an error if finalizing the stream or renaming fails.
    pub fn finish(mut self) -> Result<usize> {
        let finished = match self.writer.take() {
            Some(w) => w
                .finish()
                .with_context(|| format!("finish {}", self.staging.display())),
            None => Ok(()),
        };
        finished
            .and_then(|()| commit(&self.staging, &self.path))
            .inspect_err(|_| {
                let _ = std::fs::remove_file(&self.staging);
            })?;
        Ok(self.rows)
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        if let Some(w) = self.writer.take() {
            drop(w);
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}

/// Write a typed slice as a JSONL file (one JSON value per line).
///
/// # Returns
/// The number of items written (`data.len()`).
///
/// # Errors
/// Returns an error if the file cannot be created or any item fails to
/// serialize/flush.
pub fn write_jsonl_vec<T: Serialize>(path: impl AsRef<Path>, data: &[T]) -> Result<usize> {
    let mut sink = JsonlSink::create(path)?;
    sink.write(data)?;
    sink.finish()
}

/// Read a JSONL file into a typed `Vec<T>`.
///
/// # Errors
/// Returns an error if the file cannot be opened or read, or if any line fails
/// to parse into `T`. Errors carry the line number.
pub fn read_jsonl_vec<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    let rdr = BufReader::new(rdr);
    let mut out = Vec::<T>::new();
    for (i, line) in rdr.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let v: T = serde_json::from_str(&line).with_context(|| {
            format!("parse JSONL line {} in {}: {}", i + 1, path.display(), line)
        })?;
        out.push(v);
    }
    Ok(out)
}
