//! Readers and sinks.
//!
//! Sinks write to a staging file next to the target (`<name>.tmp`) and rename
//! it into place on `finish()`. A sink dropped before `finish()` removes its
//! staging file, so an aborted run leaves no partial output.

use anyhow::{Context, Result};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

pub mod compression;
pub mod csv;
pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;

/// Staging path for `path`: the same name with `.tmp` appended.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Create the parent directories of `path` when missing.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    Ok(())
}

/// Move a finished staging file onto its target.
pub(crate) fn commit(staging: &Path, path: &Path) -> Result<()> {
    std::fs::rename(staging, path)
        .with_context(|| format!("rename {} -> {}", staging.display(), path.display()))
}
