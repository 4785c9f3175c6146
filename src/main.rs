//! `flightconv` command-line entry point.
//!
//! Reads a delimited file, applies the configured converters, and writes
//! JSON Lines and/or Parquet. Logging goes to stderr and is filtered by
//! `RUST_LOG` (falling back to `info`, or `debug` with `--verbose`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad arguments, unreadable input, fatal conversion failure, ...)

use clap::Parser;
use flightconv::cli::CliArgs;
use flightconv::ingest;
use std::process;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let args = CliArgs::parse();

    let fallback = if args.verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    fmt()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let opts = match args.into_options() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    if opts.jsonl.is_none() && opts.parquet.is_none() {
        tracing::warn!("no --jsonl or --parquet output given; converting without writing");
    }

    if let Err(e) = ingest::run(&opts) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
