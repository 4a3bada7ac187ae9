//! Error types for the harness/CLI boundary.
//!
//! The container core never returns a [`Result`] — "empty" is `None`, not an
//! error. Everything fallible lives at the edges: argument parsing and file
//! I/O in the `concurrent-buffers` binary.

use std::path::PathBuf;

/// Errors surfaced by the `concurrent-buffers` harness binary.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The input or output file could not be opened, read, or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A line of the input file was not a valid integer.
    #[error("input line {line} is not a valid integer: {source}")]
    Parse {
        /// 1-indexed line number within the input file.
        line: usize,
        /// Underlying parse failure.
        #[source]
        source: std::num::ParseIntError,
    },

    /// The CLI arguments were inconsistent or incomplete.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}
