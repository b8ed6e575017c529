use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::target::TargetSize;

/// Failure while switching the scene source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The reference is malformed or does not name a local file. Rejected before any I/O.
    #[error("source {source_ref:?} is invalid: {reason}")]
    InvalidSource {
        source_ref: String,
        reason: &'static str,
    },

    #[error("unable to open file {path} to read")]
    Open {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("unable to map file {path} to memory")]
    Map {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Tearing down the previous mapping failed. The mapping is gone regardless.
    #[error("unable to release mapping of file {path}")]
    Unmap { path: PathBuf },

    /// The backend refused the mapped bytes; the mapping was dropped.
    #[error("backend rejected scene buffer for file {path}")]
    Registration { path: PathBuf },
}

/// Failure of an engine lifecycle operation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("compute backend failed to initialize")]
    BackendInit,

    #[error("frame target size {0} has a zero dimension")]
    EmptyTarget(TargetSize),

    #[error("frame target size {size} exceeds device limits ({reason})")]
    TargetTooLarge {
        size: TargetSize,
        reason: &'static str,
    },

    #[error("backend rejected interop registration of the transfer buffer")]
    InteropRegistration,
}
