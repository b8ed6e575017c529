//! Logger setup for binaries built on the engine.
//!
//! Library code logs through the `log` facade only; the render core goes one step
//! further and reports through an injected sink (see `render::DiagnosticsSink`).

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
