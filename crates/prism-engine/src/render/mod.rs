//! Render core.
//!
//! A pluggable [`ComputeBackend`] computes each frame into a GPU transfer buffer; the
//! engine owns everything around it:
//! - the memory-mapped scene source and its backend registration ([`SourceBuffer`]);
//! - the frame texture, transfer buffer and interop registration ([`FrameTarget`]);
//! - the display pass that puts the transfer buffer on screen;
//! - the inverse camera transform handed to the backend every frame.
//!
//! Conventions:
//! - Frame sizes are in physical pixels.
//! - Transfer-buffer rows run bottom to top, matching window coordinates.
//! - Diagnostics go through an injected [`DiagnosticsSink`], never straight to `log`.

mod backend;
mod blit;
mod ctx;
mod diagnostics;
mod engine;
mod error;
mod source;
mod target;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{ComputeBackend, FrameParams, InteropHandle, RawHandle, SceneHandle, SharedBackend};
pub use ctx::{RenderCtx, RenderTarget};
pub use diagnostics::{DiagnosticsSink, LogSink, SharedSink, CRITICAL};
pub use engine::RenderEngine;
pub use error::{EngineError, SourceError};
pub use source::{parse_source, LocalSource, SourceBuffer};
pub use target::{transfer_size, FrameTarget, TargetSize, FRAME_TEXTURE_FORMAT, TRANSFER_PIXEL_BYTES};
