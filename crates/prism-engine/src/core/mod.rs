//! Contracts between the runtime loop and the application.
//!
//! The runtime owns the window, GPU context, input state and clock; an [`App`] only
//! sees them through [`FrameCtx`] for the duration of a callback.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
