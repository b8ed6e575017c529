//! Prism engine crate.
//!
//! Platform and GPU runtime plus the render core that drives a pluggable compute
//! backend and displays its frames.

pub mod camera;
pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
