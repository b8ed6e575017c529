//! Frame timing.
//!
//! One `FrameClock` per window; `tick()` once per drawn frame.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
