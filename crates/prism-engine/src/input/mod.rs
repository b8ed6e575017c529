//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! The runtime translates platform events into [`InputEvent`]s (see [`translate`]).
//!
//! Pointer coordinates are physical pixels, origin top-left, matching the surface the
//! frame is drawn to.

mod frame;
mod state;
mod translate;
mod types;

pub use frame::InputFrame;
pub use state::InputState;
pub use translate::translate_window_event;
pub use types::{ButtonState, InputEvent, Key, KeyState, MouseButton};
