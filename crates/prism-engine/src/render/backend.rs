//! Compute backend contract.
//!
//! The backend is the component that actually computes pixels. Its call surface is
//! fixed: a handful of lifecycle calls returning `bool` or a nullable handle. The
//! engine's job is to sequence those calls correctly, so the trait mirrors that surface
//! as-is, and everything above it (typed errors, ownership of handles) lives on the
//! engine side.
//!
//! Handle ownership:
//! - [`SceneHandle`] binds the memory-mapped source bytes. It must be released before
//!   the mapping goes away.
//! - [`InteropHandle`] binds the GPU transfer buffer. It must be released before the
//!   buffer is destroyed or reallocated.
//!
//! Both are acquired by registering and released by unregistering. A handle that is
//! dropped while still live releases itself, so a forgotten release never leaks a
//! backend registration.

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroU64;
use std::rc::Rc;

use glam::Mat4;

use super::diagnostics::{self, SharedSink, CRITICAL};

/// Opaque backend-side identifier. `Option<RawHandle>` is the nullable form.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RawHandle(NonZeroU64);

impl RawHandle {
    /// Wraps a backend id; zero is the null handle.
    #[inline]
    pub const fn new(id: u64) -> Option<Self> {
        match NonZeroU64::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-frame parameters handed to [`ComputeBackend::render_frame`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameParams {
    pub width: u32,
    pub height: u32,

    /// Maps window coordinates (pixels, depth in [0, 1]) back to world space.
    pub inverse_transform: Mat4,
}

/// Fixed call surface of a compute backend.
///
/// All calls are synchronous. Output written by `render_frame` must be visible to GPU
/// work submitted on the same queue after the call returns.
pub trait ComputeBackend {
    /// One-time initialization. Called once by the engine before any registration.
    fn init(&mut self) -> bool;

    /// Registers the scene bytes.
    ///
    /// The slice is the `(address, length)` of the mapping. The memory stays valid
    /// and unchanged until the returned handle is passed to `unregister_buffer`, so
    /// a backend may keep the address.
    fn register_scene_buffer(&mut self, scene: &[u8]) -> Option<RawHandle>;

    fn unregister_buffer(&mut self, handle: RawHandle) -> bool;

    /// Registers the transfer buffer the backend writes pixels into.
    ///
    /// The buffer holds `width * height` tightly packed RGB `f32` triplets, rows from
    /// bottom to top.
    fn register_interop_buffer(&mut self, buffer: &wgpu::Buffer) -> Option<RawHandle>;

    fn unregister_interop_buffer(&mut self, handle: RawHandle) -> bool;

    /// Computes one frame into the registered transfer buffer.
    ///
    /// `scene` is `None` when no source is bound.
    fn render_frame(
        &mut self,
        interop: RawHandle,
        scene: Option<RawHandle>,
        params: &FrameParams,
    ) -> bool;
}

/// Backend shared between the engine, its source buffer and its frame target.
pub type SharedBackend = Rc<RefCell<dyn ComputeBackend>>;

/// Owned registration of the mapped scene bytes.
pub struct SceneHandle {
    raw: RawHandle,
    live: bool,
    backend: SharedBackend,
    sink: SharedSink,
}

impl SceneHandle {
    /// Registers `scene` with the backend. `None` if the backend returned null.
    pub fn acquire(backend: &SharedBackend, sink: &SharedSink, scene: &[u8]) -> Option<Self> {
        let raw = backend.borrow_mut().register_scene_buffer(scene)?;
        Some(Self {
            raw,
            live: true,
            backend: Rc::clone(backend),
            sink: Rc::clone(sink),
        })
    }

    #[inline]
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Unregisters the scene. Returns the backend's verdict; the handle is spent either way.
    pub fn release(mut self) -> bool {
        self.live = false;
        self.backend.borrow_mut().unregister_buffer(self.raw)
    }
}

impl Drop for SceneHandle {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        if !self.backend.borrow_mut().unregister_buffer(self.raw) {
            diagnostics::report(
                &*self.sink,
                CRITICAL,
                format_args!("unable to unregister scene buffer {} on drop", self.raw),
            );
        }
    }
}

impl fmt::Debug for SceneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneHandle")
            .field("raw", &self.raw)
            .field("live", &self.live)
            .finish()
    }
}

/// Owned registration of the GPU transfer buffer.
pub struct InteropHandle {
    raw: RawHandle,
    live: bool,
    backend: SharedBackend,
    sink: SharedSink,
}

impl InteropHandle {
    pub fn acquire(
        backend: &SharedBackend,
        sink: &SharedSink,
        buffer: &wgpu::Buffer,
    ) -> Option<Self> {
        let raw = backend.borrow_mut().register_interop_buffer(buffer)?;
        Some(Self {
            raw,
            live: true,
            backend: Rc::clone(backend),
            sink: Rc::clone(sink),
        })
    }

    #[inline]
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn release(mut self) -> bool {
        self.live = false;
        self.backend.borrow_mut().unregister_interop_buffer(self.raw)
    }
}

impl Drop for InteropHandle {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        if !self.backend.borrow_mut().unregister_interop_buffer(self.raw) {
            diagnostics::report(
                &*self.sink,
                CRITICAL,
                format_args!("unable to unregister interop buffer {} on drop", self.raw),
            );
        }
    }
}

impl fmt::Debug for InteropHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteropHandle")
            .field("raw", &self.raw)
            .field("live", &self.live)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::{RecordingBackend, RecordingSink};

    fn setup() -> (Rc<RefCell<RecordingBackend>>, SharedBackend, SharedSink, Rc<RecordingSink>) {
        let recording = Rc::new(RefCell::new(RecordingBackend::default()));
        let backend: SharedBackend = recording.clone();
        let sink = Rc::new(RecordingSink::default());
        let shared_sink: SharedSink = sink.clone();
        (recording, backend, shared_sink, sink)
    }

    #[test]
    fn raw_handle_zero_is_null() {
        assert!(RawHandle::new(0).is_none());
        assert_eq!(RawHandle::new(7).map(RawHandle::get), Some(7));
    }

    #[test]
    fn scene_handle_release_unregisters_once() {
        let (recording, backend, sink, _) = setup();
        let handle = SceneHandle::acquire(&backend, &sink, b"abcd").unwrap();
        assert_eq!(recording.borrow().live_scenes(), 1);

        assert!(handle.release());
        let rec = recording.borrow();
        assert_eq!(rec.calls.unregister_buffer, 1);
        assert_eq!(rec.live_scenes(), 0);
    }

    #[test]
    fn scene_handle_dropped_while_live_unregisters() {
        let (recording, backend, sink, _) = setup();
        drop(SceneHandle::acquire(&backend, &sink, b"abcd").unwrap());
        assert_eq!(recording.borrow().calls.unregister_buffer, 1);
        assert_eq!(recording.borrow().live_scenes(), 0);
    }

    #[test]
    fn null_registration_yields_no_handle() {
        let (recording, backend, sink, _) = setup();
        recording.borrow_mut().fail_register_scene = true;
        assert!(SceneHandle::acquire(&backend, &sink, b"abcd").is_none());
        assert_eq!(recording.borrow().calls.register_scene, 1);
    }

    #[test]
    fn failed_unregister_on_drop_is_reported() {
        let (recording, backend, sink, captured) = setup();
        let handle = SceneHandle::acquire(&backend, &sink, b"abcd").unwrap();
        recording.borrow_mut().fail_unregister_buffer = true;
        drop(handle);
        assert_eq!(captured.count(CRITICAL), 1);
    }
}
