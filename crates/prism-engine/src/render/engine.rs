//! The render engine: sequencing of backend, source, target and display pass.
//!
//! Lifecycle:
//! - `new`: display pipelines built, backend initialized, initial source applied.
//! - `init(size)`: frame target (re)built; required before the first `render_frame`
//!   and again on every surface size change.
//! - `render_frame`: backend computes into the transfer buffer, then the display pass
//!   records texture update and full-screen draw.
//! - drop: scene handle, interop handle, GPU objects, file mapping, in that order.

use glam::Mat4;

use crate::camera::{try_inverse, viewport_matrix};

use super::backend::{FrameParams, SceneHandle, SharedBackend};
use super::blit::{DisplayBindings, DisplayPass};
use super::ctx::{RenderCtx, RenderTarget};
use super::diagnostics::{self, SharedSink, CRITICAL};
use super::error::{EngineError, SourceError};
use super::source::SourceBuffer;
use super::target::{FrameTarget, TargetSize};

/// Drives a [`ComputeBackend`](super::ComputeBackend) and puts its frames on screen.
///
/// Single-threaded: every call, including the backend's, happens on the thread that
/// owns the engine.
pub struct RenderEngine {
    device: wgpu::Device,

    source: SourceBuffer,
    target: FrameTarget,
    display: DisplayPass,
    // Rebuilt with every target allocation.
    bindings: Option<DisplayBindings>,

    /// Last accepted camera transform, re-applied by `init`.
    camera: Option<Mat4>,
    inverse_transform: Mat4,

    backend: SharedBackend,
    sink: SharedSink,
}

impl RenderEngine {
    /// Creates the engine and initializes `backend`.
    ///
    /// `source` is applied right away; a bad initial source is reported through `sink`
    /// and leaves the engine without a scene.
    pub fn new(
        ctx: &RenderCtx<'_>,
        backend: SharedBackend,
        sink: SharedSink,
        source: &str,
    ) -> Result<Self, EngineError> {
        let display = DisplayPass::new(ctx.device, ctx.surface_format);

        if !backend.borrow_mut().init() {
            diagnostics::report(&*sink, CRITICAL, format_args!("unable to initialize compute backend"));
            display.destroy();
            return Err(EngineError::BackendInit);
        }

        let mut engine = Self {
            device: ctx.device.clone(),
            source: SourceBuffer::new(backend.clone(), sink.clone()),
            target: FrameTarget::new(backend.clone(), sink.clone()),
            display,
            bindings: None,
            camera: None,
            inverse_transform: Mat4::IDENTITY,
            backend,
            sink,
        };

        // Already reported by the source buffer.
        let _ = engine.source.set_source(source);

        Ok(engine)
    }

    /// Rebuilds the frame target at `size` and re-applies the camera transform.
    ///
    /// On error the engine is not ready and `render_frame` must not be called until a
    /// later `init` succeeds.
    pub fn init(&mut self, size: TargetSize) -> Result<(), EngineError> {
        self.bindings = None;
        let result = self.target.init(&self.device, size);
        self.bindings = self.display.bind(&self.device, &self.target);

        if let Some(camera) = self.camera {
            self.apply_transform(camera);
        }

        if result.is_ok() {
            diagnostics::report(
                &*self.sink,
                log::Level::Debug,
                format_args!("frame target initialized at {size}"),
            );
        }
        result
    }

    /// Computes one frame and records its display into `target`.
    ///
    /// A backend failure is reported and the previous transfer buffer content is shown
    /// again.
    ///
    /// Panics if the engine is not ready (no successful [`init`](Self::init)).
    pub fn render_frame(&mut self, target: &mut RenderTarget<'_>) {
        let Some(interop) = self.target.interop().map(|h| h.raw()) else {
            panic!("render_frame without a registered interop buffer");
        };
        let Some(bindings) = self.bindings.as_ref() else {
            panic!("render_frame without a frame target");
        };

        let size = self.target.size();
        let params = FrameParams {
            width: size.width,
            height: size.height,
            inverse_transform: self.inverse_transform,
        };
        let scene = self.source.scene_handle().map(SceneHandle::raw);

        // The backend submits its own work, so it is ordered before the display pass.
        if !self.backend.borrow_mut().render_frame(interop, scene, &params) {
            diagnostics::report(
                &*self.sink,
                CRITICAL,
                format_args!("backend failed to render frame ({size}); showing previous frame"),
            );
        }

        self.display.record(bindings, target);
    }

    /// Sets the camera transform (projection * model-view).
    ///
    /// The stored inverse is `inverse(viewport * transform)`. A transform that cannot
    /// be inverted is ignored and the previous inverse kept.
    pub fn set_transform(&mut self, transform: Mat4) {
        if self.apply_transform(transform) || self.target.size().is_empty() {
            // Before the first init every transform is singular against the empty
            // viewport; keep it for `init` to retry.
            self.camera = Some(transform);
        }
    }

    /// Switches the scene source. See [`SourceBuffer::set_source`].
    pub fn set_source(&mut self, source: &str) -> Result<bool, SourceError> {
        self.source.set_source(source)
    }

    #[inline]
    pub fn target_size(&self) -> TargetSize {
        self.target.size()
    }

    #[inline]
    pub fn inverse_transform(&self) -> Mat4 {
        self.inverse_transform
    }

    /// True when `render_frame` may be called.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.target.is_ready() && self.bindings.is_some()
    }

    #[inline]
    pub fn source_buffer(&self) -> &SourceBuffer {
        &self.source
    }

    #[inline]
    pub fn frame_target(&self) -> &FrameTarget {
        &self.target
    }

    fn apply_transform(&mut self, transform: Mat4) -> bool {
        match try_inverse(viewport_matrix(self.target.size()) * transform) {
            Some(inverse) => {
                self.inverse_transform = inverse;
                true
            }
            None => false,
        }
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        // Backend handles first, then GPU objects, then the file mapping.
        self.source.unregister_scene();
        self.target.release_interop();

        self.bindings = None;
        self.target.destroy_allocation();
        self.display.destroy();

        // Failures were already reported to the sink.
        let _ = self.source.unmap();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    use log::Level;
    use tempfile::NamedTempFile;
    use url::Url;

    use super::*;
    use crate::render::test_support::{
        headless_device, offscreen_view, RecordingBackend, RecordingSink, TEST_SURFACE_FORMAT,
    };

    struct Fixture {
        device: wgpu::Device,
        queue: wgpu::Queue,
        recording: Rc<RefCell<RecordingBackend>>,
        sink: Rc<RecordingSink>,
    }

    impl Fixture {
        fn new() -> Self {
            let (device, queue) = headless_device();
            Self {
                device,
                queue,
                recording: Rc::new(RefCell::new(RecordingBackend::default())),
                sink: Rc::new(RecordingSink::default()),
            }
        }

        fn engine(&self, source: &str) -> Result<RenderEngine, EngineError> {
            let ctx = RenderCtx::new(
                &self.device,
                &self.queue,
                TEST_SURFACE_FORMAT,
                TargetSize::new(800, 600),
            );
            RenderEngine::new(&ctx, self.recording.clone(), self.sink.clone(), source)
        }

        fn render(&self, engine: &mut RenderEngine) {
            let size = engine.target_size();
            let view = offscreen_view(&self.device, size.width.max(1), size.height.max(1));
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            {
                let mut target = RenderTarget::new(&mut encoder, &view);
                engine.render_frame(&mut target);
            }
            self.queue.submit([encoder.finish()]);
        }
    }

    fn scene_file() -> (NamedTempFile, String) {
        let mut file = NamedTempFile::new().unwrap();
        let sphere: [f32; 4] = [0.0, 0.0, -3.0, 1.0];
        for v in sphere {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        let url = Url::from_file_path(file.path()).unwrap().to_string();
        (file, url)
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn new_initializes_backend_once() {
        let fx = Fixture::new();
        let engine = fx.engine("").unwrap();

        assert_eq!(fx.recording.borrow().calls.init, 1);
        assert!(!engine.is_ready());
        assert!(engine.target_size().is_empty());
    }

    #[test]
    fn backend_init_failure_is_an_error() {
        let fx = Fixture::new();
        fx.recording.borrow_mut().fail_init = true;

        let err = fx.engine("").err().unwrap();

        assert!(matches!(err, EngineError::BackendInit));
        assert_eq!(fx.sink.count(CRITICAL), 1);
    }

    #[test]
    fn bad_initial_source_is_reported_not_fatal() {
        let fx = Fixture::new();
        let engine = fx.engine("https://example.com/scene.bin").unwrap();

        assert!(!engine.source_buffer().is_mapped());
        assert_eq!(fx.sink.count(Level::Warn), 1);
    }

    // ── frames ────────────────────────────────────────────────────────────

    #[test]
    fn end_to_end_frame_at_800x600() {
        let fx = Fixture::new();
        let (_file, url) = scene_file();
        let mut engine = fx.engine("").unwrap();

        engine.init(TargetSize::new(800, 600)).unwrap();
        assert!(engine.set_source(&url).unwrap());
        engine.set_transform(Mat4::IDENTITY);
        fx.render(&mut engine);

        let texture = engine.frame_target().texture().unwrap();
        assert_eq!((texture.width(), texture.height()), (800, 600));

        let rec = fx.recording.borrow();
        assert_eq!(rec.frames.len(), 1);
        let (_, scene, params) = rec.frames[0];
        assert!(scene.is_some());
        assert_eq!((params.width, params.height), (800, 600));
        assert_eq!(rec.scene_lengths, vec![16]);
        assert_eq!(fx.sink.count(CRITICAL), 0);
    }

    #[test]
    fn frame_without_source_passes_no_scene() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        engine.init(TargetSize::new(64, 32)).unwrap();

        fx.render(&mut engine);

        assert_eq!(fx.recording.borrow().frames[0].1, None);
    }

    #[test]
    fn backend_render_failure_is_reported_and_frame_still_displayed() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        engine.init(TargetSize::new(64, 64)).unwrap();
        fx.recording.borrow_mut().fail_render = true;

        fx.render(&mut engine);
        fx.render(&mut engine);

        assert_eq!(fx.recording.borrow().calls.render_frame, 2);
        assert_eq!(fx.sink.count(CRITICAL), 2);
        assert!(fx.sink.contains("backend failed to render frame"));
    }

    #[test]
    #[should_panic(expected = "render_frame without a registered interop buffer")]
    fn render_before_init_panics() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        fx.render(&mut engine);
    }

    #[test]
    #[should_panic(expected = "render_frame without a registered interop buffer")]
    fn render_after_failed_interop_registration_panics() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        fx.recording.borrow_mut().fail_register_interop = true;
        assert!(engine.init(TargetSize::new(64, 64)).is_err());
        fx.render(&mut engine);
    }

    #[test]
    fn reinit_keeps_one_interop_and_resizes_frames() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();

        engine.init(TargetSize::new(800, 600)).unwrap();
        engine.init(TargetSize::new(320, 200)).unwrap();
        fx.render(&mut engine);

        let rec = fx.recording.borrow();
        assert_eq!(rec.max_live_interop, 1);
        assert_eq!(rec.interop_sizes.last(), Some(&(320 * 200 * 12)));
        let (_, _, params) = rec.frames[0];
        assert_eq!((params.width, params.height), (320, 200));
    }

    // ── transform ─────────────────────────────────────────────────────────

    #[test]
    fn invertible_transform_stores_inverse_of_viewport_product() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        let size = TargetSize::new(800, 600);
        engine.init(size).unwrap();

        let t = Mat4::perspective_rh_gl(1.0, 4.0 / 3.0, 0.1, 10.0);
        engine.set_transform(t);

        let expected = (viewport_matrix(size) * t).inverse();
        assert!(engine.inverse_transform().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn non_invertible_transform_keeps_previous_inverse() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        engine.init(TargetSize::new(800, 600)).unwrap();
        engine.set_transform(Mat4::IDENTITY);
        let before = engine.inverse_transform();

        engine.set_transform(Mat4::ZERO);

        assert_eq!(engine.inverse_transform(), before);
        assert_eq!(fx.sink.messages().len(), 1); // only the init debug line
    }

    #[test]
    fn frame_params_carry_current_inverse() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        engine.init(TargetSize::new(64, 64)).unwrap();
        engine.set_transform(Mat4::from_scale(glam::Vec3::splat(2.0)));

        fx.render(&mut engine);

        let (_, _, params) = fx.recording.borrow().frames[0];
        assert_eq!(params.inverse_transform, engine.inverse_transform());
    }

    #[test]
    fn transform_set_before_init_applies_on_init() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        engine.set_transform(Mat4::IDENTITY);
        assert_eq!(engine.inverse_transform(), Mat4::IDENTITY);

        let size = TargetSize::new(100, 50);
        engine.init(size).unwrap();

        let expected = viewport_matrix(size).inverse();
        assert!(engine.inverse_transform().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn init_reapplies_transform_against_new_viewport() {
        let fx = Fixture::new();
        let mut engine = fx.engine("").unwrap();
        engine.init(TargetSize::new(800, 600)).unwrap();
        engine.set_transform(Mat4::IDENTITY);

        let size = TargetSize::new(400, 300);
        engine.init(size).unwrap();

        let expected = viewport_matrix(size).inverse();
        assert!(engine.inverse_transform().abs_diff_eq(expected, 1e-6));
    }

    // ── source ────────────────────────────────────────────────────────────

    #[test]
    fn set_source_twice_is_a_no_op() {
        let fx = Fixture::new();
        let (_file, url) = scene_file();
        let mut engine = fx.engine("").unwrap();

        assert!(engine.set_source(&url).unwrap());
        assert!(!engine.set_source(&url).unwrap());
        assert_eq!(fx.recording.borrow().calls.register_scene, 1);
    }

    #[test]
    fn switching_source_unregisters_before_registering() {
        let fx = Fixture::new();
        let (_a, url_a) = scene_file();
        let (_b, url_b) = scene_file();
        let mut engine = fx.engine(&url_a).unwrap();

        engine.set_source(&url_b).unwrap();

        assert_eq!(
            fx.recording.borrow().log,
            vec!["init", "register_scene", "unregister_scene", "register_scene"]
        );
    }

    // ── teardown ──────────────────────────────────────────────────────────

    #[test]
    fn drop_releases_everything_in_order() {
        let fx = Fixture::new();
        let (_file, url) = scene_file();
        let mut engine = fx.engine(&url).unwrap();
        engine.init(TargetSize::new(64, 64)).unwrap();
        fx.render(&mut engine);

        drop(engine);

        let rec = fx.recording.borrow();
        assert_eq!(rec.live_scenes(), 0);
        assert_eq!(rec.live_interops(), 0);
        assert_eq!(rec.calls.unregister_buffer, 1);
        assert_eq!(rec.calls.unregister_interop, 1);
        let tail = &rec.log[rec.log.len() - 2..];
        assert_eq!(tail, ["unregister_scene", "unregister_interop"]);
        assert!(fx.sink.contains("is closed"));
        assert_eq!(fx.sink.count(CRITICAL), 0);
    }

    #[test]
    fn drop_of_never_initialized_engine_is_quiet() {
        let fx = Fixture::new();
        drop(fx.engine("").unwrap());

        let rec = fx.recording.borrow();
        assert_eq!(rec.calls.unregister_buffer, 0);
        assert_eq!(rec.calls.unregister_interop, 0);
    }
}
