use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use winit::event::WindowEvent;

use prism_engine::camera::{Camera, Lens, TransformProvider};
use prism_engine::core::{App, AppControl, FrameCtx};
use prism_engine::input::Key;
use prism_engine::render::{
    EngineError, LogSink, RenderEngine, SharedBackend, TargetSize,
};

use crate::args::source_reference;
use crate::backend::WgpuComputeBackend;
use crate::controller::CameraController;

/// Startup settings of the viewer.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    /// Engine source reference; empty for none.
    pub source: String,
    pub lens: Lens,
    pub look_speed: f32,
    pub linear_speed: f32,
}

/// Interactive view of one scene source.
pub struct Viewer {
    config: ViewerConfig,

    camera: Camera,
    controller: CameraController,

    engine: Option<RenderEngine>,
    // Size of the last `init` attempt, successful or not.
    attempted_size: Option<TargetSize>,
    applied_revision: Option<u64>,
    pending_source: Option<String>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let camera = Camera::new(config.lens);
        let controller = CameraController::new(config.look_speed, config.linear_speed);
        Self {
            config,
            camera,
            controller,
            engine: None,
            attempted_size: None,
            applied_revision: None,
            pending_source: None,
        }
    }

    fn create_engine(&self, ctx: &FrameCtx<'_, '_>) -> Result<RenderEngine, EngineError> {
        let backend: SharedBackend = Rc::new(RefCell::new(WgpuComputeBackend::new(
            ctx.gpu.device().clone(),
            ctx.gpu.queue().clone(),
        )));
        RenderEngine::new(
            &ctx.gpu.render_ctx(),
            backend,
            LogSink::shared(),
            &self.config.source,
        )
    }
}

impl App for Viewer {
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        if let WindowEvent::DroppedFile(path) = event {
            match source_reference(&path.to_string_lossy()) {
                Ok(reference) => self.pending_source = Some(reference),
                Err(err) => log::warn!("ignoring dropped file: {err:#}"),
            }
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input_frame.keys_pressed.contains(&Key::Escape) {
            return AppControl::Exit;
        }

        let size = ctx.window.physical_size();
        if size.is_empty() {
            return AppControl::Continue;
        }

        if self.engine.is_none() {
            match self.create_engine(ctx) {
                Ok(engine) => self.engine = Some(engine),
                Err(err) => {
                    log::error!("{err}");
                    return AppControl::Exit;
                }
            }
        }
        let Some(engine) = self.engine.as_mut() else {
            return AppControl::Exit;
        };

        self.camera.set_aspect(size.aspect());
        let update = self.controller.update(
            &mut self.camera,
            ctx.input,
            ctx.input_frame,
            ctx.time.dt,
        );
        if let Some(visible) = update.cursor_visible {
            ctx.window.set_cursor_visible(visible);
        }
        if update.moving {
            ctx.runtime.request_redraw();
        }

        if self.attempted_size != Some(size) {
            self.attempted_size = Some(size);
            if let Err(err) = engine.init(size) {
                log::warn!("{err}");
            }
        }

        if self.applied_revision != Some(self.camera.revision()) {
            engine.set_transform(self.camera.transform());
            self.applied_revision = Some(self.camera.revision());
        }

        if let Some(reference) = self.pending_source.take() {
            // Failures are reported by the engine; the previous scene stays unbound.
            if let Ok(true) = engine.set_source(&reference) {
                log::info!("showing {reference}");
            }
        }

        if !engine.is_ready() {
            return AppControl::Continue;
        }

        let started = Instant::now();
        let control = ctx.render(wgpu::Color::BLACK, |_, target| engine.render_frame(target));
        let elapsed = started.elapsed();

        ctx.window.set_title(&format!(
            "{} | dt {:.2} ms",
            self.config.title,
            elapsed.as_secs_f64() * 1000.0
        ));
        control
    }
}
