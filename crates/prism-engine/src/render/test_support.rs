//! Test doubles for the render core.

use std::cell::RefCell;
use std::collections::HashSet;

use log::Level;

use super::backend::{ComputeBackend, FrameParams, RawHandle};
use super::diagnostics::DiagnosticsSink;

/// Call counters, one per backend entry point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub init: u32,
    pub register_scene: u32,
    pub unregister_buffer: u32,
    pub register_interop: u32,
    pub unregister_interop: u32,
    pub render_frame: u32,
}

/// Backend that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: CallCounts,

    pub fail_init: bool,
    pub fail_register_scene: bool,
    pub fail_unregister_buffer: bool,
    pub fail_register_interop: bool,
    pub fail_unregister_interop: bool,
    pub fail_render: bool,

    /// Lengths of scene buffers as they were registered.
    pub scene_lengths: Vec<usize>,
    /// Sizes of transfer buffers as they were registered.
    pub interop_sizes: Vec<u64>,
    /// Parameters of every `render_frame` call.
    pub frames: Vec<(RawHandle, Option<RawHandle>, FrameParams)>,
    /// Backend call log, in order (`"register_scene"`, `"unregister_interop"`, ...).
    pub log: Vec<&'static str>,
    /// Peak number of simultaneously live interop handles.
    pub max_live_interop: usize,

    live_scene: HashSet<RawHandle>,
    live_interop: HashSet<RawHandle>,
    next_id: u64,
}

impl RecordingBackend {
    pub fn live_scenes(&self) -> usize {
        self.live_scene.len()
    }

    pub fn live_interops(&self) -> usize {
        self.live_interop.len()
    }

    fn next_handle(&mut self) -> RawHandle {
        self.next_id += 1;
        RawHandle::new(self.next_id).expect("ids start at one")
    }
}

impl ComputeBackend for RecordingBackend {
    fn init(&mut self) -> bool {
        self.calls.init += 1;
        self.log.push("init");
        !self.fail_init
    }

    fn register_scene_buffer(&mut self, scene: &[u8]) -> Option<RawHandle> {
        self.calls.register_scene += 1;
        self.log.push("register_scene");
        if self.fail_register_scene {
            return None;
        }
        self.scene_lengths.push(scene.len());
        let handle = self.next_handle();
        self.live_scene.insert(handle);
        Some(handle)
    }

    fn unregister_buffer(&mut self, handle: RawHandle) -> bool {
        self.calls.unregister_buffer += 1;
        self.log.push("unregister_scene");
        let known = self.live_scene.remove(&handle);
        known && !self.fail_unregister_buffer
    }

    fn register_interop_buffer(&mut self, buffer: &wgpu::Buffer) -> Option<RawHandle> {
        self.calls.register_interop += 1;
        self.log.push("register_interop");
        if self.fail_register_interop {
            return None;
        }
        self.interop_sizes.push(buffer.size());
        let handle = self.next_handle();
        self.live_interop.insert(handle);
        self.max_live_interop = self.max_live_interop.max(self.live_interop.len());
        Some(handle)
    }

    fn unregister_interop_buffer(&mut self, handle: RawHandle) -> bool {
        self.calls.unregister_interop += 1;
        self.log.push("unregister_interop");
        let known = self.live_interop.remove(&handle);
        known && !self.fail_unregister_interop
    }

    fn render_frame(
        &mut self,
        interop: RawHandle,
        scene: Option<RawHandle>,
        params: &FrameParams,
    ) -> bool {
        self.calls.render_frame += 1;
        self.log.push("render_frame");
        self.frames.push((interop, scene, *params));
        !self.fail_render
    }
}

/// Sink that keeps every diagnostic.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: RefCell<Vec<(Level, String)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.entries.borrow().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.borrow().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.borrow().iter().any(|(_, m)| m.contains(needle))
    }
}

impl DiagnosticsSink for RecordingSink {
    fn report(&self, level: Level, message: &str) {
        self.entries.borrow_mut().push((level, message.to_owned()));
    }
}

/// Device + queue on wgpu's no-op backend.
///
/// Needs the `noop` feature of wgpu, enabled for tests in this crate's dev-dependencies.
pub fn headless_device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::NOOP,
        backend_options: wgpu::BackendOptions {
            noop: wgpu::NoopBackendOptions { enable: true },
            ..Default::default()
        },
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .expect("noop adapter; is the wgpu `noop` feature enabled?");

    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("prism test device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_defaults(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))
    .expect("noop device")
}

/// Color format used as the display target in tests.
pub const TEST_SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Creates an offscreen color attachment matching [`TEST_SURFACE_FORMAT`].
pub fn offscreen_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("prism test color target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEST_SURFACE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}
