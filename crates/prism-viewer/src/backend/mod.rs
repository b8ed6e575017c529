//! Demo compute backend on wgpu.
//!
//! Implements the engine's backend contract with a sphere ray caster (see
//! [`scene`] for the file format). Scene bytes are uploaded to a storage buffer at
//! registration; the transfer buffer is written by a compute pass submitted on the
//! engine's queue, ahead of the display pass.

mod scene;

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use prism_engine::render::{ComputeBackend, FrameParams, RawHandle};

pub use scene::{parse_spheres, Sphere};

const TRACE_WORKGROUP: u32 = 8;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FrameUniform {
    inverse_transform: [[f32; 4]; 4],
    size: [u32; 2],
    sphere_count: u32,
    _pad: u32,
}

struct ScenePayload {
    spheres: wgpu::Buffer,
    count: u32,
}

struct Pipeline {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    frame_ubo: wgpu::Buffer,
    // Bound when no scene is registered; storage bindings cannot be empty.
    empty_scene: wgpu::Buffer,
}

/// Sphere ray caster behind the [`ComputeBackend`] call surface.
pub struct WgpuComputeBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    pipeline: Option<Pipeline>,

    scenes: HashMap<RawHandle, ScenePayload>,
    interops: HashMap<RawHandle, wgpu::Buffer>,
    next_id: u64,
}

impl WgpuComputeBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            pipeline: None,
            scenes: HashMap::new(),
            interops: HashMap::new(),
            next_id: 0,
        }
    }

    fn next_handle(&mut self) -> Option<RawHandle> {
        self.next_id = self.next_id.checked_add(1)?;
        RawHandle::new(self.next_id)
    }

    fn create_pipeline(&self) -> Pipeline {
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("prism trace shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/trace.wgsl").into()),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("prism trace bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage(1, true),
                    storage(2, false),
                ],
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("prism trace pipeline layout"),
                bind_group_layouts: &[&layout],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("prism trace pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            });

        let frame_ubo = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prism trace frame ubo"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let empty_scene = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("prism empty scene"),
                contents: bytemuck::bytes_of(&Sphere::zeroed()),
                usage: wgpu::BufferUsages::STORAGE,
            });

        Pipeline {
            layout,
            pipeline,
            frame_ubo,
            empty_scene,
        }
    }
}

impl ComputeBackend for WgpuComputeBackend {
    fn init(&mut self) -> bool {
        if self.pipeline.is_some() {
            return true;
        }
        let limits = self.device.limits();
        if limits.max_storage_buffers_per_shader_stage < 2 {
            log::error!(
                "device allows {} storage buffers per stage; ray caster needs 2",
                limits.max_storage_buffers_per_shader_stage
            );
            return false;
        }
        self.pipeline = Some(self.create_pipeline());
        true
    }

    fn register_scene_buffer(&mut self, scene: &[u8]) -> Option<RawHandle> {
        let spheres = parse_spheres(scene);
        let count = u32::try_from(spheres.len()).ok()?;
        let placeholder = Sphere::zeroed();
        let contents: &[u8] = if spheres.is_empty() {
            bytemuck::bytes_of(&placeholder)
        } else {
            bytemuck::cast_slice(&spheres)
        };
        if contents.len() as u64 > u64::from(self.device.limits().max_storage_buffer_binding_size) {
            log::error!("scene of {} spheres exceeds the storage binding limit", spheres.len());
            return None;
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("prism scene spheres"),
                contents,
                usage: wgpu::BufferUsages::STORAGE,
            });

        let handle = self.next_handle()?;
        log::debug!("scene {handle}: {count} spheres from {} bytes", scene.len());
        self.scenes.insert(
            handle,
            ScenePayload {
                spheres: buffer,
                count,
            },
        );
        Some(handle)
    }

    fn unregister_buffer(&mut self, handle: RawHandle) -> bool {
        match self.scenes.remove(&handle) {
            Some(payload) => {
                payload.spheres.destroy();
                true
            }
            None => false,
        }
    }

    fn register_interop_buffer(&mut self, buffer: &wgpu::Buffer) -> Option<RawHandle> {
        if !buffer.usage().contains(wgpu::BufferUsages::STORAGE) {
            log::error!("transfer buffer is not bindable as storage");
            return None;
        }
        let handle = self.next_handle()?;
        self.interops.insert(handle, buffer.clone());
        Some(handle)
    }

    fn unregister_interop_buffer(&mut self, handle: RawHandle) -> bool {
        self.interops.remove(&handle).is_some()
    }

    fn render_frame(
        &mut self,
        interop: RawHandle,
        scene: Option<RawHandle>,
        params: &FrameParams,
    ) -> bool {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return false;
        };
        let Some(output) = self.interops.get(&interop) else {
            return false;
        };
        let (spheres, sphere_count) = match scene {
            Some(handle) => match self.scenes.get(&handle) {
                Some(payload) => (&payload.spheres, payload.count),
                None => return false,
            },
            None => (&pipeline.empty_scene, 0),
        };

        let uniform = FrameUniform {
            inverse_transform: params.inverse_transform.to_cols_array_2d(),
            size: [params.width, params.height],
            sphere_count,
            _pad: 0,
        };
        self.queue
            .write_buffer(&pipeline.frame_ubo, 0, bytemuck::bytes_of(&uniform));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prism trace bind group"),
            layout: &pipeline.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: pipeline.frame_ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: spheres.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("prism trace encoder"),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("prism trace pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&pipeline.pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(
                params.width.div_ceil(TRACE_WORKGROUP),
                params.height.div_ceil(TRACE_WORKGROUP),
                1,
            );
        }
        self.queue.submit([encoder.finish()]);
        true
    }
}

impl Drop for WgpuComputeBackend {
    fn drop(&mut self) {
        if !self.scenes.is_empty() || !self.interops.is_empty() {
            log::warn!(
                "backend dropped with {} scene and {} interop registrations",
                self.scenes.len(),
                self.interops.len()
            );
        }
    }
}
