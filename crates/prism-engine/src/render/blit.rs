//! Transfer buffer → texture → screen.
//!
//! Two GPU stages run after the backend has written a frame:
//! 1. an unpack compute pass widens the packed RGB floats of the transfer buffer into
//!    the RGBA frame texture;
//! 2. a render pass draws one full-screen triangle that reads the texture
//!    texel-for-texel into the current color target.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::ctx::RenderTarget;
use super::target::{FrameTarget, FRAME_TEXTURE_FORMAT};

const UNPACK_WORKGROUP: u32 = 8;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct TriangleVertex {
    pos: [f32; 2],
}

impl TriangleVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TriangleVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// One triangle covering the whole clip square.
const FULL_SCREEN_TRIANGLE: [TriangleVertex; 3] = [
    TriangleVertex { pos: [-1.0, -1.0] },
    TriangleVertex { pos: [3.0, -1.0] },
    TriangleVertex { pos: [-1.0, 3.0] },
];

/// Bind groups tied to one frame-target allocation.
pub struct DisplayBindings {
    unpack: wgpu::BindGroup,
    display: wgpu::BindGroup,
    groups: (u32, u32),
}

/// Pipelines and fixed geometry of the display path.
pub struct DisplayPass {
    unpack_layout: wgpu::BindGroupLayout,
    unpack_pipeline: wgpu::ComputePipeline,

    display_layout: wgpu::BindGroupLayout,
    display_pipeline: wgpu::RenderPipeline,

    triangle_vbo: wgpu::Buffer,
}

impl DisplayPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let unpack_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("prism unpack shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/unpack.wgsl").into()),
        });

        let unpack_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("prism unpack bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: FRAME_TEXTURE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let unpack_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("prism unpack pipeline layout"),
                bind_group_layouts: &[&unpack_layout],
                immediate_size: 0,
            });

        let unpack_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("prism unpack pipeline"),
            layout: Some(&unpack_pipeline_layout),
            module: &unpack_shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let display_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("prism display shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/display.wgsl").into()),
        });

        let display_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("prism display bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    // Rgba32Float is not filterable without an optional feature.
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let display_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("prism display pipeline layout"),
                bind_group_layouts: &[&display_layout],
                immediate_size: 0,
            });

        let display_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("prism display pipeline"),
            layout: Some(&display_pipeline_layout),

            vertex: wgpu::VertexState {
                module: &display_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[TriangleVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &display_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let triangle_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("prism full-screen triangle vbo"),
            contents: bytemuck::cast_slice(&FULL_SCREEN_TRIANGLE),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            unpack_layout,
            unpack_pipeline,
            display_layout,
            display_pipeline,
            triangle_vbo,
        }
    }

    /// Builds the bind groups for the current allocation of `target`.
    ///
    /// `None` if the target has no allocation.
    pub fn bind(&self, device: &wgpu::Device, target: &FrameTarget) -> Option<DisplayBindings> {
        let transfer = target.transfer_buffer()?;
        let view = target.view()?;
        let size = target.size();

        let unpack = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prism unpack bind group"),
            layout: &self.unpack_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: transfer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
            ],
        });

        let display = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prism display bind group"),
            layout: &self.display_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            }],
        });

        Some(DisplayBindings {
            unpack,
            display,
            groups: (
                size.width.div_ceil(UNPACK_WORKGROUP),
                size.height.div_ceil(UNPACK_WORKGROUP),
            ),
        })
    }

    /// Records texture update and full-screen draw into `target`.
    pub fn record(&self, bindings: &DisplayBindings, target: &mut RenderTarget<'_>) {
        {
            let mut cpass = target.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("prism unpack pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.unpack_pipeline);
            cpass.set_bind_group(0, &bindings.unpack, &[]);
            cpass.dispatch_workgroups(bindings.groups.0, bindings.groups.1, 1);
        }

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("prism display pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&self.display_pipeline);
        rpass.set_bind_group(0, &bindings.display, &[]);
        rpass.set_vertex_buffer(0, self.triangle_vbo.slice(..));
        rpass.draw(0..FULL_SCREEN_TRIANGLE.len() as u32, 0..1);
    }

    /// Releases the fixed geometry. Pipelines go with the struct.
    pub fn destroy(&self) {
        self.triangle_vbo.destroy();
    }
}
