use std::fmt;

use super::backend::{InteropHandle, SharedBackend};
use super::diagnostics::{self, SharedSink, CRITICAL};
use super::error::EngineError;

/// Frame dimensions in physical pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height; 1.0 for empty sizes.
    #[inline]
    pub fn aspect(self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for TargetSize {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Bytes per pixel in the transfer buffer: three `f32` channels.
pub const TRANSFER_PIXEL_BYTES: u64 = 3 * std::mem::size_of::<f32>() as u64;

/// Texture format holding the displayed frame.
///
/// wgpu has no three-channel float format; the unpack pass widens RGB to RGBA.
pub const FRAME_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Byte size of a transfer buffer holding one frame of `size`.
#[inline]
pub fn transfer_size(size: TargetSize) -> u64 {
    u64::from(size.width) * u64::from(size.height) * TRANSFER_PIXEL_BYTES
}

/// GPU objects of one allocation: the frame texture and its transfer buffer.
struct Allocation {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    transfer: wgpu::Buffer,
}

/// Destination texture, transfer buffer and interop registration.
///
/// Every [`FrameTarget::init`] rebuilds all three from scratch, so the buffer stride
/// the backend writes with always matches the texture the display pass reads.
pub struct FrameTarget {
    // Released before `allocation` is destroyed.
    interop: Option<InteropHandle>,
    allocation: Option<Allocation>,
    size: TargetSize,

    backend: SharedBackend,
    sink: SharedSink,
}

impl FrameTarget {
    pub fn new(backend: SharedBackend, sink: SharedSink) -> Self {
        Self {
            interop: None,
            allocation: None,
            size: TargetSize::default(),
            backend,
            sink,
        }
    }

    /// Tears down the previous target and allocates a new one at `size`.
    ///
    /// On error the target is left without texture, buffer or interop handle.
    pub fn init(&mut self, device: &wgpu::Device, size: TargetSize) -> Result<(), EngineError> {
        // A stale handle is worse than a leaked one: keep going even if this fails.
        self.release_interop();
        self.destroy_allocation();
        self.size = TargetSize::default();

        if size.is_empty() {
            return Err(EngineError::EmptyTarget(size));
        }
        check_limits(device, size)?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("prism frame texture"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let transfer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prism transfer buffer"),
            size: transfer_size(size),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let interop = InteropHandle::acquire(&self.backend, &self.sink, &transfer);

        self.allocation = Some(Allocation {
            texture,
            view,
            transfer,
        });
        self.size = size;

        match interop {
            Some(handle) => {
                self.interop = Some(handle);
                Ok(())
            }
            None => {
                diagnostics::report(
                    &*self.sink,
                    CRITICAL,
                    format_args!("unable to register transfer buffer ({size}) with backend"),
                );
                Err(EngineError::InteropRegistration)
            }
        }
    }

    /// Unregisters the interop handle, if any. Failure is reported, never fatal.
    pub fn release_interop(&mut self) {
        let Some(handle) = self.interop.take() else { return };
        let raw = handle.raw();
        if !handle.release() {
            diagnostics::report(
                &*self.sink,
                CRITICAL,
                format_args!("unable to unregister interop buffer {raw}"),
            );
        }
    }

    /// Destroys texture and transfer buffer. The interop handle must be gone already.
    pub fn destroy_allocation(&mut self) {
        debug_assert!(self.interop.is_none(), "interop handle outlives its buffer");
        if let Some(allocation) = self.allocation.take() {
            drop(allocation.view);
            allocation.texture.destroy();
            allocation.transfer.destroy();
        }
    }

    /// Size of the current allocation; empty before a successful `init`.
    #[inline]
    pub fn size(&self) -> TargetSize {
        self.size
    }

    #[inline]
    pub fn interop(&self) -> Option<&InteropHandle> {
        self.interop.as_ref()
    }

    /// True when texture, buffer and interop handle are all in place.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.interop.is_some() && self.allocation.is_some()
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.allocation.as_ref().map(|a| &a.texture)
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.allocation.as_ref().map(|a| &a.view)
    }

    pub fn transfer_buffer(&self) -> Option<&wgpu::Buffer> {
        self.allocation.as_ref().map(|a| &a.transfer)
    }
}

impl Drop for FrameTarget {
    fn drop(&mut self) {
        self.release_interop();
        self.destroy_allocation();
    }
}

fn check_limits(device: &wgpu::Device, size: TargetSize) -> Result<(), EngineError> {
    let limits = device.limits();
    if size.width > limits.max_texture_dimension_2d || size.height > limits.max_texture_dimension_2d
    {
        return Err(EngineError::TargetTooLarge {
            size,
            reason: "texture dimension",
        });
    }
    let bytes = transfer_size(size);
    if bytes > limits.max_buffer_size
        || bytes > u64::from(limits.max_storage_buffer_binding_size)
    {
        return Err(EngineError::TargetTooLarge {
            size,
            reason: "transfer buffer size",
        });
    }
    Ok(())
}
