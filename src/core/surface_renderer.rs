use std::sync::Arc;

use wgpu::{
    BindGroup, BindGroupLayout, Device, RenderPipeline, Sampler, Surface, SurfaceConfiguration,
    SurfaceTexture, Texture, TextureFormat, TextureView,
};
use winit::window::Window as WinitWindow;

use super::gpu_context::GpuContext;
use super::pixel_buffer::PixelBuffer;
use super::presentation::{BufferStrategy, PresentError, QualityHint, SurfaceStatus};
use crate::error::{EaselError, Result};

/// Presents pixel buffers on a window surface
///
/// `blit` uploads the frame into a texture and renders it stretched over the
/// next surface image, `show` presents that image. Packed ARGB words are
/// BGRA bytes in memory, so the frame texture is BGRA.
pub struct SurfaceRenderer {
    window: Arc<WinitWindow>,
    gpu: GpuContext,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    render_pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    texture_format: TextureFormat,
    texture: Texture,
    texture_view: TextureView,
    bind_group: BindGroup,
    hint: QualityHint,
    pending: Option<SurfaceTexture>,
}

impl SurfaceRenderer {
    pub fn new(window: Arc<WinitWindow>, hint: QualityHint) -> Result<Self> {
        let size = window.inner_size();
        let instance = GpuContext::instance();
        let surface = instance.create_surface(Arc::clone(&window))?;
        let gpu = pollster::block_on(GpuContext::for_surface(&instance, &surface))?;

        let caps = surface.get_capabilities(gpu.adapter());
        // Pixels are already display-encoded; prefer a surface that stores them as is
        let surface_format = caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| EaselError::SurfaceUnsupported("no surface formats".to_string()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(gpu.device(), &surface_config);

        let texture_format = if surface_format.is_srgb() {
            TextureFormat::Bgra8UnormSrgb
        } else {
            TextureFormat::Bgra8Unorm
        };
        let bind_group_layout = Self::create_bind_group_layout(gpu.device());
        let render_pipeline =
            Self::create_render_pipeline(gpu.device(), &bind_group_layout, surface_format);

        let texture = Self::create_frame_texture(gpu.device(), texture_format, 1, 1);
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Self::create_sampler(gpu.device(), hint);
        let bind_group =
            Self::create_bind_group(gpu.device(), &bind_group_layout, &texture_view, &sampler);

        log::debug!(
            "surface {}x{} format {:?}",
            surface_config.width,
            surface_config.height,
            surface_format
        );

        Ok(Self {
            window,
            gpu,
            surface,
            surface_config,
            render_pipeline,
            bind_group_layout,
            texture_format,
            texture,
            texture_view,
            bind_group,
            hint,
            pending: None,
        })
    }

    /// Current surface dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.surface.configure(self.gpu.device(), &self.surface_config);
    }

    /// Match the frame texture size and the sampler to the request
    fn prepare(&mut self, width: u32, height: u32, hint: QualityHint) {
        let size = self.texture.size();
        let resized = size.width != width || size.height != height;
        if resized {
            self.texture =
                Self::create_frame_texture(self.gpu.device(), self.texture_format, width, height);
            self.texture_view = self
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
        }
        if resized || hint != self.hint {
            self.hint = hint;
            let sampler = Self::create_sampler(self.gpu.device(), hint);
            self.bind_group = Self::create_bind_group(
                self.gpu.device(),
                &self.bind_group_layout,
                &self.texture_view,
                &sampler,
            );
        }
    }

    fn upload(&self, frame: &PixelBuffer) {
        let (width, height) = frame.dimensions();
        self.gpu.queue().write_texture(
            self.texture.as_image_copy(),
            frame.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn draw(&self, target: &SurfaceTexture) {
        let view = target
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
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
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.gpu.queue().submit(Some(encoder.finish()));
    }

    fn create_frame_texture(
        device: &Device,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn create_sampler(device: &Device, hint: QualityHint) -> Sampler {
        device.create_sampler(&sampler_descriptor(hint))
    }

    fn create_bind_group_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn create_render_pipeline(
        device: &Device,
        bind_group_layout: &BindGroupLayout,
        surface_format: TextureFormat,
    ) -> RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Frame Display Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../display.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Frame Pipeline Layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Frame Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    fn create_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        texture_view: &TextureView,
        sampler: &Sampler,
    ) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

impl BufferStrategy for SurfaceRenderer {
    fn blit(
        &mut self,
        frame: &PixelBuffer,
        hint: QualityHint,
    ) -> std::result::Result<SurfaceStatus, PresentError> {
        // An image acquired by an abandoned attempt goes back unpresented
        self.pending = None;

        let (width, height) = frame.dimensions();
        check_texture_limit(width, height, self.gpu.device().limits().max_texture_dimension_2d)?;
        self.prepare(width, height, hint);
        self.upload(frame);

        let target = match self.surface.get_current_texture() {
            Ok(target) => target,
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(PresentError::OutOfMemory),
            Err(wgpu::SurfaceError::Timeout) => return Ok(SurfaceStatus::ContentsLost),
            Err(err) => {
                log::debug!("surface image unavailable ({}), reconfiguring", err);
                self.reconfigure();
                return Ok(SurfaceStatus::ContentsLost);
            }
        };

        self.draw(&target);
        self.pending = Some(target);
        Ok(SurfaceStatus::Ok)
    }

    fn show(&mut self) -> std::result::Result<SurfaceStatus, PresentError> {
        let Some(target) = self.pending.take() else {
            return Ok(SurfaceStatus::ContentsLost);
        };
        let suboptimal = target.suboptimal;
        self.window.pre_present_notify();
        target.present();
        if suboptimal {
            self.reconfigure();
        }
        Ok(SurfaceStatus::Ok)
    }
}

/// Frames larger than the device's 2D texture limit cannot be uploaded
fn check_texture_limit(width: u32, height: u32, max: u32) -> std::result::Result<(), PresentError> {
    if width > max || height > max {
        return Err(PresentError::Unavailable(format!(
            "canvas {}x{} exceeds the device texture limit of {}",
            width, height, max
        )));
    }
    Ok(())
}

/// Sampler used to stretch the frame for a quality hint
fn sampler_descriptor(hint: QualityHint) -> wgpu::SamplerDescriptor<'static> {
    let (mag_filter, min_filter, mipmap_filter, anisotropy_clamp) = match hint {
        QualityHint::Low => (
            wgpu::FilterMode::Nearest,
            wgpu::FilterMode::Nearest,
            wgpu::FilterMode::Nearest,
            1,
        ),
        QualityHint::Mid => (
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Nearest,
            wgpu::FilterMode::Nearest,
            1,
        ),
        QualityHint::High => (
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Nearest,
            1,
        ),
        // anisotropic filtering needs every filter linear
        QualityHint::Highest => (
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Linear,
            16,
        ),
    };

    wgpu::SamplerDescriptor {
        label: Some("Frame Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter,
        min_filter,
        mipmap_filter,
        anisotropy_clamp,
        ..Default::default()
    }
}
