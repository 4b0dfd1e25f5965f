use anyhow::{Context, bail};
use bytemuck::Zeroable;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::{
    mesh::{
        builder::SliderMeshes,
        types::{CapInstance, JointVertex, MeshVertex, RibbonInstance, SliderUniforms},
    },
    render::{DrawPass, RenderBackend},
};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const MESH_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x3];
const RIBBON_INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![1 => Float32x2, 2 => Float32x2, 3 => Float32];
const JOINT_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x3];
const CAP_INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![1 => Float32x2];

fn buffer_layout<T>(
    step_mode: wgpu::VertexStepMode,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<T>() as wgpu::BufferAddress,
        step_mode,
        attributes,
    }
}

/// wgpu rejects zero-sized buffers.
fn non_empty<T: Zeroable + Copy>(data: &[T]) -> Vec<T> {
    if data.is_empty() {
        vec![T::zeroed()]
    } else {
        data.to_vec()
    }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    uniforms_layout: wgpu::BindGroupLayout,
    ribbon_pipeline: wgpu::RenderPipeline,
    joint_pipeline: wgpu::RenderPipeline,
    cap_pipeline: wgpu::RenderPipeline,
}

pub struct WgpuMeshes {
    ribbon_vertices: wgpu::Buffer,
    ribbon_indices: wgpu::Buffer,
    ribbon_index_count: u32,
    ribbon_instances: wgpu::Buffer,
    ribbon_count: u32,
    joint_vertices: wgpu::Buffer,
    joint_indices: wgpu::Buffer,
    // Unpadded, the buffer itself holds at least one index.
    joint_index_count: u32,
    cap_vertices: wgpu::Buffer,
    cap_indices: wgpu::Buffer,
    cap_index_count: u32,
    cap_instances: wgpu::Buffer,
    cap_count: u32,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuTarget {
    pub width: u32,
    pub height: u32,
    pub color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl WgpuBackend {
    /// Device without a surface, for offscreen rendering.
    pub fn new_headless() -> anyhow::Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| anyhow::anyhow!("request_adapter failed: {e}"))?;

        let (device, queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
                label: Some("slider device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::default(),
            }))?;

        Ok(Self::with_device(device, queue))
    }

    /// Builds the pipelines on a device owned by the caller's renderer.
    pub fn with_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("slider_pass.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/slider_pass.wgsl").into()),
        });

        let uniforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slider uniforms layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("slider pipeline layout"),
            bind_group_layouts: &[&uniforms_layout],
            immediate_size: 0,
        });

        let create_pipeline =
            |label: &str, entry_point: &str, buffers: &[wgpu::VertexBufferLayout<'static>]| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some(entry_point),
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        buffers,
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some("fs_body"),
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: COLOR_FORMAT,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        ..Default::default()
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
            };

        let ribbon_pipeline = create_pipeline(
            "slider ribbon pipeline",
            "vs_ribbon",
            &[
                buffer_layout::<MeshVertex>(wgpu::VertexStepMode::Vertex, &MESH_VERTEX_ATTRIBUTES),
                buffer_layout::<RibbonInstance>(
                    wgpu::VertexStepMode::Instance,
                    &RIBBON_INSTANCE_ATTRIBUTES,
                ),
            ],
        );
        let joint_pipeline = create_pipeline(
            "slider joint pipeline",
            "vs_joint",
            &[buffer_layout::<JointVertex>(
                wgpu::VertexStepMode::Vertex,
                &JOINT_VERTEX_ATTRIBUTES,
            )],
        );
        let cap_pipeline = create_pipeline(
            "slider cap pipeline",
            "vs_cap",
            &[
                buffer_layout::<MeshVertex>(wgpu::VertexStepMode::Vertex, &MESH_VERTEX_ATTRIBUTES),
                buffer_layout::<CapInstance>(
                    wgpu::VertexStepMode::Instance,
                    &CAP_INSTANCE_ATTRIBUTES,
                ),
            ],
        );

        WgpuBackend {
            device,
            queue,
            uniforms_layout,
            ribbon_pipeline,
            joint_pipeline,
            cap_pipeline,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Copies the cache color back to the CPU, same layout as the software target.
    pub fn read_color(&self, target: &WgpuTarget) -> anyhow::Result<RgbaImage> {
        let unpadded_bytes_per_row = target.width as usize * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("slider cache readback"),
            size: (padded_bytes_per_row * target.height as usize) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slider readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row as u32),
                    rows_per_image: Some(target.height),
                },
            },
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .context("failed to wait for the readback copy")?;
        receiver
            .recv()
            .context("readback callback was dropped")?
            .context("failed to map the readback buffer")?;

        let mut pixels = Vec::with_capacity(unpadded_bytes_per_row * target.height as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks_exact(padded_bytes_per_row) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row]);
            }
        }
        readback.unmap();
        readback.destroy();

        RgbaImage::from_raw(target.width, target.height, pixels)
            .context("readback does not match the target size")
    }

    fn init_buffer(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }
}

impl RenderBackend for WgpuBackend {
    type Meshes = WgpuMeshes;
    type Target = WgpuTarget;

    fn create_meshes(&mut self, meshes: &SliderMeshes) -> anyhow::Result<WgpuMeshes> {
        let statics = &meshes.static_meshes;
        if meshes.ribbons.is_empty() {
            bail!("slider has no sections to upload");
        }

        let vertex = wgpu::BufferUsages::VERTEX;
        let index = wgpu::BufferUsages::INDEX;
        let instance = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST;

        let uniforms = self.init_buffer(
            "slider uniforms",
            bytemuck::bytes_of(&SliderUniforms::zeroed()),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("slider uniforms bind group"),
            layout: &self.uniforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        Ok(WgpuMeshes {
            ribbon_vertices: self.init_buffer(
                "slider ribbon vertices",
                bytemuck::cast_slice(&statics.ribbon_vertices),
                vertex,
            ),
            ribbon_indices: self.init_buffer(
                "slider ribbon indices",
                bytemuck::cast_slice(&statics.ribbon_indices),
                index,
            ),
            ribbon_index_count: statics.ribbon_indices.len() as u32,
            ribbon_instances: self.init_buffer(
                "slider ribbon instances",
                bytemuck::cast_slice(meshes.ribbons.as_slice()),
                instance,
            ),
            ribbon_count: meshes.ribbons.len() as u32,
            joint_vertices: self.init_buffer(
                "slider joint vertices",
                bytemuck::cast_slice(&non_empty(&statics.joint_vertices)),
                vertex,
            ),
            joint_indices: self.init_buffer(
                "slider joint indices",
                bytemuck::cast_slice(&non_empty(&statics.joint_indices)),
                index,
            ),
            joint_index_count: statics.joint_indices.len() as u32,
            cap_vertices: self.init_buffer(
                "slider cap vertices",
                bytemuck::cast_slice(&statics.cap_vertices),
                vertex,
            ),
            cap_indices: self.init_buffer(
                "slider cap indices",
                bytemuck::cast_slice(&statics.cap_indices),
                index,
            ),
            cap_index_count: statics.cap_indices.len() as u32,
            cap_instances: self.init_buffer(
                "slider cap instances",
                bytemuck::cast_slice(meshes.caps.as_slice()),
                instance,
            ),
            cap_count: meshes.caps.len() as u32,
            uniforms,
            bind_group,
        })
    }

    fn write_ribbon_instances(
        &mut self,
        meshes: &mut WgpuMeshes,
        first: usize,
        instances: &[RibbonInstance],
    ) {
        if instances.is_empty() {
            return;
        }
        let offset = (first * std::mem::size_of::<RibbonInstance>()) as wgpu::BufferAddress;
        self.queue
            .write_buffer(&meshes.ribbon_instances, offset, bytemuck::cast_slice(instances));
    }

    fn write_cap_instances(
        &mut self,
        meshes: &mut WgpuMeshes,
        first: usize,
        instances: &[CapInstance],
    ) {
        if instances.is_empty() {
            return;
        }
        let offset = (first * std::mem::size_of::<CapInstance>()) as wgpu::BufferAddress;
        self.queue
            .write_buffer(&meshes.cap_instances, offset, bytemuck::cast_slice(instances));
    }

    fn create_target(&mut self, width: u32, height: u32) -> anyhow::Result<WgpuTarget> {
        if width == 0 || height == 0 {
            bail!("cache target must not be empty, got {width}x{height}");
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            bail!("cache target {width}x{height} exceeds the device limit of {max}");
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let create_texture = |label: &str, format: wgpu::TextureFormat, usage| {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let color = create_texture(
            "slider cache color",
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = create_texture(
            "slider cache depth",
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        Ok(WgpuTarget {
            width,
            height,
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            depth,
        })
    }

    fn draw(
        &mut self,
        target: &mut WgpuTarget,
        meshes: &WgpuMeshes,
        pass: &DrawPass,
    ) -> anyhow::Result<()> {
        pass.check_ranges(meshes.ribbon_count as usize, meshes.joint_index_count as usize)?;

        self.queue
            .write_buffer(&meshes.uniforms, 0, bytemuck::bytes_of(&pass.uniforms()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slider encoder"),
            });

        {
            let color_load = if pass.clear_color {
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
            } else {
                wgpu::LoadOp::Load
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("slider pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_bind_group(0, &meshes.bind_group, &[]);

            if !pass.ribbons.is_empty() {
                rpass.set_pipeline(&self.ribbon_pipeline);
                rpass.set_vertex_buffer(0, meshes.ribbon_vertices.slice(..));
                rpass.set_vertex_buffer(1, meshes.ribbon_instances.slice(..));
                rpass.set_index_buffer(meshes.ribbon_indices.slice(..), wgpu::IndexFormat::Uint16);
                rpass.draw_indexed(0..meshes.ribbon_index_count, 0, pass.ribbons.clone());
            }

            if !pass.joints.is_empty() {
                rpass.set_pipeline(&self.joint_pipeline);
                rpass.set_vertex_buffer(0, meshes.joint_vertices.slice(..));
                rpass.set_index_buffer(meshes.joint_indices.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(pass.joints.clone(), 0, 0..1);
            }

            rpass.set_pipeline(&self.cap_pipeline);
            rpass.set_vertex_buffer(0, meshes.cap_vertices.slice(..));
            rpass.set_vertex_buffer(1, meshes.cap_instances.slice(..));
            rpass.set_index_buffer(meshes.cap_indices.slice(..), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(0..meshes.cap_index_count, 0, 0..meshes.cap_count);
        }

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn release_meshes(&mut self, meshes: WgpuMeshes) {
        for buffer in [
            &meshes.ribbon_vertices,
            &meshes.ribbon_indices,
            &meshes.ribbon_instances,
            &meshes.joint_vertices,
            &meshes.joint_indices,
            &meshes.cap_vertices,
            &meshes.cap_indices,
            &meshes.cap_instances,
            &meshes.uniforms,
        ] {
            buffer.destroy();
        }
    }

    fn release_target(&mut self, target: WgpuTarget) {
        target.color.destroy();
        target.depth.destroy();
    }
}
