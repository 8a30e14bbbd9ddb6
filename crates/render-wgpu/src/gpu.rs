use crate::backend::{WgpuColorTarget, WgpuDepthTarget, WgpuDevice};
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use cubeworld_common::ResourceCache;
use cubeworld_render::{
    Entity, EntityKey, FreeFlightCamera, LightSet, LightingUniform, SceneRenderer, SkySettings,
    VoxelObjectUniform, VoxelWorld,
};
use cubeworld_voxel::MeshVertex;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    lighting: LightingUniform,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
}

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("renderer was built for device generation {built}, lifecycle is at {current}")]
    StaleDevice { built: u64, current: u64 },
    #[error("pass recorded out of order: {0}")]
    OutOfOrder(&'static str),
    #[error(transparent)]
    Cache(#[from] cubeworld_common::CacheError),
}

/// Generate unit cube vertices and indices, counter-clockwise from outside.
fn cube_mesh() -> (Vec<Vertex>, Vec<u16>) {
    let p = 0.5_f32;
    #[rustfmt::skip]
    let vertices = vec![
        // +Z face
        Vertex { position: [-p, -p,  p], normal: [0.0, 0.0, 1.0] },
        Vertex { position: [ p, -p,  p], normal: [0.0, 0.0, 1.0] },
        Vertex { position: [ p,  p,  p], normal: [0.0, 0.0, 1.0] },
        Vertex { position: [-p,  p,  p], normal: [0.0, 0.0, 1.0] },
        // -Z face
        Vertex { position: [ p, -p, -p], normal: [0.0, 0.0, -1.0] },
        Vertex { position: [-p, -p, -p], normal: [0.0, 0.0, -1.0] },
        Vertex { position: [-p,  p, -p], normal: [0.0, 0.0, -1.0] },
        Vertex { position: [ p,  p, -p], normal: [0.0, 0.0, -1.0] },
        // +X face
        Vertex { position: [ p, -p,  p], normal: [1.0, 0.0, 0.0] },
        Vertex { position: [ p, -p, -p], normal: [1.0, 0.0, 0.0] },
        Vertex { position: [ p,  p, -p], normal: [1.0, 0.0, 0.0] },
        Vertex { position: [ p,  p,  p], normal: [1.0, 0.0, 0.0] },
        // -X face
        Vertex { position: [-p, -p, -p], normal: [-1.0, 0.0, 0.0] },
        Vertex { position: [-p, -p,  p], normal: [-1.0, 0.0, 0.0] },
        Vertex { position: [-p,  p,  p], normal: [-1.0, 0.0, 0.0] },
        Vertex { position: [-p,  p, -p], normal: [-1.0, 0.0, 0.0] },
        // +Y face
        Vertex { position: [-p,  p,  p], normal: [0.0, 1.0, 0.0] },
        Vertex { position: [ p,  p,  p], normal: [0.0, 1.0, 0.0] },
        Vertex { position: [ p,  p, -p], normal: [0.0, 1.0, 0.0] },
        Vertex { position: [-p,  p, -p], normal: [0.0, 1.0, 0.0] },
        // -Y face
        Vertex { position: [-p, -p, -p], normal: [0.0, -1.0, 0.0] },
        Vertex { position: [ p, -p, -p], normal: [0.0, -1.0, 0.0] },
        Vertex { position: [ p, -p,  p], normal: [0.0, -1.0, 0.0] },
        Vertex { position: [-p, -p,  p], normal: [0.0, -1.0, 0.0] },
    ];
    #[rustfmt::skip]
    let indices: Vec<u16> = vec![
        0,1,2, 2,3,0,
        4,5,6, 6,7,4,
        8,9,10, 10,11,8,
        12,13,14, 14,15,12,
        16,17,18, 18,19,16,
        20,21,22, 22,23,20,
    ];
    (vertices, indices)
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

struct VoxelMesh {
    buffer: wgpu::Buffer,
    vertex_count: u32,
    revision: u64,
}

/// Device-dependent GPU state: pipelines, buffers and render-state caches.
///
/// Built for one device generation. After device recovery the owner drops
/// it and builds a new one against the new device.
pub struct WgpuRenderer {
    generation: u64,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    shaders: ResourceCache<&'static str, wgpu::ShaderModule>,
    samplers: ResourceCache<&'static str, wgpu::Sampler>,
    voxel_pipeline: wgpu::RenderPipeline,
    cube_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    sky_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    sky_buffer: wgpu::Buffer,
    cube_vertex_buffer: wgpu::Buffer,
    cube_index_buffer: wgpu::Buffer,
    cube_index_count: u32,
    instance_buffer: wgpu::Buffer,
    max_instances: u32,
    voxel_mesh: Option<VoxelMesh>,
    /// Bound in place of scene depth when the depth buffer is disabled.
    fallback_depth: wgpu::TextureView,
}

impl WgpuRenderer {
    pub fn new(
        gpu: &WgpuDevice,
        generation: u64,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Result<Self, GpuError> {
        let device = &gpu.device;
        let mut shader_cache = ResourceCache::new();
        for (name, source) in [
            ("voxel", shaders::VOXEL_SHADER),
            ("cube", shaders::CUBE_SHADER),
            ("sky", shaders::SKY_SHADER),
        ] {
            shader_cache.insert_if_absent(
                name,
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(name),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                }),
            );
        }
        let mut sampler_cache = ResourceCache::new();
        sampler_cache.insert(
            "linear",
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("linear"),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }),
        );

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let object_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxel_object_uniform"),
            size: std::mem::size_of::<VoxelObjectUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("voxel_object_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("voxel_object_bind_group"),
            layout: &object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: object_buffer.as_entire_binding(),
            }],
        });

        let sky_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sky_uniform"),
            size: std::mem::size_of::<cubeworld_render::SkyUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sky_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let depth_stencil = depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        });
        let color_targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let voxel_shader = shader_cache.get("voxel")?;
        let voxel_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("voxel_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &object_layout],
            push_constant_ranges: &[],
        });
        let voxel_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("voxel_pipeline"),
            layout: Some(&voxel_layout),
            vertex: wgpu::VertexState {
                module: voxel_shader,
                entry_point: Some("vs_voxel"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<MeshVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Uint32,
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: voxel_shader,
                entry_point: Some("fs_voxel"),
                compilation_options: Default::default(),
                targets: &color_targets,
            }),
            // Face templates are clockwise seen from outside.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Cw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: depth_stencil.clone(),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let cube_shader = shader_cache.get("cube")?;
        let cube_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cube_pipeline_layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });
        let cube_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("cube_pipeline"),
            layout: Some(&cube_layout),
            vertex: wgpu::VertexState {
                module: cube_shader,
                entry_point: Some("vs_cube"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x3,
                            1 => Float32x3,
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceData>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4,
                            5 => Float32x4,
                            6 => Float32x4,
                        ],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: cube_shader,
                entry_point: Some("fs_cube"),
                compilation_options: Default::default(),
                targets: &color_targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let sky_shader = shader_cache.get("sky")?;
        let sky_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky_pipeline_layout"),
            bind_group_layouts: &[&sky_layout],
            push_constant_ranges: &[],
        });
        let sky_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sky_pipeline"),
            layout: Some(&sky_pipeline_layout),
            vertex: wgpu::VertexState {
                module: sky_shader,
                entry_point: Some("vs_sky"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: sky_shader,
                entry_point: Some("fs_sky"),
                compilation_options: Default::default(),
                targets: &color_targets,
            }),
            primitive: Default::default(),
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let (cube_verts, cube_indices) = cube_mesh();
        let cube_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_vertex_buffer"),
            contents: bytemuck::cast_slice(&cube_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_index_buffer"),
            contents: bytemuck::cast_slice(&cube_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let max_instances = 1_024u32;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: u64::from(max_instances) * std::mem::size_of::<InstanceData>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let fallback_depth = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("fallback_depth"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Depth32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&Default::default());

        tracing::debug!(generation, ?color_format, ?depth_format, "gpu scene renderer built");
        Ok(Self {
            generation,
            color_format,
            depth_format,
            shaders: shader_cache,
            samplers: sampler_cache,
            voxel_pipeline,
            cube_pipeline,
            sky_pipeline,
            sky_layout,
            frame_buffer,
            frame_bind_group,
            object_buffer,
            object_bind_group,
            sky_buffer,
            cube_vertex_buffer,
            cube_index_buffer,
            cube_index_count: cube_indices.len() as u32,
            instance_buffer,
            max_instances,
            voxel_mesh: None,
            fallback_depth,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when this renderer can draw into targets of these formats.
    pub fn matches(&self, color_format: wgpu::TextureFormat, depth_format: Option<wgpu::TextureFormat>) -> bool {
        self.color_format == color_format && self.depth_format == depth_format
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Start recording a frame into `output`.
    pub fn frame<'a>(
        &'a mut self,
        gpu: &'a WgpuDevice,
        generation: u64,
        color: &'a WgpuColorTarget,
        depth: Option<&'a WgpuDepthTarget>,
        output: &'a wgpu::TextureView,
    ) -> Result<GpuFrame<'a>, GpuError> {
        if generation != self.generation {
            return Err(GpuError::StaleDevice {
                built: self.generation,
                current: generation,
            });
        }
        let encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        Ok(GpuFrame {
            renderer: self,
            gpu,
            color,
            depth,
            output,
            encoder: Some(encoder),
            instances: Vec::new(),
            lights: LightSet::new(),
            draw_voxels: false,
            in_pass: false,
        })
    }

    fn upload_voxels(&mut self, gpu: &WgpuDevice, world: &VoxelWorld) {
        let current = self.voxel_mesh.as_ref().map(|m| m.revision);
        if current == Some(world.revision()) {
            return;
        }
        let mesh = world.mesh();
        self.voxel_mesh = (!mesh.is_empty()).then(|| VoxelMesh {
            buffer: gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("voxel_vertex_buffer"),
                    contents: bytemuck::cast_slice(mesh),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
            vertex_count: mesh.len() as u32,
            revision: world.revision(),
        });
        tracing::debug!(vertices = mesh.len(), revision = world.revision(), "voxel mesh uploaded");
    }
}

/// One frame being recorded. Submitted by [`GpuFrame::submit`].
pub struct GpuFrame<'a> {
    renderer: &'a mut WgpuRenderer,
    gpu: &'a WgpuDevice,
    color: &'a WgpuColorTarget,
    depth: Option<&'a WgpuDepthTarget>,
    output: &'a wgpu::TextureView,
    encoder: Option<wgpu::CommandEncoder>,
    instances: Vec<InstanceData>,
    lights: LightSet,
    draw_voxels: bool,
    in_pass: bool,
}

impl GpuFrame<'_> {
    pub fn submit(mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.gpu.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}

impl SceneRenderer for GpuFrame<'_> {
    type Error = GpuError;

    fn begin_pass(&mut self, camera: &FreeFlightCamera, lights: &LightSet) -> Result<(), GpuError> {
        let uniform = FrameUniform {
            view_proj: camera.view_projection().to_cols_array_2d(),
            lighting: lights.to_uniform(),
        };
        self.gpu
            .queue
            .write_buffer(&self.renderer.frame_buffer, 0, bytemuck::bytes_of(&uniform));
        self.instances.clear();
        self.lights = lights.clone();
        self.draw_voxels = false;
        self.in_pass = true;
        Ok(())
    }

    fn draw_entity(&mut self, _key: EntityKey, entity: &Entity) -> Result<(), GpuError> {
        if !self.in_pass {
            return Err(GpuError::OutOfOrder("draw_entity outside a pass"));
        }
        if self.instances.len() >= self.renderer.max_instances as usize {
            return Ok(());
        }
        let cols = entity.transform().matrix().to_cols_array_2d();
        self.instances.push(InstanceData {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            color: entity.color().extend(1.0).to_array(),
        });
        Ok(())
    }

    fn draw_voxel_world(&mut self, world: &VoxelWorld) -> Result<(), GpuError> {
        if !self.in_pass {
            return Err(GpuError::OutOfOrder("draw_voxel_world outside a pass"));
        }
        self.renderer.upload_voxels(self.gpu, world);
        self.gpu.queue.write_buffer(
            &self.renderer.object_buffer,
            0,
            bytemuck::bytes_of(&world.to_uniform()),
        );
        self.draw_voxels = self.renderer.voxel_mesh.is_some();
        Ok(())
    }

    fn end_pass(&mut self) -> Result<(), GpuError> {
        if !std::mem::replace(&mut self.in_pass, false) {
            return Err(GpuError::OutOfOrder("end_pass without begin_pass"));
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(GpuError::OutOfOrder("frame already submitted"));
        };
        let renderer = &*self.renderer;
        if !self.instances.is_empty() {
            self.gpu.queue.write_buffer(
                &renderer.instance_buffer,
                0,
                bytemuck::cast_slice(&self.instances),
            );
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    // Alpha 0 marks pixels without geometry for the sky pass.
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: self.depth.map(|depth| {
                wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            ..Default::default()
        });

        pass.set_bind_group(0, &renderer.frame_bind_group, &[]);
        if !self.instances.is_empty() {
            pass.set_pipeline(&renderer.cube_pipeline);
            pass.set_vertex_buffer(0, renderer.cube_vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, renderer.instance_buffer.slice(..));
            pass.set_index_buffer(renderer.cube_index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..renderer.cube_index_count, 0, 0..self.instances.len() as u32);
        }
        if let (true, Some(mesh)) = (self.draw_voxels, renderer.voxel_mesh.as_ref()) {
            pass.set_pipeline(&renderer.voxel_pipeline);
            pass.set_bind_group(1, &renderer.object_bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.buffer.slice(..));
            pass.draw(0..mesh.vertex_count, 0..1);
        }
        Ok(())
    }

    fn post_process(&mut self, camera: &FreeFlightCamera, sky: &SkySettings) -> Result<(), GpuError> {
        if self.in_pass {
            return Err(GpuError::OutOfOrder("post_process inside the main pass"));
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(GpuError::OutOfOrder("frame already submitted"));
        };
        let renderer = &*self.renderer;

        let mut uniform = sky.to_uniform(camera, &self.lights);
        uniform.depth_valid = if self.depth.is_some() { 1.0 } else { 0.0 };
        self.gpu
            .queue
            .write_buffer(&renderer.sky_buffer, 0, bytemuck::bytes_of(&uniform));

        let depth_view = self.depth.map_or(&renderer.fallback_depth, |d| &d.view);
        let sampler = renderer.samplers.get("linear")?;
        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sky_bind_group"),
            layout: &renderer.sky_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: renderer.sky_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("sky_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        pass.set_pipeline(&renderer.sky_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uniform_matches_shader_block() {
        // mat4 + Lighting (eye, count, 2 lights of 64 bytes)
        assert_eq!(std::mem::size_of::<FrameUniform>(), 64 + 16 + 2 * 64);
        assert_eq!(std::mem::size_of::<InstanceData>(), 80);
    }

    #[test]
    fn cube_faces_wind_outwards() {
        let (vertices, indices) = cube_mesh();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        for tri in indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| glam::Vec3::from(vertices[i as usize].position));
            let n = glam::Vec3::from(vertices[tri[0] as usize].normal);
            assert!((b - a).cross(c - a).dot(n) > 0.0);
        }
    }
}
