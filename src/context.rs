//! The wgpu backend.
//!
//! [`Context`] owns the window surface, device, queue and pipelines, plus the
//! device buffers of every uploaded mesh keyed by [`GpuMeshId`]. Each mesh
//! keeps its own uniform buffers so per-draw model matrices and colours can
//! be written before the pass without clobbering each other.

use std::{collections::HashMap, iter, sync::Arc};

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    backend::{GpuMeshId, RenderBackend},
    camera::CameraUniform,
    config::{ViewerConfig, linear_rgb},
    data_structures::texture::Texture,
    error::BackendError,
    pipelines::{MeshUniform, Pipelines, uniform_layout},
    render::{DrawItem, Frame},
    resources::mesh::{self, MeshData},
};

#[derive(Debug)]
struct GpuMesh {
    vertex: wgpu::Buffer,
    index: Option<wgpu::Buffer>,
    index_count: u32,
    edge_index: Option<wgpu::Buffer>,
    edge_count: u32,
    surface_uniform: wgpu::Buffer,
    surface_bind_group: wgpu::BindGroup,
    edge_uniform: wgpu::Buffer,
    edge_bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, mesh: &MeshData) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = |indices: &[u32], label: &str| {
            (!indices.is_empty()).then(|| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} {}", mesh.name, label)),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                })
            })
        };
        let uniform = |label: &str| {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} {}", mesh.name, label)),
                size: std::mem::size_of::<MeshUniform>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
                label: Some(label),
            });
            (buffer, bind_group)
        };
        let (surface_uniform, surface_bind_group) = uniform("surface_uniform");
        let (edge_uniform, edge_bind_group) = uniform("edge_uniform");

        Self {
            vertex,
            index: index_buffer(&mesh.indices, "Index Buffer"),
            index_count: mesh.indices.len() as u32,
            edge_index: index_buffer(&mesh.edge_indices, "Edge Index Buffer"),
            edge_count: mesh.edge_indices.len() as u32,
            surface_uniform,
            surface_bind_group,
            edge_uniform,
            edge_bind_group,
        }
    }

    fn destroy(&self) {
        self.vertex.destroy();
        if let Some(index) = &self.index {
            index.destroy();
        }
        if let Some(edge_index) = &self.edge_index {
            edge_index.destroy();
        }
        self.surface_uniform.destroy();
        self.edge_uniform.destroy();
    }

    fn draw_surface(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if let Some(index) = &self.index {
            render_pass.set_bind_group(1, &self.surface_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex.slice(..));
            render_pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.index_count, 0, 0..1);
        }
    }

    fn draw_edges(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if let Some(edge_index) = &self.edge_index {
            render_pass.set_bind_group(1, &self.edge_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex.slice(..));
            render_pass.set_index_buffer(edge_index.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.edge_count, 0, 0..1);
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    surface: Option<wgpu::Surface<'static>>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    depth_texture: Texture,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    mesh_bind_group_layout: wgpu::BindGroupLayout,
    pipelines: Pipelines,
    meshes: HashMap<GpuMeshId, GpuMesh>,
    next_id: u64,
    grid: GpuMesh,
    grid_colour: [f32; 3],
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("device and queue on {}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("topo-stage device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colours are handed over in linear space; an sRGB surface encodes them.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no texture formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform {
                view_proj: cgmath::Matrix4::from_scale(1.0).into(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout = uniform_layout(&device, "camera_bind_group_layout");
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        let mesh_bind_group_layout = uniform_layout(&device, "mesh_bind_group_layout");

        let pipelines = Pipelines::new(
            &device,
            config.format,
            &camera_bind_group_layout,
            &mesh_bind_group_layout,
        );

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let grid = GpuMesh::new(
            &device,
            &mesh_bind_group_layout,
            &mesh::grid("ground grid", viewer.grid_size, viewer.grid_divisions),
        );

        let mut ctx = Self {
            window,
            surface: Some(surface),
            device,
            queue,
            config,
            depth_texture,
            camera_buffer,
            camera_bind_group,
            mesh_bind_group_layout,
            pipelines,
            meshes: HashMap::new(),
            next_id: 0,
            grid,
            grid_colour: linear_rgb(viewer.grid_colour),
            is_surface_configured: false,
        };
        ctx.resize(size.width, size.height);
        Ok(ctx)
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn write_uniforms(&self, frame: &Frame) {
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[CameraUniform {
                view_proj: frame.view_proj,
            }]),
        );
        let identity: [[f32; 4]; 4] = cgmath::Matrix4::from_scale(1.0).into();
        let [r, g, b] = self.grid_colour;
        self.queue.write_buffer(
            &self.grid.edge_uniform,
            0,
            bytemuck::cast_slice(&[MeshUniform {
                model: identity,
                colour: [r, g, b, 1.0],
            }]),
        );
        for item in &frame.items {
            let Some(mesh) = self.meshes.get(&item.gpu) else {
                continue;
            };
            self.queue.write_buffer(
                &mesh.surface_uniform,
                0,
                bytemuck::cast_slice(&[MeshUniform {
                    model: item.world,
                    colour: item.material.rgba(),
                }]),
            );
            let [r, g, b] = item.edges.colour;
            self.queue.write_buffer(
                &mesh.edge_uniform,
                0,
                bytemuck::cast_slice(&[MeshUniform {
                    model: item.world,
                    colour: [r, g, b, 1.0],
                }]),
            );
        }
    }

    fn live(&self, item: &DrawItem) -> Option<&GpuMesh> {
        let mesh = self.meshes.get(&item.gpu);
        if mesh.is_none() {
            log::warn!("skipping draw of released {:?}", item.gpu);
        }
        mesh
    }
}

impl RenderBackend for Context {
    fn upload_mesh(&mut self, mesh: &MeshData) -> GpuMeshId {
        self.next_id += 1;
        let id = GpuMeshId(self.next_id);
        self.meshes.insert(
            id,
            GpuMesh::new(&self.device, &self.mesh_bind_group_layout, mesh),
        );
        id
    }

    fn release_mesh(&mut self, id: GpuMeshId) -> Result<(), BackendError> {
        let mesh = self
            .meshes
            .remove(&id)
            .ok_or_else(|| BackendError::Surface(format!("{:?} is not live", id)))?;
        mesh.destroy();
        Ok(())
    }

    fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    fn viewport(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
            self.is_surface_configured = true;
        }
        self.depth_texture.destroy();
        self.depth_texture = Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), BackendError> {
        let Some(surface) = &self.surface else {
            return Err(BackendError::Surface("surface released".to_string()));
        };
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                return Err(BackendError::SurfaceLost);
            }
            Err(e) => return Err(BackendError::Surface(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_uniforms(frame);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let [r, g, b] = frame.clear_colour;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

            render_pass.set_pipeline(&self.pipelines.basic);
            for item in frame.opaque() {
                if let Some(mesh) = self.live(item) {
                    mesh.draw_surface(&mut render_pass);
                }
            }

            render_pass.set_pipeline(&self.pipelines.edges);
            self.grid.draw_edges(&mut render_pass);

            // Translucent surfaces come sorted far to near.
            render_pass.set_pipeline(&self.pipelines.transparent);
            for item in frame.translucent() {
                if let Some(mesh) = self.live(item) {
                    mesh.draw_surface(&mut render_pass);
                }
            }

            render_pass.set_pipeline(&self.pipelines.edges);
            for item in frame.items.iter().filter(|item| item.edges.visible) {
                if let Some(mesh) = self.live(item) {
                    mesh.draw_edges(&mut render_pass);
                }
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn release_surface(&mut self) -> Result<(), BackendError> {
        let surface = self
            .surface
            .take()
            .ok_or_else(|| BackendError::Surface("surface already detached".to_string()))?;
        self.is_surface_configured = false;
        drop(surface);
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for (_, mesh) in self.meshes.drain() {
            mesh.destroy();
        }
        self.grid.destroy();
        self.depth_texture.destroy();
    }
}
