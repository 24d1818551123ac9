use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Mat4};
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::renderer::weather::geometry::WeatherQuad;

const INITIAL_QUAD_CAPACITY: usize = 512;
const QUAD_CORNERS: [QuadCorner; 4] = [
    QuadCorner {
        corner: [-0.5, -0.5],
    },
    QuadCorner {
        corner: [0.5, -0.5],
    },
    QuadCorner {
        corner: [-0.5, 0.5],
    },
    QuadCorner {
        corner: [0.5, 0.5],
    },
];
const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
    1 => Float32x3,
    2 => Float32x3,
    3 => Float32x3,
    4 => Float32x2,
    5 => Float32x2,
    6 => Uint32,
    7 => Uint32
];

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct QuadCorner {
    corner: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct WeatherUniform {
    view_proj: [[f32; 4]; 4],
    origin: [f32; 4],
    time: f32,
    _pad: [f32; 3],
}

pub struct WeatherRenderer {
    pipeline: wgpu::RenderPipeline,
    corner_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    instance_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl WeatherRenderer {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Weather Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/weather.wgsl"
                ))
                .into(),
            ),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Weather Bind Group Layout"),
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
            label: Some("Weather Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Streaks darken whatever is behind them.
        let multiply = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Weather Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: mem::size_of::<QuadCorner>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: mem::size_of::<WeatherQuad>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &QUAD_ATTRIBUTES,
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(multiply),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let corner_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Weather Corner Buffer"),
            contents: bytemuck::cast_slice(&QUAD_CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let instance_buffer = create_instance_buffer(device, INITIAL_QUAD_CAPACITY);

        let uniform = WeatherUniform {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            origin: [0.0; 4],
            time: 0.0,
            _pad: [0.0; 3],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Weather Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Weather Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            pipeline,
            corner_buffer,
            instance_buffer,
            instance_capacity: INITIAL_QUAD_CAPACITY,
            instance_count: 0,
            uniform_buffer,
            bind_group,
        }
    }

    /// Replaces the uploaded mesh. An empty slice hides the effect.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, quads: &[WeatherQuad]) {
        if quads.len() > self.instance_capacity {
            let capacity = grown_capacity(self.instance_capacity, quads.len());
            debug!(
                "Growing weather instance buffer from {} to {} quads",
                self.instance_capacity, capacity
            );
            self.instance_buffer = create_instance_buffer(device, capacity);
            self.instance_capacity = capacity;
        }

        if !quads.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(quads));
        }
        self.instance_count = quads.len() as u32;
    }

    pub fn update(&self, queue: &wgpu::Queue, view_proj: Mat4, origin: IVec3, time: f32) {
        let uniform = WeatherUniform {
            view_proj: view_proj.to_cols_array_2d(),
            origin: [origin.x as f32, origin.y as f32, origin.z as f32, 0.0],
            time,
            _pad: [0.0; 3],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.instance_count == 0 {
            return;
        }

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.corner_buffer.slice(..));
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        render_pass.draw(0..QUAD_CORNERS.len() as u32, 0..self.instance_count);
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Weather Instance Buffer"),
        size: (capacity * mem::size_of::<WeatherQuad>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn grown_capacity(current: usize, required: usize) -> usize {
    let mut capacity = current.max(1);
    while capacity < required {
        capacity *= 2;
    }
    capacity
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::{grown_capacity, WeatherUniform, QUAD_ATTRIBUTES};
    use crate::renderer::weather::geometry::WeatherQuad;

    #[test]
    fn instance_buffer_grows_by_doubling() {
        assert_eq!(grown_capacity(512, 100), 512);
        assert_eq!(grown_capacity(512, 513), 1024);
        assert_eq!(grown_capacity(512, 3000), 4096);
        assert_eq!(grown_capacity(0, 3), 4);
    }

    #[test]
    fn instance_attributes_cover_the_quad_layout() {
        let last = QUAD_ATTRIBUTES[QUAD_ATTRIBUTES.len() - 1];
        assert_eq!(last.offset as usize + 4, mem::size_of::<WeatherQuad>());
        assert_eq!(QUAD_ATTRIBUTES[3].offset, 36);
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(mem::size_of::<WeatherUniform>(), 96);
    }
}
