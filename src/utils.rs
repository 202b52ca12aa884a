use wgpu::util::DeviceExt;
use bytemuck::NoUninit;

use crate::model::resources::Geometry;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, NoUninit)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn from_geometry(geometry: Geometry) -> Self {
        match geometry {
            Geometry::TexturedQuad => Self::textured_quad(),
        }
    }

    /// Quad spanning `[-1, 1]²` at z = 0, texture v pointing down.
    pub fn textured_quad() -> Self {
        let vertex = |x: f32, y: f32, u: f32, v: f32| Vertex {
            pos: [x, y, 0.0],
            uv: [u, v],
        };
        Self {
            vertices: vec![
                vertex(-1.0, -1.0, 0.0, 1.0),
                vertex(1.0, -1.0, 1.0, 1.0),
                vertex(-1.0, 1.0, 0.0, 0.0),
                vertex(1.0, 1.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 2, 1, 3],
        }
    }

    pub fn upload(&self, device: &wgpu::Device) -> MeshBuffer {

        let vertices = bytemuck::cast_slice(&self.vertices);
        let indices = bytemuck::cast_slice(&self.indices);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: vertices,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: indices,
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_triangles_share_the_diagonal() {
        let quad = Mesh::textured_quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices, vec![0, 1, 2, 2, 1, 3]);
        assert!(quad.indices.iter().all(|&i| (i as usize) < quad.vertices.len()));
    }

    #[test]
    fn top_left_corner_samples_texture_origin() {
        let quad = Mesh::textured_quad();
        let top_left = quad
            .vertices
            .iter()
            .find(|v| v.pos[0] < 0.0 && v.pos[1] > 0.0)
            .unwrap();
        assert_eq!(top_left.uv, [0.0, 0.0]);
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(Vertex::layout().array_stride, 20);
    }
}
