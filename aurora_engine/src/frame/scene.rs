/// Scene input: meshes, materials and per-object transforms
///
/// The orchestrator only borrows these. Scene data is owned by the caller and
/// must be passed again, unchanged in length, on every `draw_frame`.

use std::path::PathBuf;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::graphics_device::{BufferFormat, VertexAttribute};

/// Fragment-stage define selecting the texture sample
pub const FLAG_HAS_TEXTURE: &str = "HAS_TEXTURE";
/// Fragment-stage define keeping material opacity in the output alpha
pub const FLAG_ALPHA_BLEND: &str = "ALPHA_BLEND";

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }

    /// Attribute layout matching `shaders/mesh.vert` (binding 0)
    pub fn attributes() -> [VertexAttribute; 3] {
        [
            VertexAttribute { location: 0, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 0 },
            VertexAttribute { location: 1, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 12 },
            VertexAttribute { location: 2, binding: 0, format: BufferFormat::R32G32_SFLOAT, offset: 24 },
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// 1.0 is opaque; anything lower enables blending
    pub opacity: f32,
    pub texture_path: Option<PathBuf>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(0.2),
            shininess: 32.0,
            opacity: 1.0,
            texture_path: None,
        }
    }
}

impl Material {
    pub fn is_translucent(&self) -> bool {
        self.opacity < 1.0
    }

    /// Fragment defines derived from this material, in a stable order
    pub fn shader_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::with_capacity(2);
        if self.texture_path.is_some() {
            flags.push(FLAG_HAS_TEXTURE);
        }
        if self.is_translucent() {
            flags.push(FLAG_ALPHA_BLEND);
        }
        flags
    }

    pub fn uniform(&self) -> MaterialUniform {
        MaterialUniform {
            ambient: self.ambient.extend(1.0).to_array(),
            diffuse: self.diffuse.extend(1.0).to_array(),
            specular: self.specular.extend(1.0).to_array(),
            params: [self.shininess, self.opacity, 0.0, 0.0],
        }
    }
}

/// std140 image of the `Material` uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct MaterialUniform {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// x: shininess, y: opacity
    pub params: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

/// One drawable: a mesh and its world transform, both borrowed
#[derive(Debug, Clone, Copy)]
pub struct SceneObject<'a> {
    pub mesh: &'a MeshData,
    pub transform: &'a Mat4,
}
