use std::fmt;
use std::mem;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::renderer::backend::{Gpu, VertexArray, VertexAttribute};
use crate::renderer::shader::Program;
use crate::renderer::texture::{Texture, TextureKind};

/// The vertex attribute location of [`Vertex::position`].
pub const ATTR_LOC_POSITION: u32 = 0;
/// The vertex attribute location of [`Vertex::normal`].
pub const ATTR_LOC_NORMAL: u32 = 1;
/// The vertex attribute location of [`Vertex::tex_coords`].
pub const ATTR_LOC_TEX_COORDS: u32 = 2;
/// The vertex attribute location of [`Vertex::tangent`].
pub const ATTR_LOC_TANGENT: u32 = 3;
/// The vertex attribute location of [`Vertex::bitangent`].
pub const ATTR_LOC_BITANGENT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

impl Vertex {
    /// A vertex without tangent space information.
    pub fn new(position: Vec3, normal: Vec3, tex_coords: Vec2) -> Vertex {
        Vertex {
            position,
            normal,
            tex_coords,
            ..Vertex::default()
        }
    }

    /// The interleaved layout of `Vertex`, matching the attribute locations
    /// of the shaders.
    pub fn attributes() -> [VertexAttribute; 5] {
        let attribute = |location, components, offset| VertexAttribute {
            location,
            components,
            offset,
        };
        [
            attribute(ATTR_LOC_POSITION, 3, mem::offset_of!(Vertex, position)),
            attribute(ATTR_LOC_NORMAL, 3, mem::offset_of!(Vertex, normal)),
            attribute(ATTR_LOC_TEX_COORDS, 2, mem::offset_of!(Vertex, tex_coords)),
            attribute(ATTR_LOC_TANGENT, 3, mem::offset_of!(Vertex, tangent)),
            attribute(ATTR_LOC_BITANGENT, 3, mem::offset_of!(Vertex, bitangent)),
        ]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("index {index} is out of range for a mesh of {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("{requested} textures need more texture units than the {available} available")]
    TooManyTextureUnits { requested: usize, available: u32 },
    #[error("{index_count} indices do not form whole triangles")]
    IncompleteTriangle { index_count: usize },
}

/// A texture as used by a particular mesh.
#[derive(Debug, Clone)]
pub struct MaterialTexture {
    pub kind: TextureKind,
    pub texture: Rc<Texture>,
}

/// Which texture unit a texture is bound to during a draw, and the sampler
/// uniform that is pointed at that unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub unit: u32,
    pub uniform: String,
}

/// Assigns texture unit `i` to the `i`th texture, naming the samplers
/// `material.<kind><n>` where `n` counts textures of the same kind from 1.
pub fn sampler_bindings(kinds: impl IntoIterator<Item = TextureKind>) -> Vec<SamplerBinding> {
    let mut counters = [0u32; TextureKind::ALL.len()];
    kinds
        .into_iter()
        .enumerate()
        .map(|(unit, kind)| {
            let counter = &mut counters[kind as usize];
            *counter += 1;
            SamplerBinding {
                unit: unit as u32,
                uniform: format!("material.{}{}", kind.sampler_prefix(), counter),
            }
        })
        .collect()
}

/// One drawable triangle list with its textures, uploaded to the GPU on
/// creation. The buffers are deleted when the mesh is dropped.
pub struct Mesh {
    gpu: Gpu,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<MaterialTexture>,
    bindings: Vec<SamplerBinding>,
    vertex_array: VertexArray,
}

impl Mesh {
    pub fn new(
        gpu: &Gpu,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: Vec<MaterialTexture>,
    ) -> Result<Mesh, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::IncompleteTriangle {
                index_count: indices.len(),
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }
        let available = gpu.max_texture_units();
        if textures.len() > available as usize {
            return Err(MeshError::TooManyTextureUnits {
                requested: textures.len(),
                available,
            });
        }

        let bindings = sampler_bindings(textures.iter().map(|texture| texture.kind));
        let vertex_array = gpu.create_vertex_array(
            bytemuck::cast_slice(&vertices),
            mem::size_of::<Vertex>(),
            &Vertex::attributes(),
            &indices,
        );

        Ok(Mesh {
            gpu: gpu.clone(),
            vertices,
            indices,
            textures,
            bindings,
            vertex_array,
        })
    }

    /// Binds the textures to their units, points the samplers of `program` at
    /// them and draws every index of the mesh. `program` should be the
    /// current program.
    pub fn draw(&self, program: &Program) {
        for (texture, binding) in self.textures.iter().zip(&self.bindings) {
            self.gpu.bind_texture(binding.unit, texture.texture.handle());
            program.set_int(&binding.uniform, binding.unit as i32);
        }
        self.gpu.draw_indexed(self.vertex_array, self.indices.len());
        if !self.textures.is_empty() {
            self.gpu.set_active_texture_unit(0);
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[MaterialTexture] {
        &self.textures
    }

    pub fn bindings(&self) -> &[SamplerBinding] {
        &self.bindings
    }

    pub fn vertex_array(&self) -> VertexArray {
        self.vertex_array
    }

    /// Deletes the GPU buffers now rather than at the end of the scope.
    pub fn release(self) {}
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("vertices", &self.vertices.len())
            .field("indices", &self.indices.len())
            .field("textures", &self.textures)
            .field("vertex_array", &self.vertex_array)
            .finish()
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.gpu.delete_vertex_array(self.vertex_array);
    }
}
