//! The CPU-side description of an imported scene file, before anything is
//! uploaded. [`SceneImporter`] implementations produce a [`SceneGraph`] which
//! [`crate::renderer::Model`] turns into meshes.

use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::renderer::mesh::MeshError;
use crate::renderer::texture::TextureKind;

pub(crate) mod gltf;

pub use self::gltf::GltfImporter;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not import scene {path:?}: {reason}")]
    InvalidScene { path: PathBuf, reason: String },
    #[error("could not load texture {path:?}: {reason}")]
    TextureUnavailable { path: PathBuf, reason: String },
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

impl ImportError {
    pub fn invalid_scene(path: &Path, reason: impl Into<String>) -> ImportError {
        ImportError::InvalidScene {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Parses scene files into scene graphs.
pub trait SceneImporter {
    fn parse_scene_file(&self, path: &Path) -> Result<SceneGraph, ImportError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    pub root: SceneNode,
    pub meshes: Vec<RawMesh>,
    pub materials: Vec<RawMaterial>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneNode {
    pub name: Option<String>,
    /// Indices into [`SceneGraph::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

/// One mesh as stored in the scene file. The optional attributes are either
/// missing or as long as `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub name: Option<String>,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tex_coords: Option<Vec<Vec2>>,
    pub tangents: Option<Vec<Vec3>>,
    pub bitangents: Option<Vec<Vec3>>,
    /// Triangle list.
    pub indices: Vec<u32>,
    /// Index into [`SceneGraph::materials`].
    pub material: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMaterial {
    /// Texture file paths, relative to the scene file's directory.
    pub textures: Vec<(TextureKind, String)>,
}

impl RawMaterial {
    pub fn textures_of_kind(&self, kind: TextureKind) -> impl Iterator<Item = &str> + '_ {
        self.textures
            .iter()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, path)| path.as_str())
    }
}

impl SceneGraph {
    /// Visits the meshes of the graph depth-first: a node's own meshes
    /// before the meshes of its children, children in order.
    pub fn meshes_depth_first(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            order.extend_from_slice(&node.meshes);
            stack.extend(node.children.iter().rev());
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(meshes: Vec<usize>, children: Vec<SceneNode>) -> SceneNode {
        SceneNode {
            name: None,
            meshes,
            children,
        }
    }

    #[test]
    fn meshes_are_visited_depth_first() {
        let graph = SceneGraph {
            root: node(
                vec![0],
                vec![
                    node(vec![1], vec![node(vec![2, 3], vec![])]),
                    node(vec![], vec![node(vec![4], vec![])]),
                    node(vec![5], vec![]),
                ],
            ),
            ..SceneGraph::default()
        };
        assert_eq!(graph.meshes_depth_first(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn a_mesh_referenced_twice_is_visited_twice() {
        let graph = SceneGraph {
            root: node(vec![], vec![node(vec![0], vec![]), node(vec![0], vec![])]),
            ..SceneGraph::default()
        };
        assert_eq!(graph.meshes_depth_first(), vec![0, 0]);
    }
}
