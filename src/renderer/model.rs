use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::renderer::backend::Gpu;
use crate::renderer::mesh::{MaterialTexture, Mesh, Vertex};
use crate::renderer::shader::Program;
use crate::renderer::texture::{Texture, TextureImage, TextureKind};
use crate::scene::{GltfImporter, ImportError, RawMesh, SceneGraph, SceneImporter};

/// Every mesh of an imported scene file, sharing textures between meshes
/// that refer to the same image file.
pub struct Model {
    meshes: Vec<Mesh>,
    directory: PathBuf,
    /// Keyed by the resolved texture path. Files that failed to load are
    /// remembered as `None` so they're only attempted once.
    textures_loaded: HashMap<PathBuf, Option<Rc<Texture>>>,
}

impl Model {
    /// Imports the glTF file at `path`.
    pub fn load(gpu: &Gpu, path: &Path) -> Result<Model, ImportError> {
        Model::load_with(gpu, path, &GltfImporter)
    }

    pub fn load_with(
        gpu: &Gpu,
        path: &Path,
        importer: &dyn SceneImporter,
    ) -> Result<Model, ImportError> {
        let scene = importer.parse_scene_file(path)?;
        let model = Model::from_scene(gpu, &scene, path, |texture_path| {
            TextureImage::open(texture_path).map_err(|err| ImportError::TextureUnavailable {
                path: texture_path.to_owned(),
                reason: err.to_string(),
            })
        })?;
        log::info!(
            "loaded {path:?}: {} meshes, {} textures",
            model.meshes.len(),
            model.texture_count()
        );
        Ok(model)
    }

    /// Builds the model out of an already parsed scene. `source` is the
    /// scene file, texture paths are resolved relative to its directory and
    /// loaded with `load_image`.
    pub fn from_scene(
        gpu: &Gpu,
        scene: &SceneGraph,
        source: &Path,
        mut load_image: impl FnMut(&Path) -> Result<TextureImage, ImportError>,
    ) -> Result<Model, ImportError> {
        let mut model = Model {
            meshes: Vec::new(),
            directory: source.parent().unwrap_or_else(|| Path::new("")).to_owned(),
            textures_loaded: HashMap::new(),
        };
        for index in scene.meshes_depth_first() {
            let raw = scene.meshes.get(index).ok_or_else(|| {
                ImportError::invalid_scene(source, format!("mesh {index} does not exist"))
            })?;
            let mesh = model.process_mesh(gpu, scene, raw, &mut load_image)?;
            model.meshes.push(mesh);
        }
        if model.meshes.is_empty() {
            return Err(ImportError::invalid_scene(source, "the scene has no meshes"));
        }
        Ok(model)
    }

    fn process_mesh(
        &mut self,
        gpu: &Gpu,
        scene: &SceneGraph,
        raw: &RawMesh,
        load_image: &mut impl FnMut(&Path) -> Result<TextureImage, ImportError>,
    ) -> Result<Mesh, ImportError> {
        fn attribute<T: Copy + Default>(values: &Option<Vec<T>>, i: usize) -> T {
            values
                .as_ref()
                .and_then(|values| values.get(i))
                .copied()
                .unwrap_or_default()
        }
        let vertices = raw
            .positions
            .iter()
            .enumerate()
            .map(|(i, &position)| Vertex {
                position,
                normal: attribute::<Vec3>(&raw.normals, i),
                tex_coords: attribute::<Vec2>(&raw.tex_coords, i),
                tangent: attribute::<Vec3>(&raw.tangents, i),
                bitangent: attribute::<Vec3>(&raw.bitangents, i),
            })
            .collect();

        let mut textures = Vec::new();
        if let Some(material) = raw.material.and_then(|i| scene.materials.get(i)) {
            for kind in TextureKind::ALL {
                for relative_path in material.textures_of_kind(kind) {
                    let path = self.directory.join(relative_path);
                    if let Some(texture) = self.load_texture(gpu, path, load_image) {
                        textures.push(MaterialTexture { kind, texture });
                    }
                }
            }
        }

        Ok(Mesh::new(gpu, vertices, raw.indices.clone(), textures)?)
    }

    fn load_texture(
        &mut self,
        gpu: &Gpu,
        path: PathBuf,
        load_image: &mut impl FnMut(&Path) -> Result<TextureImage, ImportError>,
    ) -> Option<Rc<Texture>> {
        if let Some(texture) = self.textures_loaded.get(&path) {
            return texture.clone();
        }
        let texture = match load_image(&path) {
            Ok(image) => {
                log::debug!("loaded texture {path:?} ({}x{})", image.width, image.height);
                Some(Rc::new(Texture::new(gpu, &image, path.clone())))
            }
            Err(err) => {
                log::warn!("{err}, leaving the texture slot empty");
                None
            }
        };
        self.textures_loaded.insert(path, texture.clone());
        texture
    }

    /// Draws every mesh with `program`, which should be the current program.
    pub fn draw(&self, program: &Program) {
        for mesh in &self.meshes {
            mesh.draw(program);
        }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// The number of distinct textures uploaded for this model.
    pub fn texture_count(&self) -> usize {
        self.textures_loaded.values().flatten().count()
    }

    /// The directory texture paths are resolved against.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("meshes", &self.meshes)
            .field("directory", &self.directory)
            .finish()
    }
}
