use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::config::Config;
use crate::scene::ImportError;

pub mod backend;
mod gl;
pub mod lighting;
pub mod mesh;
pub mod model;
pub mod primitives;
pub mod shader;
#[cfg(test)]
pub mod testing;
pub mod texture;

pub use backend::{Backend, GlBackend, GlLoadError, Gpu};
pub use lighting::{Lights, Material};
pub use mesh::{MaterialTexture, Mesh, MeshError, Vertex};
pub use model::Model;
pub use shader::{Program, ShaderError, UniformWrite};
pub use texture::{Texture, TextureImage, TextureKind};

const LAMP_SCALE: f32 = 0.2;

enum Scene {
    /// The ten textured cubes. `None` if the cube mesh couldn't be built.
    Cubes(Option<Mesh>),
    Model(Model),
}

/// Draws the lit scene and the lamps marking the point lights.
pub struct Renderer {
    gpu: Gpu,
    lighting: Option<Program>,
    lamp: Option<Program>,
    scene: Scene,
    lamp_mesh: Option<Mesh>,
    lights: Lights,
    material: Material,
    clear_color: [f32; 4],
    near: f32,
    far: f32,
    viewport: (i32, i32),
}

impl Renderer {
    /// Loads the programs, textures and meshes named by `config`. Nothing
    /// here is fatal: whatever fails to load is logged and left out of the
    /// frame.
    pub fn new(gpu: Gpu, config: &Config) -> Renderer {
        let lighting = load_program(
            &gpu,
            &config.lighting_vertex_shader,
            &config.lighting_fragment_shader,
        );
        let lamp = load_program(&gpu, &config.lamp_vertex_shader, &config.lamp_fragment_shader);

        let lights = Lights::default();
        let material = Material::default();
        if let Some(lighting) = &lighting {
            lighting.use_program();
            lights.upload(lighting);
        }

        let scene = match &config.model {
            Some(path) => match Model::load(&gpu, path) {
                Ok(model) => Scene::Model(model),
                Err(err) => {
                    log::error!("{err}, showing the cubes instead");
                    Scene::Cubes(cube_scene(&gpu, config))
                }
            },
            None => Scene::Cubes(cube_scene(&gpu, config)),
        };

        let lamp_mesh = primitives::cube(&gpu, Vec::new())
            .map_err(|err| log::error!("could not build the lamp mesh: {err}"))
            .ok();

        let mut renderer = Renderer {
            gpu,
            lighting,
            lamp,
            scene,
            lamp_mesh,
            lights,
            material,
            clear_color: config.clear_color,
            near: config.near,
            far: config.far,
            viewport: (0, 0),
        };
        renderer.resize(config.width as i32, config.height as i32);
        renderer
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.viewport = (width, height);
        self.gpu.set_viewport(width, height);
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.viewport;
        width as f32 / height.max(1) as f32
    }

    pub fn render(&mut self, camera: &Camera) {
        self.gpu.clear(self.clear_color);

        let view = camera.view_matrix();
        let projection = camera.projection_matrix(self.aspect_ratio(), self.near, self.far);

        if let Some(lighting) = &self.lighting {
            lighting.use_program();
            lighting.set_vec3("viewPos", camera.position);
            self.material.upload(lighting);
            lighting.set_mat4("view", view);
            lighting.set_mat4("projection", projection);

            match &self.scene {
                Scene::Cubes(Some(cube)) => {
                    for (i, &position) in primitives::CUBE_POSITIONS.iter().enumerate() {
                        lighting.set_mat4("model", cube_transform(i, position));
                        cube.draw(lighting);
                    }
                }
                Scene::Cubes(None) => {}
                Scene::Model(model) => {
                    lighting.set_mat4("model", Mat4::IDENTITY);
                    model.draw(lighting);
                }
            }
        }

        if let (Some(lamp), Some(lamp_mesh)) = (&self.lamp, &self.lamp_mesh) {
            lamp.use_program();
            lamp.set_mat4("view", view);
            lamp.set_mat4("projection", projection);
            for light in &self.lights.points {
                let model = Mat4::from_translation(light.position)
                    * Mat4::from_scale(Vec3::splat(LAMP_SCALE));
                lamp.set_mat4("model", model);
                lamp_mesh.draw(lamp);
            }
        }
    }
}

/// The model matrix of the `i`th cube: rotated by 20° per cube.
pub fn cube_transform(i: usize, position: Vec3) -> Mat4 {
    let axis = Vec3::new(1.0, 0.3, 0.5).normalize();
    Mat4::from_translation(position) * Mat4::from_axis_angle(axis, (20.0 * i as f32).to_radians())
}

fn load_program(gpu: &Gpu, vertex_path: &Path, fragment_path: &Path) -> Option<Program> {
    match Program::from_files(gpu, vertex_path, fragment_path) {
        Ok(program) => {
            log::info!("loaded program {vertex_path:?} + {fragment_path:?}");
            Some(program)
        }
        Err(err) => {
            log::error!("{err}");
            None
        }
    }
}

fn cube_scene(gpu: &Gpu, config: &Config) -> Option<Mesh> {
    let textures = [
        (TextureKind::Diffuse, &config.diffuse_texture),
        (TextureKind::Specular, &config.specular_texture),
    ]
    .into_iter()
    .filter_map(|(kind, path)| {
        let texture = load_texture(gpu, path)?;
        Some(MaterialTexture { kind, texture })
    })
    .collect();
    primitives::cube(gpu, textures)
        .map_err(|err| log::error!("could not build the cube mesh: {err}"))
        .ok()
}

fn load_texture(gpu: &Gpu, path: &Path) -> Option<Rc<Texture>> {
    match TextureImage::open(path) {
        Ok(image) => Some(Rc::new(Texture::new(gpu, &image, path))),
        Err(err) => {
            let err = ImportError::TextureUnavailable {
                path: path.to_owned(),
                reason: err.to_string(),
            };
            log::warn!("{err}");
            None
        }
    }
}
