use std::path::{Path, PathBuf};

/// Startup settings of the viewer. The binary starts from the defaults and
/// applies its command line on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub lighting_vertex_shader: PathBuf,
    pub lighting_fragment_shader: PathBuf,
    pub lamp_vertex_shader: PathBuf,
    pub lamp_fragment_shader: PathBuf,
    pub diffuse_texture: PathBuf,
    pub specular_texture: PathBuf,
    /// Scene file to show instead of the cubes.
    pub model: Option<PathBuf>,
    pub clear_color: [f32; 4],
    pub near: f32,
    pub far: f32,
    pub capture_mouse: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config::with_assets(Path::new("."))
    }
}

impl Config {
    /// The default configuration with every asset path under `assets`.
    pub fn with_assets(assets: &Path) -> Config {
        Config {
            title: env!("CARGO_PKG_NAME").to_string(),
            width: 1280,
            height: 720,
            lighting_vertex_shader: assets.join("shaders/lighting.vert"),
            lighting_fragment_shader: assets.join("shaders/lighting.frag"),
            lamp_vertex_shader: assets.join("shaders/lamp.vert"),
            lamp_fragment_shader: assets.join("shaders/lamp.frag"),
            diffuse_texture: assets.join("resources/container2.png"),
            specular_texture: assets.join("resources/container2_specular.png"),
            model: None,
            clear_color: [0.43, 0.44, 0.47, 1.0],
            near: 0.1,
            far: 100.0,
            capture_mouse: true,
        }
    }
}
