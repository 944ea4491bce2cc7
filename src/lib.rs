//! A Phong-lit OpenGL scene viewer: shader programs, meshes and imported
//! models drawn through a swappable [`renderer::Backend`].

pub mod camera;
pub mod config;
pub mod renderer;
pub mod scene;
