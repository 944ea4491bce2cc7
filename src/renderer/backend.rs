//! The seam between the renderer and the graphics driver. Everything that
//! touches GPU state goes through [`Backend`], [`GlBackend`] being the OpenGL
//! implementation used by the application.

use std::ffi::c_void;
use std::fmt;
use std::ptr;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::renderer::gl;
use crate::renderer::texture::{PixelFormat, TextureImage};

/// Shared handle to the backend, held by every value that owns GPU resources
/// so they can release them when dropped.
pub type Gpu = Rc<dyn Backend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// The objects making up one uploaded mesh: the vertex array object, and the
/// vertex and element buffers it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexArray {
    pub vao: u32,
    pub vbo: u32,
    pub ebo: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// A float vertex attribute inside an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: i32,
    pub offset: usize,
}

pub trait Backend {
    /// Compiles one shader stage, returning the driver's info log on failure.
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;
    fn delete_shader(&self, shader: ShaderHandle);
    /// Links the stages into a program, returning the info log on failure.
    fn link_program(
        &self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String>;
    fn delete_program(&self, program: ProgramHandle);
    /// Makes the program current. Uniform writes and draws target the
    /// current program until the next call.
    fn use_program(&self, program: ProgramHandle);
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<i32>;
    /// Writes a uniform of the current program.
    fn set_uniform(&self, location: i32, value: UniformValue);

    fn create_vertex_array(
        &self,
        vertices: &[u8],
        stride: usize,
        attributes: &[VertexAttribute],
        indices: &[u32],
    ) -> VertexArray;
    fn delete_vertex_array(&self, vertex_array: VertexArray);
    fn draw_indexed(&self, vertex_array: VertexArray, index_count: usize);

    fn create_texture(&self, image: &TextureImage) -> TextureHandle;
    fn delete_texture(&self, texture: TextureHandle);
    /// Makes `unit` the active texture unit and binds the texture to it.
    fn bind_texture(&self, unit: u32, texture: TextureHandle);
    fn set_active_texture_unit(&self, unit: u32);
    /// The number of texture units a fragment shader can sample from.
    fn max_texture_units(&self) -> u32;

    fn clear(&self, color: [f32; 4]);
    fn set_viewport(&self, width: i32, height: i32);
}

#[derive(Debug, Error)]
#[error("failed to load OpenGL function pointers")]
pub struct GlLoadError;

/// [`Backend`] implemented with the global OpenGL 3.3 core bindings. Only one
/// should exist per context.
pub struct GlBackend {
    max_texture_units: u32,
}

impl GlBackend {
    /// Loads the OpenGL function pointers with the given loader and sets up
    /// the fixed pipeline state the renderer expects (depth testing).
    pub fn load<F>(loader: F) -> Result<GlBackend, GlLoadError>
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        if !gl::Viewport::is_loaded() || !gl::DrawElements::is_loaded() {
            return Err(GlLoadError);
        }
        gl::call!(gl::Enable(gl::DEPTH_TEST));
        let mut max_texture_units = 0;
        gl::call!(gl::GetIntegerv(
            gl::MAX_TEXTURE_IMAGE_UNITS,
            &mut max_texture_units
        ));
        log::info!("OpenGL loaded, {max_texture_units} texture units available");
        Ok(GlBackend {
            max_texture_units: max_texture_units.max(0) as u32,
        })
    }
}

impl Backend for GlBackend {
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        let type_ = match stage {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        };
        gl::create_shader(type_, source).map(ShaderHandle)
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        gl::call!(gl::DeleteShader(shader.0));
    }

    fn link_program(
        &self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        gl::create_program(&[vertex.0, fragment.0]).map(ProgramHandle)
    }

    fn delete_program(&self, program: ProgramHandle) {
        gl::call!(gl::DeleteProgram(program.0));
    }

    fn use_program(&self, program: ProgramHandle) {
        gl::call!(gl::UseProgram(program.0));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<i32> {
        gl::get_uniform_location(program.0, name)
    }

    fn set_uniform(&self, location: i32, value: UniformValue) {
        match value {
            UniformValue::Int(value) => gl::call!(gl::Uniform1i(location, value)),
            UniformValue::Float(value) => gl::call!(gl::Uniform1f(location, value)),
            UniformValue::Vec3(value) => {
                gl::call!(gl::Uniform3f(location, value.x, value.y, value.z))
            }
            UniformValue::Mat4(value) => {
                let columns = value.to_cols_array();
                gl::call!(gl::UniformMatrix4fv(
                    location,
                    1,
                    gl::FALSE,
                    columns.as_ptr()
                ));
            }
        }
    }

    fn create_vertex_array(
        &self,
        vertices: &[u8],
        stride: usize,
        attributes: &[VertexAttribute],
        indices: &[u32],
    ) -> VertexArray {
        let mut vao = 0;
        let mut buffers = [0; 2];
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        gl::call!(gl::GenBuffers(2, buffers.as_mut_ptr()));
        let [vbo, ebo] = buffers;

        gl::call!(gl::BindVertexArray(vao));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, vbo));
        gl::buffer_data(gl::ARRAY_BUFFER, vertices, gl::STATIC_DRAW);
        gl::call!(gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ebo));
        gl::buffer_data(gl::ELEMENT_ARRAY_BUFFER, indices, gl::STATIC_DRAW);

        for attribute in attributes {
            gl::call!(gl::EnableVertexAttribArray(attribute.location));
            gl::call!(gl::VertexAttribPointer(
                attribute.location,
                attribute.components,
                gl::FLOAT,
                gl::FALSE,
                stride as gl::types::GLsizei,
                ptr::null::<c_void>().wrapping_add(attribute.offset),
            ));
        }
        gl::call!(gl::BindVertexArray(0));

        VertexArray { vao, vbo, ebo }
    }

    fn delete_vertex_array(&self, vertex_array: VertexArray) {
        let buffers = [vertex_array.vbo, vertex_array.ebo];
        gl::call!(gl::DeleteVertexArrays(1, &vertex_array.vao));
        gl::call!(gl::DeleteBuffers(2, buffers.as_ptr()));
    }

    fn draw_indexed(&self, vertex_array: VertexArray, index_count: usize) {
        gl::call!(gl::BindVertexArray(vertex_array.vao));
        gl::call!(gl::DrawElements(
            gl::TRIANGLES,
            index_count as gl::types::GLsizei,
            gl::UNSIGNED_INT,
            ptr::null(),
        ));
        gl::call!(gl::BindVertexArray(0));
    }

    fn create_texture(&self, image: &TextureImage) -> TextureHandle {
        let format = match image.format {
            PixelFormat::Red => gl::RED,
            PixelFormat::Rgb => gl::RGB,
            PixelFormat::Rgba => gl::RGBA,
        };
        let mut texture = 0;
        gl::call!(gl::GenTextures(1, &mut texture));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture));
        // Red and RGB rows aren't necessarily 4-byte aligned.
        gl::call!(gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1));
        gl::call!(gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            format as gl::types::GLint,
            image.width as gl::types::GLsizei,
            image.height as gl::types::GLsizei,
            0,
            format,
            gl::UNSIGNED_BYTE,
            image.pixels.as_ptr() as *const c_void,
        ));
        gl::call!(gl::GenerateMipmap(gl::TEXTURE_2D));
        let parameters = [
            (gl::TEXTURE_WRAP_S, gl::REPEAT),
            (gl::TEXTURE_WRAP_T, gl::REPEAT),
            (gl::TEXTURE_MIN_FILTER, gl::LINEAR_MIPMAP_LINEAR),
            (gl::TEXTURE_MAG_FILTER, gl::LINEAR),
        ];
        for (name, value) in parameters {
            gl::call!(gl::TexParameteri(
                gl::TEXTURE_2D,
                name,
                value as gl::types::GLint
            ));
        }
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
        TextureHandle(texture)
    }

    fn delete_texture(&self, texture: TextureHandle) {
        gl::call!(gl::DeleteTextures(1, &texture.0));
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture.0));
    }

    fn set_active_texture_unit(&self, unit: u32) {
        gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
    }

    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn clear(&self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        gl::call!(gl::ClearColor(r, g, b, a));
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));
    }

    fn set_viewport(&self, width: i32, height: i32) {
        gl::call!(gl::Viewport(0, 0, width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_convert_into_anyhow() {
        let err = anyhow::Error::from(GlLoadError);
        assert_eq!(err.to_string(), "failed to load OpenGL function pointers");
        assert!(err.downcast_ref::<GlLoadError>().is_some());
    }

    #[test]
    fn shader_stages_display_in_lowercase() {
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }
}
