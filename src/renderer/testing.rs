//! An in-memory [`Backend`] that records every call, for tests that need to
//! check what would have been sent to the driver.
//!
//! Shader "compilation" fails when the source contains `#error`, linking fails
//! when either stage contains `#link-error`. A program's uniforms are the names
//! declared on `uniform <type> <name>;` lines of its sources, written as they
//! would be looked up (`material.diffuse1`, `pointLights[0].position`).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::renderer::backend::{
    Backend, ProgramHandle, ShaderHandle, ShaderStage, TextureHandle, UniformValue, VertexArray,
    VertexAttribute,
};
use crate::renderer::texture::TextureImage;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CompileShader(ShaderStage),
    DeleteShader(ShaderHandle),
    LinkProgram(ProgramHandle),
    DeleteProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    UniformLocation(ProgramHandle, String),
    SetUniform(i32, UniformValue),
    CreateVertexArray(VertexArray),
    DeleteVertexArray(VertexArray),
    DrawIndexed(VertexArray, usize),
    CreateTexture(TextureHandle),
    DeleteTexture(TextureHandle),
    BindTexture(u32, TextureHandle),
    SetActiveTextureUnit(u32),
    Clear([f32; 4]),
    SetViewport(i32, i32),
}

#[derive(Default)]
struct State {
    next_id: u32,
    calls: Vec<Call>,
    shaders: HashMap<ShaderHandle, String>,
    programs: HashMap<ProgramHandle, HashSet<String>>,
    locations: Vec<(ProgramHandle, String)>,
    vertex_arrays: HashMap<u32, (Vec<u8>, Vec<u32>)>,
    textures: HashMap<TextureHandle, TextureImage>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct RecordingBackend {
    max_texture_units: u32,
    state: RefCell<State>,
}

impl RecordingBackend {
    pub fn new() -> RecordingBackend {
        RecordingBackend::with_max_texture_units(16)
    }

    pub fn with_max_texture_units(max_texture_units: u32) -> RecordingBackend {
        RecordingBackend {
            max_texture_units,
            state: RefCell::new(State::default()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Every uniform write, resolved to the program and name it targeted.
    pub fn uniform_writes(&self) -> Vec<(ProgramHandle, String, UniformValue)> {
        let state = self.state.borrow();
        state
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::SetUniform(location, value) => {
                    let (program, name) = state.locations[*location as usize].clone();
                    Some((program, name, *value))
                }
                _ => None,
            })
            .collect()
    }

    /// Every name that was looked up, in order, including unknown ones.
    pub fn uniform_lookups(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UniformLocation(_, name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> Vec<(VertexArray, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DrawIndexed(vertex_array, count) => Some((vertex_array, count)),
                _ => None,
            })
            .collect()
    }

    pub fn texture_bindings(&self) -> Vec<(u32, TextureHandle)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::BindTexture(unit, texture) => Some((unit, texture)),
                _ => None,
            })
            .collect()
    }

    /// The contents of the element buffer of a live vertex array.
    pub fn uploaded_indices(&self, vertex_array: VertexArray) -> Vec<u32> {
        self.state.borrow().vertex_arrays[&vertex_array.vao].1.clone()
    }

    pub fn uploaded_vertex_bytes(&self, vertex_array: VertexArray) -> usize {
        self.state.borrow().vertex_arrays[&vertex_array.vao].0.len()
    }

    pub fn uploaded_image(&self, texture: TextureHandle) -> TextureImage {
        self.state.borrow().textures[&texture].clone()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

fn declared_uniforms(source: &str) -> impl Iterator<Item = String> + '_ {
    source.lines().filter_map(|line| {
        let declaration = line.trim().strip_prefix("uniform ")?;
        let declaration = declaration.trim_end().strip_suffix(';')?;
        let name = declaration.split_whitespace().last()?;
        Some(name.to_string())
    })
}

impl Backend for RecordingBackend {
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        self.record(Call::CompileShader(stage));
        if let Some(line) = source.lines().find(|line| line.contains("#error")) {
            return Err(format!("0:1: error: {}", line.trim()));
        }
        let mut state = self.state.borrow_mut();
        let shader = ShaderHandle(state.next_id());
        state.shaders.insert(shader, source.to_string());
        Ok(shader)
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        self.record(Call::DeleteShader(shader));
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn link_program(
        &self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        let mut state = self.state.borrow_mut();
        let sources = [&state.shaders[&vertex], &state.shaders[&fragment]];
        if sources.iter().any(|source| source.contains("#link-error")) {
            return Err("error: linking failed".to_string());
        }
        let uniforms = sources
            .iter()
            .flat_map(|source| declared_uniforms(source))
            .collect::<HashSet<_>>();
        let program = ProgramHandle(state.next_id());
        state.programs.insert(program, uniforms);
        state.calls.push(Call::LinkProgram(program));
        Ok(program)
    }

    fn delete_program(&self, program: ProgramHandle) {
        self.record(Call::DeleteProgram(program));
        self.state.borrow_mut().programs.remove(&program);
    }

    fn use_program(&self, program: ProgramHandle) {
        self.record(Call::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<i32> {
        self.record(Call::UniformLocation(program, name.to_string()));
        let mut state = self.state.borrow_mut();
        if !state.programs.get(&program)?.contains(name) {
            return None;
        }
        state.locations.push((program, name.to_string()));
        Some(state.locations.len() as i32 - 1)
    }

    fn set_uniform(&self, location: i32, value: UniformValue) {
        self.record(Call::SetUniform(location, value));
    }

    fn create_vertex_array(
        &self,
        vertices: &[u8],
        _stride: usize,
        _attributes: &[VertexAttribute],
        indices: &[u32],
    ) -> VertexArray {
        let mut state = self.state.borrow_mut();
        let vertex_array = VertexArray {
            vao: state.next_id(),
            vbo: state.next_id(),
            ebo: state.next_id(),
        };
        state
            .vertex_arrays
            .insert(vertex_array.vao, (vertices.to_vec(), indices.to_vec()));
        state.calls.push(Call::CreateVertexArray(vertex_array));
        vertex_array
    }

    fn delete_vertex_array(&self, vertex_array: VertexArray) {
        self.record(Call::DeleteVertexArray(vertex_array));
        self.state.borrow_mut().vertex_arrays.remove(&vertex_array.vao);
    }

    fn draw_indexed(&self, vertex_array: VertexArray, index_count: usize) {
        self.record(Call::DrawIndexed(vertex_array, index_count));
    }

    fn create_texture(&self, image: &TextureImage) -> TextureHandle {
        let mut state = self.state.borrow_mut();
        let texture = TextureHandle(state.next_id());
        state.textures.insert(texture, image.clone());
        state.calls.push(Call::CreateTexture(texture));
        texture
    }

    fn delete_texture(&self, texture: TextureHandle) {
        self.record(Call::DeleteTexture(texture));
        self.state.borrow_mut().textures.remove(&texture);
    }

    fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        self.record(Call::BindTexture(unit, texture));
    }

    fn set_active_texture_unit(&self, unit: u32) {
        self.record(Call::SetActiveTextureUnit(unit));
    }

    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn clear(&self, color: [f32; 4]) {
        self.record(Call::Clear(color));
    }

    fn set_viewport(&self, width: i32, height: i32) {
        self.record(Call::SetViewport(width, height));
    }
}
