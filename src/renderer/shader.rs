use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::renderer::backend::{Gpu, ProgramHandle, ShaderStage, UniformValue};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader source{} is unavailable: {reason}", source_name(.path))]
    SourceUnavailable {
        /// `None` for sources passed in as strings.
        path: Option<PathBuf>,
        reason: String,
    },
    #[error("failed to compile {stage} shader:\n{log}")]
    CompileFailed { stage: ShaderStage, log: String },
    #[error("failed to link shader program:\n{log}")]
    LinkFailed { log: String },
}

/// The outcome of a uniform write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformWrite {
    Written,
    /// The program has no active uniform by that name, nothing was written.
    /// Not an error: optional uniforms are routinely written this way.
    Ignored,
}

/// A linked vertex + fragment shader program. The program is deleted when
/// this is dropped.
pub struct Program {
    gpu: Gpu,
    handle: ProgramHandle,
    uniform_locations: RefCell<HashMap<String, Option<i32>>>,
}

impl Program {
    pub fn new(gpu: &Gpu, vertex_source: &str, fragment_source: &str) -> Result<Program, ShaderError> {
        for (stage, source) in [
            (ShaderStage::Vertex, vertex_source),
            (ShaderStage::Fragment, fragment_source),
        ] {
            if source.trim().is_empty() {
                return Err(ShaderError::SourceUnavailable {
                    path: None,
                    reason: format!("the {stage} shader source is empty"),
                });
            }
        }

        let vertex = gpu
            .compile_shader(ShaderStage::Vertex, vertex_source)
            .map_err(|log| ShaderError::CompileFailed {
                stage: ShaderStage::Vertex,
                log,
            })?;
        let fragment = match gpu.compile_shader(ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(log) => {
                gpu.delete_shader(vertex);
                return Err(ShaderError::CompileFailed {
                    stage: ShaderStage::Fragment,
                    log,
                });
            }
        };
        let linked = gpu.link_program(vertex, fragment);
        gpu.delete_shader(vertex);
        gpu.delete_shader(fragment);
        let handle = linked.map_err(|log| ShaderError::LinkFailed { log })?;

        Ok(Program {
            gpu: gpu.clone(),
            handle,
            uniform_locations: RefCell::new(HashMap::new()),
        })
    }

    /// Reads the two shader files whole and builds a program out of them.
    pub fn from_files(
        gpu: &Gpu,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Result<Program, ShaderError> {
        let vertex_source = read_source(vertex_path)?;
        let fragment_source = read_source(fragment_path)?;
        let program = Program::new(gpu, &vertex_source, &fragment_source)?;
        log::debug!(
            "linked program {:?} from {vertex_path:?} and {fragment_path:?}",
            program.handle,
        );
        Ok(program)
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Makes this the current program. Uniform writes apply to whichever
    /// program was used last, so call this before the setters.
    pub fn use_program(&self) {
        self.gpu.use_program(self.handle);
    }

    pub fn set_bool(&self, name: &str, value: bool) -> UniformWrite {
        self.set(name, UniformValue::Int(value as i32))
    }

    pub fn set_int(&self, name: &str, value: i32) -> UniformWrite {
        self.set(name, UniformValue::Int(value))
    }

    pub fn set_float(&self, name: &str, value: f32) -> UniformWrite {
        self.set(name, UniformValue::Float(value))
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) -> UniformWrite {
        self.set(name, UniformValue::Vec3(value))
    }

    pub fn set_vec3_xyz(&self, name: &str, x: f32, y: f32, z: f32) -> UniformWrite {
        self.set_vec3(name, Vec3::new(x, y, z))
    }

    pub fn set_mat4(&self, name: &str, value: Mat4) -> UniformWrite {
        self.set(name, UniformValue::Mat4(value))
    }

    pub fn set(&self, name: &str, value: UniformValue) -> UniformWrite {
        match self.location(name) {
            Some(location) => {
                self.gpu.set_uniform(location, value);
                UniformWrite::Written
            }
            None => UniformWrite::Ignored,
        }
    }

    /// Deletes the program now rather than at the end of the scope.
    pub fn release(self) {}

    fn location(&self, name: &str) -> Option<i32> {
        if let Some(&location) = self.uniform_locations.borrow().get(name) {
            return location;
        }
        let location = self.gpu.uniform_location(self.handle, name);
        if location.is_none() {
            log::debug!("program {:?} has no uniform {name:?}, writes to it are ignored", self.handle);
        }
        self.uniform_locations
            .borrow_mut()
            .insert(name.to_string(), location);
        location
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.gpu.delete_program(self.handle);
    }
}

fn source_name(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {path:?}"),
        None => String::new(),
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    let source = fs::read_to_string(path).map_err(|err| ShaderError::SourceUnavailable {
        path: Some(path.to_owned()),
        reason: err.to_string(),
    })?;
    if source.trim().is_empty() {
        return Err(ShaderError::SourceUnavailable {
            path: Some(path.to_owned()),
            reason: "the file is empty".to_string(),
        });
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::renderer::testing::{Call, RecordingBackend};

    const VERTEX: &str = "#version 330 core\nuniform mat4 model;\nvoid main() {}\n";
    const FRAGMENT: &str = "#version 330 core\nuniform float shininess;\nvoid main() {}\n";

    fn backend() -> (Rc<RecordingBackend>, Gpu) {
        let backend = Rc::new(RecordingBackend::new());
        let gpu: Gpu = backend.clone();
        (backend, gpu)
    }

    #[test]
    fn unknown_uniforms_are_ignored_for_every_setter() {
        let (backend, gpu) = backend();
        let program = Program::new(&gpu, VERTEX, FRAGMENT).unwrap();
        program.use_program();
        backend.clear_calls();

        assert_eq!(program.set_bool("missing", true), UniformWrite::Ignored);
        assert_eq!(program.set_int("missing", 1), UniformWrite::Ignored);
        assert_eq!(program.set_float("missing", 1.0), UniformWrite::Ignored);
        assert_eq!(program.set_vec3("missing", Vec3::ONE), UniformWrite::Ignored);
        assert_eq!(program.set_vec3_xyz("missing", 1.0, 2.0, 3.0), UniformWrite::Ignored);
        assert_eq!(program.set_mat4("missing", Mat4::IDENTITY), UniformWrite::Ignored);
        assert!(backend.uniform_writes().is_empty());
    }

    #[test]
    fn known_uniforms_are_written_to_the_current_program() {
        let (backend, gpu) = backend();
        let program = Program::new(&gpu, VERTEX, FRAGMENT).unwrap();
        program.use_program();

        assert_eq!(program.set_float("shininess", 32.0), UniformWrite::Written);
        assert_eq!(program.set_mat4("model", Mat4::IDENTITY), UniformWrite::Written);
        assert_eq!(
            backend.uniform_writes(),
            vec![
                (program.handle(), "shininess".to_string(), UniformValue::Float(32.0)),
                (program.handle(), "model".to_string(), UniformValue::Mat4(Mat4::IDENTITY)),
            ]
        );
    }

    #[test]
    fn uniform_locations_are_resolved_once() {
        let (backend, gpu) = backend();
        let program = Program::new(&gpu, VERTEX, FRAGMENT).unwrap();
        program.use_program();
        for _ in 0..3 {
            program.set_float("shininess", 1.0);
            program.set_float("missing", 1.0);
        }
        let lookups = backend
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::UniformLocation(..)))
            .count();
        assert_eq!(lookups, 2);
    }

    #[test]
    fn empty_source_is_unavailable() {
        let (_, gpu) = backend();
        let result = Program::new(&gpu, "  \n", FRAGMENT);
        match result {
            Err(err @ ShaderError::SourceUnavailable { path: None, .. }) => assert_eq!(
                err.to_string(),
                "shader source is unavailable: the vertex shader source is empty"
            ),
            _ => panic!("expected SourceUnavailable without a path"),
        }
    }

    #[test]
    fn missing_file_is_unavailable() {
        let (_, gpu) = backend();
        let dir = std::env::temp_dir().join("lit-scene-shader-missing");
        let result = Program::from_files(&gpu, &dir.join("nope.vert"), &dir.join("nope.frag"));
        match result {
            Err(ShaderError::SourceUnavailable { path, .. }) => {
                assert_eq!(path, Some(dir.join("nope.vert")))
            }
            _ => panic!("expected SourceUnavailable"),
        }
    }

    #[test]
    fn compile_failure_reports_the_stage_and_cleans_up() {
        let (backend, gpu) = backend();
        let result = Program::new(&gpu, VERTEX, "#version 330 core\n#error broken\n");
        match result {
            Err(ShaderError::CompileFailed { stage, log }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("broken"));
            }
            _ => panic!("expected CompileFailed"),
        }
        assert_eq!(backend.live_shaders(), 0);
    }

    #[test]
    fn link_failure_is_reported() {
        let (backend, gpu) = backend();
        let result = Program::new(&gpu, "#version 330 core\n#link-error\n", FRAGMENT);
        assert!(matches!(result, Err(ShaderError::LinkFailed { .. })));
        assert_eq!(backend.live_shaders(), 0);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn programs_are_deleted_on_drop_and_release() {
        let (backend, gpu) = backend();
        let first = Program::new(&gpu, VERTEX, FRAGMENT).unwrap();
        let second = Program::new(&gpu, VERTEX, FRAGMENT).unwrap();
        assert_eq!(backend.live_programs(), 2);
        first.release();
        assert_eq!(backend.live_programs(), 1);
        drop(second);
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(backend.live_shaders(), 0);
    }

    #[test]
    fn from_files_reads_both_stages() {
        let (_, gpu) = backend();
        let dir = std::env::temp_dir().join(format!("lit-scene-shader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.vert"), VERTEX).unwrap();
        fs::write(dir.join("a.frag"), FRAGMENT).unwrap();
        let program = Program::from_files(&gpu, &dir.join("a.vert"), &dir.join("a.frag")).unwrap();
        program.use_program();
        assert_eq!(program.set_float("shininess", 2.0), UniformWrite::Written);
        fs::remove_dir_all(&dir).unwrap();
    }
}
