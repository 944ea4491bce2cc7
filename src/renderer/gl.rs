use std::ffi::{c_void, CString};

#[allow(clippy::all, non_upper_case_globals, non_snake_case, unused)]
mod bindings {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

pub use bindings::*;

/// Runs the given OpenGL call, and in debug builds, panics if the call
/// produced an error.
macro_rules! call {
    ($expr:expr) => {{
        #[allow(unused_unsafe)]
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                let error_number_stringified;
                let error_name = match error {
                    $crate::renderer::gl::INVALID_ENUM => "INVALID_ENUM",
                    $crate::renderer::gl::INVALID_VALUE => "INVALID_VALUE",
                    $crate::renderer::gl::INVALID_OPERATION => "INVALID_OPERATION",
                    $crate::renderer::gl::OUT_OF_MEMORY => "OUT_OF_MEMORY",
                    $crate::renderer::gl::INVALID_FRAMEBUFFER_OPERATION => {
                        "INVALID_FRAMEBUFFER_OPERATION"
                    }
                    _ => {
                        error_number_stringified = format!("{error}");
                        &error_number_stringified
                    }
                };
                panic!(
                    "OpenGL error {error_name} at {}:{}:{}",
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}

pub(crate) use call;

/// Compiles a shader stage. On failure, the shader object is deleted and the
/// info log is returned.
pub fn create_shader(type_: types::GLenum, source: &str) -> Result<types::GLuint, String> {
    let shader = call!(CreateShader(type_));
    let sources = [source.as_bytes().as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(ShaderSource(shader, 1, sources.as_ptr(), source_lens.as_ptr()));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as types::GLint {
        let mut log_length = 0;
        call!(GetShaderiv(shader, INFO_LOG_LENGTH, &mut log_length));
        let mut info_log = vec![0u8; log_length.max(1) as usize];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteShader(shader));
        info_log.truncate(length as usize);
        return Err(String::from_utf8_lossy(&info_log).into_owned());
    }
    Ok(shader)
}

/// Links the given compiled shader stages into a program. The stages are not
/// deleted, that's up to the caller.
pub fn create_program(shaders: &[types::GLuint]) -> Result<types::GLuint, String> {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    for &shader in shaders {
        call!(DetachShader(program, shader));
    }
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as types::GLint {
        let mut log_length = 0;
        call!(GetProgramiv(program, INFO_LOG_LENGTH, &mut log_length));
        let mut info_log = vec![0u8; log_length.max(1) as usize];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteProgram(program));
        info_log.truncate(length as usize);
        return Err(String::from_utf8_lossy(&info_log).into_owned());
    }
    Ok(program)
}

/// Returns the location of the uniform, or None if the program has no active
/// uniform with that name.
pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let name = CString::new(name).ok()?;
    let location = call!(GetUniformLocation(program, name.as_ptr()));
    (location != -1).then_some(location)
}

/// Uploads `data` into the buffer currently bound to `target`.
pub fn buffer_data<T: bytemuck::Pod>(target: types::GLenum, data: &[T], usage: types::GLenum) {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    call!(BufferData(
        target,
        bytes.len() as types::GLsizeiptr,
        bytes.as_ptr() as *const c_void,
        usage,
    ));
}
