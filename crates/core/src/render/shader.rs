//! Program compilation and uniform binding.
//!
//! Compile failures carry the pass name and the offending source with line
//! numbers so driver logs that cite `0:LINE` can be read directly.

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use thiserror::Error;

/// Compile or link failure of one solver program.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    #[error("{program}: {stage} shader failed to compile:\n{log}")]
    Compile {
        program: String,
        stage: &'static str,
        log: String,
    },
    #[error("{program}: link failed:\n{log}")]
    Link { program: String, log: String },
}

/// Prefixes each source line with its 1-based number, right-aligned, then
/// appends the driver log after a blank line.
pub fn annotate_source(source: &str, log: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let width = lines.len().max(1).to_string().len();
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{:>width$}: {line}", i + 1));
    }
    if !log.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(log);
    }
    out
}

fn stage_name(stage: u32) -> &'static str {
    match stage {
        glow::VERTEX_SHADER => "vertex",
        glow::FRAGMENT_SHADER => "fragment",
        _ => "unknown",
    }
}

/// Compiles one stage of `program`.
///
/// # Errors
///
/// Returns [`ShaderError::Compile`] with the annotated source.
#[allow(unsafe_code)]
pub fn compile_shader(
    gl: &glow::Context,
    program: &str,
    stage: u32,
    source: &str,
) -> Result<glow::Shader, ShaderError> {
    use glow::HasContext;

    let compile_error = |log: String| ShaderError::Compile {
        program: program.to_string(),
        stage: stage_name(stage),
        log,
    };

    // SAFETY: glow exposes GL calls as unsafe; the shader is deleted on the
    // failure path and returned otherwise.
    let shader = unsafe { gl.create_shader(stage) }.map_err(compile_error)?;
    let compiled = unsafe {
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        gl.get_shader_compile_status(shader)
    };
    if compiled {
        return Ok(shader);
    }
    let log = unsafe {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        log
    };
    Err(compile_error(annotate_source(source, &log)))
}

/// Compiles both stages and links them. Shader objects are released either way.
///
/// # Errors
///
/// Returns [`ShaderError::Compile`] or [`ShaderError::Link`].
#[allow(unsafe_code)]
pub fn link_program(
    gl: &glow::Context,
    name: &str,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<glow::Program, ShaderError> {
    use glow::HasContext;

    let link_error = |log: String| ShaderError::Link {
        program: name.to_string(),
        log,
    };

    let vertex = compile_shader(gl, name, glow::VERTEX_SHADER, vertex_source)?;
    let fragment = match compile_shader(gl, name, glow::FRAGMENT_SHADER, fragment_source) {
        Ok(shader) => shader,
        Err(e) => {
            // SAFETY: vertex is a live shader from compile_shader.
            unsafe { gl.delete_shader(vertex) };
            return Err(e);
        }
    };

    // SAFETY: both shaders are live; they are detached and deleted after
    // linking since the program keeps its own binaries.
    let result = unsafe {
        match gl.create_program() {
            Ok(program) => {
                gl.attach_shader(program, vertex);
                gl.attach_shader(program, fragment);
                gl.link_program(program);
                gl.detach_shader(program, vertex);
                gl.detach_shader(program, fragment);
                if gl.get_program_link_status(program) {
                    Ok(program)
                } else {
                    let log = gl.get_program_info_log(program);
                    gl.delete_program(program);
                    Err(link_error(log))
                }
            }
            Err(e) => Err(link_error(e)),
        }
    };
    unsafe {
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);
    }
    result
}

/// A linked program with its active uniform locations looked up once.
#[derive(Debug)]
pub struct Program {
    name: String,
    program: glow::Program,
    uniforms: HashMap<String, glow::UniformLocation>,
}

impl Program {
    /// Links `vertex_source` with `fragment_source` and caches every active
    /// uniform.
    ///
    /// # Errors
    ///
    /// See [`link_program`].
    #[allow(unsafe_code)]
    pub fn new(
        gl: &glow::Context,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        use glow::HasContext;

        let program = link_program(gl, name, vertex_source, fragment_source)?;

        // SAFETY: program is a live, linked program.
        let uniforms = unsafe {
            (0..gl.get_active_uniforms(program))
                .filter_map(|i| gl.get_active_uniform(program, i))
                .filter_map(|active| {
                    gl.get_uniform_location(program, &active.name)
                        .map(|loc| (active.name, loc))
                })
                .collect()
        };

        Ok(Self {
            name: name.to_string(),
            program,
            uniforms,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the linked program kept uniform `name` active.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    #[allow(unsafe_code)]
    pub fn bind(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: self.program is a live program.
        unsafe { gl.use_program(Some(self.program)) };
    }

    // Setters silently skip uniforms the compiler optimised out.

    #[allow(unsafe_code)]
    pub fn set_f32(&self, gl: &glow::Context, name: &str, value: f32) {
        use glow::HasContext;

        // SAFETY: the location belongs to this program, which is bound.
        unsafe { gl.uniform_1_f32(self.uniforms.get(name), value) };
    }

    #[allow(unsafe_code)]
    pub fn set_vec2(&self, gl: &glow::Context, name: &str, value: Vec2) {
        use glow::HasContext;

        // SAFETY: as in set_f32.
        unsafe { gl.uniform_2_f32(self.uniforms.get(name), value.x, value.y) };
    }

    #[allow(unsafe_code)]
    pub fn set_vec3(&self, gl: &glow::Context, name: &str, value: Vec3) {
        use glow::HasContext;

        // SAFETY: as in set_f32.
        unsafe { gl.uniform_3_f32(self.uniforms.get(name), value.x, value.y, value.z) };
    }

    /// Binds `texture` to `unit` and points sampler `name` at it.
    #[allow(unsafe_code)]
    pub fn set_sampler(&self, gl: &glow::Context, name: &str, unit: u32, texture: glow::Texture) {
        use glow::HasContext;

        // SAFETY: texture is a live handle owned by a RenderTarget.
        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.uniform_1_i32(self.uniforms.get(name), unit as i32);
        }
    }

    #[allow(unsafe_code)]
    pub fn destroy(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: self.program is deleted exactly once.
        unsafe { gl.delete_program(self.program) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_numbers_every_line() {
        let out = annotate_source("#version 300 es\nvoid main() {\n}", "ERROR: 0:2: oops");
        assert!(out.contains("1: #version 300 es"), "got:\n{out}");
        assert!(out.contains("2: void main() {"), "got:\n{out}");
        assert!(out.contains("3: }"), "got:\n{out}");
        assert!(out.ends_with("ERROR: 0:2: oops"), "got:\n{out}");
    }

    #[test]
    fn annotate_right_aligns_numbers() {
        let source = (1..=11).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let out = annotate_source(&source, "");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], " 1: l1");
        assert_eq!(lines[10], "11: l11");
    }

    #[test]
    fn annotate_handles_empty_inputs() {
        assert_eq!(annotate_source("", ""), "");
        assert_eq!(annotate_source("", "log only"), "log only");
        assert_eq!(annotate_source("x", ""), "1: x");
    }

    #[test]
    fn compile_error_names_program_and_stage() {
        let err = ShaderError::Compile {
            program: "vorticity".into(),
            stage: "fragment",
            log: "undeclared identifier".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("vorticity"), "{msg}");
        assert!(msg.contains("fragment"), "{msg}");
        assert!(msg.contains("undeclared identifier"), "{msg}");
    }

    #[test]
    fn link_error_names_program() {
        let err = ShaderError::Link {
            program: "splat".into(),
            log: "varying mismatch".into(),
        };
        assert!(err.to_string().starts_with("splat: link failed"));
    }

    #[test]
    fn stage_names() {
        assert_eq!(stage_name(glow::VERTEX_SHADER), "vertex");
        assert_eq!(stage_name(glow::FRAGMENT_SHADER), "fragment");
    }

    #[test]
    #[ignore = "requires GL context"]
    fn program_caches_active_uniforms() {
        // Would test: Program::new on the splat shader reports `point` and
        // `radius` as active uniforms.
    }
}
