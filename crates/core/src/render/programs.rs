//! GLSL ES 3.00 sources for the solver passes.
//!
//! Every pass draws one fullscreen triangle generated from `gl_VertexID`
//! with no vertex buffer. The shared vertex stage also emits the four
//! neighbour coordinates one simulation texel away, so stencil passes
//! sample `v_l`, `v_r`, `v_t`, `v_b` directly.

use crate::capability::FilterMode;

/// Fullscreen-triangle vertex stage with neighbour coordinates.
///
/// Draw with `draw_arrays(TRIANGLES, 0, 3)` and an empty VAO bound.
pub const BASE_VERTEX_SHADER: &str = r#"#version 300 es
precision highp float;

uniform vec2 u_texel_size;

out vec2 v_uv;
out vec2 v_l;
out vec2 v_r;
out vec2 v_t;
out vec2 v_b;

void main() {
    v_uv = vec2((gl_VertexID << 1) & 2, gl_VertexID & 2);
    v_l = v_uv - vec2(u_texel_size.x, 0.0);
    v_r = v_uv + vec2(u_texel_size.x, 0.0);
    v_t = v_uv + vec2(0.0, u_texel_size.y);
    v_b = v_uv - vec2(0.0, u_texel_size.y);
    gl_Position = vec4(v_uv * 2.0 - 1.0, 0.0, 1.0);
}
"#;

const SPLAT: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;

in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_target;
uniform float u_aspect_ratio;
uniform vec3 u_color;
uniform vec2 u_point;
uniform float u_radius;

void main() {
    vec2 p = v_uv - u_point;
    p.x *= u_aspect_ratio;
    vec3 splat = exp(-dot(p, p) / u_radius) * u_color;
    vec3 base = texture(u_target, v_uv).xyz;
    frag_color = vec4(base + splat, 1.0);
}
"#;

const CURL: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;

in vec2 v_uv;
in vec2 v_l;
in vec2 v_r;
in vec2 v_t;
in vec2 v_b;
out vec4 frag_color;

uniform sampler2D u_velocity;

void main() {
    float l = texture(u_velocity, v_l).y;
    float r = texture(u_velocity, v_r).y;
    float t = texture(u_velocity, v_t).x;
    float b = texture(u_velocity, v_b).x;
    frag_color = vec4(0.5 * (r - l - t + b), 0.0, 0.0, 1.0);
}
"#;

const VORTICITY: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;

in vec2 v_uv;
in vec2 v_l;
in vec2 v_r;
in vec2 v_t;
in vec2 v_b;
out vec4 frag_color;

uniform sampler2D u_velocity;
uniform sampler2D u_curl;
uniform float u_curl_strength;
uniform float u_dt;

void main() {
    float l = texture(u_curl, v_l).x;
    float r = texture(u_curl, v_r).x;
    float t = texture(u_curl, v_t).x;
    float b = texture(u_curl, v_b).x;
    float c = texture(u_curl, v_uv).x;

    vec2 force = 0.5 * vec2(abs(t) - abs(b), abs(r) - abs(l));
    force /= length(force) + 0.0001;
    force *= u_curl_strength * c;
    force.y = -force.y;

    vec2 velocity = texture(u_velocity, v_uv).xy;
    frag_color = vec4(velocity + force * u_dt, 0.0, 1.0);
}
"#;

const DIVERGENCE: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;

in vec2 v_uv;
in vec2 v_l;
in vec2 v_r;
in vec2 v_t;
in vec2 v_b;
out vec4 frag_color;

uniform sampler2D u_velocity;

void main() {
    float l = texture(u_velocity, v_l).x;
    float r = texture(u_velocity, v_r).x;
    float t = texture(u_velocity, v_t).y;
    float b = texture(u_velocity, v_b).y;
    vec2 c = texture(u_velocity, v_uv).xy;

    // Reflect the normal component at the domain edge.
    if (v_l.x < 0.0) { l = -c.x; }
    if (v_r.x > 1.0) { r = -c.x; }
    if (v_t.y > 1.0) { t = -c.y; }
    if (v_b.y < 0.0) { b = -c.y; }

    frag_color = vec4(0.5 * (r - l + t - b), 0.0, 0.0, 1.0);
}
"#;

const CLEAR: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;

in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_texture;
uniform float u_value;

void main() {
    frag_color = u_value * texture(u_texture, v_uv);
}
"#;

const JACOBI: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;

in vec2 v_uv;
in vec2 v_l;
in vec2 v_r;
in vec2 v_t;
in vec2 v_b;
out vec4 frag_color;

uniform sampler2D u_pressure;
uniform sampler2D u_divergence;

void main() {
    float l = texture(u_pressure, v_l).x;
    float r = texture(u_pressure, v_r).x;
    float t = texture(u_pressure, v_t).x;
    float b = texture(u_pressure, v_b).x;
    float divergence = texture(u_divergence, v_uv).x;
    frag_color = vec4((l + r + b + t - divergence) * 0.25, 0.0, 0.0, 1.0);
}
"#;

const GRADIENT_SUBTRACT: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;

in vec2 v_uv;
in vec2 v_l;
in vec2 v_r;
in vec2 v_t;
in vec2 v_b;
out vec4 frag_color;

uniform sampler2D u_pressure;
uniform sampler2D u_velocity;

void main() {
    float l = texture(u_pressure, v_l).x;
    float r = texture(u_pressure, v_r).x;
    float t = texture(u_pressure, v_t).x;
    float b = texture(u_pressure, v_b).x;
    vec2 velocity = texture(u_velocity, v_uv).xy - vec2(r - l, t - b);
    frag_color = vec4(velocity, 0.0, 1.0);
}
"#;

const ADVECTION_HEADER: &str = r#"#version 300 es
precision highp float;
precision highp sampler2D;
"#;

const ADVECTION_BODY: &str = r#"
in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_velocity;
uniform sampler2D u_source;
uniform vec2 u_texel_size;
uniform vec2 u_source_texel_size;
uniform float u_dt;
uniform float u_dissipation;

vec4 bilerp(sampler2D sam, vec2 uv, vec2 tsize) {
    vec2 st = uv / tsize - 0.5;
    vec2 iuv = floor(st);
    vec2 fuv = fract(st);
    vec4 a = texture(sam, (iuv + vec2(0.5, 0.5)) * tsize);
    vec4 b = texture(sam, (iuv + vec2(1.5, 0.5)) * tsize);
    vec4 c = texture(sam, (iuv + vec2(0.5, 1.5)) * tsize);
    vec4 d = texture(sam, (iuv + vec2(1.5, 1.5)) * tsize);
    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}

void main() {
#ifdef MANUAL_FILTERING
    vec2 coord = v_uv - u_dt * bilerp(u_velocity, v_uv, u_texel_size).xy * u_texel_size;
    vec4 result = u_dissipation * bilerp(u_source, coord, u_source_texel_size);
#else
    vec2 coord = v_uv - u_dt * texture(u_velocity, v_uv).xy * u_texel_size;
    vec4 result = u_dissipation * texture(u_source, coord);
#endif
    frag_color = vec4(result.rgb, 1.0);
}
"#;

/// One compiled program per pass kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverProgram {
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Clear,
    Jacobi,
    GradientSubtract,
    Advection,
}

impl SolverProgram {
    pub const ALL: [SolverProgram; 8] = [
        SolverProgram::Splat,
        SolverProgram::Curl,
        SolverProgram::Vorticity,
        SolverProgram::Divergence,
        SolverProgram::Clear,
        SolverProgram::Jacobi,
        SolverProgram::GradientSubtract,
        SolverProgram::Advection,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SolverProgram::Splat => "splat",
            SolverProgram::Curl => "curl",
            SolverProgram::Vorticity => "vorticity",
            SolverProgram::Divergence => "divergence",
            SolverProgram::Clear => "clear",
            SolverProgram::Jacobi => "jacobi",
            SolverProgram::GradientSubtract => "gradient_subtract",
            SolverProgram::Advection => "advection",
        }
    }

    /// Fragment source. Only advection depends on `mode`.
    pub fn fragment_source(self, mode: FilterMode) -> String {
        match self {
            SolverProgram::Splat => SPLAT.to_string(),
            SolverProgram::Curl => CURL.to_string(),
            SolverProgram::Vorticity => VORTICITY.to_string(),
            SolverProgram::Divergence => DIVERGENCE.to_string(),
            SolverProgram::Clear => CLEAR.to_string(),
            SolverProgram::Jacobi => JACOBI.to_string(),
            SolverProgram::GradientSubtract => GRADIENT_SUBTRACT.to_string(),
            SolverProgram::Advection => {
                let define = match mode {
                    FilterMode::Manual => "#define MANUAL_FILTERING\n",
                    FilterMode::Hardware => "",
                };
                format!("{ADVECTION_HEADER}{define}{ADVECTION_BODY}")
            }
        }
    }

    /// Uniforms the backend sets for this pass, besides the vertex stage's
    /// `u_texel_size`.
    pub fn uniforms(self) -> &'static [&'static str] {
        match self {
            SolverProgram::Splat => &["u_target", "u_aspect_ratio", "u_color", "u_point", "u_radius"],
            SolverProgram::Curl | SolverProgram::Divergence => &["u_velocity"],
            SolverProgram::Vorticity => &["u_velocity", "u_curl", "u_curl_strength", "u_dt"],
            SolverProgram::Clear => &["u_texture", "u_value"],
            SolverProgram::Jacobi => &["u_pressure", "u_divergence"],
            SolverProgram::GradientSubtract => &["u_pressure", "u_velocity"],
            SolverProgram::Advection => &[
                "u_velocity",
                "u_source",
                "u_source_texel_size",
                "u_dt",
                "u_dissipation",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_source() -> Vec<(SolverProgram, String)> {
        SolverProgram::ALL
            .iter()
            .flat_map(|&p| {
                [FilterMode::Hardware, FilterMode::Manual]
                    .into_iter()
                    .map(move |m| (p, p.fragment_source(m)))
            })
            .collect()
    }

    #[test]
    fn every_source_starts_with_version_directive() {
        assert!(BASE_VERTEX_SHADER.starts_with("#version 300 es\n"));
        for (program, source) in every_source() {
            assert!(
                source.starts_with("#version 300 es\n"),
                "{} must start with the version directive",
                program.name()
            );
        }
    }

    #[test]
    fn vertex_stage_is_bufferless_with_neighbours() {
        assert!(BASE_VERTEX_SHADER.contains("gl_VertexID"));
        for varying in ["v_uv", "v_l", "v_r", "v_t", "v_b"] {
            assert!(BASE_VERTEX_SHADER.contains(&format!("out vec2 {varying};")), "{varying}");
        }
    }

    #[test]
    fn declared_uniforms_match_backend_bindings() {
        for (program, source) in every_source() {
            for uniform in program.uniforms() {
                let declared = source
                    .lines()
                    .any(|line| line.starts_with("uniform ") && line.trim_end_matches(';').ends_with(uniform));
                assert!(declared, "{} does not declare {uniform}", program.name());
            }
        }
    }

    #[test]
    fn fragment_inputs_are_emitted_by_vertex_stage() {
        for (program, source) in every_source() {
            for line in source.lines().filter(|l| l.starts_with("in vec2 ")) {
                let out = line.replacen("in ", "out ", 1);
                assert!(
                    BASE_VERTEX_SHADER.contains(&out),
                    "{}: `{line}` has no matching vertex output",
                    program.name()
                );
            }
        }
    }

    #[test]
    fn manual_filtering_is_a_compile_time_switch() {
        let manual = SolverProgram::Advection.fragment_source(FilterMode::Manual);
        let hardware = SolverProgram::Advection.fragment_source(FilterMode::Hardware);
        assert!(manual.contains("#define MANUAL_FILTERING"));
        assert!(!hardware.contains("#define MANUAL_FILTERING"));
        assert_eq!(
            SolverProgram::Curl.fragment_source(FilterMode::Manual),
            SolverProgram::Curl.fragment_source(FilterMode::Hardware)
        );
    }

    #[test]
    fn writes_force_alpha_one_where_expected() {
        for program in [
            SolverProgram::Splat,
            SolverProgram::Vorticity,
            SolverProgram::GradientSubtract,
            SolverProgram::Advection,
        ] {
            let source = program.fragment_source(FilterMode::Hardware);
            assert!(source.contains(", 1.0);"), "{} must write alpha 1", program.name());
        }
    }

    #[test]
    fn divergence_reflects_all_four_edges() {
        let source = SolverProgram::Divergence.fragment_source(FilterMode::Hardware);
        for guard in ["v_l.x < 0.0", "v_r.x > 1.0", "v_t.y > 1.0", "v_b.y < 0.0"] {
            assert!(source.contains(guard), "missing {guard}");
        }
    }

    #[test]
    fn program_names_are_unique() {
        let mut names: Vec<_> = SolverProgram::ALL.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SolverProgram::ALL.len());
    }
}
