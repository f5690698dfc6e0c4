//! GPU backend: one fragment program per pass, fields in float render targets.

use std::collections::HashMap;

use glam::Vec2;

use super::context::GpuContext;
use super::programs::{SolverProgram, BASE_VERTEX_SHADER};
use super::shader::Program;
use super::target::RenderTarget;
use crate::capability::{FilterMode, NegotiatedFormats, Precision};
use crate::config::SimulationConfig;
use crate::error::FluidError;
use crate::impulse::Impulse;
use crate::pipeline::{FluidBackend, Pass};
use crate::state::{FieldLayout, FluidState};

/// Solver running on a live GL context.
#[derive(Debug)]
pub struct GlFluid {
    ctx: GpuContext,
    state: FluidState<RenderTarget>,
    programs: HashMap<SolverProgram, Program>,
    vao: glow::VertexArray,
    sim_texel: Vec2,
}

impl GlFluid {
    /// Compiles every program and allocates the render targets.
    ///
    /// # Errors
    ///
    /// Returns [`FluidError::Shader`] on compile or link failure and
    /// [`FluidError::Gpu`] when a target or the VAO cannot be created.
    #[allow(unsafe_code)]
    pub fn new(
        ctx: GpuContext,
        config: &SimulationConfig,
        formats: &NegotiatedFormats,
    ) -> Result<Self, FluidError> {
        use glow::HasContext;

        let gl = ctx.gl();
        let mut programs = HashMap::new();
        for program in SolverProgram::ALL {
            let fragment = program.fragment_source(formats.filter_mode);
            let compiled = Program::new(gl, program.name(), BASE_VERTEX_SHADER, &fragment)?;
            programs.insert(program, compiled);
        }

        let layout = FieldLayout::new(config, formats);
        let precision: Precision = formats.dye.precision;
        let state = FluidState::allocate(&layout, |spec| RenderTarget::for_spec(gl, spec, precision))?;

        // SAFETY: an empty VAO; the vertex stage reads only gl_VertexID.
        let vao = unsafe { gl.create_vertex_array() }.map_err(FluidError::Gpu)?;

        if formats.filter_mode == FilterMode::Manual {
            log::info!("advection compiled with manual bilinear filtering");
        }

        Ok(Self {
            sim_texel: layout.velocity.texel_size(),
            ctx,
            state,
            programs,
            vao,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn state(&self) -> &FluidState<RenderTarget> {
        &self.state
    }

    fn program(&self, kind: SolverProgram) -> Result<&Program, FluidError> {
        self.programs
            .get(&kind)
            .ok_or_else(|| FluidError::Gpu(format!("program {} not compiled", kind.name())))
    }

    /// Binds `kind` with the shared vertex uniform set.
    fn begin(&self, kind: SolverProgram) -> Result<&Program, FluidError> {
        let program = self.program(kind)?;
        let gl = self.ctx.gl();
        program.bind(gl);
        program.set_vec2(gl, "u_texel_size", self.sim_texel);
        Ok(program)
    }

    #[allow(unsafe_code)]
    fn draw(&self, target: &RenderTarget) {
        use glow::HasContext;

        let gl = self.ctx.gl();
        target.bind(gl);
        // SAFETY: self.vao is live; three vertices make the fullscreen triangle.
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
        }
    }

    fn splat(&mut self, impulse: &Impulse, aspect_ratio: f32) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Splat)?;
        program.set_f32(gl, "u_aspect_ratio", aspect_ratio);
        program.set_vec2(gl, "u_point", impulse.position);
        program.set_f32(gl, "u_radius", impulse.radius);

        program.set_sampler(gl, "u_target", 0, self.state.velocity.read().texture());
        program.set_vec3(gl, "u_color", impulse.velocity_payload());
        self.draw(self.state.velocity.write());

        program.set_sampler(gl, "u_target", 0, self.state.dye.read().texture());
        program.set_vec3(gl, "u_color", impulse.color);
        self.draw(self.state.dye.write());

        self.state.velocity.swap();
        self.state.dye.swap();
        Ok(())
    }

    fn curl(&self) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Curl)?;
        program.set_sampler(gl, "u_velocity", 0, self.state.velocity.read().texture());
        self.draw(&self.state.curl);
        Ok(())
    }

    fn vorticity(&mut self, curl_strength: f32, dt: f32) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Vorticity)?;
        program.set_sampler(gl, "u_velocity", 0, self.state.velocity.read().texture());
        program.set_sampler(gl, "u_curl", 1, self.state.curl.texture());
        program.set_f32(gl, "u_curl_strength", curl_strength);
        program.set_f32(gl, "u_dt", dt);
        self.draw(self.state.velocity.write());
        self.state.velocity.swap();
        Ok(())
    }

    fn divergence(&self) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Divergence)?;
        program.set_sampler(gl, "u_velocity", 0, self.state.velocity.read().texture());
        self.draw(&self.state.divergence);
        Ok(())
    }

    fn clear_pressure(&mut self, dissipation: f32) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Clear)?;
        program.set_sampler(gl, "u_texture", 0, self.state.pressure.read().texture());
        program.set_f32(gl, "u_value", dissipation);
        self.draw(self.state.pressure.write());
        self.state.pressure.swap();
        Ok(())
    }

    fn jacobi(&mut self) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Jacobi)?;
        program.set_sampler(gl, "u_divergence", 0, self.state.divergence.texture());
        program.set_sampler(gl, "u_pressure", 1, self.state.pressure.read().texture());
        self.draw(self.state.pressure.write());
        self.state.pressure.swap();
        Ok(())
    }

    fn subtract_gradient(&mut self) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::GradientSubtract)?;
        program.set_sampler(gl, "u_pressure", 0, self.state.pressure.read().texture());
        program.set_sampler(gl, "u_velocity", 1, self.state.velocity.read().texture());
        self.draw(self.state.velocity.write());
        self.state.velocity.swap();
        Ok(())
    }

    fn advect_velocity(&mut self, dt: f32, dissipation: f32) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Advection)?;
        let velocity = self.state.velocity.read();
        program.set_sampler(gl, "u_velocity", 0, velocity.texture());
        program.set_sampler(gl, "u_source", 1, velocity.texture());
        program.set_vec2(gl, "u_source_texel_size", self.sim_texel);
        program.set_f32(gl, "u_dt", dt);
        program.set_f32(gl, "u_dissipation", dissipation);
        self.draw(self.state.velocity.write());
        self.state.velocity.swap();
        Ok(())
    }

    fn advect_dye(&mut self, dt: f32, dissipation: f32) -> Result<(), FluidError> {
        let gl = self.ctx.gl();
        let program = self.begin(SolverProgram::Advection)?;
        let dye = self.state.dye.read();
        program.set_sampler(gl, "u_velocity", 0, self.state.velocity.read().texture());
        program.set_sampler(gl, "u_source", 1, dye.texture());
        program.set_vec2(gl, "u_source_texel_size", dye.texel_size());
        program.set_f32(gl, "u_dt", dt);
        program.set_f32(gl, "u_dissipation", dissipation);
        self.draw(self.state.dye.write());
        self.state.dye.swap();
        Ok(())
    }

    /// Releases every program, target and the VAO.
    #[allow(unsafe_code)]
    pub fn destroy(self) {
        use glow::HasContext;

        let gl = self.ctx.gl();
        self.programs.values().for_each(|p| p.destroy(gl));
        let FluidState {
            velocity,
            dye,
            pressure,
            divergence,
            curl,
        } = &self.state;
        for buffer in [velocity, dye, pressure] {
            buffer.slots().iter().for_each(|t| t.destroy(gl));
        }
        divergence.destroy(gl);
        curl.destroy(gl);
        // SAFETY: the VAO is deleted once, after its last draw.
        unsafe { gl.delete_vertex_array(self.vao) };
    }
}

impl FluidBackend for GlFluid {
    type Dye = RenderTarget;

    fn execute(&mut self, pass: &Pass) -> Result<(), FluidError> {
        match *pass {
            Pass::Splat {
                impulse,
                aspect_ratio,
            } => self.splat(&impulse, aspect_ratio),
            Pass::Curl => self.curl(),
            Pass::Vorticity { curl_strength, dt } => self.vorticity(curl_strength, dt),
            Pass::Divergence => self.divergence(),
            Pass::ClearPressure { dissipation } => self.clear_pressure(dissipation),
            Pass::Jacobi => self.jacobi(),
            Pass::SubtractGradient => self.subtract_gradient(),
            Pass::AdvectVelocity { dt, dissipation } => self.advect_velocity(dt, dissipation),
            Pass::AdvectDye { dt, dissipation } => self.advect_dye(dt, dissipation),
        }
    }

    fn dye(&self) -> &RenderTarget {
        self.state.dye.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_fluid_is_a_backend() {
        fn _assert_backend<B: FluidBackend<Dye = RenderTarget>>() {}
        _assert_backend::<GlFluid>();
    }

    #[test]
    #[ignore = "requires GL context"]
    fn gl_frame_matches_cpu_reference() {
        // Would test: after the same pass list, reading back the dye target
        // matches CpuFluid's dye within half-float tolerance.
    }

    #[test]
    #[ignore = "requires GL context"]
    fn manual_filtering_compiles() {
        // Would test: GlFluid::new succeeds with FilterMode::Manual.
    }
}
