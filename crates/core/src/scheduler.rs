//! Frame scheduler: owns the config, the impulse queue and a backend, and
//! advances the simulation once per host display tick.
//!
//! The scheduler is a two-state machine. At the top of every tick the
//! current viewport width decides the phase: at or below
//! [`PHONE_BREAKPOINT`] the tick does nothing (`Idle`), above it the queued
//! impulses are drained and the full pass list runs (`Active`). There is no
//! hysteresis. Pointer samples recorded while idle stay queued.

use glam::Vec2;

use crate::capability::{negotiate, DeviceCapabilities, NegotiatedFormats};
use crate::config::SimulationConfig;
use crate::cpu::CpuFluid;
use crate::error::FluidError;
use crate::impulse::{Impulse, ImpulseInjector, Viewport};
use crate::pipeline::{frame_passes, run_passes, FluidBackend};

/// Viewport widths at or below this many pixels pause the simulation.
pub const PHONE_BREAKPOINT: f32 = 768.0;

/// Whether ticks currently run the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Viewport at or below the breakpoint; ticks do nothing.
    Idle,
    /// Every tick runs the full pass list.
    Active,
}

impl Phase {
    /// `Idle` at or below [`PHONE_BREAKPOINT`], `Active` above it.
    pub fn for_width(width: f32) -> Self {
        if width <= PHONE_BREAKPOINT {
            Phase::Idle
        } else {
            Phase::Active
        }
    }
}

/// Outcome of one [`Simulation::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Viewport too narrow; nothing ran.
    Idle,
    /// The pipeline ran after splatting `impulses` queued impulses.
    Active { impulses: usize },
}

/// A running simulation over backend `B`.
#[derive(Debug)]
pub struct Simulation<B> {
    config: SimulationConfig,
    formats: NegotiatedFormats,
    injector: ImpulseInjector,
    viewport: Viewport,
    phase: Phase,
    frame: u64,
    backend: B,
}

impl Simulation<CpuFluid> {
    /// Builds a simulation on the CPU reference backend.
    ///
    /// # Errors
    ///
    /// See [`Simulation::new`].
    pub fn headless(
        config: SimulationConfig,
        device: &dyn DeviceCapabilities,
        viewport: Viewport,
    ) -> Result<Self, FluidError> {
        Self::new(config, device, viewport, CpuFluid::new)
    }
}

impl<B: FluidBackend> Simulation<B> {
    /// Validates `config`, negotiates formats against `device` once, and
    /// allocates the backend with `build`.
    ///
    /// # Errors
    ///
    /// Returns config validation errors, [`FluidError::UnsupportedFormat`]
    /// when the device cannot render any float layout, and whatever `build`
    /// returns.
    pub fn new(
        config: SimulationConfig,
        device: &dyn DeviceCapabilities,
        viewport: Viewport,
        build: impl FnOnce(&SimulationConfig, &NegotiatedFormats) -> Result<B, FluidError>,
    ) -> Result<Self, FluidError> {
        config.validate()?;
        let formats = negotiate(device, config.precision)?;
        let backend = build(&config, &formats)?;
        let phase = Phase::for_width(viewport.width());
        log::debug!("simulation starts {phase:?} at {}x{}", viewport.width(), viewport.height());
        Ok(Self {
            injector: ImpulseInjector::new(config.splat_kernel_radius()),
            config,
            formats,
            viewport,
            phase,
            frame: 0,
            backend,
        })
    }

    /// The live config, including any toggled dissipation.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Formats negotiated when the simulation was built.
    pub fn formats(&self) -> &NegotiatedFormats {
        &self.formats
    }

    /// Current host viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Phase decided by the most recent tick.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of ticks that ran the pipeline.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Impulses waiting for the next active tick.
    pub fn pending_impulses(&self) -> usize {
        self.injector.pending()
    }

    /// The backend holding the fields.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access, for seeding fields outside a tick.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The published dye field. Borrowing it prevents any tick until the
    /// borrow ends.
    pub fn dye(&self) -> &B::Dye {
        self.backend.dye()
    }

    /// Records a pointer position in viewport pixels (origin top-left).
    /// Returns whether an impulse was queued.
    pub fn record_pointer(&mut self, x: f32, y: f32) -> bool {
        self.injector
            .record_pointer_sample(Vec2::new(x, y), &self.viewport)
    }

    /// Queues a prepared impulse.
    pub fn push_impulse(&mut self, impulse: Impulse) {
        self.injector.push(impulse);
    }

    /// Updates the viewport used for pointer mapping, splat aspect and the
    /// phase decision. Fields are not reallocated.
    ///
    /// # Errors
    ///
    /// Returns [`FluidError::InvalidDimensions`] for non-positive sizes.
    pub fn resize(&mut self, width: f32, height: f32) -> Result<(), FluidError> {
        self.viewport = Viewport::new(width, height)?;
        Ok(())
    }

    /// Switches dye retention between its default and boosted values.
    pub fn toggle_density_dissipation(&mut self) {
        self.config.toggle_density_dissipation();
    }

    /// Advances one display tick.
    ///
    /// Queued impulses are consumed only once the whole pass list has run.
    ///
    /// # Errors
    ///
    /// Propagates backend failures. The frame counter is not advanced and
    /// the impulses stay queued, but passes that already ran before the
    /// failing one keep their effect on the fields.
    pub fn tick(&mut self) -> Result<FrameStatus, FluidError> {
        let phase = Phase::for_width(self.viewport.width());
        if phase != self.phase {
            log::debug!(
                "scheduler {:?} -> {phase:?} at width {}",
                self.phase,
                self.viewport.width()
            );
            self.phase = phase;
        }
        if phase == Phase::Idle {
            return Ok(FrameStatus::Idle);
        }

        let impulses = self.injector.queued();
        log::trace!("frame {}: splatting {} impulses", self.frame, impulses.len());
        let passes = frame_passes(&self.config, &impulses, self.viewport.aspect_ratio());
        run_passes(&mut self.backend, &passes)?;
        let drained = self.injector.drain().len();
        self.frame += 1;
        Ok(FrameStatus::Active { impulses: drained })
    }
}
