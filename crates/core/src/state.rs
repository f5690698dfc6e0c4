//! Field storage: the five solver fields and how they are sized.
//!
//! [`FieldLayout`] derives every field's spec from the config and the
//! negotiated formats. [`FluidState`] allocates them once through a
//! backend-supplied constructor, so the CPU reference grids and the GL render
//! targets share one allocation path.

use crate::capability::{FilterMode, NegotiatedFormats};
use crate::config::SimulationConfig;
use crate::double_buffer::DoubleBuffer;
use crate::grid::{Filter, GridSpec};

/// Specs for every field of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub velocity: GridSpec,
    pub dye: GridSpec,
    /// Shared by pressure, divergence and curl.
    pub scalar: GridSpec,
}

impl FieldLayout {
    /// Velocity and dye are linearly filtered when the device allows it;
    /// scalar fields are always sampled nearest.
    pub fn new(config: &SimulationConfig, formats: &NegotiatedFormats) -> Self {
        let advected = match formats.filter_mode {
            FilterMode::Hardware => Filter::Linear,
            FilterMode::Manual => Filter::Nearest,
        };
        Self {
            velocity: GridSpec::square(config.sim_resolution, formats.velocity.channels, advected),
            dye: GridSpec::square(config.dye_resolution, formats.dye.channels, advected),
            scalar: GridSpec::square(config.sim_resolution, formats.scalar.channels, Filter::Nearest),
        }
    }
}

/// All solver fields.
///
/// Divergence and curl are recomputed from velocity every frame and never
/// read back across frames, so they are single-buffered.
#[derive(Debug, Clone, PartialEq)]
pub struct FluidState<G> {
    pub velocity: DoubleBuffer<G>,
    pub dye: DoubleBuffer<G>,
    pub pressure: DoubleBuffer<G>,
    pub divergence: G,
    pub curl: G,
}

impl<G> FluidState<G> {
    /// Allocates every field with `make`, which is called eight times.
    ///
    /// # Errors
    ///
    /// Propagates the first allocation error.
    pub fn allocate<E>(
        layout: &FieldLayout,
        mut make: impl FnMut(&GridSpec) -> Result<G, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            velocity: DoubleBuffer::try_from_fn(|| make(&layout.velocity))?,
            dye: DoubleBuffer::try_from_fn(|| make(&layout.dye))?,
            pressure: DoubleBuffer::try_from_fn(|| make(&layout.scalar))?,
            divergence: make(&layout.scalar)?,
            curl: make(&layout.scalar)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{negotiate, Channels, HeadlessDevice, Precision};
    use crate::grid::Grid;

    fn layout(device: &HeadlessDevice, config: &SimulationConfig) -> FieldLayout {
        let formats = negotiate(device, Precision::Half).unwrap();
        FieldLayout::new(config, &formats)
    }

    #[test]
    fn layout_uses_independent_resolutions() {
        let config = SimulationConfig {
            sim_resolution: 64,
            dye_resolution: 256,
            ..SimulationConfig::default()
        };
        let l = layout(&HeadlessDevice::full(), &config);
        assert_eq!((l.velocity.width, l.velocity.height), (64, 64));
        assert_eq!((l.scalar.width, l.scalar.height), (64, 64));
        assert_eq!((l.dye.width, l.dye.height), (256, 256));
        assert_eq!(l.velocity.channels, Channels::Rg);
        assert_eq!(l.dye.channels, Channels::Rgba);
        assert_eq!(l.scalar.channels, Channels::R);
    }

    #[test]
    fn layout_filters_follow_filter_mode() {
        let config = SimulationConfig::default();
        let hw = layout(&HeadlessDevice::full(), &config);
        assert_eq!(hw.velocity.filter, Filter::Linear);
        assert_eq!(hw.dye.filter, Filter::Linear);
        assert_eq!(hw.scalar.filter, Filter::Nearest);

        let manual = layout(&HeadlessDevice::full().without_linear_filtering(), &config);
        assert_eq!(manual.velocity.filter, Filter::Nearest);
        assert_eq!(manual.dye.filter, Filter::Nearest);
    }

    #[test]
    fn allocate_builds_eight_grids() {
        let config = SimulationConfig {
            sim_resolution: 8,
            dye_resolution: 16,
            ..SimulationConfig::default()
        };
        let l = layout(&HeadlessDevice::full(), &config);
        let mut calls = 0;
        let state = FluidState::allocate(&l, |spec| {
            calls += 1;
            Grid::new(*spec)
        })
        .unwrap();
        assert_eq!(calls, 8);
        assert_eq!(state.dye.read().width(), 16);
        assert_eq!(state.velocity.write().width(), 8);
        assert_eq!(state.curl.channels(), Channels::R);
    }

    #[test]
    fn allocate_stops_at_first_error() {
        let config = SimulationConfig::default();
        let l = layout(&HeadlessDevice::full(), &config);
        let mut calls = 0;
        let result: Result<FluidState<()>, &str> = FluidState::allocate(&l, |_| {
            calls += 1;
            if calls == 3 {
                Err("out of memory")
            } else {
                Ok(())
            }
        });
        assert_eq!(result.unwrap_err(), "out of memory");
        assert_eq!(calls, 3);
    }
}
