//! Float render-target capability negotiation.
//!
//! The solver stores every field in a floating-point texture it can render
//! into. Devices differ in which channel layouts they accept, so each field
//! asks for an ideal layout and walks a fixed ranked chain
//! (`Rgba -> Rg -> R`) from there until the device reports a renderable
//! format. The result is computed once, when the simulation is built, and is
//! never re-negotiated.
//!
//! Devices are queried through [`DeviceCapabilities`]. A live GL context
//! implements it by trial texture + framebuffer creation
//! (`render::GpuContext`); [`HeadlessDevice`] is a configurable stand-in for
//! the CPU backend and for simulating limited hardware.

use serde::{Deserialize, Serialize};

use crate::error::FluidError;

/// Channel layout of a float texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channels {
    /// Four channels.
    Rgba,
    /// Two channels.
    Rg,
    /// One channel.
    R,
}

impl Channels {
    /// Number of stored components.
    pub fn count(self) -> usize {
        match self {
            Channels::Rgba => 4,
            Channels::Rg => 2,
            Channels::R => 1,
        }
    }

    /// Layout storing `count` components.
    ///
    /// # Errors
    ///
    /// Returns [`FluidError::ChannelMismatch`] for counts other than 1, 2 or 4.
    pub fn from_count(count: usize) -> Result<Self, FluidError> {
        match count {
            4 => Ok(Channels::Rgba),
            2 => Ok(Channels::Rg),
            1 => Ok(Channels::R),
            n => Err(FluidError::ChannelMismatch(n)),
        }
    }
}

/// Ranked fallback order, best first.
pub const FALLBACK_CHAIN: [Channels; 3] = [Channels::Rgba, Channels::Rg, Channels::R];

fn chain_start(requested: Channels) -> usize {
    FALLBACK_CHAIN
        .iter()
        .position(|&c| c == requested)
        .unwrap_or(0)
}

/// Returns the slice of [`FALLBACK_CHAIN`] starting at `requested`.
pub fn fallback_chain(requested: Channels) -> &'static [Channels] {
    &FALLBACK_CHAIN[chain_start(requested)..]
}

/// Every layout tried for `requested`, in probe order: the fallback chain
/// down to `R`, then the layouts wider than `requested`, narrowest first.
///
/// A device that only renders `Rgba` can still hold two- and one-channel
/// fields in it; the unused channels are ignored.
pub fn candidate_layouts(requested: Channels) -> impl Iterator<Item = Channels> {
    let start = chain_start(requested);
    FALLBACK_CHAIN[start..]
        .iter()
        .chain(FALLBACK_CHAIN[..start].iter().rev())
        .copied()
}

/// Float precision of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 16-bit half float.
    #[default]
    Half,
    /// 32-bit float.
    Full,
}

impl Precision {
    /// Parses `"half"` or `"full"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "half" => Some(Precision::Half),
            "full" => Some(Precision::Full),
            _ => None,
        }
    }
}

/// A float texture format: channel layout plus precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureFormat {
    pub channels: Channels,
    pub precision: Precision,
}

impl TextureFormat {
    pub fn new(channels: Channels, precision: Precision) -> Self {
        Self {
            channels,
            precision,
        }
    }
}

/// How advection samples between texel centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Float textures support linear filtering; advection uses it directly.
    Hardware,
    /// Linear filtering is unavailable; advection blends four nearest fetches.
    Manual,
}

/// Query boundary to the graphics device.
pub trait DeviceCapabilities {
    /// Whether a render target of `format` can be created and is framebuffer-complete.
    fn supports_render_format(&self, format: TextureFormat) -> bool;

    /// Whether float textures of the given precision can be linearly filtered.
    fn supports_float_linear_filtering(&self, precision: Precision) -> bool;

    /// Whether the standard-derivatives extension is available. Only
    /// downstream display shaders care; the solver never uses it.
    fn supports_standard_derivatives(&self) -> bool;
}

/// A field whose format differs from the layout it asked for: narrower
/// after walking the fallback chain, or wider when nothing narrower renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub requested: Channels,
    pub selected: Channels,
}

/// Formats chosen for each field class, fixed for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiatedFormats {
    /// Dye grid format (asks for `Rgba`).
    pub dye: TextureFormat,
    /// Velocity grid format (asks for `Rg`).
    pub velocity: TextureFormat,
    /// Pressure, divergence and curl format (asks for `R`).
    pub scalar: TextureFormat,
    pub filter_mode: FilterMode,
    pub standard_derivatives: bool,
    /// Every fallback taken, in negotiation order.
    pub degradations: Vec<Degradation>,
}

impl NegotiatedFormats {
    /// True when any field runs in a layout other than the one it requested.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Picks the best supported format for `requested`, probing
/// [`candidate_layouts`] in order.
///
/// # Errors
///
/// Returns [`FluidError::UnsupportedFormat`] when no layout at this
/// precision can be rendered to.
pub fn select_format(
    device: &dyn DeviceCapabilities,
    requested: Channels,
    precision: Precision,
) -> Result<TextureFormat, FluidError> {
    candidate_layouts(requested)
        .map(|channels| TextureFormat::new(channels, precision))
        .find(|&format| device.supports_render_format(format))
        .ok_or(FluidError::UnsupportedFormat { requested })
}

/// Negotiates formats for every field class and the advection filter mode.
///
/// Degradations and missing linear filtering are logged as warnings; they
/// are not errors.
///
/// # Errors
///
/// Propagates [`FluidError::UnsupportedFormat`] from [`select_format`].
pub fn negotiate(
    device: &dyn DeviceCapabilities,
    precision: Precision,
) -> Result<NegotiatedFormats, FluidError> {
    let mut degradations = Vec::new();
    let mut pick = |requested: Channels| -> Result<TextureFormat, FluidError> {
        let format = select_format(device, requested, precision)?;
        if format.channels != requested {
            log::warn!(
                "{requested:?} {precision:?}-float render target unsupported, using {:?}",
                format.channels
            );
            degradations.push(Degradation {
                requested,
                selected: format.channels,
            });
        }
        Ok(format)
    };

    let dye = pick(Channels::Rgba)?;
    let velocity = pick(Channels::Rg)?;
    let scalar = pick(Channels::R)?;

    let filter_mode = if device.supports_float_linear_filtering(precision) {
        FilterMode::Hardware
    } else {
        log::warn!("linear filtering unavailable for {precision:?} float textures, advection uses manual bilinear");
        FilterMode::Manual
    };

    let negotiated = NegotiatedFormats {
        dye,
        velocity,
        scalar,
        filter_mode,
        standard_derivatives: device.supports_standard_derivatives(),
        degradations,
    };
    log::info!(
        "negotiated formats: dye {:?}, velocity {:?}, scalar {:?}, filtering {:?}",
        negotiated.dye.channels,
        negotiated.velocity.channels,
        negotiated.scalar.channels,
        negotiated.filter_mode
    );
    Ok(negotiated)
}

/// A device described by plain data, for headless runs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessDevice {
    pub renderable: Vec<TextureFormat>,
    pub float_linear_filtering: bool,
    pub standard_derivatives: bool,
}

impl HeadlessDevice {
    /// A device that renders every layout at both precisions and filters linearly.
    pub fn full() -> Self {
        let renderable = FALLBACK_CHAIN
            .iter()
            .flat_map(|&c| {
                [
                    TextureFormat::new(c, Precision::Half),
                    TextureFormat::new(c, Precision::Full),
                ]
            })
            .collect();
        Self {
            renderable,
            float_linear_filtering: true,
            standard_derivatives: true,
        }
    }

    /// A device that only renders layouts with at most `max` channels.
    pub fn with_max_channels(max: Channels) -> Self {
        let mut device = Self::full();
        device
            .renderable
            .retain(|f| f.channels.count() <= max.count());
        device
    }

    /// Same device with linear float filtering switched off.
    pub fn without_linear_filtering(mut self) -> Self {
        self.float_linear_filtering = false;
        self
    }
}

impl DeviceCapabilities for HeadlessDevice {
    fn supports_render_format(&self, format: TextureFormat) -> bool {
        self.renderable.contains(&format)
    }

    fn supports_float_linear_filtering(&self, _precision: Precision) -> bool {
        self.float_linear_filtering
    }

    fn supports_standard_derivatives(&self) -> bool {
        self.standard_derivatives
    }
}
