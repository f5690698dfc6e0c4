//! CPU-resident texel grid with GL texture sampling semantics.
//!
//! A `Grid` mirrors one float render target: `width * height` texels, each
//! storing 1, 2 or 4 `f32` channels, addressed by normalized coordinates in
//! `[0, 1]²`. Reads behave like `texture2D` on a `CLAMP_TO_EDGE` texture:
//! coordinates outside the domain clamp to the edge texel and missing
//! channels read as they do on R/RG textures (`g = b = 0`, `a = 1`).

use glam::{UVec2, Vec2, Vec4};

use crate::capability::Channels;
use crate::error::FluidError;

/// Texture filter applied by [`Grid::sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Linear,
    Nearest,
}

/// Size, layout and filter of a grid or render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub filter: Filter,
}

impl GridSpec {
    /// Square spec of edge `resolution`.
    pub fn square(resolution: u32, channels: Channels, filter: Filter) -> Self {
        Self {
            width: resolution,
            height: resolution,
            channels,
            filter,
        }
    }

    /// `1 / resolution` per axis, the offset between neighbouring texel centers.
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }
}

/// A 2D float field stored texel-major, channels interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    spec: GridSpec,
    data: Vec<f32>,
}

impl Grid {
    /// Allocates a zero-filled grid.
    ///
    /// # Errors
    ///
    /// Returns [`FluidError::InvalidDimensions`] if either edge is zero or
    /// the texel count overflows `usize`.
    pub fn new(spec: GridSpec) -> Result<Self, FluidError> {
        if spec.width == 0 || spec.height == 0 {
            return Err(FluidError::InvalidDimensions);
        }
        let len = (spec.width as usize)
            .checked_mul(spec.height as usize)
            .and_then(|n| n.checked_mul(spec.channels.count()))
            .ok_or(FluidError::InvalidDimensions)?;
        Ok(Self {
            spec,
            data: vec![0.0; len],
        })
    }

    /// Allocates a grid and fills each texel from `f(uv)` at its center.
    pub fn from_fn(spec: GridSpec, f: impl FnMut(Vec2) -> Vec4) -> Result<Self, FluidError> {
        let mut grid = Self::new(spec)?;
        grid.render(f);
        Ok(grid)
    }

    /// Shape, layout and filter of this grid.
    pub fn spec(&self) -> GridSpec {
        self.spec
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.spec.width
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.spec.height
    }

    /// Channel layout each texel stores.
    pub fn channels(&self) -> Channels {
        self.spec.channels
    }

    pub fn texel_size(&self) -> Vec2 {
        self.spec.texel_size()
    }

    /// Raw interleaved channel data, row-major from the bottom row (`v = 0`).
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Normalized coordinate of the center of texel `(x, y)`.
    pub fn texel_center(&self, x: u32, y: u32) -> Vec2 {
        (Vec2::new(x as f32, y as f32) + 0.5) * self.texel_size()
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.spec.width as usize + x as usize) * self.spec.channels.count()
    }

    /// Texel `(x, y)` widened to four channels.
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let i = self.offset(x, y);
        match self.spec.channels {
            Channels::R => Vec4::new(self.data[i], 0.0, 0.0, 1.0),
            Channels::Rg => Vec4::new(self.data[i], self.data[i + 1], 0.0, 1.0),
            Channels::Rgba => Vec4::from_slice(&self.data[i..i + 4]),
        }
    }

    /// Stores `value` at `(x, y)`, dropping channels the grid does not hold.
    pub fn set_texel(&mut self, x: u32, y: u32, value: Vec4) {
        let i = self.offset(x, y);
        let n = self.spec.channels.count();
        self.data[i..i + n].copy_from_slice(&value.to_array()[..n]);
    }

    /// Overwrites every texel with `f(uv)` evaluated at the texel center,
    /// the CPU counterpart of drawing a fullscreen triangle into a target.
    pub fn render(&mut self, mut f: impl FnMut(Vec2) -> Vec4) {
        for y in 0..self.spec.height {
            for x in 0..self.spec.width {
                let value = f(self.texel_center(x, y));
                self.set_texel(x, y, value);
            }
        }
    }

    /// Multiplies every stored channel by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.data.iter_mut().for_each(|v| *v *= factor);
    }

    fn clamp_index(i: i64, size: u32) -> u32 {
        i.clamp(0, i64::from(size) - 1) as u32
    }

    /// Nearest-texel fetch with edge clamping.
    pub fn fetch(&self, uv: Vec2) -> Vec4 {
        let size = UVec2::new(self.spec.width, self.spec.height);
        let st = uv * size.as_vec2();
        let x = Self::clamp_index(st.x.floor() as i64, size.x);
        let y = Self::clamp_index(st.y.floor() as i64, size.y);
        self.texel(x, y)
    }

    /// Hardware-style bilinear sample with edge clamping.
    ///
    /// Coordinates far outside the grid, infinite or NaN ones included,
    /// read the edge texels.
    pub fn sample_linear(&self, uv: Vec2) -> Vec4 {
        let size = UVec2::new(self.spec.width, self.spec.height);
        // Past [-1, size] both taps clamp to the same edge texel anyway.
        let st = (uv * size.as_vec2() - 0.5).clamp(Vec2::splat(-1.0), size.as_vec2());
        let base = st.floor();
        let t = st - base;
        let x0 = base.x as i64;
        let y0 = base.y as i64;
        let (xa, xb) = (
            Self::clamp_index(x0, size.x),
            Self::clamp_index(x0 + 1, size.x),
        );
        let (ya, yb) = (
            Self::clamp_index(y0, size.y),
            Self::clamp_index(y0 + 1, size.y),
        );
        let bottom = self.texel(xa, ya).lerp(self.texel(xb, ya), t.x);
        let top = self.texel(xa, yb).lerp(self.texel(xb, yb), t.x);
        bottom.lerp(top, t.y)
    }

    /// Samples with this grid's own filter.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        match self.spec.filter {
            Filter::Linear => self.sample_linear(uv),
            Filter::Nearest => self.fetch(uv),
        }
    }

    /// Bilinear blend built from four explicit fetches, for devices without
    /// float linear filtering. `tsize` is the texel size of this grid.
    pub fn bilerp(&self, uv: Vec2, tsize: Vec2) -> Vec4 {
        let st = uv / tsize - 0.5;
        let iuv = st.floor();
        let fuv = st - iuv;
        let a = self.sample((iuv + Vec2::new(0.5, 0.5)) * tsize);
        let b = self.sample((iuv + Vec2::new(1.5, 0.5)) * tsize);
        let c = self.sample((iuv + Vec2::new(0.5, 1.5)) * tsize);
        let d = self.sample((iuv + Vec2::new(1.5, 1.5)) * tsize);
        a.lerp(b, fuv.x).lerp(c.lerp(d, fuv.x), fuv.y)
    }

    /// Largest absolute value over the first `channels` channels of every texel.
    pub fn peak(&self, channels: usize) -> f32 {
        let stride = self.spec.channels.count();
        let n = channels.min(stride);
        self.data
            .chunks_exact(stride)
            .flat_map(|texel| texel[..n].iter())
            .fold(0.0_f32, |m, v| m.max(v.abs()))
    }
}
