//! Pointer samples to splat impulses.
//!
//! The injector turns consecutive pointer positions into [`Impulse`]s and
//! queues them until the scheduler drains the queue at the start of the next
//! active frame. Splats are additive, so drain order carries no physical
//! meaning.

use std::collections::VecDeque;

use glam::{Vec2, Vec3, Vec4};

use crate::error::FluidError;

/// Screen-pixel delta to field velocity gain.
pub const VELOCITY_GAIN: f32 = 5.0;

/// Host viewport size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: f32,
    height: f32,
}

impl Viewport {
    /// # Errors
    ///
    /// Returns [`FluidError::InvalidDimensions`] unless both sides are
    /// finite and positive.
    pub fn new(width: f32, height: f32) -> Result<Self, FluidError> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(FluidError::InvalidDimensions);
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Width over height, used to keep splats round on non-square screens.
    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    /// Maps a pixel position (origin top-left, y down) into field space
    /// (origin bottom-left, y up, `[0, 1]²` on screen).
    pub fn normalize(&self, pixel: Vec2) -> Vec2 {
        Vec2::new(pixel.x / self.width, 1.0 - pixel.y / self.height)
    }
}

/// A localized additive injection of velocity and dye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impulse {
    /// Center in normalized field coordinates.
    pub position: Vec2,
    /// Velocity added at the center, already gained and y-flipped.
    pub velocity_delta: Vec2,
    /// Dye added at the center.
    pub color: Vec3,
    /// Kernel radius `r` in `exp(-d² / r)`.
    pub radius: f32,
}

impl Impulse {
    /// Kernel weight at `uv`, with the x distance scaled by `aspect_ratio`.
    pub fn weight(&self, uv: Vec2, aspect_ratio: f32) -> f32 {
        let mut p = uv - self.position;
        p.x *= aspect_ratio;
        (-p.dot(p) / self.radius).exp()
    }

    /// Splat fragment: `base + weight * payload` on xyz, alpha forced to 1.
    pub fn apply(&self, base: Vec4, payload: Vec3, uv: Vec2, aspect_ratio: f32) -> Vec4 {
        (base.truncate() + self.weight(uv, aspect_ratio) * payload).extend(1.0)
    }

    /// Payload written into the velocity field: `(dx, dy, 1)`, of which a
    /// two-channel target keeps `(dx, dy)`.
    pub fn velocity_payload(&self) -> Vec3 {
        self.velocity_delta.extend(1.0)
    }
}

/// Converts pointer motion into queued impulses.
#[derive(Debug, Clone)]
pub struct ImpulseInjector {
    last: Option<Vec2>,
    queue: VecDeque<Impulse>,
    radius: f32,
}

impl ImpulseInjector {
    /// `radius` is the kernel radius given to every impulse.
    pub fn new(radius: f32) -> Self {
        Self {
            last: None,
            queue: VecDeque::new(),
            radius,
        }
    }

    /// Records one pointer sample in host pixels.
    ///
    /// The first sample only primes the last-position state. Later samples
    /// enqueue an impulse whenever the pointer moved. Returns whether an
    /// impulse was queued.
    pub fn record_pointer_sample(&mut self, pixel: Vec2, viewport: &Viewport) -> bool {
        let last = self.last.replace(pixel).unwrap_or(pixel);
        let delta = pixel - last;
        if delta == Vec2::ZERO {
            return false;
        }
        let velocity_delta = Vec2::new(delta.x, -delta.y) * VELOCITY_GAIN;
        self.queue.push_back(Impulse {
            position: viewport.normalize(pixel),
            velocity_delta,
            color: velocity_delta.extend(1.0),
            radius: self.radius,
        });
        true
    }

    /// Queues an impulse directly, bypassing pointer tracking.
    pub fn push(&mut self, impulse: Impulse) {
        self.queue.push_back(impulse);
    }

    /// Number of queued impulses.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Copies of the queued impulses, oldest first, left in the queue.
    pub fn queued(&self) -> Vec<Impulse> {
        self.queue.iter().copied().collect()
    }

    /// Removes and returns every queued impulse.
    pub fn drain(&mut self) -> Vec<Impulse> {
        self.queue.drain(..).collect()
    }

    /// Forgets the last pointer position; the next sample primes again.
    pub fn reset_pointer(&mut self) {
        self.last = None;
    }
}
