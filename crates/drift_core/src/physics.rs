//! Gravity + noise integrator
//!
//! Advances every slot one tick and routes particles that leave the viewport
//! cube to an [`ExitSink`]. Slots that are dead when the tick starts (parked
//! by a handoff on the previous tick) are regenerated instead of integrated.

use crate::math::Vec3;
use crate::noise::NoiseField;
use crate::pool::ParticlePool;

pub const DEFAULT_GRAVITY: f32 = -0.00005;
pub const DEFAULT_NOISE_AMPLITUDE: f32 = 0.1;

/// What happened to a particle handed to the exit sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Written to the shared store; the slot is released for imports.
    Published,
    /// Not handed off; the slot is regenerated immediately.
    Dropped,
}

/// Receives particles crossing the viewport boundary.
pub trait ExitSink {
    fn on_exit(&mut self, position: Vec3, velocity: f32) -> Handoff;
}

/// Sink for a viewport with no exchange attached.
pub struct DiscardExits;

impl ExitSink for DiscardExits {
    fn on_exit(&mut self, _position: Vec3, _velocity: f32) -> Handoff {
        Handoff::Dropped
    }
}

/// The viewport cube in scene units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBounds {
    pub half_extent: f32,
    pub floor_y: f32,
}

impl SceneBounds {
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        let h = self.half_extent;
        !(p.x < -h || p.x > h || p.y < -h || p.y > h || p.z < -h || p.z > h)
    }
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self {
            half_extent: 2.5,
            floor_y: -2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub integrated: usize,
    pub exited: usize,
    pub published: usize,
    /// Slots regenerated this tick, for any reason.
    pub regenerated: usize,
}

pub struct Integrator {
    noise: NoiseField,
    gravity: f32,
    noise_amplitude: f32,
    bounds: SceneBounds,
}

impl Integrator {
    pub fn new(noise: NoiseField, gravity: f32, noise_amplitude: f32, bounds: SceneBounds) -> Self {
        Self {
            noise,
            gravity,
            noise_amplitude,
            bounds,
        }
    }

    pub fn bounds(&self) -> SceneBounds {
        self.bounds
    }

    /// Displacement for one particle at field time `t`.
    #[inline]
    fn displacement(&self, p: Vec3, t: f32) -> Vec3 {
        let a = self.noise_amplitude;
        Vec3::new(
            self.noise.noise3(p.x, p.y, t) * a,
            self.noise.noise3(p.y, p.z, t) * a,
            self.noise.noise3(p.z, p.x, t) * a,
        )
    }

    pub fn tick<S: ExitSink + ?Sized>(
        &self,
        pool: &mut ParticlePool,
        field_time: f32,
        sink: &mut S,
    ) -> TickSummary {
        let mut summary = TickSummary::default();

        for slot in 0..pool.len() {
            if !pool.is_alive(slot) {
                pool.regenerate(slot);
                summary.regenerated += 1;
                continue;
            }

            let mut p = pool.position(slot);
            let d = self.displacement(p, field_time);
            let velocity = pool.velocity(slot) + self.gravity;
            p.x += d.x;
            p.y += velocity + d.y;
            p.z += d.z;
            summary.integrated += 1;

            if !self.bounds.contains(p) {
                summary.exited += 1;
                match sink.on_exit(p, velocity) {
                    Handoff::Published => {
                        summary.published += 1;
                        pool.release(slot);
                    }
                    Handoff::Dropped => {
                        summary.regenerated += 1;
                        pool.regenerate(slot);
                    }
                }
            } else if p.y < self.bounds.floor_y {
                summary.regenerated += 1;
                pool.regenerate(slot);
            } else {
                pool.set(slot, p, velocity);
            }
        }

        tracing::trace!(?summary, field_time, "tick");
        summary
    }
}
