//! Fixed-capacity particle pool
//!
//! Dense position and vertical-velocity arrays. A slot's identity is its
//! index; a slot is alive while its y-position is at or above the floor.
//! Dead slots are reused by regeneration and by imports from peer viewports.

use crate::math::{DeterministicRng, Vec3};
use crate::render::RenderDriver;
use thiserror::Error;

/// Default number of slots.
pub const DEFAULT_CAPACITY: usize = 150_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("slot {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("{positions} positions but {velocities} velocities")]
    LengthMismatch { positions: usize, velocities: usize },
}

/// Snapshot of one slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub capacity: usize,
    /// Particles span `[-half_extent, half_extent]` horizontally.
    pub half_extent: f32,
    /// Alive iff `y >= floor_y`.
    pub floor_y: f32,
    /// Height regenerated particles start from.
    pub sea_level: f32,
    pub seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            half_extent: 2.5,
            floor_y: -2.5,
            sea_level: 2.5,
            seed: 0x5EED,
        }
    }
}

pub struct ParticlePool {
    positions: Vec<[f32; 3]>,
    velocities: Vec<f32>,
    config: PoolConfig,
    rng: DeterministicRng,
    dirty: bool,
}

impl ParticlePool {
    /// Fill every coordinate uniformly inside the viewport cube.
    pub fn new(config: PoolConfig) -> Self {
        let mut rng = DeterministicRng::new(config.seed);
        let h = config.half_extent;
        let positions = (0..config.capacity)
            .map(|_| [rng.centered(h), rng.centered(h), rng.centered(h)])
            .collect();
        Self {
            positions,
            velocities: vec![0.0; config.capacity],
            config,
            rng,
            dirty: true,
        }
    }

    /// Build a pool from explicit state. The arrays must be parallel.
    pub fn from_parts(
        positions: Vec<[f32; 3]>,
        velocities: Vec<f32>,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        if positions.len() != velocities.len() {
            return Err(PoolError::LengthMismatch {
                positions: positions.len(),
                velocities: velocities.len(),
            });
        }
        let rng = DeterministicRng::new(config.seed);
        Ok(Self {
            config: PoolConfig {
                capacity: positions.len(),
                ..config
            },
            positions,
            velocities,
            rng,
            dirty: true,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[inline]
    pub fn is_alive(&self, slot: usize) -> bool {
        self.positions[slot][1] >= self.config.floor_y
    }

    #[inline]
    pub fn position(&self, slot: usize) -> Vec3 {
        Vec3::from_array(self.positions[slot])
    }

    #[inline]
    pub fn velocity(&self, slot: usize) -> f32 {
        self.velocities[slot]
    }

    pub fn particle(&self, slot: usize) -> Result<Particle, PoolError> {
        if slot >= self.len() {
            return Err(PoolError::IndexOutOfBounds {
                index: slot,
                len: self.len(),
            });
        }
        Ok(Particle {
            position: self.position(slot),
            velocity: self.velocities[slot],
        })
    }

    /// Overwrite a slot. The integrator's write path.
    #[inline]
    pub fn set(&mut self, slot: usize, position: Vec3, velocity: f32) {
        self.positions[slot] = position.to_array();
        self.velocities[slot] = velocity;
        self.dirty = true;
    }

    /// Random horizontal spot at sea level, zero velocity.
    pub fn regenerate(&mut self, slot: usize) {
        let h = self.config.half_extent;
        let x = self.rng.centered(h);
        let z = self.rng.centered(h);
        self.positions[slot] = [x, self.config.sea_level, z];
        self.velocities[slot] = 0.0;
        self.dirty = true;
    }

    /// Park a handed-off slot below the floor so imports can claim it before
    /// the next tick regenerates it.
    pub fn release(&mut self, slot: usize) {
        let [x, _, z] = self.positions[slot];
        self.positions[slot] = [x, self.parked_y(), z];
        self.velocities[slot] = 0.0;
        self.dirty = true;
    }

    fn parked_y(&self) -> f32 {
        self.config.floor_y - 1.0
    }

    /// Place an incoming particle into the first dead slot in scan order.
    /// An entry below the floor is raised onto it so the particle lands alive.
    ///
    /// Returns the slot used, or `None` when every slot is alive; in that case
    /// no slot is modified. O(N) in the pool size.
    pub fn import_into(&mut self, position: Vec3, velocity: f32) -> Option<usize> {
        let floor = self.config.floor_y;
        let Some(slot) = self.positions.iter().position(|p| p[1] < floor) else {
            tracing::debug!(?position, "pool saturated, dropping incoming particle");
            return None;
        };
        let position = Vec3::new(position.x, position.y.max(floor), position.z);
        self.set(slot, position, velocity);
        tracing::trace!(slot, ?position, velocity, "imported particle");
        Some(slot)
    }

    pub fn dead_slots(&self) -> usize {
        let floor = self.config.floor_y;
        self.positions.iter().filter(|p| p[1] < floor).count()
    }

    /// Flat `x, y, z` view for the render driver.
    pub fn positions(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn velocities(&self) -> &[f32] {
        &self.velocities
    }

    /// Raw bytes of the position buffer, ready for a GPU upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Hand both buffers to the driver if anything changed since the last
    /// flush. Returns whether an upload happened.
    pub fn flush_to<D: RenderDriver + ?Sized>(&mut self, driver: &mut D) -> bool {
        if !self.dirty {
            return false;
        }
        driver.upload(bytemuck::cast_slice(&self.positions), &self.velocities);
        self.dirty = false;
        true
    }
}
