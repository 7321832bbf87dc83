//! Render driver contract
//!
//! The renderer owns the GPU buffers and the frame callback. The simulation
//! only hands it the flat buffers when they changed.

/// Receives the pool buffers after a tick or an import dirtied them.
pub trait RenderDriver {
    /// `positions` is `x, y, z` per particle; `velocities` one scalar each.
    fn upload(&mut self, positions: &[f32], velocities: &[f32]);
}
