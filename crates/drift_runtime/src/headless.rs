//! Render driver that consumes the particle buffers without a GPU.

use drift_core::render::RenderDriver;

#[derive(Debug, Default)]
pub struct HeadlessDriver {
    frames: u64,
    bytes: u64,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads received so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Bytes uploaded so far, positions and velocities together.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl RenderDriver for HeadlessDriver {
    fn upload(&mut self, positions: &[f32], velocities: &[f32]) {
        self.frames += 1;
        self.bytes += (std::mem::size_of_val(positions) + std::mem::size_of_val(velocities)) as u64;
    }
}
