//! Viewport edges and exit classification
//!
//! Everything here is in scene units. Window rectangles (pixels) only meet
//! edges in the registry's adjacency test.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cardinal boundary a particle leaves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom];

    pub fn opposite(self) -> Edge {
        match self {
            Edge::Left => Edge::Right,
            Edge::Right => Edge::Left,
            Edge::Top => Edge::Bottom,
            Edge::Bottom => Edge::Top,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Top => "top",
            Edge::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visible viewport size in scene units, centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportExtent {
    pub width: f32,
    pub height: f32,
}

impl ViewportExtent {
    /// Extent of the cube `[-half_extent, half_extent]`.
    pub fn from_half_extent(half_extent: f32) -> Self {
        Self {
            width: half_extent * 2.0,
            height: half_extent * 2.0,
        }
    }

    #[inline]
    pub fn half_width(&self) -> f32 {
        self.width * 0.5
    }

    #[inline]
    pub fn half_height(&self) -> f32 {
        self.height * 0.5
    }
}

/// Edge a particle at `(x, y)` is leaving through, if it sits inside the
/// `threshold` band of one. A vertical match overrides a horizontal one.
/// Depth is not considered, so z-only exits classify as `None`.
pub fn classify_exit(x: f32, y: f32, extent: ViewportExtent, threshold: f32) -> Option<Edge> {
    let hw = extent.half_width();
    let hh = extent.half_height();

    let mut edge = None;
    if x > hw - threshold {
        edge = Some(Edge::Right);
    } else if x < -hw + threshold {
        edge = Some(Edge::Left);
    }
    if y > hh - threshold {
        edge = Some(Edge::Top);
    } else if y < -hh + threshold {
        edge = Some(Edge::Bottom);
    }
    edge
}
