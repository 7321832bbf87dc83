//! Viewport events that change or re-announce window geometry

/// Host window events the geometry registry reacts to. Move events are not
/// observable across windows in every host, so pointer movement doubles as a
/// "position may have changed" signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportEvent {
    Loaded,
    Resized { width: f32, height: f32 },
    Moved { x: f32, y: f32 },
    PointerMoved,
}
