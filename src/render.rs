pub mod backend;

/// Rendering backends for the tile worker.
pub mod backends {
    /// Null map engine and CPU offscreen context
    pub mod null;
}

pub mod encode;
