//! Headless map-tile renderer.
//!
//! A worker reads raw HTTP requests from a transport endpoint, turns each one into a map view
//! (an explicit center/zoom/size or a slippy-map tile), renders it with a [`MapEngine`] into an
//! offscreen [`GlContext`] and answers with a PNG.
//!
//! [`MapEngine`]: render::backend::MapEngine
//! [`GlContext`]: render::backend::GlContext

pub mod config;
pub mod engine;
pub mod errors;
pub mod message;
pub mod net;
pub mod render;
pub mod request;
pub mod tile;
pub mod worker;

#[cfg(test)]
mod testing;

pub use errors::{RenderError, WorkerError};
