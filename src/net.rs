//! Network layer used by the engine to fetch scenes and tiles.
//!
//! The pipeline thread never reads from the network itself. Fetches run on the [`UrlClient`]'s
//! own runtime and their results are handed back to the engine, which drains them while pumping.

mod client;
mod fetch;
mod response;

pub use client::{UrlClient, UrlClientOptions};
pub use fetch::fetch;
pub use response::Response;
