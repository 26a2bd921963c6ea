//! Worker configuration.
//!
//! `WorkerConfig` controls the limits and timings of a single tile worker: where inline scenes
//! are materialized, how long the pump loop may wait for tiles, how many threads the URL client
//! may use, and the anti-alias factor applied to the engine surface.
//!
//! `WorkerConfig` provides the production defaults via [`Default`] and a fluent
//! [`WorkerConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use gosub_tiles::config::WorkerConfig;
//! let cfg = WorkerConfig::default();
//! assert_eq!(cfg.aa_scale, 2.0);
//! assert_eq!(cfg.url_client_threads, 10);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use std::time::Duration;
//! use gosub_tiles::config::WorkerConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = WorkerConfig::builder()
//!     .cache_dir("/var/cache/tiles")
//!     .pump_deadline(Duration::from_secs(30))
//!     .url_client_threads(4)
//!     .build()?; // returns Result<WorkerConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `cache_dir`: Directory receiving `<md5>.yaml` files for inline scenes (default: `cache`).
//! - `default_scene`: Scene loaded at startup (default: `scene.yaml`).
//! - `initial_width` / `initial_height`: Image size before the first request (default: 100x100).
//! - `aa_scale`: Super-sampling multiplier for the engine surface (default: 2.0).
//! - `pump_slice`: Work budget handed to the engine per pump call (default: 10s).
//! - `pump_deadline`: Wall-clock cap on one pump loop (default: 100s).
//! - `url_client_threads`: Worker threads fetching tiles and scenes (default: 10).
//! - `max_dimension`: Largest accepted physical width or height in pixels (default: 8192).
//! - `channel_capacity`: Requests that may queue in front of the pipeline thread (default: 32).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Anti-alias multiplier applied to the engine surface.
pub const DEFAULT_AA_SCALE: f32 = 2.0;
/// Scene id the worker starts with.
pub const DEFAULT_SCENE: &str = "scene.yaml";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub cache_dir: PathBuf,
    pub default_scene: String,
    pub initial_width: u32,
    pub initial_height: u32,
    pub aa_scale: f32,
    pub pump_slice: Duration,
    pub pump_deadline: Duration,
    pub url_client_threads: usize,
    pub max_dimension: u32,
    pub channel_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            default_scene: DEFAULT_SCENE.to_string(),
            initial_width: 100,
            initial_height: 100,
            aa_scale: DEFAULT_AA_SCALE,
            pump_slice: Duration::from_secs(10),
            pump_deadline: Duration::from_secs(100),
            url_client_threads: 10,
            max_dimension: 8192,
            channel_capacity: 32,
        }
    }
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug, Clone, Default)]
pub struct WorkerConfigBuilder {
    inner: WorkerConfig,
}

impl WorkerConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut WorkerConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn cache_dir<P: Into<PathBuf>>(self, dir: P) -> Self { self.map(|c| c.cache_dir = dir.into()) }
    pub fn default_scene<S: Into<String>>(self, scene: S) -> Self { self.map(|c| c.default_scene = scene.into()) }
    pub fn initial_size(self, width: u32, height: u32) -> Self {
        self.map(|c| {
            c.initial_width = width;
            c.initial_height = height;
        })
    }
    pub fn aa_scale(self, scale: f32) -> Self { self.map(|c| c.aa_scale = scale) }
    pub fn pump_slice(self, slice: Duration) -> Self { self.map(|c| c.pump_slice = slice) }
    pub fn pump_deadline(self, deadline: Duration) -> Self { self.map(|c| c.pump_deadline = deadline) }
    pub fn url_client_threads(self, n: usize) -> Self { self.map(|c| c.url_client_threads = n) }
    pub fn max_dimension(self, px: u32) -> Self { self.map(|c| c.max_dimension = px) }
    pub fn channel_capacity(self, n: usize) -> Self { self.map(|c| c.channel_capacity = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut WorkerConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<WorkerConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidAaScale(f32),
    ZeroPumpSlice,
    ZeroPumpDeadline,
    ZeroUrlClientThreads,
    ZeroChannelCapacity,
    InvalidInitialSize { width: u32, height: u32, max: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAaScale(s) =>
                write!(f, "aa_scale {s} is out of range (expected a finite value >= 1.0)"),
            ConfigError::ZeroPumpSlice =>
                write!(f, "pump_slice must be non-zero"),
            ConfigError::ZeroPumpDeadline =>
                write!(f, "pump_deadline must be non-zero"),
            ConfigError::ZeroUrlClientThreads =>
                write!(f, "url_client_threads must be at least 1"),
            ConfigError::ZeroChannelCapacity =>
                write!(f, "channel_capacity must be at least 1"),
            ConfigError::InvalidInitialSize { width, height, max } =>
                write!(f, "initial size {width}x{height} must be non-zero and at most {max}"),
        }
    }
}
impl std::error::Error for ConfigError {}

fn validate(c: &WorkerConfig) -> Result<(), ConfigError> {
    if !c.aa_scale.is_finite() || c.aa_scale < 1.0 {
        return Err(ConfigError::InvalidAaScale(c.aa_scale));
    }
    if c.pump_slice.is_zero() {
        return Err(ConfigError::ZeroPumpSlice);
    }
    if c.pump_deadline.is_zero() {
        return Err(ConfigError::ZeroPumpDeadline);
    }
    if c.url_client_threads == 0 {
        return Err(ConfigError::ZeroUrlClientThreads);
    }
    if c.channel_capacity == 0 {
        return Err(ConfigError::ZeroChannelCapacity);
    }
    let dims = [c.initial_width, c.initial_height];
    if dims.iter().any(|d| *d == 0 || *d > c.max_dimension) {
        return Err(ConfigError::InvalidInitialSize {
            width: c.initial_width,
            height: c.initial_height,
            max: c.max_dimension,
        });
    }
    Ok(())
}
