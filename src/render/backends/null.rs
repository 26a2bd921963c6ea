//! Null backend: a map engine that tracks view state and scene loading without drawing, and a
//! CPU-side offscreen context that hands back a cleared framebuffer.
//!
//! Scene loads behave like the real engine's: `load_scene` only queues the work, and the scene
//! becomes available (or fails) during a later `update`.

use crate::net::UrlClient;
use crate::render::backend::{GlContext, MapEngine, PixelFormat, RgbaImage, SurfaceSize};
use anyhow::{anyhow, bail, Result};
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Completion of a queued scene load.
struct SceneLoaded {
    generation: u64,
    result: std::result::Result<Vec<u8>, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum SceneState {
    None,
    Loading { path: String },
    Ready { path: String, bytes: usize },
    Failed { path: String, reason: String },
}

/// Null map engine that does not perform any rendering.
pub struct NullMapEngine {
    url_client: Option<UrlClient>,
    tx: Sender<SceneLoaded>,
    rx: Receiver<SceneLoaded>,
    /// Loads queued but not yet drained by `update`
    pending: usize,
    /// Bumped on every `load_scene` so stale completions are ignored
    generation: u64,
    scene: SceneState,

    pixel_scale: f32,
    size: SurfaceSize,
    position: (f64, f64),
    zoom: f32,
    tilt: f32,
    rotation: f32,
    frame_id: u64,
}

impl NullMapEngine {
    /// Creates a new null engine. Without a URL client, `http(s)` scenes fail to load.
    pub fn new(url_client: Option<UrlClient>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            url_client,
            tx,
            rx,
            pending: 0,
            generation: 0,
            scene: SceneState::None,
            pixel_scale: 1.0,
            size: SurfaceSize::new(0, 0),
            position: (0.0, 0.0),
            zoom: 0.0,
            tilt: 0.0,
            rotation: 0.0,
            frame_id: 0,
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Tilt and rotation in radians.
    pub fn orientation(&self) -> (f32, f32) {
        (self.tilt, self.rotation)
    }

    /// Size in bytes of the loaded scene, if one is ready.
    pub fn scene_bytes(&self) -> Option<usize> {
        match &self.scene {
            SceneState::Ready { bytes, .. } => Some(*bytes),
            _ => None,
        }
    }

    fn apply(&mut self, done: SceneLoaded) {
        self.pending = self.pending.saturating_sub(1);
        if done.generation != self.generation {
            debug!("dropping stale scene load (generation {})", done.generation);
            return;
        }

        let path = match &self.scene {
            SceneState::Loading { path } => path.clone(),
            _ => return,
        };
        self.scene = match done.result {
            Ok(body) => {
                debug!("scene {path} loaded ({} bytes)", body.len());
                SceneState::Ready { path, bytes: body.len() }
            }
            Err(reason) => {
                warn!("scene {path} failed to load: {reason}");
                SceneState::Failed { path, reason }
            }
        };
    }
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

impl MapEngine for NullMapEngine {
    fn name(&self) -> &str {
        "NullMapEngine"
    }

    fn load_scene(&mut self, path: &str) -> Result<()> {
        self.generation = self.generation.wrapping_add(1);
        self.scene = SceneState::Loading { path: path.to_string() };
        self.pending += 1;

        let generation = self.generation;
        let tx = self.tx.clone();

        if is_remote(path) {
            let Some(client) = self.url_client.as_ref() else {
                let _ = tx.send(SceneLoaded { generation, result: Err("no url client configured".into()) });
                return Ok(());
            };
            client.fetch_with(path.to_string(), move |res| {
                let result = match res {
                    Ok(resp) if resp.is_success() => Ok(resp.body),
                    Ok(resp) => Err(format!("HTTP {} {}", resp.status, resp.status_text)),
                    Err(e) => Err(e.to_string()),
                };
                let _ = tx.send(SceneLoaded { generation, result });
            });
        } else {
            let result = std::fs::read(path).map_err(|e| e.to_string());
            let _ = tx.send(SceneLoaded { generation, result });
        }

        Ok(())
    }

    fn pixel_scale(&self) -> f32 {
        self.pixel_scale
    }

    fn set_pixel_scale(&mut self, scale: f32) {
        self.pixel_scale = scale;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = SurfaceSize::new(width, height);
    }

    fn set_position(&mut self, lng: f64, lat: f64) {
        self.position = (lng, lat);
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
    }

    fn set_tilt(&mut self, radians: f32) {
        self.tilt = radians;
    }

    fn set_rotation(&mut self, radians: f32) {
        self.rotation = radians;
    }

    fn update(&mut self, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(done) => self.apply(done),
                Err(RecvTimeoutError::Timeout) => return false,
                // We hold a sender ourselves, so this cannot happen
                Err(RecvTimeoutError::Disconnected) => return true,
            }
        }
        true
    }

    fn render(&mut self) -> Result<()> {
        if let SceneState::Failed { path, reason } = &self.scene {
            bail!("scene {path} failed to load: {reason}");
        }
        self.frame_id = self.frame_id.wrapping_add(1);
        Ok(())
    }
}

/// Offscreen context backed by a CPU buffer.
pub struct HeadlessContext {
    size: SurfaceSize,
    clear_color: [u8; 4],
    pixels: Vec<u8>,
    initialized: bool,
    current: bool,
}

impl HeadlessContext {
    pub fn new(clear_color: [u8; 4]) -> Self {
        Self {
            size: SurfaceSize::new(0, 0),
            clear_color,
            pixels: Vec::new(),
            initialized: false,
            current: false,
        }
    }

    fn clear(&mut self) {
        let len = (self.size.width as usize) * (self.size.height as usize);
        self.pixels = self.clear_color.repeat(len);
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new([0, 0, 0, 0])
    }
}

impl GlContext for HeadlessContext {
    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        if !self.initialized {
            bail!("context resized before init");
        }
        self.size = size;
        self.clear();
        Ok(())
    }

    fn make_current(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(anyhow!("context made current before init"));
        }
        self.current = true;
        Ok(())
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn read_pixels(&mut self) -> Result<RgbaImage> {
        if !self.current {
            bail!("read_pixels on a context that is not current");
        }
        RgbaImage::from_raw(
            self.pixels.clone(),
            self.size.width,
            self.size.height,
            self.size.width * 4,
            PixelFormat::Rgba8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::UrlClientOptions;

    #[test]
    fn file_scene_loads_during_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.yaml");
        std::fs::write(&path, "sources: {}").unwrap();

        let mut engine = NullMapEngine::new(None);
        engine.load_scene(path.to_str().unwrap()).unwrap();
        assert_eq!(engine.scene_bytes(), None);

        assert!(engine.update(Duration::from_millis(100)));
        assert_eq!(engine.scene_bytes(), Some(11));
        engine.render().unwrap();
        assert_eq!(engine.frame_id(), 1);
    }

    #[test]
    fn missing_scene_fails_render() {
        let mut engine = NullMapEngine::new(None);
        engine.load_scene("/definitely/not/here.yaml").unwrap();
        assert!(engine.update(Duration::from_millis(100)));

        let err = engine.render().unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn remote_scene_without_client_fails() {
        let mut engine = NullMapEngine::new(None);
        engine.load_scene("http://example.invalid/scene.yaml").unwrap();
        assert!(engine.update(Duration::from_millis(100)));
        assert!(engine.render().is_err());
    }

    #[test]
    fn remote_scene_is_fetched_through_url_client() {
        let url = crate::testing::serve_once("200 OK", "layers: {}");
        let client = UrlClient::new(UrlClientOptions { number_of_threads: 1, ..Default::default() }).unwrap();
        let mut engine = NullMapEngine::new(Some(client));

        engine.load_scene(&url).unwrap();
        assert!(engine.update(Duration::from_secs(10)));
        assert_eq!(engine.scene_bytes(), Some(10));
    }

    #[test]
    fn newer_scene_supersedes_older_load() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yaml");
        std::fs::write(&good, "a: 1").unwrap();

        let mut engine = NullMapEngine::new(None);
        engine.load_scene("/missing.yaml").unwrap();
        engine.load_scene(good.to_str().unwrap()).unwrap();
        assert!(engine.update(Duration::from_millis(100)));

        assert_eq!(engine.scene_bytes(), Some(4));
        assert!(engine.render().is_ok());
    }

    #[test]
    fn view_setters_are_applied() {
        let mut engine = NullMapEngine::new(None);
        engine.set_pixel_scale(4.0);
        engine.resize(512, 256);
        engine.set_position(-74.0, 40.7);
        engine.set_zoom(12.0);
        engine.set_tilt(0.5);
        engine.set_rotation(0.25);

        assert_eq!(engine.pixel_scale(), 4.0);
        assert_eq!(engine.size(), SurfaceSize::new(512, 256));
        assert_eq!(engine.position(), (-74.0, 40.7));
        assert_eq!(engine.zoom(), 12.0);
        assert_eq!(engine.orientation(), (0.5, 0.25));
    }

    #[test]
    fn headless_context_reads_back_clear_color() {
        let mut ctx = HeadlessContext::new([1, 2, 3, 255]);
        assert!(ctx.resize(SurfaceSize::new(2, 2)).is_err());

        ctx.init().unwrap();
        ctx.resize(SurfaceSize::new(3, 2)).unwrap();
        assert!(ctx.read_pixels().is_err());

        ctx.make_current().unwrap();
        let img = ctx.read_pixels().unwrap();
        assert_eq!((img.width, img.height, img.stride), (3, 2, 12));
        assert_eq!(img.row(1), &[1, 2, 3, 255, 1, 2, 3, 255, 1, 2, 3, 255]);
    }
}
