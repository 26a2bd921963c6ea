//! Test doubles shared by the unit tests of several modules.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};

use crate::render::backend::{GlContext, MapEngine, RgbaImage, SurfaceSize};
use crate::render::backends::null::HeadlessContext;

/// Serves `body` with `status` to a single connection and returns the URL to fetch.
pub(crate) fn serve_once(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf);
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(reply.as_bytes());
        }
    });
    format!("http://{addr}/scene.yaml")
}

/// One call observed by the recording doubles.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    LoadScene(String),
    SetPixelScale(f32),
    Resize(u32, u32),
    SetPosition(f64, f64),
    SetZoom(f32),
    SetTilt(f32),
    SetRotation(f32),
    Update,
    Render,
    GlResize(u32, u32),
    ReadPixels,
}

impl Call {
    /// Calls that change what the engine shows, as opposed to pumping and drawing.
    pub(crate) fn is_view_mutation(&self) -> bool {
        !matches!(self, Call::Update | Call::Render | Call::ReadPixels)
    }
}

pub(crate) type CallLog = Arc<Mutex<Vec<Call>>>;

pub(crate) fn take_calls(log: &CallLog) -> Vec<Call> {
    std::mem::take(&mut *log.lock().unwrap())
}

/// Map engine double that records every call.
pub(crate) struct RecordingEngine {
    log: CallLog,
    pixel_scale: f32,
    /// What `update` reports
    pub(crate) done: bool,
    /// Time spent inside each `update`, capped by its budget
    pub(crate) update_delay: Duration,
    pub(crate) fail_render: Option<String>,
}

impl RecordingEngine {
    pub(crate) fn new(log: CallLog) -> Self {
        Self {
            log,
            pixel_scale: 1.0,
            done: true,
            update_delay: Duration::ZERO,
            fail_render: None,
        }
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

impl MapEngine for RecordingEngine {
    fn name(&self) -> &str {
        "RecordingEngine"
    }

    fn load_scene(&mut self, path: &str) -> Result<()> {
        self.record(Call::LoadScene(path.to_string()));
        Ok(())
    }

    fn pixel_scale(&self) -> f32 {
        self.pixel_scale
    }

    fn set_pixel_scale(&mut self, scale: f32) {
        self.pixel_scale = scale;
        self.record(Call::SetPixelScale(scale));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.record(Call::Resize(width, height));
    }

    fn set_position(&mut self, lng: f64, lat: f64) {
        self.record(Call::SetPosition(lng, lat));
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.record(Call::SetZoom(zoom));
    }

    fn set_tilt(&mut self, radians: f32) {
        self.record(Call::SetTilt(radians));
    }

    fn set_rotation(&mut self, radians: f32) {
        self.record(Call::SetRotation(radians));
    }

    fn update(&mut self, budget: Duration) -> bool {
        self.record(Call::Update);
        if !self.update_delay.is_zero() {
            std::thread::sleep(self.update_delay.min(budget));
        }
        self.done
    }

    fn render(&mut self) -> Result<()> {
        self.record(Call::Render);
        if let Some(msg) = &self.fail_render {
            bail!("{msg}");
        }
        Ok(())
    }
}

/// Headless context that also records resizes and readbacks.
pub(crate) struct RecordingContext {
    log: CallLog,
    inner: HeadlessContext,
}

impl RecordingContext {
    pub(crate) fn new(log: CallLog) -> Self {
        Self { log, inner: HeadlessContext::new([0, 0, 0, 255]) }
    }
}

impl GlContext for RecordingContext {
    fn init(&mut self) -> Result<()> {
        self.inner.init()
    }

    fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        self.log.lock().unwrap().push(Call::GlResize(size.width, size.height));
        self.inner.resize(size)
    }

    fn make_current(&mut self) -> Result<()> {
        self.inner.make_current()
    }

    fn size(&self) -> SurfaceSize {
        self.inner.size()
    }

    fn read_pixels(&mut self) -> Result<RgbaImage> {
        self.log.lock().unwrap().push(Call::ReadPixels);
        self.inner.read_pixels()
    }
}
