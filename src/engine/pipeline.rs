//! The render pipeline: one request in, one PNG (or a 400) out.
//!
//! A [`RenderPipeline`] owns the map engine, the GL context, the view state and the scene cache
//! of one worker. It is driven from a single thread; see [`crate::engine::handle`] for how
//! requests reach it.

use http::{Request, Version};
use log::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::engine::events::RequestId;
use crate::engine::pump::pump_until_idle;
use crate::engine::scene_cache::SceneCache;
use crate::engine::view::{apply, ViewState, ViewTarget};
use crate::errors::{RenderError, WorkerError};
use crate::message::{WorkerReply, PNG_MIME, TXT_MIME};
use crate::render::backend::{GlContext, MapEngine, SurfaceSize};
use crate::render::encode::encode_png;
use crate::request::{heart_beat_hint, parse, ParsedMessage, RenderRequest};

pub struct RenderPipeline<E, G> {
    config: WorkerConfig,
    engine: E,
    gl: G,
    state: ViewState,
    scenes: SceneCache,
}

impl<E: MapEngine, G: GlContext> RenderPipeline<E, G> {
    /// Brings up the GL context and engine in their initial state.
    ///
    /// GL failures are fatal. A default scene that fails to load is only logged; the first
    /// request naming another scene replaces it anyway.
    pub fn new(config: WorkerConfig, mut engine: E, mut gl: G) -> Result<Self, WorkerError> {
        let initial = SurfaceSize::new(config.initial_width, config.initial_height);
        let context_err = |e: anyhow::Error| WorkerError::ContextInit(format!("{e:#}"));

        gl.init().map_err(context_err)?;
        gl.resize(initial).map_err(context_err)?;
        gl.make_current().map_err(context_err)?;

        if let Err(e) = engine.load_scene(&config.default_scene) {
            warn!("could not load default scene {}: {e:#}", config.default_scene);
        }
        engine.set_pixel_scale(config.aa_scale);
        let aa = initial.scaled(config.aa_scale);
        engine.resize(aa.width, aa.height);
        pump_until_idle(&mut engine, config.pump_slice, config.pump_deadline);

        info!(
            "pipeline ready: engine={} surface={initial} scene={}",
            engine.name(),
            config.default_scene
        );

        let state = ViewState::new(config.default_scene.clone(), initial.width, initial.height);
        let scenes = SceneCache::new(config.cache_dir.clone());
        Ok(Self { config, engine, gl, state, scenes })
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn scene_cache(&self) -> &SceneCache {
        &self.scenes
    }

    /// Handles one HTTP request. Never fails: every error becomes a `400` reply.
    pub fn handle(&mut self, request: &Request<Vec<u8>>) -> WorkerReply {
        let id = RequestId::new();
        let version = reply_version(request.version());

        let req = match parse(request) {
            Ok(ParsedMessage::HealthCheck) => {
                debug!("[{id}] health check");
                return WorkerReply::ok(version, TXT_MIME, b"OK".to_vec());
            }
            Ok(ParsedMessage::Render(req)) => req,
            Err(e) => {
                warn!("[{id}] rejected {}: {e}", request.uri());
                let reply = WorkerReply::bad_request(version, e.to_string());
                return match heart_beat_hint(request) {
                    Some(heart_beat) => reply.with_heart_beat(heart_beat),
                    None => reply,
                };
            }
        };

        debug!("[{id}] {} {} scene={:?} view={:?}", request.method(), request.uri(), req.scene, req.view);
        let heart_beat = req.heart_beat();
        match self.render(id, &req) {
            Ok(png) => {
                info!("[{id}] rendered {} ({} bytes)", request.uri().path(), png.len());
                WorkerReply::ok(version, PNG_MIME, png).with_heart_beat(heart_beat)
            }
            Err(e) => {
                warn!("[{id}] failed {}: {e}", request.uri());
                WorkerReply::bad_request(version, e.to_string()).with_heart_beat(heart_beat)
            }
        }
    }

    fn render(&mut self, id: RequestId, req: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let scene = self.scenes.resolve(&req.scene)?;
        let target = ViewTarget::from_request(req, scene, self.config.aa_scale, self.config.max_dimension)?;

        let changes = apply(&mut self.state, &target, &mut self.engine, &mut self.gl, self.config.aa_scale)?;
        debug!("[{id}] pushed {changes:?}");

        let outcome = pump_until_idle(&mut self.engine, self.config.pump_slice, self.config.pump_deadline);
        if !outcome.finished {
            warn!("[{id}] rendering before all tiles arrived");
        }

        self.engine.render()?;
        let image = self.gl.read_pixels()?;
        Ok(encode_png(&image)?)
    }
}

/// HTTP/1.0 clients get 1.0 back; everything else is answered as 1.1.
fn reply_version(version: Version) -> Version {
    if version == Version::HTTP_10 {
        Version::HTTP_10
    } else {
        Version::HTTP_11
    }
}
