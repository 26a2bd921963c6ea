//! Parsing of inbound HTTP requests into render requests.
//!
//! A request either names an explicit view through its query string
//! (`width`, `height`, `lat`, `lon`, `zoom`) or addresses a slippy-map tile through its path
//! (`/{z}/{x}/{y}.png`). The scene comes from `?scene=<url>` or, when absent, from the body.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::RenderError;
use crate::tile::{TileCoord, TILE_SIZE};

/// Path answered directly as a health check.
pub const HEALTH_CHECK_PATH: &str = "/check";

lazy_static! {
    static ref TILE_PATH: Regex = Regex::new(r"/(\d+)/(\d+)/(\d+)\.png").expect("valid tile path pattern");
}

/// Where the scene of a request comes from.
#[derive(Clone, PartialEq)]
pub enum SceneSource {
    /// Scene file referenced by URL (or path) in the query string
    Url(String),
    /// Scene YAML posted as the request body
    Inline(Vec<u8>),
}

impl std::fmt::Debug for SceneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            SceneSource::Inline(body) => f.debug_struct("Inline").field("len", &body.len()).finish(),
        }
    }
}

/// The view a request asks for, before it is turned into engine parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewRequest {
    Explicit {
        width: u32,
        height: u32,
        density: f32,
        lng: f64,
        lat: f64,
        zoom: f32,
    },
    Tile { tile: TileCoord, density: f32 },
}

impl ViewRequest {
    pub fn density(&self) -> f32 {
        match self {
            ViewRequest::Explicit { density, .. } | ViewRequest::Tile { density, .. } => *density,
        }
    }

    /// Logical `(width, height)` of the image, before density.
    pub fn logical_size(&self) -> (u32, u32) {
        match self {
            ViewRequest::Explicit { width, height, .. } => (*width, *height),
            ViewRequest::Tile { .. } => (TILE_SIZE, TILE_SIZE),
        }
    }

    /// Map center as `(lng, lat)` and zoom level.
    pub fn position(&self) -> (f64, f64, f32) {
        match self {
            ViewRequest::Explicit { lng, lat, zoom, .. } => (*lng, *lat, *zoom),
            ViewRequest::Tile { tile, .. } => {
                let (lng, lat) = tile.center();
                (lng, lat, tile.z as f32)
            }
        }
    }
}

/// A validated render request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub scene: SceneSource,
    pub view: ViewRequest,
    pub tilt_deg: f32,
    pub rotation_deg: f32,
}

impl RenderRequest {
    /// Worker affinity hint for the upstream proxy: the scene URL, or the size of an inline body.
    pub fn heart_beat(&self) -> String {
        match &self.scene {
            SceneSource::Url(url) => url.clone(),
            SceneSource::Inline(body) => body.len().to_string(),
        }
    }
}

/// The heart-beat of `request` as soon as its scene is known, even when its view is invalid.
///
/// `None` for health checks and requests without a scene.
pub fn heart_beat_hint<B: AsRef<[u8]>>(request: &http::Request<B>) -> Option<String> {
    if request.uri().path() == HEALTH_CHECK_PATH {
        return None;
    }

    let body = request.body().as_ref();
    match Query::parse(request.uri().query()).get("scene") {
        Some(url) => Some(url.to_string()),
        None if !body.is_empty() => Some(body.len().to_string()),
        None => None,
    }
}

/// Outcome of parsing one HTTP message.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    HealthCheck,
    Render(RenderRequest),
}

/// Query string as a multimap. Only the first value of a key is ever consulted.
#[derive(Debug, Default)]
struct Query(HashMap<String, Vec<String>>);

impl Query {
    fn parse(raw: Option<&str>) -> Self {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(raw) = raw {
            for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
                map.entry(k.into_owned()).or_default().push(v.into_owned());
            }
        }
        Query(map)
    }

    /// First value of `key`, treating an empty value as missing.
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Parses an HTTP request into a [`ParsedMessage`].
pub fn parse<B: AsRef<[u8]>>(request: &http::Request<B>) -> Result<ParsedMessage, RenderError> {
    let path = request.uri().path();
    if path == HEALTH_CHECK_PATH {
        return Ok(ParsedMessage::HealthCheck);
    }

    let query = Query::parse(request.uri().query());
    let body = request.body().as_ref();

    let scene = match query.get("scene") {
        Some(url) => SceneSource::Url(url.to_string()),
        None if !body.is_empty() => SceneSource::Inline(body.to_vec()),
        None => return Err(RenderError::MissingScene),
    };

    let view = parse_view(&query, path)?;

    let tilt_deg = optional_f32(&query, "tilt")?.unwrap_or(0.0);
    let rotation_deg = optional_f32(&query, "rotation")?.unwrap_or(0.0);

    Ok(ParsedMessage::Render(RenderRequest { scene, view, tilt_deg, rotation_deg }))
}

fn parse_view(query: &Query, path: &str) -> Result<ViewRequest, RenderError> {
    let density = optional_f32(query, "density")?.map_or(1.0, |d| d.max(1.0));

    let explicit = (
        query.get("width"),
        query.get("height"),
        query.get("lat"),
        query.get("lon"),
        query.get("zoom"),
    );
    if let (Some(width), Some(height), Some(lat), Some(lon), Some(zoom)) = explicit {
        let zoom = parse_f32("zoom", zoom)?;
        if zoom < 0.0 {
            return Err(RenderError::bad_number("zoom", &zoom.to_string()));
        }
        return Ok(ViewRequest::Explicit {
            width: parse_dimension("width", width)?,
            height: parse_dimension("height", height)?,
            density,
            lng: parse_f64("lon", lon)?,
            lat: parse_f64("lat", lat)?,
            zoom,
        });
    }

    let caps = TILE_PATH.captures(path).ok_or(RenderError::InsufficientView)?;
    let z = parse_u32("z", &caps[1])?;
    let x = parse_u32("x", &caps[2])?;
    let y = parse_u32("y", &caps[3])?;

    Ok(ViewRequest::Tile { tile: TileCoord::new(z, x, y)?, density })
}

fn optional_f32(query: &Query, field: &'static str) -> Result<Option<f32>, RenderError> {
    query.get(field).map(|v| parse_f32(field, v)).transpose()
}

fn parse_f32(field: &'static str, value: &str) -> Result<f32, RenderError> {
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RenderError::bad_number(field, value)),
    }
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, RenderError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RenderError::bad_number(field, value)),
    }
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, RenderError> {
    value.parse::<u32>().map_err(|_| RenderError::bad_number(field, value))
}

fn parse_dimension(field: &'static str, value: &str) -> Result<u32, RenderError> {
    match parse_u32(field, value)? {
        0 => Err(RenderError::bad_number(field, value)),
        v => Ok(v),
    }
}
