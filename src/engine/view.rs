//! The worker's view state and the minimal diff pushed to the engine.
//!
//! [`ViewState`] mirrors exactly what the engine was last told. A request is first resolved into
//! a [`ViewTarget`]; [`apply`] then walks the categories in a fixed order (scene, size, position,
//! zoom, tilt, rotation) and only issues the engine calls whose value differs from the state.

use bitflags::bitflags;
use log::debug;

use crate::engine::scene_cache::ResolvedScene;
use crate::errors::RenderError;
use crate::render::backend::{GlContext, MapEngine, SurfaceSize};
use crate::request::RenderRequest;
use crate::tile::clamp_lng_lat;

bitflags! {
    /// Categories touched by one [`apply`].
    pub struct ViewChanges: u8 {
        const SCENE    = 0b0000_0001;
        const SIZE     = 0b0000_0010;
        const POSITION = 0b0000_0100;
        const ZOOM     = 0b0000_1000;
        const TILT     = 0b0001_0000;
        const ROTATION = 0b0010_0000;
    }
}

/// Engine-visible parameters as last pushed.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub scene_id: String,
    /// Physical width (logical width times density)
    pub width: u32,
    /// Physical height (logical height times density)
    pub height: u32,
    pub density: f32,
    pub lng: f64,
    pub lat: f64,
    pub zoom: f32,
    pub tilt_deg: f32,
    pub rotation_deg: f32,
}

impl ViewState {
    pub fn new<S: Into<String>>(scene_id: S, width: u32, height: u32) -> Self {
        Self {
            scene_id: scene_id.into(),
            width,
            height,
            density: 1.0,
            lng: 0.0,
            lat: 0.0,
            zoom: 0.0,
            tilt_deg: 0.0,
            rotation_deg: 0.0,
        }
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width, self.height)
    }
}

/// Parameters a request wants the engine to show.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTarget {
    pub scene: ResolvedScene,
    pub width: u32,
    pub height: u32,
    pub density: f32,
    pub lng: f64,
    pub lat: f64,
    pub zoom: f32,
    pub tilt_deg: f32,
    pub rotation_deg: f32,
}

impl ViewTarget {
    /// Resolves `request` into physical engine parameters.
    ///
    /// Fails when the physical size (logical size times density) is below one pixel or exceeds
    /// `max_dimension`, or when scaling it by `aa_scale` overflows a `u32`.
    pub fn from_request(
        request: &RenderRequest,
        scene: ResolvedScene,
        aa_scale: f32,
        max_dimension: u32,
    ) -> Result<Self, RenderError> {
        let density = request.view.density();
        let (width, height) = request.view.logical_size();
        let (lng, lat, zoom) = request.view.position();
        let (lng, lat) = clamp_lng_lat(lng, lat);

        let physical = |field: &'static str, logical: u32| {
            let px = logical as f32 * density;
            if px < 1.0 || px > max_dimension as f32 || px * aa_scale > u32::MAX as f32 {
                return Err(RenderError::bad_number(field, &logical.to_string()));
            }
            Ok(px as u32)
        };

        Ok(Self {
            scene,
            width: physical("width", width)?,
            height: physical("height", height)?,
            density,
            lng,
            lat,
            zoom,
            tilt_deg: request.tilt_deg,
            rotation_deg: request.rotation_deg,
        })
    }
}

/// Pushes the difference between `state` and `target` to the engine and GL context.
///
/// Every engine call is followed by the matching state update, so a failure part-way leaves
/// `state` equal to what the engine has actually accepted.
pub fn apply<E, G>(
    state: &mut ViewState,
    target: &ViewTarget,
    engine: &mut E,
    gl: &mut G,
    aa_scale: f32,
) -> Result<ViewChanges, RenderError>
where
    E: MapEngine + ?Sized,
    G: GlContext + ?Sized,
{
    let mut changes = ViewChanges::empty();

    if target.scene.id != state.scene_id {
        debug!("loading scene {}", target.scene.path);
        engine.load_scene(&target.scene.path)?;
        state.scene_id = target.scene.id.clone();
        changes |= ViewChanges::SCENE;
    }

    let scale = target.density * aa_scale;
    if (target.width, target.height) != (state.width, state.height) || scale != engine.pixel_scale() {
        if scale != engine.pixel_scale() {
            engine.set_pixel_scale(scale);
        }
        let surface = SurfaceSize::new(target.width, target.height);
        let aa = surface.scaled(aa_scale);
        engine.resize(aa.width, aa.height);
        gl.resize(surface)?;

        state.width = target.width;
        state.height = target.height;
        state.density = target.density;
        changes |= ViewChanges::SIZE;
    }

    if (target.lng, target.lat) != (state.lng, state.lat) {
        engine.set_position(target.lng, target.lat);
        state.lng = target.lng;
        state.lat = target.lat;
        changes |= ViewChanges::POSITION;
    }

    if target.zoom != state.zoom {
        engine.set_zoom(target.zoom);
        state.zoom = target.zoom;
        changes |= ViewChanges::ZOOM;
    }

    if target.tilt_deg != state.tilt_deg {
        engine.set_tilt(target.tilt_deg.to_radians());
        state.tilt_deg = target.tilt_deg;
        changes |= ViewChanges::TILT;
    }

    if target.rotation_deg != state.rotation_deg {
        engine.set_rotation(target.rotation_deg.to_radians());
        state.rotation_deg = target.rotation_deg;
        changes |= ViewChanges::ROTATION;
    }

    Ok(changes)
}
