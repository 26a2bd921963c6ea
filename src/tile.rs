//! Slippy-map tile addressing.
//!
//! Conversions between `(z, x, y)` tile coordinates and geographic `(lng, lat)` in the
//! Web-Mercator projection, see <http://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>.

use std::f64::consts::PI;

use crate::errors::RenderError;

/// Web-Mercator latitude limit in degrees.
pub const MAX_LAT: f64 = 85.05112878;
pub const MIN_LAT: f64 = -MAX_LAT;
pub const MAX_LNG: f64 = 180.0;
pub const MIN_LNG: f64 = -180.0;

/// Deepest zoom level accepted for tile requests.
pub const MAX_TILE_ZOOM: u32 = 22;

/// Logical edge length of a tile in pixels (before density).
pub const TILE_SIZE: u32 = 256;

/// A validated tile address. `x` and `y` are always below `2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Result<Self, RenderError> {
        if z > MAX_TILE_ZOOM {
            return Err(RenderError::TileOutOfRange { z, x, y });
        }
        let n = 1u64 << z;
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(RenderError::TileOutOfRange { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Geographic center of the tile as `(lng, lat)` in degrees.
    pub fn center(&self) -> (f64, f64) {
        let n = 2.0_f64.powi(self.z as i32);
        let lng = (f64::from(self.x) + 0.5) / n * 360.0 - 180.0;
        let lat_rad = (PI * (1.0 - 2.0 * (f64::from(self.y) + 0.5) / n)).sinh().atan();
        (lng, lat_rad.to_degrees())
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Tile containing `(lng, lat)` at `zoom`. Inputs outside the projection are clamped first.
pub fn lng_lat_to_tile(lng: f64, lat: f64, zoom: u32) -> TileCoord {
    let zoom = zoom.min(MAX_TILE_ZOOM);
    let (lng, lat) = clamp_lng_lat(lng, lat);
    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (1u64 << zoom) - 1;

    let lat_rad = lat.to_radians();
    let x = ((lng + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    // lng == 180 and lat == MIN_LAT land exactly on the far edge
    let x = (x.max(0.0) as u64).min(max_index) as u32;
    let y = (y.max(0.0) as u64).min(max_index) as u32;

    TileCoord { z: zoom, x, y }
}

/// Clamps a position into the range the projection can represent.
pub fn clamp_lng_lat(lng: f64, lat: f64) -> (f64, f64) {
    (lng.clamp(MIN_LNG, MAX_LNG), lat.clamp(MIN_LAT, MAX_LAT))
}
