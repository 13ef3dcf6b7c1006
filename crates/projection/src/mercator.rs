//! Spherical Web Mercator (EPSG:3857).
//!
//! Forward and inverse formulas on the WGS84 semi-major axis sphere, as used
//! by web map tiles. Latitudes are clamped to the square-world limit.

use std::f64::consts::PI;

/// Semi-major axis of WGS84 (meters), used as the sphere radius.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which the projected world becomes square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Half the projected world width (meters).
pub const ORIGIN_SHIFT: f64 = PI * EARTH_RADIUS;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Geographic degrees to projected meters.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let x = EARTH_RADIUS * lon.to_radians();
        let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    /// Projected meters to geographic degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}
