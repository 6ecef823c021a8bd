//! Component B — Grid Projection.
//!
//! Pure functions mapping WGS84 lat/lon to the integer tile grid, and tiles
//! to chunk coordinates and in-chunk offsets. All math is double precision;
//! round-trip error is bounded to <= 1 tile at Boston latitudes.
//!
//! Two distinct Earth radii are used on purpose, matching the source
//! system: the Mercator projection radius (6,378,137 m, WGS84 equatorial)
//! and the haversine mean radius (6,371,000 m). Callers must not assume
//! these are interchangeable.

/// WGS84 equatorial radius used by the Mercator projection, in meters.
pub const MERCATOR_EARTH_RADIUS_M: f64 = 6_378_137.0;
/// Mean Earth radius used by the haversine distance formula, in meters.
pub const HAVERSINE_EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Side length of one tile, in meters.
pub const TILE_SIZE_M: f64 = 10.0;

/// Maximum latitude the Mercator projection can represent.
pub const MAX_LAT: f64 = 85.05112878;

/// Clamps `lat` to the representable Mercator range.
#[inline]
fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(-MAX_LAT, MAX_LAT)
}

/// Projects `(lat, lon)` to integer tile coordinates `(x, y)`.
///
/// The grid has a top-left origin: `y` grows southward. Tile `(x, y)`
/// covers one `TILE_SIZE_M` x `TILE_SIZE_M` square of the Mercator plane.
pub fn lat_lon_to_tile(lat: f64, lon: f64) -> (i64, i64) {
    let lat = clamp_lat(lat);
    let r = MERCATOR_EARTH_RADIUS_M;
    let mx = lon * std::f64::consts::PI * r / 180.0;
    let my = ((90.0 + lat) * std::f64::consts::PI / 360.0).tan().ln() * r;

    let x = ((mx + std::f64::consts::PI * r) / TILE_SIZE_M).floor() as i64;
    let y = ((std::f64::consts::PI * r - my) / TILE_SIZE_M).floor() as i64;
    (x, y)
}

/// Inverse of [`lat_lon_to_tile`]: the lat/lon of a tile's center.
pub fn tile_center_lat_lon(x: i64, y: i64) -> (f64, f64) {
    let r = MERCATOR_EARTH_RADIUS_M;
    let mx = (x as f64 + 0.5) * TILE_SIZE_M - std::f64::consts::PI * r;
    let my = std::f64::consts::PI * r - (y as f64 + 0.5) * TILE_SIZE_M;

    let lon = mx * 180.0 / (std::f64::consts::PI * r);
    let lat = (my / r).exp().atan() * 2.0 * 180.0 / std::f64::consts::PI - 90.0;
    (lat, lon)
}

/// Chunk coordinate containing tile `(x, y)`. Uses arithmetic right shift so
/// negative tile indices map consistently to negative chunk indices.
#[inline(always)]
pub fn chunk_of(x: i64, y: i64) -> (i64, i64) {
    (x >> 8, y >> 8)
}

/// In-chunk offset of tile `(x, y)`, computed in unsigned arithmetic so
/// negative coordinates wrap correctly within the 0..255 chunk-local range.
#[inline(always)]
pub fn offset_of(x: i64, y: i64) -> u32 {
    let lx = (x & 0xFF) as u32;
    let ly = (y & 0xFF) as u32;
    (ly << 8) | lx
}

/// Great-circle distance between two lat/lon points, in meters.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let r = HAVERSINE_EARTH_RADIUS_M;
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    r * c
}

/// The absolute tile coordinates for chunk `(cx, cy)` offset `o`.
pub fn tile_for_chunk_offset(cx: i64, cy: i64, o: u32) -> (i64, i64) {
    let lx = (o & 0xFF) as i64;
    let ly = (o >> 8) as i64;
    (cx * 256 + lx, cy * 256 + ly)
}
