// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-point geographic coordinates.
//!
//! Coordinates are stored as signed nanodegrees in `i64`. Fixed-point keeps
//! equality, ordering, and hashing exact, which the duplicate detector and
//! canonical graph hashing depend on. Floating-point degrees exist only at
//! the API boundary.

/// Nanodegrees per degree.
pub const NANOS_PER_DEGREE: i64 = 1_000_000_000;

const LAT_MAX_NANOS: i64 = 90 * NANOS_PER_DEGREE;
const LON_MAX_NANOS: i64 = 180 * NANOS_PER_DEGREE;

/// A latitude/longitude pair in nanodegrees.
///
/// Invariants
/// - `lat` is within `±90°`, `lon` within `±180°`; constructors reject
///   anything outside that range.
/// - Two coordinates compare equal iff their nanodegree values are equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatLon {
    lat: i64,
    lon: i64,
}

impl LatLon {
    /// Constructs a coordinate from nanodegree components.
    ///
    /// Returns `None` when either component is out of range.
    #[must_use]
    pub const fn from_nanos(lat: i64, lon: i64) -> Option<Self> {
        if lat < -LAT_MAX_NANOS || lat > LAT_MAX_NANOS || lon < -LON_MAX_NANOS || lon > LON_MAX_NANOS
        {
            return None;
        }
        Some(Self { lat, lon })
    }

    /// Constructs a coordinate from floating-point degrees, rounding to the
    /// nearest nanodegree.
    ///
    /// Returns `None` for non-finite or out-of-range input.
    #[must_use]
    pub fn from_degrees(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let per_degree = NANOS_PER_DEGREE as f64;
        #[allow(clippy::cast_possible_truncation)]
        let lat_nanos = (lat * per_degree).round() as i64;
        #[allow(clippy::cast_possible_truncation)]
        let lon_nanos = (lon * per_degree).round() as i64;
        Self::from_nanos(lat_nanos, lon_nanos)
    }

    /// Latitude in nanodegrees.
    #[must_use]
    pub const fn lat_nanos(self) -> i64 {
        self.lat
    }

    /// Longitude in nanodegrees.
    #[must_use]
    pub const fn lon_nanos(self) -> i64 {
        self.lon
    }

    /// Latitude in degrees (boundary conversion, lossy).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn lat_degrees(self) -> f64 {
        self.lat as f64 / NANOS_PER_DEGREE as f64
    }

    /// Longitude in degrees (boundary conversion, lossy).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn lon_degrees(self) -> f64 {
        self.lon as f64 / NANOS_PER_DEGREE as f64
    }

    /// Canonical 16-byte little-endian encoding (lat, then lon).
    ///
    /// Feeds the canonical hashes; changing this encoding changes every
    /// derived digest and must be treated as a breaking change.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        let lat = self.lat.to_le_bytes();
        let lon = self.lon.to_le_bytes();
        let mut out = [0u8; 16];
        let mut i = 0;
        while i < 8 {
            out[i] = lat[i];
            out[i + 8] = lon[i];
            i += 1;
        }
        out
    }
}

impl core::fmt::Display for LatLon {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({:.7}, {:.7})", self.lat_degrees(), self.lon_degrees())
    }
}
