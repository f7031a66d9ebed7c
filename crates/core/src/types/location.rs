//! Geographic coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors that can occur when constructing a [`Location`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// Latitude is not a finite value in [-90, 90].
    #[error("latitude must be between -90 and 90 (got {0})")]
    InvalidLatitude(f64),
    /// Longitude is not a finite value in [-180, 180].
    #[error("longitude must be between -180 and 180 (got {0})")]
    InvalidLongitude(f64),
}

/// A validated latitude/longitude pair in decimal degrees.
///
/// ## Examples
///
/// ```
/// use farmstand_core::Location;
///
/// let portland = Location::new(45.5152, -122.6784).unwrap();
/// let salem = Location::new(44.9429, -123.0351).unwrap();
/// let km = portland.distance_km(&salem);
/// assert!((km - 70.0).abs() < 2.0);
///
/// assert!(Location::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLocation")]
pub struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawLocation {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawLocation> for Location {
    type Error = LocationError;

    fn try_from(raw: RawLocation) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl Location {
    /// Create a location, rejecting out-of-range or non-finite coordinates.
    ///
    /// # Errors
    ///
    /// Returns `LocationError` if either coordinate is malformed.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Haversine great-circle distance to `other`, in kilometers.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        // Clamp guards against a > 1.0 from float error on antipodal points
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_KM * c
    }
}

/// Round a distance to one decimal place for display.
#[must_use]
pub fn display_km(distance_km: f64) -> f64 {
    (distance_km * 10.0).round() / 10.0
}
