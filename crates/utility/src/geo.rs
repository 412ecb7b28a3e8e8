pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Axis aligned box in degrees, used to pre-filter radius searches.
///
/// The longitude bounds may leave [-180, 180] when the box crosses the
/// antimeridian, use [`BoundingBox::longitude_ranges`] to query stored points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Smallest box containing every point within `radius_km` of the center.
    ///
    /// Near the poles, or when the radius spans half the globe, the full
    /// longitude range is used.
    pub fn around(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        let angular = radius_km / EARTH_RADIUS_KM;
        let lat_rad = latitude.to_radians();

        let min_latitude = (lat_rad - angular).to_degrees();
        let max_latitude = (lat_rad + angular).to_degrees();

        let cos_lat = lat_rad.cos();
        let delta = if cos_lat.abs() < 1e-9 {
            180.0
        } else {
            (angular / cos_lat).to_degrees().abs()
        };
        let (min_longitude, max_longitude) = if delta >= 180.0 {
            (-180.0, 180.0)
        } else {
            (longitude - delta, longitude + delta)
        };

        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    /// Longitude intervals within [-180, 180] covered by the box. A box crossing
    /// the antimeridian is split in two, otherwise both intervals are equal.
    pub fn longitude_ranges(&self) -> [(f64, f64); 2] {
        if self.min_longitude < -180.0 {
            [(self.min_longitude + 360.0, 180.0), (-180.0, self.max_longitude)]
        } else if self.max_longitude > 180.0 {
            [(self.min_longitude, 180.0), (-180.0, self.max_longitude - 360.0)]
        } else {
            [(self.min_longitude, self.max_longitude); 2]
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && self
                .longitude_ranges()
                .iter()
                .any(|(min, max)| (*min..=*max).contains(&longitude))
    }
}

/// Great circle distance in kilometers.
pub fn haversine_distance(
    latitude_1: f64,
    longitude_1: f64,
    latitude_2: f64,
    longitude_2: f64,
) -> f64 {
    let lat1_rad = latitude_1.to_radians();
    let lat2_rad = latitude_2.to_radians();

    let dlat = lat2_rad - lat1_rad;
    let dlon = (longitude_2 - longitude_1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
