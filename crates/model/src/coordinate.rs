use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::geo::haversine_distance;

use crate::ExampleData;

/// A point on earth in degrees. Ranges are not enforced on construction, use
/// [`Coordinate::is_valid`] where input comes from outside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

impl ExampleData for Coordinate {
    fn example_data() -> Self {
        Coordinate::new(54.3233, 10.1228)
    }
}

/// Rectangular viewport spanned by two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    pub north_east: Coordinate,
    pub south_west: Coordinate,
}

impl Boundary {
    pub fn new(north_east: Coordinate, south_west: Coordinate) -> Self {
        Self {
            north_east,
            south_west,
        }
    }

    /// Latitude has to lie between south west and north east. Longitude is
    /// compared the other way round: between the north east longitude (lower
    /// bound) and the south west longitude (upper bound). Stored queries rely on
    /// that convention, so the database filter mirrors it exactly.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.latitude >= self.south_west.latitude
            && coordinate.latitude <= self.north_east.latitude
            && coordinate.longitude >= self.north_east.longitude
            && coordinate.longitude <= self.south_west.longitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Boundary {
        Boundary::new(Coordinate::new(10.0, 10.0), Coordinate::new(0.0, 0.0))
    }

    #[test]
    fn literal_longitude_order_excludes_regular_viewport() {
        // latitude matches, but 5 is not within [10, 0]
        assert!(!viewport().contains(&Coordinate::new(5.0, 5.0)));
    }

    #[test]
    fn swapped_longitudes_include_inner_point() {
        let boundary =
            Boundary::new(Coordinate::new(10.0, 0.0), Coordinate::new(0.0, 10.0));
        assert!(boundary.contains(&Coordinate::new(5.0, 5.0)));
    }

    #[test]
    fn bounds_are_inclusive() {
        let boundary =
            Boundary::new(Coordinate::new(10.0, 0.0), Coordinate::new(0.0, 10.0));
        assert!(boundary.contains(&Coordinate::new(0.0, 0.0)));
        assert!(boundary.contains(&Coordinate::new(10.0, 10.0)));
        assert!(boundary.contains(&Coordinate::new(10.0, 0.0)));
    }

    #[test]
    fn outside_points_are_excluded() {
        let boundary =
            Boundary::new(Coordinate::new(10.0, 0.0), Coordinate::new(0.0, 10.0));
        assert!(!boundary.contains(&Coordinate::new(10.5, 5.0)));
        assert!(!boundary.contains(&Coordinate::new(-0.1, 5.0)));
        assert!(!boundary.contains(&Coordinate::new(5.0, 10.1)));
        assert!(!boundary.contains(&Coordinate::new(5.0, -0.1)));
    }

    #[test]
    fn coordinate_range_check() {
        assert!(Coordinate::new(90.0, -180.0).is_valid());
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 180.5).is_valid());
    }
}
