use chrono::{DateTime, TimeZone, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use utility::id::{HasId, Id};

use crate::{
    account::Account,
    coordinate::{Boundary, Coordinate},
    ExampleData, WithId,
};

/// A reported sighting. Reports which land close to an existing marker are
/// attached to it as sub markers, turning it into the head of a cluster.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LightMarker {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub owner: Option<Id<Account>>,
    pub reported_at: DateTime<Utc>,
    pub sub_markers: Vec<WithId<LightMarker>>,
}

impl HasId for LightMarker {
    type IdType = String;
}

impl LightMarker {
    pub fn new(coordinate: Coordinate) -> Self {
        Self::reported_at(coordinate, Utc::now())
    }

    pub fn reported_at<Tz: TimeZone>(
        coordinate: Coordinate,
        reported_at: DateTime<Tz>,
    ) -> Self {
        Self {
            coordinate,
            owner: None,
            reported_at: reported_at.with_timezone(&Utc),
            sub_markers: vec![],
        }
    }

    pub fn owned_by(mut self, owner: Id<Account>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.owner.is_none()
    }

    pub fn is_cluster(&self) -> bool {
        !self.sub_markers.is_empty()
    }

    /// Number of reports represented by this marker, itself included.
    pub fn sightings(&self) -> usize {
        1 + self.sub_markers.len()
    }

    pub fn add_sub_marker(&mut self, marker: WithId<LightMarker>) {
        self.sub_markers.push(marker);
    }

    pub fn within(&self, boundary: &Boundary) -> bool {
        boundary.contains(&self.coordinate)
    }

    pub fn distance_km(&self, coordinate: &Coordinate) -> f64 {
        self.coordinate.distance_km(coordinate)
    }
}

impl ExampleData for LightMarker {
    fn example_data() -> Self {
        let reported_at = DateTime::parse_from_rfc3339("2024-08-01T21:30:00+02:00")
            .map(|time| time.with_timezone(&Utc))
            .unwrap_or_default();
        let mut marker = LightMarker::reported_at(Coordinate::example_data(), reported_at)
            .owned_by(Id::new("stargazer".to_owned()));
        marker.add_sub_marker(WithId::new(
            Id::new("1b7f0c6e".to_owned()),
            LightMarker::reported_at(Coordinate::new(54.3234, 10.1229), reported_at),
        ));
        marker
    }
}
