use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::warn;
use model::{coordinate::Coordinate, marker::LightMarker, WithDistance, WithId};
use sqlx::prelude::FromRow;
use utility::id::Id;

use super::DatabaseRow;

/// A top level marker or a sub marker.
/// Table: markers
#[derive(Debug, Clone, FromRow)]
pub struct MarkerRow {
    pub id: String,
    pub parent_id: Option<String>,
    pub owner_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub reported_at: DateTime<Utc>,
    pub seq: i64,
}

/// A marker row joined with the distance of its cluster head to a search center.
#[derive(Debug, Clone, FromRow)]
pub struct NearbyMarkerRow {
    #[sqlx(flatten)]
    pub marker: MarkerRow,
    pub distance: f64,
}

impl DatabaseRow for MarkerRow {
    type Model = LightMarker;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        LightMarker {
            coordinate: Coordinate::new(self.latitude, self.longitude),
            owner: self.owner_id.map(Id::new),
            reported_at: self.reported_at,
            sub_markers: vec![],
        }
    }
}

/// Assembles rows of heads and sub markers into clusters.
///
/// Heads keep the order in which they appear in `rows`, sub markers are
/// ordered by their sequence number. Sub markers whose head is missing from
/// `rows` are dropped.
pub fn gather_clusters(rows: Vec<MarkerRow>) -> Vec<WithId<LightMarker>> {
    let (heads, mut subs): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|row| row.parent_id.is_none());
    subs.sort_by_key(|row| row.seq);

    let mut clusters: IndexMap<String, WithId<LightMarker>> = IndexMap::new();
    for head in heads {
        clusters.insert(head.id.clone(), super::with_id(head));
    }
    for sub in subs {
        let parent_id = sub.parent_id.clone().unwrap_or_default();
        match clusters.get_mut(&parent_id) {
            Some(head) => head.content.add_sub_marker(super::with_id(sub)),
            None => warn!(
                "sub marker {} references marker {} which was not loaded.",
                sub.id, parent_id
            ),
        }
    }
    clusters.into_values().collect()
}

/// Like [`gather_clusters`], keeping the distance of every head.
pub fn gather_nearby(
    rows: Vec<NearbyMarkerRow>,
) -> Vec<WithDistance<WithId<LightMarker>>> {
    let distances = rows
        .iter()
        .filter(|row| row.marker.parent_id.is_none())
        .map(|row| (row.marker.id.clone(), row.distance))
        .collect::<IndexMap<_, _>>();
    gather_clusters(rows.into_iter().map(|row| row.marker).collect())
        .into_iter()
        .map(|cluster| {
            let distance = distances
                .get(cluster.id.raw_ref::<str>())
                .copied()
                .unwrap_or_default();
            WithDistance::new(distance, cluster)
        })
        .collect()
}
