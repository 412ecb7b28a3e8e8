use std::{error, result};

use async_trait::async_trait;
use model::{
    coordinate::{Boundary, Coordinate},
    marker::LightMarker,
    WithDistance, WithId,
};
use utility::id::Id;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("row not found")]
    NotFound,
    #[error(transparent)]
    Other(Box<dyn error::Error + Send + Sync>),
}

pub type Result<T> = result::Result<T, DatabaseError>;

#[async_trait]
pub trait MarkerRepo {
    /// Fetches a top level marker together with all of its sub markers.
    async fn get(&mut self, id: &Id<LightMarker>) -> Result<WithId<LightMarker>>;

    /// Top level markers inside the viewport, see [`Boundary::contains`] for the
    /// exact predicate.
    async fn find_by_boundaries(
        &mut self,
        boundary: &Boundary,
    ) -> Result<Vec<WithId<LightMarker>>>;

    /// Top level markers within `radius_km`, closest first.
    async fn find_nearby(
        &mut self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<WithDistance<WithId<LightMarker>>>>;

    /// The closest top level marker within `max_distance_km`. On equal distance
    /// the marker reported first wins.
    async fn find_nearest_marker(
        &mut self,
        center: &Coordinate,
        max_distance_km: f64,
    ) -> Result<Option<WithDistance<WithId<LightMarker>>>>;

    /// Stores a new top level marker. Sub markers of `marker` are not stored.
    async fn insert(&mut self, marker: LightMarker) -> Result<WithId<LightMarker>>;

    /// Appends `marker` to the sub markers of the top level marker `head` and
    /// returns the stored sub marker.
    async fn add_sub_marker(
        &mut self,
        head: &Id<LightMarker>,
        marker: LightMarker,
    ) -> Result<WithId<LightMarker>>;

    async fn count_top_level(&mut self) -> Result<u64>;
}

pub trait DatabaseOperations: MarkerRepo {}

#[async_trait]
pub trait DatabaseTransaction: DatabaseOperations {
    /// Serializes merge decisions. Held until the transaction ends, so no other
    /// transaction can look up a nearest marker in between.
    async fn lock_for_merge(&mut self) -> Result<()>;

    async fn commit(self) -> Result<()>;
}

pub trait DatabaseAutocommit: DatabaseOperations {}

/// trait to implement a marker database.
/// multiple concurrent accesses should be possible by e.g. cloning the database object.
#[async_trait]
pub trait Database: Clone + Send + Sync + Sized {
    type Transaction: DatabaseTransaction + Send;
    type Autocommit: DatabaseAutocommit + Send;

    async fn transaction(&self) -> Result<Self::Transaction>;

    fn auto(&self) -> Self::Autocommit;
}
