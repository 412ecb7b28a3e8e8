use log::{debug, info, warn};
use model::{
    coordinate::{Boundary, Coordinate},
    marker::LightMarker,
    WithDistance, WithId,
};
use utility::{id::Id, let_also::LetAlso};

use crate::{
    config::MarkerConfig,
    database::{Database, DatabaseTransaction, MarkerRepo},
    identity::IdentityProvider,
    RequestResult,
};

/// Marker operations on behalf of a single caller. Obtained from
/// [`crate::server::Server::client`], cheap to create per request.
#[derive(Debug, Clone)]
pub struct Client<D, I>
where
    D: Database + Send + Sync + Sized + 'static,
    I: IdentityProvider,
{
    database: D,
    identity: I,
    config: MarkerConfig,
}

impl<D, I> Client<D, I>
where
    D: Database,
    I: IdentityProvider,
{
    pub(crate) fn new(database: D, identity: I, config: MarkerConfig) -> Self {
        Self {
            database,
            identity,
            config,
        }
    }

    /// Ingests a newly reported marker.
    ///
    /// The marker is attributed to the authenticated account, if any. If an
    /// existing top level marker lies within the merge distance, the report is
    /// appended to its sub markers and the updated cluster is returned.
    /// Otherwise the report is stored as a new top level marker.
    ///
    /// Lookup and write happen in one transaction which holds the merge lock,
    /// so concurrent reports at the same spot end up in one cluster.
    pub async fn add_discrete_marker(
        &self,
        candidate: LightMarker,
    ) -> RequestResult<WithId<LightMarker>> {
        let mut candidate = candidate;
        if candidate.is_cluster() {
            warn!(
                "dropping {} sub markers of a freshly reported marker.",
                candidate.sub_markers.len()
            );
            candidate.sub_markers.clear();
        }

        match self.identity.authenticated_account().await {
            Some(account) => candidate.owner = Some(account.id),
            None => debug!("no authenticated account, reporting anonymously."),
        }

        let mut tx = self.database.transaction().await?;
        tx.lock_for_merge().await?;

        let nearest = tx
            .find_nearest_marker(&candidate.coordinate, self.config.merge_distance_km)
            .await?;
        let result = match nearest {
            Some(WithDistance {
                distance_km,
                content: head,
            }) => {
                info!(
                    "merging report at ({}, {}) into marker {} ({:.1} m away).",
                    candidate.coordinate.latitude,
                    candidate.coordinate.longitude,
                    head.id,
                    distance_km * 1000.0
                );
                tx.add_sub_marker(&head.id, candidate).await?;
                tx.get(&head.id).await?
            }
            None => {
                let marker = tx.insert(candidate).await?;
                info!("created marker {}.", marker.id);
                marker
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    /// Top level markers inside the viewport spanned by both corners.
    pub async fn find_by_boundaries(
        &self,
        north_east: Coordinate,
        south_west: Coordinate,
    ) -> RequestResult<Vec<WithId<LightMarker>>> {
        self.database
            .auto()
            .find_by_boundaries(&Boundary::new(north_east, south_west))
            .await?
            .let_owned(Ok)
    }

    pub async fn find_nearby(
        &self,
        center: Coordinate,
        radius_km: f64,
    ) -> RequestResult<Vec<WithDistance<WithId<LightMarker>>>> {
        Ok(self.database.auto().find_nearby(&center, radius_km).await?)
    }

    pub async fn get_marker(
        &self,
        id: Id<LightMarker>,
    ) -> RequestResult<WithId<LightMarker>> {
        Ok(self.database.auto().get(&id).await?)
    }

    pub async fn count_markers(&self) -> RequestResult<u64> {
        Ok(self.database.auto().count_top_level().await?)
    }
}
