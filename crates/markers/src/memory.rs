//! Process local marker database. Backs the tests and can be used to run the
//! web server without PostgreSQL.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::debug;
use model::{
    coordinate::{Boundary, Coordinate},
    marker::LightMarker,
    WithDistance, WithId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use utility::id::Id;
use uuid::Uuid;

use crate::database::{
    Database, DatabaseAutocommit, DatabaseError, DatabaseOperations,
    DatabaseTransaction, MarkerRepo, Result,
};

/// Top level markers in reporting order.
#[derive(Debug, Default)]
struct MarkerTable {
    markers: IndexMap<Id<LightMarker>, LightMarker>,
}

impl MarkerTable {
    fn new_id() -> Id<LightMarker> {
        Id::new(Uuid::new_v4().to_string())
    }

    fn get(&self, id: &Id<LightMarker>) -> Result<WithId<LightMarker>> {
        self.markers
            .get(id)
            .map(|marker| WithId::new(id.clone(), marker.clone()))
            .ok_or(DatabaseError::NotFound)
    }

    fn find_by_boundaries(&self, boundary: &Boundary) -> Vec<WithId<LightMarker>> {
        self.markers
            .iter()
            .filter(|(_, marker)| marker.within(boundary))
            .map(|(id, marker)| WithId::new(id.clone(), marker.clone()))
            .collect()
    }

    fn find_nearby(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Vec<WithDistance<WithId<LightMarker>>> {
        let mut nearby = self
            .markers
            .iter()
            .map(|(id, marker)| (marker.distance_km(center), id, marker))
            .filter(|(distance_km, _, _)| *distance_km <= radius_km)
            .collect::<Vec<_>>();
        // stable, so equally distant markers stay in reporting order
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
        nearby
            .into_iter()
            .map(|(distance_km, id, marker)| {
                WithDistance::new(distance_km, WithId::new(id.clone(), marker.clone()))
            })
            .collect()
    }

    /// First of the closest markers within `max_distance_km`.
    fn find_nearest(
        &self,
        center: &Coordinate,
        max_distance_km: f64,
    ) -> Option<WithDistance<WithId<LightMarker>>> {
        self.markers
            .iter()
            .map(|(id, marker)| (marker.distance_km(center), id, marker))
            .filter(|(distance_km, _, _)| *distance_km <= max_distance_km)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(distance_km, id, marker)| {
                WithDistance::new(distance_km, WithId::new(id.clone(), marker.clone()))
            })
    }

    fn insert(&mut self, mut marker: LightMarker) -> WithId<LightMarker> {
        marker.sub_markers.clear();
        let id = Self::new_id();
        self.markers.insert(id.clone(), marker.clone());
        WithId::new(id, marker)
    }

    fn add_sub_marker(
        &mut self,
        head: &Id<LightMarker>,
        mut marker: LightMarker,
    ) -> Result<WithId<LightMarker>> {
        let head = self.markers.get_mut(head).ok_or(DatabaseError::NotFound)?;
        marker.sub_markers.clear();
        let sub_marker = WithId::new(Self::new_id(), marker);
        head.add_sub_marker(sub_marker.clone());
        Ok(sub_marker)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    table: Arc<Mutex<MarkerTable>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Writes recorded by a transaction, undone in reverse order on rollback.
enum Undo {
    Insert(Id<LightMarker>),
    SubMarker(Id<LightMarker>),
}

/// Writes straight into the table while holding the table lock. Dropping the
/// transaction without commit rolls its writes back.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MarkerTable>,
    undo: Vec<Undo>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.undo.is_empty() {
            debug!("rolling back {} uncommitted writes.", self.undo.len());
        }
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::Insert(id) => {
                    self.guard.markers.shift_remove(&id);
                }
                Undo::SubMarker(head) => {
                    if let Some(marker) = self.guard.markers.get_mut(&head) {
                        marker.sub_markers.pop();
                    }
                }
            }
        }
    }
}

pub struct MemoryAutocommit {
    table: Arc<Mutex<MarkerTable>>,
}

#[async_trait]
impl Database for MemoryDatabase {
    type Transaction = MemoryTransaction;
    type Autocommit = MemoryAutocommit;

    async fn transaction(&self) -> Result<Self::Transaction> {
        let guard = self.table.clone().lock_owned().await;
        Ok(MemoryTransaction {
            guard,
            undo: vec![],
        })
    }

    fn auto(&self) -> Self::Autocommit {
        MemoryAutocommit {
            table: self.table.clone(),
        }
    }
}

impl DatabaseOperations for MemoryTransaction {}

#[async_trait]
impl DatabaseTransaction for MemoryTransaction {
    async fn lock_for_merge(&mut self) -> Result<()> {
        // the table lock is held for the whole transaction already
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        self.undo.clear();
        Ok(())
    }
}

impl DatabaseOperations for MemoryAutocommit {}
impl DatabaseAutocommit for MemoryAutocommit {}

#[async_trait]
impl MarkerRepo for MemoryTransaction {
    async fn get(&mut self, id: &Id<LightMarker>) -> Result<WithId<LightMarker>> {
        self.guard.get(id)
    }

    async fn find_by_boundaries(
        &mut self,
        boundary: &Boundary,
    ) -> Result<Vec<WithId<LightMarker>>> {
        Ok(self.guard.find_by_boundaries(boundary))
    }

    async fn find_nearby(
        &mut self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<WithDistance<WithId<LightMarker>>>> {
        Ok(self.guard.find_nearby(center, radius_km))
    }

    async fn find_nearest_marker(
        &mut self,
        center: &Coordinate,
        max_distance_km: f64,
    ) -> Result<Option<WithDistance<WithId<LightMarker>>>> {
        Ok(self.guard.find_nearest(center, max_distance_km))
    }

    async fn insert(&mut self, marker: LightMarker) -> Result<WithId<LightMarker>> {
        let marker = self.guard.insert(marker);
        self.undo.push(Undo::Insert(marker.id.clone()));
        Ok(marker)
    }

    async fn add_sub_marker(
        &mut self,
        head: &Id<LightMarker>,
        marker: LightMarker,
    ) -> Result<WithId<LightMarker>> {
        let sub_marker = self.guard.add_sub_marker(head, marker)?;
        self.undo.push(Undo::SubMarker(head.clone()));
        Ok(sub_marker)
    }

    async fn count_top_level(&mut self) -> Result<u64> {
        Ok(self.guard.markers.len() as u64)
    }
}

#[async_trait]
impl MarkerRepo for MemoryAutocommit {
    async fn get(&mut self, id: &Id<LightMarker>) -> Result<WithId<LightMarker>> {
        self.table.lock().await.get(id)
    }

    async fn find_by_boundaries(
        &mut self,
        boundary: &Boundary,
    ) -> Result<Vec<WithId<LightMarker>>> {
        Ok(self.table.lock().await.find_by_boundaries(boundary))
    }

    async fn find_nearby(
        &mut self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<WithDistance<WithId<LightMarker>>>> {
        Ok(self.table.lock().await.find_nearby(center, radius_km))
    }

    async fn find_nearest_marker(
        &mut self,
        center: &Coordinate,
        max_distance_km: f64,
    ) -> Result<Option<WithDistance<WithId<LightMarker>>>> {
        Ok(self.table.lock().await.find_nearest(center, max_distance_km))
    }

    async fn insert(&mut self, marker: LightMarker) -> Result<WithId<LightMarker>> {
        Ok(self.table.lock().await.insert(marker))
    }

    async fn add_sub_marker(
        &mut self,
        head: &Id<LightMarker>,
        marker: LightMarker,
    ) -> Result<WithId<LightMarker>> {
        self.table.lock().await.add_sub_marker(head, marker)
    }

    async fn count_top_level(&mut self) -> Result<u64> {
        Ok(self.table.lock().await.markers.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(latitude: f64, longitude: f64) -> LightMarker {
        LightMarker::new(Coordinate::new(latitude, longitude))
    }

    #[tokio::test]
    async fn uncommitted_transaction_is_discarded() {
        let database = MemoryDatabase::new();
        {
            let mut tx = database.transaction().await.unwrap();
            tx.insert(at(1.0, 1.0)).await.unwrap();
            assert_eq!(tx.count_top_level().await.unwrap(), 1);
        }
        assert_eq!(database.auto().count_top_level().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rollback_keeps_earlier_commits() {
        let database = MemoryDatabase::new();
        let head = database.auto().insert(at(1.0, 1.0)).await.unwrap();
        {
            let mut tx = database.transaction().await.unwrap();
            tx.add_sub_marker(&head.id, at(1.0, 1.0)).await.unwrap();
            tx.insert(at(2.0, 2.0)).await.unwrap();
            tx.add_sub_marker(&head.id, at(1.0, 1.0)).await.unwrap();
            assert_eq!(tx.get(&head.id).await.unwrap().content.sub_markers.len(), 2);
        }

        let mut auto = database.auto();
        assert_eq!(auto.count_top_level().await.unwrap(), 1);
        let stored = auto.get(&head.id).await.unwrap();
        assert_eq!(stored, head);
    }

    #[tokio::test]
    async fn failed_write_is_not_undone() {
        let database = MemoryDatabase::new();
        let head = database.auto().insert(at(1.0, 1.0)).await.unwrap();
        database
            .auto()
            .add_sub_marker(&head.id, at(1.0, 1.0))
            .await
            .unwrap();
        {
            let mut tx = database.transaction().await.unwrap();
            let missing = tx
                .add_sub_marker(&Id::new("missing".to_owned()), at(1.0, 1.0))
                .await;
            assert!(matches!(missing, Err(DatabaseError::NotFound)));
        }

        let stored = database.auto().get(&head.id).await.unwrap();
        assert_eq!(stored.content.sub_markers.len(), 1);
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let database = MemoryDatabase::new();
        let mut tx = database.transaction().await.unwrap();
        let head = tx.insert(at(1.0, 1.0)).await.unwrap();
        tx.add_sub_marker(&head.id, at(1.0, 1.0)).await.unwrap();
        tx.commit().await.unwrap();

        let stored = database.auto().get(&head.id).await.unwrap();
        assert_eq!(stored.content.sub_markers.len(), 1);
    }

    #[tokio::test]
    async fn nearby_is_sorted_by_distance() {
        let database = MemoryDatabase::new();
        let mut auto = database.auto();
        let far = auto.insert(at(54.330, 10.13)).await.unwrap();
        let near = auto.insert(at(54.321, 10.13)).await.unwrap();
        auto.insert(at(55.0, 10.13)).await.unwrap();

        let nearby = auto
            .find_nearby(&Coordinate::new(54.32, 10.13), 2.0)
            .await
            .unwrap();
        let ids = nearby
            .iter()
            .map(|marker| marker.content.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![near.id, far.id]);
    }

    #[tokio::test]
    async fn nearest_prefers_earlier_marker_on_tie() {
        let database = MemoryDatabase::new();
        let mut auto = database.auto();
        let first = auto.insert(at(0.0, 0.0)).await.unwrap();
        auto.insert(at(0.0, 0.0)).await.unwrap();

        let nearest = auto
            .find_nearest_marker(&Coordinate::new(0.0, 0.0), 0.01)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(nearest.content.id, first.id);
    }

    #[tokio::test]
    async fn sub_marker_on_unknown_head_is_not_found() {
        let database = MemoryDatabase::new();
        let result = database
            .auto()
            .add_sub_marker(&Id::new("missing".to_owned()), at(0.0, 0.0))
            .await;
        assert!(matches!(result, Err(DatabaseError::NotFound)));
    }
}
