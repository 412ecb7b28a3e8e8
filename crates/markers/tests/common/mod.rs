#![allow(dead_code)]

use std::{error::Error, fmt};

use async_trait::async_trait;
use markers::{
    config::MarkerConfig,
    database::{
        Database, DatabaseAutocommit, DatabaseError, DatabaseOperations,
        DatabaseTransaction, MarkerRepo, Result,
    },
    memory::MemoryDatabase,
    server::Server,
};
use model::{
    account::Account,
    coordinate::{Boundary, Coordinate},
    marker::LightMarker,
    WithDistance, WithId,
};
use utility::id::Id;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn server() -> Server<MemoryDatabase> {
    init_logging();
    Server::new(MemoryDatabase::new(), MarkerConfig::default())
}

pub fn account(id: &str) -> WithId<Account> {
    WithId::new(
        Id::new(id.to_owned()),
        Account {
            name: Some(id.to_uppercase()),
        },
    )
}

pub fn at(latitude: f64, longitude: f64) -> LightMarker {
    LightMarker::new(Coordinate::new(latitude, longitude))
}

#[derive(Debug)]
pub struct Unavailable;

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage unavailable")
    }
}

impl Error for Unavailable {}

fn unavailable<T>() -> Result<T> {
    Err(DatabaseError::Other(Box::new(Unavailable)))
}

/// Database whose every operation fails.
#[derive(Debug, Clone)]
pub struct BrokenDatabase;

pub struct BrokenConnection;

#[async_trait]
impl Database for BrokenDatabase {
    type Transaction = BrokenConnection;
    type Autocommit = BrokenConnection;

    async fn transaction(&self) -> Result<Self::Transaction> {
        Ok(BrokenConnection)
    }

    fn auto(&self) -> Self::Autocommit {
        BrokenConnection
    }
}

impl DatabaseOperations for BrokenConnection {}
impl DatabaseAutocommit for BrokenConnection {}

#[async_trait]
impl DatabaseTransaction for BrokenConnection {
    async fn lock_for_merge(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        unavailable()
    }
}

#[async_trait]
impl MarkerRepo for BrokenConnection {
    async fn get(&mut self, _id: &Id<LightMarker>) -> Result<WithId<LightMarker>> {
        unavailable()
    }

    async fn find_by_boundaries(
        &mut self,
        _boundary: &Boundary,
    ) -> Result<Vec<WithId<LightMarker>>> {
        unavailable()
    }

    async fn find_nearby(
        &mut self,
        _center: &Coordinate,
        _radius_km: f64,
    ) -> Result<Vec<WithDistance<WithId<LightMarker>>>> {
        unavailable()
    }

    async fn find_nearest_marker(
        &mut self,
        _center: &Coordinate,
        _max_distance_km: f64,
    ) -> Result<Option<WithDistance<WithId<LightMarker>>>> {
        unavailable()
    }

    async fn insert(&mut self, _marker: LightMarker) -> Result<WithId<LightMarker>> {
        unavailable()
    }

    async fn add_sub_marker(
        &mut self,
        _head: &Id<LightMarker>,
        _marker: LightMarker,
    ) -> Result<WithId<LightMarker>> {
        unavailable()
    }

    async fn count_top_level(&mut self) -> Result<u64> {
        unavailable()
    }
}
