use std::{env, error::Error};

use async_trait::async_trait;
use log::info;
use markers::database::{
    Database, DatabaseAutocommit, DatabaseOperations, DatabaseTransaction,
    MarkerRepo, Result,
};
use model::{
    coordinate::{Boundary, Coordinate},
    marker::LightMarker,
    WithDistance, WithId,
};
use queries::{convert_error, marker};
use sqlx::Transaction;
use utility::id::Id;

pub mod data_model;
pub mod queries;

pub struct DatabaseConnectionInfo {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub database: String,
}

impl DatabaseConnectionInfo {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = lookup("DATABASE_USER")?;
        let password = lookup("DATABASE_PASSWORD")?;
        let hostname = lookup("DATABASE_HOST")?;
        let port: u16 = lookup("DATABASE_PORT")?.parse().ok()?;
        let database = lookup("DATABASE_NAME")?;
        Some(Self {
            username,
            password,
            hostname,
            port,
            database,
        })
    }

    pub(self) fn postgres_url(self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.hostname, self.port, self.database
        )
    }
}

#[derive(Clone)]
pub struct PgDatabase {
    connection: sqlx::PgPool,
}

pub struct PgDatabaseTransaction<'a> {
    tx: Transaction<'a, sqlx::Postgres>,
}

pub struct PgDatabaseAutocommit {
    pool: sqlx::PgPool,
}

impl PgDatabase {
    pub async fn connect(
        database_connection_info: DatabaseConnectionInfo,
    ) -> std::result::Result<Self, Box<dyn Error>> {
        info!(
            "connecting to postgres at {}:{}/{}.",
            database_connection_info.hostname,
            database_connection_info.port,
            database_connection_info.database
        );
        let url = database_connection_info.postgres_url();
        let pool = sqlx::postgres::PgPool::connect(&url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { connection: pool })
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Transaction = PgDatabaseTransaction<'static>;
    type Autocommit = PgDatabaseAutocommit;

    fn auto(&self) -> Self::Autocommit {
        PgDatabaseAutocommit {
            pool: self.connection.clone(),
        }
    }

    async fn transaction(&self) -> Result<Self::Transaction> {
        let tx: Transaction<'_, sqlx::Postgres> =
            self.connection.begin().await.map_err(convert_error)?;

        Ok(PgDatabaseTransaction { tx })
    }
}

impl<'a> DatabaseOperations for PgDatabaseTransaction<'a> {}

#[async_trait]
impl<'a> DatabaseTransaction for PgDatabaseTransaction<'a> {
    async fn lock_for_merge(&mut self) -> Result<()> {
        queries::lock_for_merge(&mut *self.tx).await
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(convert_error)
    }
}

impl DatabaseOperations for PgDatabaseAutocommit {}
impl DatabaseAutocommit for PgDatabaseAutocommit {}

#[async_trait]
impl MarkerRepo for PgDatabaseAutocommit {
    async fn get(&mut self, id: &Id<LightMarker>) -> Result<WithId<LightMarker>> {
        marker::get(&self.pool, id).await
    }

    async fn find_by_boundaries(
        &mut self,
        boundary: &Boundary,
    ) -> Result<Vec<WithId<LightMarker>>> {
        marker::find_by_boundaries(&self.pool, boundary).await
    }

    async fn find_nearby(
        &mut self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<WithDistance<WithId<LightMarker>>>> {
        marker::find_nearby(&self.pool, center, radius_km, None).await
    }

    async fn find_nearest_marker(
        &mut self,
        center: &Coordinate,
        max_distance_km: f64,
    ) -> Result<Option<WithDistance<WithId<LightMarker>>>> {
        marker::find_nearest(&self.pool, center, max_distance_km).await
    }

    async fn insert(&mut self, marker: LightMarker) -> Result<WithId<LightMarker>> {
        marker::insert(&self.pool, marker).await
    }

    async fn add_sub_marker(
        &mut self,
        head: &Id<LightMarker>,
        marker: LightMarker,
    ) -> Result<WithId<LightMarker>> {
        marker::insert_sub_marker(&self.pool, head, marker).await
    }

    async fn count_top_level(&mut self) -> Result<u64> {
        marker::count_top_level(&self.pool).await
    }
}

#[async_trait]
impl<'a> MarkerRepo for PgDatabaseTransaction<'a> {
    async fn get(&mut self, id: &Id<LightMarker>) -> Result<WithId<LightMarker>> {
        marker::get(&mut *self.tx, id).await
    }

    async fn find_by_boundaries(
        &mut self,
        boundary: &Boundary,
    ) -> Result<Vec<WithId<LightMarker>>> {
        marker::find_by_boundaries(&mut *self.tx, boundary).await
    }

    async fn find_nearby(
        &mut self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<WithDistance<WithId<LightMarker>>>> {
        marker::find_nearby(&mut *self.tx, center, radius_km, None).await
    }

    async fn find_nearest_marker(
        &mut self,
        center: &Coordinate,
        max_distance_km: f64,
    ) -> Result<Option<WithDistance<WithId<LightMarker>>>> {
        marker::find_nearest(&mut *self.tx, center, max_distance_km).await
    }

    async fn insert(&mut self, marker: LightMarker) -> Result<WithId<LightMarker>> {
        marker::insert(&mut *self.tx, marker).await
    }

    async fn add_sub_marker(
        &mut self,
        head: &Id<LightMarker>,
        marker: LightMarker,
    ) -> Result<WithId<LightMarker>> {
        marker::insert_sub_marker(&mut *self.tx, head, marker).await
    }

    async fn count_top_level(&mut self) -> Result<u64> {
        marker::count_top_level(&mut *self.tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_info_requires_every_variable() {
        let info = DatabaseConnectionInfo::from_lookup(|key| match key {
            "DATABASE_PORT" => Some("5432".to_owned()),
            "DATABASE_NAME" => None,
            _ => Some("x".to_owned()),
        });
        assert!(info.is_none());
    }

    #[test]
    fn connection_info_builds_postgres_url() {
        let info = DatabaseConnectionInfo::from_lookup(|key| {
            Some(match key {
                "DATABASE_USER" => "markers",
                "DATABASE_PASSWORD" => "secret",
                "DATABASE_HOST" => "db",
                "DATABASE_PORT" => "5432",
                _ => "lights",
            })
            .map(str::to_owned)
        })
        .unwrap();
        assert_eq!(info.postgres_url(), "postgres://markers:secret@db:5432/lights");
    }

    #[test]
    fn connection_info_rejects_bad_port() {
        let info = DatabaseConnectionInfo::from_lookup(|key| {
            Some(if key == "DATABASE_PORT" { "port" } else { "x" }.to_owned())
        });
        assert!(info.is_none());
    }
}
