use markers::database::{DatabaseError, Result};
use model::{
    coordinate::{Boundary, Coordinate},
    marker::LightMarker,
    WithDistance, WithId,
};
use sqlx::{Executor, Postgres};
use utility::{
    geo::{BoundingBox, EARTH_RADIUS_KM},
    id::{Id, IdWrapper},
    let_also::LetAlso,
};

use crate::data_model::{
    marker::{gather_clusters, gather_nearby, MarkerRow, NearbyMarkerRow},
    with_id,
};

use super::convert_error;

pub async fn get<'c, E>(executor: E, id: &Id<LightMarker>) -> Result<WithId<LightMarker>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT
            id, parent_id, owner_id, latitude, longitude, reported_at, seq
        FROM
            markers
        WHERE
            (id = $1 AND parent_id IS NULL) OR parent_id = $1
        ORDER BY seq ASC;
        ",
    )
    .bind(id.raw_ref::<str>())
    .fetch_all(executor)
    .await
    .map_err(convert_error)?
    .let_owned(|rows: Vec<MarkerRow>| gather_clusters(rows))
    .into_iter()
    .next()
    .ok_or(DatabaseError::NotFound)
}

pub async fn find_by_boundaries<'c, E>(
    executor: E,
    boundary: &Boundary,
) -> Result<Vec<WithId<LightMarker>>>
where
    E: Executor<'c, Database = Postgres>,
{
    // Same predicate as `Boundary::contains`, longitude bounds included.
    sqlx::query_as(
        "
        WITH heads AS (
            SELECT id
            FROM markers
            WHERE
                parent_id IS NULL
                AND latitude >= $1 AND latitude <= $2
                AND longitude >= $3 AND longitude <= $4
        )
        SELECT
            id, parent_id, owner_id, latitude, longitude, reported_at, seq
        FROM
            markers
        WHERE
            id IN (SELECT id FROM heads)
            OR parent_id IN (SELECT id FROM heads)
        ORDER BY seq ASC;
        ",
    )
    .bind(boundary.south_west.latitude)
    .bind(boundary.north_east.latitude)
    .bind(boundary.north_east.longitude)
    .bind(boundary.south_west.longitude)
    .fetch_all(executor)
    .await
    .map_err(convert_error)?
    .let_owned(|rows: Vec<MarkerRow>| Ok(gather_clusters(rows)))
}

/// Top level markers within `radius_km` of `center`, closest first, together with
/// their sub markers. `limit` restricts the number of clusters.
pub async fn find_nearby<'c, E>(
    executor: E,
    center: &Coordinate,
    radius_km: f64,
    limit: Option<i64>,
) -> Result<Vec<WithDistance<WithId<LightMarker>>>>
where
    E: Executor<'c, Database = Postgres>,
{
    let bbox = BoundingBox::around(center.latitude, center.longitude, radius_km);
    let [(east_min, east_max), (west_min, west_max)] = bbox.longitude_ranges();

    sqlx::query_as(
        "
        WITH distance_calc AS (
            SELECT
                id,
                seq,
                ($1 * ACOS(LEAST(1.0,
                    COS(RADIANS($2)) * COS(RADIANS(latitude)) *
                    COS(RADIANS(longitude) - RADIANS($3)) +
                    SIN(RADIANS($2)) * SIN(RADIANS(latitude))
                ))) AS distance
            FROM
                markers
            WHERE
                parent_id IS NULL
                AND latitude BETWEEN $4 AND $5
                AND (
                    longitude BETWEEN $6 AND $7
                    OR longitude BETWEEN $8 AND $9
                )
        ),
        nearby AS (
            SELECT id, seq, distance
            FROM distance_calc
            WHERE distance <= $10
            ORDER BY distance ASC, seq ASC
            LIMIT $11
        )
        SELECT
            m.id, m.parent_id, m.owner_id, m.latitude, m.longitude,
            m.reported_at, m.seq, n.distance
        FROM
            markers m
            JOIN nearby n ON n.id = COALESCE(m.parent_id, m.id)
        ORDER BY n.distance ASC, n.seq ASC, m.seq ASC;
        ",
    )
    .bind(EARTH_RADIUS_KM)
    .bind(center.latitude)
    .bind(center.longitude)
    .bind(bbox.min_latitude)
    .bind(bbox.max_latitude)
    .bind(east_min)
    .bind(east_max)
    .bind(west_min)
    .bind(west_max)
    .bind(radius_km)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(convert_error)?
    .let_owned(|rows: Vec<NearbyMarkerRow>| Ok(gather_nearby(rows)))
}

pub async fn find_nearest<'c, E>(
    executor: E,
    center: &Coordinate,
    max_distance_km: f64,
) -> Result<Option<WithDistance<WithId<LightMarker>>>>
where
    E: Executor<'c, Database = Postgres>,
{
    find_nearby(executor, center, max_distance_km, Some(1))
        .await
        .map(|nearby| nearby.into_iter().next())
}

pub async fn insert<'c, E>(executor: E, marker: LightMarker) -> Result<WithId<LightMarker>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        INSERT INTO markers(
            owner_id,
            latitude,
            longitude,
            reported_at
        )
        VALUES ($1, $2, $3, $4)
        RETURNING id, parent_id, owner_id, latitude, longitude, reported_at, seq;
        ",
    )
    .bind(marker.owner.raw())
    .bind(marker.coordinate.latitude)
    .bind(marker.coordinate.longitude)
    .bind(marker.reported_at)
    .fetch_one(executor)
    .await
    .map(|row: MarkerRow| with_id(row))
    .map_err(convert_error)
}

/// Fails with `NotFound` unless `head` is a top level marker.
pub async fn insert_sub_marker<'c, E>(
    executor: E,
    head: &Id<LightMarker>,
    marker: LightMarker,
) -> Result<WithId<LightMarker>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        INSERT INTO markers(
            parent_id,
            owner_id,
            latitude,
            longitude,
            reported_at
        )
        SELECT $1, $2, $3, $4, $5
        WHERE EXISTS (
            SELECT 1 FROM markers WHERE id = $1 AND parent_id IS NULL
        )
        RETURNING id, parent_id, owner_id, latitude, longitude, reported_at, seq;
        ",
    )
    .bind(head.raw_ref::<str>())
    .bind(marker.owner.raw())
    .bind(marker.coordinate.latitude)
    .bind(marker.coordinate.longitude)
    .bind(marker.reported_at)
    .fetch_one(executor)
    .await
    .map(|row: MarkerRow| with_id(row))
    .map_err(convert_error)
}

pub async fn count_top_level<'c, E>(executor: E) -> Result<u64>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM markers WHERE parent_id IS NULL;")
        .fetch_one(executor)
        .await
        .map(|count: i64| count.max(0) as u64)
        .map_err(convert_error)
}
