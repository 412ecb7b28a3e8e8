use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::{Method, StatusCode},
    routing::{get, on},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use markers::database::Database;
use model::{coordinate::Coordinate, marker::LightMarker, WithDistance, WithId};
use schemars::JsonSchema;
use serde::Deserialize;
use utility::{id::Id, let_also::LetAlso};

use crate::{
    common::{
        route_not_found, schema, HateoasResult, RouteErrorResponse, RouteResult,
        VecResponse, METHOD_FILTER_ALL,
    },
    hateoas,
    middleware::{base_url::BaseUrl, identity::HeaderIdentity},
    WebState,
};

macro_rules! resource {
    ($($arg:tt)*) => {
        crate::api::v1::resource!("/markers{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

const DEFAULT_NEARBY_RADIUS_KM: f64 = 1.0;
const MAX_NEARBY_RADIUS_KM: f64 = 50.0;

pub(crate) fn routes<D: Database + 'static>(state: WebState<D>) -> Router {
    Router::new()
        .route("/schema", get(schema::<LightMarker>))
        .route("/nearby", get(nearby::<D>))
        .route("/:id", get(get_marker::<D>))
        .route("/", get(find_by_boundaries::<D>).post(report_marker::<D>))
        .with_state(state)
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundaryQuery {
    north_east_latitude: f64,
    north_east_longitude: f64,
    south_west_latitude: f64,
    south_west_longitude: f64,
}

async fn find_by_boundaries<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { server }): State<WebState<D>>,
    query: Result<Query<BoundaryQuery>, QueryRejection>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    Extension(identity): Extension<Arc<HeaderIdentity>>,
) -> HateoasResult<VecResponse<hateoas::Response<WithId<LightMarker>>>> {
    let Query(params) = query.map_err(|why| {
        RouteErrorResponse::from(why)
            .with_method(&Method::GET)
            .with_uri(original_uri.path())
    })?;
    let north_east =
        Coordinate::new(params.north_east_latitude, params.north_east_longitude);
    let south_west =
        Coordinate::new(params.south_west_latitude, params.south_west_longitude);
    if !north_east.is_valid() || !south_west.is_valid() {
        return Err(RouteErrorResponse::bad_request(
            "Boundary corners must be valid coordinates.",
        )
        .with_method(&Method::GET)
        .with_uri(original_uri.path()));
    }

    server
        .client(identity)
        .find_by_boundaries(north_east, south_west)
        .await
        .map(|markers| {
            markers
                .into_iter()
                .map(|marker| marker_hateoas(marker, base_url.clone()))
                .collect::<Vec<_>>()
                .let_owned(|data| VecResponse::new(data).hateoas().json())
        })
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

async fn get_marker<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    Path(id): Path<String>,
    State(WebState { server }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    Extension(identity): Extension<Arc<HeaderIdentity>>,
) -> HateoasResult<WithId<LightMarker>> {
    server
        .client(identity)
        .get_marker(Id::new(id))
        .await
        .map(|marker| marker_hateoas(marker, base_url).json())
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

#[derive(Deserialize)]
struct NearbyQuery {
    latitude: f64,
    longitude: f64,
    radius: Option<f64>,
}

async fn nearby<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { server }): State<WebState<D>>,
    query: Result<Query<NearbyQuery>, QueryRejection>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    Extension(identity): Extension<Arc<HeaderIdentity>>,
) -> HateoasResult<VecResponse<hateoas::Response<WithDistance<WithId<LightMarker>>>>> {
    let Query(params) = query.map_err(|why| {
        RouteErrorResponse::from(why)
            .with_method(&Method::GET)
            .with_uri(original_uri.path())
    })?;
    let center = Coordinate::new(params.latitude, params.longitude);
    let radius = params.radius.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
    if !center.is_valid() || !(0.0..=MAX_NEARBY_RADIUS_KM).contains(&radius) {
        return Err(RouteErrorResponse::bad_request(format!(
            "Expected a valid coordinate and a radius of at most {} km.",
            MAX_NEARBY_RADIUS_KM
        ))
        .with_method(&Method::GET)
        .with_uri(original_uri.path()));
    }

    server
        .client(identity)
        .find_nearby(center, radius)
        .await
        .map(|markers| {
            markers
                .into_iter()
                .map(|marker| marker_with_distance_hateoas(marker, base_url.clone()))
                .collect::<Vec<_>>()
                .let_owned(|data| VecResponse::new(data).hateoas().json())
        })
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

/// Body of a marker report.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkerReport {
    pub latitude: f64,
    pub longitude: f64,
    pub reported_at: Option<DateTime<Utc>>,
}

/// Responds `201 Created` for a new marker and `200 OK` with the updated
/// cluster when the report was merged into an existing one.
async fn report_marker<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { server }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    Extension(identity): Extension<Arc<HeaderIdentity>>,
    body: Result<Json<MarkerReport>, JsonRejection>,
) -> RouteResult<(StatusCode, Json<hateoas::Response<WithId<LightMarker>>>)> {
    let Json(report) = body.map_err(|why| {
        RouteErrorResponse::from(why)
            .with_method(&Method::POST)
            .with_uri(original_uri.path())
    })?;
    let coordinate = Coordinate::new(report.latitude, report.longitude);
    if !coordinate.is_valid() {
        return Err(RouteErrorResponse::bad_request(
            "Latitude must be within [-90, 90] and longitude within [-180, 180].",
        )
        .with_method(&Method::POST)
        .with_uri(original_uri.path()));
    }
    let candidate = match report.reported_at {
        Some(reported_at) => LightMarker::reported_at(coordinate, reported_at),
        None => LightMarker::new(coordinate),
    };

    let marker = server
        .client(identity)
        .add_discrete_marker(candidate)
        .await
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::POST)
                .with_uri(original_uri.path())
        })?;

    let status = if marker.content.is_cluster() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, marker_hateoas(marker, base_url).json()))
}

fn marker_hateoas(
    marker: WithId<LightMarker>,
    base_url: Arc<BaseUrl>,
) -> hateoas::Response<WithId<LightMarker>> {
    let id = marker.id.raw();
    let coordinate = marker.content.coordinate;
    let sightings = marker.content.sightings();
    hateoas::Response::builder(marker, base_url)
        .link("self", resource!("/{}", id))
        .link(
            "nearby",
            resource!(
                "/nearby?latitude={}&longitude={}&radius=1",
                coordinate.latitude,
                coordinate.longitude
            ),
        )
        .debug_info("sightings", sightings)
        .build()
}

fn marker_with_distance_hateoas(
    marker: WithDistance<WithId<LightMarker>>,
    base_url: Arc<BaseUrl>,
) -> hateoas::Response<WithDistance<WithId<LightMarker>>> {
    let id = marker.content.id.raw();
    hateoas::Response::builder(marker, base_url)
        .link("self", resource!("/{}", id))
        .build()
}
