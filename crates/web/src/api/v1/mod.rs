use axum::{routing::on, Router};
use ::markers::database::Database;
use tower_http::trace::TraceLayer;

use crate::{
    common::{route_not_found, METHOD_FILTER_ALL},
    middleware::{base_url::base_url_middleware, identity::identity_middleware},
    WebState,
};

pub mod markers;

macro_rules! resource {
    ($($arg:tt)*) => {
        crate::api::resource!("/v1{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub(crate) fn routes<D: Database + 'static>(state: WebState<D>) -> Router {
    Router::new()
        .nest_service("/markers", markers::routes(state))
        .layer(axum::middleware::from_fn(identity_middleware))
        .layer(axum::middleware::from_fn(base_url_middleware))
        .layer(TraceLayer::new_for_http())
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}
