pub use crate::common::RouteResult;

use axum::{routing::on, Router};
use markers::{database::Database, server::Server};
use tokio::net::TcpListener;

use crate::common::{route_not_found, METHOD_FILTER_ALL};

pub mod api;
pub mod common;
pub mod hateoas;
pub mod middleware;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

pub struct WebState<D>
where
    D: Database + 'static,
{
    pub server: Server<D>,
}

impl<D: Database + 'static> Clone for WebState<D> {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebConfig {
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_owned(),
        }
    }
}

impl WebConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        match lookup("WEB_BIND_ADDRESS") {
            Some(address) if !address.trim().is_empty() => Self {
                bind_address: address.trim().to_owned(),
            },
            _ => Self::default(),
        }
    }
}

pub fn router<D: Database + 'static>(state: WebState<D>) -> Router {
    Router::new()
        .nest_service("/api", api::routes(state))
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

/// Serves the api on an already bound listener until the server fails.
pub async fn serve<D: Database + 'static>(
    listener: TcpListener,
    state: WebState<D>,
) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        log::info!("listening on http://{}.", address);
    }
    axum::serve(listener, router(state).into_make_service()).await
}

pub async fn start_web_server<D: Database + 'static>(
    config: &WebConfig,
    state: WebState<D>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    serve(listener, state).await
}
