//! HTTP surfaces: the worker API and the admin API, served as two axum
//! routers on separate listen addresses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace};
use tracing::Level;

use crate::admin::AdminOps;
use crate::engine::Engine;
use crate::injector::Injector;
use crate::prelude::Error;
use crate::reset::ResetScheduler;
use crate::sessions::Sessions;

mod auth;
mod routes_admin;
mod routes_user;

pub use auth::CurrentUser;

#[derive(Deserialize, Serialize, Clone)]
pub struct SurfaceConfig {
    pub listen_address: SocketAddr,
    pub permissive_cors: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct Config {
    pub worker: SurfaceConfig,
    pub admin: SurfaceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker: SurfaceConfig {
                listen_address: ([0, 0, 0, 0], 3000).into(),
                permissive_cors: None,
            },
            admin: SurfaceConfig {
                listen_address: ([0, 0, 0, 0], 3001).into(),
                permissive_cors: None,
            },
        }
    }
}

pub struct State {
    pub store: crate::prelude::Store,
    pub sessions: Sessions,
    pub engine: Engine,
    pub injector: Injector,
    pub admin: AdminOps,
    pub reset: ResetScheduler,
}

pub type SharedState = Arc<State>;

/// Standard `{success, message, data}` envelope every handler responds
/// with.
#[derive(Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub data: serde_json::Value,
}

pub fn reply(message: impl Into<String>, data: serde_json::Value) -> Json<Envelope> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data,
    })
}

/// Service errors rendered as the envelope with the matching status code.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl From<encore_store::Error> for ApiError {
    fn from(error: encore_store::Error) -> Self {
        Self(Error::StorageError(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            Error::Eligibility(reason) => (StatusCode::FORBIDDEN, reason.clone()),
            Error::Auth(err) => (StatusCode::UNAUTHORIZED, err.to_string()),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            Error::StateConflict(message) => (StatusCode::CONFLICT, message.clone()),
            Error::WalletError(err) => (StatusCode::CONFLICT, err.to_string()),
            // internals stay opaque to the caller
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = Json(Envelope {
            success: false,
            message,
            data: serde_json::Value::Null,
        });

        (status, body).into_response()
    }
}

pub type ApiResult = Result<Json<Envelope>, ApiError>;

/// Serve both surfaces until the cancellation token fires.
pub async fn serve(cfg: Config, state: SharedState, exit: CancellationToken) -> Result<(), Error> {
    let worker = serve_surface(
        routes_user::router(state.clone()),
        cfg.worker,
        exit.clone(),
        "worker",
    );

    let admin = serve_surface(
        routes_admin::router(state.clone()),
        cfg.admin,
        exit.clone(),
        "admin",
    );

    tokio::try_join!(worker, admin)?;

    Ok(())
}

async fn serve_surface(
    router: Router,
    cfg: SurfaceConfig,
    exit: CancellationToken,
    surface: &'static str,
) -> Result<(), Error> {
    let app = router
        .layer(
            trace::TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(if cfg.permissive_cors.unwrap_or_default() {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        });

    let listener = tokio::net::TcpListener::bind(cfg.listen_address)
        .await
        .map_err(|_| Error::server(format!("failed to bind TCP listener for {surface} API")))?;

    tracing::info!(address = %cfg.listen_address, surface, "API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { exit.cancelled().await })
        .await
        .map_err(Error::server)?;

    Ok(())
}
