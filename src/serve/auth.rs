//! Bearer-token middleware for both surfaces.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::warn;

use crate::prelude::{AuthError, Error, Surface, User};

use super::{ApiError, SharedState};

/// The authenticated account, inserted into request extensions by the
/// middleware.
#[derive(Clone)]
pub struct CurrentUser(pub User);

pub async fn require_worker(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    guard(state, request, next, Surface::User).await
}

pub async fn require_admin(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    guard(state, request, next, Surface::Admin).await
}

async fn guard(state: SharedState, mut request: Request, next: Next, surf: Surface) -> Response {
    let now = Utc::now();

    // the reset scheduler also wakes on request arrival
    if let Err(error) = state.reset.maybe_reset(now) {
        warn!(%error, "request-tick reset evaluation failed");
    }

    let token = match bearer_token(&request) {
        Some(token) => token,
        None => return ApiError(Error::Auth(AuthError::Malformed)).into_response(),
    };

    match state.sessions.authenticate(&token, surf, now) {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(error) => ApiError(error).into_response(),
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;

    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}
