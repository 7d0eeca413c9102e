//! Worker-surface routes.

use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::prelude::*;
use crate::sessions::{LoginRequest, SignupRequest};

use super::{auth, reply, ApiResult, CurrentUser, SharedState};

pub fn router(state: SharedState) -> Router {
    let open = Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh));

    let authed = Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/password", put(change_password))
        .route("/api/auth/transactional-password", put(change_txn_password))
        .route("/api/games/current-game", get(current_game))
        .route("/api/games/play-game", post(play_game))
        .route("/api/games/history", get(history))
        .route("/api/notifications", get(notifications))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/notifications/read-all", post(mark_all_read))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_worker,
        ));

    open.merge(authed).with_state(state)
}

async fn signup(State(state): State<SharedState>, Json(body): Json<SignupRequest>) -> ApiResult {
    let user = state.sessions.signup(&body, Utc::now())?;

    Ok(reply(
        "Account created successfully",
        json!({ "id": user.id, "username": user.username, "referral_code": user.referral_code }),
    ))
}

async fn login(State(state): State<SharedState>, Json(body): Json<LoginRequest>) -> ApiResult {
    let (tokens, user) = state.sessions.login(&body, Surface::User, Utc::now())?;
    let profile = state.sessions.profile(user.id)?;

    Ok(reply(
        "Login successful",
        json!({ "access": tokens.access, "refresh": tokens.refresh, "user": profile }),
    ))
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh: String,
}

async fn refresh(State(state): State<SharedState>, Json(body): Json<RefreshBody>) -> ApiResult {
    let access = state.sessions.refresh(&body.refresh, Utc::now())?;

    Ok(reply("Token refreshed", json!({ "access": access })))
}

async fn me(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult {
    let profile = state.sessions.profile(user.id)?;

    Ok(reply("Profile", json!(profile)))
}

#[derive(Deserialize)]
struct ChangePasswordBody {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<ChangePasswordBody>,
) -> ApiResult {
    state
        .sessions
        .change_password(user.id, &body.current_password, &body.new_password)?;

    Ok(reply("Password updated successfully", json!(null)))
}

async fn change_txn_password(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<ChangePasswordBody>,
) -> ApiResult {
    state.sessions.change_transactional_password(
        user.id,
        &body.current_password,
        &body.new_password,
    )?;

    Ok(reply("Transactional password updated successfully", json!(null)))
}

async fn current_game(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult {
    let view = state.engine.current_task(user.id, Utc::now())?;

    Ok(reply("Current album review", json!(view)))
}

async fn play_game(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<PlayRequest>,
) -> ApiResult {
    let outcome = state.engine.play(user.id, &body, Utc::now())?;

    Ok(reply(outcome.message, json!(outcome.task)))
}

#[derive(Serialize)]
struct HistoryItem {
    id: TaskId,
    amount: Amount,
    commission: Amount,
    rating_score: Option<u8>,
    comment: Option<String>,
    special_product: bool,
    rating_no: String,
    pending: bool,
    updated_at: DateTime<Utc>,
}

async fn history(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult {
    let reader = state.store.reader()?;

    let mut played: Vec<HistoryItem> = reader
        .tasks_for_user(user.id)?
        .into_iter()
        .filter(|t| t.played)
        .map(|t| HistoryItem {
            id: t.id,
            amount: t.amount,
            commission: t.commission,
            rating_score: t.rating_score,
            comment: t.comment,
            special_product: t.special_product,
            rating_no: t.rating_no,
            pending: t.pending,
            updated_at: t.updated_at,
        })
        .collect();

    played.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    Ok(reply("Review history", json!(played)))
}

async fn notifications(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult {
    let reader = state.store.reader()?;
    let inbox = reader.notifications_for(user.id)?;

    Ok(reply("Notifications", json!(inbox)))
}

async fn mark_read(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<NotificationId>,
) -> ApiResult {
    crate::notify::mark_read(&state.store, Some(user.id), id)?;

    Ok(reply("Notification marked as read", json!(null)))
}

async fn mark_all_read(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult {
    crate::notify::mark_all_read(&state.store, Some(user.id))?;

    Ok(reply("All notifications marked as read", json!(null)))
}
