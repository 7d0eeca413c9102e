//! Admin-surface routes.

use axum::{
    extract::{Path, State},
    middleware,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::admin::{HoldBandSpec, PackSpec, ProductSpec};
use crate::injector::SpecialTaskSpec;
use crate::prelude::*;
use crate::sessions::LoginRequest;

use super::{auth, reply, ApiResult, CurrentUser, SharedState};

pub fn router(state: SharedState) -> Router {
    let open = Router::new()
        .route("/admin/auth/login", post(login))
        .route("/admin/auth/refresh", post(refresh));

    let authed = Router::new()
        .route("/admin/special-tasks", get(list_specials).post(create_special))
        .route(
            "/admin/special-tasks/{id}",
            put(update_special).delete(delete_special),
        )
        .route("/admin/users/update-balance", post(update_balance))
        .route("/admin/users/update-profit", post(update_profit))
        .route("/admin/users/update-salary", post(update_salary))
        .route("/admin/users/toggle-reg-bonus", post(toggle_reg_bonus))
        .route("/admin/users/update-credit-score", post(update_credit_score))
        .route("/admin/users/set-pack", post(set_pack))
        .route("/admin/users/reset-account", post(reset_account))
        .route("/admin/users/toggle-min-balance", post(toggle_min_balance))
        .route("/admin/users/toggle-active", post(toggle_active))
        .route("/admin/users/update-login-password", post(update_login_password))
        .route(
            "/admin/users/update-withdrawal-password",
            post(update_withdrawal_password),
        )
        .route("/admin/packs", get(list_packs).post(create_pack))
        .route("/admin/packs/{id}", put(update_pack).delete(delete_pack))
        .route("/admin/products", get(list_products).post(create_product))
        .route(
            "/admin/products/{id}",
            put(update_product).delete(delete_product),
        )
        .route("/admin/hold-bands", get(list_bands).post(create_band))
        .route("/admin/hold-bands/{id}", delete(delete_band))
        .route("/admin/notifications", get(notifications))
        .route("/admin/notifications/read-all", post(mark_all_read))
        .route("/admin/logs", get(logs))
        .route("/admin/invitation-codes", post(generate_invitation_code))
        .route("/admin/settings", get(get_settings).put(put_settings))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    open.merge(authed).with_state(state)
}

async fn login(State(state): State<SharedState>, Json(body): Json<LoginRequest>) -> ApiResult {
    let (tokens, user) = state.sessions.login(&body, Surface::Admin, Utc::now())?;

    Ok(reply(
        "Login successful",
        json!({ "access": tokens.access, "refresh": tokens.refresh, "id": user.id, "username": user.username }),
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

// special tasks

async fn list_specials(State(state): State<SharedState>) -> ApiResult {
    let tasks = state.injector.list()?;

    Ok(reply("Special submissions", json!(tasks)))
}

async fn create_special(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<SpecialTaskSpec>,
) -> ApiResult {
    let task = state.injector.create(admin.id, &body, Utc::now())?;

    Ok(reply("Special submission created successfully", json!(task)))
}

async fn update_special(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<TaskId>,
    Json(body): Json<SpecialTaskSpec>,
) -> ApiResult {
    let task = state.injector.update(admin.id, id, &body, Utc::now())?;

    Ok(reply("Special submission updated successfully", json!(task)))
}

async fn delete_special(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<TaskId>,
) -> ApiResult {
    state.injector.delete(admin.id, id, Utc::now())?;

    Ok(reply("Special submission deleted successfully", json!(null)))
}

// wallet & account mutations

#[derive(Deserialize)]
struct BalanceBody {
    user: UserId,
    balance: Amount,
    reason: String,
    admin_password: String,
}

async fn update_balance(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<BalanceBody>,
) -> ApiResult {
    let wallet = state.admin.set_balance(
        admin.id,
        &body.admin_password,
        body.user,
        body.balance,
        &body.reason,
        Utc::now(),
    )?;

    Ok(reply("Worker balance updated successfully", json!(wallet)))
}

#[derive(Deserialize)]
struct ProfitBody {
    user: UserId,
    profit: Amount,
    reason: String,
    admin_password: String,
}

async fn update_profit(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<ProfitBody>,
) -> ApiResult {
    let wallet = state.admin.set_today_profit(
        admin.id,
        &body.admin_password,
        body.user,
        body.profit,
        &body.reason,
        Utc::now(),
    )?;

    Ok(reply("Worker profit updated successfully", json!(wallet)))
}

#[derive(Deserialize)]
struct SalaryBody {
    user: UserId,
    salary: Amount,
    reason: String,
    admin_password: String,
}

async fn update_salary(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<SalaryBody>,
) -> ApiResult {
    let wallet = state.admin.set_salary(
        admin.id,
        &body.admin_password,
        body.user,
        body.salary,
        &body.reason,
        Utc::now(),
    )?;

    Ok(reply("Worker salary updated successfully", json!(wallet)))
}

#[derive(Deserialize)]
struct UserActionBody {
    user: UserId,
    admin_password: String,
}

async fn toggle_reg_bonus(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<UserActionBody>,
) -> ApiResult {
    let user = state
        .admin
        .toggle_reg_bonus(admin.id, &body.admin_password, body.user, Utc::now())?;

    let message = if user.is_reg_bonus_credited {
        "Registration bonus has been added successfully"
    } else {
        "Registration bonus has been removed successfully"
    };

    Ok(reply(message, json!({ "is_reg_bonus_credited": user.is_reg_bonus_credited })))
}

#[derive(Deserialize)]
struct CreditScoreBody {
    user: UserId,
    credit_score: Amount,
    admin_password: String,
}

async fn update_credit_score(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<CreditScoreBody>,
) -> ApiResult {
    let wallet = state.admin.set_credit_score(
        admin.id,
        &body.admin_password,
        body.user,
        body.credit_score,
        Utc::now(),
    )?;

    Ok(reply("Worker credit score updated successfully", json!(wallet)))
}

#[derive(Deserialize)]
struct SetPackBody {
    user: UserId,
    pack_id: PackId,
    admin_password: String,
}

async fn set_pack(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<SetPackBody>,
) -> ApiResult {
    let wallet = state.admin.set_pack(
        admin.id,
        &body.admin_password,
        body.user,
        body.pack_id,
        Utc::now(),
    )?;

    Ok(reply("Worker pack updated successfully", json!(wallet)))
}

#[derive(Deserialize)]
struct ResetAccountBody {
    user: UserId,
    submission_count: Option<u32>,
    set_count: Option<u32>,
    admin_password: String,
}

async fn reset_account(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<ResetAccountBody>,
) -> ApiResult {
    let user = state.admin.reset_account(
        admin.id,
        &body.admin_password,
        body.user,
        body.submission_count,
        body.set_count,
        Utc::now(),
    )?;

    Ok(reply(
        "Worker account has been reset successfully",
        json!({ "submissions_today": user.submissions_today, "sets_today": user.sets_today }),
    ))
}

#[derive(Deserialize)]
struct UserOnlyBody {
    user: UserId,
}

async fn toggle_min_balance(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<UserOnlyBody>,
) -> ApiResult {
    let user = state
        .admin
        .toggle_min_balance_waiver(admin.id, body.user, Utc::now())?;

    let message = if user.is_min_balance_waived {
        "Worker minimum balance for submissions disabled"
    } else {
        "Worker minimum balance for submissions enabled"
    };

    Ok(reply(message, json!({ "is_min_balance_waived": user.is_min_balance_waived })))
}

async fn toggle_active(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<UserOnlyBody>,
) -> ApiResult {
    let user = state.admin.toggle_active(admin.id, body.user, Utc::now())?;

    let message = if user.is_active {
        "Worker has been activated"
    } else {
        "Worker has been deactivated successfully"
    };

    Ok(reply(message, json!({ "is_active": user.is_active })))
}

#[derive(Deserialize)]
struct PasswordBody {
    user: UserId,
    password: String,
}

async fn update_login_password(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<PasswordBody>,
) -> ApiResult {
    state
        .admin
        .set_login_password(admin.id, body.user, &body.password, Utc::now())?;

    Ok(reply("Worker password updated successfully", json!(null)))
}

async fn update_withdrawal_password(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<PasswordBody>,
) -> ApiResult {
    state
        .admin
        .set_transactional_password(admin.id, body.user, &body.password, Utc::now())?;

    Ok(reply(
        "Worker withdrawal password updated successfully",
        json!(null),
    ))
}

// catalog

async fn list_packs(State(state): State<SharedState>) -> ApiResult {
    let packs = state.store.reader()?.packs_all()?;

    Ok(reply("Packs", json!(packs)))
}

async fn create_pack(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<PackSpec>,
) -> ApiResult {
    let pack = state.admin.create_pack(admin.id, &body, Utc::now())?;

    Ok(reply("Pack created successfully", json!(pack)))
}

async fn update_pack(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<PackId>,
    Json(body): Json<PackSpec>,
) -> ApiResult {
    let pack = state.admin.update_pack(admin.id, id, &body, Utc::now())?;

    Ok(reply("Pack updated successfully", json!(pack)))
}

async fn delete_pack(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<PackId>,
) -> ApiResult {
    state.admin.delete_pack(admin.id, id, Utc::now())?;

    Ok(reply("Pack deleted successfully", json!(null)))
}

async fn list_products(State(state): State<SharedState>) -> ApiResult {
    let products = state.store.reader()?.products_all()?;

    Ok(reply("Albums", json!(products)))
}

async fn create_product(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<ProductSpec>,
) -> ApiResult {
    let product = state.admin.create_product(admin.id, &body, Utc::now())?;

    Ok(reply("Album created successfully", json!(product)))
}

async fn update_product(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductSpec>,
) -> ApiResult {
    let product = state.admin.update_product(admin.id, id, &body, Utc::now())?;

    Ok(reply("Album updated successfully", json!(product)))
}

async fn delete_product(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<ProductId>,
) -> ApiResult {
    state.admin.delete_product(admin.id, id, Utc::now())?;

    Ok(reply("Album deleted successfully", json!(null)))
}

async fn list_bands(State(state): State<SharedState>) -> ApiResult {
    let bands = state.store.reader()?.hold_bands_all()?;

    Ok(reply("Hold ranges", json!(bands)))
}

async fn create_band(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<HoldBandSpec>,
) -> ApiResult {
    let band = state.admin.create_hold_band(admin.id, &body, Utc::now())?;

    Ok(reply("Hold range created successfully", json!(band)))
}

async fn delete_band(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<HoldBandId>,
) -> ApiResult {
    state.admin.delete_hold_band(admin.id, id, Utc::now())?;

    Ok(reply("Hold range deleted successfully", json!(null)))
}

// notifications, logs, invitations, settings

async fn notifications(State(state): State<SharedState>) -> ApiResult {
    let inbox = state.store.reader()?.admin_notifications()?;

    Ok(reply("Notifications", json!(inbox)))
}

async fn mark_all_read(State(state): State<SharedState>) -> ApiResult {
    crate::notify::mark_all_read(&state.store, None)?;

    Ok(reply("All notifications marked as read", json!(null)))
}

async fn logs(State(state): State<SharedState>) -> ApiResult {
    let entries = state.store.reader()?.admin_logs()?;

    Ok(reply("Admin activity", json!(entries)))
}

async fn generate_invitation_code(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> ApiResult {
    let code = state.sessions.generate_invitation_code(admin.id, Utc::now())?;

    Ok(reply("Invitation code generated", json!(code)))
}

async fn get_settings(State(state): State<SharedState>) -> ApiResult {
    let settings = state.store.reader()?.settings()?;

    Ok(reply("Settings", json!(settings)))
}

async fn put_settings(
    State(state): State<SharedState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<Settings>,
) -> ApiResult {
    state.admin.update_settings(admin.id, &body, Utc::now())?;

    Ok(reply("Settings updated successfully", json!(null)))
}
