//! Telegram linking, webhook and relay lookup endpoints

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::api::constants::TELEGRAM_SECRET_HEADER;
use crate::api::error_code::ErrorCode;
use crate::api::middleware::AuthUser;
use crate::api::response::{api_result, error_response, success_response};
use crate::api::state::ApiState;
use crate::config::TS_EXPORT_PATH;
use crate::errors::Result;
use crate::storage::{LinkedAccountSummary, TelegramLink, TelegramUserLookup};
use crate::telegram::Update;

#[derive(Debug, Deserialize)]
pub struct VerifyLinkQuery {
    pub token: String,
}

#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct LinkStatus {
    pub linked: bool,
    pub link: Option<TelegramLink>,
    pub bot_enabled: bool,
}

#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct UnlinkResult {
    pub unlinked: bool,
}

/// `GET /api/telegram/verify-link?token=…`
pub async fn verify_link(
    state: web::Data<ApiState>,
    user: AuthUser,
    query: web::Query<VerifyLinkQuery>,
) -> HttpResponse {
    api_result(
        state
            .services
            .linking
            .verify_link(&user.id, query.token.trim())
            .await,
    )
}

/// `GET /api/telegram/status`
pub async fn link_status(state: web::Data<ApiState>, user: AuthUser) -> HttpResponse {
    let result = state
        .services
        .linking
        .link_for_user(&user.id)
        .await
        .map(|link| LinkStatus {
            linked: link.is_some(),
            link,
            bot_enabled: state.telegram.is_some(),
        });
    api_result(result)
}

/// `DELETE /api/telegram/link`
pub async fn unlink(state: web::Data<ApiState>, user: AuthUser) -> HttpResponse {
    let result = state
        .services
        .linking
        .unlink(&user.id)
        .await
        .map(|unlinked| UnlinkResult { unlinked });
    api_result(result)
}

/// `POST /api/telegram/webhook`
///
/// Answers at once; the update is handled in the background so Telegram
/// never waits on the database.
pub async fn webhook(
    state: web::Data<ApiState>,
    req: HttpRequest,
    update: web::Json<Update>,
) -> HttpResponse {
    let Some(telegram) = state.telegram.clone() else {
        return error_response(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            "Telegram bot is not configured",
        );
    };

    if let Some(secret) = telegram.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
        let provided = req
            .headers()
            .get(TELEGRAM_SECRET_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();
        if !bool::from(secret.as_bytes().ct_eq(provided.as_bytes())) {
            warn!("Rejected webhook call with a bad secret token");
            return error_response(
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "Invalid webhook secret",
            );
        }
    }

    let update = update.into_inner();
    let update_id = update.update_id;
    debug!("Webhook update {}", update_id);

    let handler = telegram.handler.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = handler.handle(update).await {
            error!("Failed to handle webhook update {}: {}", update_id, e);
        }
    });

    success_response(serde_json::json!({ "ok": true }))
}

async fn lookup_account(state: &ApiState, telegram_id: i64) -> Result<TelegramUserLookup> {
    let Some(user_id) = state
        .services
        .linking
        .user_id_for_telegram(telegram_id)
        .await?
    else {
        return Ok(TelegramUserLookup { user: None });
    };

    let users = &state.services.users;
    let user = users.get_user(&user_id).await?;
    let wallet = users.wallet(&user_id).await?;
    let active_challenges = state.services.challenges.count_active(&user_id).await?;

    Ok(TelegramUserLookup {
        user: Some(LinkedAccountSummary {
            user_id: user.id,
            username: user.username,
            balance: wallet.balance,
            coins: wallet.coins,
            active_challenges,
        }),
    })
}

/// `GET /api/telegram/user/{telegram_id}`; internal token required
pub async fn user_by_telegram_id(
    state: web::Data<ApiState>,
    path: web::Path<i64>,
) -> HttpResponse {
    let telegram_id = path.into_inner();
    info!("Relay lookup for Telegram user {}", telegram_id);
    api_result(lookup_account(&state, telegram_id).await)
}
