//! Admin endpoints: settlement, deposits and channel tools

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use crate::api::error_code::ErrorCode;
use crate::api::middleware::AdminUser;
use crate::api::response::{api_result, error_response, success_response};
use crate::api::state::ApiState;
use crate::config::TS_EXPORT_PATH;
use crate::errors::BantahError;
use crate::storage::{ChallengeResult, Event, EventSettlement, Prediction};
use crate::telegram::{ChannelPost, test_connection};

#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct ResolveEventRequest {
    pub outcome: Prediction,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct ResolveChallengeRequest {
    pub result: ChallengeResult,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct CreditRequest {
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct BroadcastRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EventResolution {
    pub event: Event,
    pub settlement: EventSettlement,
}

/// `POST /api/admin/events/{id}/resolve`
pub async fn resolve_event(
    state: web::Data<ApiState>,
    AdminUser(admin): AdminUser,
    path: web::Path<i64>,
    body: web::Json<ResolveEventRequest>,
) -> HttpResponse {
    let result = state
        .services
        .events
        .resolve_event(&admin.id, path.into_inner(), body.outcome)
        .await
        .map(|(event, settlement)| EventResolution { event, settlement });
    api_result(result)
}

/// `POST /api/admin/events/{id}/cancel`
pub async fn cancel_event(
    state: web::Data<ApiState>,
    AdminUser(admin): AdminUser,
    path: web::Path<i64>,
) -> HttpResponse {
    api_result(
        state
            .services
            .events
            .cancel_event(&admin.id, path.into_inner())
            .await,
    )
}

/// `POST /api/admin/challenges/{id}/resolve`
pub async fn resolve_challenge(
    state: web::Data<ApiState>,
    AdminUser(admin): AdminUser,
    path: web::Path<i64>,
    body: web::Json<ResolveChallengeRequest>,
) -> HttpResponse {
    api_result(
        state
            .services
            .challenges
            .resolve(&admin.id, path.into_inner(), body.result)
            .await,
    )
}

/// `POST /api/admin/wallet/{user_id}/credit`
pub async fn credit_wallet(
    state: web::Data<ApiState>,
    AdminUser(admin): AdminUser,
    path: web::Path<String>,
    body: web::Json<CreditRequest>,
) -> HttpResponse {
    let user_id = path.into_inner();
    let body = body.into_inner();
    info!(
        "Admin {} credits {} (amount {}, coins {})",
        admin.id, user_id, body.amount, body.coins
    );
    api_result(
        state
            .services
            .users
            .credit(&user_id, body.amount, body.coins, body.reference.as_deref())
            .await,
    )
}

/// `POST /api/admin/telegram/broadcast`
pub async fn broadcast(
    state: web::Data<ApiState>,
    AdminUser(admin): AdminUser,
    body: web::Json<BroadcastRequest>,
) -> HttpResponse {
    let channel_ready = state
        .telegram
        .as_ref()
        .is_some_and(|tg| tg.channel.is_some());
    if !channel_ready {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ServiceUnavailable,
            "Telegram channel is not configured",
        );
    }

    let text = body.into_inner().message;
    if text.trim().is_empty() {
        return api_result::<(), _>(Err(BantahError::validation("Message must not be empty")));
    }

    info!("Admin {} queued a channel broadcast", admin.id);
    let result = state
        .services
        .broadcaster
        .broadcast(ChannelPost::Custom { text })
        .await
        .map(|()| serde_json::json!({ "queued": true }));
    api_result(result)
}

/// `GET /api/admin/telegram/test`
pub async fn test_telegram(state: web::Data<ApiState>, _admin: AdminUser) -> HttpResponse {
    let Some(telegram) = state.telegram.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ServiceUnavailable,
            "Telegram bot is not configured",
        );
    };

    let report = test_connection(telegram.api.as_ref(), telegram.channel.as_ref()).await;
    success_response(report)
}
