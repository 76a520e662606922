use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::api::constants::page_limit;
use crate::api::middleware::AuthUser;
use crate::api::response::api_result;
use crate::api::state::ApiState;
use crate::config::TS_EXPORT_PATH;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct MarkedRead {
    pub updated: u64,
}

/// `GET /api/notifications`
pub async fn list_notifications(
    state: web::Data<ApiState>,
    user: AuthUser,
    query: web::Query<NotificationQuery>,
) -> HttpResponse {
    api_result(
        state
            .services
            .notifications
            .list(&user.id, query.unread_only, page_limit(query.limit))
            .await,
    )
}

/// `POST /api/notifications/{id}/read`
pub async fn mark_read(
    state: web::Data<ApiState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HttpResponse {
    let result = state
        .services
        .notifications
        .mark_read(&user.id, path.into_inner())
        .await
        .map(|()| MarkedRead { updated: 1 });
    api_result(result)
}

/// `POST /api/notifications/read-all`
pub async fn mark_all_read(state: web::Data<ApiState>, user: AuthUser) -> HttpResponse {
    let result = state
        .services
        .notifications
        .mark_all_read(&user.id)
        .await
        .map(|updated| MarkedRead { updated });
    api_result(result)
}
