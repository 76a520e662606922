//! Prediction event endpoints

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::api::constants::page_limit;
use crate::api::middleware::AuthUser;
use crate::api::response::api_result;
use crate::api::state::ApiState;
use crate::services::{CreateEventRequest, JoinEventRequest};
use crate::storage::EventStatus;

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub status: Option<EventStatus>,
    pub category: Option<String>,
    pub limit: Option<u64>,
}

/// `GET /api/events`: public events, plus the caller's private ones when signed in
pub async fn list_events(
    state: web::Data<ApiState>,
    user: Option<AuthUser>,
    query: web::Query<EventListQuery>,
) -> HttpResponse {
    let query = query.into_inner();
    api_result(
        state
            .services
            .events
            .list_events(
                user.as_ref().map(|u| u.id.as_str()),
                query.status,
                query.category.as_deref(),
                page_limit(query.limit),
            )
            .await,
    )
}

/// `POST /api/events`
pub async fn create_event(
    state: web::Data<ApiState>,
    user: AuthUser,
    body: web::Json<CreateEventRequest>,
) -> HttpResponse {
    api_result(
        state
            .services
            .events
            .create_event(&user.id, body.into_inner())
            .await,
    )
}

/// `GET /api/events/{id}`
pub async fn get_event(
    state: web::Data<ApiState>,
    user: Option<AuthUser>,
    path: web::Path<i64>,
) -> HttpResponse {
    api_result(
        state
            .services
            .events
            .get_event(user.as_ref().map(|u| u.id.as_str()), path.into_inner())
            .await,
    )
}

/// `POST /api/events/{id}/join`
pub async fn join_event(
    state: web::Data<ApiState>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<JoinEventRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    api_result(
        state
            .services
            .events
            .join_event(&user.id, path.into_inner(), body.prediction, body.amount)
            .await,
    )
}
