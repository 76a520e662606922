//! Profile, wallet and leaderboard endpoints

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::api::constants::page_limit;
use crate::api::middleware::AuthUser;
use crate::api::response::api_result;
use crate::api::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

/// `GET /api/me`
pub async fn get_me(state: web::Data<ApiState>, user: AuthUser) -> HttpResponse {
    api_result(state.services.users.profile(&user.id).await)
}

/// `GET /api/wallet`
pub async fn get_wallet(state: web::Data<ApiState>, user: AuthUser) -> HttpResponse {
    api_result(state.services.users.wallet(&user.id).await)
}

/// `GET /api/wallet/transactions`
pub async fn get_transactions(
    state: web::Data<ApiState>,
    user: AuthUser,
    query: web::Query<LimitQuery>,
) -> HttpResponse {
    api_result(
        state
            .services
            .users
            .transactions(&user.id, page_limit(query.limit))
            .await,
    )
}

/// `GET /api/leaderboard`; public
pub async fn get_leaderboard(
    state: web::Data<ApiState>,
    query: web::Query<LimitQuery>,
) -> HttpResponse {
    api_result(state.services.leaderboard.top(page_limit(query.limit)).await)
}
