//! Peer-to-peer challenge endpoints

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::api::constants::page_limit;
use crate::api::middleware::AuthUser;
use crate::api::response::api_result;
use crate::api::state::ApiState;
use crate::errors::BantahError;
use crate::services::CreateChallengeRequest;

#[derive(Debug, Deserialize)]
pub struct ChallengeListQuery {
    #[serde(default)]
    pub active_only: bool,
    pub limit: Option<u64>,
}

/// `GET /api/challenges`: challenges the caller created or received
pub async fn list_challenges(
    state: web::Data<ApiState>,
    user: AuthUser,
    query: web::Query<ChallengeListQuery>,
) -> HttpResponse {
    api_result(
        state
            .services
            .challenges
            .list_for_user(&user.id, query.active_only, page_limit(query.limit))
            .await,
    )
}

/// `POST /api/challenges`
pub async fn create_challenge(
    state: web::Data<ApiState>,
    user: AuthUser,
    body: web::Json<CreateChallengeRequest>,
) -> HttpResponse {
    api_result(
        state
            .services
            .challenges
            .create_challenge(&user.id, body.into_inner())
            .await,
    )
}

/// `GET /api/challenges/{id}`
///
/// Open challenges (no opponent yet) are visible to anyone signed in.
/// Otherwise only the two parties and admins see a challenge.
pub async fn get_challenge(
    state: web::Data<ApiState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HttpResponse {
    let challenge_id = path.into_inner();
    let result = state
        .services
        .challenges
        .get(challenge_id)
        .await
        .and_then(|challenge| {
            let open = challenge.challenged_id.is_none();
            if challenge.involves(&user.id) || open || user.is_admin {
                Ok(challenge)
            } else {
                Err(BantahError::not_found(format!(
                    "Challenge {} not found",
                    challenge_id
                )))
            }
        });
    api_result(result)
}

/// `POST /api/challenges/{id}/accept`
pub async fn accept_challenge(
    state: web::Data<ApiState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HttpResponse {
    api_result(
        state
            .services
            .challenges
            .accept(&user.id, path.into_inner())
            .await,
    )
}

/// `POST /api/challenges/{id}/decline`
pub async fn decline_challenge(
    state: web::Data<ApiState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HttpResponse {
    api_result(
        state
            .services
            .challenges
            .decline(&user.id, path.into_inner())
            .await,
    )
}

/// `POST /api/challenges/{id}/cancel`
pub async fn cancel_challenge(
    state: web::Data<ApiState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> HttpResponse {
    api_result(
        state
            .services
            .challenges
            .cancel(&user.id, path.into_inner())
            .await,
    )
}
