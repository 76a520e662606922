//! Session authentication extractors
//!
//! Handlers take [`AuthUser`] or [`AdminUser`] as an argument. The session
//! token comes from `Authorization: Bearer …` first, then from the session
//! cookie. A valid token for an unknown user provisions that user.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use futures_util::future::LocalBoxFuture;
use tracing::{info, trace};

use crate::api::constants::SESSION_COOKIE_NAME;
use crate::api::state::ApiState;
use crate::errors::BantahError;
use crate::services::fallback_username;

/// The signed-in user of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
}

/// A signed-in user with the admin flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub AuthUser);

/// 从 Authorization header 提取 Bearer token
fn extract_bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_session_token(req: &HttpRequest) -> Option<String> {
    extract_bearer_token(req).or_else(|| {
        req.cookie(SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .filter(|s| !s.is_empty())
    })
}

async fn authenticate(state: web::Data<ApiState>, token: Option<String>) -> Result<AuthUser, BantahError> {
    let token = token.ok_or_else(|| BantahError::unauthorized("Missing session token"))?;

    let claims = state.jwt.validate(&token).map_err(|e| {
        info!("Session token validation failed: {}", e);
        BantahError::unauthorized("Invalid or expired session token")
    })?;

    let username = claims
        .username
        .clone()
        .unwrap_or_else(|| fallback_username(&claims.sub));
    let user = state
        .services
        .users
        .ensure_user(&claims.sub, &username, claims.first_name.as_deref())
        .await?;

    trace!("Authenticated user {} (@{})", user.id, user.username);
    Ok(AuthUser {
        id: user.id,
        username: user.username,
        is_admin: user.is_admin,
    })
}

fn state_of(req: &HttpRequest) -> Result<web::Data<ApiState>, BantahError> {
    req.app_data::<web::Data<ApiState>>()
        .cloned()
        .ok_or_else(|| BantahError::unauthorized("Authentication is not available"))
}

impl FromRequest for AuthUser {
    type Error = BantahError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = state_of(req);
        let token = extract_session_token(req);
        Box::pin(async move { authenticate(state?, token).await })
    }
}

impl FromRequest for AdminUser {
    type Error = BantahError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = state_of(req);
        let token = extract_session_token(req);
        Box::pin(async move {
            let state = state?;
            let mut user = authenticate(state.clone(), token).await?;

            // Configured admins who signed up after startup are promoted here
            if !user.is_admin && state.is_admin_username(&user.username) {
                state
                    .services
                    .users
                    .seed_admins(std::slice::from_ref(&user.username))
                    .await?;
                user.is_admin = true;
            }

            if !user.is_admin {
                info!("Admin access denied for {}", user.id);
                return Err(BantahError::forbidden("Admin access required"));
            }
            Ok(AdminUser(user))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_takes_precedence_over_cookie() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer header-token"))
            .cookie(actix_web::cookie::Cookie::new(SESSION_COOKIE_NAME, "cookie-token"))
            .to_http_request();
        assert_eq!(extract_session_token(&req).as_deref(), Some("header-token"));

        let req = TestRequest::default()
            .cookie(actix_web::cookie::Cookie::new(SESSION_COOKIE_NAME, "cookie-token"))
            .to_http_request();
        assert_eq!(extract_session_token(&req).as_deref(), Some("cookie-token"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert_eq!(extract_session_token(&req), None);
    }
}
