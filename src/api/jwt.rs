use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ApiConfig;
use crate::utils::generate_random_code;

/// Session token claims
///
/// `sub` is the user id. `username` is used to provision the user the first
/// time the token is seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// HS256 session token signer and verifier
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_hours: u64,
}

impl JwtService {
    pub fn new(secret: &str, session_hours: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_hours,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        // 获取 JWT secret，如果为空则生成一个随机值（仅本进程有效）
        let secret = if config.jwt_secret.is_empty() {
            warn!("JWT secret not configured, generating a random one; sessions end on restart");
            generate_random_code(48)
        } else {
            config.jwt_secret.clone()
        };
        Self::new(&secret, config.session_hours)
    }

    pub fn issue(
        &self,
        user_id: &str,
        username: Option<&str>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            username: username.map(str::to_string),
            first_name: None,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.session_hours as i64)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(jsonwebtoken::errors::Error::from(
                jsonwebtoken::errors::ErrorKind::InvalidSubject,
            ));
        }

        Ok(token_data.claims)
    }
}
