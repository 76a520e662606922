//! Shared state handed to every handler through `web::Data`

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::jwt::JwtService;
use crate::config::TelegramMode;
use crate::services::AppServices;
use crate::telegram::{ChatId, TelegramApi, UpdateHandler};

/// Bot wiring exposed to the webhook and admin endpoints
pub struct TelegramState {
    pub api: Arc<dyn TelegramApi>,
    pub handler: Arc<dyn UpdateHandler>,
    pub channel: Option<ChatId>,
    pub mode: TelegramMode,
    pub webhook_secret: Option<String>,
}

#[derive(Clone)]
pub struct ApiState {
    pub services: AppServices,
    pub jwt: Arc<JwtService>,
    /// `None` when no bot token is configured
    pub telegram: Option<Arc<TelegramState>>,
    pub internal_token: String,
    pub admin_usernames: Arc<Vec<String>>,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(services: AppServices, jwt: JwtService) -> Self {
        Self {
            services,
            jwt: Arc::new(jwt),
            telegram: None,
            internal_token: String::new(),
            admin_usernames: Arc::new(Vec::new()),
            started_at: Utc::now(),
        }
    }

    pub fn with_telegram(mut self, telegram: TelegramState) -> Self {
        self.telegram = Some(Arc::new(telegram));
        self
    }

    pub fn with_internal_token(mut self, token: impl Into<String>) -> Self {
        self.internal_token = token.into();
        self
    }

    pub fn with_admin_usernames(mut self, usernames: Vec<String>) -> Self {
        self.admin_usernames = Arc::new(usernames);
        self
    }

    pub fn is_admin_username(&self, username: &str) -> bool {
        self.admin_usernames
            .iter()
            .any(|name| name.trim_start_matches('@').eq_ignore_ascii_case(username))
    }
}
