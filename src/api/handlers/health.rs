use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, trace};
use ts_rs::TS;

use crate::api::error_code::ErrorCode;
use crate::api::response::{json_response, success_response};
use crate::api::state::ApiState;
use crate::config::TS_EXPORT_PATH;

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct StorageHealth {
    pub status: String,
    pub backend: String,
    pub users: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct TelegramHealth {
    pub enabled: bool,
    pub mode: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub uptime_secs: i64,
    pub storage: StorageHealth,
    pub telegram: TelegramHealth,
    pub response_time_ms: u64,
}

/// `GET /api/health`
///
/// Talks to storage directly: a health probe must not depend on business logic.
pub async fn health_check(state: web::Data<ApiState>) -> HttpResponse {
    let start_time = Instant::now();
    trace!("Received health check request");

    let storage = &state.services.storage;
    let backend = storage.backend_name().to_string();

    // 检查存储健康状况（只查 count，不加载全表）
    let storage_health =
        match tokio::time::timeout(Duration::from_secs(5), storage.count_users()).await {
            Ok(Ok(count)) => StorageHealth {
                status: "healthy".to_string(),
                backend,
                users: Some(count),
                error: None,
            },
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                StorageHealth {
                    status: "unhealthy".to_string(),
                    backend,
                    users: None,
                    error: Some(format!("database error: {}", e)),
                }
            }
            Err(_) => {
                error!("Storage health check timeout");
                StorageHealth {
                    status: "unhealthy".to_string(),
                    backend,
                    users: None,
                    error: Some("timeout".to_string()),
                }
            }
        };

    let telegram = match &state.telegram {
        Some(tg) => TelegramHealth {
            enabled: true,
            mode: Some(tg.mode.as_ref().to_string()),
            channel: tg.channel.as_ref().map(ToString::to_string),
        },
        None => TelegramHealth {
            enabled: false,
            mode: None,
            channel: None,
        },
    };

    let now = Utc::now();
    let healthy = storage_health.status == "healthy";
    let body = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: now,
        uptime_secs: (now - state.started_at).num_seconds(),
        storage: storage_health,
        telegram,
        response_time_ms: start_time.elapsed().as_millis() as u64,
    };

    if healthy {
        success_response(body)
    } else {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ServiceUnavailable,
            "Service unhealthy",
            Some(body),
        )
    }
}
