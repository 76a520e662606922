//! API 响应封装
//!
//! Every endpoint answers with `{code, message, data}`. `code` is 0 on
//! success, otherwise an [`ErrorCode`].

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::error_code::ErrorCode;
use crate::config::TS_EXPORT_PATH;
use crate::errors::BantahError;

#[derive(Serialize, Deserialize, Clone, Debug, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: code as i32,
            message: message.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, error_code: ErrorCode, message: &str) -> HttpResponse {
    json_response::<()>(status, error_code, message, None)
}

/// 从 BantahError 构建错误响应（自动映射 HTTP 状态码和 ErrorCode）
pub fn error_from_bantah(err: &BantahError) -> HttpResponse {
    error_response(err.http_status(), ErrorCode::from(err), &err.message())
}

/// 统一 Result → HttpResponse 转换
///
/// 成功时返回 200 OK + JSON 数据，失败时自动映射 BantahError。
pub fn api_result<T, E>(result: Result<T, E>) -> HttpResponse
where
    T: Serialize,
    E: Into<BantahError>,
{
    match result {
        Ok(data) => success_response(data),
        Err(e) => {
            let err: BantahError = e.into();
            if err.http_status().is_server_error() {
                tracing::error!("Request failed: {}", err.format_simple());
            }
            error_from_bantah(&err)
        }
    }
}

/// Lets extractors reject with the same envelope handlers use
impl ResponseError for BantahError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        error_from_bantah(self)
    }
}
