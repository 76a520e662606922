//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};
use ts_rs::TS;

use crate::config::TS_EXPORT_PATH;
use crate::errors::BantahError;

/// API 错误码枚举
///
/// 使用 serde_repr 序列化为数字，ts-rs 自动生成 TypeScript 类型。
/// 按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 2000-2099: 认证错误
/// - 3000-3099: 钱包错误
/// - 4000-4099: 活动与挑战错误
/// - 5000-5099: Telegram 错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[ts(rename = "ErrorCode")]
#[ts(repr(enum))]
#[repr(i32)]
pub enum ErrorCode {
    // 成功
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    Unauthorized = 1001,
    Forbidden = 1003,
    NotFound = 1004,
    InternalServerError = 1005,
    Conflict = 1009,
    ServiceUnavailable = 1030,

    // 认证错误 2000-2099
    TokenInvalid = 2002,
    RateLimitExceeded = 2004,

    // 钱包错误 3000-3099
    InsufficientFunds = 3000,

    // 活动与挑战错误 4000-4099
    DatabaseError = 4000,

    // Telegram 错误 5000-5099
    TelegramError = 5000,
    LinkExpired = 5001,
    AlreadyLinked = 5002,
    NotLinked = 5003,
}

impl From<&BantahError> for ErrorCode {
    fn from(err: &BantahError) -> Self {
        match err {
            BantahError::Validation(_) => ErrorCode::BadRequest,
            BantahError::NotFound(_) => ErrorCode::NotFound,
            BantahError::Conflict(_) => ErrorCode::Conflict,
            BantahError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            BantahError::Unauthorized(_) => ErrorCode::Unauthorized,
            BantahError::Forbidden(_) => ErrorCode::Forbidden,
            BantahError::LinkExpired(_) => ErrorCode::LinkExpired,
            BantahError::AlreadyLinked(_) => ErrorCode::AlreadyLinked,
            BantahError::NotLinked(_) => ErrorCode::NotLinked,
            BantahError::Telegram(_) => ErrorCode::TelegramError,
            BantahError::DatabaseConfig(_)
            | BantahError::DatabaseConnection(_)
            | BantahError::DatabaseOperation(_) => ErrorCode::DatabaseError,
            BantahError::FileOperation(_) | BantahError::Serialization(_) => {
                ErrorCode::InternalServerError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            ErrorCode::from(&BantahError::insufficient_funds(500, 100)),
            ErrorCode::InsufficientFunds
        );
        assert_eq!(
            ErrorCode::from(&BantahError::link_expired("gone")),
            ErrorCode::LinkExpired
        );
        assert_eq!(
            ErrorCode::from(&BantahError::database_operation("boom")),
            ErrorCode::DatabaseError
        );
    }

    #[test]
    fn test_error_code_serializes_as_number() {
        let json = serde_json::to_string(&ErrorCode::InsufficientFunds).unwrap();
        assert_eq!(json, "3000");
        assert_eq!(serde_json::to_string(&ErrorCode::Success).unwrap(), "0");
    }
}
