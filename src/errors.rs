use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BantahError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    InsufficientFunds { required: i64, available: i64 },
    Unauthorized(String),
    Forbidden(String),
    LinkExpired(String),
    AlreadyLinked(String),
    NotLinked(String),
    Telegram(String),
    Serialization(String),
}

impl BantahError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            BantahError::DatabaseConfig(_) => "E001",
            BantahError::DatabaseConnection(_) => "E002",
            BantahError::DatabaseOperation(_) => "E003",
            BantahError::FileOperation(_) => "E004",
            BantahError::Validation(_) => "E005",
            BantahError::NotFound(_) => "E006",
            BantahError::Conflict(_) => "E007",
            BantahError::InsufficientFunds { .. } => "E008",
            BantahError::Unauthorized(_) => "E009",
            BantahError::Forbidden(_) => "E010",
            BantahError::LinkExpired(_) => "E011",
            BantahError::AlreadyLinked(_) => "E012",
            BantahError::NotLinked(_) => "E013",
            BantahError::Telegram(_) => "E014",
            BantahError::Serialization(_) => "E015",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            BantahError::DatabaseConfig(_) => "Database Configuration Error",
            BantahError::DatabaseConnection(_) => "Database Connection Error",
            BantahError::DatabaseOperation(_) => "Database Operation Error",
            BantahError::FileOperation(_) => "File Operation Error",
            BantahError::Validation(_) => "Validation Error",
            BantahError::NotFound(_) => "Resource Not Found",
            BantahError::Conflict(_) => "Conflict",
            BantahError::InsufficientFunds { .. } => "Insufficient Funds",
            BantahError::Unauthorized(_) => "Unauthorized",
            BantahError::Forbidden(_) => "Forbidden",
            BantahError::LinkExpired(_) => "Link Expired",
            BantahError::AlreadyLinked(_) => "Already Linked",
            BantahError::NotLinked(_) => "Account Not Linked",
            BantahError::Telegram(_) => "Telegram API Error",
            BantahError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> String {
        match self {
            BantahError::InsufficientFunds {
                required,
                available,
            } => format!(
                "Insufficient balance: {} required, {} available",
                required, available
            ),
            BantahError::DatabaseConfig(msg)
            | BantahError::DatabaseConnection(msg)
            | BantahError::DatabaseOperation(msg)
            | BantahError::FileOperation(msg)
            | BantahError::Validation(msg)
            | BantahError::NotFound(msg)
            | BantahError::Conflict(msg)
            | BantahError::Unauthorized(msg)
            | BantahError::Forbidden(msg)
            | BantahError::LinkExpired(msg)
            | BantahError::AlreadyLinked(msg)
            | BantahError::NotLinked(msg)
            | BantahError::Telegram(msg)
            | BantahError::Serialization(msg) => msg.clone(),
        }
    }

    /// HTTP 状态码映射
    pub fn http_status(&self) -> StatusCode {
        match self {
            BantahError::Validation(_) => StatusCode::BAD_REQUEST,
            BantahError::NotFound(_) => StatusCode::NOT_FOUND,
            BantahError::Conflict(_) | BantahError::AlreadyLinked(_) => StatusCode::CONFLICT,
            BantahError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            BantahError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BantahError::Forbidden(_) | BantahError::NotLinked(_) => StatusCode::FORBIDDEN,
            BantahError::LinkExpired(_) => StatusCode::GONE,
            BantahError::Telegram(_) => StatusCode::BAD_GATEWAY,
            BantahError::DatabaseConfig(_)
            | BantahError::DatabaseConnection(_)
            | BantahError::DatabaseOperation(_)
            | BantahError::FileOperation(_)
            | BantahError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for BantahError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for BantahError {}

// 便捷的构造函数
impl BantahError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        BantahError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        BantahError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        BantahError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        BantahError::FileOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        BantahError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        BantahError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        BantahError::Conflict(msg.into())
    }

    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        BantahError::InsufficientFunds {
            required,
            available,
        }
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        BantahError::Unauthorized(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        BantahError::Forbidden(msg.into())
    }

    pub fn link_expired<T: Into<String>>(msg: T) -> Self {
        BantahError::LinkExpired(msg.into())
    }

    pub fn already_linked<T: Into<String>>(msg: T) -> Self {
        BantahError::AlreadyLinked(msg.into())
    }

    pub fn not_linked<T: Into<String>>(msg: T) -> Self {
        BantahError::NotLinked(msg.into())
    }

    pub fn telegram<T: Into<String>>(msg: T) -> Self {
        BantahError::Telegram(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        BantahError::Serialization(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for BantahError {
    fn from(err: sea_orm::DbErr) -> Self {
        BantahError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for BantahError {
    fn from(err: std::io::Error) -> Self {
        BantahError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for BantahError {
    fn from(err: serde_json::Error) -> Self {
        BantahError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for BantahError {
    fn from(err: reqwest::Error) -> Self {
        BantahError::Telegram(err.without_url().to_string())
    }
}

pub type Result<T> = std::result::Result<T, BantahError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message() {
        let err = BantahError::insufficient_funds(5000, 1200);
        assert_eq!(err.code(), "E008");
        assert_eq!(err.http_status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            err.message(),
            "Insufficient balance: 5000 required, 1200 available"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            BantahError::link_expired("x").http_status(),
            StatusCode::GONE
        );
        assert_eq!(
            BantahError::already_linked("x").http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BantahError::database_operation("x").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_format_simple() {
        let err = BantahError::not_found("Challenge 7 not found");
        assert_eq!(
            err.format_simple(),
            "Resource Not Found: Challenge 7 not found"
        );
        assert_eq!(err.to_string(), err.format_simple());
    }

    #[test]
    fn test_from_db_err() {
        let err: BantahError = sea_orm::DbErr::Custom("boom".into()).into();
        assert!(matches!(err, BantahError::DatabaseOperation(_)));
    }
}
