//! API 模块常量定义
//!
//! 包含认证、Cookie、请求头等相关的硬编码常量。

/// Session Token Cookie 名称
pub const SESSION_COOKIE_NAME: &str = "bantah_session";

/// Telegram webhook 密钥请求头
pub const TELEGRAM_SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// 服务间调用令牌请求头
pub const INTERNAL_TOKEN_HEADER: &str = "X-Internal-Token";

/// 列表接口默认条数
pub const DEFAULT_PAGE_LIMIT: u64 = 50;

/// 列表接口最大条数
pub const MAX_PAGE_LIMIT: u64 = 200;

/// Clamp a `?limit=` query value into `1..=MAX_PAGE_LIMIT`
pub fn page_limit(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT)
}
