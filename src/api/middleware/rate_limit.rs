//! Per-IP rate limiting for the account-linking endpoint

use actix_governor::{Governor, GovernorConfigBuilder, KeyExtractor, SimpleKeyExtractionError};
use actix_web::dev::ServiceRequest;
use governor::middleware::NoOpMiddleware;
use tracing::debug;

/// 基于连接 IP 的限流 key 提取器
///
/// 使用 TCP peer address，客户端无法伪造。
#[derive(Clone, Copy)]
pub struct PeerIpKeyExtractor;

impl KeyExtractor for PeerIpKeyExtractor {
    type Key = String;
    type KeyExtractionError = SimpleKeyExtractionError<&'static str>;

    fn extract(&self, req: &ServiceRequest) -> Result<Self::Key, Self::KeyExtractionError> {
        req.connection_info()
            .peer_addr()
            .map(str::to_string)
            .ok_or_else(|| SimpleKeyExtractionError::new("Unable to extract peer IP"))
    }
}

/// 创建账号绑定限流器
///
/// 配置：每 2 秒补充 1 个令牌，突发最多 5 次请求
/// 超限返回 HTTP 429 Too Many Requests
pub fn link_rate_limiter() -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let config = GovernorConfigBuilder::default()
        .seconds_per_request(2)
        .burst_size(5)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("Invalid rate limit config");

    debug!("Link rate limiter created: 1 req/2s, burst 5");
    Governor::new(&config)
}
