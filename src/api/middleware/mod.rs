pub mod auth;
pub mod internal;
pub mod rate_limit;
pub mod timing;

pub use auth::{AdminUser, AuthUser};
pub use internal::InternalAuth;
pub use rate_limit::link_rate_limiter;
pub use timing::TimingMiddleware;
