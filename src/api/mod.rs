//! HTTP API
//!
//! JSON endpoints under `/api`, answering with the `{code, message, data}`
//! envelope from [`response`].

pub mod constants;
pub mod error_code;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use error_code::ErrorCode;
pub use jwt::{JwtService, SessionClaims};
pub use response::{ApiResponse, api_result, error_response, json_response, success_response};
pub use routes::api_scope;
pub use state::{ApiState, TelegramState};
