//! API 路由配置
//!
//! 所有接口挂在 `/api` 下，按功能模块拆分。

use actix_web::web;

use super::handlers::{account, admin, challenges, events, health, notifications, telegram};
use super::middleware::{InternalAuth, link_rate_limiter};

/// 活动路由 `/events`
pub fn events_routes() -> actix_web::Scope {
    web::scope("/events")
        .route("", web::get().to(events::list_events))
        .route("", web::post().to(events::create_event))
        .route("/{id}", web::get().to(events::get_event))
        .route("/{id}/join", web::post().to(events::join_event))
}

/// 挑战路由 `/challenges`
pub fn challenges_routes() -> actix_web::Scope {
    web::scope("/challenges")
        .route("", web::get().to(challenges::list_challenges))
        .route("", web::post().to(challenges::create_challenge))
        .route("/{id}", web::get().to(challenges::get_challenge))
        .route("/{id}/accept", web::post().to(challenges::accept_challenge))
        .route("/{id}/decline", web::post().to(challenges::decline_challenge))
        .route("/{id}/cancel", web::post().to(challenges::cancel_challenge))
}

/// 通知路由 `/notifications`
pub fn notifications_routes() -> actix_web::Scope {
    web::scope("/notifications")
        .route("", web::get().to(notifications::list_notifications))
        // read-all must be registered before /{id}/read
        .route("/read-all", web::post().to(notifications::mark_all_read))
        .route("/{id}/read", web::post().to(notifications::mark_read))
}

/// Telegram 路由 `/telegram`
///
/// `/user/{telegram_id}` 仅供 relay 使用，需要内部令牌。
pub fn telegram_routes(internal_token: &str) -> actix_web::Scope {
    web::scope("/telegram")
        .route(
            "/verify-link",
            web::get()
                .to(telegram::verify_link)
                .wrap(link_rate_limiter()),
        )
        .route("/status", web::get().to(telegram::link_status))
        .route("/link", web::delete().to(telegram::unlink))
        .route("/webhook", web::post().to(telegram::webhook))
        .service(
            web::scope("/user")
                .wrap(InternalAuth::new(internal_token))
                .route("/{telegram_id}", web::get().to(telegram::user_by_telegram_id)),
        )
}

/// 管理路由 `/admin`
pub fn admin_routes() -> actix_web::Scope {
    web::scope("/admin")
        .route("/events/{id}/resolve", web::post().to(admin::resolve_event))
        .route("/events/{id}/cancel", web::post().to(admin::cancel_event))
        .route(
            "/challenges/{id}/resolve",
            web::post().to(admin::resolve_challenge),
        )
        .route("/wallet/{user_id}/credit", web::post().to(admin::credit_wallet))
        .route("/telegram/broadcast", web::post().to(admin::broadcast))
        .route("/telegram/test", web::get().to(admin::test_telegram))
}

/// 完整 `/api` 作用域
pub fn api_scope(internal_token: &str) -> actix_web::Scope {
    web::scope("/api")
        .route("/health", web::get().to(health::health_check))
        .route("/me", web::get().to(account::get_me))
        .route("/wallet", web::get().to(account::get_wallet))
        .route(
            "/wallet/transactions",
            web::get().to(account::get_transactions),
        )
        .route("/leaderboard", web::get().to(account::get_leaderboard))
        .service(events_routes())
        .service(challenges_routes())
        .service(notifications_routes())
        .service(telegram_routes(internal_token))
        .service(admin_routes())
}
