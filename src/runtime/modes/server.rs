//! Server mode
//!
//! This module contains the HTTP server startup logic.
//! It configures and starts the HTTP server with all necessary routes.

use actix_cors::Cors;
use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::api_scope;
use crate::api::middleware::TimingMiddleware;
use crate::config::FrontendConfig;
use crate::runtime::lifetime;

/// Build CORS middleware for the SPA origin
///
/// The SPA sends the session cookie, so credentials are allowed and the
/// origin must be explicit.
fn build_cors_middleware(frontend: &FrontendConfig) -> Cors {
    Cors::default()
        .allowed_origin(frontend.base())
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_header(actix_web::http::header::CONTENT_TYPE)
        .allowed_header(actix_web::http::header::AUTHORIZATION)
        .allowed_header(actix_web::http::header::ACCEPT)
        .max_age(3600)
        .supports_credentials()
}

/// Headers on every response. The mini-app is embedded by Telegram's web
/// view, so resources must load cross-origin.
fn default_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Cross-Origin-Resource-Policy", "cross-origin"))
        .add(("Cross-Origin-Embedder-Policy", "unsafe-none"))
        .add(("Cache-Control", "no-cache, no-store, must-revalidate"))
}

/// Run the HTTP server
///
/// This function:
/// 1. Prepares storage, services, the bot and background jobs
/// 2. Configures and starts the HTTP server
/// 3. Listens for graceful shutdown signals
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let startup = lifetime::startup::prepare_server_startup()
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {}", e);
            e
        })?;

    let config = startup.config.clone();
    let api_state = web::Data::new(startup.api_state.clone());
    let frontend = config.frontend.clone();
    let internal_token = config.api.internal_token.clone();

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TimingMiddleware) // 最外层，记录请求延迟
            .wrap(build_cors_middleware(&frontend))
            .wrap(Compress::default())
            .wrap(default_headers())
            .app_data(api_state.clone())
            .app_data(web::PayloadConfig::new(1024 * 1024))
            .service(api_scope(&internal_token))
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .disable_signals()
        .run();
    let handle = server.handle();
    let mut server_task = tokio::spawn(server);

    // Wait for server or shutdown signal
    let result = tokio::select! {
        res = &mut server_task => res
            .context("HTTP server task panicked")
            .and_then(|r| r.context("HTTP server failed")),
        _ = lifetime::shutdown::wait_for_signal() => {
            handle.stop(true).await;
            let _ = server_task.await;
            Ok(())
        }
    };

    lifetime::shutdown::stop_tasks(startup.shutdown_tx, startup.tasks).await;
    warn!("Graceful shutdown: all tasks completed");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{HttpResponse, test};

    #[actix_rt::test]
    async fn test_default_headers_allow_embedding() {
        let app = test::init_service(
            App::new()
                .wrap(default_headers())
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let headers = resp.headers();
        assert_eq!(headers.get("Cross-Origin-Resource-Policy").unwrap(), "cross-origin");
        assert_eq!(headers.get("Cross-Origin-Embedder-Policy").unwrap(), "unsafe-none");
        assert_eq!(
            headers.get("Cache-Control").unwrap(),
            "no-cache, no-store, must-revalidate"
        );
    }
}
