//! 路由组装：页面、API、会话闸门与公共中间件。

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::auth::{self, AuthConfig};
use crate::config::PanelMode;
use crate::error::panic_response;
use crate::http::{add_security_headers, connect_ip, resolve_client_ip};
use crate::share::Share;
use crate::spool::Spool;
use crate::uploader::Uploader;
use crate::{files, frontend, upload, version};

/// 路由所需的共享组件。
pub struct AppContext {
    pub share: Arc<Share>,
    pub spool: Arc<Spool>,
    pub auth: Arc<AuthConfig>,
    pub uploader: Uploader,
    pub mode: PanelMode,
    pub upload_max_size: u64,
}

/// 构建完整路由；`RequestScheme` 由各监听器自行注入。
pub fn build_router(ctx: AppContext) -> Router {
    let upload_limit = match ctx.upload_max_size {
        0 => DefaultBodyLimit::disable(),
        limit => DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX)),
    };

    Router::new()
        .route("/", get(frontend::index))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", get(auth::logout))
        .route("/api/files", get(files::list_files))
        .route("/api/upload", post(upload::upload_from_share))
        .route("/upload", post(upload::upload_spooled).layer(upload_limit))
        .route("/api/version", get(version::get_version_info))
        .fallback(frontend::serve_assets)
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(middleware::from_fn(add_security_headers))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let client_ip = resolve_client_ip(request.headers(), connect_ip(request.extensions()))
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(ctx.share))
        .layer(Extension(ctx.spool))
        .layer(Extension(ctx.auth))
        .layer(Extension(ctx.uploader))
        .layer(Extension(ctx.mode))
}
