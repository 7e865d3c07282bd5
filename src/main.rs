//! Chomik panel server binary.
//!
//! A password-gated web panel that lists files under a local folder and
//! hands them to the external `chomik` uploader. The entry point builds the
//! shared components, the Axum router and the HTTP/HTTPS listeners.

mod app;
mod auth;
mod background;
mod config;
mod credentials;
mod error;
mod files;
mod frontend;
mod http;
mod logging;
mod messages;
mod share;
mod spool;
mod tls;
mod upload;
mod uploader;
mod version;

use axum::extract::Extension;
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::app::{AppContext, build_router};
use crate::auth::{AuthConfig, signing_key};
use crate::background::spawn_background_tasks;
use crate::config::{Args, PanelMode};
use crate::credentials::CredentialChecker;
use crate::http::{RequestScheme, build_cors_layer};
use crate::share::Share;
use crate::spool::Spool;
use crate::uploader::{ProcessRunner, Uploader, UploaderConfig};

shadow!(build);

/// Starts the panel and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let checker = CredentialChecker::from_config(args.password_hash.as_deref(), args.password.as_deref())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    if !checker.is_configured() {
        warn!("no panel password configured, every login attempt will be rejected");
    }

    let share = Arc::new(Share::new(PathBuf::from(&args.browse_dir)));
    if tokio::fs::metadata(share.root_path()).await.is_err() {
        warn!(path = ?share.root_path(), "browse folder does not exist, listings will be empty");
    }

    let spool = Arc::new(Spool::new(PathBuf::from(&args.spool_dir)));
    if let Err(err) = spool.ensure_root().await {
        if args.mode == PanelMode::Upload {
            return Err(err);
        }
        warn!(path = ?spool.root_path(), error = %err, "spool folder unavailable");
    }

    let auth_config = Arc::new(AuthConfig {
        checker,
        key: signing_key(args.secret_key.as_deref()),
        sessions: Mutex::new(HashMap::new()),
        session_ttl: Duration::from_secs(args.session_ttl_secs),
        login_attempts: Mutex::new(HashMap::new()),
        login_window: Duration::from_secs(args.login_window_secs),
        login_max_attempts: args.login_max_attempts,
        login_lockout: Duration::from_secs(args.login_lockout_secs),
        trust_forwarded: args.trust_forwarded,
    });

    let uploader = Uploader::new(
        UploaderConfig {
            program: args.uploader_bin.clone(),
            username: args.uploader_user.clone(),
            password: args.uploader_pass.clone(),
            destination: args.uploader_dest.clone(),
        },
        Arc::new(ProcessRunner),
    );
    if uploader.ensure_configured().is_err() {
        warn!("CHOMIK_USERNAME or CHOMIK_PASSWORD missing, uploads will fail");
    }

    let auth_for_tasks = auth_config.clone();
    let spool_for_tasks = spool.clone();

    let mut app = build_router(AppContext {
        share,
        spool,
        auth: auth_config,
        uploader,
        mode: args.mode,
        upload_max_size: args.upload_max_size,
    });
    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let handle = Handle::new();

    info!(mode = ?args.mode, "🚀 Starting HTTP server at {}", http_addr);
    let http_app = app.clone().layer(Extension(RequestScheme::Http));
    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(http_app.into_make_service_with_connect_info::<SocketAddr>());

    let https_server = match args.https_port {
        Some(port) => {
            let https_addr = SocketAddr::new(host, port);
            let tls_config = tls::build_rustls_config(&args, host).await?;
            info!("🔒 Starting HTTPS server at {}", https_addr);
            let https_app = app.layer(Extension(RequestScheme::Https));
            Some(
                axum_server::bind_rustls(https_addr, tls_config)
                    .handle(handle.clone())
                    .serve(https_app.into_make_service_with_connect_info::<SocketAddr>()),
            )
        }
        None => None,
    };
    let https_server = async move {
        match https_server {
            Some(server) => server.await,
            None => std::future::pending().await,
        }
    };

    spawn_background_tasks(
        auth_for_tasks,
        spool_for_tasks,
        Duration::from_secs(args.spool_ttl_secs),
    );
    tokio::select! {
        result = http_server => result?,
        result = https_server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
