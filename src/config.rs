//! 命令行参数、环境变量与默认配置。

use clap::{Parser, ValueEnum};
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const AUTH_COOKIE_NAME: &str = "PANEL_SESSION";
pub const DEFAULT_BROWSE_DIR: &str = "/app/browse";
pub const DEFAULT_SPOOL_DIR: &str = "/app/uploads";
pub const DEFAULT_UPLOADER_BIN: &str = "chomik";
pub const DEFAULT_UPLOADER_DEST: &str = "/Moje_Uploady";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOGIN_WINDOW_SECS: u64 = 5 * 60;
pub const DEFAULT_LOGIN_LOCKOUT_SECS: u64 = 10 * 60;
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 10 * 1024 * 1024 * 1024;
pub const DEFAULT_SPOOL_TTL_SECS: u64 = 24 * 60 * 60;
pub const SESSION_PRUNE_INTERVAL_SECS: u64 = 300;
pub const SPOOL_CLEAN_INTERVAL_SECS: u64 = 900;

/// 面板变体：决定首页与文件列表接口的返回形态。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PanelMode {
    /// 可逐级进入子目录的浏览模式。
    #[default]
    Browse,
    /// 一次性递归列出全部文件。
    Flat,
    /// 由浏览器直接上传文件。
    Upload,
}

/// CLI arguments and environment configuration for the panel.
#[derive(Parser, Debug)]
#[command(name = "chomik-panel", version = VERSION_INFO, about = "Chomik upload panel")]
pub struct Args {
    #[arg(
        short = 'd',
        long,
        env = "PANEL_BROWSE_DIR",
        default_value = DEFAULT_BROWSE_DIR,
        help = "Read-only folder exposed for browsing"
    )]
    pub browse_dir: String,
    #[arg(
        long,
        env = "PANEL_SPOOL_DIR",
        default_value = DEFAULT_SPOOL_DIR,
        help = "Spool directory for browser uploads"
    )]
    pub spool_dir: String,
    #[arg(
        short = 'm',
        long,
        env = "PANEL_MODE",
        value_enum,
        default_value_t = PanelMode::Browse,
        help = "Panel variant served at /"
    )]
    pub mode: PanelMode,
    #[arg(
        long,
        env = "SECRET_KEY",
        hide_env_values = true,
        help = "Session cookie signing secret"
    )]
    pub secret_key: Option<String>,
    #[arg(
        long,
        env = "PANEL_PASSWORD_HASH",
        hide_env_values = true,
        help = "Hex SHA-256 digest of the panel password"
    )]
    pub password_hash: Option<String>,
    #[arg(
        long,
        env = "PANEL_PASSWORD",
        hide_env_values = true,
        help = "Plaintext panel password (hashed at startup)"
    )]
    pub password: Option<String>,
    #[arg(
        long,
        env = "CHOMIK_BIN",
        default_value = DEFAULT_UPLOADER_BIN,
        help = "Uploader binary"
    )]
    pub uploader_bin: String,
    #[arg(long, env = "CHOMIK_USERNAME", help = "Uploader account name")]
    pub uploader_user: Option<String>,
    #[arg(
        long,
        env = "CHOMIK_PASSWORD",
        hide_env_values = true,
        help = "Uploader account password"
    )]
    pub uploader_pass: Option<String>,
    #[arg(
        long,
        env = "CHOMIK_DEST",
        default_value = DEFAULT_UPLOADER_DEST,
        help = "Remote destination folder"
    )]
    pub uploader_dest: String,
    #[arg(
        short = 'b',
        long = "bind",
        env = "PANEL_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP/HTTPS"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "PANEL_HTTP_PORT",
        default_value_t = 5000,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'P',
        long,
        env = "PANEL_HTTPS_PORT",
        help = "HTTPS port (HTTPS disabled when unset)"
    )]
    pub https_port: Option<u16>,
    #[arg(short = 'c', long, env = "PANEL_TLS_CERT", help = "TLS cert path")]
    pub tls_cert: Option<String>,
    #[arg(short = 'k', long, env = "PANEL_TLS_KEY", help = "TLS key path")]
    pub tls_key: Option<String>,
    #[arg(long, env = "PANEL_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "PANEL_TRUST_FORWARDED",
        help = "Key login rate limiting on X-Forwarded-For (only behind a reverse proxy)"
    )]
    pub trust_forwarded: bool,
    #[arg(
        long,
        env = "PANEL_SESSION_TTL_SECS",
        default_value_t = DEFAULT_SESSION_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_SECS),
        help = "Session expiration in seconds"
    )]
    pub session_ttl_secs: u64,
    #[arg(
        long,
        env = "PANEL_LOGIN_MAX_ATTEMPTS",
        default_value_t = DEFAULT_LOGIN_MAX_ATTEMPTS,
        help = "Max login attempts before lockout (0 to disable)"
    )]
    pub login_max_attempts: u32,
    #[arg(
        long,
        env = "PANEL_LOGIN_WINDOW_SECS",
        default_value_t = DEFAULT_LOGIN_WINDOW_SECS,
        help = "Login attempt window in seconds"
    )]
    pub login_window_secs: u64,
    #[arg(
        long,
        env = "PANEL_LOGIN_LOCKOUT_SECS",
        default_value_t = DEFAULT_LOGIN_LOCKOUT_SECS,
        help = "Login lockout time after max attempts"
    )]
    pub login_lockout_secs: u64,
    #[arg(
        long,
        env = "PANEL_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max browser upload size in bytes (0 to disable)"
    )]
    pub upload_max_size: u64,
    #[arg(
        long,
        env = "PANEL_SPOOL_TTL_SECS",
        default_value_t = DEFAULT_SPOOL_TTL_SECS,
        help = "Stale spool cleanup threshold in seconds (0 to disable)"
    )]
    pub spool_ttl_secs: u64,
}
