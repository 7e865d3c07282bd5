//! 登录页、会话管理与登录限流。

use axum::extract::{Extension, Form};
use axum::http::{Extensions, HeaderMap, Request, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{body::Body as AxumBody, middleware};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AUTH_COOKIE_NAME, MAX_SESSION_TTL_SECS};
use crate::credentials::CredentialChecker;
use crate::error::ApiError;
use crate::frontend::render_login;
use crate::http::{RequestScheme, connect_ip, is_https_request, resolve_client_ip};
use crate::messages;

pub struct AuthConfig {
    pub checker: CredentialChecker,
    pub key: Key,
    pub sessions: Mutex<HashMap<String, SessionEntry>>,
    pub session_ttl: Duration,
    pub login_attempts: Mutex<HashMap<IpAddr, LoginAttempt>>,
    pub login_window: Duration,
    pub login_max_attempts: u32,
    pub login_lockout: Duration,
    pub trust_forwarded: bool,
}

#[derive(Debug)]
pub struct SessionEntry {
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct LoginAttempt {
    pub window_start: Instant,
    pub failures: u32,
    pub locked_until: Option<Instant>,
}

/// 由配置的密钥派生 Cookie 签名密钥；未配置时每次启动随机生成。
pub fn signing_key(secret: Option<&str>) -> Key {
    match secret.filter(|secret| !secret.is_empty()) {
        Some(secret) => Key::from(Sha512::digest(secret.as_bytes()).as_slice()),
        None => {
            warn!("SECRET_KEY not set, sessions will not survive a restart");
            Key::generate()
        }
    }
}

/// 会话闸门：未登录的请求一律重定向到登录页。
pub async fn auth_middleware(
    Extension(auth): Extension<Arc<AuthConfig>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    if is_auth_exempt_path(req.uri().path()) {
        return next.run(req).await;
    }

    let jar = SignedCookieJar::from_headers(req.headers(), auth.key.clone());
    if let Some(cookie) = jar.get(AUTH_COOKIE_NAME)
        && is_session_valid(&auth, cookie.value()).await
    {
        return next.run(req).await;
    }

    Redirect::to("/login").into_response()
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    #[serde(default)]
    password: String,
}

/// 登录页。
pub async fn login_page() -> Result<Html<String>, ApiError> {
    render_login(None)
}

/// 登录表单提交：口令正确时创建会话并跳转首页，否则带错误重新渲染登录页。
pub async fn login_submit(
    Extension(auth): Extension<Arc<AuthConfig>>,
    Extension(scheme): Extension<RequestScheme>,
    extensions: Extensions,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let client_ip = login_client_ip(&auth, &headers, &extensions);

    if let Some(retry_after) = check_login_rate_limit(&auth, client_ip).await {
        let message = format!("{} {retry_after} s.", messages::LOGIN_LOCKED_OUT);
        return Ok((StatusCode::TOO_MANY_REQUESTS, render_login(Some(&message))?).into_response());
    }

    if !auth.checker.verify(&form.password) {
        register_login_failure(&auth, client_ip).await;
        warn!(client_ip = %client_ip, "login failed");
        return Ok(render_login(Some(messages::LOGIN_INVALID_PASSWORD))?.into_response());
    }

    clear_login_failures(&auth, client_ip).await;

    let token = Uuid::new_v4().to_string();
    let expires_at = session_deadline(Instant::now(), auth.session_ttl);
    auth.sessions
        .lock()
        .await
        .insert(token.clone(), SessionEntry { expires_at });
    info!(client_ip = %client_ip, "login succeeded");

    let secure = is_https_request(&headers, scheme);
    let cookie = Cookie::build((AUTH_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(cookie_max_age_secs(auth.session_ttl)))
        .build();
    let jar = SignedCookieJar::new(auth.key.clone()).add(cookie);
    Ok((jar, Redirect::to("/")).into_response())
}

/// 登出：清理会话与 Cookie 后回到登录页。
pub async fn logout(
    Extension(auth): Extension<Arc<AuthConfig>>,
    headers: HeaderMap,
) -> (SignedCookieJar, Redirect) {
    let jar = SignedCookieJar::from_headers(&headers, auth.key.clone());
    if let Some(cookie) = jar.get(AUTH_COOKIE_NAME) {
        remove_session(&auth, cookie.value()).await;
    }

    (
        jar.remove(Cookie::build(AUTH_COOKIE_NAME).path("/").build()),
        Redirect::to("/login"),
    )
}

/// 限流所用的客户端地址；仅在反向代理后才信任 `x-forwarded-for`。
fn login_client_ip(auth: &AuthConfig, headers: &HeaderMap, extensions: &Extensions) -> IpAddr {
    let connected = connect_ip(extensions);
    let ip = if auth.trust_forwarded {
        resolve_client_ip(headers, connected)
    } else {
        connected
    };
    ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn session_deadline(now: Instant, ttl: Duration) -> Instant {
    let ttl = ttl.min(Duration::from_secs(MAX_SESSION_TTL_SECS));
    now.checked_add(ttl).unwrap_or(now)
}

fn cookie_max_age_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs().min(MAX_SESSION_TTL_SECS)).unwrap_or(i64::MAX)
}

fn is_auth_exempt_path(path: &str) -> bool {
    matches!(path, "/login" | "/logout" | "/api/version" | "/favicon.ico")
        || path.starts_with("/assets/")
}

async fn is_session_valid(auth: &AuthConfig, token: &str) -> bool {
    let mut sessions = auth.sessions.lock().await;
    let now = Instant::now();
    match sessions.get(token) {
        Some(entry) if entry.expires_at > now => true,
        _ => {
            sessions.remove(token);
            false
        }
    }
}

async fn remove_session(auth: &AuthConfig, token: &str) {
    let mut sessions = auth.sessions.lock().await;
    sessions.remove(token);
}

async fn check_login_rate_limit(auth: &AuthConfig, ip: IpAddr) -> Option<u64> {
    if auth.login_max_attempts == 0 {
        return None;
    }

    let mut attempts = auth.login_attempts.lock().await;
    let now = Instant::now();
    let entry = attempts.entry(ip).or_insert(LoginAttempt {
        window_start: now,
        failures: 0,
        locked_until: None,
    });

    if let Some(locked_until) = entry.locked_until {
        if now < locked_until {
            return Some(locked_until.saturating_duration_since(now).as_secs().max(1));
        }
        entry.locked_until = None;
        entry.failures = 0;
        entry.window_start = now;
    }

    if now.duration_since(entry.window_start) > auth.login_window {
        entry.window_start = now;
        entry.failures = 0;
    }

    None
}

async fn register_login_failure(auth: &AuthConfig, ip: IpAddr) {
    if auth.login_max_attempts == 0 {
        return;
    }

    let mut attempts = auth.login_attempts.lock().await;
    let now = Instant::now();
    let entry = attempts.entry(ip).or_insert(LoginAttempt {
        window_start: now,
        failures: 0,
        locked_until: None,
    });

    if now.duration_since(entry.window_start) > auth.login_window {
        entry.window_start = now;
        entry.failures = 0;
        entry.locked_until = None;
    }

    entry.failures = entry.failures.saturating_add(1);
    if entry.failures >= auth.login_max_attempts {
        entry.locked_until = Some(now + auth.login_lockout);
        warn!(client_ip = %ip, "login locked out");
    }
}

async fn clear_login_failures(auth: &AuthConfig, ip: IpAddr) {
    let mut attempts = auth.login_attempts.lock().await;
    attempts.remove(&ip);
}

/// 清理过期会话。
pub async fn prune_expired_sessions(auth: &AuthConfig) {
    let mut sessions = auth.sessions.lock().await;
    let now = Instant::now();
    sessions.retain(|_, entry| entry.expires_at > now);
}

/// 清理过期的登录失败记录。
pub async fn prune_login_attempts(auth: &AuthConfig) {
    let mut attempts = auth.login_attempts.lock().await;
    let now = Instant::now();
    attempts.retain(|_, entry| {
        if let Some(locked_until) = entry.locked_until {
            return locked_until > now;
        }
        now.duration_since(entry.window_start) <= auth.login_window
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn auth_config(password: Option<&str>, max_attempts: u32) -> Arc<AuthConfig> {
        Arc::new(AuthConfig {
            checker: CredentialChecker::from_config(None, password).expect("checker"),
            key: signing_key(Some("test-secret")),
            sessions: Mutex::new(HashMap::new()),
            session_ttl: Duration::from_secs(3600),
            login_attempts: Mutex::new(HashMap::new()),
            login_window: Duration::from_secs(300),
            login_max_attempts: max_attempts,
            login_lockout: Duration::from_secs(600),
            trust_forwarded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::testing::auth_config;
    use super::*;

    #[tokio::test]
    async fn lockout_after_max_failures() {
        let auth = auth_config(Some("hunter2"), 3);
        let ip: IpAddr = "10.0.0.1".parse().expect("ip");
        for _ in 0..3 {
            assert!(check_login_rate_limit(&auth, ip).await.is_none());
            register_login_failure(&auth, ip).await;
        }
        assert!(check_login_rate_limit(&auth, ip).await.is_some());

        let other: IpAddr = "10.0.0.2".parse().expect("ip");
        assert!(check_login_rate_limit(&auth, other).await.is_none());
    }

    #[tokio::test]
    async fn zero_max_attempts_disables_limiter() {
        let auth = auth_config(Some("hunter2"), 0);
        let ip: IpAddr = "10.0.0.1".parse().expect("ip");
        for _ in 0..10 {
            register_login_failure(&auth, ip).await;
        }
        assert!(check_login_rate_limit(&auth, ip).await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_invalid_and_pruned() {
        let auth = auth_config(Some("hunter2"), 5);
        let now = Instant::now();
        {
            let mut sessions = auth.sessions.lock().await;
            sessions.insert(
                "live".into(),
                SessionEntry {
                    expires_at: now + Duration::from_secs(60),
                },
            );
            sessions.insert("stale".into(), SessionEntry { expires_at: now });
        }
        assert!(is_session_valid(&auth, "live").await);
        assert!(!is_session_valid(&auth, "stale").await);
        assert!(!is_session_valid(&auth, "unknown").await);

        auth.sessions.lock().await.insert("stale2".into(), SessionEntry { expires_at: now });
        prune_expired_sessions(&auth).await;
        let sessions = auth.sessions.lock().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key("live"));
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let now = Instant::now();
        let deadline = session_deadline(now, Duration::MAX);
        assert!(deadline > now);
        assert!(deadline <= now + Duration::from_secs(MAX_SESSION_TTL_SECS));
        assert_eq!(cookie_max_age_secs(Duration::MAX), MAX_SESSION_TTL_SECS as i64);
        assert_eq!(cookie_max_age_secs(Duration::from_secs(60)), 60);
    }

    #[test]
    fn forwarded_header_is_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9".parse().expect("header"));
        let mut extensions = Extensions::new();
        extensions.insert(axum::extract::ConnectInfo(std::net::SocketAddr::from((
            [192, 168, 1, 5],
            4000,
        ))));

        let auth = auth_config(Some("hunter2"), 5);
        assert_eq!(
            login_client_ip(&auth, &headers, &extensions),
            "192.168.1.5".parse::<IpAddr>().expect("ip")
        );

        let trusted = AuthConfig {
            trust_forwarded: true,
            ..Arc::into_inner(auth_config(Some("hunter2"), 5)).expect("sole owner")
        };
        assert_eq!(
            login_client_ip(&trusted, &headers, &extensions),
            "203.0.113.9".parse::<IpAddr>().expect("ip")
        );
    }

    #[test]
    fn exempt_paths_cover_login_and_assets_only() {
        assert!(is_auth_exempt_path("/login"));
        assert!(is_auth_exempt_path("/logout"));
        assert!(is_auth_exempt_path("/assets/panel.css"));
        assert!(!is_auth_exempt_path("/"));
        assert!(!is_auth_exempt_path("/api/files"));
        assert!(!is_auth_exempt_path("/api/upload"));
        assert!(!is_auth_exempt_path("/upload"));
    }
}
