//! 嵌入式页面与静态资源：登录页渲染、面板页与 `/assets` 回退。

use axum::body::Body as AxumBody;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::response::{Html, IntoResponse, Response};
use rust_embed::RustEmbed;

use crate::config::PanelMode;
use crate::error::ApiError;
use crate::messages;

const LOGIN_ERROR_SLOT: &str = "<!-- login-error -->";

#[derive(RustEmbed)]
#[folder = "frontend"]
/// 嵌入式前端资源。
pub struct FrontendAssets;

/// 渲染登录页，可选地带一条本地化错误提示。
pub fn render_login(error: Option<&str>) -> Result<Html<String>, ApiError> {
    let template = load_text("login.html")?;
    let slot = match error {
        Some(message) => format!(
            r#"<div class="error">{}</div>"#,
            html_escape::encode_text(message)
        ),
        None => String::new(),
    };
    Ok(Html(template.replacen(LOGIN_ERROR_SLOT, &slot, 1)))
}

/// 按当前面板模式返回首页。
pub async fn index(Extension(mode): Extension<PanelMode>) -> Result<Html<String>, ApiError> {
    let page = match mode {
        PanelMode::Browse => "browse.html",
        PanelMode::Flat => "flat.html",
        PanelMode::Upload => "upload.html",
    };
    load_text(page).map(Html)
}

/// 静态资源回退处理器，仅暴露 `/assets/` 下的文件。
pub async fn serve_assets(req: Request<AxumBody>) -> Result<Response, ApiError> {
    let path = req.uri().path().trim_start_matches('/');
    if path.starts_with("assets/")
        && let Some(response) = load_embedded_asset(path)?
    {
        return Ok(response);
    }
    Err(ApiError::NotFound(messages::NOT_FOUND.into()))
}

fn load_text(path: &str) -> Result<String, ApiError> {
    let asset = FrontendAssets::get(path)
        .ok_or_else(|| ApiError::Internal(format!("missing embedded page {path}")))?;
    String::from_utf8(asset.data.into_owned())
        .map_err(|err| ApiError::Internal(err.to_string()))
}

fn load_embedded_asset(path: &str) -> Result<Option<Response>, ApiError> {
    let Some(asset) = FrontendAssets::get(path) else {
        return Ok(None);
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    Ok(Some(
        (headers, AxumBody::from(asset.data.into_owned())).into_response(),
    ))
}
