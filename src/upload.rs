//! 上传处理器：共享目录中的文件与浏览器直传的暂存文件。

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Json, Multipart};
use axum::http::StatusCode;
use axum::response::Json as JsonResponse;
use futures_util::stream::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{ApiError, ApiMessage};
use crate::messages;
use crate::share::Share;
use crate::spool::{Spool, sanitize_file_name};
use crate::uploader::Uploader;

#[derive(Deserialize)]
pub(crate) struct UploadRequest {
    #[serde(default)]
    filepath: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// 将共享目录中的文件交给上传程序。
pub async fn upload_from_share(
    Extension(share): Extension<Arc<Share>>,
    Extension(uploader): Extension<Uploader>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<JsonResponse<ApiMessage>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        ApiError::BadRequest(format!("{}{}", messages::ERROR_PREFIX, rejection.body_text()))
    })?;

    let filepath = payload.filepath.filter(|value| !value.trim().is_empty());
    let filename = payload.filename.filter(|value| !value.trim().is_empty());
    let (Some(filepath), Some(filename)) = (filepath, filename) else {
        return Err(ApiError::BadRequest(messages::MISSING_PATH.into()));
    };

    let target = share.resolve_file(&filepath).await.inspect_err(|err| {
        warn!(filepath, error = ?err, "rejected upload target");
    })?;

    uploader.upload(&target, &filename).await?;
    Ok(JsonResponse(ApiMessage::ok(messages::UPLOAD_SUCCESS)))
}

/// 接收浏览器上传的 `file` 字段，暂存后调用上传程序，结束后删除暂存文件。
pub async fn upload_spooled(
    Extension(spool): Extension<Arc<Spool>>,
    Extension(uploader): Extension<Uploader>,
    mut multipart: Multipart,
) -> Result<JsonResponse<ApiMessage>, ApiError> {
    uploader.ensure_configured()?;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| ApiError::BadRequest(messages::MISSING_FILE_FIELD.into()))?;

        let mut spool_file = spool
            .create(&name)
            .await
            .map_err(|err| ApiError::Internal(format!("{}{err}", messages::ERROR_PREFIX)))?;
        let write_result: Result<u64, ApiError> = async {
            let mut total_written: u64 = 0;
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(multipart_error)?;
                total_written += chunk.len() as u64;
                spool_file
                    .file_mut()
                    .write_all(&chunk)
                    .await
                    .map_err(|err| ApiError::Internal(format!("{}{err}", messages::ERROR_PREFIX)))?;
            }
            Ok(total_written)
        }
        .await;
        let size = match write_result {
            Ok(size) => size,
            Err(err) => {
                spool_file.discard().await;
                return Err(err);
            }
        };
        let sealed = spool_file
            .seal()
            .await
            .map_err(|err| ApiError::Internal(format!("{}{err}", messages::ERROR_PREFIX)))?;
        info!(name, size, "spooled browser upload");

        let result = uploader.upload(sealed.path(), &name).await;
        sealed.remove().await;
        result?;
        return Ok(JsonResponse(ApiMessage::ok(messages::UPLOAD_SUCCESS)));
    }

    Err(ApiError::BadRequest(messages::MISSING_FILE_FIELD.into()))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    let status = err.status();
    warn!(error = %err, status = %status, "multipart upload rejected");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge(messages::FILE_TOO_LARGE.into());
    }
    ApiError::BadRequest(format!("{}{}", messages::ERROR_PREFIX, err.body_text()))
}
