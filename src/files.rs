//! 共享目录文件列表接口。

use axum::extract::{Extension, Query};
use axum::response::Json as JsonResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::PanelMode;
use crate::share::{FileEntry, Listing, Share};

#[derive(Deserialize)]
pub(crate) struct OptionalPathQuery {
    path: Option<String>,
}

/// 浏览模式返回单层目录，平铺模式返回整棵树的文件。
#[derive(Serialize)]
#[serde(untagged)]
pub enum FilesResponse {
    Navigable(Listing),
    Flat { files: Vec<FileEntry> },
}

/// 列出共享目录内容。
pub async fn list_files(
    Query(query): Query<OptionalPathQuery>,
    Extension(share): Extension<Arc<Share>>,
    Extension(mode): Extension<PanelMode>,
) -> JsonResponse<FilesResponse> {
    let response = match mode {
        PanelMode::Flat => {
            let files = share.walk().await;
            info!(count = files.len(), "list files (flat)");
            FilesResponse::Flat { files }
        }
        PanelMode::Browse | PanelMode::Upload => {
            let listing = share.list_dir(query.path.as_deref()).await;
            info!(
                path = listing.current_path,
                files = listing.files.len(),
                folders = listing.folders.len(),
                "list files"
            );
            FilesResponse::Navigable(listing)
        }
    };
    JsonResponse(response)
}
