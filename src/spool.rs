//! 浏览器上传文件的本地暂存目录。

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Spool {
    root: PathBuf,
}

impl Spool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 在独立的子目录中创建暂存文件，保留原始文件名供上传程序使用。
    pub async fn create(&self, file_name: &str) -> io::Result<SpoolFile> {
        let dir = self.root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);
        let guard = SpoolDirGuard::armed(dir);
        let file = File::create(&path).await?;
        Ok(SpoolFile { file, path, guard })
    }

    /// 清理超过 `ttl` 的残留暂存目录。
    pub async fn cleanup_stale(&self, ttl: Duration) -> io::Result<()> {
        if ttl.is_zero() || fs::metadata(&self.root).await.is_err() {
            return Ok(());
        }

        let now = SystemTime::now();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let Ok(age) = now.duration_since(modified) else {
                continue;
            };
            if age >= ttl {
                let path = entry.path();
                if let Err(err) = fs::remove_dir_all(&path).await {
                    warn!(path = ?path, error = %err, "failed to remove stale spool dir");
                } else {
                    info!(path = ?path, "removed stale spool dir");
                }
            }
        }

        Ok(())
    }
}

/// 正在写入的暂存文件；未显式收尾就被丢弃时（如请求被取消）同步删除目录。
pub struct SpoolFile {
    file: File,
    path: PathBuf,
    guard: SpoolDirGuard,
}

impl SpoolFile {
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// 放弃写入并删除暂存目录。
    pub async fn discard(self) {
        drop(self.file);
        self.guard.remove().await;
    }

    /// 落盘并关闭文件句柄，失败时自动清理。
    pub async fn seal(self) -> io::Result<SealedSpool> {
        if let Err(err) = self.file.sync_all().await {
            drop(self.file);
            self.guard.remove().await;
            return Err(err);
        }
        drop(self.file);
        Ok(SealedSpool {
            path: self.path,
            guard: self.guard,
        })
    }
}

/// 写入完成、等待交给上传程序的暂存文件。
#[derive(Debug)]
pub struct SealedSpool {
    path: PathBuf,
    guard: SpoolDirGuard,
}

impl SealedSpool {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(self) {
        self.guard.remove().await;
    }
}

/// 持有 `<root>/<uuid>` 目录的所有权，drop 时兜底删除。
#[derive(Debug)]
struct SpoolDirGuard {
    dir: Option<PathBuf>,
}

impl SpoolDirGuard {
    fn armed(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }

    async fn remove(mut self) {
        if let Some(dir) = self.dir.take()
            && let Err(err) = fs::remove_dir_all(&dir).await
        {
            warn!(path = ?dir, error = %err, "failed to remove spool dir");
        }
    }
}

impl Drop for SpoolDirGuard {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => info!(path = ?dir, "removed abandoned spool dir"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = ?dir, error = %err, "failed to remove spool dir"),
        }
    }
}

/// 只保留上传文件名的最后一段，拒绝空名与 `.`/`..`。
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
