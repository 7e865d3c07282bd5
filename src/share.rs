//! 只读共享目录：路径归一化、越界校验与文件列表。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::ErrorKind;
use tracing::warn;

/// 挂载的共享根目录，所有对外路径都必须落在其内部。
#[derive(Clone, Debug)]
pub struct Share {
    root: PathBuf,
}

impl Share {
    pub fn new(root: PathBuf) -> Self {
        let absolute = std::path::absolute(&root).unwrap_or(root);
        Self {
            root: normalize_lexically(&absolute),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 将相对路径（或根目录下的绝对路径）拼接到根目录并做词法归一化。
    ///
    /// 越界路径在访问文件系统之前即被拒绝。
    pub fn contain(&self, raw: &str) -> Result<PathBuf, ShareError> {
        let joined = self.root.join(raw);
        let normalized = normalize_lexically(&joined);
        if normalized.starts_with(&self.root) {
            Ok(normalized)
        } else {
            Err(ShareError::InvalidPath)
        }
    }

    /// 在 [`Share::contain`] 基础上逐级检查，拒绝任何符号链接分量。
    pub async fn resolve_path_checked(&self, raw: &str) -> Result<PathBuf, ShareError> {
        let target = self.contain(raw)?;
        self.ensure_no_symlink_components(&target).await?;
        Ok(target)
    }

    /// 解析待上传文件：必须在根目录内、存在且为普通文件。
    pub async fn resolve_file(&self, raw: &str) -> Result<PathBuf, ShareError> {
        let target = self.resolve_path_checked(raw).await?;
        let metadata = fs::metadata(&target).await?;
        if !metadata.is_file() {
            return Err(ShareError::InvalidPath);
        }
        Ok(target)
    }

    async fn ensure_no_symlink_components(&self, target: &Path) -> Result<(), ShareError> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| ShareError::InvalidPath)?;
        let mut current = PathBuf::from(&self.root);
        let mut components = relative.components().peekable();

        while let Some(component) = components.next() {
            current.push(component.as_os_str());
            match fs::symlink_metadata(&current).await {
                Ok(metadata) => {
                    if metadata.file_type().is_symlink() {
                        return Err(ShareError::InvalidPath);
                    }
                    if components.peek().is_some() && !metadata.is_dir() {
                        return Err(ShareError::InvalidPath);
                    }
                }
                Err(err) => return Err(ShareError::Io(err)),
            }
        }

        Ok(())
    }

    /// 列出某一层目录的直接子项；越界或读取失败时返回空列表。
    pub async fn list_dir(&self, relative: Option<&str>) -> Listing {
        let raw = relative.unwrap_or("");
        let target = match self.resolve_path_checked(raw).await {
            Ok(target) => target,
            Err(ShareError::InvalidPath) => {
                warn!(path = raw, "rejected listing outside share root");
                return Listing::default();
            }
            Err(ShareError::Io(err)) => {
                warn!(path = raw, error = %err, "listing target unavailable");
                return Listing::default();
            }
        };

        match self.read_listing(&target).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!(path = raw, error = %err, "failed to read share directory");
                Listing::default()
            }
        }
    }

    async fn read_listing(&self, target: &Path) -> io::Result<Listing> {
        let mut dir = fs::read_dir(target).await?;
        let mut files = Vec::new();
        let mut folders = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if file_type.is_dir() {
                folders.push(FolderEntry {
                    name,
                    path: self.relative_of(&path),
                });
            } else if file_type.is_file() {
                // 扫描过程中文件可能已被删除。
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                files.push(self.file_entry(name, path, &metadata));
            }
        }

        folders.sort_by(|a, b| match a.name.to_lowercase().cmp(&b.name.to_lowercase()) {
            Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        });

        Ok(Listing {
            files,
            folders,
            current_path: self.relative_of(target),
        })
    }

    /// 递归遍历整个根目录，返回所有普通文件。
    pub async fn walk(&self) -> Vec<FileEntry> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir_path) = pending.pop() {
            let mut dir = match fs::read_dir(&dir_path).await {
                Ok(dir) => dir,
                Err(err) if err.kind() == ErrorKind::NotFound && dir_path == self.root => {
                    return files;
                }
                Err(err) => {
                    warn!(path = ?dir_path, error = %err, "failed to read share directory");
                    continue;
                }
            };
            let mut subdirs = Vec::new();
            loop {
                let entry = match dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(path = ?dir_path, error = %err, "share directory scan aborted");
                        break;
                    }
                };
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    subdirs.push(entry.path());
                } else if file_type.is_file() {
                    let Ok(metadata) = entry.metadata().await else {
                        continue;
                    };
                    let name = entry.file_name().to_string_lossy().to_string();
                    files.push(self.file_entry(name, entry.path(), &metadata));
                }
            }
            // 逆序压栈，使遍历顺序与目录枚举顺序一致。
            pending.extend(subdirs.into_iter().rev());
        }

        files
    }

    fn file_entry(&self, name: String, path: PathBuf, metadata: &std::fs::Metadata) -> FileEntry {
        let modified = metadata
            .modified()
            .ok()
            .filter(|ts| ts.duration_since(UNIX_EPOCH).is_ok())
            .map(|ts| {
                let datetime: DateTime<Utc> = ts.into();
                datetime.format("%Y-%m-%d %H:%M:%S").to_string()
            });
        FileEntry {
            name,
            path: self.relative_of(&path),
            full_path: path.to_string_lossy().to_string(),
            size: metadata.len(),
            modified,
        }
    }

    fn relative_of(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|relative| {
                relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }
}

/// 纯词法归一化：去掉 `.`，按 `..` 回退上一级，不访问文件系统。
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => continue,
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }
    normalized
}

#[derive(Debug)]
pub enum ShareError {
    InvalidPath,
    Io(io::Error),
}

impl From<io::Error> for ShareError {
    fn from(err: io::Error) -> Self {
        ShareError::Io(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub full_path: String,
    pub size: u64,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Default, Serialize)]
pub struct Listing {
    pub files: Vec<FileEntry>,
    pub folders: Vec<FolderEntry>,
    pub current_path: String,
}
