use application::error::AppError;
use application::storage::{FileStorage, UploadedFile};
use async_trait::async_trait;
use domain::value::FileCategory;
use log::{debug, info, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};
use url::Url;
use uuid::Uuid;

/// 本地磁盘上的上传文件网关
///
/// 文件保存在 `{root}/{category}/{uuid}.{ext}`，对外只暴露 `{base_url}/{category}/{uuid}.{ext}`。
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    base_url: String,
    base_path: String,
}

impl LocalFileStorage {
    /// 创建根目录及全部分类子目录，之后的写入不再建目录
    pub fn new(root: impl AsRef<Path>, base_url: &str) -> Result<Self, AppError> {
        let root = root.as_ref();
        for category in FileCategory::ALL {
            let dir = root.join(category.as_str());
            fs::create_dir_all(&dir).map_err(|e| {
                AppError::file_operation(format!("cannot create {}", dir.display()), e)
            })?;
        }
        let root = fs::canonicalize(root).map_err(|e| {
            AppError::file_operation(format!("cannot resolve {}", root.display()), e)
        })?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let base_path = url_path(&base_url)
            .ok_or_else(|| AppError::InvalidInput(format!("invalid upload base url: {}", base_url)))?
            .trim_end_matches('/')
            .to_string();

        info!("file storage root: {}", root.display());
        Ok(Self {
            root,
            base_url,
            base_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 公开 URL 的路径前缀，例如 `/uploads`
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `{base_path}/` 之后的部分，且第一段必须是已知分类
    fn strip_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(&self.base_path)?.strip_prefix('/')?;
        let (category, name) = rest.split_once('/')?;
        FileCategory::from_segment(category)?;
        if name.is_empty() {
            return None;
        }
        Some(rest)
    }
}

/// 只取 URL 的路径部分，scheme、host、query 一律忽略
fn url_path(input: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    base.join(input).ok().map(|url| url.path().to_string())
}

/// 词法归一化：逐段拼到 root 上，`..` 弹出一段。绝对路径段直接拒绝。
fn normalize_under(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(seg) => path.push(seg),
            Component::CurDir => {}
            Component::ParentDir => {
                if !path.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

/// 扩展名只允许字母数字，其余情况（含 `/`、`..`、空格等）直接丢弃
fn safe_extension(original_filename: Option<&str>) -> Option<String> {
    let ext = Path::new(original_filename?).extension()?.to_str()?;
    if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_string())
    } else {
        None
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(
        &self,
        category: Option<FileCategory>,
        file: UploadedFile<'_>,
    ) -> Result<String, AppError> {
        let category = match category {
            Some(category) => category,
            None => file
                .content_type
                .and_then(FileCategory::from_content_type)
                .ok_or_else(|| {
                    AppError::UnsupportedMediaType(
                        file.content_type.unwrap_or("unknown").to_string(),
                    )
                })?,
        };

        let name = match safe_extension(file.original_filename) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let target = self.root.join(category.as_str()).join(&name);

        tokio::fs::write(&target, file.content)
            .await
            .map_err(|e| AppError::file_operation(format!("failed to store {}", name), e))?;
        debug!("stored {} bytes as {}", file.content.len(), target.display());

        Ok(format!("{}/{}/{}", self.base_url, category, name))
    }

    fn resolve(&self, public_url: &str) -> Option<PathBuf> {
        let path = url_path(public_url)?;
        let relative = self.strip_prefix(&path)?;
        let decoded = urlencoding::decode(relative).ok()?;
        if decoded.contains('\0') {
            return None;
        }

        // 必须在归一化之后再检查
        let resolved = normalize_under(&self.root, &decoded)?;
        if resolved.starts_with(&self.root) && resolved != self.root {
            Some(resolved)
        } else {
            warn!("rejected file url outside storage root: {}", public_url);
            None
        }
    }

    async fn delete(&self, public_url: &str) -> bool {
        let Some(path) = self.resolve(public_url) else {
            return false;
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return false,
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("deleted {}", path.display());
                true
            }
            Err(e) => {
                warn!("failed to delete {}: {}", path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, LocalFileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(temp_dir.path(), "/uploads").unwrap();
        (temp_dir, storage)
    }

    fn upload<'a>(content: &'a [u8], content_type: &'a str, name: &'a str) -> UploadedFile<'a> {
        UploadedFile {
            content,
            content_type: Some(content_type),
            original_filename: Some(name),
        }
    }

    #[test]
    fn test_category_dirs_created_up_front() {
        let (_tmp, storage) = storage();
        assert!(storage.root().join("songs").is_dir());
        assert!(storage.root().join("covers").is_dir());
    }

    #[tokio::test]
    async fn test_store_infers_category_from_content_type() {
        let (_tmp, storage) = storage();
        let url = storage
            .store(None, upload(b"png", "image/png", "cover.png"))
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/covers/"));
        assert!(url.ends_with(".png"));

        let url = storage
            .store(None, upload(b"mp3", "audio/mpeg", "track.mp3"))
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/songs/"));
    }

    #[tokio::test]
    async fn test_explicit_category_wins() {
        let (_tmp, storage) = storage();
        let url = storage
            .store(
                Some(FileCategory::Songs),
                upload(b"data", "application/octet-stream", "a.flac"),
            )
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/songs/"));
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let (_tmp, storage) = storage();
        let res = storage
            .store(None, upload(b"x", "text/plain", "notes.txt"))
            .await;
        assert!(matches!(res, Err(AppError::UnsupportedMediaType(_))));

        let res = storage
            .store(
                None,
                UploadedFile {
                    content: b"x",
                    content_type: None,
                    original_filename: None,
                },
            )
            .await;
        assert!(matches!(res, Err(AppError::UnsupportedMediaType(_))));
    }

    #[tokio::test]
    async fn test_stored_url_resolves_inside_root() {
        let (_tmp, storage) = storage();
        let url = storage
            .store(None, upload(b"ID3", "audio/mpeg", "song.mp3"))
            .await
            .unwrap();

        let path = storage.resolve(&url).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(storage.root()));
        assert_ne!(path, storage.root());
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3");

        // host, scheme and query are ignored
        let absolute = format!("https://cdn.example.com{}?v=1", url);
        assert_eq!(storage.resolve(&absolute), Some(path));
    }

    #[tokio::test]
    async fn test_unsafe_extension_is_dropped() {
        let (_tmp, storage) = storage();
        for name in ["evil.p/../hp", "x.tar gz", "noext", "..", "a.ph%2fp"] {
            let url = storage
                .store(None, upload(b"x", "image/jpeg", name))
                .await
                .unwrap();
            let file_name = url.rsplit('/').next().unwrap();
            assert!(!file_name.contains(".."), "{}", url);
            assert!(Uuid::parse_str(file_name.split('.').next().unwrap()).is_ok());
            assert!(storage.resolve(&url).unwrap().exists());
        }
    }

    #[test]
    fn test_traversal_is_rejected() {
        let (_tmp, storage) = storage();
        let attempts = [
            "/uploads/songs/../../etc/passwd",
            "/uploads/songs/%2e%2e/%2e%2e/etc/passwd",
            "/uploads/songs/..%2f..%2fetc%2fpasswd",
            "/uploads/songs/..%2F..%2F..%2Fetc%2Fpasswd",
            "/uploads/covers/%252e%252e/x",
            "/uploads/songs/%2fetc%2fpasswd",
            "/uploads/songs/..\\..\\etc\\passwd",
            "http://evil.com/uploads/songs/../../../etc/passwd",
            "/uploads/songs/a%00b",
        ];
        for url in attempts {
            if let Some(path) = storage.resolve(url) {
                assert!(
                    path.starts_with(storage.root()) && path != storage.root(),
                    "{} escaped to {}",
                    url,
                    path.display()
                );
            }
        }
        assert_eq!(storage.resolve("/uploads/songs/../../etc/passwd"), None);
        assert_eq!(storage.resolve("/uploads/songs/..%2f..%2fetc%2fpasswd"), None);
    }

    #[test]
    fn test_prefix_and_category_are_required() {
        let (_tmp, storage) = storage();
        assert_eq!(storage.resolve("/other/songs/a.mp3"), None);
        assert_eq!(storage.resolve("/uploads/videos/a.mp4"), None);
        assert_eq!(storage.resolve("/uploads/songs/"), None);
        assert_eq!(storage.resolve("/uploads/songs"), None);
        assert_eq!(storage.resolve("/uploadsX/songs/a.mp3"), None);
        assert_eq!(storage.resolve("/uploads/Songs/a.mp3"), None);
        assert!(storage.resolve("/uploads/songs/a.mp3").is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_tmp, storage) = storage();
        let url = storage
            .store(None, upload(b"img", "image/png", "c.png"))
            .await
            .unwrap();
        let path = storage.resolve(&url).unwrap();

        assert!(storage.delete(&url).await);
        assert!(!path.exists());
        assert!(!storage.delete(&url).await);
        assert!(!storage.delete("/uploads/covers/never-existed.png").await);
        assert!(!storage.delete("/uploads/songs/../../etc/passwd").await);
        assert!(!storage.delete("not a url at all").await);
    }

    #[tokio::test]
    async fn test_delete_does_not_remove_directories() {
        let (_tmp, storage) = storage();
        std::fs::create_dir(storage.root().join("songs").join("nested")).unwrap();
        assert!(!storage.delete("/uploads/songs/nested").await);
        assert!(storage.root().join("songs").join("nested").is_dir());
    }

    #[test]
    fn test_base_url_with_host() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(temp_dir.path(), "http://localhost:8080/files/").unwrap();
        assert_eq!(storage.base_url(), "http://localhost:8080/files");
        assert_eq!(storage.base_path(), "/files");
        assert!(storage.resolve("/files/covers/a.png").is_some());
        assert!(storage.resolve("/uploads/covers/a.png").is_none());
    }
}
