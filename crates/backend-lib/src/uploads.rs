// ============================
// crates/backend-lib/src/uploads.rs
// ============================
//! File storage collaborator.
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use std::path::{Path, PathBuf};
use tokio::{
    fs as tokio_fs,
    io::{AsyncWrite, AsyncWriteExt},
};

use crate::auth::tokens::random_hex;
use crate::config::UploadSettings;
use crate::error::AppError;
use crate::metrics::UPLOAD_STORED;

const MAX_STORED_NAME_LENGTH: usize = 100;

/// Trait for upload backends
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist `bytes` and return the path they can be fetched from
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, AppError>;
}

/// Reduce a client-supplied file name to a safe single path component
pub fn sanitize_file_name(name: &str) -> String {
    // Browsers may send a full client-side path
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        return "upload".to_string();
    }

    trimmed.chars().take(MAX_STORED_NAME_LENGTH).collect()
}

/// Collision-resistant stored name: `<unix-millis>-<random hex>-<name>`
pub fn stored_file_name(original_name: &str) -> String {
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        random_hex(4),
        sanitize_file_name(original_name)
    )
}

/// Write `bytes` through `file`, deleting `path` if the write fails
async fn write_or_remove<W>(path: &Path, mut file: W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = tokio_fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %remove_err, "failed to remove partial upload");
        }
        return Err(e);
    }
    Ok(())
}

/// Local-disk implementation of [`FileStore`]
#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalFileStore {
    pub fn new<P: AsRef<Path>>(root: P, public_prefix: impl Into<String>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &UploadSettings) -> anyhow::Result<Self> {
        Self::new(&settings.dir, settings.public_prefix.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let name = stored_file_name(original_name);
        let path = self.root.join(&name);

        // create_new: never overwrite an existing upload
        let file = tokio_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        write_or_remove(&path, file, bytes).await?;

        counter!(UPLOAD_STORED).increment(1);
        tracing::info!(file = %name, bytes = bytes.len(), "stored upload");

        Ok(format!("{}/{}", self.public_prefix, name))
    }
}
