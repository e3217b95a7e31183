//! Document uploads for policies and downloads
//!
//! Files are validated against the upload configuration and written through a
//! `BlobStore`. The local store keeps them under `upload.path`, which the
//! router serves statically at `public_prefix`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

use crate::config::UploadConfig;
use crate::services::error::{OrFail, ServiceError, ServiceResult};

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Where a stored file ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Public URL of the file
    pub url: String,
    /// Name the file was uploaded with
    pub file_name: String,
    pub size: i64,
}

/// Blob storage backend
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, folder: &str, file_name: &str, data: &[u8]) -> Result<StoredFile>;
}

/// Stores blobs on the local filesystem
pub struct LocalBlobStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalBlobStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: config.path.clone(),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, folder: &str, file_name: &str, data: &[u8]) -> Result<StoredFile> {
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload dir: {:?}", dir))?;

        let stored_name = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            sanitize_file_name(file_name)
        );
        let path = dir.join(&stored_name);
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to save file: {:?}", path))?;

        tracing::debug!("Stored upload {:?} ({} bytes)", path, data.len());

        Ok(StoredFile {
            url: format!("{}/{}/{}", self.public_prefix, folder, stored_name),
            file_name: file_name.to_string(),
            size: data.len() as i64,
        })
    }
}

/// Keep ASCII letters, digits, `.`, `-` and `_`; replace the rest.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Validates and stores uploaded documents
pub struct UploadService {
    config: UploadConfig,
    store: Arc<dyn BlobStore>,
}

impl UploadService {
    pub fn new(config: UploadConfig, store: Arc<dyn BlobStore>) -> Self {
        Self { config, store }
    }

    /// Upload service writing to the local filesystem
    pub fn local(config: UploadConfig) -> Self {
        let store = Arc::new(LocalBlobStore::new(&config));
        Self::new(config, store)
    }

    pub fn validate(&self, file: &UploadedFile) -> ServiceResult<()> {
        if file.data.is_empty() {
            return Err(ServiceError::invalid("File is empty"));
        }
        if !self.config.is_type_allowed(&file.content_type) {
            return Err(ServiceError::invalid(
                "Invalid file type. Allowed: PDF, DOC, DOCX, XLS, XLSX",
            ));
        }
        if file.size() > self.config.max_file_size {
            return Err(ServiceError::invalid(format!(
                "File too large. Maximum size: {} MB",
                self.config.max_file_size / 1024 / 1024
            )));
        }
        Ok(())
    }

    /// Validate `file` and store it under `folder`
    pub async fn store(&self, folder: &str, file: &UploadedFile) -> ServiceResult<StoredFile> {
        self.validate(file)?;

        let name = if file.file_name.trim().is_empty() {
            format!("document.{}", self.config.get_extension(&file.content_type))
        } else {
            file.file_name.clone()
        };

        self.store
            .put(folder, &name, &file.data)
            .await
            .or_fail("Failed to upload file")
    }
}
