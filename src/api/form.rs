//! Multipart form parsing for document uploads
//!
//! Policy and download forms share one shape: text fields plus an optional
//! `file` part. A part with neither a file name nor content means "no new
//! file"; a named but empty file is passed on and rejected by the upload
//! service.

use axum::extract::Multipart;

use crate::api::middleware::ApiError;
use crate::models::{DownloadInput, PolicyInput};
use crate::services::UploadedFile;

/// Fields of a policy or download form
#[derive(Debug, Default)]
pub struct DocumentForm {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub published: bool,
    pub file: Option<UploadedFile>,
}

impl DocumentForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation_error(format!("Invalid form data: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
                form.file = file_part(file_name, content_type, data.to_vec());
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::validation_error(format!("Invalid form data: {}", e)))?;
            match name.as_str() {
                "title" => form.title = value,
                "description" => form.description = Some(value),
                "category" => form.category = value,
                "published" => form.published = is_checked(&value),
                _ => {}
            }
        }

        Ok(form)
    }

    pub fn into_policy(self) -> (PolicyInput, Option<UploadedFile>) {
        let input = PolicyInput {
            title: self.title,
            description: self.description,
            category: self.category,
            published: self.published,
        };
        (input, self.file)
    }

    pub fn into_download(self) -> (DownloadInput, Option<UploadedFile>) {
        let input = DownloadInput {
            title: self.title,
            description: self.description,
            category: self.category,
            published: self.published,
        };
        (input, self.file)
    }
}

/// Browsers send an unnamed, empty part when no file was chosen
fn file_part(file_name: String, content_type: String, data: Vec<u8>) -> Option<UploadedFile> {
    if file_name.is_empty() && data.is_empty() {
        return None;
    }
    Some(UploadedFile {
        file_name,
        content_type,
        data,
    })
}

/// Checkbox values browsers and scripts send for "on"
fn is_checked(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1")
}
