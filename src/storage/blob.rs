//! Materializes binary provider payloads into addressable image references

use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

/// Where materialized images end up
#[derive(Debug, Clone)]
pub enum BlobMode {
    /// Written under `dir`, referenced as `<url_prefix>/<file>`
    File { dir: PathBuf, url_prefix: String },
    /// Inlined as `data:image/<fmt>;base64,...`
    DataUrl,
}

/// Turns image bytes into a reference the UI can display
pub struct BlobStore {
    mode: BlobMode,
}

impl BlobStore {
    pub fn new(mode: BlobMode) -> Self {
        Self { mode }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        let mode = match config.blob_mode.as_str() {
            "data_url" => BlobMode::DataUrl,
            _ => BlobMode::File {
                dir: PathBuf::from(&config.blob_path),
                url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
            },
        };
        Self::new(mode)
    }

    /// Store image bytes and return the reference for them
    pub async fn materialize(&self, data: &[u8], content_type: Option<&str>) -> Result<String> {
        if data.is_empty() {
            return Err(AppError::ProviderFailed("Provider returned an empty image".to_string()));
        }

        let format = detect_image_format(data)
            .or_else(|| content_type.and_then(format_from_content_type))
            .unwrap_or("png");

        match &self.mode {
            BlobMode::DataUrl => Ok(create_data_url(data, format)),
            BlobMode::File { dir, url_prefix } => {
                if !dir.exists() {
                    fs::create_dir_all(dir).await?;
                    debug!(path = ?dir, "Created blob directory");
                }

                let filename = format!("{}.{}", Uuid::new_v4(), format);
                let file_path = dir.join(&filename);
                fs::write(&file_path, data).await?;

                debug!(path = ?file_path, size = data.len(), "Materialized image blob");
                Ok(format!("{}/{}", url_prefix, filename))
            }
        }
    }

    /// Remove blob files older than `max_age_secs` unless their reference
    /// is in `referenced`
    pub async fn cleanup(&self, max_age_secs: u64, referenced: &HashSet<String>) -> Result<usize> {
        let (dir, url_prefix) = match &self.mode {
            BlobMode::File { dir, url_prefix } => (dir, url_prefix),
            BlobMode::DataUrl => return Ok(0),
        };
        if !dir.exists() {
            return Ok(0);
        }

        let mut deleted = 0;
        let now = std::time::SystemTime::now();
        let max_age = std::time::Duration::from_secs(max_age_secs);

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let reference = format!("{}/{}", url_prefix, entry.file_name().to_string_lossy());
            if referenced.contains(&reference) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            if let Ok(age) = now.duration_since(modified) {
                if age > max_age && fs::remove_file(entry.path()).await.is_ok() {
                    deleted += 1;
                    debug!(path = ?entry.path(), "Deleted expired blob");
                }
            }
        }

        Ok(deleted)
    }
}

/// Create a data URL from binary image data
pub fn create_data_url(data: &[u8], format: &str) -> String {
    format!("data:image/{};base64,{}", format, STANDARD.encode(data))
}

fn format_from_content_type(content_type: &str) -> Option<&'static str> {
    let subtype = content_type.split(';').next()?.trim().strip_prefix("image/")?;
    match subtype {
        "png" => Some("png"),
        "jpeg" | "jpg" => Some("jpg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}

/// Detect image format from binary data using magic bytes
fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }
    if data.starts_with(b"BM") {
        return Some("bmp");
    }

    None
}
