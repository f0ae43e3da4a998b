//! Multipart form reading and local file storage for uploads

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use school_health_domain::errors::ServiceError;

use super::error::ApiError;

/// URL prefix under which stored uploads are served
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// Upload directory from `UPLOAD_DIR`, else `DATA_DIR/uploads`
pub fn upload_dir_from_env() -> PathBuf {
    std::env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
        PathBuf::from(data_dir).join("uploads")
    })
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Lowercased extension of the original name, if it is a plain one
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
    }
}

/// A fully read multipart body: text fields plus file parts
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string).filter(|f| !f.is_empty()) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    debug!("Received file part {} ({} bytes)", name, bytes.len());
                    if !bytes.is_empty() {
                        form.files.insert(name, UploadedFile { file_name, bytes });
                    }
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed text field; blank counts as absent
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// Text field or an empty string, left for the service to validate
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        self.text(name)
            .map(|v| v.parse::<T>().map_err(|_| ApiError::BadRequest(format!("{}: Invalid value '{}'", name, v))))
            .transpose()
    }

    /// Field holding a JSON document, such as an address object
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        self.text(name)
            .map(|v| serde_json::from_str(&v).map_err(|e| ApiError::BadRequest(format!("{}: {}", name, e))))
            .transpose()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// Write `file` under `dir` with a fresh name and return its public URL
pub async fn store_upload(dir: &Path, file: &UploadedFile) -> Result<String, ApiError> {
    let stored_name = match file.extension() {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };

    let io_error = |e: std::io::Error| ApiError::from(ServiceError::Internal(format!("Failed to store upload: {}", e)));
    tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
    tokio::fs::write(dir.join(&stored_name), &file.bytes).await.map_err(io_error)?;

    info!("Stored upload {} as {}", file.file_name, stored_name);
    Ok(format!("{}/{}", UPLOAD_URL_PREFIX, stored_name))
}

/// Store the named file part when present
pub async fn store_optional(form: &mut MultipartForm, name: &str, dir: &Path) -> Result<Option<String>, ApiError> {
    match form.take_file(name) {
        Some(file) => Ok(Some(store_upload(dir, &file).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> UploadedFile {
        UploadedFile { file_name: name.to_string(), bytes: Bytes::from_static(b"data") }
    }

    #[test]
    fn test_extension_is_sanitized() {
        assert_eq!(file("Photo.JPG").extension().as_deref(), Some("jpg"));
        assert_eq!(file("archive.tar.gz").extension().as_deref(), Some("gz"));
        assert_eq!(file("noext").extension(), None);
        assert_eq!(file("evil.p/hp").extension(), None);
    }

    #[tokio::test]
    async fn test_store_upload_writes_file() {
        let dir = std::env::temp_dir().join(format!("school-health-uploads-{}", Uuid::new_v4()));
        let url = store_upload(&dir, &file("avatar.png")).await.unwrap();

        assert!(url.starts_with("/uploads/") && url.ends_with(".png"));
        let stored = dir.join(url.trim_start_matches("/uploads/"));
        assert_eq!(std::fs::read(stored).unwrap(), b"data");

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_form_accessors() {
        let mut form = MultipartForm::default();
        form.fields.insert("fees".to_string(), " 50 ".to_string());
        form.fields.insert("blank".to_string(), "  ".to_string());
        form.fields.insert("address".to_string(), r#"{"line1":"1 Main St","line2":""}"#.to_string());

        assert_eq!(form.parse::<f64>("fees").unwrap(), Some(50.0));
        assert_eq!(form.text("blank"), None);
        assert!(form.parse::<f64>("address").is_err());
        let address: serde_json::Value = form.json("address").unwrap().unwrap();
        assert_eq!(address["line1"], "1 Main St");
    }
}
