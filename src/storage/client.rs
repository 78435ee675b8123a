use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Folder uploaded images are grouped under on the image host.
pub const UPLOAD_FOLDER: &str = "community_platform";

/// Incoming transformation: cap width at 800px, automatic quality and format.
pub const UPLOAD_TRANSFORMATION: &str = "c_limit,w_800,q_auto:good,f_auto";

/// An image received from an admin form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Trait for the hosted image service.
///
/// Abstracted as a trait so tests can use a mock without network access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload an image and return its public HTTPS URL.
    async fn upload(&self, image: ImageUpload) -> Result<String, AppError>;
}

/// Cloudinary account credentials.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Cloudinary implementation of ImageHost using the signed upload API.
///
/// Requests are signed with SHA-256, so the account must have SHA-256
/// signatures enabled.
pub struct CloudinaryImageHost {
    http: reqwest::Client,
    config: CloudinaryConfig,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    secure_url: String,
}

impl CloudinaryImageHost {
    pub fn new(config: CloudinaryConfig) -> Self {
        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            config.cloud_name
        );
        Self::with_endpoint(config, endpoint)
    }

    /// Create with an explicit upload endpoint (useful for testing).
    pub fn with_endpoint(config: CloudinaryConfig, endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            endpoint,
        }
    }
}

/// Sign upload parameters: `k1=v1&k2=v2...` sorted by key, followed by the secret.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Sha256::digest(format!("{to_sign}{api_secret}").as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[async_trait]
impl ImageHost for CloudinaryImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<String, AppError> {
        use reqwest::multipart::{Form, Part};

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params = [
            ("folder", UPLOAD_FOLDER),
            ("timestamp", timestamp.as_str()),
            ("transformation", UPLOAD_TRANSFORMATION),
        ];
        let signature = sign_params(&params, &self.config.api_secret);

        let part = Part::bytes(image.bytes)
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| AppError::BadRequest(format!("Invalid image content type: {e}")))?;

        let mut form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key.to_string(), value.to_string());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Upload request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "Upload of '{}' rejected with {}: {}",
                image.file_name, status, body
            )));
        }

        let result: UploadResult = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Unexpected upload response: {e}")))?;

        tracing::info!(url = %result.secure_url, "image uploaded");
        Ok(result.secure_url)
    }
}

/// Used when no image host credentials are configured.
pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<String, AppError> {
        Err(AppError::Storage(format!(
            "Image uploads are not configured; dropped '{}'",
            image.file_name
        )))
    }
}
