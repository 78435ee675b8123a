use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::AppError;
use crate::storage::client::{ImageHost, ImageUpload};
use crate::util::text::{clean_field, split_requirements};

/// Name of the multipart field carrying the optional image.
pub const IMAGE_FIELD: &str = "image";

/// A parsed admin content form: text fields plus an optional image file.
#[derive(Debug, Clone, Default)]
pub struct ContentForm {
    fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl ContentForm {
    /// Build a form from already decoded text fields.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            image: None,
        }
    }

    /// Read every field of a multipart body.
    ///
    /// An empty `image` part (no file chosen) is ignored. A non-empty part that
    /// is not `image/*` is rejected.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ContentForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == IMAGE_FIELD {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

                if file_name.is_empty() || data.is_empty() {
                    continue;
                }

                if !content_type.starts_with("image/") {
                    return Err(AppError::BadRequest("Only image files are allowed".into()));
                }

                form.image = Some(ImageUpload {
                    bytes: data.to_vec(),
                    file_name,
                    content_type,
                });
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read field '{name}': {e}")))?;
            form.fields.insert(name, value);
        }

        Ok(form)
    }

    /// Raw, untrimmed value as submitted.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Sanitized value; blank or missing fields read as `N/A`.
    pub fn text(&self, name: &str) -> String {
        clean_field(self.raw(name).unwrap_or(""))
    }

    /// Sanitized value, or `None` when blank or missing.
    pub fn optional_text(&self, name: &str) -> Option<String> {
        let value = self.raw(name)?.trim();
        (!value.is_empty()).then(|| crate::util::text::sanitize_input(value))
    }

    /// Sanitized value when the field was submitted at all; blank reads as `N/A`.
    pub fn submitted_text(&self, name: &str) -> Option<String> {
        self.raw(name).map(|_| self.text(name))
    }

    /// HTML checkbox semantics: checked boxes submit `on`, unchecked ones are absent.
    pub fn checkbox(&self, name: &str) -> bool {
        self.raw(name) == Some("on")
    }

    pub fn requirements(&self) -> Vec<String> {
        split_requirements(&self.text("requirements"))
    }
}

/// Upload `image` if present. Failures are logged and read as "no image".
pub async fn store_image(host: &dyn ImageHost, image: Option<ImageUpload>) -> Option<String> {
    let image = image?;
    let file_name = image.file_name.clone();

    match host.upload(image).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(file = %file_name, error = %e, "image upload failed, continuing without image");
            None
        }
    }
}
