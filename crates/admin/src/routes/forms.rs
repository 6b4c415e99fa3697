//! Multipart form parsing for pages with file inputs.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::AppError;
use crate::services::UploadedFile;

/// Request body limit for routes that accept image uploads.
pub const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// A fully buffered multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Read every field of the request.
    ///
    /// File inputs left empty by the browser (no name or no bytes) are
    /// treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` if the body is not valid multipart data.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
                    if !file_name.is_empty() && !bytes.is_empty() {
                        form.files.insert(
                            name,
                            UploadedFile {
                                file_name,
                                content_type,
                                bytes: bytes.to_vec(),
                            },
                        );
                    }
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Invalid form field: {e}")))?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Raw text value, empty when the field was not sent.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    /// Trimmed text value, `None` when blank.
    #[must_use]
    pub fn optional(&self, name: &str) -> Option<String> {
        Some(self.text(name).trim())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    /// Checkbox state. Unchecked boxes are not sent at all.
    #[must_use]
    pub fn checked(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .is_some_and(|v| !matches!(v.as_str(), "" | "false" | "off"))
    }

    /// Remove an uploaded file from the form.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> MultipartForm {
        MultipartForm {
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            files: HashMap::new(),
        }
    }

    #[test]
    fn test_checkbox_values() {
        let f = form(&[("is_active", "on"), ("is_superuser", "false")]);
        assert!(f.checked("is_active"));
        assert!(!f.checked("is_superuser"));
        assert!(!f.checked("delete_image"));
    }

    #[test]
    fn test_optional_trims_blanks() {
        let f = form(&[("description", "   "), ("name", " Grandma ")]);
        assert_eq!(f.optional("description"), None);
        assert_eq!(f.optional("name").as_deref(), Some("Grandma"));
        assert_eq!(f.text("missing"), "");
    }
}
