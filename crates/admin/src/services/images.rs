//! Profile image change flow shared by users and personas.
//!
//! The stored key changes only after the record update succeeds: a new
//! upload is pushed to storage first, the record is updated with the final
//! key, and only then is the previous object deleted.

use tracing::instrument;

use crate::backend::{AccessToken, BackendClient, BackendError};

/// A file received from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What to do with a record's profile image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    /// Leave the current key as it is.
    Keep,
    /// Clear the key and delete the stored object.
    Remove,
    /// Upload a new object and switch to its key.
    Replace(UploadedFile),
}

impl ImageChange {
    /// Decide from the form: a checked delete box wins over a new upload.
    #[must_use]
    pub fn from_form(delete_requested: bool, upload: Option<UploadedFile>) -> Self {
        if delete_requested {
            return Self::Remove;
        }
        upload.map_or(Self::Keep, Self::Replace)
    }
}

/// Result of preparing an image change, before the record update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreparedImage {
    /// Key to send in the record update (`None` clears it).
    pub final_key: Option<String>,
    /// Object to delete once the record update has succeeded.
    pub stale_key: Option<String>,
    /// Why a requested upload did not happen.
    pub upload_error: Option<String>,
}

impl PreparedImage {
    /// Plan for changes that need no storage call.
    #[must_use]
    pub fn without_upload(previous: Option<String>, change: &ImageChange) -> Self {
        match change {
            ImageChange::Remove => Self {
                final_key: None,
                stale_key: previous,
                upload_error: None,
            },
            ImageChange::Keep | ImageChange::Replace(_) => Self {
                final_key: previous,
                stale_key: None,
                upload_error: None,
            },
        }
    }
}

/// Perform the storage side of an image change.
///
/// On upload failure the previous key is kept and the error is reported in
/// [`PreparedImage::upload_error`] so the caller can still save other fields.
#[instrument(skip(backend, token, change))]
pub async fn prepare_image(
    backend: &BackendClient,
    token: &AccessToken,
    category: &str,
    previous: Option<String>,
    change: ImageChange,
) -> PreparedImage {
    let ImageChange::Replace(file) = change else {
        return PreparedImage::without_upload(previous, &change);
    };

    match upload_image(backend, token, category, file).await {
        Ok(new_key) => PreparedImage {
            final_key: Some(new_key),
            stale_key: previous,
            upload_error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Image upload failed; keeping previous image");
            PreparedImage {
                final_key: previous,
                stale_key: None,
                upload_error: Some(e.detail()),
            }
        }
    }
}

/// Presign and upload a file, returning its object key.
///
/// # Errors
///
/// Returns error if presigning or the upload fails.
pub async fn upload_image(
    backend: &BackendClient,
    token: &AccessToken,
    category: &str,
    file: UploadedFile,
) -> Result<String, BackendError> {
    let presigned = backend
        .get_presigned_url_for_upload(token, &file.file_name, category)
        .await?;
    backend
        .upload_file_to_storage(&presigned.url, file.bytes, &file.content_type)
        .await?;
    tracing::info!(object_key = %presigned.object_key, "Image uploaded");
    Ok(presigned.object_key)
}

/// Delete an object that is no longer referenced. Failures are only logged.
pub async fn remove_stale_image(backend: &BackendClient, token: &AccessToken, key: Option<&str>) {
    let Some(key) = key else { return };
    if let Err(e) = backend.delete_storage_object(token, key).await {
        tracing::warn!(object_key = %key, error = %e, "Failed to delete replaced image");
    }
}

/// Delete a record's image before the record itself.
///
/// # Errors
///
/// Returns error if the stored object could not be deleted; the record
/// must then be kept.
pub async fn delete_image_before_record(
    backend: &BackendClient,
    token: &AccessToken,
    key: Option<&str>,
) -> Result<(), BackendError> {
    match key.filter(|k| !k.is_empty()) {
        Some(key) => backend.delete_storage_object(token, key).await,
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> UploadedFile {
        UploadedFile {
            file_name: "face.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_delete_wins_over_upload() {
        assert_eq!(ImageChange::from_form(true, Some(file())), ImageChange::Remove);
        assert_eq!(ImageChange::from_form(false, Some(file())), ImageChange::Replace(file()));
        assert_eq!(ImageChange::from_form(false, None), ImageChange::Keep);
    }

    #[test]
    fn test_remove_clears_key_and_marks_previous_stale() {
        let prepared = PreparedImage::without_upload(Some("users/old.png".into()), &ImageChange::Remove);
        assert_eq!(prepared.final_key, None);
        assert_eq!(prepared.stale_key.as_deref(), Some("users/old.png"));
    }

    #[test]
    fn test_keep_preserves_key() {
        let prepared = PreparedImage::without_upload(Some("users/old.png".into()), &ImageChange::Keep);
        assert_eq!(prepared.final_key.as_deref(), Some("users/old.png"));
        assert_eq!(prepared.stale_key, None);

        let prepared = PreparedImage::without_upload(None, &ImageChange::Remove);
        assert_eq!(prepared, PreparedImage::default());
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_previous_key() {
        let backend = BackendClient::new("http://127.0.0.1:9").unwrap_or_else(|e| panic!("{e}"));
        let token = AccessToken::new("t");
        let prepared = prepare_image(
            &backend,
            &token,
            "users",
            Some("users/old.png".into()),
            ImageChange::Replace(file()),
        )
        .await;
        assert_eq!(prepared.final_key.as_deref(), Some("users/old.png"));
        assert_eq!(prepared.stale_key, None);
        assert!(prepared.upload_error.is_some());
    }

    #[tokio::test]
    async fn test_no_image_means_nothing_to_delete() {
        let backend = BackendClient::new("http://127.0.0.1:9").unwrap_or_else(|e| panic!("{e}"));
        let token = AccessToken::new("t");
        assert!(delete_image_before_record(&backend, &token, None).await.is_ok());
        assert!(delete_image_before_record(&backend, &token, Some("")).await.is_ok());
        assert!(delete_image_before_record(&backend, &token, Some("users/a.png")).await.is_err());
    }
}
