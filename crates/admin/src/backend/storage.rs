//! Object storage: presigned URLs, raw uploads, and deletion.

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::instrument;

use mung_core::{PresignedDownload, PresignedUpload};

use super::{AccessToken, BackendClient, BackendError, timeouts};

#[derive(Serialize)]
struct UploadRequest<'a> {
    filename: &'a str,
}

impl BackendClient {
    /// Ask the backend for a presigned upload URL.
    ///
    /// `category` selects the key prefix (`users`, `personas`).
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_presigned_url_for_upload(
        &self,
        token: &AccessToken,
        filename: &str,
        category: &str,
    ) -> Result<PresignedUpload, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/storage/presigned-url/upload",
                Some(token),
                timeouts::STANDARD,
            )
            .query(&[("category", category)])
            .json(&UploadRequest { filename });
        self.send_json(request).await
    }

    /// `PUT` raw bytes to a presigned URL.
    ///
    /// The URL carries its own credentials, so no bearer token is sent.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is malformed or storage rejects the upload.
    #[instrument(skip(self, presigned_url, bytes), fields(size = bytes.len()))]
    pub async fn upload_file_to_storage(
        &self,
        presigned_url: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let url = url::Url::parse(presigned_url)
            .map_err(|e| BackendError::InvalidUrl(format!("presigned URL: {e}")))?;

        let request = self
            .inner
            .client
            .put(url)
            .timeout(timeouts::LONG)
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        self.send_unit(request).await
    }

    /// Delete a stored object by key.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn delete_storage_object(
        &self,
        token: &AccessToken,
        object_key: &str,
    ) -> Result<(), BackendError> {
        let request = self
            .request(
                Method::DELETE,
                "/storage/object",
                Some(token),
                timeouts::STANDARD,
            )
            .query(&[("object_key", object_key)]);
        self.send_unit(request).await
    }

    /// Presigned download URL for a stored object.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_presigned_url_for_download(
        &self,
        token: &AccessToken,
        object_key: &str,
    ) -> Result<String, BackendError> {
        let request = self
            .request(
                Method::GET,
                "/storage/presigned-url/download",
                Some(token),
                timeouts::STANDARD,
            )
            .query(&[("object_key", object_key)]);
        let download: PresignedDownload = self.send_json(request).await?;
        Ok(download.url)
    }
}
