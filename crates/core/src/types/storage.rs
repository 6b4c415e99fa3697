//! Presigned object storage URLs.

use serde::{Deserialize, Serialize};

/// Response of `POST /storage/presigned-url/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUpload {
    /// URL to `PUT` the object bytes to.
    pub url: String,
    /// Key under which the object will be stored.
    pub object_key: String,
}

/// Response of `GET /storage/presigned-url/download`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedDownload {
    pub url: String,
}

/// Storage categories accepted by the upload endpoint.
pub mod category {
    pub const USERS: &str = "users";
    pub const PERSONAS: &str = "personas";
}
