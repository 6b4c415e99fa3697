//! Session-related types for admin authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use mung_core::{ConversationId, SendMessageResponse};

use crate::backend::AccessToken;

/// Session-stored admin identity.
///
/// The backend issues no refresh token; when the access token is rejected
/// the session is cleared and the operator logs in again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Email the admin logged in with.
    pub email: String,
    /// Bearer token for backend calls.
    pub access_token: AccessToken,
}

/// The most recent send-message response, kept for the raw response panel
/// and the suggested follow-up questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastResponse {
    pub conversation_id: ConversationId,
    pub response: SendMessageResponse,
}

/// Session keys for admin state.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for pending flash messages.
    pub const FLASHES: &str = "flashes";

    /// Key for the last send-message response.
    pub const LAST_RESPONSE: &str = "last_response";
}
