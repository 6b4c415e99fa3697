//! User management endpoints.

use reqwest::Method;
use tracing::instrument;

use mung_core::{User, UserId, UserUpdate};

use super::{AccessToken, BackendClient, BackendError, timeouts};

impl BackendClient {
    /// List every user account.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the caller is not a superuser.
    #[instrument(skip_all)]
    pub async fn get_all_users(&self, token: &AccessToken) -> Result<Vec<User>, BackendError> {
        let request = self.request(Method::GET, "/admin/users", Some(token), timeouts::SHORT);
        self.send_json(request).await
    }

    /// Replace the writable fields of a user.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token, update))]
    pub async fn update_user(
        &self,
        token: &AccessToken,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<(), BackendError> {
        let request = self
            .request(
                Method::PUT,
                &format!("/admin/users/{id}"),
                Some(token),
                timeouts::STANDARD,
            )
            .json(update);
        self.send_unit(request).await
    }

    /// Delete a user account.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn delete_user(&self, token: &AccessToken, id: UserId) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/admin/users/{id}"),
            Some(token),
            timeouts::STANDARD,
        );
        self.send_unit(request).await
    }
}
