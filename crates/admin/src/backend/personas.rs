//! Persona endpoints.

use reqwest::Method;
use tracing::instrument;

use mung_core::{Persona, PersonaId, PersonaInput};

use super::{AccessToken, BackendClient, BackendError, timeouts};

impl BackendClient {
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip_all)]
    pub async fn get_personas(&self, token: &AccessToken) -> Result<Vec<Persona>, BackendError> {
        let request = self.request(Method::GET, "/personas/", Some(token), timeouts::SHORT);
        self.send_json(request).await
    }

    /// Create a persona. Personas created from the admin are always public.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token, input), fields(name = %input.name))]
    pub async fn create_persona(
        &self,
        token: &AccessToken,
        input: &PersonaInput,
    ) -> Result<Persona, BackendError> {
        let input = PersonaInput {
            is_public: true,
            ..input.clone()
        };
        let request = self
            .request(Method::POST, "/personas/", Some(token), timeouts::SHORT)
            .json(&input);
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token, input))]
    pub async fn update_persona(
        &self,
        token: &AccessToken,
        id: PersonaId,
        input: &PersonaInput,
    ) -> Result<(), BackendError> {
        let request = self
            .request(
                Method::PUT,
                &format!("/personas/{id}"),
                Some(token),
                timeouts::STANDARD,
            )
            .json(input);
        self.send_unit(request).await
    }

    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn delete_persona(
        &self,
        token: &AccessToken,
        id: PersonaId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/personas/{id}"),
            Some(token),
            timeouts::STANDARD,
        );
        self.send_unit(request).await
    }
}
