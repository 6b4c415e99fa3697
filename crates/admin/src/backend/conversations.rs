//! Conversation and message endpoints.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use mung_core::{
    Conversation, ConversationId, CreatedConversation, Message, PersonaId, SendMessageResponse,
    UserId,
};

use super::{AccessToken, BackendClient, BackendError, timeouts};

/// How the phishing scenario of a new conversation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScenarioMethod {
    /// The backend picks a random stored scenario.
    #[default]
    Random,
    /// A stored scenario of the given category, generated if none exists.
    Category,
    /// A freshly generated scenario of the given category.
    Ai,
}

impl ScenarioMethod {
    /// Parse the form value (`random`, `category`, `ai`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "random" => Some(Self::Random),
            "category" => Some(Self::Category),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Category => "category",
            Self::Ai => "ai",
        }
    }

    #[must_use]
    pub const fn requires_category(self) -> bool {
        !matches!(self, Self::Random)
    }

    const fn path(self) -> &'static str {
        match self {
            Self::Random => "/admin/conversations",
            Self::Category => "/admin/conversations/with-category",
            Self::Ai => "/admin/conversations/with-ai-case",
        }
    }

    const fn timeout(self) -> std::time::Duration {
        match self {
            Self::Random => timeouts::STANDARD,
            Self::Category | Self::Ai => timeouts::SCENARIO,
        }
    }
}

/// Parameters of an admin-created conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewConversation {
    pub user_id: UserId,
    pub persona_id: PersonaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_code: Option<String>,
    /// Sent as `null` when empty.
    pub title: Option<String>,
}

impl NewConversation {
    #[must_use]
    pub fn new(user_id: UserId, persona_id: PersonaId, title: Option<&str>) -> Self {
        Self {
            user_id,
            persona_id,
            category_code: None,
            title: title.map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned),
        }
    }

    #[must_use]
    pub fn with_category(mut self, category_code: impl Into<String>) -> Self {
        self.category_code = Some(category_code.into());
        self
    }
}

#[derive(Serialize)]
struct SelfServiceConversation<'a> {
    persona_id: PersonaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<&'a str>,
}

impl BackendClient {
    /// Create a conversation owned by the token's own account.
    ///
    /// The title is omitted from the body when empty.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn create_conversation(
        &self,
        token: &AccessToken,
        persona_id: PersonaId,
        title: Option<&str>,
    ) -> Result<Value, BackendError> {
        let body = SelfServiceConversation {
            persona_id,
            title: title.filter(|t| !t.is_empty()),
        };
        let request = self
            .request(Method::POST, "/conversations/", Some(token), timeouts::SHORT)
            .json(&body);
        self.send_json(request).await
    }

    /// Create a conversation for any user with a random scenario.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn create_conversation_admin(
        &self,
        token: &AccessToken,
        conversation: &NewConversation,
    ) -> Result<CreatedConversation, BackendError> {
        self.post_scenario(token, ScenarioMethod::Random, conversation)
            .await
    }

    /// Create a conversation using a stored scenario of a category first.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn create_conversation_with_category_admin(
        &self,
        token: &AccessToken,
        conversation: &NewConversation,
    ) -> Result<CreatedConversation, BackendError> {
        self.post_scenario(token, ScenarioMethod::Category, conversation)
            .await
    }

    /// Create a conversation with a freshly generated scenario.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn create_conversation_with_ai_case_admin(
        &self,
        token: &AccessToken,
        conversation: &NewConversation,
    ) -> Result<CreatedConversation, BackendError> {
        self.post_scenario(token, ScenarioMethod::Ai, conversation)
            .await
    }

    /// Create a conversation with the endpoint matching `method`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn create_conversation_by(
        &self,
        token: &AccessToken,
        method: ScenarioMethod,
        conversation: &NewConversation,
    ) -> Result<CreatedConversation, BackendError> {
        match method {
            ScenarioMethod::Random => self.create_conversation_admin(token, conversation).await,
            ScenarioMethod::Category => {
                self.create_conversation_with_category_admin(token, conversation)
                    .await
            }
            ScenarioMethod::Ai => {
                self.create_conversation_with_ai_case_admin(token, conversation)
                    .await
            }
        }
    }

    #[instrument(skip(self, token), fields(method = method.as_str()))]
    async fn post_scenario(
        &self,
        token: &AccessToken,
        method: ScenarioMethod,
        conversation: &NewConversation,
    ) -> Result<CreatedConversation, BackendError> {
        let request = self
            .request(Method::POST, method.path(), Some(token), method.timeout())
            .json(conversation);
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_all_conversations_admin(
        &self,
        token: &AccessToken,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<Conversation>, BackendError> {
        let request = self
            .request(
                Method::GET,
                "/admin/conversations",
                Some(token),
                timeouts::STANDARD,
            )
            .query(&[("skip", skip), ("limit", limit)]);
        self.send_json(request).await
    }

    /// Messages of a conversation, oldest first as the backend returns them.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_messages_for_conversation_admin(
        &self,
        token: &AccessToken,
        id: ConversationId,
    ) -> Result<Vec<Message>, BackendError> {
        let request = self.request(
            Method::GET,
            &format!("/admin/conversations/{id}/messages"),
            Some(token),
            timeouts::STANDARD,
        );
        self.send_json(request).await
    }

    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn delete_conversation_admin(
        &self,
        token: &AccessToken,
        id: ConversationId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/admin/conversations/{id}"),
            Some(token),
            timeouts::STANDARD,
        );
        self.send_unit(request).await
    }

    /// Post a message and wait for the AI reply.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or times out.
    #[instrument(skip(self, token, content, image_base64), fields(has_image = image_base64.is_some()))]
    pub async fn send_message(
        &self,
        token: &AccessToken,
        id: ConversationId,
        content: &str,
        image_base64: Option<&str>,
    ) -> Result<SendMessageResponse, BackendError> {
        let request = self
            .request(
                Method::POST,
                &format!("/conversations/{id}/messages/"),
                Some(token),
                timeouts::LONG,
            )
            .json(&OutgoingMessage {
                content,
                image_base64: image_base64.filter(|b| !b.is_empty()),
            });
        self.send_json(request).await
    }
}
