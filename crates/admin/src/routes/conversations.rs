//! Test conversation route handlers.
//!
//! Operators create conversations between a user and a persona with a
//! phishing scenario, then chat through them to check the AI replies.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use mung_core::{
    Conversation, ConversationId, Message, Persona, PersonaId, PhishingCase, PhishingCategory,
    User, UserId,
};

use crate::{
    backend::{AccessToken, NewConversation, ScenarioMethod},
    error::AppError,
    filters,
    middleware::RequireAdminAuth,
    models::{Flash, LastResponse, session_keys},
    routes::{
        PageContext, flash_failure,
        forms::{MultipartForm, UPLOAD_BODY_LIMIT},
        rows_or_banner,
    },
    services::{MessageOrder, listing},
    state::AppState,
};

/// Build the conversations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(index).post(create))
        .route("/conversations/{id}", get(show))
        .route("/conversations/{id}/messages", post(send_message))
        .route("/conversations/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub order: Option<String>,
}

/// Conversation row for the table.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: ConversationId,
    pub user_id: UserId,
    pub user_email: String,
    pub persona_name: String,
    pub scenario_id: i64,
    pub title: String,
    pub last_message: String,
}

impl From<&Conversation> for ConversationRow {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id,
            user_id: c.user.id,
            user_email: c.user.email.clone().unwrap_or_default(),
            persona_name: c.persona.name.clone(),
            scenario_id: c.scenario_id(),
            title: c.title.clone().unwrap_or_default(),
            last_message: c.last_message_kst(),
        }
    }
}

/// Option in a select box.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl From<&User> for SelectOption {
    fn from(user: &User) -> Self {
        Self {
            value: user.id.to_string(),
            label: user.label(),
        }
    }
}

impl From<&Persona> for SelectOption {
    fn from(persona: &Persona) -> Self {
        Self {
            value: persona.id.to_string(),
            label: format!("{} (ID: {})", persona.name, persona.id),
        }
    }
}

impl From<&PhishingCategory> for SelectOption {
    fn from(category: &PhishingCategory) -> Self {
        Self {
            value: category.code.clone(),
            label: format!("{} - {}", category.code, category.description),
        }
    }
}

/// Choices for the create form. `None` when any list failed to load.
#[derive(Debug, Clone)]
pub struct CreateChoices {
    pub users: Vec<SelectOption>,
    pub personas: Vec<SelectOption>,
    pub categories: Vec<SelectOption>,
}

/// Conversation list template.
#[derive(Template, WebTemplate)]
#[template(path = "conversations/index.html")]
pub struct ConversationsIndexTemplate {
    pub page: PageContext,
    pub conversations: Vec<ConversationRow>,
    pub search_query: String,
    pub load_error: Option<String>,
    pub choices: Option<CreateChoices>,
}

/// A message prepared for display.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub avatar: &'static str,
    pub sender: &'static str,
    pub text: Option<String>,
    pub has_image: bool,
    pub image_url: Option<String>,
    pub created_at: Option<String>,
    pub details: String,
}

/// Conversation detail template.
#[derive(Template, WebTemplate)]
#[template(path = "conversations/show.html")]
pub struct ConversationShowTemplate {
    pub page: PageContext,
    pub conversation: Conversation,
    pub messages: Vec<MessageView>,
    pub messages_error: Option<String>,
    pub toggle_order: &'static str,
    pub newest_first: bool,
    pub applied_case: Option<PhishingCase>,
    pub case_error: Option<String>,
    pub quick_options: Vec<String>,
    pub last_response: Option<String>,
}

/// Conversation list page handler.
#[instrument(skip(admin, state, session))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> Result<ConversationsIndexTemplate, AppError> {
    let backend = state.backend();
    let cache = state.cache();
    let token = &admin.access_token;

    let (conversations, users, personas, categories) = tokio::join!(
        cache.conversations(backend, token),
        cache.users(backend, token),
        cache.personas(backend, token),
        cache.categories(backend),
    );
    let (conversations, load_error) = rows_or_banner(conversations, "conversations")?;

    let choices = match (users, personas, categories) {
        (Ok(users), Ok(personas), Ok(categories)) => Some(CreateChoices {
            users: users.iter().map(SelectOption::from).collect(),
            personas: personas.iter().map(SelectOption::from).collect(),
            categories: categories.iter().map(SelectOption::from).collect(),
        }),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            if e.is_unauthorized() {
                return Err(e.into());
            }
            tracing::warn!(error = %e, "Conversation create form data failed to load");
            None
        }
    };

    let needle = listing::search_needle(query.q.as_deref());
    let rows = listing::filter_by(conversations, needle.as_deref(), Conversation::matches)
        .iter()
        .map(ConversationRow::from)
        .collect();

    Ok(ConversationsIndexTemplate {
        page: PageContext::new(&session, &admin, "/conversations").await,
        conversations: rows,
        search_query: query.q.unwrap_or_default(),
        load_error,
        choices,
    })
}

/// Submitted create form.
#[derive(Debug, Default, Deserialize)]
pub struct CreateForm {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub persona_id: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub category_code: String,
    #[serde(default)]
    pub title: String,
}

impl CreateForm {
    /// Validate the selection and build the request.
    fn to_request(&self) -> Result<(ScenarioMethod, NewConversation), String> {
        let user_id: UserId = self
            .user_id
            .parse()
            .map_err(|_| "Select a user.".to_string())?;
        let persona_id: PersonaId = self
            .persona_id
            .parse()
            .map_err(|_| "Select a persona.".to_string())?;
        let method = ScenarioMethod::parse(self.method.trim()).unwrap_or_default();

        let mut request = NewConversation::new(user_id, persona_id, Some(&self.title));
        if method.requires_category() {
            let code = self.category_code.trim();
            if code.is_empty() {
                return Err("Select a phishing category for this scenario method.".to_string());
            }
            request = request.with_category(code);
        }
        Ok((method, request))
    }
}

/// Create a conversation with the chosen scenario method.
#[instrument(skip(admin, state, session, form))]
pub async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CreateForm>,
) -> Result<Response, AppError> {
    let (method, request) = match form.to_request() {
        Ok(parts) => parts,
        Err(error) => {
            Flash::error(error).push(&session).await;
            return Ok(Redirect::to("/conversations").into_response());
        }
    };

    match state
        .backend()
        .create_conversation_by(&admin.access_token, method, &request)
        .await
    {
        Ok(created) => {
            state.cache().clear();
            tracing::info!(conversation_id = %created.id, method = method.as_str(), "Conversation created");
            Flash::success(format!("Conversation {} created.", created.id))
                .push(&session)
                .await;
            Ok(Redirect::to(&format!("/conversations/{}", created.id)).into_response())
        }
        Err(e) => {
            flash_failure(&session, "Creating the conversation", e).await?;
            Ok(Redirect::to("/conversations").into_response())
        }
    }
}

async fn find_conversation(
    state: &AppState,
    token: &AccessToken,
    id: ConversationId,
) -> Result<Option<Conversation>, AppError> {
    let conversations = state.cache().conversations(state.backend(), token).await?;
    Ok(conversations.into_iter().find(|c| c.id == id))
}

/// Prepare a message, presigning its image through the cache.
async fn message_view(state: &AppState, token: &AccessToken, message: Message) -> MessageView {
    let image_key = message.image_key.as_deref().filter(|k| !k.is_empty());
    let image_url = match image_key {
        Some(key) => match state.cache().download_url(state.backend(), token, key).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, object_key = %key, "Message image unavailable");
                None
            }
        },
        None => None,
    };
    let details = serde_json::to_string(&message.details()).unwrap_or_default();

    MessageView {
        avatar: message.sender_type.avatar(),
        sender: message.sender_type.as_str(),
        text: message.text().map(str::to_owned),
        has_image: image_key.is_some(),
        image_url,
        created_at: message.created_at.clone(),
        details,
    }
}

/// Last send-message response stored for this conversation.
async fn stored_response(session: &Session, id: ConversationId) -> Option<LastResponse> {
    session
        .get::<LastResponse>(session_keys::LAST_RESPONSE)
        .await
        .ok()
        .flatten()
        .filter(|last| last.conversation_id == id)
}

/// Conversation detail page handler.
#[instrument(skip(admin, state, session))]
pub async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ConversationId>,
    Query(query): Query<ShowQuery>,
) -> Result<Response, AppError> {
    let token = &admin.access_token;
    let Some(conversation) = find_conversation(&state, token, id).await? else {
        Flash::warning(format!("Conversation {id} is not in the list."))
            .push(&session)
            .await;
        return Ok(Redirect::to("/conversations").into_response());
    };

    let order = MessageOrder::from_query(query.order.as_deref());
    let (messages, messages_error) = rows_or_banner(
        state
            .backend()
            .get_messages_for_conversation_admin(token, id)
            .await,
        "messages",
    )?;
    let has_messages = !messages.is_empty();

    let mut views = Vec::with_capacity(messages.len());
    for message in order.arrange(messages) {
        views.push(message_view(&state, token, message).await);
    }

    let (applied_case, case_error) = match conversation.applied_phishing_case_id {
        Some(case_id) => match state.cache().case(state.backend(), token, case_id).await {
            Ok(case) => (Some(case), None),
            Err(e) if e.is_unauthorized() => return Err(e.into()),
            Err(e) => (
                None,
                Some(format!("Failed to load phishing case {case_id}: {}", e.detail())),
            ),
        },
        None => (None, None),
    };

    let last = stored_response(&session, id).await;
    let quick_options = listing::quick_options(
        has_messages,
        &conversation.persona,
        last.as_ref().map(|l| &l.response),
    );
    let last_response = last.and_then(|l| serde_json::to_string(&l.response).ok());

    Ok(ConversationShowTemplate {
        page: PageContext::new(&session, &admin, "/conversations").await,
        conversation,
        messages: views,
        messages_error,
        toggle_order: order.toggled_query(),
        newest_first: order == MessageOrder::NewestFirst,
        applied_case,
        case_error,
        quick_options,
        last_response,
    }
    .into_response())
}

/// Send a message with optional image, as typed or from a quick option.
#[instrument(skip(admin, state, session, multipart))]
pub async fn send_message(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ConversationId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let content = form.text("content").trim().to_string();
    let image = form.take_file("image").map(|file| STANDARD.encode(&file.bytes));
    let back = format!("/conversations/{id}");

    if content.is_empty() && image.is_none() {
        Flash::error("Enter a message or attach an image.")
            .push(&session)
            .await;
        return Ok(Redirect::to(&back).into_response());
    }

    match state
        .backend()
        .send_message(&admin.access_token, id, &content, image.as_deref())
        .await
    {
        Ok(response) => {
            session
                .insert(
                    session_keys::LAST_RESPONSE,
                    LastResponse {
                        conversation_id: id,
                        response,
                    },
                )
                .await?;
            state.cache().clear();
            tracing::info!(conversation_id = %id, "Message sent");
        }
        Err(e) => flash_failure(&session, "Sending the message", e).await?,
    }

    Ok(Redirect::to(&format!("{back}#chat-bottom")).into_response())
}

/// Delete a conversation.
#[instrument(skip(admin, state, session))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ConversationId>,
) -> Result<Response, AppError> {
    match state
        .backend()
        .delete_conversation_admin(&admin.access_token, id)
        .await
    {
        Ok(()) => {
            if stored_response(&session, id).await.is_some() {
                session
                    .remove::<LastResponse>(session_keys::LAST_RESPONSE)
                    .await?;
            }
            state.cache().clear();
            tracing::info!(conversation_id = %id, "Conversation deleted");
            Flash::success(format!("Conversation {id} deleted."))
                .push(&session)
                .await;
            Ok(Redirect::to("/conversations").into_response())
        }
        Err(e) => {
            flash_failure(&session, "Deleting the conversation", e).await?;
            Ok(Redirect::to(&format!("/conversations/{id}")).into_response())
        }
    }
}
