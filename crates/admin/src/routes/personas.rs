//! Persona management route handlers, including JSON backup and restore.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use mung_core::{
    Persona, PersonaId, PersonaInput, parse_conversation_starters, types::storage::category,
};

use crate::{
    backend::{AccessToken, BackendClient},
    error::AppError,
    filters,
    middleware::RequireAdminAuth,
    models::{CurrentAdmin, Flash},
    routes::{
        PageContext, flash_failure,
        forms::{MultipartForm, UPLOAD_BODY_LIMIT},
        json_download, rows_or_banner, run_import,
    },
    services::{
        ImageChange,
        backup::{self, PERSONA_BACKUP_FILE},
        images::{delete_image_before_record, prepare_image, remove_stale_image, upload_image},
        listing,
    },
    state::AppState,
};

/// Build the personas router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/personas", get(index).post(create))
        .route("/personas/new", get(new_page))
        .route("/personas/export", get(export))
        .route("/personas/import", post(import))
        .route("/personas/{id}/edit", get(edit_page))
        .route("/personas/{id}", post(update))
        .route("/personas/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Values shown in the persona form.
#[derive(Debug, Clone, Default)]
pub struct PersonaFormView {
    pub id: Option<PersonaId>,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub starting_message: String,
    pub starters: String,
    pub is_public: bool,
    pub has_image: bool,
    pub image_url: Option<String>,
    pub image_error: bool,
}

impl PersonaFormView {
    fn from_persona(persona: &Persona) -> Self {
        Self {
            id: Some(persona.id),
            name: persona.name.clone(),
            description: persona.description.clone().unwrap_or_default(),
            system_prompt: persona.system_prompt.clone(),
            starting_message: persona.starting_message.clone().unwrap_or_default(),
            starters: persona.starters_text(),
            is_public: persona.is_public,
            has_image: persona.profile_image_key.as_deref().is_some_and(|k| !k.is_empty()),
            image_url: None,
            image_error: false,
        }
    }

    fn from_form(form: &MultipartForm) -> Self {
        Self {
            name: form.text("name").to_string(),
            description: form.text("description").to_string(),
            system_prompt: form.text("system_prompt").to_string(),
            starting_message: form.text("starting_message").to_string(),
            starters: form.text("conversation_starters").to_string(),
            is_public: true,
            ..Self::default()
        }
    }

    /// Where the form posts to.
    #[must_use]
    pub fn action(&self) -> String {
        self.id
            .map_or_else(|| "/personas".to_string(), |id| format!("/personas/{id}"))
    }
}

/// Persona list template.
#[derive(Template, WebTemplate)]
#[template(path = "personas/index.html")]
pub struct PersonasIndexTemplate {
    pub page: PageContext,
    pub personas: Vec<Persona>,
    pub search_query: String,
    pub load_error: Option<String>,
}

/// Persona create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "personas/form.html")]
pub struct PersonaFormTemplate {
    pub page: PageContext,
    pub persona: PersonaFormView,
    pub error: Option<String>,
}

const REQUIRED_FIELDS: &str = "Name and system prompt are required.";

/// Build the create/update body from the submitted form.
fn persona_input(
    form: &MultipartForm,
    is_public: bool,
    profile_image_key: Option<String>,
) -> Result<PersonaInput, String> {
    let name = form.text("name").trim();
    let system_prompt = form.text("system_prompt").trim();
    if name.is_empty() || system_prompt.is_empty() {
        return Err(REQUIRED_FIELDS.to_string());
    }
    Ok(PersonaInput {
        name: name.to_string(),
        description: form.optional("description"),
        system_prompt: system_prompt.to_string(),
        is_public,
        profile_image_key,
        starting_message: form.optional("starting_message"),
        conversation_starters: parse_conversation_starters(form.text("conversation_starters")),
    })
}

/// Persona list page handler.
#[instrument(skip(admin, state, session))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> Result<PersonasIndexTemplate, AppError> {
    let result = state
        .cache()
        .personas(state.backend(), &admin.access_token)
        .await;
    let (personas, load_error) = rows_or_banner(result, "personas")?;

    let needle = listing::search_needle(query.q.as_deref());
    let personas = listing::filter_by(personas, needle.as_deref(), listing::persona_matches);

    Ok(PersonasIndexTemplate {
        page: PageContext::new(&session, &admin, "/personas").await,
        personas,
        search_query: query.q.unwrap_or_default(),
        load_error,
    })
}

/// New persona form.
#[instrument(skip(admin, session))]
pub async fn new_page(
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
) -> PersonaFormTemplate {
    PersonaFormTemplate {
        page: PageContext::new(&session, &admin, "/personas").await,
        persona: PersonaFormView {
            is_public: true,
            ..PersonaFormView::default()
        },
        error: None,
    }
}

/// Show the create form again with what was submitted.
async fn render_create_error(
    session: &Session,
    admin: &CurrentAdmin,
    form: &MultipartForm,
    error: String,
) -> Response {
    PersonaFormTemplate {
        page: PageContext::new(session, admin, "/personas").await,
        persona: PersonaFormView::from_form(form),
        error: Some(error),
    }
    .into_response()
}

/// Create a persona. New personas are always public.
#[instrument(skip(admin, state, session, multipart))]
pub async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let backend = state.backend();
    let token = &admin.access_token;

    if let Err(error) = persona_input(&form, true, None) {
        return Ok(render_create_error(&session, &admin, &form, error).await);
    }

    let mut image_key = None;
    if let Some(file) = form.take_file("image") {
        match upload_image(backend, token, category::PERSONAS, file).await {
            Ok(key) => image_key = Some(key),
            Err(e) if e.is_unauthorized() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Persona image upload failed");
                Flash::error(format!("Image upload failed: {}", e.detail()))
                    .push(&session)
                    .await;
            }
        }
    }

    let input = persona_input(&form, true, image_key.clone())
        .map_err(AppError::BadRequest)?;

    match backend.create_persona(token, &input).await {
        Ok(persona) => {
            state.cache().clear();
            tracing::info!(persona_id = %persona.id, "Persona created");
            Flash::success(format!("Persona '{}' created.", persona.name))
                .push(&session)
                .await;
            Ok(Redirect::to("/personas").into_response())
        }
        Err(e) if e.is_unauthorized() => Err(e.into()),
        Err(e) => {
            remove_stale_image(backend, token, image_key.as_deref()).await;
            tracing::warn!(error = %e, "Persona creation failed");
            let error = format!("Creating the persona failed: {}", e.detail());
            Ok(render_create_error(&session, &admin, &form, error).await)
        }
    }
}

async fn find_persona(
    state: &AppState,
    admin: &CurrentAdmin,
    id: PersonaId,
) -> Result<Option<Persona>, AppError> {
    let personas = state
        .cache()
        .personas(state.backend(), &admin.access_token)
        .await?;
    Ok(personas.into_iter().find(|p| p.id == id))
}

async fn persona_not_found(session: &Session, id: PersonaId) -> Response {
    Flash::error(format!("Persona {id} was not found."))
        .push(session)
        .await;
    Redirect::to("/personas").into_response()
}

/// Presigned URL of a stored image, or whether presigning failed.
pub(crate) async fn image_preview(
    state: &AppState,
    token: &AccessToken,
    key: Option<&str>,
) -> Result<(Option<String>, bool), AppError> {
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return Ok((None, false));
    };
    match state.cache().download_url(state.backend(), token, key).await {
        Ok(url) => Ok((Some(url), false)),
        Err(e) if e.is_unauthorized() => Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, object_key = %key, "Failed to presign image");
            Ok((None, true))
        }
    }
}

/// Persona edit page handler.
#[instrument(skip(admin, state, session))]
pub async fn edit_page(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<PersonaId>,
) -> Result<Response, AppError> {
    let Some(persona) = find_persona(&state, &admin, id).await? else {
        return Ok(persona_not_found(&session, id).await);
    };

    let mut view = PersonaFormView::from_persona(&persona);
    let (image_url, image_error) = image_preview(
        &state,
        &admin.access_token,
        persona.profile_image_key.as_deref(),
    )
    .await?;
    view.image_url = image_url;
    view.image_error = image_error;

    Ok(PersonaFormTemplate {
        page: PageContext::new(&session, &admin, "/personas").await,
        persona: view,
        error: None,
    }
    .into_response())
}

/// Save persona changes, including the profile image.
#[instrument(skip(admin, state, session, multipart))]
pub async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<PersonaId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let Some(persona) = find_persona(&state, &admin, id).await? else {
        return Ok(persona_not_found(&session, id).await);
    };

    let edit_path = format!("/personas/{id}/edit");
    if let Err(error) = persona_input(&form, persona.is_public, None) {
        Flash::error(error).push(&session).await;
        return Ok(Redirect::to(&edit_path).into_response());
    }

    let backend = state.backend();
    let token = &admin.access_token;
    let change = ImageChange::from_form(form.checked("delete_image"), form.take_file("image"));
    let prepared = prepare_image(
        backend,
        token,
        category::PERSONAS,
        persona.profile_image_key.clone(),
        change,
    )
    .await;

    if let Some(reason) = &prepared.upload_error {
        Flash::error(format!("Image upload failed: {reason}"))
            .push(&session)
            .await;
    }

    let input = persona_input(&form, form.checked("is_public"), prepared.final_key.clone())
        .map_err(AppError::BadRequest)?;

    match backend.update_persona(token, id, &input).await {
        Ok(()) => {
            remove_stale_image(backend, token, prepared.stale_key.as_deref()).await;
            state.cache().clear();
            tracing::info!(persona_id = %id, "Persona updated");
            Flash::success(format!("Persona '{}' updated.", input.name))
                .push(&session)
                .await;
        }
        Err(e) => {
            if prepared.final_key.is_some() && prepared.final_key != persona.profile_image_key {
                remove_stale_image(backend, token, prepared.final_key.as_deref()).await;
            }
            flash_failure(&session, "Updating the persona", e).await?;
        }
    }

    Ok(Redirect::to(&edit_path).into_response())
}

/// Delete a persona after deleting its image.
#[instrument(skip(admin, state, session))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<PersonaId>,
) -> Result<Response, AppError> {
    let Some(persona) = find_persona(&state, &admin, id).await? else {
        return Ok(persona_not_found(&session, id).await);
    };

    let backend = state.backend();
    let token = &admin.access_token;

    if let Err(e) =
        delete_image_before_record(backend, token, persona.profile_image_key.as_deref()).await
    {
        flash_failure(&session, "Deleting the persona image (persona kept)", e).await?;
        return Ok(Redirect::to("/personas").into_response());
    }

    match backend.delete_persona(token, id).await {
        Ok(()) => {
            state.cache().clear();
            tracing::info!(persona_id = %id, "Persona deleted");
            Flash::success(format!("Persona '{}' deleted.", persona.name))
                .push(&session)
                .await;
        }
        Err(e) => flash_failure(&session, "Deleting the persona", e).await?,
    }

    Ok(Redirect::to("/personas").into_response())
}

/// Download every persona as pretty JSON.
///
/// GET /personas/export
#[instrument(skip(admin, state, session))]
pub async fn export(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let personas = match state.backend().get_personas(&admin.access_token).await {
        Ok(personas) => personas,
        Err(e) => {
            flash_failure(&session, "Exporting personas", e).await?;
            return Ok(Redirect::to("/personas").into_response());
        }
    };
    let body = backup::export_json(&personas).map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(count = personas.len(), "Personas exported");
    Ok(json_download(PERSONA_BACKUP_FILE, body))
}

/// Restore personas from an uploaded backup. Each entry becomes a new persona.
///
/// POST /personas/import
#[instrument(skip(admin, state, session, multipart))]
pub async fn import(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let backend: &BackendClient = state.backend();
    let token = &admin.access_token;
    let report = run_import(&session, multipart, |entries| async move {
        backup::restore_personas(backend, token, &entries).await
    })
    .await?;

    if report.is_some_and(|r| r.succeeded > 0) {
        state.cache().clear();
    }
    Ok(Redirect::to("/personas").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_action() {
        let mut view = PersonaFormView::default();
        assert_eq!(view.action(), "/personas");
        view.id = Some(PersonaId::new(4));
        assert_eq!(view.action(), "/personas/4");
    }
}
