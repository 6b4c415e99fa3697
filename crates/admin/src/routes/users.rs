//! User management route handlers.

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

use mung_core::{User, UserId, UserUpdate, types::storage::category};

use crate::{
    error::AppError,
    filters,
    middleware::RequireAdminAuth,
    models::{CurrentAdmin, Flash},
    routes::{
        PageContext, flash_failure,
        forms::{MultipartForm, UPLOAD_BODY_LIMIT},
        rows_or_banner,
    },
    services::{
        ImageChange, Page,
        images::{delete_image_before_record, prepare_image, remove_stale_image},
        listing::{self, PAGE_SIZES},
    },
    state::AppState,
};

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(index))
        .route("/users/{id}/edit", get(edit_page))
        .route("/users/{id}", post(update))
        .route("/users/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub q: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

/// User row for the table.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<User> for UserRow {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
        }
    }
}

impl UserRow {
    #[must_use]
    pub const fn role_icon(&self) -> &'static str {
        if self.is_superuser { "👑" } else { "👤" }
    }
}

/// Entry of the page size select box.
#[derive(Debug, Clone, Copy)]
pub struct SizeOption {
    pub value: usize,
    pub selected: bool,
}

/// Users list page template.
#[derive(Template, WebTemplate)]
#[template(path = "users/index.html")]
pub struct UsersIndexTemplate {
    pub page: PageContext,
    pub users: Page<UserRow>,
    pub search_query: String,
    pub page_sizes: Vec<SizeOption>,
    pub load_error: Option<String>,
}

impl UsersIndexTemplate {
    /// Link to another page keeping the search and size.
    #[must_use]
    pub fn page_link(&self, page: usize) -> String {
        format!(
            "/users?q={}&size={}&page={page}",
            encode_query(&self.search_query),
            self.users.page_size
        )
    }
}

/// User edit page template.
#[derive(Template, WebTemplate)]
#[template(path = "users/edit.html")]
pub struct UserEditTemplate {
    pub page: PageContext,
    pub user: User,
    pub image_url: Option<String>,
    pub image_error: bool,
}

/// Percent-encode a query value.
pub(crate) fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Users list page handler.
#[instrument(skip(admin, state, session))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<UsersQuery>,
) -> Result<UsersIndexTemplate, AppError> {
    let result = state
        .cache()
        .users(state.backend(), &admin.access_token)
        .await;
    let (users, load_error) = rows_or_banner(result, "users")?;

    let needle = listing::search_needle(query.q.as_deref());
    let users = listing::filter_by(users, needle.as_deref(), User::matches);
    let rows: Vec<UserRow> = users.into_iter().map(UserRow::from).collect();
    let size = listing::page_size_or_default(query.size);

    Ok(UsersIndexTemplate {
        page: PageContext::new(&session, &admin, "/users").await,
        users: listing::paginate(rows, query.page, size),
        search_query: query.q.unwrap_or_default(),
        page_sizes: PAGE_SIZES
            .iter()
            .map(|&value| SizeOption {
                value,
                selected: value == size,
            })
            .collect(),
        load_error,
    })
}

/// Find a user in the cached list. There is no single-user endpoint.
async fn find_user(
    state: &AppState,
    admin: &CurrentAdmin,
    id: UserId,
) -> Result<Option<User>, AppError> {
    let users = state
        .cache()
        .users(state.backend(), &admin.access_token)
        .await?;
    Ok(users.into_iter().find(|u| u.id == id))
}

async fn user_not_found(session: &Session, id: UserId) -> Response {
    Flash::error(format!("User {id} was not found.")).push(session).await;
    Redirect::to("/users").into_response()
}

/// User edit page handler.
#[instrument(skip(admin, state, session))]
pub async fn edit_page(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
) -> Result<Response, AppError> {
    let Some(user) = find_user(&state, &admin, id).await? else {
        return Ok(user_not_found(&session, id).await);
    };

    let (image_url, image_error) = match user.profile_image_key.as_deref() {
        Some(key) if !key.is_empty() => match state
            .cache()
            .download_url(state.backend(), &admin.access_token, key)
            .await
        {
            Ok(url) => (Some(url), false),
            Err(e) if e.is_unauthorized() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to presign profile image");
                (None, true)
            }
        },
        _ => (None, false),
    };

    Ok(UserEditTemplate {
        page: PageContext::new(&session, &admin, "/users").await,
        user,
        image_url,
        image_error,
    }
    .into_response())
}

/// Save user changes, including the profile image.
#[instrument(skip(admin, state, session, multipart))]
pub async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let Some(user) = find_user(&state, &admin, id).await? else {
        return Ok(user_not_found(&session, id).await);
    };

    let backend = state.backend();
    let token = &admin.access_token;
    let change = ImageChange::from_form(form.checked("delete_image"), form.take_file("image"));
    let prepared = prepare_image(
        backend,
        token,
        category::USERS,
        user.profile_image_key.clone(),
        change,
    )
    .await;

    if let Some(reason) = &prepared.upload_error {
        Flash::error(format!("Image upload failed: {reason}"))
            .push(&session)
            .await;
    }

    let update = UserUpdate {
        username: form.text("username").trim().to_string(),
        is_active: form.checked("is_active"),
        is_superuser: form.checked("is_superuser"),
        profile_image_key: prepared.final_key.clone(),
    };

    match backend.update_user(token, id, &update).await {
        Ok(()) => {
            remove_stale_image(backend, token, prepared.stale_key.as_deref()).await;
            state.cache().clear();
            tracing::info!(user_id = %id, "User updated");
            Flash::success(format!("User {id} updated."))
                .push(&session)
                .await;
        }
        Err(e) => {
            if prepared.final_key.is_some() && prepared.final_key != user.profile_image_key {
                remove_stale_image(backend, token, prepared.final_key.as_deref()).await;
            }
            flash_failure(&session, "Updating the user", e).await?;
        }
    }

    Ok(Redirect::to(&format!("/users/{id}/edit")).into_response())
}

/// Delete a user after deleting their profile image.
#[instrument(skip(admin, state, session))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<UserId>,
) -> Result<Response, AppError> {
    let Some(user) = find_user(&state, &admin, id).await? else {
        return Ok(user_not_found(&session, id).await);
    };

    let backend = state.backend();
    let token = &admin.access_token;

    if let Err(e) =
        delete_image_before_record(backend, token, user.profile_image_key.as_deref()).await
    {
        flash_failure(&session, "Deleting the profile image (user kept)", e).await?;
        return Ok(Redirect::to("/users").into_response());
    }

    match backend.delete_user(token, id).await {
        Ok(()) => {
            state.cache().clear();
            tracing::info!(user_id = %id, "User deleted");
            Flash::success(format!("User {id} deleted."))
                .push(&session)
                .await;
        }
        Err(e) => flash_failure(&session, "Deleting the user", e).await?,
    }

    Ok(Redirect::to("/users").into_response())
}
