//! Phishing case catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use mung_core::{PhishingCase, PhishingCaseId, PhishingCaseInput, PhishingCategory};

use crate::{
    backend::BackendClient,
    error::AppError,
    filters,
    middleware::RequireAdminAuth,
    models::{CurrentAdmin, Flash},
    routes::{
        PageContext, flash_failure, forms::UPLOAD_BODY_LIMIT, json_download, rows_or_banner,
        run_import,
    },
    services::{
        CaseGroup,
        backup::{self, CASE_BACKUP_FILE},
        listing,
    },
    state::AppState,
};

/// Build the phishing case router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/phishing", get(index).post(create))
        .route("/phishing/new", get(new_page))
        .route("/phishing/export", get(export))
        .route("/phishing/import", post(import))
        .route("/phishing/{id}/edit", get(edit_page))
        .route("/phishing/{id}", post(update))
        .route("/phishing/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

/// Submitted case form. Every field arrives as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseForm {
    #[serde(default)]
    pub category_code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub case_date: String,
    #[serde(default)]
    pub reference_url: String,
}

impl CaseForm {
    fn from_case(case: &PhishingCase) -> Self {
        Self {
            category_code: case.category_code.clone(),
            title: case.title.clone(),
            content: case.content.clone(),
            case_date: case
                .date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            reference_url: case.reference_url.clone().unwrap_or_default(),
        }
    }

    /// Validate and convert to a request body.
    ///
    /// Title and content are required; an empty date or URL becomes `null`.
    fn to_input(&self) -> Result<PhishingCaseInput, String> {
        let title = self.title.trim();
        let content = self.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err("Title and content are required.".to_string());
        }
        if self.category_code.trim().is_empty() {
            return Err("Choose a category.".to_string());
        }

        let case_date = match self.case_date.trim() {
            "" => None,
            raw => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| format!("Invalid case date '{raw}', expected YYYY-MM-DD."))?,
            ),
        };
        let reference_url = Some(self.reference_url.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_owned);

        Ok(PhishingCaseInput {
            category_code: self.category_code.trim().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            case_date,
            reference_url,
        })
    }
}

/// Case list template.
#[derive(Template, WebTemplate)]
#[template(path = "phishing/index.html")]
pub struct CasesIndexTemplate {
    pub page: PageContext,
    pub groups: Vec<CaseGroup>,
    pub total: usize,
    pub load_error: Option<String>,
}

/// Case create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "phishing/form.html")]
pub struct CaseFormTemplate {
    pub page: PageContext,
    pub case_id: Option<PhishingCaseId>,
    pub form: CaseForm,
    pub categories: Vec<PhishingCategory>,
    pub error: Option<String>,
}

impl CaseFormTemplate {
    #[must_use]
    pub fn action(&self) -> String {
        self.case_id
            .map_or_else(|| "/phishing".to_string(), |id| format!("/phishing/{id}"))
    }
}

/// Case list page handler.
#[instrument(skip(admin, state, session))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<CasesIndexTemplate, AppError> {
    let backend = state.backend();
    let (cases, categories) = tokio::join!(
        state.cache().cases(backend, &admin.access_token),
        state.cache().categories(backend),
    );
    let (cases, cases_error) = rows_or_banner(cases, "phishing cases")?;
    let (categories, categories_error) = rows_or_banner(categories, "categories")?;
    let load_error = match (cases_error, categories_error) {
        (Some(cases), Some(categories)) => Some(format!("{cases} {categories}")),
        (cases, categories) => cases.or(categories),
    };

    let total = cases.len();
    Ok(CasesIndexTemplate {
        page: PageContext::new(&session, &admin, "/phishing").await,
        groups: listing::group_cases(cases, &categories),
        total,
        load_error,
    })
}

/// Render the form, loading the category list for the select box.
async fn render_form(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    case_id: Option<PhishingCaseId>,
    form: CaseForm,
    error: Option<String>,
) -> Result<Response, AppError> {
    let (categories, load_error) =
        rows_or_banner(state.cache().categories(state.backend()).await, "categories")?;
    Ok(CaseFormTemplate {
        page: PageContext::new(session, admin, "/phishing").await,
        case_id,
        form,
        categories,
        error: error.or(load_error),
    }
    .into_response())
}

/// New case form.
#[instrument(skip(admin, state, session))]
pub async fn new_page(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    render_form(&state, &session, &admin, None, CaseForm::default(), None).await
}

/// Create a case.
#[instrument(skip(admin, state, session, form))]
pub async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CaseForm>,
) -> Result<Response, AppError> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(error) => return render_form(&state, &session, &admin, None, form, Some(error)).await,
    };

    match state
        .backend()
        .create_phishing_case(&admin.access_token, &input)
        .await
    {
        Ok(case) => {
            state.cache().clear();
            tracing::info!(case_id = %case.id, "Phishing case created");
            Flash::success(format!("Case '{}' created.", case.title))
                .push(&session)
                .await;
            Ok(Redirect::to("/phishing").into_response())
        }
        Err(e) if e.is_unauthorized() => Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Phishing case creation failed");
            let error = format!("Creating the case failed: {}", e.detail());
            render_form(&state, &session, &admin, None, form, Some(error)).await
        }
    }
}

/// Load a case for editing, or flash and go back to the list.
async fn load_case(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    id: PhishingCaseId,
) -> Result<Result<PhishingCase, Response>, AppError> {
    match state
        .cache()
        .case(state.backend(), &admin.access_token, id)
        .await
    {
        Ok(case) => Ok(Ok(case)),
        Err(e) if e.is_not_found() => {
            Flash::error(format!("Phishing case {id} was not found."))
                .push(session)
                .await;
            Ok(Err(Redirect::to("/phishing").into_response()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Case edit page handler.
#[instrument(skip(admin, state, session))]
pub async fn edit_page(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<PhishingCaseId>,
) -> Result<Response, AppError> {
    let case = match load_case(&state, &session, &admin, id).await? {
        Ok(case) => case,
        Err(redirect) => return Ok(redirect),
    };
    render_form(
        &state,
        &session,
        &admin,
        Some(id),
        CaseForm::from_case(&case),
        None,
    )
    .await
}

/// Save case changes.
#[instrument(skip(admin, state, session, form))]
pub async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<PhishingCaseId>,
    Form(form): Form<CaseForm>,
) -> Result<Response, AppError> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(error) => {
            return render_form(&state, &session, &admin, Some(id), form, Some(error)).await;
        }
    };

    match state
        .backend()
        .update_phishing_case(&admin.access_token, id, &input)
        .await
    {
        Ok(case) => {
            state.cache().clear();
            tracing::info!(case_id = %id, "Phishing case updated");
            Flash::success(format!("Case '{}' updated.", case.title))
                .push(&session)
                .await;
            Ok(Redirect::to("/phishing").into_response())
        }
        Err(e) if e.is_unauthorized() => Err(e.into()),
        Err(e) if e.is_not_found() => {
            Flash::error(format!("Phishing case {id} was not found."))
                .push(&session)
                .await;
            Ok(Redirect::to("/phishing").into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Phishing case update failed");
            let error = format!("Updating the case failed: {}", e.detail());
            render_form(&state, &session, &admin, Some(id), form, Some(error)).await
        }
    }
}

/// Delete a case.
#[instrument(skip(admin, state, session))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<PhishingCaseId>,
) -> Result<Response, AppError> {
    match state
        .backend()
        .delete_phishing_case(&admin.access_token, id)
        .await
    {
        Ok(()) => {
            state.cache().clear();
            tracing::info!(case_id = %id, "Phishing case deleted");
            Flash::success(format!("Phishing case {id} deleted."))
                .push(&session)
                .await;
            Ok(Redirect::to("/phishing").into_response())
        }
        Err(e) => {
            flash_failure(&session, "Deleting the case", e).await?;
            Ok(Redirect::to(&format!("/phishing/{id}/edit")).into_response())
        }
    }
}

/// Download every case as pretty JSON.
///
/// GET /phishing/export
#[instrument(skip(admin, state, session))]
pub async fn export(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let cases = match state
        .backend()
        .get_all_phishing_cases(&admin.access_token)
        .await
    {
        Ok(cases) => cases,
        Err(e) => {
            flash_failure(&session, "Exporting phishing cases", e).await?;
            return Ok(Redirect::to("/phishing").into_response());
        }
    };
    let body = backup::export_json(&cases).map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(count = cases.len(), "Phishing cases exported");
    Ok(json_download(CASE_BACKUP_FILE, body))
}

/// Restore cases from an uploaded backup, posting each entry as-is.
///
/// POST /phishing/import
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
        backup::restore_cases(backend, token, &entries).await
    })
    .await?;

    if report.is_some_and(|r| r.succeeded > 0) {
        state.cache().clear();
    }
    Ok(Redirect::to("/phishing").into_response())
}
