//! Image phishing-risk analysis page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::get,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tower_sessions::Session;
use tracing::instrument;

use mung_core::ImageAnalysis;

use crate::{
    error::AppError,
    filters,
    middleware::RequireAdminAuth,
    routes::{
        PageContext,
        forms::{MultipartForm, UPLOAD_BODY_LIMIT},
    },
    state::AppState,
};

/// Build the image analysis router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/image-analysis", get(form_page).post(analyze))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

/// Analysis result as displayed.
#[derive(Debug, Clone)]
pub struct AnalysisView {
    pub file_name: String,
    pub score: String,
    pub risk: &'static str,
    pub reason: String,
}

impl AnalysisView {
    fn new(file_name: String, analysis: &ImageAnalysis) -> Self {
        Self {
            file_name,
            score: analysis.score_label(),
            risk: analysis.risk_level().as_str(),
            reason: analysis.reason.clone().unwrap_or_default(),
        }
    }

    /// CSS modifier for the risk badge.
    #[must_use]
    pub fn risk_class(&self) -> String {
        self.risk.to_lowercase()
    }
}

/// Image analysis template.
#[derive(Template, WebTemplate)]
#[template(path = "image_analysis.html")]
pub struct ImageAnalysisTemplate {
    pub page: PageContext,
    pub result: Option<AnalysisView>,
    pub error: Option<String>,
}

/// Upload form.
#[instrument(skip(admin, session))]
pub async fn form_page(
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
) -> ImageAnalysisTemplate {
    ImageAnalysisTemplate {
        page: PageContext::new(&session, &admin, "/image-analysis").await,
        result: None,
        error: None,
    }
}

/// Send the uploaded image for analysis.
#[instrument(skip(admin, state, session, multipart))]
pub async fn analyze(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<ImageAnalysisTemplate, AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let (result, error) = match form.take_file("image") {
        None => (None, Some("Choose an image to analyze.".to_string())),
        Some(file) => {
            let encoded = STANDARD.encode(&file.bytes);
            match state
                .backend()
                .analyze_image_for_phishing(&admin.access_token, &encoded)
                .await
            {
                Ok(analysis) => {
                    tracing::info!(score = analysis.phishing_score, "Image analyzed");
                    (Some(AnalysisView::new(file.file_name, &analysis)), None)
                }
                Err(e) if e.is_unauthorized() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Image analysis failed");
                    (None, Some(format!("Analysis failed: {}", e.detail())))
                }
            }
        }
    };

    Ok(ImageAnalysisTemplate {
        page: PageContext::new(&session, &admin, "/image-analysis").await,
        result,
        error,
    })
}
