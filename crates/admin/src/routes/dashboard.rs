//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use crate::{
    backend::BackendError, error::AppError, middleware::RequireAdminAuth, routes::PageContext,
    state::AppState,
};

/// One count tile. `None` when the list could not be loaded.
#[derive(Debug, Clone)]
pub struct CountTile {
    pub label: &'static str,
    pub href: &'static str,
    pub count: Option<usize>,
}

impl CountTile {
    fn from_result<T>(
        label: &'static str,
        href: &'static str,
        result: Result<Vec<T>, BackendError>,
    ) -> Result<Self, AppError> {
        let count = match result {
            Ok(items) => Some(items.len()),
            Err(e) if e.is_unauthorized() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load {label} for dashboard");
                None
            }
        };
        Ok(Self { label, href, count })
    }

    /// Count as shown on the tile.
    #[must_use]
    pub fn display(&self) -> String {
        self.count.map_or_else(|| "-".to_string(), |n| n.to_string())
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub page: PageContext,
    pub tiles: Vec<CountTile>,
}

/// Dashboard page handler.
#[instrument(skip(admin, state, session))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<DashboardTemplate, AppError> {
    let backend = state.backend();
    let cache = state.cache();
    let token = &admin.access_token;

    let (users, personas, cases, conversations) = tokio::join!(
        cache.users(backend, token),
        cache.personas(backend, token),
        cache.cases(backend, token),
        cache.conversations(backend, token),
    );

    let tiles = vec![
        CountTile::from_result("Users", "/users", users)?,
        CountTile::from_result("Personas", "/personas", personas)?,
        CountTile::from_result("Phishing cases", "/phishing", cases)?,
        CountTile::from_result("Conversations", "/conversations", conversations)?,
    ];

    Ok(DashboardTemplate {
        page: PageContext::new(&session, &admin, "/").await,
        tiles,
    })
}
