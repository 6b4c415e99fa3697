//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Format a backend timestamp in KST.
///
/// Usage in templates: `{{ conversation.last_message_at|kst }}`
#[askama::filter_fn]
pub fn kst(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(mung_core::format_kst(Some(raw.as_str())))
}

/// Render a boolean as a check or cross mark.
///
/// Usage in templates: `{{ user.is_active|yes_no }}`
#[askama::filter_fn]
pub fn yes_no(value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(if value.to_string() == "true" { "✅" } else { "❌" })
}

/// Show a placeholder for empty text.
///
/// Usage in templates: `{{ persona.description.as_deref().unwrap_or_default()|or_dash }}`
#[askama::filter_fn]
pub fn or_dash(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(if text.trim().is_empty() {
        "-".to_string()
    } else {
        text
    })
}

/// Pretty-print a JSON value.
///
/// Usage in templates: `{{ message.details()|pretty_json }}`
#[askama::filter_fn]
pub fn pretty_json(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(serde_json::from_str::<serde_json::Value>(&raw)
        .and_then(|json| serde_json::to_string_pretty(&json))
        .unwrap_or(raw))
}
