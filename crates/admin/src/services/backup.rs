//! JSON backup and restore of personas and phishing cases.
//!
//! A backup is a pretty-printed JSON array of the entities exactly as the
//! backend returned them. Restoring creates every element as a new entity
//! and reports how many succeeded.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use mung_core::PersonaInput;

use crate::backend::{AccessToken, BackendClient};

/// Download file name of the persona backup.
pub const PERSONA_BACKUP_FILE: &str = "mung_personas_backup.json";
/// Download file name of the phishing case backup.
pub const CASE_BACKUP_FILE: &str = "mung_phishing_cases_backup.json";

/// Name given to restored personas that have none.
const DEFAULT_PERSONA_NAME: &str = "Unnamed";

/// Failure detail for array elements that are not JSON objects.
const NOT_AN_OBJECT: &str = "entry is not a JSON object";

/// Errors reading or writing a backup file.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Backup file must contain a JSON array at the top level")]
    NotAnArray,
}

/// Outcome of a restore run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub succeeded: usize,
    pub failed: usize,
    /// One line per failure, `#index: detail`.
    pub failures: Vec<String>,
}

impl RestoreReport {
    fn record(&mut self, index: usize, result: Result<(), String>) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(detail) => {
                self.failed += 1;
                self.failures.push(format!("#{}: {detail}", index + 1));
            }
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Restore finished: {} succeeded, {} failed (of {}).",
            self.succeeded,
            self.failed,
            self.total()
        )
    }
}

/// Serialize entities as a pretty JSON array.
///
/// # Errors
///
/// Returns error if an entity fails to serialize.
pub fn export_json<T: Serialize>(items: &[T]) -> Result<String, BackupError> {
    Ok(serde_json::to_string_pretty(items)?)
}

/// Parse an uploaded backup file into its elements.
///
/// # Errors
///
/// Returns error if the file is not JSON or its top level is not an array.
pub fn parse_backup(bytes: &[u8]) -> Result<Vec<Value>, BackupError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(items) => Ok(items),
        _ => Err(BackupError::NotAnArray),
    }
}

/// Build a persona creation request from a backup element.
///
/// Missing names become "Unnamed" and a missing prompt becomes empty. The
/// stored image key is not carried over since the object may no longer
/// exist. Returns `None` when the element is not a JSON object.
#[must_use]
pub fn persona_from_backup(entry: &Value) -> Option<PersonaInput> {
    entry.as_object()?;
    let text = |field: &str| entry.get(field).and_then(Value::as_str).map(str::to_owned);

    let conversation_starters = entry
        .get("conversation_starters")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Some(PersonaInput {
        name: text("name").unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string()),
        description: text("description"),
        system_prompt: text("system_prompt").unwrap_or_default(),
        is_public: true,
        profile_image_key: None,
        starting_message: text("starting_message"),
        conversation_starters,
    })
}

/// Create every persona in the backup.
#[instrument(skip_all, fields(count = entries.len()))]
pub async fn restore_personas(
    backend: &BackendClient,
    token: &AccessToken,
    entries: &[Value],
) -> RestoreReport {
    let mut report = RestoreReport::default();
    for (index, entry) in entries.iter().enumerate() {
        let Some(input) = persona_from_backup(entry) else {
            report.record(index, Err(NOT_AN_OBJECT.to_string()));
            continue;
        };
        let result = backend
            .create_persona(token, &input)
            .await
            .map(|_| ())
            .map_err(|e| e.detail());
        report.record(index, result);
    }
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "Persona restore finished"
    );
    report
}

/// Create every phishing case in the backup, posting each object as-is.
#[instrument(skip_all, fields(count = entries.len()))]
pub async fn restore_cases(
    backend: &BackendClient,
    token: &AccessToken,
    entries: &[Value],
) -> RestoreReport {
    let mut report = RestoreReport::default();
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_object() {
            report.record(index, Err(NOT_AN_OBJECT.to_string()));
            continue;
        }
        let result = backend
            .create_phishing_case_raw(token, entry)
            .await
            .map(|_| ())
            .map_err(|e| e.detail());
        report.record(index, result);
    }
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "Phishing case restore finished"
    );
    report
}
