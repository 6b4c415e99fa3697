//! Persona and phishing case backups from the command line.
//!
//! Files use the same format as the admin's download/restore buttons: a
//! pretty-printed JSON array of entities as the backend returned them.

use std::path::Path;

use thiserror::Error;

use mung_admin::backend::{AccessToken, BackendClient, BackendError};
use mung_admin::services::backup::{
    self, BackupError, CASE_BACKUP_FILE, PERSONA_BACKUP_FILE, RestoreReport,
};

/// Errors that can occur during backup commands.
#[derive(Debug, Error)]
pub enum BackupCommandError {
    /// Backend request failed.
    #[error("{}", .0.detail())]
    Backend(#[from] BackendError),

    /// Backup file could not be read or written.
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Backup file contents are invalid.
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// Some entries failed to restore.
    #[error("{failed} of {total} entries failed to restore")]
    Incomplete { failed: usize, total: usize },
}

/// Which entity a backup holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Personas,
    Cases,
}

impl BackupKind {
    /// File name the admin uses for downloads.
    #[must_use]
    pub const fn default_file(self) -> &'static str {
        match self {
            Self::Personas => PERSONA_BACKUP_FILE,
            Self::Cases => CASE_BACKUP_FILE,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Personas => "personas",
            Self::Cases => "phishing cases",
        }
    }
}

/// Fetch every entry and write the backup file.
pub async fn export(
    backend: &BackendClient,
    token: &AccessToken,
    kind: BackupKind,
    path: &Path,
) -> Result<usize, BackupCommandError> {
    let (count, json) = match kind {
        BackupKind::Personas => {
            let personas = backend.get_personas(token).await?;
            (personas.len(), backup::export_json(&personas)?)
        }
        BackupKind::Cases => {
            let cases = backend.get_all_phishing_cases(token).await?;
            (cases.len(), backup::export_json(&cases)?)
        }
    };

    tokio::fs::write(path, json).await?;
    tracing::info!("Exported {count} {} to {}", kind.label(), path.display());
    Ok(count)
}

/// Read a backup file and create every entry in it.
///
/// Entries are created one by one; failures are logged and reported as
/// [`BackupCommandError::Incomplete`] after the whole file was processed.
pub async fn import(
    backend: &BackendClient,
    token: &AccessToken,
    kind: BackupKind,
    path: &Path,
) -> Result<RestoreReport, BackupCommandError> {
    let bytes = tokio::fs::read(path).await?;
    let entries = backup::parse_backup(&bytes)?;
    tracing::info!(
        "Restoring {} {} from {}",
        entries.len(),
        kind.label(),
        path.display()
    );

    let report = match kind {
        BackupKind::Personas => backup::restore_personas(backend, token, &entries).await,
        BackupKind::Cases => backup::restore_cases(backend, token, &entries).await,
    };

    for failure in &report.failures {
        tracing::warn!("Restore failed for entry {failure}");
    }
    tracing::info!("{}", report.summary());

    if report.failed > 0 {
        return Err(BackupCommandError::Incomplete {
            failed: report.failed,
            total: report.total(),
        });
    }
    Ok(report)
}
