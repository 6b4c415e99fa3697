//! Mung CLI - Bootstrap and backup tools for the Mung backend.
//!
//! # Usage
//!
//! ```bash
//! # Is there a superuser yet?
//! mung-cli superuser status
//!
//! # Create the initial superuser (password from --password or MUNG_ADMIN_PASSWORD)
//! mung-cli superuser create -e admin@example.com
//!
//! # Back up and restore personas
//! MUNG_ADMIN_PASSWORD=... mung-cli personas export -e admin@example.com
//! MUNG_ADMIN_PASSWORD=... mung-cli personas import -e admin@example.com mung_personas_backup.json
//!
//! # Back up and restore phishing cases
//! MUNG_ADMIN_PASSWORD=... mung-cli cases export -e admin@example.com -o cases.json
//! MUNG_ADMIN_PASSWORD=... mung-cli cases import -e admin@example.com cases.json
//! ```
//!
//! # Commands
//!
//! - `superuser status` - Report whether a superuser exists
//! - `superuser create` - Create the initial superuser
//! - `personas export|import` - JSON backup of personas
//! - `cases export|import` - JSON backup of phishing cases

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use secrecy::SecretString;

use mung_admin::backend::{AccessToken, BackendClient};

mod commands;

use commands::backup::BackupKind;

#[derive(Parser)]
#[command(name = "mung-cli")]
#[command(author, version, about = "Mung CLI tools")]
struct Cli {
    /// Backend REST API base URL
    #[arg(
        long,
        global = true,
        env = "FASTAPI_API_BASE_URL",
        default_value = "http://app:80/api/v1"
    )]
    backend_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or create the initial superuser
    Superuser {
        #[command(subcommand)]
        action: SuperuserAction,
    },
    /// Back up or restore personas
    Personas {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Back up or restore phishing cases
    Cases {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand)]
enum SuperuserAction {
    /// Report whether a superuser exists
    Status,
    /// Create the initial superuser
    Create {
        /// Superuser email address
        #[arg(short, long)]
        email: String,

        /// Superuser password
        #[arg(long, env = "MUNG_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

/// Credentials of the operator running a backup command.
#[derive(clap::Args)]
struct Login {
    /// Operator email address
    #[arg(short, long)]
    email: String,

    /// Operator password
    #[arg(long, env = "MUNG_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,
}

impl Login {
    async fn token(
        self,
        backend: &BackendClient,
    ) -> Result<AccessToken, commands::backup::BackupCommandError> {
        let password = SecretString::from(self.password);
        Ok(commands::login(backend, &self.email, &password).await?)
    }
}

#[derive(Subcommand)]
enum BackupAction {
    /// Write all entries to a JSON file
    Export {
        #[command(flatten)]
        login: Login,

        /// Output file (defaults to the standard backup file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create every entry of a JSON backup file
    Import {
        #[command(flatten)]
        login: Login,

        /// Backup file to restore
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mung_cli=info,mung_admin=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let backend = BackendClient::new(&cli.backend_url)?;

    match cli.command {
        Commands::Superuser { action } => match action {
            SuperuserAction::Status => {
                commands::superuser::status(&backend).await?;
            }
            SuperuserAction::Create { email, password } => {
                commands::superuser::create(&backend, &email, &SecretString::from(password))
                    .await?;
            }
        },
        Commands::Personas { action } => run_backup(&backend, BackupKind::Personas, action).await?,
        Commands::Cases { action } => run_backup(&backend, BackupKind::Cases, action).await?,
    }
    Ok(())
}

async fn run_backup(
    backend: &BackendClient,
    kind: BackupKind,
    action: BackupAction,
) -> Result<(), commands::backup::BackupCommandError> {
    match action {
        BackupAction::Export { login, output } => {
            let token = login.token(backend).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(kind.default_file()));
            commands::backup::export(backend, &token, kind, &path).await?;
        }
        BackupAction::Import { login, file } => {
            let token = login.token(backend).await?;
            commands::backup::import(backend, &token, kind, &file).await?;
        }
    }
    Ok(())
}
