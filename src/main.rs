use clap::{Args, Parser, Subcommand};
use portfolio::app::AppContext;
use portfolio::config::{AppConfig, ConfigError};
use portfolio::error::ClassifiedError;
use portfolio::net::types::Registration;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{label}: {0}", label = kind_label(.0))]
    Classified(#[from] ClassifiedError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

fn kind_label(err: &ClassifiedError) -> String {
    serde_json::to_value(&err.kind)
        .ok()
        .and_then(|v| v.get("kind").and_then(|k| k.as_str()).map(str::to_owned))
        .unwrap_or_else(|| "error".to_owned())
}

#[derive(Parser, Debug)]
#[command(name = "portfolio", about = "Learning portfolio session and dashboard client")]
struct Cli {
    /// Overrides `PORTFOLIO_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long, env = "PORTFOLIO_EMAIL")]
    email: String,
    #[arg(long, env = "PORTFOLIO_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print the session.
    Login {
        #[command(flatten)]
        credentials: Credentials,
        /// Sign in with the identity provider instead of the backend alone.
        #[arg(long)]
        provider: bool,
    },
    /// Create an account and print the session.
    Register {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Log in directly and print every dashboard section.
    Dashboard {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Start a redirect sign-in; the next run resumes it.
    SignInRedirect,
    /// Print the session resumed from a pending redirect, if any.
    Resume,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url.trim_end_matches('/').to_owned();
    }
    let ctx = AppContext::from_config(&config)?;

    let resumed = match ctx.startup().await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "pending redirect sign-in could not be resumed");
            None
        }
    };

    match cli.command {
        Command::Login { credentials, provider } => {
            let session = if provider {
                ctx.sign_in_with_credentials(&credentials.email, &credentials.password).await?
            } else {
                ctx.login_direct(&credentials.email, &credentials.password).await?
            };
            print_json(&session)
        }
        Command::Register { credentials, username, first_name, last_name } => {
            let mut registration = Registration::new(credentials.email, credentials.password);
            registration.username = username;
            registration.first_name = first_name;
            registration.last_name = last_name;
            print_json(&ctx.register(registration).await?)
        }
        Command::Dashboard { credentials } => {
            ctx.login_direct(&credentials.email, &credentials.password).await?;
            let dashboard = ctx.dashboard().await;
            for section in dashboard.failed_sections() {
                tracing::warn!(%section, "dashboard section failed");
            }
            print_json(&dashboard)
        }
        Command::SignInRedirect => {
            ctx.sign_in_redirect().await?;
            print_json(&serde_json::json!({ "pending": true }))
        }
        Command::Resume => print_json(&resumed),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
