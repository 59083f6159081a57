//! DevBook CLI - operator tooling for credentials and session tokens
//!
//! Usage:
//!   devbook hash-password [plaintext]
//!   devbook verify-password <hash> [plaintext]
//!   devbook issue-token <user_id>
//!   devbook inspect-token <token>
//!
//! A missing plaintext is read from the first line of stdin, which keeps it
//! out of the process list. Token commands need `SECRET_KEY`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use devbook_api::auth::password::DEFAULT_COST;
use devbook_api::auth::{CredentialHasher, TokenService};
use devbook_core::config::AppConfig;
use devbook_core::UserId;
use std::io::BufRead;

#[derive(Parser)]
#[command(name = "devbook")]
#[command(about = "DevBook credential and token tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password with bcrypt
    HashPassword {
        /// Password to hash; read from stdin when omitted
        plaintext: Option<String>,
        /// bcrypt cost factor
        #[arg(long, default_value_t = DEFAULT_COST)]
        cost: u32,
    },
    /// Check a password against a stored bcrypt hash
    VerifyPassword {
        /// Stored hash, e.g. `$2b$10$...`
        hash: String,
        /// Password to check; read from stdin when omitted
        plaintext: Option<String>,
    },
    /// Issue a session token for a user id
    IssueToken {
        user_id: UserId,
    },
    /// Validate a session token and print its subject
    InspectToken {
        token: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devbook_api=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { plaintext, cost } => {
            let plaintext = plaintext_or_stdin(plaintext)?;
            let hash = CredentialHasher::with_cost(cost).hash(&plaintext)?;
            println!("{hash}");
        }
        Commands::VerifyPassword { hash, plaintext } => {
            let plaintext = plaintext_or_stdin(plaintext)?;
            if CredentialHasher::default().verify(&plaintext, &hash).is_err() {
                bail!("password does not match");
            }
            println!("ok");
        }
        Commands::IssueToken { user_id } => {
            let tokens = token_service()?;
            let token = tokens.create(user_id)?;
            println!("{token}");
        }
        Commands::InspectToken { token } => {
            let tokens = token_service()?;
            let subject_id = tokens.subject_id_of(&token)?;
            println!("{}", serde_json::json!({ "valid": true, "subject_id": subject_id }));
        }
    }

    Ok(())
}

fn token_service() -> anyhow::Result<TokenService> {
    let config = AppConfig::from_env().context("token commands need a SECRET_KEY")?;
    Ok(TokenService::new(&config.auth))
}

fn plaintext_or_stdin(plaintext: Option<String>) -> anyhow::Result<String> {
    if let Some(plaintext) = plaintext {
        return Ok(plaintext);
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
