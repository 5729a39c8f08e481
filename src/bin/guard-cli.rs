use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use admission_guard::config::load_config;
use admission_guard::store::MemoryPersistence;
use admission_guard::TokenEngine;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Operator CLI for the admission guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Bearer token of an admin account.
    #[arg(short, long, env = "GUARD_ADMIN_TOKEN", default_value = "")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an access token locally with the configured secret
    MintToken {
        #[arg(short, long, default_value = "guard.toml")]
        config: PathBuf,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "user")]
        role: String,
        /// Lifetime in seconds; defaults to the role's configured lifetime.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Show limiter state
    Status,
    /// Clear the login lockout of an account
    Unlock { user_id: String },
    /// Revoke an access token by jti
    Revoke {
        jti: String,
        #[arg(long)]
        ttl: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::MintToken { config, subject, role, ttl } = &cli.command {
        let config = load_config(config)?;
        let engine = TokenEngine::new(config.tokens, Arc::new(MemoryPersistence::new()), None)?;
        let (token, claims) = engine.issue_access_token(subject, role, ttl.map(Duration::from_secs))?;
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "access_token": token, "claims": claims }))?
        );
        return Ok(());
    }

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.token))?,
    );
    let admin = format!("{}/api/admin", cli.url.trim_end_matches('/'));

    let res = match cli.command {
        Commands::Status => client.get(format!("{admin}/status")).headers(headers).send().await?,
        Commands::Unlock { user_id } => {
            client
                .delete(format!("{admin}/lockouts/{user_id}"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Revoke { jti, ttl } => {
            client
                .post(format!("{admin}/revocations"))
                .headers(headers)
                .json(&json!({ "jti": jti, "ttl_secs": ttl }))
                .send()
                .await?
        }
        Commands::MintToken { .. } => return Ok(()),
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
