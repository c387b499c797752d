//! # mint-token
//!
//! Instance-key derivation and completion-token minting for CTF platform
//! operators. Reads the master secret from `--master-secret-file` or
//! `CTF_MASTER_SECRET` (a `.env` file is honoured).
//!
//! ## Usage
//!
//! **Derive** the signing key to provision onto a platform instance:
//! ```sh
//! cargo run -p mint-token -- derive --instance-id <ID>
//! ```
//!
//! **Mint** a completion token for a user:
//! ```sh
//! cargo run -p mint-token -- mint --username <LOGIN> --instance-id <ID>
//! ```

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use common::TrustConfig;
use std::path::PathBuf;
use vault::{CompletionPayload, TokenIssuer, TOTAL_CHALLENGES};

#[derive(Parser)]
#[command(
    name = "mint-token",
    about = "CTF instance-key deriver and completion-token minter"
)]
struct Cli {
    /// File holding the master secret (otherwise `CTF_MASTER_SECRET`).
    #[arg(long, global = true)]
    master_secret_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the hex signing key for a platform instance.
    Derive {
        /// Platform instance identifier.
        #[arg(long)]
        instance_id: String,
    },

    /// Sign a completion payload and print the base64 token.
    ///
    /// Date, time and timestamp default to the current UTC clock.
    Mint {
        /// GitHub username the token is bound to.
        #[arg(long)]
        username: String,
        /// Platform instance identifier.
        #[arg(long)]
        instance_id: String,
        /// Number of completed challenges.
        #[arg(long, default_value_t = TOTAL_CHALLENGES)]
        challenges: u32,
        /// Completion date (`YYYY-MM-DD`).
        #[arg(long)]
        date: Option<String>,
        /// Completion time (`HH:MM:SS`).
        #[arg(long)]
        time: Option<String>,
        /// Completion timestamp in seconds since the epoch.
        #[arg(long)]
        timestamp: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: .env: {}", e);
        }
    }

    let cli = Cli::parse();
    let trust = TrustConfig::resolve(cli.master_secret_file.as_deref())
        .context("failed to load trust configuration")?;
    let issuer = TokenIssuer::new(trust);

    match cli.command {
        Commands::Derive { instance_id } => cmd_derive(&issuer, &instance_id),
        Commands::Mint {
            username,
            instance_id,
            challenges,
            date,
            time,
            timestamp,
        } => {
            let payload = build_payload(
                username,
                instance_id,
                challenges,
                date,
                time,
                timestamp,
                Utc::now(),
            )?;
            cmd_mint(&issuer, &payload)
        }
    }
}

fn cmd_derive(issuer: &TokenIssuer, instance_id: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!instance_id.is_empty(), "instance ID must not be empty");
    let secret = issuer.instance_secret(instance_id);

    println!("╔═══════════════════════════════════════════════╗");
    println!("║     INSTANCE KEY — PROVISION, NEVER COMMIT    ║");
    println!("╚═══════════════════════════════════════════════╝");
    println!("instance: {instance_id}");
    println!("{}", secret.as_hex());

    Ok(())
}

fn cmd_mint(issuer: &TokenIssuer, payload: &CompletionPayload) -> anyhow::Result<()> {
    let token = issuer.issue(payload).context("failed to mint token")?;

    println!("╔═══════════════════════════════════════════════╗");
    println!("║          COMPLETION TOKEN (BASE64)            ║");
    println!("╚═══════════════════════════════════════════════╝");
    println!("{token}");

    Ok(())
}

/// Fills unset date, time and timestamp from `now`.
fn build_payload(
    username: String,
    instance_id: String,
    challenges: u32,
    date: Option<String>,
    time: Option<String>,
    timestamp: Option<u64>,
    now: DateTime<Utc>,
) -> anyhow::Result<CompletionPayload> {
    let timestamp = match timestamp {
        Some(ts) => ts,
        None => u64::try_from(now.timestamp()).context("system clock is before the epoch")?,
    };
    Ok(CompletionPayload {
        github_username: username,
        date: date.unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
        time: time.unwrap_or_else(|| now.format("%H:%M:%S").to_string()),
        challenges,
        instance_id,
        timestamp,
    })
}
