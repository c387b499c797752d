use anyhow::Context;
use clap::Parser;
use common::TrustConfig;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vault::{TokenVerifier, VerificationResult, TOTAL_CHALLENGES};

#[derive(Parser)]
#[command(name = "ctf-verify")]
#[command(about = "Verify a CTF completion token for a signed-in GitHub user", long_about = None)]
struct Cli {
    /// GitHub username from the OAuth sign-in. Prompted for when omitted.
    #[arg(long)]
    username: Option<String>,
    /// Base64 completion token. Prompted for when omitted.
    #[arg(long)]
    token: Option<String>,
    /// File holding the master secret (otherwise `CTF_MASTER_SECRET`).
    #[arg(long)]
    master_secret_file: Option<PathBuf>,
    /// Print the result as JSON instead of the banner.
    #[arg(long)]
    json: bool,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: .env: {}", e);
        }
    }

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let trust = TrustConfig::resolve(cli.master_secret_file.as_deref())
        .context("failed to load trust configuration")?;
    let verifier = TokenVerifier::new(trust);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout().lock();

    let username = match cli.username {
        Some(u) => u.trim().to_owned(),
        None => prompt(
            &mut input,
            &mut stdout,
            "Enter GitHub username (from OAuth sign-in): ",
        )?,
    };
    anyhow::ensure!(!username.is_empty(), "GitHub username must not be empty");

    let token = match cli.token {
        Some(t) => t.trim().to_owned(),
        None => prompt(&mut input, &mut stdout, "Paste your verification token: ")?,
    };

    tracing::debug!(%username, token_len = token.len(), "verifying token");
    let result = verifier.verify(&token, &username);
    if cli.json {
        render_json(&mut stdout, &result)?;
    } else {
        render_report(&mut stdout, &result)?;
    }
    stdout.flush()?;

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

fn prompt(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> anyhow::Result<String> {
    write!(out, "{label}")?;
    out.flush()?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim().to_owned())
}

fn render_report(out: &mut impl Write, result: &VerificationResult) -> io::Result<()> {
    let rule = "=".repeat(60);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "{:^60}", "RESULT")?;
    writeln!(out, "{rule}")?;
    writeln!(out)?;

    match result {
        Ok(completion) => {
            writeln!(out, "VERIFICATION SUCCESSFUL")?;
            writeln!(out)?;
            writeln!(out, "   GitHub User:      {}", completion.github_username)?;
            writeln!(out, "   Completion Date:  {}", completion.date)?;
            writeln!(out, "   Completion Time:  {}", completion.completion_time)?;
            writeln!(
                out,
                "   Challenges:       {}/{TOTAL_CHALLENGES}",
                completion.challenges
            )?;
        }
        Err(e) => {
            writeln!(out, "VERIFICATION FAILED")?;
            writeln!(out)?;
            writeln!(out, "   Error: {e}")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{rule}")
}

fn render_json(out: &mut impl Write, result: &VerificationResult) -> io::Result<()> {
    let body = match result {
        Ok(completion) => serde_json::json!({ "valid": true, "data": completion }),
        Err(e) => serde_json::json!({ "valid": false, "error": e.to_string() }),
    };
    writeln!(out, "{body}")
}
