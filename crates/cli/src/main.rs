//! svnreplay command-line tool.
//!
//! Replays SVN revision history into a local Git repository and optionally
//! pushes the result to a remote mirror. Also provides config generation,
//! validation, and a status view of an existing replay repository.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use svnreplay_core::config::ReplayConfig;
use svnreplay_core::engine::ReplayEngine;
use svnreplay_core::svn::{HistorySource, SvnClient};
use svnreplay_core::watermark;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// svnreplay command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "svnreplay",
    version,
    about = "Replay SVN revision history into a Git repository"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "svnreplay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay all outstanding revisions into a repository.
    Sync {
        /// Path to the destination Git repository (created if missing).
        repo_path: String,

        /// GitHub account to push to as git@github.com:<account>/<repo>.git.
        /// Without it, changes stay local.
        #[arg(long)]
        account: Option<String>,
    },

    /// Show the replay state of an existing repository.
    Status {
        /// Path to the destination Git repository.
        repo_path: String,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./svnreplay.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Sync { repo_path, account } => {
            let config = load_config(&cli.config)?;
            cmd_sync(&config, &repo_path, account.as_deref()).await
        }
        Commands::Status { repo_path } => {
            let config = load_config(&cli.config)?;
            cmd_status(&config, &repo_path).await
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<ReplayConfig> {
    if !path.exists() {
        // The built-in defaults target the Dojo repository; a config file is
        // only needed to replay something else.
        info!(path = %path.display(), "no config file found, using built-in defaults");
        return Ok(ReplayConfig::default());
    }
    let config = ReplayConfig::load(path).context("failed to load configuration file")?;
    Ok(config)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_sync(config: &ReplayConfig, repo_path: &str, account: Option<&str>) -> Result<()> {
    let repo_path = expand_tilde(repo_path);

    let source = SvnClient::new(
        &config.svn.url,
        &config.svn.username,
        config.svn.password.as_deref().unwrap_or(""),
    );

    let engine = ReplayEngine::new(&source, config);
    let report = engine
        .run(&repo_path, account)
        .await
        .map_err(|e| anyhow::anyhow!("replay failed: {}", e))?;

    println!("Replay completed:");
    println!("  Revisions replayed: {}", report.revisions_replayed);
    println!("  Commits created   : {}", report.commits);
    println!(
        "  Synced to revision: {}",
        report
            .last_revision
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unchanged".to_string())
    );
    if !report.branches_touched.is_empty() {
        println!("  Branches touched  : {}", report.branches_touched.join(", "));
    }
    if !report.branches_deleted.is_empty() {
        println!("  Branches deleted  : {}", report.branches_deleted.join(", "));
    }
    if !report.tags_created.is_empty() {
        println!("  Tags created      : {}", report.tags_created.join(", "));
    }
    if !report.tags_deleted.is_empty() {
        println!("  Tags deleted      : {}", report.tags_deleted.join(", "));
    }

    if report.commits > 0 && account.is_none() {
        println!();
        println!("Next steps (no --account given, nothing was pushed):");
        println!("  git push origin {}", config.replay.default_branch);
        for branch in &report.branches_touched {
            if branch != &config.replay.default_branch {
                println!("  git push origin {}", branch);
            }
        }
        for branch in &report.branches_deleted {
            println!("  git push origin :{}", branch);
        }
        if !report.tags_created.is_empty() || !report.tags_deleted.is_empty() {
            println!("  git push --tags");
        }
    }

    Ok(())
}

async fn cmd_status(config: &ReplayConfig, repo_path: &str) -> Result<()> {
    let repo_path = expand_tilde(repo_path);

    let local = watermark::load(&repo_path)
        .map_err(|e| anyhow::anyhow!("cannot read replay state: {}", e))?;

    let source = SvnClient::new(
        &config.svn.url,
        &config.svn.username,
        config.svn.password.as_deref().unwrap_or(""),
    );
    let head = source
        .head_revision()
        .await
        .map_err(|e| anyhow::anyhow!("cannot query SVN head revision: {}", e))?;

    println!("svnreplay status");
    println!("================");
    println!();
    println!("  Repository    : {}", repo_path.display());
    println!("  SVN URL       : {}", config.svn.url);
    println!("  Local revision: {}", local);
    println!("  SVN head      : {}", head);
    if local >= head {
        println!("  Up-to-date.");
    } else {
        println!("  Behind by {} revision(s).", head - local);
    }

    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# svnreplay configuration
# Defaults replay the Dojo Toolkit repository; adjust for other layouts.

[svn]
url = "http://svn.dojotoolkit.org/src"
username = ""
# password_env = "SVN_PASSWORD"

[replay]
modules = ["dojo", "dijit", "dojox", "util", "demos"]
default_branch = "master"
base_revision = 15378
batch_size = 100
author_email = "nobody@dojotoolkit.org"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your SVN repository details");
    println!(
        "  2. Validate with: svnreplay validate --config {}",
        output.display()
    );
    println!(
        "  3. Start replaying: svnreplay sync <repo-path> --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = ReplayConfig::load(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  SVN URL       : {}", config.svn.url);
    println!(
        "  SVN user      : {}",
        if config.svn.username.is_empty() {
            "(anonymous)"
        } else {
            &config.svn.username
        }
    );
    println!(
        "  SVN password  : {}",
        if config.svn.password.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("  Modules       : {}", config.replay.modules.join(", "));
    println!("  Default branch: {}", config.replay.default_branch);
    println!("  Base revision : {}", config.replay.base_revision);
    println!("  Batch size    : {}", config.replay.batch_size);
    println!("  Author email  : {}", config.replay.author_email);
    println!();
    println!("Configuration is valid.");

    Ok(())
}
