//! groupsync - synchronize Active Directory groups into Google Workspace
//!
//! Reads AD groups matching a `cn` pattern, resolves their members to email
//! addresses and merges them into Google groups as a union: missing groups
//! are created, missing members are added, nothing is ever removed.
//!
//! Exit status: 0 on a clean run, 2 when the run completed with group or
//! member failures, 1 on configuration or fatal errors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use groupsync_core::{
    CancellationToken, Directory, RetryPolicy, SourceDirectory, SyncEngine, SyncError, SyncReport,
};
use groupsync_google::{GoogleDirectoryClient, ServiceAccountKey, ServiceAccountTokenSource};
use groupsync_ldap::AdGroupSource;
use secrecy::ExposeSecret;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::AppConfig;

const EXIT_OK: i32 = 0;
const EXIT_FATAL: i32 = 1;
const EXIT_PARTIAL: i32 = 2;

/// Synchronize Active Directory groups into Google Workspace
#[derive(Parser)]
#[command(name = "groupsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge AD group membership into Google groups
    Sync {
        /// Compute and report changes without writing
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the AD groups and their resolved member emails
    ListSource {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(EXIT_FATAL);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_directive())),
        )
        .init();

    let code = match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("groupsync failed: {e:#}");
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Sync { dry_run, json } => sync(&config, dry_run, json).await,
        Commands::ListSource { json } => list_source(&config, json).await,
    }
}

fn ad_source(config: &AppConfig) -> anyhow::Result<AdGroupSource> {
    let ldap_config = config.ldap_config()?;
    AdGroupSource::new(ldap_config).context("invalid AD configuration")
}

fn build_engine(
    config: &AppConfig,
    dry_run: bool,
    cancel: CancellationToken,
) -> anyhow::Result<SyncEngine> {
    let key = ServiceAccountKey::load(
        config.service_account_path.as_deref(),
        config
            .service_account_json
            .as_ref()
            .map(|json| json.expose_secret()),
    )
    .context("failed to load service account credentials")?;

    info!(
        client_email = %key.client_email,
        subject = %config.delegated_subject,
        "Using service account"
    );

    let tokens = ServiceAccountTokenSource::new(
        key,
        config.delegated_subject.clone(),
        config.scopes.clone(),
    )?;
    let client = GoogleDirectoryClient::new(Arc::new(tokens), config.http_timeout)?;

    let retry = RetryPolicy::new(
        config.retry_tries,
        Duration::from_millis(500),
        2.0,
        Duration::from_secs(8),
    )
    .with_cancellation(cancel);

    let directory = Directory::new(Arc::new(client)).with_retry_policy(retry);
    Ok(SyncEngine::new(directory, config.sync_settings(dry_run)))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current call");
            token.cancel();
        }
    });
}

async fn sync(config: &AppConfig, dry_run: bool, json: bool) -> anyhow::Result<i32> {
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let source = ad_source(config)?;
    let engine = build_engine(config, dry_run, cancel)?;

    info!(
        group_domain = %config.group_domain,
        filter = %config.ad_group_filter,
        dry_run,
        "Starting AD to Google group sync"
    );

    let report = match engine.run(&source).await {
        Ok(report) => report,
        Err(SyncError::Cancelled) => {
            warn!("Sync cancelled");
            return Ok(EXIT_FATAL);
        }
        Err(e) => return Err(e).context("sync failed"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(summarize(&report))
}

fn summarize(report: &SyncReport) -> i32 {
    for group in &report.groups {
        if let Some(err) = &group.error {
            error!(group = %group.group_key, error = %err, "Group failed");
        }
        for failure in &group.member_errors {
            warn!(
                group = %group.group_key,
                member = %failure.member,
                error = %failure.error,
                "Member could not be added"
            );
        }
    }

    info!(
        created = report.created(),
        updated = report.updated(),
        unchanged = report.unchanged(),
        failed = report.failed(),
        members_added = report.members_added(),
        member_errors = report.member_errors(),
        dry_run = report.dry_run,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "Sync finished"
    );

    if report.is_clean() {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}

async fn list_source(config: &AppConfig, json: bool) -> anyhow::Result<i32> {
    let source = ad_source(config)?;
    let groups = source
        .fetch_groups()
        .await
        .context("failed to read AD groups")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(EXIT_OK);
    }

    for (name, members) in &groups {
        println!("{name} ({} members)", members.len());
        for member in members {
            println!("  {member}");
        }
    }
    Ok(EXIT_OK)
}
