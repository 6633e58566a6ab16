//! Janitor CLI
//!
//! Runs the build-artifact janitor against an in-memory build platform. With
//! `--cycles N` it runs N cleanup cycles and verification runs back to back
//! and exits; without it the scheduler runs until Ctrl-C. Either way the
//! observability snapshot is printed as JSON at the end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Duration as Days;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use janitor_core::app::Scheduler;
use janitor_core::cleanup::CleanupDriver;
use janitor_core::config::JanitorConfig;
use janitor_core::correlation::CorrelationRegistry;
use janitor_core::delete::{CallbackRouter, DeleteCoordinator};
use janitor_core::domain::{Build, EntityKind, ResultStatus};
use janitor_core::impls::{InMemoryBuildPlatform, InMemoryLogStore};
use janitor_core::observability::Observability;
use janitor_core::ports::{Clock, SystemClock};
use janitor_core::verify::VerificationEngine;

/// Build-artifact janitor
#[derive(Parser, Debug)]
#[command(name = "janitor")]
#[command(about = "Deletes expired temporary builds and verifies build output checksums")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Public base URI used in delete callback URLs
    #[arg(long)]
    application_uri: Option<String>,

    /// Age in days after which temporary builds expire
    #[arg(long)]
    lifespan_days: Option<u32>,

    /// Longest wait for a delete callback, in seconds
    #[arg(long)]
    max_delete_wait_secs: Option<u64>,

    /// Upper bound on enumerations in one build cleanup pass
    #[arg(long)]
    max_cleanup_rounds: Option<usize>,

    /// Checksum mismatches tolerated before a build is flagged
    #[arg(long)]
    max_verification_retries: Option<u32>,

    /// Seconds between cleanup cycles
    #[arg(long)]
    cleanup_interval_secs: Option<u64>,

    /// Seconds between verification runs
    #[arg(long)]
    verification_interval_secs: Option<u64>,

    /// Run this many cycles and exit instead of scheduling
    #[arg(long)]
    cycles: Option<u32>,

    /// Seed the in-memory platform with sample builds
    #[arg(long)]
    demo: bool,

    /// Delay before the in-memory platform answers a delete, in milliseconds
    #[arg(long, default_value = "50")]
    callback_delay_ms: u64,
}

impl Args {
    fn janitor_config(&self) -> anyhow::Result<JanitorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str::<JanitorConfig>(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => JanitorConfig::default(),
        };

        if let Some(uri) = &self.application_uri {
            config.application_uri = uri.clone();
        }
        if let Some(days) = self.lifespan_days {
            config.lifespan_days = days;
        }
        if let Some(secs) = self.max_delete_wait_secs {
            config.max_delete_wait_secs = secs;
        }
        if let Some(rounds) = self.max_cleanup_rounds {
            config.max_cleanup_rounds = rounds;
        }
        if let Some(retries) = self.max_verification_retries {
            config.max_verification_retries = retries;
        }
        if let Some(secs) = self.cleanup_interval_secs {
            config.cleanup_interval_secs = secs;
        }
        if let Some(secs) = self.verification_interval_secs {
            config.verification_interval_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "janitor=info,janitor_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = args.janitor_config()?;
    info!(application_uri = %config.application_uri, lifespan_days = config.lifespan_days, "Starting janitor");

    let observability = Arc::new(Observability::new());
    let build_registry = Arc::new(CorrelationRegistry::new(
        EntityKind::Build,
        observability.clone(),
    ));
    let group_registry = Arc::new(CorrelationRegistry::new(
        EntityKind::GroupBuild,
        observability.clone(),
    ));
    let router = Arc::new(CallbackRouter::new(
        build_registry.clone(),
        group_registry.clone(),
    ));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let platform = Arc::new(InMemoryBuildPlatform::new(
        router,
        Duration::from_millis(args.callback_delay_ms),
    ));
    let log_store = Arc::new(InMemoryLogStore::new());
    if args.demo {
        seed_demo(&platform, &log_store, clock.as_ref(), &config).await;
    }

    let driver = Arc::new(CleanupDriver::new(
        platform.clone(),
        DeleteCoordinator::new(build_registry, &config, observability.clone()),
        DeleteCoordinator::new(group_registry, &config, observability.clone()),
        clock,
        &config,
        observability.clone(),
    ));
    let engine = Arc::new(VerificationEngine::new(
        platform,
        log_store,
        &config,
        observability.clone(),
    ));

    match args.cycles {
        Some(cycles) => {
            for cycle in 1..=cycles {
                info!(cycle, "Running janitor cycle");
                let report = driver.cleanup_expired().await;
                println!("{}", serde_json::to_string_pretty(&report)?);
                engine.verify_unflagged_builds().await;
            }
        }
        None => {
            let scheduler = Scheduler::spawn(driver, engine, &config);
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            info!("Shutting down, waiting for running jobs");
            scheduler.shutdown_and_join().await;
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&observability.snapshot())?
    );
    Ok(())
}

/// Sample data: expired builds and a group build to delete, one build whose
/// deletion is refused, and checksums that match, mismatch, or match late.
async fn seed_demo(
    platform: &InMemoryBuildPlatform,
    log_store: &InMemoryLogStore,
    clock: &dyn Clock,
    config: &JanitorConfig,
) {
    let expired = clock.days_ago(config.lifespan_days) - Days::days(1);
    let fresh = clock.now();

    for id in ["1001", "1002", "1003"] {
        platform
            .add_build(Build::temporary(id).with_checksum(format!("sha-{id}")), expired)
            .await;
        log_store.set_checksum(id, format!("sha-{id}")).await;
    }
    platform.add_build(Build::temporary("1004"), expired).await;
    platform
        .fail_deletion(EntityKind::Build, "1004", ResultStatus::Failed)
        .await;

    platform
        .add_group_build(
            "g-7",
            true,
            expired,
            vec![Build::temporary("1101"), Build::temporary("1102")],
        )
        .await;

    platform
        .add_build(Build::temporary("2001").with_checksum("sha-2001"), fresh)
        .await;
    log_store.set_checksum("2001", "sha-corrupt").await;
    platform
        .add_build(Build::temporary("2002").with_checksum("sha-2002"), fresh)
        .await;
    log_store
        .set_checksums("2002", ["sha-partial".to_string(), "sha-2002".to_string()])
        .await;
}
