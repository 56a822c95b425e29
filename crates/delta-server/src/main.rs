//! # Delta Sync
//!
//! Main entry point for the Delta Sync daemon.

#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delta_core::{
    DirectoryClient, Poller, ReconciliationEngine, ShutdownHandle, SystemClock,
};
use delta_ldap::LdapDirectory;
use delta_rules::{load_rules, validate_rules, RhaiEvaluator};

mod config;

use config::DaemonConfig;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Delta Sync starting...");

    let config = DaemonConfig::load()?;
    let rules = load_rules(&config.rules_file)?;
    validate_rules(&rules)?;
    tracing::info!(rules = rules.len(), "conversion map loaded");

    let source: Arc<dyn DirectoryClient> = Arc::new(LdapDirectory::new(config.source)?);
    let destination: Arc<dyn DirectoryClient> = Arc::new(LdapDirectory::new(config.destination)?);

    let engine = ReconciliationEngine::new(
        source,
        destination,
        rules,
        RhaiEvaluator::new(),
        config.schedule.memoize_failures,
    );

    let (clock, shutdown) = SystemClock::new();
    register_shutdown(shutdown);

    let mut poller = Poller::new(engine, config.schedule, clock);
    poller.run();

    tracing::info!("Delta Sync stopped");
    Ok(())
}

/// Turns Ctrl-C into a clean stop at the next cycle boundary.
fn register_shutdown(handle: ShutdownHandle) {
    if let Err(err) = ctrlc::set_handler(move || handle.shutdown()) {
        tracing::warn!(error = %err, "cannot install signal handler");
    }
}
