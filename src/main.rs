//! Strategy Splitter - status tool
//!
//! Loads configuration, opens the state database and reports the persisted
//! vault. An empty vault is initialized from configuration on first run.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use strategy_splitter::config::Config;
use strategy_splitter::persistence::PersistenceManager;
use strategy_splitter::telemetry;
use strategy_splitter::utils::fixed::bps_to_fraction;
use strategy_splitter::vault::VaultSnapshot;
use strategy_splitter::SystemClock;
use tracing::info;

fn main() -> Result<()> {
    let config = Config::load()?;
    let _guard = telemetry::init_tracing(&config.logging)?;
    config.validate().context("Invalid configuration")?;

    if let Some(parent) = Path::new(&config.persistence.db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory {parent:?}"))?;
    }
    let persistence = PersistenceManager::new(&config.persistence.db_path)?;

    let snapshot = match persistence.load_state()? {
        Some(snapshot) => snapshot,
        None => {
            info!("No saved state, initializing an empty vault");
            let vault = config.build_vault(Arc::new(SystemClock))?;
            let snapshot = vault.snapshot();
            persistence.save_state(&snapshot)?;
            snapshot
        }
    };

    log_status(&snapshot);
    Ok(())
}

fn log_status(snapshot: &VaultSnapshot) {
    let percent = |bps: u32| bps_to_fraction(bps) * Decimal::ONE_HUNDRED;
    let supply: u128 = snapshot.balances.iter().map(|(_, shares)| shares).sum();

    info!("📋 Vault {} ({})", snapshot.splitter.id, snapshot.asset);
    info!("   Saved at: {}", snapshot.saved_at);
    info!(
        "   Fees: deposit {}%, withdraw {}%, insurance share {}%",
        percent(snapshot.fees.deposit_fee_bps),
        percent(snapshot.fees.withdraw_fee_bps),
        percent(snapshot.fees.insurance_share_bps)
    );
    info!("   Buffer: {}%", percent(snapshot.buffer_bps));
    info!(
        "   Idle: vault {}, splitter {}",
        snapshot.idle, snapshot.splitter.idle
    );
    info!(
        "   Insurance: {} (received {}, covered {})",
        snapshot.insurance.balance(),
        snapshot.insurance.total_received(),
        snapshot.insurance.total_covered()
    );
    info!("   Shares: {} across {} holders", supply, snapshot.balances.len());

    for slot in &snapshot.splitter.strategies {
        info!(
            "   Strategy {}: APR {:.2}%{}{}",
            slot.id,
            slot.apr_current.as_percent(),
            if slot.paused { " [paused]" } else { "" },
            slot.external_capacity
                .map(|cap| format!(", capacity {cap}"))
                .unwrap_or_default()
        );
    }
    for (id, unlock_at) in &snapshot.splitter.scheduled {
        info!("   Scheduled {}: admissible after {}", id, unlock_at);
    }
}
