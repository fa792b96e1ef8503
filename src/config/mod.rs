//! Configuration management for the strategy splitter.
//!
//! Loads settings from an optional `config` file and `SPLIT__` environment
//! variables. Fractions are given as decimals in `0..=1` and converted to
//! basis points when the engine is built.

use crate::clock::Clock;
use crate::splitter::{Splitter, SplitterSettings};
use crate::types::{AssetId, ControllerId, SplitterId};
use crate::utils::fixed::fraction_to_bps;
use crate::vault::{FeePolicy, Vault, MAX_FEE_BPS};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Share vault and fee settings
    #[serde(default)]
    pub vault: VaultConfig,
    /// Allocation policy
    #[serde(default)]
    pub splitter: SplitterConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
    /// State database
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Unit of account every strategy must manage
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Controller every strategy must report
    #[serde(default = "default_controller")]
    pub controller: String,
    /// Fee charged on deposits (0.0-0.05)
    #[serde(default)]
    pub deposit_fee: Decimal,
    /// Fee charged on withdrawals (0.0-0.05)
    #[serde(default)]
    pub withdraw_fee: Decimal,
    /// Portion of fees kept as insurance (0.0-1.0)
    #[serde(default = "default_insurance_fee_share")]
    pub insurance_fee_share: Decimal,
    /// Portion of total assets kept idle in the vault (0.0-1.0)
    #[serde(default)]
    pub buffer: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    #[serde(default = "default_splitter_id")]
    pub id: String,
    /// Delay between scheduling and admitting a strategy
    #[serde(default = "default_admission_delay_hours")]
    pub admission_delay_hours: u64,
    /// APR samples kept per strategy
    #[serde(default = "default_apr_history_len")]
    pub apr_history_len: usize,
    /// Newest samples averaged into the current APR
    #[serde(default = "default_apr_smoothing_window")]
    pub apr_smoothing_window: usize,
    /// Largest self-reported loss accepted from a strategy, as a fraction of its assets
    #[serde(default = "default_max_strategy_loss")]
    pub max_strategy_loss: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Also write daily-rotated log files here
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

// Default value functions
fn default_asset() -> String {
    "USDC".to_string()
}

fn default_controller() -> String {
    "controller".to_string()
}

fn default_insurance_fee_share() -> Decimal {
    Decimal::ONE // every fee goes to insurance
}

fn default_splitter_id() -> String {
    "splitter".to_string()
}

fn default_admission_delay_hours() -> u64 {
    18
}

fn default_apr_history_len() -> usize {
    10
}

fn default_apr_smoothing_window() -> usize {
    3
}

fn default_max_strategy_loss() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_db_path() -> String {
    "data/splitter_state.db".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            asset: default_asset(),
            controller: default_controller(),
            deposit_fee: Decimal::ZERO,
            withdraw_fee: Decimal::ZERO,
            insurance_fee_share: default_insurance_fee_share(),
            buffer: Decimal::ZERO,
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            id: default_splitter_id(),
            admission_delay_hours: default_admission_delay_hours(),
            apr_history_len: default_apr_history_len(),
            apr_smoothing_window: default_apr_smoothing_window(),
            max_strategy_loss: default_max_strategy_loss(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
            directory: None,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn to_bps(name: &str, fraction: Decimal) -> Result<u32> {
    fraction_to_bps(fraction).with_context(|| format!("{name} must be between 0 and 1, got {fraction}"))
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("SPLIT"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let fees = self.vault.fee_policy()?;
        anyhow::ensure!(
            fees.deposit_fee_bps <= MAX_FEE_BPS && fees.withdraw_fee_bps <= MAX_FEE_BPS,
            "deposit_fee and withdraw_fee must not exceed {MAX_FEE_BPS} bps"
        );
        to_bps("buffer", self.vault.buffer)?;

        anyhow::ensure!(
            self.splitter.apr_history_len >= 1,
            "apr_history_len must be at least 1"
        );
        anyhow::ensure!(
            self.splitter.apr_smoothing_window >= 1
                && self.splitter.apr_smoothing_window <= self.splitter.apr_history_len,
            "apr_smoothing_window must be >= 1 and <= apr_history_len"
        );
        self.splitter.settings()?;

        anyhow::ensure!(!self.vault.asset.is_empty(), "asset must not be empty");
        anyhow::ensure!(!self.splitter.id.is_empty(), "splitter id must not be empty");

        Ok(())
    }

    /// Build an empty vault and splitter from this configuration.
    pub fn build_vault(&self, clock: Arc<dyn Clock>) -> Result<Vault> {
        self.validate()?;
        let splitter = Splitter::new(
            SplitterId::new(self.splitter.id.as_str()),
            AssetId::new(self.vault.asset.as_str()),
            ControllerId::new(self.vault.controller.as_str()),
            self.splitter.settings()?,
            clock,
        );
        let buffer_bps = to_bps("buffer", self.vault.buffer)?;
        Vault::new(splitter, self.vault.fee_policy()?, buffer_bps).context("Invalid vault parameters")
    }
}

impl VaultConfig {
    pub fn fee_policy(&self) -> Result<FeePolicy> {
        Ok(FeePolicy {
            deposit_fee_bps: to_bps("deposit_fee", self.deposit_fee)?,
            withdraw_fee_bps: to_bps("withdraw_fee", self.withdraw_fee)?,
            insurance_share_bps: to_bps("insurance_fee_share", self.insurance_fee_share)?,
        })
    }
}

impl SplitterConfig {
    pub fn settings(&self) -> Result<SplitterSettings> {
        Ok(SplitterSettings {
            admission_delay_secs: self
                .admission_delay_hours
                .checked_mul(3_600)
                .context("admission_delay_hours is too large")?,
            apr_history_len: self.apr_history_len,
            apr_smoothing_window: self.apr_smoothing_window,
            max_strategy_loss_bps: to_bps("max_strategy_loss", self.max_strategy_loss)?,
        })
    }
}
