//! SQLite persistence for vault state.
//!
//! Persists everything needed to resume after a restart:
//! - Vault balances, fees and insurance
//! - Share balances
//! - Strategy slots with their APR history
//! - Pending admissions
//!
//! Strategy adapters themselves are not persisted; they are re-attached by id
//! when the snapshot is restored.

use crate::splitter::{SlotSnapshot, SplitterSettings, SplitterSnapshot};
use crate::types::{AccountId, Amount, AssetId, ControllerId, SplitterId, StrategyId};
use crate::utils::fixed::Apr;
use crate::vault::{FeePolicy, InsuranceBuffer, VaultSnapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// SQLite-based persistence manager.
pub struct PersistenceManager {
    conn: Connection,
}

fn parse_amount(raw: &str, field: &str) -> Result<Amount> {
    raw.parse::<Amount>()
        .with_context(|| format!("Invalid amount in {field}: {raw:?}"))
}

fn parse_time(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in {field}: {raw:?}"))
}

impl PersistenceManager {
    /// Create a new persistence manager, initializing the database if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let manager = Self { conn };
        manager.init_schema()?;

        info!("Persistence manager initialized at {:?}", db_path.as_ref());
        Ok(manager)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Vault state (singleton row)
            CREATE TABLE IF NOT EXISTS vault_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                asset TEXT NOT NULL,
                controller TEXT NOT NULL,
                splitter_id TEXT NOT NULL,
                splitter_settings TEXT NOT NULL,
                deposit_fee_bps INTEGER NOT NULL,
                withdraw_fee_bps INTEGER NOT NULL,
                insurance_share_bps INTEGER NOT NULL,
                buffer_bps INTEGER NOT NULL,
                vault_idle TEXT NOT NULL,
                splitter_idle TEXT NOT NULL,
                insurance_balance TEXT NOT NULL,
                insurance_received TEXT NOT NULL,
                insurance_covered TEXT NOT NULL,
                distributed_fees TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS share_balances (
                account TEXT PRIMARY KEY,
                shares TEXT NOT NULL
            );

            -- Slots in admission order
            CREATE TABLE IF NOT EXISTS strategy_slots (
                position INTEGER PRIMARY KEY,
                strategy_id TEXT NOT NULL UNIQUE,
                weight TEXT NOT NULL,
                external_capacity TEXT,
                paused INTEGER NOT NULL,
                apr_current TEXT NOT NULL,
                apr_history TEXT NOT NULL,
                last_hard_work TEXT NOT NULL,
                covered_loss TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduled_strategies (
                strategy_id TEXT PRIMARY KEY,
                unlock_at TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Save a complete vault snapshot, replacing the previous one.
    pub fn save_state(&self, snapshot: &VaultSnapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let splitter = &snapshot.splitter;
        let insurance = &snapshot.insurance;

        tx.execute(
            r#"
            INSERT INTO vault_state (id, asset, controller, splitter_id, splitter_settings,
                                     deposit_fee_bps, withdraw_fee_bps, insurance_share_bps,
                                     buffer_bps, vault_idle, splitter_idle, insurance_balance,
                                     insurance_received, insurance_covered, distributed_fees,
                                     saved_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(id) DO UPDATE SET
                asset = ?1,
                controller = ?2,
                splitter_id = ?3,
                splitter_settings = ?4,
                deposit_fee_bps = ?5,
                withdraw_fee_bps = ?6,
                insurance_share_bps = ?7,
                buffer_bps = ?8,
                vault_idle = ?9,
                splitter_idle = ?10,
                insurance_balance = ?11,
                insurance_received = ?12,
                insurance_covered = ?13,
                distributed_fees = ?14,
                saved_at = ?15
            "#,
            params![
                snapshot.asset.as_str(),
                snapshot.controller.as_str(),
                splitter.id.as_str(),
                serde_json::to_string(&splitter.settings)?,
                snapshot.fees.deposit_fee_bps,
                snapshot.fees.withdraw_fee_bps,
                snapshot.fees.insurance_share_bps,
                snapshot.buffer_bps,
                snapshot.idle.to_string(),
                splitter.idle.to_string(),
                insurance.balance().to_string(),
                insurance.total_received().to_string(),
                insurance.total_covered().to_string(),
                insurance.distributed_fees().to_string(),
                snapshot.saved_at.to_rfc3339(),
            ],
        )?;

        tx.execute("DELETE FROM share_balances", [])?;
        for (account, shares) in &snapshot.balances {
            tx.execute(
                "INSERT INTO share_balances (account, shares) VALUES (?1, ?2)",
                params![account.as_str(), shares.to_string()],
            )?;
        }

        tx.execute("DELETE FROM strategy_slots", [])?;
        for (position, slot) in splitter.strategies.iter().enumerate() {
            let history: Vec<String> = slot.apr_history.iter().map(|a| a.raw().to_string()).collect();
            tx.execute(
                r#"
                INSERT INTO strategy_slots (position, strategy_id, weight, external_capacity,
                                            paused, apr_current, apr_history, last_hard_work,
                                            covered_loss)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    position as i64,
                    slot.id.as_str(),
                    slot.weight.raw().to_string(),
                    slot.external_capacity.map(|c| c.to_string()),
                    slot.paused,
                    slot.apr_current.raw().to_string(),
                    serde_json::to_string(&history)?,
                    slot.last_hard_work.to_rfc3339(),
                    slot.covered_loss.to_string(),
                ],
            )?;
        }

        tx.execute("DELETE FROM scheduled_strategies", [])?;
        for (id, unlock_at) in &splitter.scheduled {
            tx.execute(
                "INSERT INTO scheduled_strategies (strategy_id, unlock_at) VALUES (?1, ?2)",
                params![id.as_str(), unlock_at.to_rfc3339()],
            )?;
        }

        tx.commit()?;

        debug!(
            strategies = splitter.strategies.len(),
            holders = snapshot.balances.len(),
            "State saved to database"
        );
        Ok(())
    }

    /// Load the last saved snapshot, if any.
    pub fn load_state(&self) -> Result<Option<VaultSnapshot>> {
        type StateRow = (
            String,
            String,
            String,
            String,
            [u32; 4],
            [String; 6],
            String,
        );
        let state_row: Option<StateRow> = self
            .conn
            .query_row(
                r#"
                SELECT asset, controller, splitter_id, splitter_settings,
                       deposit_fee_bps, withdraw_fee_bps, insurance_share_bps, buffer_bps,
                       vault_idle, splitter_idle, insurance_balance, insurance_received,
                       insurance_covered, distributed_fees, saved_at
                FROM vault_state WHERE id = 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
                        [
                            row.get(8)?,
                            row.get(9)?,
                            row.get(10)?,
                            row.get(11)?,
                            row.get(12)?,
                            row.get(13)?,
                        ],
                        row.get(14)?,
                    ))
                },
            )
            .optional()?;

        let Some((asset, controller, splitter_id, settings, bps, amounts, saved_at)) = state_row
        else {
            return Ok(None);
        };
        let [deposit_fee_bps, withdraw_fee_bps, insurance_share_bps, buffer_bps] = bps;
        let [vault_idle, splitter_idle, balance, received, covered, distributed] = amounts;

        let settings: SplitterSettings =
            serde_json::from_str(&settings).context("Invalid splitter settings")?;

        let balances = self
            .conn
            .prepare("SELECT account, shares FROM share_balances ORDER BY account")?
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(account, shares)| -> Result<(AccountId, Amount)> {
                Ok((AccountId::new(account), parse_amount(&shares, "share_balances")?))
            })
            .collect::<Result<Vec<_>>>()?;

        let strategies = self.load_slots()?;

        let scheduled = self
            .conn
            .prepare("SELECT strategy_id, unlock_at FROM scheduled_strategies ORDER BY strategy_id")?
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(id, at)| -> Result<(StrategyId, DateTime<Utc>)> {
                Ok((StrategyId::new(id), parse_time(&at, "scheduled_strategies")?))
            })
            .collect::<Result<Vec<_>>>()?;

        let snapshot = VaultSnapshot {
            asset: AssetId::new(asset),
            controller: ControllerId::new(controller),
            fees: FeePolicy {
                deposit_fee_bps,
                withdraw_fee_bps,
                insurance_share_bps,
            },
            buffer_bps,
            idle: parse_amount(&vault_idle, "vault_idle")?,
            insurance: InsuranceBuffer::from_parts(
                parse_amount(&balance, "insurance_balance")?,
                parse_amount(&received, "insurance_received")?,
                parse_amount(&covered, "insurance_covered")?,
                parse_amount(&distributed, "distributed_fees")?,
            ),
            balances,
            splitter: SplitterSnapshot {
                id: SplitterId::new(splitter_id),
                settings,
                idle: parse_amount(&splitter_idle, "splitter_idle")?,
                strategies,
                scheduled,
            },
            saved_at: parse_time(&saved_at, "saved_at")?,
        };

        info!(
            strategies = snapshot.splitter.strategies.len(),
            holders = snapshot.balances.len(),
            saved_at = %snapshot.saved_at,
            "Loaded state from database"
        );
        Ok(Some(snapshot))
    }

    fn load_slots(&self) -> Result<Vec<SlotSnapshot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT strategy_id, weight, external_capacity, paused, apr_current,
                   apr_history, last_hard_work, covered_loss
            FROM strategy_slots ORDER BY position
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, weight, capacity, paused, apr_current, history, last, covered)| -> Result<SlotSnapshot> {
                let history: Vec<String> =
                    serde_json::from_str(&history).context("Invalid APR history")?;
                Ok(SlotSnapshot {
                    id: StrategyId::new(id),
                    weight: Apr::from_raw(parse_amount(&weight, "weight")?),
                    external_capacity: capacity
                        .map(|c| parse_amount(&c, "external_capacity"))
                        .transpose()?,
                    paused,
                    apr_current: Apr::from_raw(parse_amount(&apr_current, "apr_current")?),
                    apr_history: history
                        .iter()
                        .map(|raw| parse_amount(raw, "apr_history").map(Apr::from_raw))
                        .collect::<Result<_>>()?,
                    last_hard_work: parse_time(&last, "last_hard_work")?,
                    covered_loss: parse_amount(&covered, "covered_loss")?,
                })
            })
            .collect()
    }

    /// Check if there's any saved state.
    pub fn has_state(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vault_state", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Clear all persisted data.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            DELETE FROM vault_state;
            DELETE FROM share_balances;
            DELETE FROM strategy_slots;
            DELETE FROM scheduled_strategies;
            "#,
        )?;
        info!("All persisted data cleared");
        Ok(())
    }
}
