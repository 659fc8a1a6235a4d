/*!
 * Batch Report
 *
 * 汇总所有钱包的投票权，写出 JSON 报告并生成终端表格。
 */

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregator::WalletPower;
use crate::deserializers::RegistrarConfig;
use crate::snapshot::SnapshotStats;

/// Deviation from a configured reference value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceCheck {
    pub wallet: String,
    pub expected: f64,
    pub actual: f64,
    pub deviation_percent: f64,
}

impl ReferenceCheck {
    pub fn new(wallet: &str, expected: f64, actual: f64) -> Self {
        let deviation_percent = if expected == 0.0 {
            if actual == 0.0 { 0.0 } else { 100.0 }
        } else {
            (actual - expected) / expected * 100.0
        };
        Self {
            wallet: wallet.to_string(),
            expected,
            actual,
            deviation_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub snapshot_fetched_at: u64,
    pub program_id: String,
    pub layout: String,
    pub multiplier_policy: String,
    pub registrar: RegistrarConfig,
    pub stats: SnapshotStats,
    pub total_native_power: f64,
    pub total_delegated_power: f64,
    pub wallets: Vec<WalletPower>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference_checks: Vec<ReferenceCheck>,
}

impl BatchReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        snapshot_fetched_at: u64,
        program_id: String,
        layout: String,
        multiplier_policy: String,
        registrar: RegistrarConfig,
        stats: SnapshotStats,
        wallets: Vec<WalletPower>,
        reference_checks: Vec<ReferenceCheck>,
    ) -> Self {
        let total_native_power = wallets.iter().map(|w| w.native_power).sum();
        let total_delegated_power = wallets.iter().map(|w| w.delegated_power).sum();
        Self {
            generated_at: Utc::now(),
            snapshot_fetched_at,
            program_id,
            layout,
            multiplier_policy,
            registrar,
            stats,
            total_native_power,
            total_delegated_power,
            wallets,
            reference_checks,
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write report {}", path.display()))?;
        Ok(())
    }

    pub fn format_summary(&self) -> String {
        if self.wallets.is_empty() {
            return "📊 No wallets configured\n".to_string();
        }

        let mut out = String::new();
        out.push_str("\n╔═══════════════════════════════════════════════════════════════════════╗\n");
        out.push_str("║  Governance power                                                     ║\n");
        out.push_str("╠═══════════════════════════════════════════════════════════════════════╣\n");

        for w in &self.wallets {
            let name = w.label.clone().unwrap_or_else(|| short_key(&w.wallet));
            out.push_str(&format!(
                "║ {:<24} native {:>16.6} │ delegated {:>14.6} ║\n",
                truncate(&name, 24),
                w.native_power,
                w.delegated_power
            ));
        }

        out.push_str("╠═══════════════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!(
            "║ accounts {} (rejected {}) │ deposits {} │ policy {:<16} ║\n",
            self.stats.accounts, self.stats.rejected_accounts, self.stats.deposits, self.multiplier_policy
        ));
        out.push_str("╚═══════════════════════════════════════════════════════════════════════╝\n");
        out
    }
}

fn short_key(key: &str) -> String {
    if key.len() > 12 {
        format!("{}…{}", &key[..6], &key[key.len() - 4..])
    } else {
        key.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max - 1).chain(std::iter::once('…')).collect()
    } else {
        s.to_string()
    }
}
