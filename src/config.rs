//! TOML configuration
//!
//! Every section is optional; missing keys fall back to the defaults below.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

use crate::aggregator::WalletQuery;
use crate::deserializers::{DepositFilter, RegistrarConfig};
use crate::layout::{LayoutRegistry, LayoutVariant, VoterLayout};
use crate::multiplier::MultiplierPolicy;

/// Mainnet voter-stake-registry program
pub const DEFAULT_VSR_PROGRAM_ID: &str = "vsr2nfGVNHmSY8uxoBGqq8AQbwz3JwaEaHqGbsTPXqQ";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub filters: DepositFilter,
    /// Used only when the registrar account cannot be fetched or decoded
    #[serde(default)]
    pub registrar: Option<RegistrarConfig>,
    #[serde(default)]
    pub multiplier: MultiplierConfig,
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    /// rayon worker threads (default: number of CPUs)
    #[serde(default)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub commitment: String,
    pub program_id: String,
    pub registrar: Option<String>,
    pub voting_mint_index: usize,
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            program_id: DEFAULT_VSR_PROGRAM_ID.to_string(),
            registrar: None,
            voting_mint_index: 0,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub variant: String,
    pub custom: Vec<VoterLayout>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            variant: LayoutVariant::IslandScan.to_string(),
            custom: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplierConfig {
    pub policy: String,
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        Self {
            policy: "linear".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Reference value to compare against (display units)
    #[serde(default)]
    pub expected_native: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub report_path: String,
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: "governance_power.json".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).with_context(|| format!("invalid {} pubkey '{}'", what, value))
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.filters.validate().map_err(|e| anyhow!("[filters] {}", e))?;
        if let Some(registrar) = &self.registrar {
            registrar.validate().map_err(|e| anyhow!("[registrar] {}", e))?;
        }
        self.multiplier_policy()?;
        self.layout_registry()?.resolve(&self.layout_variant())?;
        self.program_id()?;
        self.registrar_address()?;
        self.commitment()?;
        self.wallet_queries()?;
        if self.workers == Some(0) {
            bail!("workers must be > 0");
        }
        Ok(())
    }

    pub fn layout_variant(&self) -> LayoutVariant {
        match LayoutVariant::from_str(&self.layout.variant) {
            Ok(variant) => variant,
            Err(never) => match never {},
        }
    }

    /// Built-in layouts plus `[[layout.custom]]`
    pub fn layout_registry(&self) -> Result<LayoutRegistry> {
        let mut registry = LayoutRegistry::with_builtin();
        for layout in &self.layout.custom {
            registry.register(layout.clone())?;
        }
        Ok(registry)
    }

    pub fn multiplier_policy(&self) -> Result<MultiplierPolicy> {
        self.multiplier
            .policy
            .parse::<MultiplierPolicy>()
            .map_err(|e| anyhow!("[multiplier] {}", e))
    }

    pub fn program_id(&self) -> Result<Pubkey> {
        parse_pubkey(&self.rpc.program_id, "program_id")
    }

    pub fn registrar_address(&self) -> Result<Option<Pubkey>> {
        self.rpc
            .registrar
            .as_deref()
            .map(|r| parse_pubkey(r, "registrar"))
            .transpose()
    }

    pub fn commitment(&self) -> Result<CommitmentConfig> {
        match self.rpc.commitment.to_lowercase().as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => bail!("unknown commitment '{}'", other),
        }
    }

    pub fn wallet_queries(&self) -> Result<Vec<WalletQuery>> {
        self.wallets
            .iter()
            .map(|w| {
                let aliases = w
                    .aliases
                    .iter()
                    .map(|a| parse_pubkey(a, "alias"))
                    .collect::<Result<Vec<_>>>()?;
                Ok(WalletQuery {
                    wallet: parse_pubkey(&w.address, "wallet")?,
                    aliases,
                    label: w.name.clone(),
                })
            })
            .collect()
    }

    pub fn worker_threads(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }
}
