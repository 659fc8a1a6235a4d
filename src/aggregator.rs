/*!
 * Power Aggregator
 *
 * native    = Σ accounts where authority ∈ {wallet, aliases}
 * delegated = Σ accounts where voter_authority ∈ {wallet, aliases}
 *             and authority ∉ {wallet, aliases} and authority != voter_authority
 *
 * 两个桶互斥：同一账户只会计入其中一个。
 */

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::deserializers::{DepositRecord, LockupKind, RegistrarConfig, VoterAccount};
use crate::snapshot::DecodedSnapshot;
use crate::vsr_interface::MultiplierModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    Native,
    Delegated,
}

/// Per-deposit audit line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositPower {
    pub account: String,
    pub source: PowerSource,
    pub slot_offset: usize,
    /// Display units
    pub amount: f64,
    pub lockup_kind: LockupKind,
    pub lockup_end_ts: u64,
    pub multiplier: f64,
    /// Display units
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletPower {
    pub wallet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub native_power: f64,
    pub delegated_power: f64,
    pub deposits: Vec<DepositPower>,
}

impl WalletPower {
    pub fn total_power(&self) -> f64 {
        self.native_power + self.delegated_power
    }
}

/// A wallet plus the keys known to belong to the same holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletQuery {
    pub wallet: Pubkey,
    pub aliases: Vec<Pubkey>,
    pub label: Option<String>,
}

impl WalletQuery {
    pub fn new(wallet: Pubkey) -> Self {
        Self {
            wallet,
            aliases: Vec::new(),
            label: None,
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<Pubkey>) -> Self {
        self.aliases = aliases;
        self
    }

    fn matches(&self, key: &Pubkey) -> bool {
        self.wallet == *key || self.aliases.contains(key)
    }
}

pub struct PowerAggregator {
    registrar: RegistrarConfig,
    model: Arc<dyn MultiplierModel>,
    token_decimals: u32,
    now: u64,
}

impl PowerAggregator {
    pub fn new(
        registrar: RegistrarConfig,
        model: Arc<dyn MultiplierModel>,
        token_decimals: u32,
        now: u64,
    ) -> Self {
        Self {
            registrar,
            model,
            token_decimals,
            now,
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// (multiplier, power in display units)
    pub fn deposit_power(&self, deposit: &DepositRecord) -> (f64, f64) {
        let multiplier = self.model.multiplier(deposit, self.now, &self.registrar);
        let power = deposit.amount_native as f64 * multiplier * self.registrar.digit_shift_factor()
            / 10f64.powi(self.token_decimals as i32);
        (multiplier, power)
    }

    fn classify(&self, query: &WalletQuery, voter: &VoterAccount) -> Option<PowerSource> {
        if query.matches(&voter.authority) {
            return Some(PowerSource::Native);
        }
        if query.matches(&voter.voter_authority) && voter.authority != voter.voter_authority {
            return Some(PowerSource::Delegated);
        }
        None
    }

    /// Native and delegated power for one wallet
    ///
    /// A wallet with no matching account gets `{0, 0}`.
    pub fn compute(&self, query: &WalletQuery, voters: &[VoterAccount]) -> WalletPower {
        let mut result = WalletPower {
            wallet: query.wallet.to_string(),
            label: query.label.clone(),
            native_power: 0.0,
            delegated_power: 0.0,
            deposits: Vec::new(),
        };

        for voter in voters {
            let source = match self.classify(query, voter) {
                Some(source) => source,
                None => continue,
            };

            for deposit in &voter.deposits {
                let (multiplier, power) = self.deposit_power(deposit);
                match source {
                    PowerSource::Native => result.native_power += power,
                    PowerSource::Delegated => result.delegated_power += power,
                }
                result.deposits.push(DepositPower {
                    account: voter.address.clone(),
                    source,
                    slot_offset: deposit.slot_offset,
                    amount: deposit.amount_native as f64 / 10f64.powi(self.token_decimals as i32),
                    lockup_kind: deposit.lockup.kind,
                    lockup_end_ts: deposit.lockup.end_ts,
                    multiplier,
                    power,
                });
            }
        }

        debug!(
            wallet = %result.wallet,
            native = result.native_power,
            delegated = result.delegated_power,
            deposits = result.deposits.len(),
            "wallet computed"
        );

        result
    }

    /// Compute every wallet in parallel; output order matches `queries`
    pub fn compute_batch(&self, queries: &[WalletQuery], snapshot: &DecodedSnapshot) -> Vec<WalletPower> {
        queries
            .par_iter()
            .map(|q| self.compute(q, &snapshot.voters))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserializers::registrar::SCALED_FACTOR_BASE;
    use crate::deserializers::Lockup;
    use crate::multiplier::{create_model, MultiplierPolicy};

    const NOW: u64 = 1_700_000_000;
    const UNIT: u64 = 1_000_000;

    fn key(b: u8) -> Pubkey {
        Pubkey::new_from_array([b; 32])
    }

    fn voter(address: &str, authority: u8, voter_authority: u8, amounts: &[u64]) -> VoterAccount {
        VoterAccount {
            address: address.to_string(),
            layout: "island-scan".to_string(),
            authority: key(authority),
            voter_authority: key(voter_authority),
            deposits: amounts
                .iter()
                .enumerate()
                .map(|(i, &a)| DepositRecord {
                    slot_offset: 104 + i * 80,
                    amount_native: a * UNIT,
                    lockup: Lockup::none(),
                    is_used: true,
                    lockup_discarded: false,
                })
                .collect(),
            rejected_slots: Vec::new(),
        }
    }

    fn aggregator() -> PowerAggregator {
        let registrar = RegistrarConfig {
            baseline_vote_weight_scaled_factor: SCALED_FACTOR_BASE,
            max_extra_lockup_vote_weight_scaled_factor: 2 * SCALED_FACTOR_BASE,
            lockup_saturation_secs: 1_000,
            digit_shift: 0,
        };
        PowerAggregator::new(registrar, create_model(MultiplierPolicy::Linear), 6, NOW)
    }

    #[test]
    fn test_native_and_delegated_are_separate() {
        let voters = vec![
            voter("own", 1, 1, &[100, 50]),
            voter("delegated-to-me", 2, 1, &[30]),
            voter("someone-else", 3, 3, &[999]),
        ];
        let power = aggregator().compute(&WalletQuery::new(key(1)), &voters);
        assert_eq!(power.native_power, 150.0);
        assert_eq!(power.delegated_power, 30.0);
        assert_eq!(power.total_power(), 180.0);
        assert_eq!(power.deposits.len(), 3);
    }

    #[test]
    fn test_delegating_owner_keeps_native_power() {
        // wallet 1 delegated its votes to wallet 2: still native for 1, delegated for 2
        let voters = vec![voter("acc", 1, 2, &[40])];
        let agg = aggregator();
        let owner = agg.compute(&WalletQuery::new(key(1)), &voters);
        let delegate = agg.compute(&WalletQuery::new(key(2)), &voters);
        assert_eq!((owner.native_power, owner.delegated_power), (40.0, 0.0));
        assert_eq!((delegate.native_power, delegate.delegated_power), (0.0, 40.0));
    }

    #[test]
    fn test_alias_delegation_counts_as_native_only() {
        // authority is an alias of the wallet, so this is not delegation
        let voters = vec![voter("acc", 7, 1, &[25])];
        let query = WalletQuery::new(key(1)).with_aliases(vec![key(7)]);
        let power = aggregator().compute(&query, &voters);
        assert_eq!(power.native_power, 25.0);
        assert_eq!(power.delegated_power, 0.0);
        assert_eq!(power.deposits.len(), 1);
    }

    #[test]
    fn test_no_accounts_yields_zero() {
        let power = aggregator().compute(&WalletQuery::new(key(9)), &[voter("x", 1, 1, &[5])]);
        assert_eq!((power.native_power, power.delegated_power), (0.0, 0.0));
        assert!(power.deposits.is_empty());
    }

    #[test]
    fn test_baseline_deposit_power_is_exact() {
        let voters = vec![voter("acc", 1, 1, &[200_000])];
        let power = aggregator().compute(&WalletQuery::new(key(1)), &voters);
        assert_eq!(power.native_power, 200_000.0);
        assert_eq!(power.deposits[0].multiplier, 1.0);
    }

    #[test]
    fn test_batch_preserves_order() {
        let snapshot = DecodedSnapshot {
            fetched_at: NOW,
            voters: vec![voter("a", 1, 1, &[10]), voter("b", 2, 2, &[20])],
            rejected: Vec::new(),
        };
        let queries = vec![WalletQuery::new(key(2)), WalletQuery::new(key(1)), WalletQuery::new(key(3))];
        let results = aggregator().compute_batch(&queries, &snapshot);
        let totals: Vec<f64> = results.iter().map(|r| r.native_power).collect();
        assert_eq!(totals, vec![20.0, 10.0, 0.0]);
    }
}
