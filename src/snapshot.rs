/*!
 * Account Snapshot
 *
 * 一次抓取的全部账户（时间点 T），显式传入解码/聚合流程，不使用全局缓存。
 */

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::deserializers::{DepositFilter, VoterAccount};
use crate::layout::{LayoutRegistry, LayoutVariant};
use crate::utils::LayoutProbe;
use crate::vsr_interface::DecodeError;

/// Raw bytes as handed over by the fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    pub address: String,
    pub data: Vec<u8>,
    pub layout: LayoutVariant,
}

impl RawAccount {
    pub fn new(address: impl Into<String>, data: Vec<u8>, layout: LayoutVariant) -> Self {
        Self {
            address: address.into(),
            data,
            layout,
        }
    }
}

/// All accounts fetched at `fetched_at` (unix seconds)
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    pub fetched_at: u64,
    pub accounts: Vec<RawAccount>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedAccount {
    pub address: String,
    pub error: DecodeError,
}

/// Decoded view of a snapshot
#[derive(Debug, Clone, Default)]
pub struct DecodedSnapshot {
    pub fetched_at: u64,
    pub voters: Vec<VoterAccount>,
    pub rejected: Vec<RejectedAccount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SnapshotStats {
    pub accounts: usize,
    pub rejected_accounts: usize,
    pub deposits: usize,
    pub rejected_slots: usize,
    pub delegated_accounts: usize,
}

impl AccountSnapshot {
    pub fn new(fetched_at: u64, accounts: Vec<RawAccount>) -> Self {
        Self { fetched_at, accounts }
    }

    /// Decode every account in parallel
    ///
    /// Accounts that fail the layout check are collected in `rejected`;
    /// they never abort the rest of the batch. `fetched_at` is used as "now"
    /// for lockup plausibility.
    pub fn decode(&self, registry: &LayoutRegistry, filter: &DepositFilter) -> DecodedSnapshot {
        let results: Vec<Result<VoterAccount, RejectedAccount>> = self
            .accounts
            .par_iter()
            .map(|raw| {
                let reject = |error: DecodeError| RejectedAccount {
                    address: raw.address.clone(),
                    error,
                };
                let layout = registry.resolve(&raw.layout).map_err(reject)?;
                VoterAccount::from_account_data(&raw.address, &raw.data, layout, filter, self.fetched_at)
                    .map_err(|e| {
                        debug!(
                            account = %raw.address,
                            error = %e,
                            head = %LayoutProbe::hex_dump(&raw.data, 0, 16),
                            "account rejected"
                        );
                        reject(e)
                    })
            })
            .collect();

        let mut decoded = DecodedSnapshot {
            fetched_at: self.fetched_at,
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(voter) => decoded.voters.push(voter),
                Err(rejected) => decoded.rejected.push(rejected),
            }
        }

        if !decoded.rejected.is_empty() {
            warn!(
                "⚠️  {} of {} accounts rejected (malformed or unknown layout)",
                decoded.rejected.len(),
                self.accounts.len()
            );
        }
        info!(
            accounts = decoded.voters.len(),
            rejected = decoded.rejected.len(),
            "snapshot decoded"
        );

        decoded
    }
}

impl DecodedSnapshot {
    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            accounts: self.voters.len(),
            rejected_accounts: self.rejected.len(),
            deposits: self.voters.iter().map(|v| v.deposits.len()).sum(),
            rejected_slots: self.voters.iter().map(|v| v.rejected_slots.len()).sum(),
            delegated_accounts: self.voters.iter().filter(|v| v.is_delegated()).count(),
        }
    }
}
