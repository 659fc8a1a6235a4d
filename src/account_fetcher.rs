/*!
 * Account Fetcher
 *
 * 通过 RPC 拉取 VSR 程序的全部 voter 账户和 registrar 账户，
 * 输出 AccountSnapshot（原始字节），解码留给 snapshot 模块。
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::deserializers::RegistrarConfig;
use crate::layout::{LayoutVariant, VoterLayout};
use crate::snapshot::{AccountSnapshot, RawAccount};

pub struct VsrAccountFetcher {
    rpc_client: Arc<RpcClient>,
    program_id: Pubkey,
    commitment: CommitmentConfig,
}

impl VsrAccountFetcher {
    pub fn new(rpc_url: &str, program_id: Pubkey, commitment: CommitmentConfig, timeout: Duration) -> Self {
        let rpc_client = Arc::new(RpcClient::new_with_timeout_and_commitment(
            rpc_url.to_string(),
            timeout,
            commitment,
        ));
        Self {
            rpc_client,
            program_id,
            commitment,
        }
    }

    /// Every program account of the layout's exact size (and discriminator, if any)
    ///
    /// Blocking; call from `spawn_blocking`. An empty result is an error: the
    /// program always has voters, so zero accounts means the RPC gave no data.
    pub fn fetch_snapshot(&self, layout: &VoterLayout, variant: &LayoutVariant) -> Result<AccountSnapshot> {
        let started = Instant::now();

        let mut filters = vec![RpcFilterType::DataSize(layout.account_len as u64)];
        if let Some(discriminator) = layout.discriminator {
            filters.push(RpcFilterType::Memcmp(Memcmp::new_base58_encoded(0, &discriminator)));
        }

        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .rpc_client
            .get_program_accounts_with_config(&self.program_id, config)
            .with_context(|| format!("getProgramAccounts failed for {}", self.program_id))?;

        let fetched_at = chrono::Utc::now().timestamp().max(0) as u64;
        let snapshot = build_snapshot(&self.program_id, layout, variant, accounts, fetched_at)?;

        info!(
            "✅ fetched {} voter accounts in {:.2}s",
            snapshot.accounts.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(snapshot)
    }

    pub fn fetch_registrar(&self, registrar: &Pubkey, mint_index: usize) -> Result<RegistrarConfig> {
        let data = self
            .rpc_client
            .get_account_data(registrar)
            .with_context(|| format!("failed to fetch registrar {}", registrar))?;
        debug!(registrar = %registrar, len = data.len(), "registrar account fetched");

        let config = RegistrarConfig::from_account_data(&data, mint_index)?;
        info!(
            "Registrar {}: baseline {:.3}x, max extra {:.3}x, saturation {}s, digit shift {}",
            registrar,
            config.baseline_weight(),
            config.max_extra_weight(),
            config.lockup_saturation_secs,
            config.digit_shift
        );
        Ok(config)
    }
}

/// Wrap the RPC result into a snapshot; no accounts at all is fatal
fn build_snapshot(
    program_id: &Pubkey,
    layout: &VoterLayout,
    variant: &LayoutVariant,
    accounts: Vec<(Pubkey, Account)>,
    fetched_at: u64,
) -> Result<AccountSnapshot> {
    if accounts.is_empty() {
        bail!(
            "program {} returned no accounts of {} bytes (layout '{}')",
            program_id,
            layout.account_len,
            layout.name
        );
    }

    let raw = accounts
        .into_iter()
        .map(|(address, account)| RawAccount::new(address.to_string(), account.data, variant.clone()))
        .collect();
    Ok(AccountSnapshot::new(fetched_at, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(data: Vec<u8>) -> Account {
        Account {
            lamports: 1,
            data,
            owner: Pubkey::new_unique(),
            executable: false,
            rent_epoch: 0,
        }
    }

    #[test]
    fn test_empty_program_accounts_is_fatal() {
        let layout = VoterLayout::island_scan();
        let err = build_snapshot(&Pubkey::new_unique(), &layout, &LayoutVariant::IslandScan, Vec::new(), 1)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("no accounts"));
        assert!(msg.contains("2728"));
    }

    #[test]
    fn test_snapshot_keeps_raw_bytes() {
        let layout = VoterLayout::island_scan();
        let key = Pubkey::new_unique();
        let snapshot = build_snapshot(
            &Pubkey::new_unique(),
            &layout,
            &LayoutVariant::IslandScan,
            vec![(key, account(vec![7u8; 16]))],
            1_700_000_000,
        )
        .unwrap();
        assert_eq!(snapshot.fetched_at, 1_700_000_000);
        assert_eq!(snapshot.accounts[0].address, key.to_string());
        assert_eq!(snapshot.accounts[0].data, vec![7u8; 16]);
        assert_eq!(snapshot.accounts[0].layout, LayoutVariant::IslandScan);
    }
}
