//! Shared builders for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytemuck::{Pod, Zeroable};
use solana_sdk::pubkey::Pubkey;
use vsr_voting_power::layout::{
    DEPOSIT_ENTRIES_OFFSET, DEPOSIT_ENTRY_LEN, VOTER_ACCOUNT_LEN, VOTER_DISCRIMINATOR,
};

pub const NOW: u64 = 1_700_000_000;
pub const UNIT: u64 = 1_000_000;

/// On-chain `DepositEntry` (80 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DepositEntry {
    pub start_ts: u64,
    pub end_ts: u64,
    pub kind: u8,
    pub lockup_reserved: [u8; 15],
    pub amount_deposited_native: u64,
    pub amount_initially_locked_native: u64,
    pub is_used: u8,
    pub allow_clawback: u8,
    pub voting_mint_config_idx: u8,
    pub reserved: [u8; 29],
}

impl DepositEntry {
    pub fn unlocked(amount_native: u64) -> Self {
        Self {
            amount_deposited_native: amount_native,
            amount_initially_locked_native: amount_native,
            is_used: 1,
            ..Zeroable::zeroed()
        }
    }

    pub fn locked(amount_native: u64, kind: u8, start_ts: u64, end_ts: u64) -> Self {
        Self {
            start_ts,
            end_ts,
            kind,
            ..Self::unlocked(amount_native)
        }
    }

    pub fn unused(mut self) -> Self {
        self.is_used = 0;
        self
    }
}

pub fn key(byte: u8) -> Pubkey {
    Pubkey::new_from_array([byte; 32])
}

/// Voter account bytes, zero-filled to the full account size
pub struct VoterBuilder {
    data: Vec<u8>,
}

impl VoterBuilder {
    pub fn new() -> Self {
        let mut data = vec![0u8; VOTER_ACCOUNT_LEN];
        data[..8].copy_from_slice(&VOTER_DISCRIMINATOR);
        Self { data }
    }

    pub fn authority(mut self, key: &Pubkey) -> Self {
        self.data[8..40].copy_from_slice(key.as_ref());
        self
    }

    /// Island-scan voter authority (overlaps entry 0's lockup header)
    pub fn voter_authority(mut self, key: &Pubkey) -> Self {
        self.data[72..104].copy_from_slice(key.as_ref());
        self
    }

    pub fn entry(mut self, index: usize, entry: DepositEntry) -> Self {
        let base = DEPOSIT_ENTRIES_OFFSET + index * DEPOSIT_ENTRY_LEN;
        self.data[base..base + DEPOSIT_ENTRY_LEN].copy_from_slice(bytemuck::bytes_of(&entry));
        self
    }

    /// Entry 0 amounts as seen by the island-scan table
    pub fn island_entry0(mut self, amount_native: u64, is_used: bool) -> Self {
        self.data[104..112].copy_from_slice(&amount_native.to_le_bytes());
        self.data[112..120].copy_from_slice(&amount_native.to_le_bytes());
        self.data[120] = u8::from(is_used);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

pub fn load_fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {}: {}", path.display(), e));
    STANDARD
        .decode(text.trim())
        .unwrap_or_else(|e| panic!("fixture {} is not base64: {}", path.display(), e))
}
