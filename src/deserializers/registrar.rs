use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};

use crate::vsr_interface::DecodeError;

/// sha256("account:Registrar")[..8]
pub const REGISTRAR_DISCRIMINATOR: [u8; 8] = [193, 202, 205, 51, 78, 168, 150, 128];

/// 1.0 in the registrar's scaled-factor fixed point
pub const SCALED_FACTOR_BASE: u64 = 1_000_000_000;

/// discriminator + governance_program_id + realm + mint + realm_authority + reserved
const VOTING_MINTS_OFFSET: usize = 8 + 32 * 5;
const VOTING_MINT_CONFIG_LEN: usize = 152;
const MAX_VOTING_MINTS: usize = 4;

/// One `VotingMintConfig` entry, Borsh-encoded on chain
#[derive(Debug, Clone, BorshDeserialize)]
struct VotingMintConfigRaw {
    mint: [u8; 32],
    _grant_authority: [u8; 32],
    baseline_vote_weight_scaled_factor: u64,
    max_extra_lockup_vote_weight_scaled_factor: u64,
    lockup_saturation_secs: u64,
    digit_shift: i8,
    _reserved1: [u8; 7],
    _reserved2: [u64; 7],
}

/// Weighting parameters owned by the governing program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    pub baseline_vote_weight_scaled_factor: u64,
    pub max_extra_lockup_vote_weight_scaled_factor: u64,
    pub lockup_saturation_secs: u64,
    pub digit_shift: i8,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            baseline_vote_weight_scaled_factor: SCALED_FACTOR_BASE,
            max_extra_lockup_vote_weight_scaled_factor: 2 * SCALED_FACTOR_BASE,
            lockup_saturation_secs: 4 * 365 * 86_400,
            digit_shift: 0,
        }
    }
}

impl RegistrarConfig {
    pub fn baseline_weight(&self) -> f64 {
        self.baseline_vote_weight_scaled_factor as f64 / SCALED_FACTOR_BASE as f64
    }

    pub fn max_extra_weight(&self) -> f64 {
        self.max_extra_lockup_vote_weight_scaled_factor as f64 / SCALED_FACTOR_BASE as f64
    }

    pub fn max_multiplier(&self) -> f64 {
        self.baseline_weight() + self.max_extra_weight()
    }

    /// 10^digit_shift applied to native amounts
    pub fn digit_shift_factor(&self) -> f64 {
        10f64.powi(self.digit_shift as i32)
    }

    /// Decode the voting-mint config at `mint_index` from a registrar account
    pub fn from_account_data(data: &[u8], mint_index: usize) -> Result<Self, DecodeError> {
        if mint_index >= MAX_VOTING_MINTS {
            return Err(DecodeError::RegistrarUnavailable(format!(
                "voting mint index {} out of range (max {})",
                mint_index,
                MAX_VOTING_MINTS - 1
            )));
        }

        let start = VOTING_MINTS_OFFSET + mint_index * VOTING_MINT_CONFIG_LEN;
        let end = start + VOTING_MINT_CONFIG_LEN;
        if data.len() < end {
            return Err(DecodeError::RegistrarUnavailable(format!(
                "registrar data too short: {} bytes, need {}",
                data.len(),
                end
            )));
        }

        if data[..8] != REGISTRAR_DISCRIMINATOR {
            return Err(DecodeError::RegistrarUnavailable(
                "registrar discriminator mismatch".to_string(),
            ));
        }

        let raw = VotingMintConfigRaw::try_from_slice(&data[start..end]).map_err(|e| {
            DecodeError::RegistrarUnavailable(format!("voting mint config borsh decode failed: {}", e))
        })?;

        if raw.mint == [0u8; 32] {
            return Err(DecodeError::RegistrarUnavailable(format!(
                "voting mint slot {} is empty",
                mint_index
            )));
        }

        let config = Self {
            baseline_vote_weight_scaled_factor: raw.baseline_vote_weight_scaled_factor,
            max_extra_lockup_vote_weight_scaled_factor: raw.max_extra_lockup_vote_weight_scaled_factor,
            lockup_saturation_secs: raw.lockup_saturation_secs,
            digit_shift: raw.digit_shift,
        };
        config.validate().map_err(DecodeError::RegistrarUnavailable)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.lockup_saturation_secs == 0 {
            return Err("lockup_saturation_secs must be > 0".to_string());
        }
        if !(-18..=18).contains(&self.digit_shift) {
            return Err(format!("digit_shift {} out of range", self.digit_shift));
        }
        Ok(())
    }
}
