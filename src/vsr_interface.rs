use std::fmt;

use thiserror::Error;

use crate::deserializers::DepositRecord;
use crate::deserializers::registrar::RegistrarConfig;

/// Weighting model applied to a single deposit
///
/// The upstream program is undocumented and the known script versions disagree
/// on how vesting lockups should be weighted, so the formula sits behind this
/// trait and is selected by configuration (see `multiplier::MultiplierPolicy`).
pub trait MultiplierModel: Send + Sync {
    /// Policy name as used in config files (e.g. "linear")
    fn name(&self) -> &'static str;

    /// Multiplier for `deposit` at unix time `now`
    ///
    /// Implementations must be pure and must return a value in
    /// `[baseline, baseline + max_extra]` of the given registrar config.
    fn multiplier(&self, deposit: &DepositRecord, now: u64, registrar: &RegistrarConfig) -> f64;
}

/// Errors raised while decoding raw account bytes
///
/// Every variant is recoverable at batch level: the offending account is
/// skipped and the rest of the snapshot is still processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Buffer shorter than the layout requires
    #[error("malformed account {address}: {actual} bytes, layout '{layout}' needs at least {expected}")]
    AccountTooShort {
        address: String,
        layout: String,
        expected: usize,
        actual: usize,
    },

    /// First 8 bytes do not match the layout discriminator
    #[error("malformed account {address}: discriminator {found:?} does not match layout '{layout}'")]
    DiscriminatorMismatch {
        address: String,
        layout: String,
        found: [u8; 8],
    },

    /// Account references a layout variant nobody registered
    #[error("unknown layout variant '{0}'")]
    UnknownLayout(String),

    /// A custom layout definition is internally inconsistent
    #[error("invalid layout '{layout}': {reason}")]
    InvalidLayout { layout: String, reason: String },

    /// Registrar account could not be interpreted
    #[error("registrar unavailable: {0}")]
    RegistrarUnavailable(String),
}

impl DecodeError {
    /// True for the "MalformedAccount" family (skip the account, keep going)
    pub fn is_malformed_account(&self) -> bool {
        matches!(
            self,
            DecodeError::AccountTooShort { .. } | DecodeError::DiscriminatorMismatch { .. }
        )
    }
}

/// Why a candidate deposit slot was not counted
///
/// These are not errors, only audit entries; see `DepositExtraction::rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRejection {
    /// Zero or outside the configured sanity bounds
    OutOfRangeAmount,
    /// Sentinel amount followed by all-zero bytes
    PhantomDeposit,
    /// `is_used` flag is clear
    UnusedSlot,
    /// Same rounded amount already seen at an earlier offset
    DuplicateAmount,
    /// Slot table entry points past the end of the buffer
    OutOfBounds,
}

impl fmt::Display for SlotRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SlotRejection::OutOfRangeAmount => "out-of-range amount",
            SlotRejection::PhantomDeposit => "phantom deposit",
            SlotRejection::UnusedSlot => "unused slot",
            SlotRejection::DuplicateAmount => "duplicate amount",
            SlotRejection::OutOfBounds => "slot out of bounds",
        };
        write!(f, "{}", label)
    }
}
