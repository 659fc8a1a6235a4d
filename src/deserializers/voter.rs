use solana_sdk::pubkey::Pubkey;

use crate::deserializers::deposit::{extract_deposits, DepositFilter, DepositRecord, RejectedSlot};
use crate::layout::{VoterLayout, ANCHOR_DISCRIMINATOR_LEN};
use crate::vsr_interface::DecodeError;

/// Header fields of a voter record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoterHeader {
    pub authority: Pubkey,
    pub voter_authority: Pubkey,
}

/// Check length and discriminator, then read the two authority keys
///
/// Offsets come from the layout only; a buffer that does not match is
/// rejected rather than probed.
pub fn read_header(address: &str, data: &[u8], layout: &VoterLayout) -> Result<VoterHeader, DecodeError> {
    let too_short = || DecodeError::AccountTooShort {
        address: address.to_string(),
        layout: layout.name.clone(),
        expected: layout.account_len,
        actual: data.len(),
    };

    if data.len() < layout.account_len {
        return Err(too_short());
    }

    if let Some(expected) = layout.discriminator {
        let mut found = [0u8; ANCHOR_DISCRIMINATOR_LEN];
        found.copy_from_slice(&data[..ANCHOR_DISCRIMINATOR_LEN]);
        if found != expected {
            return Err(DecodeError::DiscriminatorMismatch {
                address: address.to_string(),
                layout: layout.name.clone(),
                found,
            });
        }
    }

    let authority = layout.authority.read_pubkey(data).ok_or_else(too_short)?;
    let voter_authority = layout.voter_authority.read_pubkey(data).ok_or_else(too_short)?;

    Ok(VoterHeader {
        authority,
        voter_authority,
    })
}

/// Decoded voter account
///
/// Read-only view of one account at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct VoterAccount {
    pub address: String,
    pub layout: String,
    /// Owner of the deposits (native power)
    pub authority: Pubkey,
    /// Holder of the voting rights; differs from `authority` on delegation
    pub voter_authority: Pubkey,
    pub deposits: Vec<DepositRecord>,
    pub rejected_slots: Vec<RejectedSlot>,
}

impl VoterAccount {
    pub fn from_account_data(
        address: &str,
        data: &[u8],
        layout: &VoterLayout,
        filter: &DepositFilter,
        now: u64,
    ) -> Result<Self, DecodeError> {
        let header = read_header(address, data, layout)?;
        let extraction = extract_deposits(data, layout, filter, now);

        Ok(Self {
            address: address.to_string(),
            layout: layout.name.clone(),
            authority: header.authority,
            voter_authority: header.voter_authority,
            deposits: extraction.deposits,
            rejected_slots: extraction.rejected,
        })
    }

    pub fn is_delegated(&self) -> bool {
        self.authority != self.voter_authority
    }

    pub fn total_deposited_native(&self) -> u64 {
        self.deposits.iter().map(|d| d.amount_native).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{VOTER_ACCOUNT_LEN, VOTER_DISCRIMINATOR};

    const NOW: u64 = 1_700_000_000;

    fn island_buffer(authority: [u8; 32], voter_authority: [u8; 32]) -> Vec<u8> {
        let mut data = vec![0u8; VOTER_ACCOUNT_LEN];
        data[..8].copy_from_slice(&VOTER_DISCRIMINATOR);
        data[8..40].copy_from_slice(&authority);
        data[72..104].copy_from_slice(&voter_authority);
        data
    }

    #[test]
    fn test_reads_authorities_at_layout_offsets() {
        let data = island_buffer([3u8; 32], [4u8; 32]);
        let header = read_header("acc", &data, &VoterLayout::island_scan()).unwrap();
        assert_eq!(header.authority, Pubkey::new_from_array([3u8; 32]));
        assert_eq!(header.voter_authority, Pubkey::new_from_array([4u8; 32]));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let data = island_buffer([3u8; 32], [3u8; 32]);
        let err = read_header("acc", &data[..2000], &VoterLayout::island_scan()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::AccountTooShort {
                address: "acc".to_string(),
                layout: "island-scan".to_string(),
                expected: 2728,
                actual: 2000,
            }
        );
    }

    #[test]
    fn test_empty_buffer_rejected() {
        let err = read_header("acc", &[], &VoterLayout::anchor_vsr()).unwrap_err();
        assert!(err.is_malformed_account());
    }

    #[test]
    fn test_discriminator_mismatch_rejected() {
        let mut data = island_buffer([3u8; 32], [3u8; 32]);
        data[0] ^= 0xFF;
        let err = read_header("acc", &data, &VoterLayout::island_scan()).unwrap_err();
        assert!(matches!(err, DecodeError::DiscriminatorMismatch { .. }));
    }

    #[test]
    fn test_delegation_flag() {
        let data = island_buffer([3u8; 32], [4u8; 32]);
        let voter = VoterAccount::from_account_data(
            "acc",
            &data,
            &VoterLayout::island_scan(),
            &DepositFilter::default(),
            NOW,
        )
        .unwrap();
        assert!(voter.is_delegated());
        assert!(voter.deposits.is_empty());
        assert_eq!(voter.total_deposited_native(), 0);
    }
}
