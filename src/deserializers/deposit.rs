use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::{DepositSlot, VoterLayout};
use crate::vsr_interface::SlotRejection;

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_MONTH: u64 = 30 * SECONDS_PER_DAY;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// On-chain `LockupKind` tag (0..=4, in program order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockupKind {
    None,
    Daily,
    Monthly,
    Cliff,
    Constant,
}

impl LockupKind {
    /// Unknown tags are read as `None` (no lockup)
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            1 => LockupKind::Daily,
            2 => LockupKind::Monthly,
            3 => LockupKind::Cliff,
            4 => LockupKind::Constant,
            _ => LockupKind::None,
        }
    }

    /// Vesting period length for periodic kinds
    pub fn period_secs(&self) -> Option<u64> {
        match self {
            LockupKind::Daily => Some(SECONDS_PER_DAY),
            LockupKind::Monthly => Some(SECONDS_PER_MONTH),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lockup {
    pub start_ts: u64,
    pub end_ts: u64,
    pub kind: LockupKind,
}

impl Lockup {
    pub fn none() -> Self {
        Self {
            start_ts: 0,
            end_ts: 0,
            kind: LockupKind::None,
        }
    }

    pub fn is_active(&self, now: u64) -> bool {
        self.kind != LockupKind::None && self.end_ts > now
    }

    pub fn seconds_left(&self, now: u64) -> u64 {
        self.end_ts.saturating_sub(now)
    }
}

/// One accepted deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositRecord {
    /// Offset of the amount field inside the account
    pub slot_offset: usize,
    /// Native units (display = native / 10^decimals)
    pub amount_native: u64,
    pub lockup: Lockup,
    pub is_used: bool,
    /// Lockup metadata was present but outside the plausible window
    pub lockup_discarded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RejectedSlot {
    pub offset: usize,
    pub amount_native: u64,
    pub reason: SlotRejection,
}

/// Result of walking one account's slot table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepositExtraction {
    pub deposits: Vec<DepositRecord>,
    pub rejected: Vec<RejectedSlot>,
}

/// Sanity filters applied to every candidate slot
///
/// Amount bounds and sentinels are expressed in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositFilter {
    pub token_decimals: u32,
    pub min_amount: f64,
    pub max_amount: f64,
    /// Display amounts that show up in uninitialised regions
    pub phantom_sentinels: Vec<u64>,
    /// Bytes after the amount field that must be zero for a sentinel to be a phantom
    pub phantom_trailing_bytes: usize,
    /// Precision (decimal places) used for duplicate suppression
    pub dedup_decimals: u32,
    pub max_past_years: u64,
    pub max_future_years: u64,
}

impl Default for DepositFilter {
    fn default() -> Self {
        Self {
            token_decimals: 6,
            min_amount: 1.0,
            max_amount: 50_000_000.0,
            phantom_sentinels: vec![1_000, 11_000],
            phantom_trailing_bytes: 16,
            dedup_decimals: 6,
            max_past_years: 5,
            max_future_years: 10,
        }
    }
}

impl DepositFilter {
    pub fn to_display(&self, amount_native: u64) -> f64 {
        amount_native as f64 / 10f64.powi(self.token_decimals as i32)
    }

    fn in_range(&self, amount_native: u64) -> bool {
        if amount_native == 0 {
            return false;
        }
        let display = self.to_display(amount_native);
        display >= self.min_amount && display <= self.max_amount
    }

    fn is_sentinel(&self, amount_native: u64) -> bool {
        let unit = 10u64.saturating_pow(self.token_decimals);
        self.phantom_sentinels
            .iter()
            .any(|s| s.checked_mul(unit) == Some(amount_native))
    }

    fn trailing_bytes_zero(&self, data: &[u8], amount_end: usize) -> bool {
        let start = amount_end.min(data.len());
        let end = amount_end.saturating_add(self.phantom_trailing_bytes).min(data.len());
        data[start..end].iter().all(|&b| b == 0)
    }

    /// Rounded key for duplicate suppression
    pub fn dedup_key(&self, amount_native: u64) -> u64 {
        if self.dedup_decimals >= self.token_decimals {
            return amount_native;
        }
        let divisor = 10u64.saturating_pow(self.token_decimals - self.dedup_decimals);
        amount_native / divisor + u64::from(amount_native % divisor >= divisor / 2 + divisor % 2)
    }

    fn plausible_window(&self, now: u64) -> (u64, u64) {
        (
            now.saturating_sub(self.max_past_years.saturating_mul(SECONDS_PER_YEAR)),
            now.saturating_add(self.max_future_years.saturating_mul(SECONDS_PER_YEAR)),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_amount > self.max_amount {
            return Err(format!(
                "min_amount {} exceeds max_amount {}",
                self.min_amount, self.max_amount
            ));
        }
        if self.token_decimals > 18 {
            return Err(format!("token_decimals {} is out of range", self.token_decimals));
        }
        Ok(())
    }
}

/// Walk the layout's slot table and keep the slots that pass every filter
///
/// Order per slot: bounds, range, phantom, `is_used`, duplicate. Unused slots
/// are dropped before deduplication so a stale copy never shadows a live one.
/// A fallback slot is skipped outright once its primary slot produced a deposit.
pub fn extract_deposits(
    data: &[u8],
    layout: &VoterLayout,
    filter: &DepositFilter,
    now: u64,
) -> DepositExtraction {
    let mut extraction = DepositExtraction::default();
    let mut seen = HashSet::new();
    let mut accepted = HashSet::new();

    for slot in &layout.slots {
        let offset = slot.amount.offset;
        if let Some(primary) = slot.fallback_for {
            if accepted.contains(&primary) {
                continue;
            }
        }
        let reject = |amount_native: u64, reason: SlotRejection| RejectedSlot {
            offset,
            amount_native,
            reason,
        };

        let amount_native = match slot.amount.read_u64(data) {
            Some(v) => v,
            None => {
                extraction.rejected.push(reject(0, SlotRejection::OutOfBounds));
                continue;
            }
        };

        if !filter.in_range(amount_native) {
            // zero slots are the common case, keep them out of the audit list
            if amount_native != 0 {
                extraction.rejected.push(reject(amount_native, SlotRejection::OutOfRangeAmount));
            }
            continue;
        }

        if filter.is_sentinel(amount_native) && filter.trailing_bytes_zero(data, slot.amount.end()) {
            debug!(offset, amount_native, "phantom deposit skipped");
            extraction.rejected.push(reject(amount_native, SlotRejection::PhantomDeposit));
            continue;
        }

        let is_used = match &slot.is_used {
            Some(flag) => flag.read_bool(data).unwrap_or(false),
            None => true,
        };
        if !is_used {
            extraction.rejected.push(reject(amount_native, SlotRejection::UnusedSlot));
            continue;
        }

        if !seen.insert(filter.dedup_key(amount_native)) {
            debug!(offset, amount_native, "duplicate amount skipped");
            extraction.rejected.push(reject(amount_native, SlotRejection::DuplicateAmount));
            continue;
        }

        let (lockup, lockup_discarded) = read_lockup(data, slot, filter, now);
        accepted.insert(offset);

        extraction.deposits.push(DepositRecord {
            slot_offset: offset,
            amount_native,
            lockup,
            is_used,
            lockup_discarded,
        });
    }

    extraction
}

/// Lockup for a slot, or `Lockup::none()` when absent or implausible
fn read_lockup(data: &[u8], slot: &DepositSlot, filter: &DepositFilter, now: u64) -> (Lockup, bool) {
    let spec = match &slot.lockup {
        Some(spec) => spec,
        None => return (Lockup::none(), false),
    };

    let (start_ts, end_ts, tag) = match (
        spec.start.read_u64(data),
        spec.end.read_u64(data),
        spec.kind.read_u8(data),
    ) {
        (Some(start), Some(end), Some(tag)) => (start, end, tag),
        _ => return (Lockup::none(), true),
    };

    let kind = LockupKind::from_tag(tag);
    if kind == LockupKind::None {
        return (Lockup::none(), false);
    }

    let (lo, hi) = filter.plausible_window(now);
    let plausible = |ts: u64| ts >= lo && ts <= hi;
    if !plausible(start_ts) || !plausible(end_ts) || end_ts <= start_ts {
        debug!(
            offset = slot.amount.offset,
            start_ts, end_ts, "lockup window implausible, using baseline"
        );
        return (Lockup::none(), true);
    }

    (Lockup { start_ts, end_ts, kind }, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::VoterLayout;

    const NOW: u64 = 1_700_000_000;
    const UNIT: u64 = 1_000_000;

    fn write_u64(data: &mut [u8], offset: usize, value: u64) {
        data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// VSR entry `i` of an anchor-vsr buffer
    fn put_entry(data: &mut [u8], i: usize, amount: u64, kind: u8, start: u64, end: u64) {
        let base = 72 + i * 80;
        write_u64(data, base, start);
        write_u64(data, base + 8, end);
        data[base + 16] = kind;
        write_u64(data, base + 32, amount);
        data[base + 48] = 1;
    }

    #[test]
    fn test_lockup_kind_tags() {
        assert_eq!(LockupKind::from_tag(0), LockupKind::None);
        assert_eq!(LockupKind::from_tag(1), LockupKind::Daily);
        assert_eq!(LockupKind::from_tag(3), LockupKind::Cliff);
        assert_eq!(LockupKind::from_tag(200), LockupKind::None);
        assert_eq!(LockupKind::Monthly.period_secs(), Some(SECONDS_PER_MONTH));
        assert_eq!(LockupKind::Cliff.period_secs(), None);
    }

    #[test]
    fn test_extracts_locked_entry() {
        let layout = VoterLayout::anchor_vsr();
        let mut data = vec![0u8; 2728];
        put_entry(&mut data, 2, 5_000 * UNIT, 3, NOW - 100, NOW + 1_000);

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert_eq!(out.deposits.len(), 1);
        let d = &out.deposits[0];
        assert_eq!(d.slot_offset, 72 + 2 * 80 + 32);
        assert_eq!(d.lockup.kind, LockupKind::Cliff);
        assert!(d.lockup.is_active(NOW));
        assert!(!d.lockup_discarded);
    }

    #[test]
    fn test_out_of_range_amounts_rejected() {
        let layout = VoterLayout::anchor_vsr();
        let mut data = vec![0u8; 2728];
        put_entry(&mut data, 0, 60_000_000 * UNIT, 0, 0, 0);
        put_entry(&mut data, 1, UNIT / 2, 0, 0, 0);

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert!(out.deposits.is_empty());
        assert_eq!(out.rejected.len(), 2);
        assert!(out.rejected.iter().all(|r| r.reason == SlotRejection::OutOfRangeAmount));
    }

    #[test]
    fn test_sentinel_with_zero_tail_is_phantom() {
        let layout = VoterLayout::island_scan();
        let mut data = vec![0u8; 2728];
        // entry 2 amount at 264, nothing else set
        write_u64(&mut data, 264, 1_000 * UNIT);

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert!(out.deposits.is_empty());
        assert_eq!(out.rejected[0].reason, SlotRejection::PhantomDeposit);
        assert_eq!(out.rejected[0].offset, 264);
    }

    #[test]
    fn test_sentinel_with_live_flag_is_kept() {
        let layout = VoterLayout::anchor_vsr();
        let mut data = vec![0u8; 2728];
        put_entry(&mut data, 0, 1_000 * UNIT, 0, 0, 0);

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert_eq!(out.deposits.len(), 1);
        assert_eq!(out.deposits[0].amount_native, 1_000 * UNIT);
    }

    #[test]
    fn test_unused_slot_skipped() {
        let layout = VoterLayout::anchor_vsr();
        let mut data = vec![0u8; 2728];
        put_entry(&mut data, 0, 42 * UNIT, 0, 0, 0);
        data[72 + 48] = 0;

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert!(out.deposits.is_empty());
        assert_eq!(out.rejected[0].reason, SlotRejection::UnusedSlot);
    }

    #[test]
    fn test_initially_locked_copy_skipped_when_primary_counts() {
        let layout = VoterLayout::island_scan();
        let mut data = vec![0u8; 2728];
        // partial withdrawal: deposited 60,000 of an initial 100,000
        write_u64(&mut data, 104, 60_000 * UNIT);
        write_u64(&mut data, 112, 100_000 * UNIT);
        data[120] = 1;

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert_eq!(out.deposits.len(), 1);
        assert_eq!(out.deposits[0].slot_offset, 104);
        assert_eq!(out.deposits[0].amount_native, 60_000 * UNIT);
        assert!(out.rejected.iter().all(|r| r.offset != 112));
    }

    #[test]
    fn test_initially_locked_copy_respects_entry_flag() {
        let layout = VoterLayout::island_scan();
        let mut data = vec![0u8; 2728];
        write_u64(&mut data, 112, 5_000 * UNIT);

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert!(out.deposits.is_empty());
        assert_eq!(out.rejected[0].offset, 112);
        assert_eq!(out.rejected[0].reason, SlotRejection::UnusedSlot);

        data[120] = 1;
        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert_eq!(out.deposits.len(), 1);
        assert_eq!(out.deposits[0].slot_offset, 112);
    }

    #[test]
    fn test_dedup_key_rounding() {
        let filter = DepositFilter {
            dedup_decimals: 2,
            ..Default::default()
        };
        // 12.345678 and 12.350000 both round to 12.35
        assert_eq!(filter.dedup_key(12_345_678), filter.dedup_key(12_350_000));
        assert_ne!(filter.dedup_key(12_344_999), filter.dedup_key(12_350_000));
        assert_eq!(DepositFilter::default().dedup_key(12_345_678), 12_345_678);
    }

    #[test]
    fn test_implausible_lockup_falls_back_to_none() {
        let layout = VoterLayout::anchor_vsr();
        let mut data = vec![0u8; 2728];
        // ends 50 years out
        put_entry(&mut data, 0, 10 * UNIT, 3, NOW, NOW + 50 * SECONDS_PER_YEAR);
        // end before start
        put_entry(&mut data, 1, 20 * UNIT, 3, NOW + 10, NOW + 5);

        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert_eq!(out.deposits.len(), 2);
        for d in &out.deposits {
            assert_eq!(d.lockup, Lockup::none());
            assert!(d.lockup_discarded);
        }
    }

    #[test]
    fn test_short_buffer_slots_out_of_bounds() {
        let layout = VoterLayout::anchor_vsr();
        let data = vec![0u8; 200];
        let out = extract_deposits(&data, &layout, &DepositFilter::default(), NOW);
        assert!(out.deposits.is_empty());
        assert!(out.rejected.iter().any(|r| r.reason == SlotRejection::OutOfBounds));
    }

    #[test]
    fn test_filter_validation() {
        let filter = DepositFilter {
            min_amount: 10.0,
            max_amount: 1.0,
            ..Default::default()
        };
        assert!(filter.validate().is_err());
        assert!(DepositFilter::default().validate().is_ok());
    }
}
