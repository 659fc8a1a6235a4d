/*!
 * Voter Account Layouts
 *
 * 每种布局都是一张声明式字段表（字段名、偏移、宽度、解释方式），
 * 解码器只根据这张表读取数据，不在运行时猜测偏移。
 *
 * Built-in variants:
 * - `island-scan`: the scan table the governance scripts settled on
 *   (authority @ 8, voter authority @ 72, amounts @ 104, 112, 184, 264, ...)
 * - `anchor-vsr`: the canonical Anchor `Voter` struct, 32 entries of 80 bytes
 *
 * Anything else comes from `[[layout.custom]]` in the config file.
 */

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::vsr_interface::DecodeError;

pub const ANCHOR_DISCRIMINATOR_LEN: usize = 8;

/// sha256("account:Voter")[..8]
pub const VOTER_DISCRIMINATOR: [u8; 8] = [241, 93, 35, 191, 254, 147, 17, 202];

/// 8 + 32 + 32 + 32 * 80 + 2 + 94
pub const VOTER_ACCOUNT_LEN: usize = 2728;

pub const DEPOSIT_ENTRIES_OFFSET: usize = 72;
pub const DEPOSIT_ENTRY_LEN: usize = 80;
pub const MAX_DEPOSIT_ENTRIES: usize = 32;

/// Deposit entries the scan table walks (entry 0 is read through the 104/112 pair)
const ISLAND_SCAN_ENTRIES: usize = 8;

/// How the bytes of a field are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Pubkey,
    U64,
    U8,
    Bool,
}

impl FieldKind {
    pub fn width(&self) -> usize {
        match self {
            FieldKind::Pubkey => 32,
            FieldKind::U64 => 8,
            FieldKind::U8 | FieldKind::Bool => 1,
        }
    }
}

/// One named field at a fixed byte offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub offset: usize,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, offset: usize, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            offset,
            kind,
        }
    }

    /// Exclusive end offset
    pub fn end(&self) -> usize {
        self.offset + self.kind.width()
    }

    pub fn slice<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        data.get(self.offset..self.end())
    }

    pub fn read_u64(&self, data: &[u8]) -> Option<u64> {
        let bytes: [u8; 8] = data.get(self.offset..self.offset + 8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    pub fn read_u8(&self, data: &[u8]) -> Option<u8> {
        data.get(self.offset).copied()
    }

    pub fn read_bool(&self, data: &[u8]) -> Option<bool> {
        self.read_u8(data).map(|b| b != 0)
    }

    pub fn read_pubkey(&self, data: &[u8]) -> Option<Pubkey> {
        let bytes: [u8; 32] = data.get(self.offset..self.offset + 32)?.try_into().ok()?;
        Some(Pubkey::new_from_array(bytes))
    }

    fn expect_kind(&self, layout: &str, kinds: &[FieldKind]) -> Result<(), DecodeError> {
        if kinds.contains(&self.kind) {
            Ok(())
        } else {
            Err(DecodeError::InvalidLayout {
                layout: layout.to_string(),
                reason: format!("field '{}' has kind {:?}, expected one of {:?}", self.name, self.kind, kinds),
            })
        }
    }
}

/// Lockup metadata carried by a deposit slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockupSpec {
    pub start: FieldSpec,
    pub end: FieldSpec,
    pub kind: FieldSpec,
}

/// One entry of a layout's deposit-slot table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositSlot {
    pub amount: FieldSpec,
    #[serde(default)]
    pub lockup: Option<LockupSpec>,
    #[serde(default)]
    pub is_used: Option<FieldSpec>,
    /// Amount offset of the primary slot this one stands in for; the slot is
    /// read only when the primary produced no deposit
    #[serde(default)]
    pub fallback_for: Option<usize>,
}

impl DepositSlot {
    /// Bare amount with no metadata
    pub fn amount_only(offset: usize) -> Self {
        Self {
            amount: FieldSpec::new("amount_deposited_native", offset, FieldKind::U64),
            lockup: None,
            is_used: None,
            fallback_for: None,
        }
    }

    /// Full VSR `DepositEntry` starting at `base`
    ///
    /// ```text
    /// +0  lockup.start_ts      i64
    /// +8  lockup.end_ts        i64
    /// +16 lockup.kind          u8   (+15 reserved)
    /// +32 amount_deposited     u64
    /// +40 amount_initially_locked u64
    /// +48 is_used              bool
    /// ```
    pub fn vsr_entry(base: usize) -> Self {
        Self {
            amount: FieldSpec::new("amount_deposited_native", base + 32, FieldKind::U64),
            lockup: Some(LockupSpec {
                start: FieldSpec::new("lockup_start_ts", base, FieldKind::U64),
                end: FieldSpec::new("lockup_end_ts", base + 8, FieldKind::U64),
                kind: FieldSpec::new("lockup_kind", base + 16, FieldKind::U8),
            }),
            is_used: Some(FieldSpec::new("is_used", base + 48, FieldKind::Bool)),
            fallback_for: None,
        }
    }

    pub fn with_is_used(mut self, offset: usize) -> Self {
        self.is_used = Some(FieldSpec::new("is_used", offset, FieldKind::Bool));
        self
    }

    pub fn fallback_for(mut self, primary_offset: usize) -> Self {
        self.fallback_for = Some(primary_offset);
        self
    }

    fn fields(&self) -> Vec<&FieldSpec> {
        let mut fields = vec![&self.amount];
        if let Some(lockup) = &self.lockup {
            fields.extend([&lockup.start, &lockup.end, &lockup.kind]);
        }
        if let Some(flag) = &self.is_used {
            fields.push(flag);
        }
        fields
    }
}

/// Declarative schema of one voter account variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterLayout {
    pub name: String,
    /// Minimum buffer length accepted for this variant
    pub account_len: usize,
    #[serde(default)]
    pub discriminator: Option<[u8; 8]>,
    pub authority: FieldSpec,
    pub voter_authority: FieldSpec,
    pub slots: Vec<DepositSlot>,
}

impl VoterLayout {
    /// Scan table used by the governance-power scripts
    ///
    /// Voter authority is read at 72, which overlaps the lockup header of the
    /// first entry, so that entry is read as a bare amount at 104 and only its
    /// flag byte (120) is trusted. The initially-locked copy at 112 shares that
    /// flag and is read only when 104 yields nothing.
    pub fn island_scan() -> Self {
        let mut slots = vec![
            DepositSlot::amount_only(104).with_is_used(120),
            DepositSlot::amount_only(112).with_is_used(120).fallback_for(104),
        ];
        for i in 1..ISLAND_SCAN_ENTRIES {
            slots.push(DepositSlot::vsr_entry(DEPOSIT_ENTRIES_OFFSET + i * DEPOSIT_ENTRY_LEN));
        }

        Self {
            name: LayoutVariant::IslandScan.to_string(),
            account_len: VOTER_ACCOUNT_LEN,
            discriminator: Some(VOTER_DISCRIMINATOR),
            authority: FieldSpec::new("authority", 8, FieldKind::Pubkey),
            voter_authority: FieldSpec::new("voter_authority", 72, FieldKind::Pubkey),
            slots,
        }
    }

    /// Canonical Anchor `Voter` (voter_authority @ 8, registrar @ 40, entries @ 72)
    ///
    /// This variant has a single authority field, so native and voting
    /// authority are the same key and it never produces delegated power.
    pub fn anchor_vsr() -> Self {
        let slots = (0..MAX_DEPOSIT_ENTRIES)
            .map(|i| DepositSlot::vsr_entry(DEPOSIT_ENTRIES_OFFSET + i * DEPOSIT_ENTRY_LEN))
            .collect();

        Self {
            name: LayoutVariant::AnchorVsr.to_string(),
            account_len: VOTER_ACCOUNT_LEN,
            discriminator: Some(VOTER_DISCRIMINATOR),
            authority: FieldSpec::new("voter_authority", 8, FieldKind::Pubkey),
            voter_authority: FieldSpec::new("voter_authority", 8, FieldKind::Pubkey),
            slots,
        }
    }

    /// Largest field end offset (including the discriminator)
    pub fn required_len(&self) -> usize {
        let mut end = if self.discriminator.is_some() { ANCHOR_DISCRIMINATOR_LEN } else { 0 };
        end = end.max(self.authority.end()).max(self.voter_authority.end());
        for slot in &self.slots {
            for field in slot.fields() {
                end = end.max(field.end());
            }
        }
        end
    }

    pub fn slot_offsets(&self) -> Vec<usize> {
        self.slots.iter().map(|s| s.amount.offset).collect()
    }

    /// Structural checks for layouts loaded from config
    pub fn validate(&self) -> Result<(), DecodeError> {
        let invalid = |reason: String| DecodeError::InvalidLayout {
            layout: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("layout name is empty".to_string()));
        }
        if self.slots.is_empty() {
            return Err(invalid("deposit slot table is empty".to_string()));
        }

        let required = self.required_len();
        if self.account_len < required {
            return Err(invalid(format!(
                "account_len {} is smaller than the last field end {}",
                self.account_len, required
            )));
        }

        self.authority.expect_kind(&self.name, &[FieldKind::Pubkey])?;
        self.voter_authority.expect_kind(&self.name, &[FieldKind::Pubkey])?;
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(primary) = slot.fallback_for {
                if !self.slots[..i].iter().any(|s| s.amount.offset == primary) {
                    return Err(invalid(format!(
                        "slot @{} falls back to @{}, which is not an earlier slot",
                        slot.amount.offset, primary
                    )));
                }
            }
            slot.amount.expect_kind(&self.name, &[FieldKind::U64])?;
            if let Some(lockup) = &slot.lockup {
                lockup.start.expect_kind(&self.name, &[FieldKind::U64])?;
                lockup.end.expect_kind(&self.name, &[FieldKind::U64])?;
                lockup.kind.expect_kind(&self.name, &[FieldKind::U8])?;
            }
            if let Some(flag) = &slot.is_used {
                flag.expect_kind(&self.name, &[FieldKind::Bool, FieldKind::U8])?;
            }
        }

        Ok(())
    }
}

/// Layout a raw account is declared to use
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayoutVariant {
    IslandScan,
    AnchorVsr,
    Custom(String),
}

impl LayoutVariant {
    pub fn name(&self) -> &str {
        match self {
            LayoutVariant::IslandScan => "island-scan",
            LayoutVariant::AnchorVsr => "anchor-vsr",
            LayoutVariant::Custom(name) => name,
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LayoutVariant {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "island-scan" | "island_scan" => LayoutVariant::IslandScan,
            "anchor-vsr" | "anchor_vsr" => LayoutVariant::AnchorVsr,
            _ => LayoutVariant::Custom(s.to_string()),
        })
    }
}

/// Named layouts available to the decoder
#[derive(Debug, Clone)]
pub struct LayoutRegistry {
    layouts: HashMap<String, VoterLayout>,
}

impl LayoutRegistry {
    /// Registry holding the two built-in variants
    pub fn with_builtin() -> Self {
        let mut layouts = HashMap::new();
        for layout in [VoterLayout::island_scan(), VoterLayout::anchor_vsr()] {
            layouts.insert(layout.name.clone(), layout);
        }
        Self { layouts }
    }

    /// Add (or replace) a layout after validating it
    pub fn register(&mut self, layout: VoterLayout) -> Result<(), DecodeError> {
        layout.validate()?;
        self.layouts.insert(layout.name.clone(), layout);
        Ok(())
    }

    pub fn resolve(&self, variant: &LayoutVariant) -> Result<&VoterLayout, DecodeError> {
        self.layouts
            .get(variant.name())
            .ok_or_else(|| DecodeError::UnknownLayout(variant.name().to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.layouts.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layouts_validate() {
        VoterLayout::island_scan().validate().unwrap();
        VoterLayout::anchor_vsr().validate().unwrap();
        // last declared field is entry 31's is_used flag
        assert_eq!(VoterLayout::anchor_vsr().required_len(), 72 + 31 * 80 + 49);
        assert_eq!(VoterLayout::island_scan().required_len(), 72 + 7 * 80 + 49);
    }

    #[test]
    fn test_island_scan_offsets() {
        let layout = VoterLayout::island_scan();
        let offsets = layout.slot_offsets();
        assert_eq!(&offsets[..5], &[104, 112, 184, 264, 344]);
        assert_eq!(layout.authority.offset, 8);
        assert_eq!(layout.voter_authority.offset, 72);
    }

    #[test]
    fn test_vsr_entry_geometry() {
        let slot = DepositSlot::vsr_entry(152);
        let lockup = slot.lockup.unwrap();
        assert_eq!(slot.amount.offset, 184);
        assert_eq!(lockup.start.offset, 152);
        assert_eq!(lockup.end.offset, 160);
        assert_eq!(lockup.kind.offset, 168);
        assert_eq!(slot.is_used.unwrap().offset, 200);
    }

    #[test]
    fn test_validate_rejects_short_account_len() {
        let mut layout = VoterLayout::island_scan();
        layout.name = "too-small".to_string();
        layout.account_len = 200;
        let err = layout.validate().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidLayout { .. }));
    }

    #[test]
    fn test_island_scan_initially_locked_copy_is_fallback() {
        let layout = VoterLayout::island_scan();
        let copy = &layout.slots[1];
        assert_eq!(copy.amount.offset, 112);
        assert_eq!(copy.is_used.as_ref().map(|f| f.offset), Some(120));
        assert_eq!(copy.fallback_for, Some(104));
    }

    #[test]
    fn test_validate_rejects_dangling_fallback() {
        let mut layout = VoterLayout::island_scan();
        layout.slots[1].fallback_for = Some(999);
        assert!(matches!(layout.validate(), Err(DecodeError::InvalidLayout { .. })));
    }

    #[test]
    fn test_validate_rejects_wrong_kind() {
        let mut layout = VoterLayout::anchor_vsr();
        layout.slots[0].amount.kind = FieldKind::Pubkey;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_field_reads_are_bounds_checked() {
        let data = vec![0xFFu8; 10];
        let field = FieldSpec::new("amount", 4, FieldKind::U64);
        assert_eq!(field.read_u64(&data), None);
        let field = FieldSpec::new("amount", 2, FieldKind::U64);
        assert_eq!(field.read_u64(&data), Some(u64::MAX));
    }

    #[test]
    fn test_registry_resolution() {
        let registry = LayoutRegistry::with_builtin();
        assert!(registry.resolve(&LayoutVariant::IslandScan).is_ok());
        assert!(registry.resolve(&"ANCHOR-VSR".parse::<LayoutVariant>().unwrap()).is_ok());
        let err = registry.resolve(&LayoutVariant::Custom("mystery".into())).unwrap_err();
        assert_eq!(err, DecodeError::UnknownLayout("mystery".to_string()));
    }
}
