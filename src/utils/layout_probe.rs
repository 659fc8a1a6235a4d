///! 布局探测工具
///! 用于在布局不确定时检查原始账户数据（偏移、候选金额、十六进制转储）

use crate::deserializers::DepositFilter;
use crate::layout::VoterLayout;

/// Outcome of checking a buffer against a layout's size requirements
#[derive(Debug, Clone)]
pub struct LayoutCheck {
    pub layout_name: String,
    pub expected_len: usize,
    pub actual_len: usize,
    pub matches: bool,
    pub diff: i64,
}

impl LayoutCheck {
    pub fn check(layout: &VoterLayout, data: &[u8]) -> Self {
        Self {
            layout_name: layout.name.clone(),
            expected_len: layout.account_len,
            actual_len: data.len(),
            matches: data.len() >= layout.account_len,
            diff: layout.account_len as i64 - data.len() as i64,
        }
    }

    pub fn to_string(&self) -> String {
        if self.matches {
            format!(
                "✅ {}: {} bytes (needs {})",
                self.layout_name, self.actual_len, self.expected_len
            )
        } else {
            format!(
                "❌ {}: {} bytes, needs {} ({} short)",
                self.layout_name, self.actual_len, self.expected_len, self.diff
            )
        }
    }
}

/// 动态布局探测器
pub struct LayoutProbe;

impl LayoutProbe {
    /// Offsets of 32-byte windows that are not all zero, stepping by `stride`
    pub fn find_pubkey_fields(data: &[u8], stride: usize) -> Vec<usize> {
        let stride = stride.max(1);
        let mut offsets = Vec::new();
        if data.len() < 32 {
            return offsets;
        }
        for i in (0..=(data.len() - 32)).step_by(stride) {
            if data[i..i + 32].iter().any(|&b| b != 0) {
                offsets.push(i);
            }
        }
        offsets
    }

    /// u64 values at 8-byte steps from `min_offset` that pass the amount bounds
    ///
    /// This is how candidate deposit offsets were found originally; the
    /// result is only a hint for writing a layout, never used for decoding.
    pub fn find_amount_candidates(data: &[u8], min_offset: usize, filter: &DepositFilter) -> Vec<(usize, u64)> {
        let mut found = Vec::new();
        let mut i = min_offset;
        while i + 8 <= data.len() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[i..i + 8]);
            let value = u64::from_le_bytes(bytes);
            let display = filter.to_display(value);
            if value != 0 && display >= filter.min_amount && display <= filter.max_amount {
                found.push((i, value));
            }
            i += 8;
        }
        found
    }

    /// 打印数据的十六进制转储（用于调试）
    pub fn hex_dump(data: &[u8], offset: usize, length: usize) -> String {
        let start = offset.min(data.len());
        let end = offset.saturating_add(length).min(data.len());

        let mut result = String::new();
        for (i, byte) in data[start..end].iter().enumerate() {
            if i % 16 == 0 {
                if i > 0 {
                    result.push('\n');
                }
                result.push_str(&format!("{:04X}: ", start + i));
            }
            result.push_str(&format!("{:02X} ", byte));
        }
        result
    }

    pub fn analyze_data(data: &[u8]) -> DataAnalysis {
        DataAnalysis {
            total_size: data.len(),
            zero_bytes: data.iter().filter(|&&b| b == 0).count(),
            non_zero_bytes: data.iter().filter(|&&b| b != 0).count(),
            potential_pubkeys: Self::find_pubkey_fields(data, 8).len(),
        }
    }
}

#[derive(Debug)]
pub struct DataAnalysis {
    pub total_size: usize,
    pub zero_bytes: usize,
    pub non_zero_bytes: usize,
    pub potential_pubkeys: usize,
}

impl DataAnalysis {
    pub fn to_string(&self) -> String {
        let pct = |n: usize| {
            if self.total_size == 0 {
                0.0
            } else {
                n as f64 / self.total_size as f64 * 100.0
            }
        };
        format!(
            "Data Analysis:\n\
             - Total size: {} bytes\n\
             - Zero bytes: {} ({:.1}%)\n\
             - Non-zero bytes: {} ({:.1}%)\n\
             - Non-zero 32-byte windows (8-aligned): {}",
            self.total_size,
            self.zero_bytes,
            pct(self.zero_bytes),
            self.non_zero_bytes,
            pct(self.non_zero_bytes),
            self.potential_pubkeys
        )
    }
}
