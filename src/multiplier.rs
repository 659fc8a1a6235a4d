/// ========================================================================
/// 锁仓乘数 (Lockup Multiplier)
/// ========================================================================
///
/// multiplier = baseline + min(remaining / saturation, 1) * max_extra
///
/// Two policies are available because the known script versions disagree
/// on vesting lockups:
/// - `linear`: every kind uses the remaining time to `end_ts`
/// - `period-weighted`: Daily/Monthly lockups are split into equal periods
///   and each still-locked period earns its own ratio
///
/// Both are pure functions of (deposit, now, registrar config).
/// ========================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::deserializers::{DepositRecord, RegistrarConfig};
use crate::vsr_interface::MultiplierModel;

/// Policy selector, chosen by the `[multiplier] policy` config key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplierPolicy {
    Linear,
    PeriodWeighted,
}

impl MultiplierPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            MultiplierPolicy::Linear => "linear",
            MultiplierPolicy::PeriodWeighted => "period-weighted",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MultiplierPolicy::Linear => "linear: bonus decays with time left until lockup end",
            MultiplierPolicy::PeriodWeighted => {
                "period-weighted: vesting lockups weighted per remaining period"
            }
        }
    }
}

impl fmt::Display for MultiplierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MultiplierPolicy {
    type Err = String;

    /// Case-insensitive; accepts "linear" and "period-weighted"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "linear" => Ok(MultiplierPolicy::Linear),
            "period-weighted" | "vesting" => Ok(MultiplierPolicy::PeriodWeighted),
            _ => Err(format!("unknown multiplier policy '{}'", s)),
        }
    }
}

/// Build the model for a policy
pub fn create_model(policy: MultiplierPolicy) -> Arc<dyn MultiplierModel> {
    match policy {
        MultiplierPolicy::Linear => Arc::new(LinearMultiplier),
        MultiplierPolicy::PeriodWeighted => Arc::new(PeriodWeightedMultiplier),
    }
}

/// Bonus ratio in [0, 1] for `secs` of remaining lockup
fn saturation_ratio(secs: u64, registrar: &RegistrarConfig) -> f64 {
    if registrar.lockup_saturation_secs == 0 {
        return if secs > 0 { 1.0 } else { 0.0 };
    }
    (secs as f64 / registrar.lockup_saturation_secs as f64).min(1.0)
}

/// Linear interpolation on remaining lockup time
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearMultiplier;

impl MultiplierModel for LinearMultiplier {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn multiplier(&self, deposit: &DepositRecord, now: u64, registrar: &RegistrarConfig) -> f64 {
        let baseline = registrar.baseline_weight();
        if !deposit.lockup.is_active(now) {
            return baseline;
        }
        let ratio = saturation_ratio(deposit.lockup.seconds_left(now), registrar);
        baseline + ratio * registrar.max_extra_weight()
    }
}

/// Per-period weighting for Daily/Monthly vesting
///
/// The deposit vests in `total` equal periods ending at `end_ts`. Period k
/// (counting from the last one) unlocks at `end_ts - k * period`; each period
/// still locked at `now` contributes `min(secs_until_unlock / saturation, 1)`,
/// and the sum is divided by `total`. Cliff and Constant use the linear rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodWeightedMultiplier;

impl MultiplierModel for PeriodWeightedMultiplier {
    fn name(&self) -> &'static str {
        "period-weighted"
    }

    fn multiplier(&self, deposit: &DepositRecord, now: u64, registrar: &RegistrarConfig) -> f64 {
        let lockup = &deposit.lockup;
        let period = match lockup.kind.period_secs() {
            Some(p) => p,
            None => return LinearMultiplier.multiplier(deposit, now, registrar),
        };

        let baseline = registrar.baseline_weight();
        if !lockup.is_active(now) {
            return baseline;
        }

        let duration = lockup.end_ts.saturating_sub(lockup.start_ts);
        let total_periods = (duration / period).max(1);
        let remaining = lockup.seconds_left(now);
        let remaining_periods = remaining.div_ceil(period).min(total_periods);

        let ratio_sum: f64 = (0..remaining_periods)
            .map(|k| {
                let unlock_in = remaining.saturating_sub(k * period);
                saturation_ratio(unlock_in, registrar)
            })
            .sum();

        baseline + registrar.max_extra_weight() * ratio_sum / total_periods as f64
    }
}
