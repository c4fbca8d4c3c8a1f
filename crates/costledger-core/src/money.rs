//! Fixed-point monetary arithmetic.
//!
//! Every amount in costledger is a [`Decimal`]. Rounding happens only at
//! well-defined points (storing a total, reporting a unit cost, splitting a
//! lump sum) and always through a [`Rounding`] value so the scale and mode
//! are explicit.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rounding mode applied when an amount is reduced to a fixed scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingMode {
    /// Round half away from zero (commercial rounding).
    #[default]
    HalfUp,
    /// Round half to even (banker's rounding).
    HalfEven,
    /// Truncate toward zero.
    Down,
    /// Round away from zero.
    Up,
}

impl RoundingMode {
    /// The matching `rust_decimal` strategy.
    #[must_use]
    pub const fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
            Self::Down => RoundingStrategy::ToZero,
            Self::Up => RoundingStrategy::AwayFromZero,
        }
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HALF_UP" => Ok(Self::HalfUp),
            "HALF_EVEN" => Ok(Self::HalfEven),
            "DOWN" => Ok(Self::Down),
            "UP" => Ok(Self::Up),
            _ => Err(format!("unknown rounding mode: {s}")),
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfUp => write!(f, "HALF_UP"),
            Self::HalfEven => write!(f, "HALF_EVEN"),
            Self::Down => write!(f, "DOWN"),
            Self::Up => write!(f, "UP"),
        }
    }
}

/// Scales and rounding mode used across the engine.
///
/// Defaults: money at 2 decimal places, quantities and unit costs at 4,
/// percentages at 4, rounding half-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rounding {
    /// Decimal places kept for monetary totals.
    pub money_scale: u32,
    /// Decimal places allowed for quantities.
    pub quantity_scale: u32,
    /// Decimal places kept for reported unit costs.
    pub unit_cost_scale: u32,
    /// Decimal places kept for percentages.
    pub percent_scale: u32,
    /// Rounding mode.
    pub mode: RoundingMode,
}

impl Default for Rounding {
    fn default() -> Self {
        Self {
            money_scale: 2,
            quantity_scale: 4,
            unit_cost_scale: 4,
            percent_scale: 4,
            mode: RoundingMode::HalfUp,
        }
    }
}

impl Rounding {
    /// Round a monetary amount.
    #[must_use]
    pub fn money(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.money_scale, self.mode.strategy())
    }

    /// Round a quantity.
    #[must_use]
    pub fn quantity(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.quantity_scale, self.mode.strategy())
    }

    /// Round a unit cost.
    #[must_use]
    pub fn unit_cost(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.unit_cost_scale, self.mode.strategy())
    }

    /// Round a percentage.
    #[must_use]
    pub fn percent(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.percent_scale, self.mode.strategy())
    }

    /// Whether `value` has no more decimal places than the quantity scale allows.
    #[must_use]
    pub fn is_quantity_exact(&self, value: Decimal) -> bool {
        value.round_dp_with_strategy(self.quantity_scale, RoundingStrategy::ToZero) == value
    }

    /// Whether `value` has no more decimal places than the money scale allows.
    #[must_use]
    pub fn is_money_exact(&self, value: Decimal) -> bool {
        value.round_dp_with_strategy(self.money_scale, RoundingStrategy::ToZero) == value
    }

    /// `part / whole × 100`, rounded; zero when `whole` is zero.
    #[must_use]
    pub fn percentage(&self, part: Decimal, whole: Decimal) -> Decimal {
        if whole.is_zero() {
            Decimal::ZERO
        } else {
            self.percent(part / whole * Decimal::ONE_HUNDRED)
        }
    }
}

/// Split a non-negative `total` into shares proportional to `weights`.
///
/// Every share except the one at `designated` is rounded to `scale`; the
/// designated share receives `total` minus the others, so the shares always
/// sum to `total` exactly. When `caps` is given, every share stays within
/// `0..=cap`: if the designated share lands outside its bounds, the excess
/// (or deficit) is moved onto the other shares, walking backward from the
/// end of the slice.
///
/// Returns an empty vector when `weights` is empty. When the weights sum to
/// zero the whole total goes to the designated share.
#[must_use]
pub fn apportion(
    total: Decimal,
    weights: &[Decimal],
    caps: Option<&[Decimal]>,
    designated: usize,
    scale: u32,
    strategy: RoundingStrategy,
) -> Vec<Decimal> {
    if weights.is_empty() {
        return Vec::new();
    }
    let designated = designated.min(weights.len() - 1);
    let weight_sum: Decimal = weights.iter().copied().sum();

    let mut shares = vec![Decimal::ZERO; weights.len()];
    if weight_sum.is_zero() {
        shares[designated] = total;
        return shares;
    }

    let mut assigned = Decimal::ZERO;
    for (i, weight) in weights.iter().enumerate() {
        if i == designated {
            continue;
        }
        let share = (total * *weight / weight_sum).round_dp_with_strategy(scale, strategy);
        shares[i] = share;
        assigned += share;
    }
    shares[designated] = total - assigned;

    if shares[designated].is_sign_negative() {
        let mut deficit = -shares[designated];
        shares[designated] = Decimal::ZERO;
        for i in (0..shares.len()).rev() {
            if deficit.is_zero() {
                break;
            }
            if i == designated {
                continue;
            }
            let take = shares[i].min(deficit);
            shares[i] -= take;
            deficit -= take;
        }
    }

    if let Some(caps) = caps {
        let cap = caps.get(designated).copied().unwrap_or(Decimal::MAX);
        if shares[designated] > cap {
            let mut excess = shares[designated] - cap;
            shares[designated] = cap;
            for i in (0..shares.len()).rev() {
                if excess.is_zero() {
                    break;
                }
                if i == designated {
                    continue;
                }
                let room = caps.get(i).copied().unwrap_or(Decimal::MAX) - shares[i];
                let give = room.max(Decimal::ZERO).min(excess);
                shares[i] += give;
                excess -= give;
            }
            // Unplaceable excess means the caps cannot hold the total.
            shares[designated] += excess;
        }
    }

    shares
}
