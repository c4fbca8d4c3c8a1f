//! Costing configuration options.

use costledger_core::{CostingContext, Rounding, RoundingMode, TenantId, ValuationPolicy};
use costledger_posting::AccountRefs;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Known option names.
const KNOWN_OPTIONS: &[&str] = &[
    "tenant",
    "base_currency",
    "valuation_policy",
    "rounding_mode",
    "money_scale",
    "quantity_scale",
    "unit_cost_scale",
    "reconcile_tolerance",
    "slow_moving_days",
    "account_inventory",
    "account_cogs",
    "account_payable_in_transit",
    "account_landed_cost_clearing",
    "account_inventory_adjustment",
];

/// Largest scale accepted for any rounding option.
const MAX_SCALE: u32 = 12;

/// Option validation warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionWarning {
    /// Warning code (E7001, E7002, E7003).
    pub code: &'static str,
    /// Warning message.
    pub message: String,
    /// Option name.
    pub option: String,
    /// Option value.
    pub value: String,
}

/// Tenant costing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Tenant whose layers are read and written.
    pub tenant: String,

    /// Base currency.
    pub base_currency: String,

    /// Active valuation policy.
    pub valuation_policy: ValuationPolicy,

    /// Rounding mode for every scale.
    pub rounding_mode: RoundingMode,

    /// Decimal places of money amounts.
    pub money_scale: u32,

    /// Decimal places of quantities.
    pub quantity_scale: u32,

    /// Decimal places of unit costs.
    pub unit_cost_scale: u32,

    /// Largest valuation-to-ledger difference still considered reconciled.
    pub reconcile_tolerance: Decimal,

    /// Age in days from which stock counts as slow-moving.
    pub slow_moving_days: i64,

    /// General-ledger accounts postings go to.
    pub accounts: AccountRefs,

    /// Any other custom options.
    pub custom: HashMap<String, String>,

    /// Options that have been set (for duplicate detection).
    #[doc(hidden)]
    pub set_options: HashSet<String>,

    /// Validation warnings collected during parsing.
    pub warnings: Vec<OptionWarning>,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    /// Create new options with defaults.
    #[must_use]
    pub fn new() -> Self {
        let rounding = Rounding::default();
        Self {
            tenant: "default".to_string(),
            base_currency: "USD".to_string(),
            valuation_policy: ValuationPolicy::Fifo,
            rounding_mode: rounding.mode,
            money_scale: rounding.money_scale,
            quantity_scale: rounding.quantity_scale,
            unit_cost_scale: rounding.unit_cost_scale,
            reconcile_tolerance: Decimal::new(1, 2), // 0.01
            slow_moving_days: 90,
            accounts: AccountRefs::default(),
            custom: HashMap::new(),
            set_options: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Set an option by name.
    ///
    /// Validates the option and collects any warnings in `self.warnings`.
    /// An invalid value leaves the previous value in place.
    pub fn set(&mut self, key: &str, value: &str) {
        // Check for unknown options (E7001)
        let is_known = KNOWN_OPTIONS.contains(&key);
        if !is_known {
            self.warn("E7001", format!("Unknown option \"{key}\""), key, value);
        }

        // Check for duplicate options (E7003)
        if is_known && self.set_options.contains(key) {
            self.warn(
                "E7003",
                format!("Option \"{key}\" can only be specified once"),
                key,
                value,
            );
        }
        self.set_options.insert(key.to_string());

        match key {
            "tenant" => self.tenant = value.to_string(),
            "base_currency" => {
                if value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase()) {
                    self.base_currency = value.to_string();
                } else {
                    self.invalid(key, value, "a three-letter currency code");
                }
            }
            "valuation_policy" => match ValuationPolicy::from_str(value) {
                Ok(policy) => self.valuation_policy = policy,
                Err(_) => self.invalid(
                    key,
                    value,
                    "one of FIFO, LIFO, WEIGHTED_AVERAGE, SPECIFIC_ID",
                ),
            },
            "rounding_mode" => match RoundingMode::from_str(value) {
                Ok(mode) => self.rounding_mode = mode,
                Err(_) => self.invalid(key, value, "one of HALF_UP, HALF_EVEN, DOWN, UP"),
            },
            "money_scale" | "quantity_scale" | "unit_cost_scale" => {
                match value.parse::<u32>() {
                    Ok(scale) if scale <= MAX_SCALE => match key {
                        "money_scale" => self.money_scale = scale,
                        "quantity_scale" => self.quantity_scale = scale,
                        _ => self.unit_cost_scale = scale,
                    },
                    _ => self.invalid(key, value, "an integer from 0 to 12"),
                }
            }
            "reconcile_tolerance" => match Decimal::from_str(value) {
                Ok(d) if !d.is_sign_negative() => self.reconcile_tolerance = d,
                _ => self.invalid(key, value, "a non-negative decimal number"),
            },
            "slow_moving_days" => match value.parse::<i64>() {
                Ok(days) if days >= 0 => self.slow_moving_days = days,
                _ => self.invalid(key, value, "a non-negative integer"),
            },
            "account_inventory" => self.accounts.inventory = value.to_string(),
            "account_cogs" => self.accounts.cogs = value.to_string(),
            "account_payable_in_transit" => self.accounts.payable_in_transit = value.to_string(),
            "account_landed_cost_clearing" => {
                self.accounts.landed_cost_clearing = value.to_string();
            }
            "account_inventory_adjustment" => {
                self.accounts.inventory_adjustment = value.to_string();
            }
            _ => {
                // Unknown options go to custom map
                self.custom.insert(key.to_string(), value.to_string());
            }
        }
    }

    fn invalid(&mut self, key: &str, value: &str, expected: &str) {
        self.warn(
            "E7002",
            format!("Invalid value \"{value}\" for option \"{key}\": expected {expected}"),
            key,
            value,
        );
    }

    fn warn(&mut self, code: &'static str, message: String, key: &str, value: &str) {
        self.warnings.push(OptionWarning {
            code,
            message,
            option: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Get a custom option value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.custom.get(key).map(String::as_str)
    }

    /// Rounding configuration.
    #[must_use]
    pub fn rounding(&self) -> Rounding {
        Rounding {
            money_scale: self.money_scale,
            quantity_scale: self.quantity_scale,
            unit_cost_scale: self.unit_cost_scale,
            mode: self.rounding_mode,
            ..Rounding::default()
        }
    }

    /// The costing context these options describe.
    #[must_use]
    pub fn context(&self) -> CostingContext {
        CostingContext::new(TenantId::new(self.tenant.as_str()))
            .with_base_currency(self.base_currency.as_str())
            .with_policy(self.valuation_policy)
            .with_rounding(self.rounding())
    }

    /// Account references for the posting adapter.
    #[must_use]
    pub fn accounts(&self) -> AccountRefs {
        self.accounts.clone()
    }
}
