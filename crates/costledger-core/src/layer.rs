//! Cost layers: the acquisition records inventory is consumed from.
//!
//! A [`CostLayer`] is created from a [`Receipt`] and is never deleted. After
//! creation only three things change: the remaining quantity and the value
//! already consumed (both through [`CostLayer::decrement`]), and the landed
//! costs accumulated onto it.
//!
//! The value still carried by a layer is its base-currency total plus landed
//! costs, minus everything consumed so far. Consumption always charges a
//! share of that carried value, so the cumulative cost of goods sold from a
//! layer can never exceed what was put into it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CostingError, LayerId, ProductId, Rounding, TenantId, WarehouseId};

/// How a layer came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerType {
    /// Goods bought from a vendor.
    #[default]
    Purchase,
    /// Goods produced in-house.
    Production,
    /// Stock found during a count or other positive adjustment.
    Adjustment,
    /// Balance carried in when the ledger was started.
    OpeningBalance,
    /// Goods received from another warehouse.
    TransferIn,
    /// A layer recorded purely to carry landed costs.
    LandedCost,
    /// Goods returned by a customer.
    Return,
}

impl FromStr for LayerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PURCHASE" => Ok(Self::Purchase),
            "PRODUCTION" => Ok(Self::Production),
            "ADJUSTMENT" => Ok(Self::Adjustment),
            "OPENING_BALANCE" => Ok(Self::OpeningBalance),
            "TRANSFER_IN" => Ok(Self::TransferIn),
            "LANDED_COST" => Ok(Self::LandedCost),
            "RETURN" => Ok(Self::Return),
            _ => Err(format!("unknown layer type: {s}")),
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Purchase => write!(f, "PURCHASE"),
            Self::Production => write!(f, "PRODUCTION"),
            Self::Adjustment => write!(f, "ADJUSTMENT"),
            Self::OpeningBalance => write!(f, "OPENING_BALANCE"),
            Self::TransferIn => write!(f, "TRANSFER_IN"),
            Self::LandedCost => write!(f, "LANDED_COST"),
            Self::Return => write!(f, "RETURN"),
        }
    }
}

fn default_exchange_rate() -> Decimal {
    Decimal::ONE
}

/// An inbound movement of stock at a known cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Product received.
    pub product: ProductId,
    /// Warehouse receiving it.
    pub warehouse: WarehouseId,
    /// Kind of layer to create.
    #[serde(default)]
    pub layer_type: LayerType,
    /// Quantity received; must be positive.
    pub quantity: Decimal,
    /// Cost per unit in `currency`.
    pub unit_cost: Decimal,
    /// Transaction currency. Empty means the base currency.
    #[serde(default)]
    pub currency: String,
    /// Units of base currency per unit of `currency`.
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: Decimal,
    /// Date the goods were acquired.
    pub acquisition_date: NaiveDate,
    /// Source document (purchase order, production order, ...).
    #[serde(default)]
    pub source_ref: String,
    /// Explicit base-currency total overriding `quantity × unit_cost`.
    ///
    /// Used when value is carried over exactly from elsewhere, as on the
    /// receiving side of a transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<Decimal>,
    /// Weight of one unit, for weight-based landed cost allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_weight: Option<Decimal>,
    /// Volume of one unit, for volume-based landed cost allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_volume: Option<Decimal>,
}

impl Receipt {
    /// A base-currency purchase receipt.
    pub fn new(
        product: impl Into<ProductId>,
        warehouse: impl Into<WarehouseId>,
        quantity: Decimal,
        unit_cost: Decimal,
        acquisition_date: NaiveDate,
    ) -> Self {
        Self {
            product: product.into(),
            warehouse: warehouse.into(),
            layer_type: LayerType::Purchase,
            quantity,
            unit_cost,
            currency: String::new(),
            exchange_rate: Decimal::ONE,
            acquisition_date,
            source_ref: String::new(),
            total_cost: None,
            unit_weight: None,
            unit_volume: None,
        }
    }

    /// Set the layer type.
    pub const fn with_type(mut self, layer_type: LayerType) -> Self {
        self.layer_type = layer_type;
        self
    }

    /// Set the transaction currency and its rate to the base currency.
    pub fn with_currency(mut self, currency: impl Into<String>, exchange_rate: Decimal) -> Self {
        self.currency = currency.into();
        self.exchange_rate = exchange_rate;
        self
    }

    /// Set the source document reference.
    pub fn with_source(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = source_ref.into();
        self
    }

    /// Set an exact base-currency total.
    pub const fn with_total_cost(mut self, total: Decimal) -> Self {
        self.total_cost = Some(total);
        self
    }

    /// Set the unit weight.
    pub const fn with_weight(mut self, unit_weight: Decimal) -> Self {
        self.unit_weight = Some(unit_weight);
        self
    }

    /// Set the unit volume.
    pub const fn with_volume(mut self, unit_volume: Decimal) -> Self {
        self.unit_volume = Some(unit_volume);
        self
    }
}

/// One acquisition of stock, tracked at its own cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLayer {
    /// Layer id, assigned in insertion order.
    pub id: LayerId,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Product.
    pub product: ProductId,
    /// Warehouse.
    pub warehouse: WarehouseId,
    /// How the layer was created.
    pub layer_type: LayerType,
    /// Original quantity.
    pub quantity: Decimal,
    /// Unit cost in the transaction currency.
    pub unit_cost: Decimal,
    /// Total cost in the transaction currency.
    pub total_cost: Decimal,
    /// Transaction currency.
    pub currency: String,
    /// Rate used to convert to the base currency.
    pub exchange_rate: Decimal,
    /// Unit cost in the base currency.
    pub base_unit_cost: Decimal,
    /// Total cost in the base currency.
    pub base_total_cost: Decimal,
    /// Acquisition date; primary ordering key for FIFO and LIFO.
    pub acquisition_date: NaiveDate,
    /// Source document reference.
    pub source_ref: String,
    /// Quantity not yet consumed.
    pub quantity_remaining: Decimal,
    /// Set exactly when `quantity_remaining` is zero.
    pub is_fully_consumed: bool,
    /// Landed costs allocated onto this layer, in the base currency.
    pub allocated_landed_costs: Decimal,
    /// Base-currency value already charged to consumption records.
    pub consumed_value: Decimal,
    /// Weight of one unit, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_weight: Option<Decimal>,
    /// Volume of one unit, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_volume: Option<Decimal>,
}

impl CostLayer {
    /// Validate a receipt and build the layer it describes.
    pub fn from_receipt(
        id: LayerId,
        tenant: TenantId,
        base_currency: &str,
        receipt: &Receipt,
        rounding: &Rounding,
    ) -> Result<Self, CostingError> {
        if receipt.quantity <= Decimal::ZERO {
            return Err(CostingError::invalid_quantity(
                receipt.quantity,
                "receipt quantity must be positive",
            ));
        }
        if !rounding.is_quantity_exact(receipt.quantity) {
            return Err(CostingError::invalid_quantity(
                receipt.quantity,
                "receipt quantity has more decimal places than the quantity scale",
            ));
        }
        if receipt.unit_cost.is_sign_negative() {
            return Err(CostingError::invalid_cost(
                receipt.unit_cost,
                "unit cost cannot be negative",
            ));
        }
        if receipt.exchange_rate <= Decimal::ZERO {
            return Err(CostingError::invalid_cost(
                receipt.exchange_rate,
                "exchange rate must be positive",
            ));
        }

        let currency = if receipt.currency.is_empty() {
            base_currency.to_string()
        } else {
            receipt.currency.clone()
        };

        let (unit_cost, total_cost, base_unit_cost, base_total_cost) = match receipt.total_cost {
            Some(total) => {
                if total.is_sign_negative() {
                    return Err(CostingError::invalid_cost(total, "total cost cannot be negative"));
                }
                let base_total = rounding.money(total);
                let base_unit = rounding.unit_cost(base_total / receipt.quantity);
                (
                    rounding.unit_cost(base_unit / receipt.exchange_rate),
                    rounding.money(base_total / receipt.exchange_rate),
                    base_unit,
                    base_total,
                )
            }
            None => (
                receipt.unit_cost,
                rounding.money(receipt.quantity * receipt.unit_cost),
                rounding.unit_cost(receipt.unit_cost * receipt.exchange_rate),
                rounding.money(receipt.quantity * receipt.unit_cost * receipt.exchange_rate),
            ),
        };

        Ok(Self {
            id,
            tenant,
            product: receipt.product.clone(),
            warehouse: receipt.warehouse.clone(),
            layer_type: receipt.layer_type,
            quantity: receipt.quantity,
            unit_cost,
            total_cost,
            currency,
            exchange_rate: receipt.exchange_rate,
            base_unit_cost,
            base_total_cost,
            acquisition_date: receipt.acquisition_date,
            source_ref: receipt.source_ref.clone(),
            quantity_remaining: receipt.quantity,
            is_fully_consumed: false,
            allocated_landed_costs: Decimal::ZERO,
            consumed_value: Decimal::ZERO,
            unit_weight: receipt.unit_weight,
            unit_volume: receipt.unit_volume,
        })
    }

    /// Base-currency total plus allocated landed costs.
    #[must_use]
    pub fn carrying_value(&self) -> Decimal {
        self.base_total_cost + self.allocated_landed_costs
    }

    /// Value still carried by the unconsumed quantity.
    #[must_use]
    pub fn remaining_value(&self) -> Decimal {
        self.carrying_value() - self.consumed_value
    }

    /// Base-currency cost per unit including landed costs, over the
    /// original quantity.
    #[must_use]
    pub fn effective_unit_cost(&self) -> Decimal {
        self.carrying_value() / self.quantity
    }

    /// Value per unit of the quantity still on hand.
    ///
    /// Equal to [`effective_unit_cost`](Self::effective_unit_cost) until a
    /// landed cost or revaluation lands after partial consumption.
    #[must_use]
    pub fn current_unit_cost(&self) -> Decimal {
        if self.quantity_remaining.is_zero() {
            self.effective_unit_cost()
        } else {
            self.remaining_value() / self.quantity_remaining
        }
    }

    /// Cost of taking `quantity` out of this layer.
    ///
    /// Taking everything that remains costs exactly the remaining value, so
    /// a layer always drains to zero.
    #[must_use]
    pub fn cost_of(&self, quantity: Decimal, rounding: &Rounding) -> Decimal {
        if quantity >= self.quantity_remaining {
            self.remaining_value()
        } else if quantity.is_zero() {
            Decimal::ZERO
        } else {
            rounding.money(self.remaining_value() * quantity / self.quantity_remaining)
        }
    }

    /// Remove `quantity` from the layer, charging `cost` against its value.
    pub fn decrement(&mut self, quantity: Decimal, cost: Decimal) -> Result<(), CostingError> {
        if quantity <= Decimal::ZERO {
            return Err(CostingError::invalid_quantity(
                quantity,
                "consumed quantity must be positive",
            ));
        }
        if quantity > self.quantity_remaining {
            return Err(CostingError::OverConsumption {
                layer: self.id,
                requested: quantity,
                remaining: self.quantity_remaining,
            });
        }
        let remaining_value = self.remaining_value();
        if cost.is_sign_negative() || cost > remaining_value {
            return Err(CostingError::invalid_cost(
                cost,
                "consumption cost outside the layer's remaining value",
            ));
        }
        if quantity == self.quantity_remaining && cost != remaining_value {
            return Err(CostingError::invalid_cost(
                cost,
                "draining a layer must charge its whole remaining value",
            ));
        }

        self.quantity_remaining -= quantity;
        self.consumed_value += cost;
        self.is_fully_consumed = self.quantity_remaining.is_zero();
        Ok(())
    }

    /// Add a landed cost share to the layer.
    pub fn accumulate_landed_cost(&mut self, amount: Decimal) {
        self.allocated_landed_costs += amount;
    }

    /// Move the remaining units to a new base unit cost.
    ///
    /// Returns the change in remaining value.
    pub fn revalue(
        &mut self,
        new_base_unit_cost: Decimal,
        rounding: &Rounding,
    ) -> Result<Decimal, CostingError> {
        if new_base_unit_cost.is_sign_negative() {
            return Err(CostingError::invalid_cost(
                new_base_unit_cost,
                "unit cost cannot be negative",
            ));
        }
        if self.is_fully_consumed {
            return Err(CostingError::LayerConsumed(self.id));
        }
        let new_value = rounding.money(self.quantity_remaining * new_base_unit_cost);
        let change = new_value - self.remaining_value();
        self.base_total_cost += change;
        self.base_unit_cost = new_base_unit_cost;
        Ok(change)
    }

    /// Days between acquisition and `as_of`; negative for future layers.
    #[must_use]
    pub fn age_in_days(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.acquisition_date).num_days()
    }

    /// Share of the original quantity consumed, as a percentage.
    #[must_use]
    pub fn percentage_consumed(&self, rounding: &Rounding) -> Decimal {
        rounding.percentage(self.quantity - self.quantity_remaining, self.quantity)
    }
}
