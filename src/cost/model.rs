//! The cost model.
//!
//! Pure and deterministic: the same inputs always produce an identical
//! [`CostEstimate`], and no method performs I/O. The planning path and any
//! rendering layer may call it freely.

use rust_decimal::Decimal;

use crate::plan::{Action, Plan};

use super::estimate::{CostEstimate, LineItem};
use super::factors::CostFactors;
use super::rates::{RateCard, ServiceKind, StorageRates, HOURS_PER_MONTH};

/// Maps service kinds and sizing attributes to monthly costs.
#[derive(Debug, Clone, Default)]
pub struct CostModel {
    rates: RateCard,
}

impl CostModel {
    /// Creates a model with the default rate card.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model with a custom rate card.
    #[must_use]
    pub const fn with_rates(rates: RateCard) -> Self {
        Self { rates }
    }

    /// The rate card in use.
    #[must_use]
    pub const fn rates(&self) -> &RateCard {
        &self.rates
    }

    /// Estimates one resource.
    ///
    /// Unknown services and unknown instance classes price at zero with an
    /// explanatory line; they are never an error.
    #[must_use]
    pub fn estimate(&self, service: &str, factors: &CostFactors) -> CostEstimate {
        match self.rates.classify(service) {
            ServiceKind::Compute => self.estimate_compute(service, factors),
            ServiceKind::Storage(rates) => Self::estimate_storage(service, factors, rates),
            ServiceKind::Unknown => CostEstimate::single(
                format!("{service}: service not recognized, cost not estimated"),
                Decimal::ZERO,
            ),
        }
    }

    /// Estimates an action, or `None` if it declares no cost factors.
    #[must_use]
    pub fn estimate_action(&self, action: &Action) -> Option<CostEstimate> {
        let factors = action.cost_factors.as_ref()?;
        let service = factors.service.as_deref().unwrap_or(&action.service);
        Some(self.estimate(service, factors))
    }

    /// Sums the estimates of every step in deployment order.
    ///
    /// Steps that are not part of the order never run and are not priced.
    #[must_use]
    pub fn estimate_plan(&self, plan: &Plan) -> CostEstimate {
        let mut total = CostEstimate::zero();
        for (step, action) in plan.ordered_steps() {
            if let Some(estimate) = self.estimate_action(action) {
                total.absorb(step, estimate);
            }
        }
        total
    }

    fn estimate_compute(&self, service: &str, factors: &CostFactors) -> CostEstimate {
        let hours = factors.hours.unwrap_or_else(|| Decimal::from(HOURS_PER_MONTH));
        let count = Decimal::from(factors.count.unwrap_or(1));

        let Some(class) = factors.instance_type.as_deref() else {
            return CostEstimate::single(
                format!("{service}: no instance class declared, rate unavailable"),
                Decimal::ZERO,
            );
        };

        let Some(rate) = self.rates.hourly_rate(class) else {
            return CostEstimate::single(
                format!("{service}: unknown instance class '{class}', rate unavailable"),
                Decimal::ZERO,
            );
        };

        let label = format!("{service} {class}: ${rate}/hr x {hours} hrs x {count} unit(s)");
        let monthly = rate.checked_mul(hours).and_then(|v| v.checked_mul(count));
        CostEstimate::single(
            Self::overflow_label(label, monthly),
            monthly.unwrap_or(Decimal::ZERO),
        )
    }

    fn estimate_storage(service: &str, factors: &CostFactors, rates: StorageRates) -> CostEstimate {
        let storage_gb = factors.storage_gb.unwrap_or(Decimal::ONE);
        let transfer_gb = factors.transfer_gb.unwrap_or(Decimal::ZERO);

        let mut estimate = CostEstimate::zero();
        estimate.push(Self::line(
            format!("{service} storage: {storage_gb} GB x ${}/GB-month", rates.storage_per_gb_month),
            storage_gb.checked_mul(rates.storage_per_gb_month),
        ));
        if !transfer_gb.is_zero() {
            estimate.push(Self::line(
                format!("{service} transfer: {transfer_gb} GB x ${}/GB", rates.transfer_per_gb),
                transfer_gb.checked_mul(rates.transfer_per_gb),
            ));
        }
        estimate
    }

    /// A line for a checked product; an overflowed amount prices at zero.
    fn line(label: String, monthly: Option<Decimal>) -> LineItem {
        LineItem::new(
            Self::overflow_label(label, monthly),
            monthly.unwrap_or(Decimal::ZERO),
        )
    }

    fn overflow_label(label: String, monthly: Option<Decimal>) -> String {
        if monthly.is_some() {
            label
        } else {
            format!("{label}: amount overflowed, cost not estimated")
        }
    }
}
