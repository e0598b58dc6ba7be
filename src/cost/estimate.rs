//! Cost estimate values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Caveats attached to every estimate.
pub const CAVEATS: &[&str] = &[
    "Prices are on-demand list rates and may differ by region.",
    "Taxes, support plans and free-tier credits are not included.",
    "Actual cost depends on real usage; estimates assume the declared sizing.",
];

/// A monthly cost estimate with its breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    /// Total monthly amount in USD, unrounded.
    pub monthly_total: Decimal,
    /// Breakdown lines in plan order.
    pub line_items: Vec<LineItem>,
    /// Caveat notes.
    pub notes: Vec<String>,
}

/// One line of a cost breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Human-readable description of what is priced.
    pub label: String,
    /// Monthly amount for this line.
    pub monthly: Decimal,
}

impl Default for CostEstimate {
    fn default() -> Self {
        Self::zero()
    }
}

impl CostEstimate {
    /// An estimate with no line items and a zero total.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            monthly_total: Decimal::ZERO,
            line_items: Vec::new(),
            notes: CAVEATS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// An estimate made of a single line.
    #[must_use]
    pub fn single(label: impl Into<String>, monthly: Decimal) -> Self {
        let mut estimate = Self::zero();
        estimate.push(LineItem::new(label, monthly));
        estimate
    }

    /// Appends a line and adds its amount to the total.
    ///
    /// A line that would overflow the total is kept at zero with a note in
    /// its label, so the total always equals the sum of the lines.
    pub fn push(&mut self, item: LineItem) {
        match self.monthly_total.checked_add(item.monthly) {
            Some(total) => {
                self.monthly_total = total;
                self.line_items.push(item);
            }
            None => self.line_items.push(LineItem::new(
                format!("{}: amount overflowed the total, cost not estimated", item.label),
                Decimal::ZERO,
            )),
        }
    }

    /// Adds every line of `other`, prefixing labels with `prefix`.
    pub fn absorb(&mut self, prefix: &str, other: Self) {
        for item in other.line_items {
            self.push(LineItem::new(format!("[{prefix}] {}", item.label), item.monthly));
        }
    }

    /// Total rounded to cents for display.
    #[must_use]
    pub fn rounded_total(&self) -> Decimal {
        self.monthly_total.round_dp(2)
    }

    /// Returns true if nothing was priced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }
}

impl LineItem {
    /// Creates a line item.
    #[must_use]
    pub fn new(label: impl Into<String>, monthly: Decimal) -> Self {
        Self {
            label: label.into(),
            monthly,
        }
    }
}

impl std::fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for item in &self.line_items {
            writeln!(f, "  {:<60} ${}", item.label, item.monthly.round_dp(2))?;
        }
        write!(f, "Estimated monthly total: ${}", self.rounded_total())
    }
}
