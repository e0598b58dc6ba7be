//! Sizing attributes attached to plan actions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest accepted value for `hours`, `storage_gb` and `transfer_gb`.
pub const MAX_SIZING_VALUE: u64 = 1_000_000_000;

/// Sizing attributes used by the cost model.
///
/// All fields are optional; the model applies its defaults for anything the
/// planner left out. Both `snake_case` and `camelCase` spellings are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CostFactors {
    /// Service kind to price. Falls back to the action's service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Instance class for compute services (e.g. `t3.micro`).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "instanceType",
        alias = "instance_class",
        alias = "instanceClass"
    )]
    pub instance_type: Option<String>,
    /// Running hours per month.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "hoursPerMonth")]
    pub hours: Option<Decimal>,
    /// Number of identical units.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "units",
        alias = "instanceCount",
        alias = "instance_count"
    )]
    pub count: Option<u32>,
    /// Stored volume in GB-months.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "storageGb")]
    pub storage_gb: Option<Decimal>,
    /// Outbound transfer volume in GB per month.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "transferGb")]
    pub transfer_gb: Option<Decimal>,
}

impl CostFactors {
    /// Factors for a compute service.
    #[must_use]
    pub fn compute(service: impl Into<String>, instance_type: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            instance_type: Some(instance_type.into()),
            ..Self::default()
        }
    }

    /// Factors for a storage service.
    #[must_use]
    pub fn storage(service: impl Into<String>, storage_gb: Decimal) -> Self {
        Self {
            service: Some(service.into()),
            storage_gb: Some(storage_gb),
            ..Self::default()
        }
    }

    /// Sets the unit count.
    #[must_use]
    pub const fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the monthly hours.
    #[must_use]
    pub const fn with_hours(mut self, hours: Decimal) -> Self {
        self.hours = Some(hours);
        self
    }

    /// Sets the transfer volume.
    #[must_use]
    pub const fn with_transfer(mut self, transfer_gb: Decimal) -> Self {
        self.transfer_gb = Some(transfer_gb);
        self
    }

    /// Sizing attributes that are negative or above [`MAX_SIZING_VALUE`],
    /// as `(field, message)` pairs using the plan's field names.
    #[must_use]
    pub fn out_of_range(&self) -> Vec<(&'static str, String)> {
        let max = Decimal::from(MAX_SIZING_VALUE);
        [
            ("hours", self.hours),
            ("storageGb", self.storage_gb),
            ("transferGb", self.transfer_gb),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value?;
            if value < Decimal::ZERO {
                Some((field, format!("{field} cannot be negative (got {value})")))
            } else if value > max {
                Some((field, format!("{field} exceeds {MAX_SIZING_VALUE} (got {value})")))
            } else {
                None
            }
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_aliases() {
        let factors: CostFactors = serde_json::from_value(json!({
            "service": "ec2",
            "instanceType": "t3.micro",
            "instanceCount": 3,
            "hoursPerMonth": 100
        }))
        .expect("decode");

        assert_eq!(factors.instance_type.as_deref(), Some("t3.micro"));
        assert_eq!(factors.count, Some(3));
        assert_eq!(factors.hours, Some(Decimal::from(100)));
    }

    #[test]
    fn test_fractional_volumes() {
        let factors: CostFactors =
            serde_json::from_value(json!({"storage_gb": 2.5, "transfer_gb": "0.75"})).expect("decode");

        assert_eq!(factors.storage_gb, Some(Decimal::new(25, 1)));
        assert_eq!(factors.transfer_gb, Some(Decimal::new(75, 2)));
    }

    #[test]
    fn test_out_of_range_sizing() {
        let factors = CostFactors::compute("ec2", "small")
            .with_hours(Decimal::from(-730))
            .with_transfer(Decimal::from(MAX_SIZING_VALUE + 1));

        let issues = factors.out_of_range();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].0, "hours");
        assert!(issues[0].1.contains("negative"));
        assert_eq!(issues[1].0, "transferGb");

        let ok = CostFactors::storage("s3", Decimal::from(MAX_SIZING_VALUE));
        assert!(ok.out_of_range().is_empty());
    }
}
