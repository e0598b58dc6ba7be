//! Price tables used by the cost model.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::PricingConfig;

/// Default monthly running hours.
pub const HOURS_PER_MONTH: u32 = 730;

/// On-demand hourly rates, scale 4 (`104` = `$0.0104`).
const COMPUTE_RATES: &[(&str, i64)] = &[
    ("micro", 104),
    ("small", 208),
    ("medium", 416),
    ("large", 832),
    ("t2.micro", 116),
    ("t2.small", 230),
    ("t2.medium", 464),
    ("t3.nano", 52),
    ("t3.micro", 104),
    ("t3.small", 208),
    ("t3.medium", 416),
    ("t3.large", 832),
    ("t3.xlarge", 1664),
    ("m5.large", 960),
    ("m5.xlarge", 1920),
    ("c5.large", 850),
    ("r5.large", 1260),
    ("db.t3.micro", 170),
    ("db.t3.small", 340),
    ("db.t3.medium", 680),
    ("db.m5.large", 1710),
];

/// Services priced by instance hours.
const COMPUTE_SERVICES: &[&str] = &["compute", "ec2", "lightsail", "rds"];

/// Storage services: (name, GB-month rate, transfer-out rate), scale 3.
const STORAGE_RATES: &[(&str, i64, i64)] = &[
    ("storage", 23, 90),
    ("s3", 23, 90),
    ("ebs", 80, 90),
    ("efs", 300, 90),
];

const RATE_SCALE_COMPUTE: u32 = 4;
const RATE_SCALE_STORAGE: u32 = 3;

/// How a service is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Priced per instance hour.
    Compute,
    /// Priced per stored GB-month and transferred GB.
    Storage(StorageRates),
    /// No pricing information.
    Unknown,
}

/// Per-GB rates of a storage service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageRates {
    /// Price per GB-month stored.
    pub storage_per_gb_month: Decimal,
    /// Price per GB transferred out.
    pub transfer_per_gb: Decimal,
}

/// Price tables for compute instance classes and storage services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateCard {
    compute_services: BTreeSet<String>,
    compute_rates: BTreeMap<String, Decimal>,
    storage_rates: BTreeMap<String, StorageRates>,
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            compute_services: COMPUTE_SERVICES.iter().map(|s| (*s).to_string()).collect(),
            compute_rates: COMPUTE_RATES
                .iter()
                .map(|(class, rate)| ((*class).to_string(), Decimal::new(*rate, RATE_SCALE_COMPUTE)))
                .collect(),
            storage_rates: STORAGE_RATES
                .iter()
                .map(|(name, storage, transfer)| {
                    (
                        (*name).to_string(),
                        StorageRates {
                            storage_per_gb_month: Decimal::new(*storage, RATE_SCALE_STORAGE),
                            transfer_per_gb: Decimal::new(*transfer, RATE_SCALE_STORAGE),
                        },
                    )
                })
                .collect(),
        }
    }
}

impl RateCard {
    /// Builds the default card with configured overrides applied.
    #[must_use]
    pub fn from_config(pricing: &PricingConfig) -> Self {
        let mut card = Self::default();
        for (class, rate) in &pricing.compute {
            card.set_compute_rate(class, *rate);
        }
        for (service, rates) in &pricing.storage {
            let current = card.storage_rates.get(&service.to_lowercase()).copied();
            card.set_storage_rates(
                service,
                StorageRates {
                    storage_per_gb_month: rates
                        .storage_per_gb_month
                        .or_else(|| current.map(|c| c.storage_per_gb_month))
                        .unwrap_or_default(),
                    transfer_per_gb: rates
                        .transfer_per_gb
                        .or_else(|| current.map(|c| c.transfer_per_gb))
                        .unwrap_or_default(),
                },
            );
        }
        card
    }

    /// Classifies a service name (case-insensitive).
    #[must_use]
    pub fn classify(&self, service: &str) -> ServiceKind {
        let service = service.to_lowercase();
        if self.compute_services.contains(&service) {
            ServiceKind::Compute
        } else if let Some(rates) = self.storage_rates.get(&service) {
            ServiceKind::Storage(*rates)
        } else {
            ServiceKind::Unknown
        }
    }

    /// Hourly rate for an instance class (case-insensitive).
    #[must_use]
    pub fn hourly_rate(&self, instance_class: &str) -> Option<Decimal> {
        self.compute_rates.get(&instance_class.to_lowercase()).copied()
    }

    /// Sets the hourly rate of an instance class.
    pub fn set_compute_rate(&mut self, instance_class: &str, rate: Decimal) {
        self.compute_rates.insert(instance_class.to_lowercase(), rate);
    }

    /// Registers or replaces a storage service.
    pub fn set_storage_rates(&mut self, service: &str, rates: StorageRates) {
        self.storage_rates.insert(service.to_lowercase(), rates);
    }

    /// Registers an additional compute service.
    pub fn add_compute_service(&mut self, service: &str) {
        self.compute_services.insert(service.to_lowercase());
    }

    /// All services the card can price.
    #[must_use]
    pub fn service_names(&self) -> BTreeSet<String> {
        self.compute_services
            .iter()
            .chain(self.storage_rates.keys())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageRateConfig;

    #[test]
    fn test_default_classification() {
        let card = RateCard::default();
        assert_eq!(card.classify("EC2"), ServiceKind::Compute);
        assert!(matches!(card.classify("s3"), ServiceKind::Storage(_)));
        assert_eq!(card.classify("dynamodb"), ServiceKind::Unknown);
    }

    #[test]
    fn test_default_rates() {
        let card = RateCard::default();
        assert_eq!(card.hourly_rate("t3.micro"), Some(Decimal::new(104, 4)));
        assert_eq!(card.hourly_rate("SMALL"), Some(Decimal::new(208, 4)));
        assert_eq!(card.hourly_rate("z9.huge"), None);
    }

    #[test]
    fn test_config_overrides() {
        let mut pricing = PricingConfig::default();
        pricing.compute.insert(String::from("t3.micro"), Decimal::new(2, 2));
        pricing.storage.insert(
            String::from("glacier"),
            StorageRateConfig {
                storage_per_gb_month: Some(Decimal::new(4, 3)),
                transfer_per_gb: None,
            },
        );
        pricing.storage.insert(
            String::from("s3"),
            StorageRateConfig {
                storage_per_gb_month: None,
                transfer_per_gb: Some(Decimal::ZERO),
            },
        );

        let card = RateCard::from_config(&pricing);
        assert_eq!(card.hourly_rate("t3.micro"), Some(Decimal::new(2, 2)));

        let ServiceKind::Storage(glacier) = card.classify("glacier") else {
            panic!("glacier should be a storage service");
        };
        assert_eq!(glacier.storage_per_gb_month, Decimal::new(4, 3));
        assert_eq!(glacier.transfer_per_gb, Decimal::ZERO);

        let ServiceKind::Storage(s3) = card.classify("s3") else {
            panic!("s3 should be a storage service");
        };
        assert_eq!(s3.storage_per_gb_month, Decimal::new(23, 3));
        assert_eq!(s3.transfer_per_gb, Decimal::ZERO);
    }
}
