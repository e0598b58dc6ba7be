//! Plan fingerprinting.
//!
//! A fingerprint identifies the content of a plan in deployment history, so
//! two attempts of the same plan can be recognised.

use sha2::{Digest, Sha256};

use super::spec::Plan;

/// Hasher for computing plan fingerprints.
#[derive(Debug, Default)]
pub struct PlanHasher;

impl PlanHasher {
    /// Creates a new plan hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the SHA-256 fingerprint of a plan's declared content.
    ///
    /// Execution results and the derived cost estimate are excluded, so the
    /// fingerprint is the same before and after running the plan.
    #[must_use]
    pub fn fingerprint(&self, plan: &Plan) -> String {
        let mut declared = plan.clone();
        declared.reset_results();

        // Steps and parameters are BTreeMaps, so serialization order is stable.
        let bytes = serde_json::to_vec(&declared).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// Returns a short version of a hash (first 8 characters).
    #[must_use]
    pub fn short_hash<'a>(&self, hash: &'a str) -> &'a str {
        hash.get(..8).unwrap_or(hash)
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Action, ActionResult, ParamValue};

    fn plan(bucket: &str) -> Plan {
        Plan::new("bucket").with_step(
            "bucket",
            Action::new("s3", "create_bucket").with_param("Bucket", bucket),
        )
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let hasher = PlanHasher::new();
        assert_eq!(hasher.fingerprint(&plan("a")), hasher.fingerprint(&plan("a")));
        assert_eq!(hasher.fingerprint(&plan("a")).len(), 64);
    }

    #[test]
    fn test_different_plans_different_fingerprint() {
        let hasher = PlanHasher::new();
        assert_ne!(hasher.fingerprint(&plan("a")), hasher.fingerprint(&plan("b")));
    }

    #[test]
    fn test_results_do_not_change_fingerprint() {
        let hasher = PlanHasher::new();
        let before = plan("a");
        let mut after = before.clone();
        if let Some(action) = after.steps.get_mut("bucket") {
            action.result = Some(ActionResult::success(ParamValue::from("ok")));
        }

        assert!(PlanHasher::hashes_match(
            &hasher.fingerprint(&before),
            &hasher.fingerprint(&after)
        ));
    }

    #[test]
    fn test_short_hash() {
        let hasher = PlanHasher::new();
        assert_eq!(hasher.short_hash("abcdef1234567890"), "abcdef12");
        assert_eq!(hasher.short_hash("abc"), "abc");
    }
}
