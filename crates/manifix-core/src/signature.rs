//! Repair signatures: canonical fingerprints of a violation situation
//!
//! The bank is keyed by signature. Two signatures are equal iff the failed
//! oracle set, the error-code list and the context map are all equal, so
//! both lists are kept sorted and deduplicated from construction.

use crate::violation::Violation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A structured fingerprint of a violation list plus optional artifact context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Distinct failed oracle identifiers, sorted
    pub failed_oracles: Vec<String>,
    /// Distinct error codes drawn from violation evidence, sorted
    pub error_codes: Vec<String>,
    /// Artifact context such as application name or environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl Signature {
    /// Build a signature from a violation list and optional context.
    ///
    /// Oracle identifiers come from the prefix of each violation id; error
    /// codes from evidence. Both are deduplicated and sorted so signature
    /// equality is insensitive to violation order.
    pub fn from_violations(
        violations: &[Violation],
        context: BTreeMap<String, String>,
    ) -> Self {
        let mut failed_oracles: Vec<String> = violations
            .iter()
            .map(|v| v.oracle_id().to_string())
            .collect();
        failed_oracles.sort();
        failed_oracles.dedup();

        let mut error_codes: Vec<String> = violations
            .iter()
            .filter_map(|v| v.evidence.error_code.clone())
            .collect();
        error_codes.sort();
        error_codes.dedup();

        Signature {
            failed_oracles,
            error_codes,
            context,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "oracles=[{}] codes=[{}]",
            self.failed_oracles.join(","),
            self.error_codes.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::Evidence;

    fn violation(id: &str, code: Option<&str>) -> Violation {
        let mut v = Violation::error(id, "msg");
        if let Some(code) = code {
            v = v.with_evidence(Evidence::new().with_error_code(code));
        }
        v
    }

    #[test]
    fn oracle_set_is_sorted_and_deduplicated() {
        let violations = vec![
            violation("security.B", Some("B")),
            violation("policy.A", Some("A")),
            violation("policy.C", Some("C")),
        ];
        let sig = Signature::from_violations(&violations, BTreeMap::new());
        assert_eq!(sig.failed_oracles, ["policy", "security"]);
        assert_eq!(sig.error_codes, ["A", "B", "C"]);
    }

    #[test]
    fn equality_is_order_insensitive() {
        let a = Signature::from_violations(
            &[violation("policy.A", Some("A")), violation("security.B", Some("B"))],
            BTreeMap::new(),
        );
        let b = Signature::from_violations(
            &[violation("security.B", Some("B")), violation("policy.A", Some("A"))],
            BTreeMap::new(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn context_participates_in_equality() {
        let violations = vec![violation("policy.A", Some("A"))];
        let a = Signature::from_violations(&violations, BTreeMap::new());
        let mut ctx = BTreeMap::new();
        ctx.insert("app".to_string(), "payments-api".to_string());
        let b = Signature::from_violations(&violations, ctx);
        assert_ne!(a, b);
    }

    #[test]
    fn violations_without_codes_contribute_no_codes() {
        let sig = Signature::from_violations(&[violation("policy.A", None)], BTreeMap::new());
        assert_eq!(sig.failed_oracles, ["policy"]);
        assert!(sig.error_codes.is_empty());
    }
}
