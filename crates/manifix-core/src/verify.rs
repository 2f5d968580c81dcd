//! Artifact and oracle contracts, and the verifier that runs oracles
//!
//! The engine never inspects artifact internals: an [`Artifact`] only needs
//! to produce a patched copy of itself. Oracles are pure functions from
//! artifact to violation list; the contract requires them to be
//! deterministic and total — internal failures must be reported as a
//! violation with a distinguished error code, never raised upward.

use crate::patch::{Patch, PatchApplyError};
use crate::violation::Violation;
use std::sync::Arc;
use tracing::debug;

/// An opaque configuration value the engine can repair.
pub trait Artifact: Clone {
    /// Apply a patch, producing a new artifact; the original is unchanged.
    fn apply(&self, patch: &Patch) -> Result<Self, PatchApplyError>;
}

/// A deterministic verifier mapping an artifact to a violation list.
///
/// Implementations must be:
///
/// - **Deterministic**: the same artifact yields an identical violation
///   list, same order and same evidence.
/// - **Total**: never panic or error for artifacts the engine feeds them;
///   internal failures become a violation with a distinguished error code
///   and empty evidence.
/// - **Evidence-honest**: a `forbid_tuple` hint must hold for every
///   artifact whose relevant fields match the tuple.
pub trait Oracle<A: Artifact>: Send + Sync {
    /// Stable identifier used in logs and diagnostics
    fn id(&self) -> &str;

    /// Check the artifact, returning all violations found
    fn check(&self, artifact: &A) -> Vec<Violation>;
}

/// Runs a fixed ordered sequence of oracles and concatenates their
/// violation lists, preserving per-oracle internal order.
///
/// No retries, no suppression: what the oracles report is what comes out.
pub struct Verifier<A: Artifact> {
    oracles: Vec<Arc<dyn Oracle<A>>>,
}

impl<A: Artifact> Verifier<A> {
    /// Create a verifier over the given oracle sequence
    pub fn new(oracles: Vec<Arc<dyn Oracle<A>>>) -> Self {
        Verifier { oracles }
    }

    /// Run every oracle against `artifact`, in order, and concatenate
    pub fn verify(&self, artifact: &A) -> Vec<Violation> {
        let mut violations = Vec::new();
        for oracle in &self.oracles {
            let found = oracle.check(artifact);
            if !found.is_empty() {
                debug!(oracle = oracle.id(), count = found.len(), "oracle reported violations");
            }
            violations.extend(found);
        }
        violations
    }
}

impl<A: Artifact> Clone for Verifier<A> {
    fn clone(&self) -> Self {
        Verifier {
            oracles: self.oracles.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Patch;

    #[derive(Debug, Clone, PartialEq)]
    struct Unit;

    impl Artifact for Unit {
        fn apply(&self, _patch: &Patch) -> Result<Self, PatchApplyError> {
            Ok(Unit)
        }
    }

    struct FixedOracle {
        id: &'static str,
        violations: Vec<Violation>,
    }

    impl Oracle<Unit> for FixedOracle {
        fn id(&self) -> &str {
            self.id
        }

        fn check(&self, _artifact: &Unit) -> Vec<Violation> {
            self.violations.clone()
        }
    }

    #[test]
    fn concatenates_in_supplied_oracle_order() {
        let verifier = Verifier::new(vec![
            Arc::new(FixedOracle {
                id: "b",
                violations: vec![
                    Violation::error("b.ONE", "one"),
                    Violation::error("b.TWO", "two"),
                ],
            }) as Arc<dyn Oracle<Unit>>,
            Arc::new(FixedOracle {
                id: "a",
                violations: vec![Violation::error("a.THREE", "three")],
            }),
        ]);

        let ids: Vec<String> = verifier
            .verify(&Unit)
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, ["b.ONE", "b.TWO", "a.THREE"]);
    }

    #[test]
    fn empty_oracle_list_means_no_violations() {
        let verifier: Verifier<Unit> = Verifier::new(Vec::new());
        assert!(verifier.verify(&Unit).is_empty());
    }
}
