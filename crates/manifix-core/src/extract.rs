//! Constraint extraction from oracle evidence
//!
//! Maps violation evidence to pruning constraints: each `forbid_value` hint
//! becomes a [`Constraint::ForbiddenValue`], each `forbid_tuple` hint of two
//! or more pairs becomes a canonical [`Constraint::ForbiddenTuple`].
//! Evidence referring to holes outside the current hole space is discarded —
//! the oracle is signalling a violation this template cannot address.

use crate::constraint::Constraint;
use crate::patch::HoleSpace;
use crate::violation::Violation;
use tracing::debug;

/// Extract a deduplicated list of constraints from `violations`.
///
/// Extraction never invents constraints beyond what evidence explicitly
/// asserts, and preserves first-seen order.
pub fn extract_constraints(violations: &[Violation], space: &HoleSpace) -> Vec<Constraint> {
    let mut constraints: Vec<Constraint> = Vec::new();

    let mut push = |constraint: Constraint| {
        if !constraints.contains(&constraint) {
            debug!(constraint = %constraint, "learned constraint from oracle evidence");
            constraints.push(constraint);
        }
    };

    for violation in violations {
        for hint in &violation.evidence.forbid_value {
            if !space.contains(&hint.hole) {
                debug!(hole = %hint.hole, "discarding hint for hole outside the hole space");
                continue;
            }
            push(Constraint::forbidden_value(
                hint.hole.clone(),
                hint.value.clone(),
            ));
        }

        for hint in &violation.evidence.forbid_tuple {
            if hint.holes.len() < 2 || hint.holes.len() != hint.values.len() {
                debug!(id = %violation.id, "discarding malformed tuple hint");
                continue;
            }
            if hint.holes.iter().any(|h| !space.contains(h)) {
                debug!(id = %violation.id, "discarding tuple hint with hole outside the hole space");
                continue;
            }
            push(Constraint::forbidden_tuple(
                hint.holes
                    .iter()
                    .cloned()
                    .zip(hint.values.iter().cloned()),
            ));
        }
    }

    constraints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Value;
    use crate::violation::Evidence;

    fn space_with(holes: &[&str]) -> HoleSpace {
        holes
            .iter()
            .map(|h| (h.to_string(), vec![Value::from(1)]))
            .collect()
    }

    #[test]
    fn extracts_value_and_tuple_hints() {
        let space = space_with(&["env", "replicas", "version"]);
        let violations = vec![
            Violation::error("policy.A", "a").with_evidence(
                Evidence::new().with_forbid_value("version", "latest"),
            ),
            Violation::error("policy.B", "b").with_evidence(Evidence::new().with_forbid_tuple([
                ("env".to_string(), Value::from("prod")),
                ("replicas".to_string(), Value::from(2)),
            ])),
        ];

        let constraints = extract_constraints(&violations, &space);
        assert_eq!(
            constraints,
            [
                Constraint::forbidden_value("version", "latest"),
                Constraint::forbidden_tuple([
                    ("env".to_string(), Value::from("prod")),
                    ("replicas".to_string(), Value::from(2)),
                ]),
            ]
        );
    }

    #[test]
    fn violations_without_hints_extract_nothing() {
        let space = space_with(&["env"]);
        let violations = vec![Violation::error("schema.X", "no evidence")];
        assert!(extract_constraints(&violations, &space).is_empty());
    }

    #[test]
    fn duplicate_hints_deduplicate_structurally() {
        let space = space_with(&["env", "replicas"]);
        let hint = |order: bool| {
            let mut pairs = vec![
                ("env".to_string(), Value::from("prod")),
                ("replicas".to_string(), Value::from(2)),
            ];
            if order {
                pairs.reverse();
            }
            Violation::error("policy.B", "b")
                .with_evidence(Evidence::new().with_forbid_tuple(pairs))
        };

        // Same tuple in both listing orders: canonicalisation makes them equal
        let constraints = extract_constraints(&[hint(false), hint(true)], &space);
        assert_eq!(constraints.len(), 1);
    }

    #[test]
    fn hints_for_unknown_holes_are_discarded() {
        let space = space_with(&["env"]);
        let violations = vec![
            Violation::error("policy.A", "a")
                .with_evidence(Evidence::new().with_forbid_value("profile", "small")),
            Violation::error("policy.B", "b").with_evidence(Evidence::new().with_forbid_tuple([
                ("env".to_string(), Value::from("prod")),
                ("replicas".to_string(), Value::from(2)),
            ])),
        ];
        assert!(extract_constraints(&violations, &space).is_empty());
    }

    #[test]
    fn single_pair_tuple_hints_are_discarded() {
        let space = space_with(&["env"]);
        let violations = vec![Violation::error("policy.B", "b").with_evidence(
            Evidence::new().with_forbid_tuple([("env".to_string(), Value::from("prod"))]),
        )];
        assert!(extract_constraints(&violations, &space).is_empty());
    }
}
