//! Learned restrictions on hole assignments
//!
//! Constraints encode knowledge, learned from oracle evidence, about which
//! assignments always fail. The enumerator prunes candidates against the
//! current constraint list before yielding them; the repair bank persists
//! constraints so later runs start pruned.

use crate::patch::{Assignment, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate forbidding some assignments.
///
/// Tuples are kept canonical: hole/value pairs sorted jointly by hole name.
/// Use [`Constraint::forbidden_tuple`] rather than building the variant by
/// hand so equality and deduplication behave.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Constraint {
    /// Forbids any assignment mapping `hole` to `value`
    ForbiddenValue {
        /// Constrained hole
        hole: String,
        /// Forbidden value
        value: Value,
    },
    /// Forbids any assignment matching every listed hole/value pair at once
    ForbiddenTuple {
        /// Constrained holes, sorted by name
        holes: Vec<String>,
        /// Forbidden values, aligned with `holes`
        values: Vec<Value>,
    },
}

impl Constraint {
    /// Create a forbidden-value constraint
    pub fn forbidden_value(hole: impl Into<String>, value: impl Into<Value>) -> Self {
        Constraint::ForbiddenValue {
            hole: hole.into(),
            value: value.into(),
        }
    }

    /// Create a canonical forbidden-tuple constraint from hole/value pairs.
    ///
    /// Pairs are sorted jointly by hole name so that two tuples differing
    /// only in listing order compare equal.
    pub fn forbidden_tuple(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut pairs: Vec<(String, Value)> = pairs.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let (holes, values) = pairs.into_iter().unzip();
        Constraint::ForbiddenTuple { holes, values }
    }

    /// Return the canonical form of this constraint.
    ///
    /// Deserialised constraints may carry tuples in arbitrary pair order;
    /// canonicalising on load keeps set-union merges well-defined.
    pub fn canonical(self) -> Self {
        match self {
            Constraint::ForbiddenValue { .. } => self,
            Constraint::ForbiddenTuple { holes, values } => {
                Constraint::forbidden_tuple(holes.into_iter().zip(values))
            }
        }
    }

    /// Holes this constraint refers to
    pub fn holes(&self) -> impl Iterator<Item = &str> {
        match self {
            Constraint::ForbiddenValue { hole, .. } => std::slice::from_ref(hole).iter(),
            Constraint::ForbiddenTuple { holes, .. } => holes.iter(),
        }
        .map(String::as_str)
    }

    /// Whether `assignment` is forbidden by this constraint.
    ///
    /// A tuple only fires when every listed pair matches; a hole missing
    /// from the assignment never matches.
    pub fn is_violated_by(&self, assignment: &Assignment) -> bool {
        match self {
            Constraint::ForbiddenValue { hole, value } => {
                assignment.get(hole) == Some(value)
            }
            Constraint::ForbiddenTuple { holes, values } => holes
                .iter()
                .zip(values)
                .all(|(hole, value)| assignment.get(hole) == Some(value)),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ForbiddenValue { hole, value } => write!(f, "forbid {hole}={value}"),
            Constraint::ForbiddenTuple { holes, values } => {
                write!(f, "forbid ")?;
                for (i, (hole, value)) in holes.iter().zip(values).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{hole}={value}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Assignment;

    fn assignment(pairs: &[(&str, Value)]) -> Assignment {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn forbidden_value_matches_exact_binding() {
        let c = Constraint::forbidden_value("env", "prod");
        assert!(c.is_violated_by(&assignment(&[("env", Value::from("prod"))])));
        assert!(!c.is_violated_by(&assignment(&[("env", Value::from("staging"))])));
        assert!(!c.is_violated_by(&assignment(&[("other", Value::from("prod"))])));
    }

    #[test]
    fn forbidden_tuple_requires_all_pairs() {
        let c = Constraint::forbidden_tuple([
            ("env".to_string(), Value::from("prod")),
            ("replicas".to_string(), Value::from(2)),
        ]);
        assert!(c.is_violated_by(&assignment(&[
            ("env", Value::from("prod")),
            ("replicas", Value::from(2)),
        ])));
        assert!(!c.is_violated_by(&assignment(&[
            ("env", Value::from("prod")),
            ("replicas", Value::from(3)),
        ])));
        assert!(!c.is_violated_by(&assignment(&[("env", Value::from("prod"))])));
    }

    #[test]
    fn tuple_canonicalisation_sorts_pairs_jointly() {
        let a = Constraint::forbidden_tuple([
            ("replicas".to_string(), Value::from(2)),
            ("env".to_string(), Value::from("prod")),
        ]);
        let b = Constraint::forbidden_tuple([
            ("env".to_string(), Value::from("prod")),
            ("replicas".to_string(), Value::from(2)),
        ]);
        assert_eq!(a, b);

        let Constraint::ForbiddenTuple { holes, values } = &a else {
            panic!("expected tuple");
        };
        assert_eq!(holes, &["env".to_string(), "replicas".to_string()]);
        assert_eq!(values, &[Value::from("prod"), Value::from(2)]);
    }

    #[test]
    fn canonical_normalises_deserialised_tuples() {
        let raw = Constraint::ForbiddenTuple {
            holes: vec!["replicas".to_string(), "env".to_string()],
            values: vec![Value::from(2), Value::from("prod")],
        };
        let sorted = Constraint::forbidden_tuple([
            ("env".to_string(), Value::from("prod")),
            ("replicas".to_string(), Value::from(2)),
        ]);
        assert_ne!(raw, sorted);
        assert_eq!(raw.canonical(), sorted);
    }

    #[test]
    fn serde_uses_tagged_form() {
        let c = Constraint::forbidden_value("env", "prod");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "forbidden_value",
                "data": {"hole": "env", "value": "prod"}
            })
        );
        let back: Constraint = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
