//! Candidate enumeration with constraint pruning
//!
//! [`CandidateEnumerator`] walks the cross-product of the hole domains in
//! odometer order: holes in hole-space insertion order, the last hole's
//! value varying fastest. Candidates violating any held constraint are
//! skipped silently. Constraints may be added mid-enumeration; the odometer
//! position only ever advances, so already-skipped positions are never
//! revisited.

use crate::constraint::Constraint;
use crate::patch::{Assignment, HoleSpace, Value};
use tracing::debug;

/// Lazy producer of constraint-respecting assignments in odometer order.
pub struct CandidateEnumerator {
    holes: Vec<String>,
    domains: Vec<Vec<Value>>,
    indices: Vec<usize>,
    constraints: Vec<Constraint>,
    exhausted: bool,
    yielded: u64,
    pruned: u64,
}

impl CandidateEnumerator {
    /// Create an enumerator over `space`, pruned by `constraints`.
    ///
    /// A space with zero holes yields exactly one empty assignment (the
    /// cross-product of no domains); a hole with an empty domain makes the
    /// whole space empty.
    pub fn new(space: &HoleSpace, constraints: &[Constraint]) -> Self {
        let holes: Vec<String> = space.holes().map(str::to_string).collect();
        let domains: Vec<Vec<Value>> = space.iter().map(|(_, d)| d.to_vec()).collect();
        let exhausted = domains.iter().any(Vec::is_empty);
        CandidateEnumerator {
            indices: vec![0; holes.len()],
            holes,
            domains,
            constraints: constraints.to_vec(),
            exhausted,
            yielded: 0,
            pruned: 0,
        }
    }

    /// Add constraints mid-enumeration; subsequent yields respect them.
    ///
    /// The odometer position is kept, so nothing yielded before the
    /// addition is ever yielded again.
    pub fn add_constraints(&mut self, constraints: impl IntoIterator<Item = Constraint>) {
        self.constraints.extend(constraints);
    }

    /// Yield the next assignment that violates no held constraint.
    ///
    /// Returns `None` once the odometer has overflowed past the first
    /// hole's last value. Use [`Self::yielded`] and [`Self::pruned`] to
    /// distinguish exhaustion from everything-was-pruned.
    pub fn next_candidate(&mut self) -> Option<Assignment> {
        // Zero holes: the cross-product of no domains is one empty assignment.
        if self.holes.is_empty() {
            if self.exhausted {
                return None;
            }
            self.exhausted = true;
            self.yielded += 1;
            return Some(Assignment::new());
        }

        while !self.exhausted {
            let candidate = self.current();
            self.advance();
            if self.violates_any(&candidate) {
                self.pruned += 1;
                continue;
            }
            self.yielded += 1;
            return Some(candidate);
        }
        None
    }

    /// Whether the odometer has overflowed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of assignments yielded so far (pruned candidates do not count)
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Number of candidates skipped by constraint pruning
    pub fn pruned(&self) -> u64 {
        self.pruned
    }

    /// Total cross-product size, before any pruning
    pub fn domain_size(&self) -> u128 {
        self.domains.iter().map(|d| d.len() as u128).product()
    }

    fn current(&self) -> Assignment {
        self.holes
            .iter()
            .zip(&self.domains)
            .zip(&self.indices)
            .map(|((hole, domain), &i)| (hole.clone(), domain[i].clone()))
            .collect()
    }

    /// Odometer increment: bump the last index, carrying leftwards.
    fn advance(&mut self) {
        for i in (0..self.indices.len()).rev() {
            self.indices[i] += 1;
            if self.indices[i] < self.domains[i].len() {
                return;
            }
            self.indices[i] = 0;
        }
        self.exhausted = true;
        debug!(
            yielded = self.yielded,
            pruned = self.pruned,
            "candidate enumeration exhausted"
        );
    }

    fn violates_any(&self, candidate: &Assignment) -> bool {
        self.constraints.iter().any(|c| c.is_violated_by(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Value;

    fn space(entries: &[(&str, &[i64])]) -> HoleSpace {
        entries
            .iter()
            .map(|(hole, domain)| {
                (
                    hole.to_string(),
                    domain.iter().map(|&v| Value::from(v)).collect(),
                )
            })
            .collect()
    }

    fn drain(e: &mut CandidateEnumerator) -> Vec<Assignment> {
        let mut out = Vec::new();
        while let Some(a) = e.next_candidate() {
            out.push(a);
        }
        out
    }

    #[test]
    fn yields_cross_product_in_odometer_order() {
        let space = space(&[("a", &[1, 2]), ("b", &[10, 20, 30])]);
        let mut e = CandidateEnumerator::new(&space, &[]);
        let all = drain(&mut e);

        assert_eq!(all.len(), 6);
        // Last hole varies fastest
        let pairs: Vec<(i64, i64)> = all
            .iter()
            .map(|a| (a["a"].as_int().unwrap(), a["b"].as_int().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            [(1, 10), (1, 20), (1, 30), (2, 10), (2, 20), (2, 30)]
        );
        assert!(e.is_exhausted());
        assert_eq!(e.yielded(), 6);
        assert_eq!(e.pruned(), 0);
    }

    #[test]
    fn zero_holes_yield_one_empty_assignment() {
        let space = HoleSpace::new();
        let mut e = CandidateEnumerator::new(&space, &[]);
        assert_eq!(e.next_candidate(), Some(Assignment::new()));
        assert_eq!(e.next_candidate(), None);
        assert!(e.is_exhausted());
    }

    #[test]
    fn empty_domain_means_empty_space() {
        let mut s = HoleSpace::new();
        s.insert("a", [Value::from(1)]);
        s.insert("b", Vec::<Value>::new());
        let mut e = CandidateEnumerator::new(&s, &[]);
        assert_eq!(e.next_candidate(), None);
        assert!(e.is_exhausted());
        assert_eq!(e.yielded(), 0);
    }

    #[test]
    fn forbidden_value_prunes_whole_slice() {
        let space = space(&[("a", &[1, 2]), ("b", &[10, 20])]);
        let constraints = vec![Constraint::forbidden_value("a", 1)];
        let mut e = CandidateEnumerator::new(&space, &constraints);
        let all = drain(&mut e);

        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|a| a["a"] == Value::from(2)));
        assert_eq!(e.pruned(), 2);
    }

    #[test]
    fn forbidden_tuple_prunes_single_cell() {
        let space = space(&[("a", &[1, 2]), ("b", &[10, 20])]);
        let constraints = vec![Constraint::forbidden_tuple([
            ("a".to_string(), Value::from(1)),
            ("b".to_string(), Value::from(20)),
        ])];
        let mut e = CandidateEnumerator::new(&space, &constraints);
        let all = drain(&mut e);

        assert_eq!(all.len(), 3);
        assert!(!all
            .iter()
            .any(|a| a["a"] == Value::from(1) && a["b"] == Value::from(20)));
    }

    #[test]
    fn all_pruned_is_distinguishable_from_plain_exhaustion() {
        let space = space(&[("a", &[1])]);
        let constraints = vec![Constraint::forbidden_value("a", 1)];
        let mut e = CandidateEnumerator::new(&space, &constraints);
        assert_eq!(e.next_candidate(), None);
        assert!(e.is_exhausted());
        assert_eq!(e.yielded(), 0);
        assert_eq!(e.pruned(), 1);
    }

    #[test]
    fn constraints_added_mid_run_apply_to_later_yields_only() {
        let space = space(&[("a", &[1, 2, 3])]);
        let mut e = CandidateEnumerator::new(&space, &[]);

        let first = e.next_candidate().unwrap();
        assert_eq!(first["a"], Value::from(1));

        // Forbidding an already-yielded value must not rewind the odometer,
        // and forbidding a future value must prune it.
        e.add_constraints([
            Constraint::forbidden_value("a", 1),
            Constraint::forbidden_value("a", 2),
        ]);

        let rest = drain(&mut e);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["a"], Value::from(3));
        assert_eq!(e.pruned(), 1);
    }

    #[test]
    fn domain_size_is_product_of_domain_sizes() {
        let space = space(&[("a", &[1, 2]), ("b", &[10, 20, 30]), ("c", &[0])]);
        let e = CandidateEnumerator::new(&space, &[]);
        assert_eq!(e.domain_size(), 6);
    }
}
