//! One counterexample-guided synthesis attempt
//!
//! The synthesizer drives the candidate enumerator and the verifier until a
//! candidate patch makes every oracle pass, or a termination condition
//! fires. Candidate patches are always applied to the ORIGINAL artifact:
//! patches are not idempotent across assignments, and stacking them would
//! confuse oracle evidence.

use crate::constraint::Constraint;
use crate::enumerate::CandidateEnumerator;
use crate::extract::extract_constraints;
use crate::patch::{Assignment, HoleSpace, PatchTemplate};
use crate::verify::{Artifact, Verifier};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Budgets for one synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthBudget {
    /// Maximum candidates to test before `BudgetExhausted`
    pub max_candidates: u32,
    /// Maximum consecutive constraint-free iterations before `NoProgress`
    pub max_iters: u32,
    /// Wall-clock deadline, checked between candidates
    pub timeout: Duration,
}

impl Default for SynthBudget {
    fn default() -> Self {
        SynthBudget {
            max_candidates: 1000,
            max_iters: 10,
            timeout: Duration::from_secs(60),
        }
    }
}

impl SynthBudget {
    /// Override the candidate budget
    pub fn with_max_candidates(mut self, max_candidates: u32) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Override the no-progress iteration budget
    pub fn with_max_iters(mut self, max_iters: u32) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Override the wall-clock deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Errors surfaced before enumeration begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    /// The template references a hole with no domain in the hole space
    #[error("template references hole '{hole}' with no domain in the hole space")]
    UnboundHole {
        /// Name of the unbound hole
        hole: String,
    },
}

/// How a synthesis attempt terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthStatus {
    /// The input artifact already passed every oracle
    NoViolationsInitially,
    /// A candidate patch made every oracle pass
    Success,
    /// Enumeration exhausted without a satisfying assignment
    Unsat,
    /// `max_candidates` candidates were tested
    BudgetExhausted,
    /// The wall-clock deadline was reached
    Timeout,
    /// `max_iters` consecutive iterations learned no new constraint
    NoProgress,
}

/// Outcome of one synthesis attempt.
#[derive(Debug, Clone)]
pub struct SynthResult<A: Artifact> {
    /// Termination status
    pub status: SynthStatus,
    /// Compliant artifact, present only when `status.is_success()`
    pub artifact: Option<A>,
    /// Winning assignment on success (empty when the input was already
    /// compliant); the last tested assignment otherwise, for debugging
    pub assignment: Option<Assignment>,
    /// All constraints held at termination: initial plus learned
    pub constraints: Vec<Constraint>,
    /// Candidates tested, including ones whose patch failed to apply
    pub candidates_tried: u32,
    /// Verify-learn iterations executed
    pub iterations: u32,
    /// Candidates whose patch the domain executor rejected
    pub apply_failures: u32,
}

/// Run one CEGIS attempt over `template` and `space` against `artifact`.
///
/// Fully deterministic in its inputs, clock aside: the same artifact,
/// template, hole space, oracle order, initial constraints and budgets
/// produce the same outcome whenever the deadline does not fire.
pub fn synthesize<A: Artifact>(
    artifact: &A,
    template: &PatchTemplate,
    space: &HoleSpace,
    verifier: &Verifier<A>,
    initial_constraints: &[Constraint],
    budget: &SynthBudget,
) -> Result<SynthResult<A>, SynthError> {
    // Every referenced hole must have a domain before enumeration begins.
    for hole in template.holes() {
        if !space.contains(hole) {
            return Err(SynthError::UnboundHole {
                hole: hole.to_string(),
            });
        }
    }

    let start = Instant::now();
    let mut constraints: Vec<Constraint> = Vec::with_capacity(initial_constraints.len());
    for constraint in initial_constraints {
        let constraint = constraint.clone().canonical();
        if !constraints.contains(&constraint) {
            constraints.push(constraint);
        }
    }

    // Initial verification: nothing to do for a compliant artifact.
    let initial_violations = verifier.verify(artifact);
    if initial_violations.is_empty() {
        info!("artifact already passes all oracles");
        return Ok(SynthResult {
            status: SynthStatus::NoViolationsInitially,
            artifact: Some(artifact.clone()),
            assignment: Some(Assignment::new()),
            constraints,
            candidates_tried: 0,
            iterations: 0,
            apply_failures: 0,
        });
    }

    // Seed the constraint set from the initial violations.
    for constraint in extract_constraints(&initial_violations, space) {
        if !constraints.contains(&constraint) {
            constraints.push(constraint);
        }
    }

    let mut enumerator = CandidateEnumerator::new(space, &constraints);
    info!(
        holes = space.len(),
        domain_size = enumerator.domain_size(),
        initial_constraints = constraints.len(),
        initial_violations = initial_violations.len(),
        "starting synthesis"
    );

    let mut candidates_tried: u32 = 0;
    let mut iterations: u32 = 0;
    let mut apply_failures: u32 = 0;
    let mut no_progress_streak: u32 = 0;
    let mut last_assignment: Option<Assignment> = None;

    let finish = |status: SynthStatus,
                  constraints: Vec<Constraint>,
                  last_assignment: Option<Assignment>,
                  candidates_tried: u32,
                  iterations: u32,
                  apply_failures: u32| SynthResult {
        status,
        artifact: None,
        assignment: last_assignment,
        constraints,
        candidates_tried,
        iterations,
        apply_failures,
    };

    loop {
        if candidates_tried >= budget.max_candidates {
            info!(candidates_tried, "candidate budget exhausted");
            return Ok(finish(
                SynthStatus::BudgetExhausted,
                constraints,
                last_assignment,
                candidates_tried,
                iterations,
                apply_failures,
            ));
        }
        if start.elapsed() >= budget.timeout {
            warn!(elapsed_ms = start.elapsed().as_millis() as u64, "synthesis timed out");
            return Ok(finish(
                SynthStatus::Timeout,
                constraints,
                last_assignment,
                candidates_tried,
                iterations,
                apply_failures,
            ));
        }

        let Some(candidate) = enumerator.next_candidate() else {
            info!(
                candidates_tried,
                pruned = enumerator.pruned(),
                "enumeration exhausted without a satisfying assignment"
            );
            return Ok(finish(
                SynthStatus::Unsat,
                constraints,
                last_assignment,
                candidates_tried,
                iterations,
                apply_failures,
            ));
        };

        candidates_tried += 1;
        debug!(candidate = ?candidate, n = candidates_tried, "testing candidate");

        let patch = crate::patch::instantiate(template, &candidate)
            .map_err(|e| SynthError::UnboundHole { hole: e.hole })?;

        // Always patch the original artifact, never a previously patched one.
        let patched = match artifact.apply(&patch) {
            Ok(patched) => patched,
            Err(e) => {
                warn!(error = %e, "patch application failed, skipping candidate");
                apply_failures += 1;
                last_assignment = Some(candidate);
                continue;
            }
        };

        let violations = verifier.verify(&patched);
        iterations += 1;
        if violations.is_empty() {
            info!(candidates_tried, iterations, "found satisfying assignment");
            return Ok(SynthResult {
                status: SynthStatus::Success,
                artifact: Some(patched),
                assignment: Some(candidate),
                constraints,
                candidates_tried,
                iterations,
                apply_failures,
            });
        }

        let learned: Vec<Constraint> = extract_constraints(&violations, space)
            .into_iter()
            .filter(|c| !constraints.contains(c))
            .collect();

        if learned.is_empty() {
            no_progress_streak += 1;
            if no_progress_streak >= budget.max_iters {
                info!(iterations, "no new constraints for {} iterations", no_progress_streak);
                return Ok(finish(
                    SynthStatus::NoProgress,
                    constraints,
                    Some(candidate),
                    candidates_tried,
                    iterations,
                    apply_failures,
                ));
            }
        } else {
            no_progress_streak = 0;
            debug!(count = learned.len(), "learned new constraints");
            constraints.extend(learned.iter().cloned());
            enumerator.add_constraints(learned);
        }

        last_assignment = Some(candidate);
    }
}
