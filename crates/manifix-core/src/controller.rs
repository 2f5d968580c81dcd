//! Repair orchestration for a single request
//!
//! The controller ties the pieces together: verify the input, fingerprint
//! the failure, consult the repair bank, fall back to the template proposer
//! and then to the domain default, run one synthesis attempt, and store the
//! result in the bank on success. The bank is never mutated on failure.

use crate::bank::RepairBank;
use crate::constraint::Constraint;
use crate::patch::{Assignment, HoleSpace, PatchTemplate};
use crate::signature::Signature;
use crate::synthesize::{synthesize, SynthBudget, SynthError, SynthStatus};
use crate::verify::{Artifact, Verifier};
use crate::violation::Violation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from a template proposer.
#[derive(Debug, Error)]
pub enum ProposerError {
    /// The proposer is not configured or cannot be reached
    #[error("proposer unavailable: {0}")]
    Unavailable(String),
    /// The request was sent but failed
    #[error("proposer request failed: {0}")]
    RequestFailed(String),
    /// The response did not contain a usable template and hole space
    #[error("malformed proposer response: {0}")]
    Malformed(String),
}

/// A proposed template together with the hole space to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateProposal {
    /// Template with holes
    pub template: PatchTemplate,
    /// Domains for every hole the template references
    pub hole_space: HoleSpace,
}

impl TemplateProposal {
    /// Check the proposal is internally consistent: every referenced hole
    /// has a non-empty domain.
    pub fn validate(&self) -> Result<(), ProposerError> {
        for hole in self.template.holes() {
            match self.hole_space.get(hole) {
                None => {
                    return Err(ProposerError::Malformed(format!(
                        "template references hole '{hole}' absent from the hole space"
                    )))
                }
                Some([]) => {
                    return Err(ProposerError::Malformed(format!(
                        "hole '{hole}' has an empty domain"
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// External template source, asked once per repair when the bank misses.
#[async_trait]
pub trait TemplateProposer<A: Artifact + Sync>: Send + Sync {
    /// Propose a template and hole space for the given failure.
    async fn propose(
        &self,
        artifact: &A,
        violations: &[Violation],
    ) -> Result<TemplateProposal, ProposerError>;
}

/// Where the template used for synthesis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Reused from a repair bank hit
    Bank,
    /// Returned by the external proposer
    Proposer,
    /// Domain-supplied default
    Default,
}

/// Configuration for a repair request.
#[derive(Debug, Clone, Default)]
pub struct RepairConfig {
    /// Budgets handed to the synthesizer
    pub budget: SynthBudget,
}

impl RepairConfig {
    /// Override the synthesis budget
    pub fn with_budget(mut self, budget: SynthBudget) -> Self {
        self.budget = budget;
        self
    }
}

/// Outcome of one repair request.
#[derive(Debug, Clone)]
pub struct RepairReport<A: Artifact> {
    /// Termination status of the attempt
    pub status: SynthStatus,
    /// Repaired artifact on success; the original otherwise
    pub artifact: A,
    /// Winning assignment, when one was found
    pub assignment: Option<Assignment>,
    /// Constraints held at termination, useful for debugging failures
    pub constraints_learned: Vec<Constraint>,
    /// Candidates tested by the synthesizer
    pub candidates_tried: u32,
    /// Verify-learn iterations executed
    pub iterations: u32,
    /// Template provenance; `None` when no synthesis was needed
    pub template_source: Option<TemplateSource>,
    /// Whether the repair came from a bank hit
    pub bank_hit: bool,
}

/// Orchestrates bank lookup, template acquisition, synthesis and bank update
/// for single repair requests.
pub struct Controller<A: Artifact + Sync> {
    verifier: Verifier<A>,
    fallback: TemplateProposal,
    config: RepairConfig,
    bank: Option<RepairBank>,
    proposer: Option<Box<dyn TemplateProposer<A>>>,
}

impl<A: Artifact + Sync> Controller<A> {
    /// Create a controller with a verifier and the domain default template.
    pub fn new(verifier: Verifier<A>, fallback: TemplateProposal, config: RepairConfig) -> Self {
        Controller {
            verifier,
            fallback,
            config,
            bank: None,
            proposer: None,
        }
    }

    /// Attach a repair bank
    pub fn with_bank(mut self, bank: RepairBank) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Attach an external template proposer
    pub fn with_proposer(mut self, proposer: Box<dyn TemplateProposer<A>>) -> Self {
        self.proposer = Some(proposer);
        self
    }

    /// The attached bank, if any
    pub fn bank(&self) -> Option<&RepairBank> {
        self.bank.as_ref()
    }

    /// Run one repair request.
    ///
    /// `context` is folded into the signature used for bank lookup and
    /// storage (e.g. application name, environment).
    pub async fn repair(
        &mut self,
        artifact: &A,
        context: BTreeMap<String, String>,
    ) -> Result<RepairReport<A>, SynthError> {
        // Step 1: already compliant?
        let violations = self.verifier.verify(artifact);
        if violations.is_empty() {
            info!("no violations initially, nothing to repair");
            return Ok(RepairReport {
                status: SynthStatus::NoViolationsInitially,
                artifact: artifact.clone(),
                assignment: None,
                constraints_learned: Vec::new(),
                candidates_tried: 0,
                iterations: 0,
                template_source: None,
                bank_hit: false,
            });
        }

        // Step 2: fingerprint the failure.
        let signature = Signature::from_violations(&violations, context);
        info!(signature = %signature, violations = violations.len(), "built repair signature");

        // Step 3: acquire template, hole space and prior constraints.
        let (proposal, initial_constraints, source) =
            self.acquire_template(artifact, &violations, &signature).await;

        // Step 4: one synthesis attempt.
        let result = synthesize(
            artifact,
            &proposal.template,
            &proposal.hole_space,
            &self.verifier,
            &initial_constraints,
            &self.config.budget,
        )?;

        info!(
            status = ?result.status,
            candidates_tried = result.candidates_tried,
            constraints = result.constraints.len(),
            source = ?source,
            "synthesis finished"
        );

        // Step 5: memoise successful repairs. Failures never touch the bank.
        if result.status == SynthStatus::Success {
            if let (Some(bank), Some(assignment)) = (self.bank.as_mut(), result.assignment.as_ref())
            {
                if let Err(e) = bank.record_success(
                    signature,
                    &proposal.template,
                    &proposal.hole_space,
                    &result.constraints,
                    assignment,
                    result.candidates_tried,
                ) {
                    warn!(error = %e, "failed to persist repair bank");
                }
            }
        }

        let repaired = result.artifact.unwrap_or_else(|| artifact.clone());
        Ok(RepairReport {
            status: result.status,
            artifact: repaired,
            assignment: result.assignment,
            constraints_learned: result.constraints,
            candidates_tried: result.candidates_tried,
            iterations: result.iterations,
            template_source: Some(source),
            bank_hit: source == TemplateSource::Bank,
        })
    }

    /// Template priority: bank hit, then proposer, then the domain default.
    async fn acquire_template(
        &mut self,
        artifact: &A,
        violations: &[Violation],
        signature: &Signature,
    ) -> (TemplateProposal, Vec<Constraint>, TemplateSource) {
        if let Some(entry) = self.bank.as_ref().and_then(|b| b.lookup(signature)) {
            info!(
                constraints = entry.learned_constraints.len(),
                "bank hit, reusing stored template"
            );
            return (
                TemplateProposal {
                    template: entry.template.clone(),
                    hole_space: entry.hole_space.clone(),
                },
                entry.learned_constraints.clone(),
                TemplateSource::Bank,
            );
        }

        if let Some(proposer) = &self.proposer {
            info!("bank miss, asking template proposer");
            match proposer.propose(artifact, violations).await {
                Ok(proposal) => match proposal.validate() {
                    Ok(()) => {
                        info!(
                            ops = proposal.template.ops.len(),
                            holes = proposal.hole_space.len(),
                            "proposer returned template"
                        );
                        return (proposal, Vec::new(), TemplateSource::Proposer);
                    }
                    Err(e) => {
                        warn!(error = %e, "proposer returned malformed template, using default");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "proposer call failed, using default");
                }
            }
        }

        info!("using domain default template");
        (self.fallback.clone(), Vec::new(), TemplateSource::Default)
    }
}
