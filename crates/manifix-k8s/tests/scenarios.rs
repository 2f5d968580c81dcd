//! End-to-end repair scenarios over the real oracles and patch executor
//!
//! Each scenario drives a Deployment manifest through the engine with a
//! template over the `{replicas, env}` holes and the standard oracle
//! sequence, exercising the policy rule "if env=prod then replicas must be
//! in [3,5]".

use manifix_core::{
    synthesize, ArgValue, Assignment, Controller, HoleSpace, PatchTemplate, ProposerError,
    RepairBank, RepairConfig, SynthBudget, SynthStatus, TemplateOp, TemplateProposal,
    TemplateProposer, TemplateSource, Value, Verifier, Violation,
};
use manifix_k8s::{standard_oracles, K8sArtifact};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A Deployment that is compliant except for the replica/env combination
/// under test: ECR image with a release tag, full security context, medium
/// resources, all required labels and a priority class.
fn manifest(replicas: i64, env: &str) -> String {
    format!(
        "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  labels:
    app: web
spec:
  replicas: {replicas}
  priorityClassName: critical
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
        env: {env}
        team: payments
        tier: backend
    spec:
      containers:
      - name: web
        image: 123456789012.dkr.ecr.us-east-1.amazonaws.com/staging-us/web:prod-1.2.3
        securityContext:
          runAsNonRoot: true
          allowPrivilegeEscalation: false
          readOnlyRootFilesystem: true
          capabilities:
            drop: [ALL]
        resources:
          requests:
            cpu: \"500m\"
            memory: \"512Mi\"
          limits:
            cpu: \"1000m\"
            memory: \"1Gi\"
"
    )
}

fn artifact(replicas: i64, env: &str) -> K8sArtifact {
    K8sArtifact::from_files([("deployment.yaml".to_string(), manifest(replicas, env))])
}

fn verifier() -> Verifier<K8sArtifact> {
    Verifier::new(standard_oracles())
}

/// Template `[EnsureReplicas(replicas=⟨replicas⟩), EnsureLabel(env=⟨env⟩)]`
fn template() -> PatchTemplate {
    PatchTemplate::new(vec![
        TemplateOp::new("EnsureReplicas", [("replicas", ArgValue::hole("replicas"))]),
        TemplateOp::new(
            "EnsureLabel",
            [
                ("scope", ArgValue::concrete("podTemplate")),
                ("key", ArgValue::concrete("env")),
                ("value", ArgValue::hole("env")),
            ],
        ),
    ])
}

fn space(replicas: &[i64], envs: &[&str]) -> HoleSpace {
    let mut s = HoleSpace::new();
    s.insert("replicas", replicas.iter().map(|&r| Value::from(r)));
    s.insert("env", envs.iter().map(|&e| Value::from(e)));
    s
}

fn proposal(replicas: &[i64], envs: &[&str]) -> TemplateProposal {
    TemplateProposal {
        template: template(),
        hole_space: space(replicas, envs),
    }
}

// ============================================================================
// Scenario A: already compliant
// ============================================================================

#[test]
fn scenario_a_compliant_artifact_is_left_alone() {
    let artifact = artifact(3, "prod");
    let result = synthesize(
        &artifact,
        &template(),
        &space(&[2, 3, 4, 5], &["staging", "prod"]),
        &verifier(),
        &[],
        &SynthBudget::default(),
    )
    .unwrap();

    assert_eq!(result.status, SynthStatus::NoViolationsInitially);
    assert_eq!(result.assignment, Some(Assignment::new()));
    assert_eq!(result.artifact.unwrap(), artifact);
}

// ============================================================================
// Scenario B: a single forbid_tuple repairs in one candidate
// ============================================================================

#[test]
fn scenario_b_tuple_hint_prunes_to_first_candidate() {
    let result = synthesize(
        &artifact(2, "prod"),
        &template(),
        &space(&[2, 3, 4, 5], &["staging", "prod"]),
        &verifier(),
        &[],
        &SynthBudget::default(),
    )
    .unwrap();

    assert_eq!(result.status, SynthStatus::Success);
    assert_eq!(result.candidates_tried, 1);

    let assignment = result.assignment.unwrap();
    assert_eq!(assignment["replicas"], Value::from(2));
    assert_eq!(assignment["env"], Value::from("staging"));

    // The repaired manifest passes every oracle and carries the new label
    let repaired = result.artifact.unwrap();
    assert!(verifier().verify(&repaired).is_empty());
    let yaml = repaired.file("deployment.yaml").unwrap();
    assert!(yaml.contains("env: staging"));
}

// ============================================================================
// Scenario C: unsatisfiable space
// ============================================================================

#[test]
fn scenario_c_unsat_with_one_learned_constraint() {
    let result = synthesize(
        &artifact(2, "prod"),
        &template(),
        &space(&[2], &["prod"]),
        &verifier(),
        &[],
        &SynthBudget::default(),
    )
    .unwrap();

    assert_eq!(result.status, SynthStatus::Unsat);
    assert_eq!(result.constraints.len(), 1);
    assert_eq!(result.candidates_tried, 0);
}

// ============================================================================
// Scenario D: candidate budget
// ============================================================================

#[test]
fn scenario_d_budget_exhausted_after_one_candidate() {
    // The initial hint prunes (prod, 2); the first yielded candidate
    // (prod, 6) still fails, and the budget of one is spent.
    let result = synthesize(
        &artifact(2, "prod"),
        &template(),
        &space(&[2, 6, 7, 8], &["prod"]),
        &verifier(),
        &[],
        &SynthBudget::default().with_max_candidates(1),
    )
    .unwrap();

    assert_eq!(result.status, SynthStatus::BudgetExhausted);
    assert_eq!(result.candidates_tried, 1);
    assert!(!result.constraints.is_empty());
}

// ============================================================================
// Scenario E: bank hit on the second run
// ============================================================================

struct CountingProposer {
    calls: Arc<AtomicUsize>,
    proposal: TemplateProposal,
}

#[async_trait::async_trait]
impl TemplateProposer<K8sArtifact> for CountingProposer {
    async fn propose(
        &self,
        _artifact: &K8sArtifact,
        _violations: &[Violation],
    ) -> Result<TemplateProposal, ProposerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.proposal.clone())
    }
}

#[tokio::test]
async fn scenario_e_bank_hit_skips_the_proposer() {
    let dir = tempfile::tempdir().unwrap();
    let bank_path = dir.path().join("bank.json");
    let calls = Arc::new(AtomicUsize::new(0));

    let run = |calls: Arc<AtomicUsize>| {
        let bank = RepairBank::open(&bank_path);
        Controller::new(
            verifier(),
            proposal(&[2, 3, 4, 5], &["staging", "prod"]),
            RepairConfig::default(),
        )
        .with_bank(bank)
        .with_proposer(Box::new(CountingProposer {
            calls,
            proposal: proposal(&[2, 3, 4, 5], &["staging", "prod"]),
        }))
    };

    let mut first = run(calls.clone());
    let report = first.repair(&artifact(2, "prod"), BTreeMap::new()).await.unwrap();
    assert_eq!(report.status, SynthStatus::Success);
    assert_eq!(report.template_source, Some(TemplateSource::Proposer));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.bank().unwrap().len(), 1);

    // Second run, fresh controller, same bank file: hit, no proposer call,
    // stored constraints prune the failing cell immediately.
    let mut second = run(calls.clone());
    let report = second.repair(&artifact(2, "prod"), BTreeMap::new()).await.unwrap();
    assert_eq!(report.status, SynthStatus::Success);
    assert!(report.bank_hit);
    assert_eq!(report.candidates_tried, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let bank = second.bank().unwrap();
    let entry = bank.iter().next().unwrap();
    assert_eq!(entry.metadata.success_count, 2);
}

// ============================================================================
// Scenario F: malformed proposer response falls back to the default
// ============================================================================

#[tokio::test]
async fn scenario_f_malformed_proposal_falls_back_to_default() {
    // The proposer references hole "x" that its own hole space does not
    // supply, which is malformed per the transport contract.
    let malformed = TemplateProposal {
        template: PatchTemplate::new(vec![TemplateOp::new(
            "EnsureReplicas",
            [("replicas", ArgValue::hole("x"))],
        )]),
        hole_space: HoleSpace::new(),
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let mut controller = Controller::new(
        verifier(),
        proposal(&[2, 3, 4, 5], &["staging", "prod"]),
        RepairConfig::default(),
    )
    .with_proposer(Box::new(CountingProposer {
        calls: calls.clone(),
        proposal: malformed,
    }));

    let report = controller
        .repair(&artifact(2, "prod"), BTreeMap::new())
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.template_source, Some(TemplateSource::Default));
    assert_eq!(report.status, SynthStatus::Success);
}
