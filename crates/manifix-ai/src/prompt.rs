//! Repair prompt construction for Kubernetes manifests

use manifix_core::Violation;
use manifix_k8s::K8sArtifact;
use std::fmt::Write;

const OPERATIONS_REFERENCE: &str = r#"Available patch operations:
- EnsureLabel: {"scope": "deployment"|"podTemplate"|"both", "key": <string>, "value": <string>}
- EnsureReplicas: {"replicas": <int>}
- EnsureImageVersion: {"container": <string>, "version": <tag or full ECR path>}
- EnsureResourceProfile: {"container": <string>, "profile": "small"|"medium"|"large"}
- EnsureSecurityBaseline: {"container": <string>}
- EnsurePriorityClass: {"name": <string>}"#;

const RESPONSE_FORMAT: &str = r#"Respond with ONLY a JSON object of this shape (no markdown, no prose):
{
  "template": {
    "ops": [
      {"op": "EnsureLabel", "args": {"scope": "podTemplate", "key": "env", "value": {"$hole": "env"}}},
      {"op": "EnsureReplicas", "args": {"replicas": {"$hole": "replicas"}}}
    ]
  },
  "hole_space": {
    "env": ["staging-us", "production-us"],
    "replicas": [3, 4, 5]
  }
}
Uncertain argument values must be hole references ({"$hole": "name"}), and
every referenced hole must have a list of candidate values in "hole_space"."#;

/// Build the one-shot repair prompt from the manifest and its violations.
pub(crate) fn build_repair_prompt(artifact: &K8sArtifact, violations: &[Violation]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are repairing a Kubernetes Deployment manifest that fails policy checks.\n\
         Propose a patch TEMPLATE with holes for the uncertain values; a synthesizer\n\
         will search the hole space for a combination that passes every check.\n\n",
    );

    prompt.push_str("Current manifest(s):\n");
    for (name, content) in artifact.files() {
        let _ = writeln!(prompt, "--- {name} ---\n{content}");
    }

    prompt.push_str("\nViolations to fix:\n");
    for violation in violations {
        let _ = writeln!(prompt, "- {}: {}", violation.id, violation.message);
    }

    let _ = write!(prompt, "\n{OPERATIONS_REFERENCE}\n\n{RESPONSE_FORMAT}");
    prompt
}
