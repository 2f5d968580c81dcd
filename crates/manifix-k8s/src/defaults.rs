//! Default repair template and sample manifests
//!
//! The default template is the controller's last resort when the bank misses
//! and no proposer is available (or its response is malformed). It covers
//! the common policy failures: labels, image version, security baseline,
//! resource profile, replica count and priority class.

use crate::artifact::K8sArtifact;
use crate::util::{containers, is_deployment, lookup_str, pod_template_label};
use manifix_core::{ArgValue, HoleSpace, PatchTemplate, TemplateOp, TemplateProposal, Value};
use std::collections::BTreeMap;

const ECR_REGISTRY: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";
const RELEASE_TAGS: [&str; 3] = ["prod-1.2.3", "prod-1.2.4", "prod-1.3.0"];

/// A compliant payments-api Deployment, used in tests and docs.
pub const BASELINE_DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: payments-api
  labels:
    app: payments-api
    env: production-us
    team: payments
    tier: backend
spec:
  replicas: 3
  priorityClassName: critical
  selector:
    matchLabels:
      app: payments-api
  template:
    metadata:
      labels:
        app: payments-api
        env: production-us
        team: payments
        tier: backend
    spec:
      containers:
      - name: payments-api
        image: 123456789012.dkr.ecr.us-east-1.amazonaws.com/production-us/payments-api:prod-1.2.3
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
";

/// The same Deployment after a careless edit: breaks policy, security and
/// labelling rules. The demo command repairs this manifest.
pub const BROKEN_DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: payments-api
  labels:
    app: payments-api
spec:
  replicas: 2
  selector:
    matchLabels:
      app: payments-api
  template:
    metadata:
      labels:
        app: payments-api
        env: prod
    spec:
      containers:
      - name: payments-api
        image: payments-api:latest
        resources:
          requests:
            cpu: \"100m\"
            memory: \"128Mi\"
";

/// Values extracted from the artifact to seed the default hole space.
#[derive(Default)]
struct Extracted {
    container: Option<String>,
    env: Option<String>,
    team: Option<String>,
    tier: Option<String>,
}

fn extract(artifact: &K8sArtifact) -> Extracted {
    let mut out = Extracted::default();
    for (_, content) in artifact.files() {
        let Ok(manifest) = serde_yaml::from_str::<serde_yaml::Value>(content) else {
            continue;
        };
        if !is_deployment(&manifest) {
            continue;
        }
        out.container = containers(&manifest)
            .first()
            .and_then(|c| lookup_str(c, &["name"]))
            .map(str::to_string);
        out.env = pod_template_label(&manifest, "env").map(str::to_string);
        out.team = pod_template_label(&manifest, "team").map(str::to_string);
        out.tier = pod_template_label(&manifest, "tier").map(str::to_string);
        break;
    }
    out
}

fn str_domain(first: Option<&str>, rest: &[&str]) -> Vec<Value> {
    let mut values: Vec<String> = Vec::new();
    if let Some(first) = first {
        values.push(first.to_string());
    }
    for v in rest {
        if !values.iter().any(|existing| existing == v) {
            values.push((*v).to_string());
        }
    }
    values.into_iter().map(Value::Str).collect()
}

/// Build the default template and hole space for `artifact`.
///
/// The container name and existing labels are read from the first
/// Deployment found; the hole domains keep the artifact's own values first
/// so the search prefers minimal changes.
pub fn default_proposal(artifact: &K8sArtifact) -> TemplateProposal {
    let extracted = extract(artifact);
    let container = extracted.container.unwrap_or_else(|| "app".to_string());

    let template = PatchTemplate::new(vec![
        TemplateOp::new(
            "EnsureLabel",
            [
                ("scope", ArgValue::concrete("podTemplate")),
                ("key", ArgValue::concrete("env")),
                ("value", ArgValue::hole("env")),
            ],
        ),
        TemplateOp::new(
            "EnsureLabel",
            [
                ("scope", ArgValue::concrete("podTemplate")),
                ("key", ArgValue::concrete("team")),
                ("value", ArgValue::hole("team")),
            ],
        ),
        TemplateOp::new(
            "EnsureLabel",
            [
                ("scope", ArgValue::concrete("podTemplate")),
                ("key", ArgValue::concrete("tier")),
                ("value", ArgValue::hole("tier")),
            ],
        ),
        TemplateOp::new(
            "EnsureImageVersion",
            [
                ("container", ArgValue::concrete(container.as_str())),
                ("version", ArgValue::hole("version")),
            ],
        ),
        TemplateOp::new(
            "EnsureSecurityBaseline",
            [("container", ArgValue::concrete(container.as_str()))],
        ),
        TemplateOp::new(
            "EnsureResourceProfile",
            [
                ("container", ArgValue::concrete(container.as_str())),
                ("profile", ArgValue::hole("profile")),
            ],
        ),
        TemplateOp::new("EnsureReplicas", [("replicas", ArgValue::hole("replicas"))]),
        TemplateOp::new(
            "EnsurePriorityClass",
            [("name", ArgValue::hole("priority_class"))],
        ),
    ]);

    // The artifact's own env first, then the standard environments.
    let env_domain = str_domain(
        extracted.env.as_deref(),
        &["production-us", "staging-us", "dev-us"],
    );

    // One release image per environment and tag, environment-major so the
    // matching env/version pairs line up early in the odometer.
    let version_domain: Vec<Value> = {
        let container = container.as_str();
        env_domain
            .iter()
            .filter_map(Value::as_str)
            .flat_map(|env| {
                RELEASE_TAGS
                    .iter()
                    .map(move |tag| Value::Str(format!("{ECR_REGISTRY}/{env}/{container}:{tag}")))
            })
            .collect()
    };

    let mut hole_space = HoleSpace::new();
    hole_space.insert("env", env_domain);
    hole_space.insert(
        "team",
        str_domain(extracted.team.as_deref(), &["payments", "platform", "data"]),
    );
    hole_space.insert(
        "tier",
        str_domain(extracted.tier.as_deref(), &["backend", "frontend", "data"]),
    );
    hole_space.insert("version", version_domain);
    hole_space.insert(
        "profile",
        ["small", "medium", "large"].map(Value::from),
    );
    hole_space.insert(
        "replicas",
        [2i64, 3, 4, 5].map(Value::from),
    );
    hole_space.insert(
        "priority_class",
        ["critical", "high-priority"].map(Value::from),
    );

    TemplateProposal {
        template,
        hole_space,
    }
}

/// Artifact context for repair signatures: application name and environment
/// of the first Deployment, when present.
pub fn artifact_context(artifact: &K8sArtifact) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    for (_, content) in artifact.files() {
        let Ok(manifest) = serde_yaml::from_str::<serde_yaml::Value>(content) else {
            continue;
        };
        if !is_deployment(&manifest) {
            continue;
        }
        if let Some(app) = lookup_str(&manifest, &["metadata", "name"]) {
            context.insert("app".to_string(), app.to_string());
        }
        if let Some(env) = pod_template_label(&manifest, "env") {
            context.insert("env".to_string(), env.to_string());
        }
        break;
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_extracts_app_and_env() {
        let artifact = K8sArtifact::from_files([(
            "deployment.yaml".to_string(),
            BROKEN_DEPLOYMENT.to_string(),
        )]);
        let context = artifact_context(&artifact);
        assert_eq!(context.get("app").map(String::as_str), Some("payments-api"));
        assert_eq!(context.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn proposal_is_internally_consistent() {
        let artifact = K8sArtifact::from_files([(
            "deployment.yaml".to_string(),
            BROKEN_DEPLOYMENT.to_string(),
        )]);
        let proposal = default_proposal(&artifact);
        proposal.validate().expect("every hole has a domain");
    }

    #[test]
    fn extracted_values_lead_their_domains() {
        let artifact = K8sArtifact::from_files([(
            "deployment.yaml".to_string(),
            BROKEN_DEPLOYMENT.to_string(),
        )]);
        let proposal = default_proposal(&artifact);

        let env = proposal.hole_space.get("env").unwrap();
        assert_eq!(env[0], Value::from("prod"));

        // Container name flows into the version domain
        let versions = proposal.hole_space.get("version").unwrap();
        assert!(versions[0]
            .as_str()
            .unwrap()
            .contains("/prod/payments-api:"));
    }

    #[test]
    fn unknown_container_falls_back_to_app() {
        let artifact =
            K8sArtifact::from_files([("empty.yaml".to_string(), "kind: Service".to_string())]);
        let proposal = default_proposal(&artifact);
        let versions = proposal.hole_space.get("version").unwrap();
        assert!(versions[0].as_str().unwrap().contains("/app:"));
    }
}
