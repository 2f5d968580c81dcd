//! Deployment oracles: policy, schema, security and resource checks
//!
//! Every oracle here is pure and total over YAML text: unparseable input
//! becomes a violation with a distinguished error code, never a panic.
//! Policy violations carry constraint hints (`forbid_value`, `forbid_tuple`)
//! so the synthesizer can prune the search space instead of rediscovering
//! the same failure.

use crate::artifact::K8sArtifact;
use crate::ops::ResourceProfile;
use crate::util::{containers, is_deployment, lookup, lookup_str, pod_template_label};
use manifix_core::{Evidence, Oracle, Severity, Value as ArgVal, Violation};
use regex::Regex;
use serde_yaml::Value;
use std::sync::Arc;
use tracing::debug;

/// ECR image format: `<account>.dkr.ecr.<region>.amazonaws.com/<repo>:<tag>`
const ECR_PATTERN: &str = r"^(\d{12})\.dkr\.ecr\.([^.]+)\.amazonaws\.com/(.+)$";

/// Replica counts allowed for production deployments
const PROD_REPLICAS: std::ops::RangeInclusive<i64> = 3..=5;

/// The standard oracle sequence, in the order the verifier runs them.
pub fn standard_oracles() -> Vec<Arc<dyn Oracle<K8sArtifact>>> {
    vec![
        Arc::new(PolicyOracle::new()),
        Arc::new(SchemaOracle),
        Arc::new(SecurityOracle),
        Arc::new(ResourceOracle),
    ]
}

/// Org policy checks for Deployment manifests.
///
/// Rules:
/// - images must come from ECR, and the repository or tag must mention the
///   deployment's `env` label
/// - `env=prod` requires replicas in \[3,5\], a non-small resource profile,
///   a release image tag, the `env`/`team`/`tier` labels, and a
///   `priorityClassName`
pub struct PolicyOracle {
    ecr: Option<Regex>,
}

impl PolicyOracle {
    /// Create the oracle
    pub fn new() -> Self {
        PolicyOracle {
            ecr: Regex::new(ECR_PATTERN).ok(),
        }
    }

    fn check_manifest(&self, file: &str, manifest: &Value, violations: &mut Vec<Violation>) {
        let env = pod_template_label(manifest, "env").unwrap_or_default();
        let replicas = lookup(manifest, &["spec", "replicas"]).and_then(Value::as_i64);
        let priority_class = lookup_str(manifest, &["spec", "priorityClassName"]);
        let profile = infer_profile(manifest);
        let image = containers(manifest)
            .first()
            .and_then(|c| lookup_str(c, &["image"]))
            .unwrap_or_default();
        let image_tag = image.rsplit_once(':').map(|(_, tag)| tag).unwrap_or_default();

        if !image.is_empty() {
            self.check_ecr(file, image, env, violations);
        }

        if env != "prod" {
            return;
        }

        if let Some(replicas) = replicas {
            if !PROD_REPLICAS.contains(&replicas) {
                violations.push(
                    Violation::error(
                        "policy.ENV_PROD_REPLICA_COUNT",
                        format!("env=prod requires replicas in [3,5], got {replicas}"),
                    )
                    .at([file, "spec", "replicas"])
                    .with_evidence(
                        Evidence::new()
                            .with_error_code("ENV_PROD_REPLICA_COUNT")
                            .with_forbid_tuple([
                                ("env".to_string(), ArgVal::from("prod")),
                                ("replicas".to_string(), ArgVal::from(replicas)),
                            ]),
                    ),
                );
            }
        }

        if profile.as_deref() == Some("small") {
            violations.push(
                Violation::error(
                    "policy.ENV_PROD_PROFILE_SMALL",
                    "env=prod requires profile in {medium, large}, got small",
                )
                .at([file, "spec", "template", "spec", "containers"])
                .with_evidence(
                    Evidence::new()
                        .with_error_code("ENV_PROD_PROFILE_SMALL")
                        .with_forbid_tuple([
                            ("env".to_string(), ArgVal::from("prod")),
                            ("profile".to_string(), ArgVal::from("small")),
                        ]),
                ),
            );
        }

        if !image_tag.is_empty() && (image_tag == "latest" || image_tag.contains("staging")) {
            violations.push(
                Violation::error(
                    "policy.ENV_PROD_IMAGE_TAG",
                    format!("env=prod requires a release tag, got {image_tag}"),
                )
                .at([file, "spec", "template", "spec", "containers", "image"])
                .with_evidence(Evidence::new().with_error_code("ENV_PROD_IMAGE_TAG")),
            );
        }

        for label in ["env", "team", "tier"] {
            if pod_template_label(manifest, label).unwrap_or_default().is_empty() {
                let code = format!("MISSING_LABEL_{}", label.to_uppercase());
                violations.push(
                    Violation::error(format!("policy.{code}"), format!("env=prod requires label '{label}'"))
                        .at([file, "spec", "template", "metadata", "labels"])
                        .with_evidence(Evidence::new().with_error_code(code)),
                );
            }
        }

        if priority_class.unwrap_or_default().is_empty() {
            violations.push(
                Violation::error(
                    "policy.MISSING_PRIORITY_CLASS",
                    "env=prod requires priorityClassName to be set",
                )
                .at([file, "spec", "priorityClassName"])
                .with_evidence(Evidence::new().with_error_code("MISSING_PRIORITY_CLASS")),
            );
        }
    }

    fn check_ecr(&self, file: &str, image: &str, env: &str, violations: &mut Vec<Violation>) {
        let Some(ecr) = &self.ecr else {
            return;
        };
        let Some(captures) = ecr.captures(image) else {
            violations.push(
                Violation::error(
                    "policy.IMAGE_NOT_FROM_ECR",
                    format!("image must come from AWS ECR, got {image}"),
                )
                .at([file, "spec", "template", "spec", "containers", "image"])
                .with_evidence(
                    Evidence::new()
                        .with_error_code("IMAGE_NOT_FROM_ECR")
                        .with_forbid_value("version", image),
                ),
            );
            return;
        };

        if env.is_empty() {
            return;
        }
        let repo_and_tag = &captures[3];
        let (repo, tag) = repo_and_tag
            .rsplit_once(':')
            .unwrap_or((repo_and_tag, ""));
        let env_lower = env.to_lowercase();
        if !repo.to_lowercase().contains(&env_lower) && !tag.to_lowercase().contains(&env_lower) {
            violations.push(
                Violation::error(
                    "policy.ECR_ENV_MISMATCH",
                    format!("ECR image must match environment '{env}', got {image}"),
                )
                .at([file, "spec", "template", "spec", "containers", "image"])
                .with_evidence(
                    Evidence::new()
                        .with_error_code("ECR_ENV_MISMATCH")
                        .with_forbid_tuple([
                            ("env".to_string(), ArgVal::from(env)),
                            ("version".to_string(), ArgVal::from(image)),
                        ]),
                ),
            );
        }
    }
}

impl Default for PolicyOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle<K8sArtifact> for PolicyOracle {
    fn id(&self) -> &str {
        "policy"
    }

    fn check(&self, artifact: &K8sArtifact) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (file, content) in artifact.files() {
            match serde_yaml::from_str::<Value>(content) {
                Ok(manifest) if is_deployment(&manifest) => {
                    self.check_manifest(file, &manifest, &mut violations);
                }
                Ok(_) => {}
                Err(e) => violations.push(
                    Violation::error("policy.INVALID_YAML", format!("failed to parse YAML: {e}"))
                        .at([file])
                        .with_evidence(Evidence::new().with_error_code("INVALID_YAML")),
                ),
            }
        }
        if !violations.is_empty() {
            debug!(count = violations.len(), "policy check found violations");
        }
        violations
    }
}

/// Structural checks: the fields every Deployment must carry.
pub struct SchemaOracle;

impl Oracle<K8sArtifact> for SchemaOracle {
    fn id(&self) -> &str {
        "schema"
    }

    fn check(&self, artifact: &K8sArtifact) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (file, content) in artifact.files() {
            let manifest: Value = match serde_yaml::from_str(content) {
                Ok(manifest) => manifest,
                Err(e) => {
                    violations.push(
                        Violation::error("schema.INVALID_YAML", format!("failed to parse YAML: {e}"))
                            .at([file])
                            .with_evidence(Evidence::new().with_error_code("INVALID_YAML")),
                    );
                    continue;
                }
            };
            if !is_deployment(&manifest) {
                continue;
            }

            let mut missing = |field: &str| {
                violations.push(
                    Violation::error(
                        "schema.MISSING_FIELD",
                        format!("Deployment is missing required field '{field}'"),
                    )
                    .at([file])
                    .with_evidence(
                        Evidence::new()
                            .with_error_code("MISSING_FIELD")
                            .with_extra("field", serde_json::Value::String(field.to_string())),
                    ),
                );
            };

            if lookup_str(&manifest, &["apiVersion"]).unwrap_or_default().is_empty() {
                missing("apiVersion");
            }
            if lookup_str(&manifest, &["metadata", "name"]).unwrap_or_default().is_empty() {
                missing("metadata.name");
            }
            let cs = containers(&manifest);
            if cs.is_empty() {
                missing("spec.template.spec.containers");
            }
            for container in cs {
                if lookup_str(container, &["name"]).unwrap_or_default().is_empty() {
                    missing("containers[].name");
                }
                if lookup_str(container, &["image"]).unwrap_or_default().is_empty() {
                    missing("containers[].image");
                }
            }
        }
        violations
    }
}

/// Security baseline: containers must refuse root and privilege escalation.
pub struct SecurityOracle;

impl Oracle<K8sArtifact> for SecurityOracle {
    fn id(&self) -> &str {
        "security"
    }

    fn check(&self, artifact: &K8sArtifact) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (file, content) in artifact.files() {
            let manifest: Value = match serde_yaml::from_str(content) {
                Ok(manifest) => manifest,
                Err(e) => {
                    violations.push(
                        Violation::error("security.ORACLE_ERROR", format!("failed to parse YAML: {e}"))
                            .at([file])
                            .with_evidence(Evidence::new().with_error_code("ORACLE_ERROR")),
                    );
                    continue;
                }
            };
            if !is_deployment(&manifest) {
                continue;
            }
            for container in containers(&manifest) {
                let name = crate::util::container_name(container);
                let run_as_non_root = lookup(container, &["securityContext", "runAsNonRoot"])
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !run_as_non_root {
                    violations.push(
                        Violation::error(
                            format!("security.NO_RUN_AS_NON_ROOT.{name}"),
                            format!("container {name} must set runAsNonRoot=true"),
                        )
                        .with_evidence(Evidence::new().with_error_code("NO_RUN_AS_NON_ROOT")),
                    );
                }
                let no_escalation =
                    lookup(container, &["securityContext", "allowPrivilegeEscalation"])
                        .and_then(Value::as_bool)
                        == Some(false);
                if !no_escalation {
                    violations.push(
                        Violation::error(
                            format!("security.PRIVILEGE_ESCALATION.{name}"),
                            format!("container {name} must set allowPrivilegeEscalation=false"),
                        )
                        .with_evidence(Evidence::new().with_error_code("PRIVILEGE_ESCALATION")),
                    );
                }
            }
        }
        violations
    }
}

/// Resource checks: requests must exist and should match a standard profile.
pub struct ResourceOracle;

impl Oracle<K8sArtifact> for ResourceOracle {
    fn id(&self) -> &str {
        "resource"
    }

    fn check(&self, artifact: &K8sArtifact) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (file, content) in artifact.files() {
            let manifest: Value = match serde_yaml::from_str(content) {
                Ok(manifest) => manifest,
                Err(e) => {
                    violations.push(
                        Violation::error("resource.ORACLE_ERROR", format!("failed to parse YAML: {e}"))
                            .at([file])
                            .with_evidence(Evidence::new().with_error_code("ORACLE_ERROR")),
                    );
                    continue;
                }
            };
            if !is_deployment(&manifest) {
                continue;
            }
            for container in containers(&manifest) {
                let name = crate::util::container_name(container);
                let has_resources = lookup(container, &["resources"])
                    .and_then(Value::as_mapping)
                    .is_some_and(|m| !m.is_empty());
                if !has_resources {
                    violations.push(
                        Violation::error(
                            format!("resource.MISSING_RESOURCES.{name}"),
                            format!("container {name} must specify resources"),
                        )
                        .with_evidence(Evidence::new().with_error_code("MISSING_RESOURCES")),
                    );
                    continue;
                }

                let cpu = lookup_str(container, &["resources", "requests", "cpu"]).unwrap_or_default();
                let memory =
                    lookup_str(container, &["resources", "requests", "memory"]).unwrap_or_default();
                if cpu.is_empty() || memory.is_empty() {
                    continue;
                }
                if ResourceProfile::matching(cpu, memory).is_none()
                    && (cpu.contains("100m") || memory.contains("128Mi"))
                {
                    violations.push(
                        Violation::error(
                            format!("resource.NONSTANDARD_PROFILE.{name}"),
                            format!("container {name} resources do not match a standard profile"),
                        )
                        .with_severity(Severity::Warning)
                        .with_evidence(Evidence::new().with_error_code("NONSTANDARD_PROFILE")),
                    );
                }
            }
        }
        violations
    }
}

/// Infer the resource profile of the first container from its requests.
fn infer_profile(manifest: &Value) -> Option<String> {
    let container = containers(manifest).first()?;
    let cpu = lookup_str(container, &["resources", "requests", "cpu"]).unwrap_or_default();
    let memory = lookup_str(container, &["resources", "requests", "memory"]).unwrap_or_default();
    if let Some(profile) = ResourceProfile::matching(cpu, memory) {
        return Some(profile.name().to_string());
    }
    // Close-enough matches still classify, so policy can catch "small"
    if cpu.contains("100m") || memory.contains("128Mi") {
        Some("small".to_string())
    } else if cpu.contains("500m") || memory.contains("512Mi") {
        Some("medium".to_string())
    } else if cpu.contains("1000m") || memory.contains("1Gi") {
        Some("large".to_string())
    } else {
        None
    }
}
