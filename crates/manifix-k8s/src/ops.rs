//! Kubernetes patch operations
//!
//! Opcode strings are parsed into [`K8sOp`] as soon as the executor sees
//! them; the core engine treats the operation list as opaque. Each operation
//! edits Deployment manifests only and leaves other documents untouched.

use crate::util::{ensure_map, is_deployment, set_str};
use manifix_core::{Patch, PatchOp, Value as ArgVal};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors from parsing or applying a patch operation.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Opcode not known to this executor
    #[error("unknown patch operation '{0}'")]
    UnknownOp(String),
    /// A required argument was absent
    #[error("operation '{op}' is missing argument '{arg}'")]
    MissingArg {
        /// Opcode
        op: String,
        /// Missing argument name
        arg: String,
    },
    /// An argument had the wrong type
    #[error("operation '{op}' argument '{arg}' has the wrong type")]
    BadArg {
        /// Opcode
        op: String,
        /// Offending argument name
        arg: String,
    },
    /// Label scope outside deployment/podTemplate/both
    #[error("unknown label scope '{0}'")]
    UnknownScope(String),
    /// Resource profile outside small/medium/large
    #[error("unknown resource profile '{0}'")]
    UnknownProfile(String),
    /// A manifest failed to parse or re-serialise
    #[error("YAML error in '{file}': {source}")]
    Yaml {
        /// File the error occurred in
        file: String,
        /// Underlying serde_yaml error
        source: serde_yaml::Error,
    },
}

/// Where a label edit lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelScope {
    /// Deployment `metadata.labels` only
    Deployment,
    /// Pod template `spec.template.metadata.labels` only
    PodTemplate,
    /// Both label maps
    Both,
}

impl LabelScope {
    fn parse(s: &str) -> Result<Self, PatchError> {
        match s {
            "deployment" => Ok(LabelScope::Deployment),
            "podTemplate" => Ok(LabelScope::PodTemplate),
            "both" => Ok(LabelScope::Both),
            other => Err(PatchError::UnknownScope(other.to_string())),
        }
    }
}

/// Standard resource request/limit profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceProfile {
    /// 100m / 128Mi requests, 200m / 256Mi limits
    Small,
    /// 500m / 512Mi requests, 1000m / 1Gi limits
    Medium,
    /// 1000m / 1Gi requests, 2000m / 2Gi limits
    Large,
}

impl ResourceProfile {
    /// All profiles, in size order
    pub const ALL: [ResourceProfile; 3] = [
        ResourceProfile::Small,
        ResourceProfile::Medium,
        ResourceProfile::Large,
    ];

    /// Parse a profile name
    pub fn parse(s: &str) -> Result<Self, PatchError> {
        match s {
            "small" => Ok(ResourceProfile::Small),
            "medium" => Ok(ResourceProfile::Medium),
            "large" => Ok(ResourceProfile::Large),
            other => Err(PatchError::UnknownProfile(other.to_string())),
        }
    }

    /// Profile name as used in hole domains and oracle messages
    pub fn name(self) -> &'static str {
        match self {
            ResourceProfile::Small => "small",
            ResourceProfile::Medium => "medium",
            ResourceProfile::Large => "large",
        }
    }

    /// (cpu, memory) requests
    pub fn requests(self) -> (&'static str, &'static str) {
        match self {
            ResourceProfile::Small => ("100m", "128Mi"),
            ResourceProfile::Medium => ("500m", "512Mi"),
            ResourceProfile::Large => ("1000m", "1Gi"),
        }
    }

    /// (cpu, memory) limits
    pub fn limits(self) -> (&'static str, &'static str) {
        match self {
            ResourceProfile::Small => ("200m", "256Mi"),
            ResourceProfile::Medium => ("1000m", "1Gi"),
            ResourceProfile::Large => ("2000m", "2Gi"),
        }
    }

    /// The profile whose requests match exactly, if any
    pub fn matching(cpu: &str, memory: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.requests() == (cpu, memory))
    }
}

/// A parsed patch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum K8sOp {
    /// Add or update a label
    EnsureLabel {
        /// Which label map(s) to edit
        scope: LabelScope,
        /// Label key
        key: String,
        /// Label value
        value: String,
    },
    /// Set `spec.replicas`
    EnsureReplicas {
        /// Replica count
        replicas: i64,
    },
    /// Set a container's image version or full image path
    EnsureImageVersion {
        /// Container name
        container: String,
        /// Tag, or a full registry path which replaces the image outright
        version: String,
    },
    /// Set a container's resources from a standard profile
    EnsureResourceProfile {
        /// Container name
        container: String,
        /// Profile to apply
        profile: ResourceProfile,
    },
    /// Enforce the security baseline on a container
    EnsureSecurityBaseline {
        /// Container name
        container: String,
    },
    /// Set `spec.priorityClassName`; removes it when `name` is absent
    EnsurePriorityClass {
        /// Priority class, or `None` to remove
        name: Option<String>,
    },
}

fn str_arg(op: &PatchOp, arg: &str) -> Result<String, PatchError> {
    match op.args.get(arg) {
        Some(ArgVal::Str(s)) => Ok(s.clone()),
        Some(_) => Err(PatchError::BadArg {
            op: op.op.clone(),
            arg: arg.to_string(),
        }),
        None => Err(PatchError::MissingArg {
            op: op.op.clone(),
            arg: arg.to_string(),
        }),
    }
}

fn int_arg(op: &PatchOp, arg: &str) -> Result<i64, PatchError> {
    match op.args.get(arg) {
        Some(ArgVal::Int(i)) => Ok(*i),
        Some(_) => Err(PatchError::BadArg {
            op: op.op.clone(),
            arg: arg.to_string(),
        }),
        None => Err(PatchError::MissingArg {
            op: op.op.clone(),
            arg: arg.to_string(),
        }),
    }
}

impl K8sOp {
    /// Parse an opcode and argument map into a typed operation.
    pub fn parse(op: &PatchOp) -> Result<Self, PatchError> {
        match op.op.as_str() {
            "EnsureLabel" => Ok(K8sOp::EnsureLabel {
                scope: match op.args.get("scope") {
                    Some(ArgVal::Str(s)) => LabelScope::parse(s)?,
                    Some(_) => {
                        return Err(PatchError::BadArg {
                            op: op.op.clone(),
                            arg: "scope".to_string(),
                        })
                    }
                    None => LabelScope::Both,
                },
                key: str_arg(op, "key")?,
                value: str_arg(op, "value")?,
            }),
            "EnsureReplicas" => Ok(K8sOp::EnsureReplicas {
                replicas: int_arg(op, "replicas")?,
            }),
            "EnsureImageVersion" => Ok(K8sOp::EnsureImageVersion {
                container: str_arg(op, "container")?,
                version: str_arg(op, "version")?,
            }),
            "EnsureResourceProfile" => Ok(K8sOp::EnsureResourceProfile {
                container: str_arg(op, "container")?,
                profile: ResourceProfile::parse(&str_arg(op, "profile")?)?,
            }),
            "EnsureSecurityBaseline" => Ok(K8sOp::EnsureSecurityBaseline {
                container: str_arg(op, "container")?,
            }),
            "EnsurePriorityClass" => Ok(K8sOp::EnsurePriorityClass {
                name: match op.args.get("name") {
                    Some(ArgVal::Str(s)) => Some(s.clone()),
                    Some(_) => {
                        return Err(PatchError::BadArg {
                            op: op.op.clone(),
                            arg: "name".to_string(),
                        })
                    }
                    None => None,
                },
            }),
            other => Err(PatchError::UnknownOp(other.to_string())),
        }
    }
}

/// Apply a whole patch to a set of YAML files, producing new content.
pub(crate) fn apply_patch(
    files: &BTreeMap<String, String>,
    patch: &Patch,
) -> Result<BTreeMap<String, String>, PatchError> {
    let ops: Vec<K8sOp> = patch.ops.iter().map(K8sOp::parse).collect::<Result<_, _>>()?;
    debug!(ops = ops.len(), files = files.len(), "applying patch");

    let mut result = files.clone();
    for (file, content) in &mut result {
        let mut manifest: Value =
            serde_yaml::from_str(content).map_err(|source| PatchError::Yaml {
                file: file.clone(),
                source,
            })?;
        if !is_deployment(&manifest) {
            continue;
        }
        for op in &ops {
            apply_op(&mut manifest, op);
        }
        *content = serde_yaml::to_string(&manifest).map_err(|source| PatchError::Yaml {
            file: file.clone(),
            source,
        })?;
    }
    Ok(result)
}

fn apply_op(manifest: &mut Value, op: &K8sOp) {
    let Some(root) = manifest.as_mapping_mut() else {
        return;
    };
    match op {
        K8sOp::EnsureLabel { scope, key, value } => {
            if matches!(scope, LabelScope::Deployment | LabelScope::Both) {
                let labels = ensure_map(ensure_map(root, "metadata"), "labels");
                set_str(labels, key, value);
            }
            if matches!(scope, LabelScope::PodTemplate | LabelScope::Both) {
                let spec = ensure_map(root, "spec");
                let metadata = ensure_map(ensure_map(spec, "template"), "metadata");
                set_str(ensure_map(metadata, "labels"), key, value);
            }
        }
        K8sOp::EnsureReplicas { replicas } => {
            ensure_map(root, "spec").insert(
                Value::String("replicas".to_string()),
                Value::Number((*replicas).into()),
            );
        }
        K8sOp::EnsureImageVersion { container, version } => {
            for c in containers_mut(root) {
                if crate::util::container_name(c) != container {
                    continue;
                }
                let current = crate::util::lookup_str(c, &["image"]).unwrap_or_default();
                // A full registry path replaces the image outright; a bare
                // tag is appended to the existing image base.
                let image = if version.contains(".dkr.ecr.")
                    || version.starts_with("http://")
                    || version.starts_with("https://")
                {
                    version.clone()
                } else {
                    let base = match current.split_once(':') {
                        Some((base, _)) => base,
                        None if current.is_empty() => container.as_str(),
                        None => current,
                    };
                    format!("{base}:{version}")
                };
                if let Some(map) = c.as_mapping_mut() {
                    set_str(map, "image", &image);
                }
            }
        }
        K8sOp::EnsureResourceProfile { container, profile } => {
            let (req_cpu, req_mem) = profile.requests();
            let (lim_cpu, lim_mem) = profile.limits();
            for c in containers_mut(root) {
                if crate::util::container_name(c) != container {
                    continue;
                }
                if let Some(map) = c.as_mapping_mut() {
                    let resources = ensure_map(map, "resources");
                    let requests = ensure_map(resources, "requests");
                    set_str(requests, "cpu", req_cpu);
                    set_str(requests, "memory", req_mem);
                    let limits = ensure_map(resources, "limits");
                    set_str(limits, "cpu", lim_cpu);
                    set_str(limits, "memory", lim_mem);
                }
            }
        }
        K8sOp::EnsureSecurityBaseline { container } => {
            for c in containers_mut(root) {
                if crate::util::container_name(c) != container {
                    continue;
                }
                if let Some(map) = c.as_mapping_mut() {
                    let ctx = ensure_map(map, "securityContext");
                    ctx.insert(
                        Value::String("runAsNonRoot".to_string()),
                        Value::Bool(true),
                    );
                    ctx.insert(
                        Value::String("allowPrivilegeEscalation".to_string()),
                        Value::Bool(false),
                    );
                    ctx.insert(
                        Value::String("readOnlyRootFilesystem".to_string()),
                        Value::Bool(true),
                    );
                    let caps = ensure_map(ctx, "capabilities");
                    caps.insert(
                        Value::String("drop".to_string()),
                        Value::Sequence(vec![Value::String("ALL".to_string())]),
                    );
                }
            }
        }
        K8sOp::EnsurePriorityClass { name } => {
            let spec = ensure_map(root, "spec");
            let key = Value::String("priorityClassName".to_string());
            match name {
                Some(name) => {
                    spec.insert(key, Value::String(name.clone()));
                }
                None => {
                    spec.remove(&key);
                }
            }
        }
    }
}

fn containers_mut(root: &mut Mapping) -> impl Iterator<Item = &mut Value> {
    root.get_mut(Value::String("spec".to_string()))
        .and_then(Value::as_mapping_mut)
        .and_then(|spec| spec.get_mut(Value::String("template".to_string())))
        .and_then(Value::as_mapping_mut)
        .and_then(|tpl| tpl.get_mut(Value::String("spec".to_string())))
        .and_then(Value::as_mapping_mut)
        .and_then(|pod| pod.get_mut(Value::String("containers".to_string())))
        .and_then(Value::as_sequence_mut)
        .map(|seq| seq.iter_mut())
        .into_iter()
        .flatten()
}
