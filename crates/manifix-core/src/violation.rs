//! Violations reported by oracles, with evidence usable for learning
//!
//! Evidence carries two recognised hint kinds, `forbid_value` and
//! `forbid_tuple`, which the constraint extractor turns into pruning
//! constraints. Anything else an oracle attaches is preserved in the
//! extension map and ignored by the core.

use crate::patch::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks compliance
    #[default]
    Error,
    /// Advisory; still blocks compliance for the engine
    Warning,
    /// Informational
    Info,
}

/// A single hole/value pair an oracle asserts always fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueHint {
    /// Constrained hole
    pub hole: String,
    /// Value that always fails
    pub value: Value,
}

/// A combination of hole values an oracle asserts always fails together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleHint {
    /// Constrained holes
    pub holes: Vec<String>,
    /// Values aligned with `holes`
    pub values: Vec<Value>,
}

/// Structured violation evidence.
///
/// `forbid_value` and `forbid_tuple` feed the constraint extractor;
/// `error_code` feeds signature construction; everything else lands in
/// `extra` and round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Oracle-specific error code, collected into repair signatures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Hole values asserted to always fail
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbid_value: Vec<ValueHint>,
    /// Hole-value combinations asserted to always fail together
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbid_tuple: Vec<TupleHint>,
    /// Unrecognised evidence keys, preserved but ignored by the core
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Evidence {
    /// Empty evidence
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an error code
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Add a forbid-value hint
    pub fn with_forbid_value(mut self, hole: impl Into<String>, value: impl Into<Value>) -> Self {
        self.forbid_value.push(ValueHint {
            hole: hole.into(),
            value: value.into(),
        });
        self
    }

    /// Add a forbid-tuple hint from hole/value pairs
    pub fn with_forbid_tuple(
        mut self,
        pairs: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let (holes, values) = pairs.into_iter().unzip();
        self.forbid_tuple.push(TupleHint { holes, values });
        self
    }

    /// Add an opaque extension entry
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A failed oracle check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Oracle-specific identifier, conventionally `<oracle>.<ERROR_CODE>`
    pub id: String,
    /// Human-readable description
    pub message: String,
    /// Location path within the artifact
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    /// Severity level
    #[serde(default)]
    pub severity: Severity,
    /// Evidence for the constraint extractor and signature builder
    #[serde(default)]
    pub evidence: Evidence,
}

impl Violation {
    /// Create an error-severity violation with empty evidence
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            id: id.into(),
            message: message.into(),
            path: Vec::new(),
            severity: Severity::Error,
            evidence: Evidence::new(),
        }
    }

    /// Set the location path
    pub fn at<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach evidence
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    /// The oracle prefix of the id (`policy` in `policy.ENV_PROD_REPLICA_COUNT`)
    pub fn oracle_id(&self) -> &str {
        self.id.split('.').next().unwrap_or(&self.id)
    }
}
