//! Patch model: operations, templates, holes and instantiation
//!
//! A [`PatchTemplate`] is a sequence of operations whose arguments may
//! reference named holes. The synthesizer enumerates assignments from a
//! [`HoleSpace`] and calls [`instantiate`] to obtain a concrete [`Patch`]
//! ready to hand to the domain executor.
//!
//! Templates and hole spaces are immutable once a synthesis attempt starts;
//! the same hole name used in multiple operations refers to the same value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A primitive argument or domain value.
///
/// Constraint canonicalisation only needs equality and a total order, so a
/// small sum of primitives is enough; structured manifest edits are expressed
/// through operation arguments, not through nested values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// UTF-8 string value
    Str(String),
    /// Signed integer value
    Int(i64),
    /// Boolean value
    Bool(bool),
}

impl Value {
    /// View as a string slice, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// View as an integer, if this is an integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A template argument: either a concrete value or a reference to a hole.
///
/// Hole references serialise as `{"$hole": "name"}` in the bank and proposer
/// transport formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Reference to a named hole, filled in at instantiation time
    Hole {
        /// Name of the referenced hole
        #[serde(rename = "$hole")]
        hole: String,
    },
    /// Concrete value, copied through unchanged
    Concrete(Value),
}

impl ArgValue {
    /// Create a hole reference
    pub fn hole(name: impl Into<String>) -> Self {
        ArgValue::Hole { hole: name.into() }
    }

    /// Create a concrete argument
    pub fn concrete(value: impl Into<Value>) -> Self {
        ArgValue::Concrete(value.into())
    }
}

/// A single operation in a patch template; arguments may reference holes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOp {
    /// Domain-defined opcode; the executor parses these into its own enum
    pub op: String,
    /// Named arguments, in declaration order
    pub args: IndexMap<String, ArgValue>,
}

impl TemplateOp {
    /// Create an operation from an opcode and argument list
    pub fn new(
        op: impl Into<String>,
        args: impl IntoIterator<Item = (&'static str, ArgValue)>,
    ) -> Self {
        TemplateOp {
            op: op.into(),
            args: args
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

/// Optional template provenance carried alongside the operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMeta {
    /// Identity of the artifact the template was authored for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Template version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A patch with holes: the shape the synthesizer searches over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTemplate {
    /// Operations applied left to right
    pub ops: Vec<TemplateOp>,
    /// Optional provenance metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TemplateMeta>,
}

impl PatchTemplate {
    /// Create a template from a list of operations
    pub fn new(ops: Vec<TemplateOp>) -> Self {
        PatchTemplate { ops, meta: None }
    }

    /// Attach provenance metadata
    pub fn with_meta(mut self, meta: TemplateMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Distinct hole names referenced by this template, in first-reference order
    pub fn holes(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for op in &self.ops {
            for arg in op.args.values() {
                if let ArgValue::Hole { hole } = arg {
                    if !seen.contains(&hole.as_str()) {
                        seen.push(hole.as_str());
                    }
                }
            }
        }
        seen
    }
}

/// A fully concrete operation, ready for the domain executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOp {
    /// Domain-defined opcode
    pub op: String,
    /// Named concrete arguments, in declaration order
    pub args: IndexMap<String, Value>,
}

/// An ordered sequence of concrete operations, applied left to right.
///
/// Patches are not commutative in general; later operations see the state
/// left by earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Operations applied left to right
    pub ops: Vec<PatchOp>,
}

/// Mapping from hole name to an ordered, finite candidate domain.
///
/// The iteration order of the map is the hole ordering the enumerator uses;
/// the order of each domain is the order candidates are tried in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoleSpace {
    domains: IndexMap<String, Vec<Value>>,
}

impl HoleSpace {
    /// Create an empty hole space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hole with its ordered domain, replacing any previous domain
    pub fn insert(
        &mut self,
        hole: impl Into<String>,
        domain: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.domains.insert(hole.into(), domain.into_iter().collect());
        self
    }

    /// Domain for a hole, if present
    pub fn get(&self, hole: &str) -> Option<&[Value]> {
        self.domains.get(hole).map(Vec::as_slice)
    }

    /// Whether the hole has a domain in this space
    pub fn contains(&self, hole: &str) -> bool {
        self.domains.contains_key(hole)
    }

    /// Hole names in insertion order
    pub fn holes(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    /// (hole, domain) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.domains.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of holes
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether the space has no holes
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl FromIterator<(String, Vec<Value>)> for HoleSpace {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Value>)>>(iter: I) -> Self {
        HoleSpace {
            domains: iter.into_iter().collect(),
        }
    }
}

/// A complete choice of one domain value per hole.
pub type Assignment = IndexMap<String, Value>;

/// A template referenced a hole the assignment does not bind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hole '{hole}' is not bound by the assignment")]
pub struct UnboundHole {
    /// Name of the unbound hole
    pub hole: String,
}

/// The domain executor rejected a patch.
///
/// Per-candidate and never terminal: the synthesizer records the failure and
/// moves on to the next candidate.
#[derive(Debug, Clone, Error)]
#[error("patch application failed: {0}")]
pub struct PatchApplyError(pub String);

/// Replace every hole reference in `template` with the assigned value.
///
/// Traversal is structural and deterministic; argument-map key order is
/// preserved as declared. Fails with [`UnboundHole`] if the template
/// references a hole the assignment does not bind.
pub fn instantiate(template: &PatchTemplate, assignment: &Assignment) -> Result<Patch, UnboundHole> {
    let mut ops = Vec::with_capacity(template.ops.len());
    for op in &template.ops {
        let mut args = IndexMap::with_capacity(op.args.len());
        for (key, arg) in &op.args {
            let value = match arg {
                ArgValue::Concrete(v) => v.clone(),
                ArgValue::Hole { hole } => assignment
                    .get(hole)
                    .cloned()
                    .ok_or_else(|| UnboundHole { hole: hole.clone() })?,
            };
            args.insert(key.clone(), value);
        }
        ops.push(PatchOp {
            op: op.op.clone(),
            args,
        });
    }
    Ok(Patch { ops })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_template() -> PatchTemplate {
        PatchTemplate::new(vec![
            TemplateOp::new(
                "EnsureLabel",
                [
                    ("key", ArgValue::concrete("env")),
                    ("value", ArgValue::hole("env")),
                ],
            ),
            TemplateOp::new("EnsureReplicas", [("replicas", ArgValue::hole("replicas"))]),
        ])
    }

    #[test]
    fn instantiate_fills_all_holes() {
        let template = sample_template();
        let mut assignment = Assignment::new();
        assignment.insert("env".to_string(), Value::from("production-us"));
        assignment.insert("replicas".to_string(), Value::from(3));

        let patch = instantiate(&template, &assignment).unwrap();
        assert_eq!(patch.ops.len(), 2);
        assert_eq!(patch.ops[0].args["value"], Value::from("production-us"));
        assert_eq!(patch.ops[1].args["replicas"], Value::from(3));
        // Concrete args pass through unchanged
        assert_eq!(patch.ops[0].args["key"], Value::from("env"));
    }

    #[test]
    fn instantiate_preserves_arg_order() {
        let template = sample_template();
        let mut assignment = Assignment::new();
        assignment.insert("env".to_string(), Value::from("staging-us"));
        assignment.insert("replicas".to_string(), Value::from(2));

        let patch = instantiate(&template, &assignment).unwrap();
        let keys: Vec<&String> = patch.ops[0].args.keys().collect();
        assert_eq!(keys, ["key", "value"]);
    }

    #[test]
    fn instantiate_reports_unbound_hole() {
        let template = sample_template();
        let mut assignment = Assignment::new();
        assignment.insert("env".to_string(), Value::from("staging-us"));

        let err = instantiate(&template, &assignment).unwrap_err();
        assert_eq!(err.hole, "replicas");
    }

    #[test]
    fn template_holes_deduplicated_in_first_reference_order() {
        let template = PatchTemplate::new(vec![
            TemplateOp::new("A", [("x", ArgValue::hole("b")), ("y", ArgValue::hole("a"))]),
            TemplateOp::new("B", [("z", ArgValue::hole("b"))]),
        ]);
        assert_eq!(template.holes(), ["b", "a"]);
    }

    #[test]
    fn hole_reference_serialises_with_sentinel() {
        let template = sample_template();
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["ops"][0]["args"]["value"], serde_json::json!({"$hole": "env"}));
        assert_eq!(json["ops"][0]["args"]["key"], serde_json::json!("env"));

        let back: PatchTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);
    }

    #[test]
    fn template_metadata_round_trips() {
        let template = sample_template().with_meta(TemplateMeta {
            artifact: Some("deployment.yaml".to_string()),
            version: Some("2".to_string()),
        });
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["meta"]["artifact"], serde_json::json!("deployment.yaml"));

        let back: PatchTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);

        // Templates without metadata serialise without the field
        let bare = serde_json::to_value(sample_template()).unwrap();
        assert!(bare.get("meta").is_none());
    }

    #[test]
    fn value_round_trips_through_json() {
        for value in [Value::from("s"), Value::from(7), Value::from(true)] {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn hole_space_preserves_insertion_order() {
        let mut space = HoleSpace::new();
        space.insert("replicas", [Value::from(2), Value::from(3)]);
        space.insert("env", [Value::from("staging-us")]);

        let holes: Vec<&str> = space.holes().collect();
        assert_eq!(holes, ["replicas", "env"]);

        let json = serde_json::to_string(&space).unwrap();
        let back: HoleSpace = serde_json::from_str(&json).unwrap();
        let holes: Vec<&str> = back.holes().collect();
        assert_eq!(holes, ["replicas", "env"]);
    }
}
