// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)] // Builder methods and getters don't need must_use
#![allow(clippy::missing_const_for_fn)] // const fn optimization is minor
#![allow(clippy::doc_markdown)] // Missing backticks - low priority
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details
#![allow(clippy::uninlined_format_args)] // Named args in format strings are clearer
#![allow(clippy::module_name_repetitions)] // oracles::PolicyOracle is clear
#![allow(clippy::match_same_arms)] // Sometimes clarity > deduplication

//! Kubernetes domain adapter for the Manifix repair engine
//!
//! Provides the pieces the core engine treats as external collaborators:
//!
//! - [`K8sArtifact`]: one or more YAML manifests held as text
//! - the patch executor ([`ops`]): `EnsureLabel`, `EnsureReplicas`,
//!   `EnsureImageVersion`, `EnsureResourceProfile`,
//!   `EnsureSecurityBaseline`, `EnsurePriorityClass`
//! - concrete oracles ([`oracles`]): policy, schema, security and resource
//!   checks over Deployment manifests, emitting constraint hints the
//!   synthesizer can learn from
//! - default template and sample manifests ([`defaults`])

pub mod artifact;
pub mod defaults;
pub mod ops;
pub mod oracles;
mod util;

pub use artifact::K8sArtifact;
pub use defaults::{artifact_context, default_proposal, BASELINE_DEPLOYMENT, BROKEN_DEPLOYMENT};
pub use ops::{K8sOp, LabelScope, PatchError, ResourceProfile};
pub use oracles::{standard_oracles, PolicyOracle, ResourceOracle, SchemaOracle, SecurityOracle};
