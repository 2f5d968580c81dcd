// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)] // Builder methods and getters don't need must_use
#![allow(clippy::missing_const_for_fn)] // const fn optimization is minor
#![allow(clippy::use_self)] // Self vs TypeName - style preference
#![allow(clippy::doc_markdown)] // Missing backticks - low priority
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details
#![allow(clippy::uninlined_format_args)] // Named args in format strings are clearer
#![allow(clippy::map_unwrap_or)] // Style preference
#![allow(clippy::match_same_arms)] // Sometimes clarity > deduplication
#![allow(clippy::module_name_repetitions)] // bank::BankEntry is clear
#![allow(clippy::option_if_let_else)] // Style preference for match vs map_or
#![allow(clippy::needless_pass_by_value)] // Ownership semantics may be intentional

//! CEGIS repair engine for declarative configuration artifacts
//!
//! This crate implements the verification-and-synthesis core of Manifix:
//!
//! - **Patch model**: templates with named holes, instantiated from candidate
//!   assignments ([`PatchTemplate`], [`HoleSpace`], [`instantiate`])
//! - **Constraint learning**: oracle evidence is turned into pruning
//!   constraints ([`Constraint`], [`extract_constraints`])
//! - **Candidate enumeration**: odometer-ordered search over the hole space
//!   with constraint pruning ([`CandidateEnumerator`])
//! - **Synthesis**: one counterexample-guided attempt over a template
//!   ([`synthesize`], [`SynthBudget`], [`SynthStatus`])
//! - **Repair bank**: persistent signature-indexed store of successful
//!   repairs for warm-starting later runs ([`RepairBank`], [`Signature`])
//! - **Controller**: orchestrates bank lookup, template proposal, synthesis
//!   and bank update for a single repair request ([`Controller`])
//!
//! The engine is domain-agnostic: artifacts are opaque values implementing
//! [`Artifact`], oracles implement [`Oracle`], and the patch executor lives
//! behind `Artifact::apply`. The Kubernetes domain adapter lives in
//! `manifix-k8s`; the LLM template proposer in `manifix-ai`.

pub mod bank;
pub mod constraint;
pub mod controller;
pub mod enumerate;
pub mod extract;
mod io;
pub mod patch;
pub mod signature;
pub mod synthesize;
pub mod verify;
pub mod violation;

pub use bank::{BankEntry, BankError, BankMetadata, RepairBank};
pub use constraint::Constraint;
pub use controller::{
    Controller, ProposerError, RepairConfig, RepairReport, TemplateProposal, TemplateProposer,
    TemplateSource,
};
pub use enumerate::CandidateEnumerator;
pub use extract::extract_constraints;
pub use patch::{
    instantiate, ArgValue, Assignment, HoleSpace, Patch, PatchApplyError, PatchOp, PatchTemplate,
    TemplateMeta, TemplateOp, UnboundHole, Value,
};
pub use signature::Signature;
pub use synthesize::{synthesize, SynthBudget, SynthError, SynthResult, SynthStatus};
pub use verify::{Artifact, Oracle, Verifier};
pub use violation::{Evidence, Severity, TupleHint, ValueHint, Violation};
