//! Signature-indexed repair bank
//!
//! Persistent memoisation of repair patterns: signature → (template, hole
//! space, learned constraints, last successful assignment). A bank hit
//! warm-starts the synthesizer with the stored template and constraints, so
//! a regression seen before is repaired without a proposer call and with the
//! failing cells already pruned.
//!
//! The on-disk format is a single JSON list of entries, committed by writing
//! a sibling file and renaming. Single-writer use only; corrupted content on
//! load is reported to the caller and the bank starts empty.

use crate::constraint::Constraint;
use crate::io;
use crate::patch::{Assignment, HoleSpace, PatchTemplate};
use crate::signature::Signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from bank persistence.
#[derive(Debug, Error)]
pub enum BankError {
    /// File system operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Usage statistics for a bank entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMetadata {
    /// Number of successful repairs recorded under this signature
    pub success_count: u64,
    /// When the entry was first stored
    pub first_used: DateTime<Utc>,
    /// When the entry last produced or absorbed a success
    pub last_used: DateTime<Utc>,
    /// Candidates tried by the most recent successful synthesis
    pub candidates_tried: u32,
}

/// A stored repair pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankEntry {
    /// Fingerprint of the violation situation this entry repairs
    pub signature: Signature,
    /// Template that produced the successful repair
    pub template: PatchTemplate,
    /// Hole space the template was synthesised over
    pub hole_space: HoleSpace,
    /// Accumulated pruning constraints, canonical form
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learned_constraints: Vec<Constraint>,
    /// Most recent winning assignment
    pub successful_assignment: Assignment,
    /// Usage statistics
    pub metadata: BankMetadata,
    /// Unknown fields from older or newer writers, preserved round-trip
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_json::Value>,
}

/// Persistent signature → repair pattern store.
pub struct RepairBank {
    path: Option<PathBuf>,
    entries: Vec<BankEntry>,
    load_error: Option<String>,
}

impl RepairBank {
    /// Create a bank with no backing file; nothing is persisted.
    pub fn in_memory() -> Self {
        RepairBank {
            path: None,
            entries: Vec::new(),
            load_error: None,
        }
    }

    /// Open a bank backed by `path`, loading existing entries.
    ///
    /// A missing file yields an empty bank. Corrupted content also yields an
    /// empty bank: the problem is logged and kept available through
    /// [`Self::load_error`], but never escapes as an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, load_error) = match Self::load_entries(&path) {
            Ok(entries) => {
                info!(path = %path.display(), entries = entries.len(), "loaded repair bank");
                (entries, None)
            }
            Err(BankError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no existing bank file, starting empty");
                (Vec::new(), None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "bank file corrupted, starting empty");
                (Vec::new(), Some(e.to_string()))
            }
        };
        RepairBank {
            path: Some(path),
            entries,
            load_error,
        }
    }

    fn load_entries(path: &Path) -> Result<Vec<BankEntry>, BankError> {
        let mut entries: Vec<BankEntry> = io::read_json(path)?;
        // Tuples may have been written by hand or by older builds; keep
        // constraint sets canonical so merges stay well-defined.
        for entry in &mut entries {
            entry.learned_constraints = entry
                .learned_constraints
                .drain(..)
                .map(Constraint::canonical)
                .collect();
        }
        Ok(entries)
    }

    /// The corruption message from load, if the backing file was unreadable
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Backing file path, if persistent
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Exact-equality lookup by signature
    pub fn lookup(&self, signature: &Signature) -> Option<&BankEntry> {
        let hit = self.entries.iter().find(|e| &e.signature == signature);
        match hit {
            Some(_) => debug!(signature = %signature, "bank hit"),
            None => debug!(signature = %signature, "bank miss"),
        }
        hit
    }

    /// Record a successful repair under `signature` and persist.
    ///
    /// Inserts a fresh entry for an unseen signature. For an existing entry
    /// the stored template and hole space are kept; constraints are merged
    /// by set-union after canonicalisation, dropping any whose holes are
    /// absent from the stored hole space; the successful assignment is
    /// replaced with the latest; `success_count` and `last_used` advance
    /// while `first_used` is retained.
    pub fn record_success(
        &mut self,
        signature: Signature,
        template: &PatchTemplate,
        hole_space: &HoleSpace,
        constraints: &[Constraint],
        assignment: &Assignment,
        candidates_tried: u32,
    ) -> Result<(), BankError> {
        let now = Utc::now();

        if let Some(entry) = self.entries.iter_mut().find(|e| e.signature == signature) {
            let mut merged = 0usize;
            for constraint in constraints {
                let constraint = constraint.clone().canonical();
                if constraint.holes().any(|h| !entry.hole_space.contains(h)) {
                    continue;
                }
                if !entry.learned_constraints.contains(&constraint) {
                    entry.learned_constraints.push(constraint);
                    merged += 1;
                }
            }
            entry.successful_assignment = assignment.clone();
            entry.metadata.success_count += 1;
            entry.metadata.last_used = now;
            entry.metadata.candidates_tried = candidates_tried;
            info!(
                signature = %signature,
                success_count = entry.metadata.success_count,
                merged_constraints = merged,
                "updated repair bank entry"
            );
        } else {
            let learned_constraints: Vec<Constraint> = constraints
                .iter()
                .map(|c| c.clone().canonical())
                .filter(|c| c.holes().all(|h| hole_space.contains(h)))
                .collect();
            info!(
                signature = %signature,
                constraints = learned_constraints.len(),
                "storing new repair bank entry"
            );
            self.entries.push(BankEntry {
                signature,
                template: template.clone(),
                hole_space: hole_space.clone(),
                learned_constraints,
                successful_assignment: assignment.clone(),
                metadata: BankMetadata {
                    success_count: 1,
                    first_used: now,
                    last_used: now,
                    candidates_tried,
                },
                extra: std::collections::BTreeMap::new(),
            });
        }

        self.save()
    }

    /// Persist the bank to its backing file, if any.
    pub fn save(&self) -> Result<(), BankError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        io::write_json_atomic(path, &self.entries)?;
        debug!(path = %path.display(), entries = self.entries.len(), "saved repair bank");
        Ok(())
    }

    /// Iterate entries for diagnostics
    pub fn iter(&self) -> impl Iterator<Item = &BankEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bank holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
