//! Kubernetes manifest artifact
//!
//! A [`K8sArtifact`] holds one or more YAML files as text, keyed by relative
//! path. Patching parses the YAML, edits it and re-serialises; the original
//! artifact is never modified.

use crate::ops::apply_patch;
use manifix_core::{Artifact, Patch, PatchApplyError};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// One or more Kubernetes YAML manifests, typically a Deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct K8sArtifact {
    files: BTreeMap<String, String>,
}

impl K8sArtifact {
    /// Create an artifact from (path, content) pairs
    pub fn from_files(files: impl IntoIterator<Item = (String, String)>) -> Self {
        K8sArtifact {
            files: files.into_iter().collect(),
        }
    }

    /// Load a single manifest file
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map_or_else(|| "manifest.yaml".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(K8sArtifact {
            files: BTreeMap::from([(name, content)]),
        })
    }

    /// Load every `*.yaml`/`*.yml` file directly inside a directory
    pub fn from_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|e| e == "yaml" || e == "yml");
            if path.is_file() && is_yaml {
                let name = entry.file_name().to_string_lossy().into_owned();
                files.insert(name, fs::read_to_string(&path)?);
            }
        }
        Ok(K8sArtifact { files })
    }

    /// (path, content) pairs in path order
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Content of a single file
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the artifact holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write all files into `dir`, creating it if needed.
    ///
    /// When `rename_first` is given, the first file is written under that
    /// name instead of its own.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>, rename_first: Option<&str>) -> io::Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (i, (name, content)) in self.files.iter().enumerate() {
            let file_name = match (i, rename_first) {
                (0, Some(renamed)) => renamed,
                _ => name.as_str(),
            };
            let path = dir.join(file_name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
        }
        Ok(())
    }
}

impl Artifact for K8sArtifact {
    fn apply(&self, patch: &Patch) -> Result<Self, PatchApplyError> {
        let files = apply_patch(&self.files, patch).map_err(|e| PatchApplyError(e.to_string()))?;
        Ok(K8sArtifact { files })
    }
}
