//! Atomic JSON persistence helpers
//!
//! Writes go to a temporary sibling in the destination directory and are
//! renamed into place on commit, so readers never observe a half-written
//! document.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::bank::BankError;

/// Serialise `value` as pretty-printed JSON and atomically replace `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), BankError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }

    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| BankError::Io(e.error))?;
    Ok(())
}

/// Read and deserialise a JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BankError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, [1, 2, 3]);
    }

    #[test]
    fn write_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &"first").unwrap();
        write_json_atomic(&path, &"second").unwrap();
        let back: String = read_json(&path).unwrap();
        assert_eq!(back, "second");
    }

    #[test]
    fn write_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/doc.json");
        write_json_atomic(&path, &42).unwrap();
        let back: i32 = read_json(&path).unwrap();
        assert_eq!(back, 42);
    }
}
