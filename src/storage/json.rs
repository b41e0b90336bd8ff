//! Single-file JSON array store with atomic rewrites.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value;

use super::record::RunRecord;
use super::traits::RunStore;
use crate::error::{CritiqueError, Result};

/// Default store file name
pub const DEFAULT_STORE_FILE: &str = "iterative_critique_responses.json";

/// Stores every record in one pretty-printed JSON array.
///
/// Each append rewrites the whole array to a sibling temp file and renames it
/// over the store, so readers see either the old or the new array.
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    path: PathBuf,
}

impl JsonRunStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl Into<String>) -> CritiqueError {
        CritiqueError::CorruptStore {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Existing entries as raw JSON, checked against the record shape.
    ///
    /// Raw values are kept so a rewrite reproduces earlier records as they
    /// were read.
    fn load_raw(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            debug!("No store at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let entries: Vec<Value> = serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;

        for (position, entry) in entries.iter().enumerate() {
            serde_json::from_value::<RunRecord>(entry.clone())
                .map_err(|e| self.corrupt(format!("record {}: {}", position, e)))?;
        }

        Ok(entries)
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| CritiqueError::Storage(format!("store path has no file name: {}", self.path.display())))?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }

    fn write_atomic(&self, entries: &[Value]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path()?;
        let bytes = serde_json::to_vec_pretty(entries)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl RunStore for JsonRunStore {
    fn append(&self, record: &RunRecord) -> Result<usize> {
        let mut entries = self.load_raw()?;
        entries.push(serde_json::to_value(record)?);
        self.write_atomic(&entries)?;

        info!(
            "Saved iteration {} to {} ({} records)",
            record.iteration,
            self.path.display(),
            entries.len()
        );
        Ok(entries.len())
    }

    fn load(&self) -> Result<Vec<RunRecord>> {
        self.load_raw()?
            .into_iter()
            .map(|entry| serde_json::from_value(entry).map_err(CritiqueError::from))
            .collect()
    }
}
