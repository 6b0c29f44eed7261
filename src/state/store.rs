//! Persistent section-hash storage.
//!
//! Each working directory carries one state file mapping dependent-section
//! names to the canonical hash recorded at the last successful commit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StatesmanError};

/// Name of the state file inside a working directory.
pub const STATE_FILE_NAME: &str = ".statesman_state.yaml";

/// Section name → hash, as last committed for a working directory.
pub type SectionState = BTreeMap<String, String>;

/// Section-hash store bound to one working directory.
#[derive(Debug, Clone)]
pub struct SectionStateStore {
    path: PathBuf,
    sections: SectionState,
}

impl SectionStateStore {
    /// Get the state file path for a working directory.
    pub fn state_file(workdir: &Path) -> PathBuf {
        workdir.join(STATE_FILE_NAME)
    }

    /// Load state from disk.
    ///
    /// A missing file means this working directory has never committed a
    /// run, and yields an empty store.
    pub fn load(workdir: &Path) -> Result<Self> {
        let path = Self::state_file(workdir);

        if !path.exists() {
            return Ok(Self {
                path,
                sections: SectionState::new(),
            });
        }

        let content = fs::read_to_string(&path)?;
        let sections = if content.trim().is_empty() {
            SectionState::new()
        } else {
            let parsed: Option<SectionState> =
                serde_yaml::from_str(&content).map_err(|e| StatesmanError::StateParseError {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            parsed.unwrap_or_default()
        };

        Ok(Self { path, sections })
    }

    /// Path of the backing state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded hashes.
    pub fn sections(&self) -> &SectionState {
        &self.sections
    }

    /// Get the recorded hash for a section.
    pub fn get(&self, section: &str) -> Option<&str> {
        self.sections.get(section).map(String::as_str)
    }

    /// Record a section hash and rewrite the state file.
    pub fn save(&mut self, section: &str, hash: &str) -> Result<()> {
        self.sections.insert(section.to_string(), hash.to_string());
        self.persist()
    }

    /// Drop recorded hashes for the given sections and rewrite the state file.
    ///
    /// Returns the number of entries removed. The file is left untouched
    /// when nothing was removed.
    pub fn forget<S: AsRef<str>>(&mut self, sections: &[S]) -> Result<usize> {
        let before = self.sections.len();
        for section in sections {
            self.sections.remove(section.as_ref());
        }

        let removed = before - self.sections.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Rewrite the whole state file using atomic write.
    ///
    /// Uses the write-to-temp-then-rename pattern so a reader sees either
    /// the previous mapping or the new one, never a partial file.
    fn persist(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = serde_yaml::to_string(&self.sections).map_err(|e| {
            StatesmanError::Other(anyhow::anyhow!("Failed to serialize state: {}", e))
        })?;

        let temp_path = self.path.with_extension("yaml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), entries = self.sections.len(), "state written");
        Ok(())
    }
}
