use anyhow::{Context, Result};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-repository state, stored inside the git directory
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotfix: Option<HotfixSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<Timestamp>,
}

/// The hotfix currently being worked on
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HotfixSession {
    pub branch: String,
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub started_at: Timestamp,
}

impl State {
    /// Location of the state file for a repository
    pub fn path_for(git_dir: &Path) -> PathBuf {
        git_dir.join("heycx").join("state.json")
    }

    /// Load state from file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state from {:?}", path))?;

        let state: State = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state from {:?}", path))?;

        Ok(state)
    }

    /// Save state to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize state")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write state to {:?}", path))?;

        Ok(())
    }

    /// Record a newly started hotfix
    pub fn start_hotfix(&mut self, branch: &str, base: &str, version: Option<String>) {
        self.hotfix = Some(HotfixSession {
            branch: branch.to_string(),
            base: base.to_string(),
            version,
            started_at: Timestamp::now(),
        });
    }

    /// Forget the active hotfix, returning it
    pub fn finish_hotfix(&mut self) -> Option<HotfixSession> {
        self.hotfix.take()
    }

    pub fn update_last_sync(&mut self) {
        self.last_sync = Some(Timestamp::now());
    }
}
