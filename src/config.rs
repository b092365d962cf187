use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the per-repository configuration
pub const REPO_CONFIG_FILE: &str = ".heycx.toml";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub branches: BranchConfig,
    #[serde(default)]
    pub hotfix: HotfixConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub pr: PrConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BranchConfig {
    #[serde(default = "default_master")]
    pub master: String,
    #[serde(default = "default_develop")]
    pub develop: String,
    #[serde(default = "default_hotfix_prefix")]
    pub hotfix_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HotfixConfig {
    /// Tag master with the hotfix version on finish
    #[serde(default = "default_true")]
    pub tag: bool,
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,
    #[serde(default = "default_true")]
    pub push: bool,
    #[serde(default = "default_true")]
    pub delete_branch: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct DeployConfig {
    /// Workflow file or name passed to `gh workflow run`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PrConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise the repository's `.heycx.toml`
    /// is tried, then the user config, then built-in defaults.
    pub fn load(path: Option<&Path>, repo_root: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_file(p);
        }

        let mut candidates = Vec::new();
        if let Some(root) = repo_root {
            candidates.push(root.join(REPO_CONFIG_FILE));
        }
        if let Ok(user_path) = Self::default_config_path() {
            candidates.push(user_path);
        }

        for candidate in candidates {
            if candidate.is_file() {
                return Self::load_file(&candidate);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn load_file(config_path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", config_path);
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?;

        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("heycx").join("config.toml"))
    }

    /// Full branch name for a hotfix, without doubling the prefix
    pub fn hotfix_branch(&self, name: &str) -> String {
        if name.starts_with(&self.branches.hotfix_prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.branches.hotfix_prefix, name)
        }
    }

    /// Hotfix name without the branch prefix
    pub fn hotfix_name<'a>(&self, branch: &'a str) -> &'a str {
        branch
            .strip_prefix(self.branches.hotfix_prefix.as_str())
            .unwrap_or(branch)
    }

    pub fn is_hotfix_branch(&self, branch: &str) -> bool {
        branch.starts_with(&self.branches.hotfix_prefix) && branch != self.branches.hotfix_prefix
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            remote: default_remote(),
            branches: BranchConfig::default(),
            hotfix: HotfixConfig::default(),
            deploy: DeployConfig::default(),
            pr: PrConfig::default(),
        }
    }
}

// Default value functions
fn default_remote() -> String {
    "origin".to_string()
}

fn default_master() -> String {
    "master".to_string()
}

fn default_develop() -> String {
    "develop".to_string()
}

fn default_hotfix_prefix() -> String {
    "hotfix/".to_string()
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BranchConfig {
    fn default() -> Self {
        BranchConfig {
            master: default_master(),
            develop: default_develop(),
            hotfix_prefix: default_hotfix_prefix(),
        }
    }
}

impl Default for HotfixConfig {
    fn default() -> Self {
        HotfixConfig {
            tag: true,
            tag_prefix: default_tag_prefix(),
            push: true,
            delete_branch: true,
        }
    }
}
