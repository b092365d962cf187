//! Runs external tools (`git`, `gh`) to completion and captures their output.

use crate::error::FlowError;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Parse stdout as JSON
    pub fn parse_json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.stdout).context("Failed to parse JSON tool output")
    }
}

/// A resolved external program bound to a working directory
#[derive(Debug, Clone)]
pub struct Tool {
    name: String,
    path: PathBuf,
    work_dir: Option<PathBuf>,
}

impl Tool {
    pub fn new(name: &str, path: PathBuf) -> Self {
        Tool {
            name: name.to_string(),
            path,
            work_dir: None,
        }
    }

    /// Run every invocation in `dir`
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.work_dir = Some(dir.to_path_buf());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the tool, capturing stdout and stderr; a non-zero exit is not an error here
    pub fn run(&self, args: &[&str]) -> Result<ToolOutput> {
        debug!("Running {} {}", self.name, args.join(" "));

        let mut cmd = Command::new(&self.path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = self.work_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                anyhow::Error::from(FlowError::ToolNotFound {
                    tool: self.name.clone(),
                })
            } else {
                anyhow::Error::new(e).context(format!("Failed to execute {}", self.name))
            }
        })?;

        let result = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        trace!(
            "{} exited with {}: stdout={:?} stderr={:?}",
            self.name,
            result.exit_code,
            result.stdout,
            result.stderr
        );

        Ok(result)
    }

    /// Run the tool and turn a non-zero exit into [`FlowError::ToolFailed`]
    pub fn run_ok(&self, args: &[&str]) -> Result<ToolOutput> {
        let output = self.run(args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(FlowError::ToolFailed {
                tool: self.name.clone(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            }
            .into())
        }
    }

    /// Run and return trimmed stdout
    pub fn read(&self, args: &[&str]) -> Result<String> {
        Ok(self.run_ok(args)?.stdout.trim().to_string())
    }
}

/// Locate an executable: explicit override, then `PATH`, then common install locations
pub fn find_executable(name: &str, override_var: &str) -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(override_var) {
        debug!("Using {} from {}", name, override_var);
        return Ok(PathBuf::from(path));
    }

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    let common_dirs = [
        "/opt/homebrew/bin",
        "/usr/local/bin",
        "/usr/bin",
        "/home/linuxbrew/.linuxbrew/bin",
    ];
    for dir in &common_dirs {
        let candidate = Path::new(dir).join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(FlowError::ToolNotFound {
        tool: name.to_string(),
    }
    .into())
}
