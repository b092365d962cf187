use std::fmt;

/// Failures that map to a specific process exit code
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{tool} not found")]
    ToolNotFound { tool: String },

    #[error("{tool} failed (exit {code}): {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("merge of '{source_branch}' into '{target}' has conflicts")]
    MergeConflict {
        source_branch: String,
        target: String,
        files: Vec<String>,
    },

    #[error("working tree has uncommitted changes")]
    DirtyWorkingTree,

    #[error("no hotfix in progress")]
    NoHotfixInProgress,

    #[error("hotfix '{branch}' is already in progress")]
    HotfixInProgress { branch: String },

    #[error("branch '{0}' already exists")]
    BranchExists(String),

    #[error("branch '{0}' does not exist")]
    BranchNotFound(String),

    #[error("'{branch}' has diverged from '{upstream}'")]
    BranchDiverged { branch: String, upstream: String },

    #[error("invalid branch name '{name}': {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("cannot open a pull request from '{0}' into itself")]
    SameHeadAndBase(String),

    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,
}

impl FlowError {
    /// Exit code reported by the binary for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            FlowError::ToolNotFound { .. } => 127,
            // Propagate the child's own status
            FlowError::ToolFailed { code, .. } => (*code).clamp(1, 255) as u8,
            FlowError::MergeConflict { .. } => 3,
            FlowError::DirtyWorkingTree => 4,
            _ => 1,
        }
    }
}

/// User-friendly error wrapper
#[derive(Debug)]
pub struct UserError {
    message: String,
    details: Option<String>,
    suggestion: Option<String>,
}

impl UserError {
    /// Create a new user error
    pub fn new(message: impl Into<String>) -> Self {
        UserError {
            message: message.into(),
            details: None,
            suggestion: None,
        }
    }

    /// Add details about the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Add a suggestion for how to fix the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// Format the error for display
    pub fn display(&self) {
        eprintln!("\n❌ Error: {}", self.message);

        if let Some(ref details) = self.details {
            eprintln!("\n   {}", details);
        }

        if let Some(ref suggestion) = self.suggestion {
            eprintln!("\n💡 {}", suggestion);
        }
    }
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref details) = self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for UserError {}

/// Convert common errors to user-friendly messages
pub fn user_friendly_error(error: &anyhow::Error) -> UserError {
    if let Some(flow) = error.downcast_ref::<FlowError>() {
        return flow_error_to_user(flow, error);
    }

    let error_str = format!("{:#}", error);

    if error_str.contains("not a git repository") {
        return UserError::new("Not inside a git repository")
            .with_details("heycx operates on the repository in the current directory")
            .with_suggestion("cd into your project before running heycx");
    }

    if error_str.contains("gh auth login") || error_str.contains("not authenticated") {
        return UserError::new("Not authenticated with GitHub")
            .with_details("You need to log in to GitHub CLI first")
            .with_suggestion("Run 'gh auth login' to authenticate");
    }

    if error_str.contains("Failed to parse config") {
        return UserError::new("Invalid configuration file")
            .with_details(error_str)
            .with_suggestion("Check the TOML syntax in your .heycx.toml file");
    }

    if error_str.contains("Permission denied") {
        return UserError::new("Permission denied").with_details(error_str);
    }

    UserError::new("An unexpected error occurred").with_details(error_str)
}

fn flow_error_to_user(flow: &FlowError, error: &anyhow::Error) -> UserError {
    match flow {
        FlowError::ToolNotFound { tool } if tool == "gh" => {
            UserError::new("GitHub CLI is not installed")
                .with_details("The 'gh' command is required for pull requests and deployments")
                .with_suggestion("Install GitHub CLI from https://cli.github.com/")
        }
        FlowError::ToolNotFound { tool } => UserError::new(format!("{} is not installed", tool))
            .with_suggestion(format!("Install {} and make sure it is on your PATH", tool)),
        FlowError::ToolFailed { tool, stderr, .. }
            if tool == "gh"
                && (stderr.contains("auth login")
                    || stderr.contains("401")
                    || stderr.contains("403")) =>
        {
            UserError::new("Not authenticated with GitHub")
                .with_details(format!("{:#}", error))
                .with_suggestion("Run 'gh auth login' to authenticate")
        }
        FlowError::ToolFailed { tool, stderr, .. }
            if tool == "git" && stderr.contains("not a git repository") =>
        {
            UserError::new("Not inside a git repository")
                .with_details("heycx operates on the repository in the current directory")
                .with_suggestion("cd into your project before running heycx")
        }
        FlowError::MergeConflict { files, .. } => {
            let user = UserError::new(flow.to_string())
                .with_suggestion("Resolve the conflicts manually, commit, then run the command again");
            if files.is_empty() {
                user
            } else {
                user.with_details(format!("Conflicting files: {}", files.join(", ")))
            }
        }
        FlowError::BranchDiverged { branch, upstream } => UserError::new(flow.to_string())
            .with_details(format!(
                "{} has local commits that are not on {}",
                branch, upstream
            ))
            .with_suggestion("Run 'heycx sync' or reconcile the branch manually, then retry"),
        FlowError::DirtyWorkingTree => UserError::new(flow.to_string())
            .with_suggestion("Commit or stash your changes first"),
        FlowError::NoHotfixInProgress => UserError::new(flow.to_string())
            .with_suggestion("Run 'heycx hotfix start' to begin one"),
        FlowError::HotfixInProgress { .. } => UserError::new(flow.to_string())
            .with_suggestion("Run 'heycx hotfix finish' before starting another"),
        // Lead with the outermost context and keep the whole chain
        _ => {
            let chain = format!("{:#}", error);
            if chain == flow.to_string() {
                UserError::new(chain)
            } else {
                UserError::new(error.to_string()).with_details(chain)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_exit_codes() {
        assert_eq!(FlowError::ToolNotFound { tool: "git".into() }.exit_code(), 127);
        let failed = |code| FlowError::ToolFailed {
            tool: "git".into(),
            code,
            stderr: String::new(),
        };
        assert_eq!(failed(128).exit_code(), 128);
        assert_eq!(failed(-1).exit_code(), 1);
        assert_eq!(failed(1000).exit_code(), 255);
        assert_eq!(FlowError::DirtyWorkingTree.exit_code(), 4);
        assert_eq!(FlowError::NoHotfixInProgress.exit_code(), 1);
    }

    #[test]
    fn test_flow_error_through_anyhow() {
        let error = anyhow::Error::from(FlowError::ToolNotFound { tool: "gh".into() })
            .context("Failed to create pull request");
        let user = user_friendly_error(&error);
        assert_eq!(user.message(), "GitHub CLI is not installed");
    }

    #[test]
    fn test_gh_auth_failure() {
        let error = anyhow::Error::from(FlowError::ToolFailed {
            tool: "gh".into(),
            code: 4,
            stderr: "To get started with GitHub CLI, please run:  gh auth login".into(),
        });
        let user = user_friendly_error(&error);
        assert_eq!(user.message(), "Not authenticated with GitHub");
        assert_eq!(user.suggestion(), Some("Run 'gh auth login' to authenticate"));
    }

    #[test]
    fn test_gh_forbidden_suggests_login() {
        let error = anyhow::Error::from(FlowError::ToolFailed {
            tool: "gh".into(),
            code: 1,
            stderr: "HTTP 403: Resource not accessible by integration".into(),
        });
        let user = user_friendly_error(&error);
        assert_eq!(user.suggestion(), Some("Run 'gh auth login' to authenticate"));
    }

    #[test]
    fn test_tool_failure_keeps_context_chain() {
        let error = anyhow::Error::from(FlowError::ToolFailed {
            tool: "gh".into(),
            code: 1,
            stderr: "could not find any workflows named deploy.yml".into(),
        })
        .context("Failed to trigger workflow deploy.yml")
        .context("hotfix/1.0.1 was merged into master and develop, but the deployment trigger failed");

        let user = user_friendly_error(&error);
        assert!(user.message().contains("deployment trigger failed"));
        let shown = user.to_string();
        assert!(shown.contains("Failed to trigger workflow deploy.yml"));
        assert!(shown.contains("could not find any workflows named deploy.yml"));
    }

    #[test]
    fn test_plain_flow_error_has_no_details() {
        let error = anyhow::Error::from(FlowError::BranchExists("hotfix/1.0.1".into()));
        let user = user_friendly_error(&error);
        assert_eq!(user.to_string(), "branch 'hotfix/1.0.1' already exists");
    }

    #[test]
    fn test_not_a_repository() {
        let error = anyhow::Error::from(FlowError::ToolFailed {
            tool: "git".into(),
            code: 128,
            stderr: "fatal: not a git repository (or any of the parent directories): .git".into(),
        });
        let user = user_friendly_error(&error);
        assert_eq!(user.message(), "Not inside a git repository");
    }

    #[test]
    fn test_fallback_keeps_context() {
        let error = anyhow!("disk full").context("Failed to save state");
        let user = user_friendly_error(&error);
        assert_eq!(user.message(), "An unexpected error occurred");
        assert_eq!(user.to_string(), "An unexpected error occurred: Failed to save state: disk full");
    }

    #[test]
    fn test_conflict_lists_files() {
        let error = anyhow::Error::from(FlowError::MergeConflict {
            source_branch: "hotfix/1.0.1".into(),
            target: "develop".into(),
            files: vec!["src/lib.rs".into()],
        });
        let user = user_friendly_error(&error);
        assert_eq!(
            user.to_string(),
            "merge of 'hotfix/1.0.1' into 'develop' has conflicts: Conflicting files: src/lib.rs"
        );
    }
}
