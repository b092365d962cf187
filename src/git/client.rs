use crate::error::FlowError;
use crate::git::{MergeMode, MergeOutcome};
use crate::process::{find_executable, Tool};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::BTreeMap;

/// Git client abstraction
pub enum GitClient {
    Real(RealGit),
    #[cfg(test)]
    Mock(MockGit),
}

impl GitClient {
    /// Create a client operating on the repository containing `work_dir`
    pub fn new(work_dir: &Path) -> Result<Self> {
        Ok(GitClient::Real(RealGit::new(work_dir)?))
    }

    /// Raw `git --version` output
    pub fn version_output(&self) -> Result<String> {
        match self {
            GitClient::Real(client) => client.version_output(),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.version.clone()),
        }
    }

    /// Absolute path of the `.git` directory
    pub fn git_dir(&self) -> Result<PathBuf> {
        match self {
            GitClient::Real(client) => client.git_dir(),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.git_dir.clone()),
        }
    }

    /// Top-level directory of the work tree
    pub fn work_tree(&self) -> Result<PathBuf> {
        match self {
            GitClient::Real(client) => client.work_tree(),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.git_dir.join("..")),
        }
    }

    /// Currently checked-out branch, `None` when HEAD is detached
    pub fn current_branch(&self) -> Result<Option<String>> {
        match self {
            GitClient::Real(client) => client.current_branch(),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.current_branch()),
        }
    }

    /// True when no tracked file has uncommitted changes
    pub fn is_clean(&self) -> Result<bool> {
        match self {
            GitClient::Real(client) => client.is_clean(),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.clean),
        }
    }

    pub fn has_remote(&self, remote: &str) -> Result<bool> {
        match self {
            GitClient::Real(client) => client.has_remote(remote),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.remotes.iter().any(|r| r == remote)),
        }
    }

    pub fn fetch(&self, remote: &str) -> Result<()> {
        match self {
            GitClient::Real(client) => client.fetch(remote),
            #[cfg(test)]
            GitClient::Mock(client) => client.record(format!("fetch {}", remote)),
        }
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool> {
        match self {
            GitClient::Real(client) => client.ref_exists(&format!("refs/heads/{}", name)),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.repo.borrow().local.contains_key(name)),
        }
    }

    pub fn remote_branch_exists(&self, remote: &str, name: &str) -> Result<bool> {
        match self {
            GitClient::Real(client) => {
                client.ref_exists(&format!("refs/remotes/{}/{}", remote, name))
            }
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client
                .repo
                .borrow()
                .remote
                .contains_key(&format!("{}/{}", remote, name))),
        }
    }

    pub fn tag_exists(&self, name: &str) -> Result<bool> {
        match self {
            GitClient::Real(client) => client.ref_exists(&format!("refs/tags/{}", name)),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.repo.borrow().tags.iter().any(|t| t == name)),
        }
    }

    pub fn checkout(&self, branch: &str) -> Result<()> {
        match self {
            GitClient::Real(client) => client.checkout(branch),
            #[cfg(test)]
            GitClient::Mock(client) => client.checkout(branch),
        }
    }

    /// Create a local branch tracking `<remote>/<branch>` and check it out
    pub fn checkout_tracking(&self, branch: &str, remote: &str) -> Result<()> {
        match self {
            GitClient::Real(client) => client.checkout_tracking(branch, remote),
            #[cfg(test)]
            GitClient::Mock(client) => client.checkout_tracking(branch, remote),
        }
    }

    /// Create `branch` at `start_point` and check it out
    pub fn create_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        match self {
            GitClient::Real(client) => client.create_branch(branch, start_point),
            #[cfg(test)]
            GitClient::Mock(client) => client.create_branch(branch, start_point),
        }
    }

    /// Resolve a revision to its commit id
    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        match self {
            GitClient::Real(client) => client.rev_parse(rev),
            #[cfg(test)]
            GitClient::Mock(client) => client.rev_parse(rev),
        }
    }

    /// Merge `rev` into the current branch
    pub fn merge(&self, rev: &str, mode: &MergeMode) -> Result<MergeOutcome> {
        match self {
            GitClient::Real(client) => client.merge(rev, mode),
            #[cfg(test)]
            GitClient::Mock(client) => client.merge(rev, mode),
        }
    }

    pub fn abort_merge(&self) -> Result<()> {
        match self {
            GitClient::Real(client) => client.abort_merge(),
            #[cfg(test)]
            GitClient::Mock(client) => client.abort_merge(),
        }
    }

    /// Most recent tag reachable from `rev`, if any
    pub fn latest_tag(&self, rev: &str) -> Result<Option<String>> {
        match self {
            GitClient::Real(client) => client.latest_tag(rev),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.repo.borrow().tags.last().cloned()),
        }
    }

    /// Create an annotated tag on `target`
    pub fn create_tag(&self, name: &str, message: &str, target: &str) -> Result<()> {
        match self {
            GitClient::Real(client) => client.create_tag(name, message, target),
            #[cfg(test)]
            GitClient::Mock(client) => client.create_tag(name, target),
        }
    }

    /// Push refs (branches or tags) to `remote`
    pub fn push(&self, remote: &str, refs: &[&str], set_upstream: bool) -> Result<()> {
        match self {
            GitClient::Real(client) => client.push(remote, refs, set_upstream),
            #[cfg(test)]
            GitClient::Mock(client) => client.push(remote, refs, set_upstream),
        }
    }

    /// Delete a fully merged local branch
    pub fn delete_branch(&self, branch: &str) -> Result<()> {
        match self {
            GitClient::Real(client) => client.delete_branch(branch),
            #[cfg(test)]
            GitClient::Mock(client) => client.delete_branch(branch),
        }
    }

    pub fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        match self {
            GitClient::Real(client) => client.delete_remote_branch(remote, branch),
            #[cfg(test)]
            GitClient::Mock(client) => client.delete_remote_branch(remote, branch),
        }
    }

    /// Subject line of the commit at HEAD
    pub fn last_commit_subject(&self) -> Result<String> {
        match self {
            GitClient::Real(client) => client.last_commit_subject(),
            #[cfg(test)]
            GitClient::Mock(client) => Ok(client.last_subject.clone()),
        }
    }
}

/// Real git client shelling out to the `git` binary
pub struct RealGit {
    git: Tool,
}

impl RealGit {
    pub fn new(work_dir: &Path) -> Result<Self> {
        let git_path = find_executable("git", "HEYCX_GIT")?;
        debug!("Using git at {:?}", git_path);
        Ok(RealGit {
            git: Tool::new("git", git_path).in_dir(work_dir),
        })
    }

    fn version_output(&self) -> Result<String> {
        self.git.read(&["--version"])
    }

    fn git_dir(&self) -> Result<PathBuf> {
        let dir = self.git.read(&["rev-parse", "--absolute-git-dir"])?;
        Ok(PathBuf::from(dir))
    }

    fn work_tree(&self) -> Result<PathBuf> {
        let dir = self.git.read(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(dir))
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let output = self.git.run(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        match output.exit_code {
            0 => Ok(Some(output.stdout.trim().to_string())),
            // Detached HEAD
            1 => Ok(None),
            code => Err(FlowError::ToolFailed {
                tool: "git".to_string(),
                code,
                stderr: output.stderr.trim().to_string(),
            }
            .into()),
        }
    }

    fn is_clean(&self) -> Result<bool> {
        let status = self
            .git
            .read(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(status.is_empty())
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        let remotes = self.git.read(&["remote"])?;
        Ok(remotes.lines().any(|line| line.trim() == remote))
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        self.git
            .run_ok(&["fetch", "--prune", remote])
            .with_context(|| format!("Failed to fetch from {}", remote))?;
        Ok(())
    }

    fn ref_exists(&self, full_ref: &str) -> Result<bool> {
        let output = self.git.run(&["show-ref", "--verify", "--quiet", full_ref])?;
        Ok(output.success())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.git.run_ok(&["checkout", branch])?;
        Ok(())
    }

    fn checkout_tracking(&self, branch: &str, remote: &str) -> Result<()> {
        let upstream = format!("{}/{}", remote, branch);
        self.git.run_ok(&["checkout", "-b", branch, "--track", &upstream])?;
        Ok(())
    }

    fn create_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        self.git.run_ok(&["checkout", "-b", branch, start_point])?;
        Ok(())
    }

    fn rev_parse(&self, rev: &str) -> Result<String> {
        self.git.read(&["rev-parse", "--verify", "--quiet", rev])
    }

    fn merge(&self, rev: &str, mode: &MergeMode) -> Result<MergeOutcome> {
        let mut args = vec!["merge"];
        match mode {
            MergeMode::FastForwardOnly => args.push("--ff-only"),
            MergeMode::NoFastForward { message } => {
                args.extend(["--no-ff", "-m", message.as_str()]);
            }
            MergeMode::Default => args.push("--no-edit"),
        }
        args.push(rev);

        let output = self.git.run(&args)?;
        if output.success() {
            return Ok(MergeOutcome::Completed);
        }

        if *mode == MergeMode::FastForwardOnly {
            debug!("{} cannot be fast-forwarded: {}", rev, output.stderr.trim());
            return Ok(MergeOutcome::NotFastForward);
        }

        let conflicted = self.conflicted_files()?;
        if !conflicted.is_empty() || self.merge_in_progress()? {
            return Ok(MergeOutcome::Conflict(conflicted));
        }

        Err(FlowError::ToolFailed {
            tool: "git".to_string(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        }
        .into())
    }

    fn conflicted_files(&self) -> Result<Vec<String>> {
        let files = self
            .git
            .read(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(files.lines().map(str::to_string).collect())
    }

    fn merge_in_progress(&self) -> Result<bool> {
        let output = self.git.run(&["rev-parse", "--verify", "--quiet", "MERGE_HEAD"])?;
        Ok(output.success())
    }

    fn abort_merge(&self) -> Result<()> {
        self.git.run_ok(&["merge", "--abort"])?;
        Ok(())
    }

    fn latest_tag(&self, rev: &str) -> Result<Option<String>> {
        let output = self.git.run(&["describe", "--tags", "--abbrev=0", rev])?;
        if output.success() {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            debug!("No tag reachable from {}: {}", rev, output.stderr.trim());
            Ok(None)
        }
    }

    fn create_tag(&self, name: &str, message: &str, target: &str) -> Result<()> {
        self.git.run_ok(&["tag", "-a", name, "-m", message, target])?;
        Ok(())
    }

    fn push(&self, remote: &str, refs: &[&str], set_upstream: bool) -> Result<()> {
        let mut args = vec!["push"];
        if set_upstream {
            args.push("--set-upstream");
        }
        args.push(remote);
        args.extend_from_slice(refs);
        self.git
            .run_ok(&args)
            .with_context(|| format!("Failed to push {} to {}", refs.join(" "), remote))?;
        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.git.run_ok(&["branch", "-d", branch])?;
        Ok(())
    }

    fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        self.git.run_ok(&["push", remote, "--delete", branch])?;
        Ok(())
    }

    fn last_commit_subject(&self) -> Result<String> {
        self.git.read(&["log", "-1", "--format=%s"])
    }
}

/// In-memory repository model used by the mock client
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockRepo {
    pub head: Option<String>,
    /// Local branch name -> commit
    pub local: BTreeMap<String, String>,
    /// `<remote>/<branch>` -> commit
    pub remote: BTreeMap<String, String>,
    /// Oldest first
    pub tags: Vec<String>,
    /// Tag name -> tagged commit
    pub tag_targets: BTreeMap<String, String>,
    pub merge_in_progress: bool,
}

/// Mock git client for testing
#[cfg(test)]
pub struct MockGit {
    pub version: String,
    pub git_dir: PathBuf,
    pub clean: bool,
    pub remotes: Vec<String>,
    pub last_subject: String,
    /// (source, target) pairs whose merge conflicts
    pub conflicts: Vec<(String, String)>,
    /// Local branches that have diverged from their remote counterpart
    pub diverged: Vec<String>,
    /// Make every push fail as if the remote rejected it
    pub fail_push: bool,
    pub repo: RefCell<MockRepo>,
    pub calls: RefCell<Vec<String>>,
}

#[cfg(test)]
impl MockGit {
    /// A clean repository on `master` with `master` and `develop` in sync with `origin`
    pub fn new() -> Self {
        let mut repo = MockRepo {
            head: Some("master".to_string()),
            ..MockRepo::default()
        };
        for (branch, commit) in [("master", "m1"), ("develop", "d1")] {
            repo.local.insert(branch.to_string(), commit.to_string());
            repo.remote
                .insert(format!("origin/{}", branch), commit.to_string());
        }

        MockGit {
            version: "git version 2.43.0".to_string(),
            git_dir: PathBuf::from("/tmp/heycx-mock/.git"),
            clean: true,
            remotes: vec!["origin".to_string()],
            last_subject: "Fix crash on login".to_string(),
            conflicts: vec![],
            diverged: vec![],
            fail_push: false,
            repo: RefCell::new(repo),
            calls: RefCell::new(vec![]),
        }
    }

    pub fn with_git_dir(mut self, git_dir: &Path) -> Self {
        self.git_dir = git_dir.to_path_buf();
        self
    }

    pub fn with_branch(self, branch: &str, commit: &str) -> Self {
        self.repo
            .borrow_mut()
            .local
            .insert(branch.to_string(), commit.to_string());
        self
    }

    pub fn with_remote_branch(self, remote_ref: &str, commit: &str) -> Self {
        self.repo
            .borrow_mut()
            .remote
            .insert(remote_ref.to_string(), commit.to_string());
        self
    }

    /// Tag the current tip of master
    pub fn with_tag(self, tag: &str) -> Self {
        {
            let mut repo = self.repo.borrow_mut();
            let commit = repo.local.get("master").cloned().unwrap_or_default();
            repo.tags.push(tag.to_string());
            repo.tag_targets.insert(tag.to_string(), commit);
        }
        self
    }

    pub fn on_branch(self, branch: Option<&str>) -> Self {
        self.repo.borrow_mut().head = branch.map(str::to_string);
        self
    }

    pub fn with_conflict(mut self, source: &str, target: &str) -> Self {
        self.conflicts.push((source.to_string(), target.to_string()));
        self
    }

    /// Calls recorded so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn head_commit(&self, branch: &str) -> Option<String> {
        self.repo.borrow().local.get(branch).cloned()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.borrow_mut().push(call);
        Ok(())
    }

    fn current_branch(&self) -> Option<String> {
        self.repo.borrow().head.clone()
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout {}", branch))?;
        let mut repo = self.repo.borrow_mut();
        if !repo.local.contains_key(branch) {
            return Err(anyhow::anyhow!("pathspec '{}' did not match", branch));
        }
        repo.head = Some(branch.to_string());
        Ok(())
    }

    fn checkout_tracking(&self, branch: &str, remote: &str) -> Result<()> {
        self.record(format!("checkout -b {} --track {}/{}", branch, remote, branch))?;
        let mut repo = self.repo.borrow_mut();
        let commit = repo
            .remote
            .get(&format!("{}/{}", remote, branch))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no remote branch {}/{}", remote, branch))?;
        repo.local.insert(branch.to_string(), commit);
        repo.head = Some(branch.to_string());
        Ok(())
    }

    fn create_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        self.record(format!("checkout -b {} {}", branch, start_point))?;
        let commit = self.rev_parse(start_point)?;
        let mut repo = self.repo.borrow_mut();
        repo.local.insert(branch.to_string(), commit);
        repo.head = Some(branch.to_string());
        Ok(())
    }

    fn rev_parse(&self, rev: &str) -> Result<String> {
        let rev = rev.strip_suffix("^{commit}").unwrap_or(rev);
        let repo = self.repo.borrow();
        repo.local
            .get(rev)
            .or_else(|| repo.remote.get(rev))
            .or_else(|| repo.tag_targets.get(rev))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown revision {}", rev))
    }

    fn merge(&self, rev: &str, mode: &MergeMode) -> Result<MergeOutcome> {
        let flag = match mode {
            MergeMode::FastForwardOnly => "--ff-only",
            MergeMode::NoFastForward { .. } => "--no-ff",
            MergeMode::Default => "--no-edit",
        };
        self.record(format!("merge {} {}", flag, rev))?;

        let target = self
            .current_branch()
            .ok_or_else(|| anyhow::anyhow!("cannot merge on a detached HEAD"))?;
        let source_commit = self.rev_parse(rev)?;

        if self
            .conflicts
            .iter()
            .any(|(source, t)| source == rev && *t == target)
        {
            self.repo.borrow_mut().merge_in_progress = true;
            return Ok(MergeOutcome::Conflict(vec!["src/conflict.rs".to_string()]));
        }

        let mut repo = self.repo.borrow_mut();
        let target_commit = repo.local.get(&target).cloned().unwrap_or_default();
        // Already merged when the source shows up in the target's history
        if target_commit
            .split(&['(', ',', ')'][..])
            .any(|commit| commit == source_commit)
        {
            return Ok(MergeOutcome::Completed);
        }

        let diverged = self.diverged.contains(&target);
        let new_commit = match mode {
            MergeMode::FastForwardOnly if diverged => return Ok(MergeOutcome::NotFastForward),
            MergeMode::FastForwardOnly => source_commit,
            MergeMode::Default if !diverged => source_commit,
            _ => format!("merge({},{})", target_commit, source_commit),
        };
        repo.local.insert(target, new_commit);
        Ok(MergeOutcome::Completed)
    }

    fn abort_merge(&self) -> Result<()> {
        self.record("merge --abort".to_string())?;
        self.repo.borrow_mut().merge_in_progress = false;
        Ok(())
    }

    fn create_tag(&self, name: &str, target: &str) -> Result<()> {
        self.record(format!("tag {} {}", name, target))?;
        let commit = self.rev_parse(target)?;
        let mut repo = self.repo.borrow_mut();
        repo.tags.push(name.to_string());
        repo.tag_targets.insert(name.to_string(), commit);
        Ok(())
    }

    fn push(&self, remote: &str, refs: &[&str], set_upstream: bool) -> Result<()> {
        let flag = if set_upstream { " --set-upstream" } else { "" };
        self.record(format!("push{} {} {}", flag, remote, refs.join(" ")))?;
        if self.fail_push {
            return Err(FlowError::ToolFailed {
                tool: "git".to_string(),
                code: 1,
                stderr: format!("failed to push some refs to '{}'", remote),
            }
            .into());
        }
        let mut repo = self.repo.borrow_mut();
        for r in refs {
            if let Some(commit) = repo.local.get(*r).cloned() {
                repo.remote.insert(format!("{}/{}", remote, r), commit);
            }
        }
        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.record(format!("branch -d {}", branch))?;
        let mut repo = self.repo.borrow_mut();
        if repo.head.as_deref() == Some(branch) {
            return Err(anyhow::anyhow!("cannot delete the checked-out branch {}", branch));
        }
        repo.local.remove(branch);
        Ok(())
    }

    fn delete_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        self.record(format!("push {} --delete {}", remote, branch))?;
        self.repo
            .borrow_mut()
            .remote
            .remove(&format!("{}/{}", remote, branch));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_checkout_and_branch() {
        let git = GitClient::Mock(MockGit::new());

        git.create_branch("hotfix/1.0.1", "master").unwrap();
        assert_eq!(git.current_branch().unwrap().as_deref(), Some("hotfix/1.0.1"));
        assert!(git.branch_exists("hotfix/1.0.1").unwrap());
        assert_eq!(git.rev_parse("hotfix/1.0.1").unwrap(), "m1");

        assert!(git.checkout("missing").is_err());
    }

    #[test]
    fn test_mock_merge_modes() {
        let mock = MockGit::new().with_branch("feature", "f1");
        let git = GitClient::Mock(mock);

        git.checkout("develop").unwrap();
        let outcome = git
            .merge(
                "feature",
                &MergeMode::NoFastForward {
                    message: "Merge feature".to_string(),
                },
            )
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Completed);
        assert_eq!(git.rev_parse("develop").unwrap(), "merge(d1,f1)");
    }

    #[test]
    fn test_mock_conflict() {
        let mock = MockGit::new()
            .with_branch("hotfix/x", "h1")
            .with_conflict("hotfix/x", "master");
        let git = GitClient::Mock(mock);

        let outcome = git.merge("hotfix/x", &MergeMode::Default).unwrap();
        assert!(matches!(outcome, MergeOutcome::Conflict(files) if !files.is_empty()));
    }

    #[test]
    fn test_real_git_missing_binary() {
        let git = GitClient::Real(RealGit {
            git: Tool::new("git", PathBuf::from("/nonexistent/heycx-git")),
        });

        let err = git.version_output().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FlowError>(),
            Some(FlowError::ToolNotFound { .. })
        ));
    }
}
