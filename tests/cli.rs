use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn heycx(dir: &Path, home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("heycx").unwrap();
    cmd.current_dir(dir)
        .env("HOME", home)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env_remove("HEYCX_CONFIG")
        .env_remove("HEYCX_GIT")
        .env_remove("HEYCX_GH");
    cmd
}

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A work repository with master and develop pushed to a bare `origin`
struct TestRepo {
    _temp_dir: TempDir,
    home: PathBuf,
    remote: PathBuf,
    work: PathBuf,
}

impl TestRepo {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let home = temp_dir.path().join("home");
        let remote = temp_dir.path().join("remote.git");
        let work = temp_dir.path().join("work");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::create_dir_all(&remote).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        let repo = TestRepo {
            _temp_dir: temp_dir,
            home,
            remote,
            work,
        };

        repo.git_in(&repo.remote, &["init", "--bare", "--quiet"]);
        repo.git_in(&repo.remote, &["symbolic-ref", "HEAD", "refs/heads/master"]);

        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/master"]);
        repo.commit("README.md", "# app\n", "Initial commit");
        repo.git(&["tag", "v1.0.0"]);
        repo.git(&["branch", "develop"]);
        let remote_path = repo.remote.to_string_lossy().to_string();
        repo.git(&["remote", "add", "origin", &remote_path]);
        repo.git(&["push", "--quiet", "origin", "master", "develop", "v1.0.0"]);
        repo
    }

    fn git_in(&self, dir: &Path, args: &[&str]) -> String {
        let output = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("HOME", &self.home)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_AUTHOR_NAME", "Test User")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test User")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn git(&self, args: &[&str]) -> String {
        self.git_in(&self.work, args)
    }

    fn ref_exists(&self, dir: &Path, reference: &str) -> bool {
        std::process::Command::new("git")
            .args(["show-ref", "--verify", "--quiet", reference])
            .current_dir(dir)
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn commit(&self, file: &str, contents: &str, message: &str) {
        std::fs::write(self.work.join(file), contents).unwrap();
        self.git(&["add", file]);
        self.git(&["commit", "--quiet", "-m", message]);
    }

    fn heycx(&self) -> Command {
        heycx(&self.work, &self.home)
    }
}

#[test]
fn help_mentions_tool_name() {
    let dir = tempfile::tempdir().unwrap();
    heycx(dir.path(), dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("heycx"))
        .stdout(predicate::str::contains("hotfix"));
}

#[test]
fn version_flag_prints_package_version() {
    let dir = tempfile::tempdir().unwrap();
    heycx(dir.path(), dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    heycx(dir.path(), dir.path())
        .arg("deploy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn missing_git_exits_127() {
    let dir = tempfile::tempdir().unwrap();
    heycx(dir.path(), dir.path())
        .env("HEYCX_GIT", dir.path().join("no-such-git"))
        .args(["hotfix", "start"])
        .assert()
        .code(127)
        .stderr(predicate::str::contains("git is not installed"));
}

#[test]
fn outside_repository_fails() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    heycx(dir.path(), dir.path())
        .env("GIT_CEILING_DIRECTORIES", dir.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not inside a git repository"));
}

#[test]
fn hotfix_round_trip() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();

    repo.heycx()
        .args(["hotfix", "start"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hotfix/1.0.1"));
    assert_eq!(repo.git(&["rev-parse", "--abbrev-ref", "HEAD"]), "hotfix/1.0.1");

    repo.heycx()
        .args(["hotfix", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hotfix in progress: hotfix/1.0.1"));

    repo.commit("fix.txt", "fixed\n", "Fix crash on login");

    repo.heycx()
        .args(["hotfix", "finish", "--no-deploy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tagged v1.0.1"));

    assert_eq!(repo.git(&["rev-parse", "--abbrev-ref", "HEAD"]), "develop");
    assert!(!repo.ref_exists(&repo.work, "refs/heads/hotfix/1.0.1"));
    assert!(repo.ref_exists(&repo.remote, "refs/tags/v1.0.1"));

    // The fix reached both long-lived branches on the remote
    let remote = repo.remote.clone();
    for branch in ["master", "develop"] {
        let files = repo.git_in(&remote, &["ls-tree", "--name-only", branch]);
        assert!(files.lines().any(|f| f == "fix.txt"), "{} is missing the fix", branch);
    }

    repo.heycx()
        .args(["hotfix", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No hotfix in progress"));
}

#[test]
fn hotfix_finish_conflict_exits_3() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();

    repo.heycx()
        .args(["hotfix", "start", "1.0.1"])
        .assert()
        .success();
    repo.commit("README.md", "# app\nhotfix\n", "Patch readme on hotfix");

    repo.git(&["checkout", "--quiet", "develop"]);
    repo.commit("README.md", "# app\nfeature\n", "Patch readme on develop");
    repo.git(&["checkout", "--quiet", "hotfix/1.0.1"]);

    repo.heycx()
        .args(["hotfix", "finish", "--no-push", "--no-deploy"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("README.md"));

    // Back on the hotfix branch with the session intact and nothing pushed
    assert_eq!(repo.git(&["rev-parse", "--abbrev-ref", "HEAD"]), "hotfix/1.0.1");
    assert!(!repo.ref_exists(&repo.remote, "refs/tags/v1.0.1"));
    repo.heycx()
        .args(["hotfix", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hotfix/1.0.1"));
}

#[test]
fn dirty_tree_exits_4() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    std::fs::write(repo.work.join("README.md"), "# changed\n").unwrap();

    repo.heycx()
        .args(["hotfix", "start"])
        .assert()
        .code(4);
}

#[test]
fn init_writes_repo_config() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();

    repo.heycx().arg("init").assert().success();
    let contents = std::fs::read_to_string(repo.work.join(".heycx.toml")).unwrap();
    assert!(contents.contains("hotfix_prefix = \"hotfix/\""));

    repo.heycx()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}
