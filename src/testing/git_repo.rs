use std::path::{Path, PathBuf};
use std::process::Command;

const INITIAL_TABLE: &str = "IPN,Value\nR0001,10k\nR0002,1k\n";

/// A bare origin plus a working clone holding one category table.
pub struct TestOrigin {
    root: tempfile::TempDir,
    work: PathBuf,
}

fn git_command(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir);
    // Keep tests isolated from signing, hooks and aliases in user config.
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd.env("GIT_CONFIG_SYSTEM", "/dev/null");
    cmd
}

fn git(dir: &Path, args: &[&str]) {
    let output = git_command(dir)
        .args(args)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn configure_user(dir: &Path, name: &str) {
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", name]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

impl TestOrigin {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let origin = root.path().join("origin.git");
        let work = root.path().join("work");
        std::fs::create_dir_all(&origin).expect("Failed to create origin dir");
        std::fs::create_dir_all(work.join("Database")).expect("Failed to create work dir");

        git(&origin, &["init", "--bare", "--initial-branch=main"]);
        git(&work, &["init", "--initial-branch=main"]);
        configure_user(&work, "Test User");
        std::fs::write(work.join("Database/db-Resistors.csv"), INITIAL_TABLE)
            .expect("Failed to write table");
        git(&work, &["add", "."]);
        git(&work, &["commit", "-m", "initial"]);
        git(
            &work,
            &["remote", "add", "origin", origin.to_str().expect("utf-8 path")],
        );
        git(&work, &["push", "-u", "origin", "main"]);

        // Resolve symlinks such as /var -> /private/var on macOS.
        let work = work.canonicalize().expect("Failed to canonicalize path");
        Self { root, work }
    }

    /// The working clone.
    pub fn work(&self) -> &Path {
        &self.work
    }

    fn origin(&self) -> PathBuf {
        self.root.path().join("origin.git")
    }

    /// Commit `content` at `path` straight to the origin, as CI would.
    pub fn ci_commit(&self, path: &str, content: &str, message: &str) {
        let ci = tempfile::tempdir().expect("Failed to create temp dir");
        let origin = self.origin();
        git(
            ci.path(),
            &["clone", "--branch", "main", origin.to_str().expect("utf-8 path"), "."],
        );
        configure_user(ci.path(), "CI");
        let file = ci.path().join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&file, content).expect("Failed to write file");
        git(ci.path(), &["add", "."]);
        git(ci.path(), &["commit", "-m", message]);
        git(ci.path(), &["push", "origin", "main"]);
    }

    /// Commit `content` at `path` in the working clone.
    pub fn local_commit(&self, path: &str, content: &str, message: &str) {
        std::fs::write(self.work.join(path), content).expect("Failed to write file");
        git(&self.work, &["add", "."]);
        git(&self.work, &["commit", "-m", message]);
    }
}
