//! Git test helpers for creating and manipulating test repositories

use std::path::Path;
use std::process::Command;

/// Result type for test operations
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Run a git command and check for success
pub fn run_git_command(args: &[&str], cwd: &Path) -> TestResult {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| format!("Failed to run git command: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Git command {:?} failed: {}", args, stderr).into());
    }

    Ok(())
}

/// Run a git command and capture its stdout
pub fn git_output(args: &[&str], cwd: &Path) -> TestResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| format!("Failed to run git command: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Git command {:?} failed: {}", args, stderr).into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Create an empty git repository with a deterministic configuration
pub fn ensure_empty_repository(path: &Path) -> TestResult {
    std::fs::create_dir_all(path).map_err(|e| format!("Failed to create directory: {}", e))?;

    run_git_command(&["init", "--initial-branch=main"], path)?;
    run_git_command(&["config", "user.email", "test@example.com"], path)?;
    run_git_command(&["config", "user.name", "Test User"], path)?;
    run_git_command(&["config", "commit.gpgsign", "false"], path)?;

    Ok(())
}

/// Write a file (creating parent directories) relative to the repo root
pub fn write_file(root: &Path, rel: &str, content: &str) -> TestResult {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Stage everything and commit
pub fn commit_all(path: &Path, message: &str) -> TestResult {
    run_git_command(&["add", "-A"], path)?;
    run_git_command(&["commit", "-m", message], path)
}

/// Write a file and commit it in one step
#[allow(dead_code)]
pub fn commit_file(path: &Path, rel: &str, content: &str) -> TestResult {
    write_file(path, rel, content)?;
    commit_all(path, rel)
}

/// The full hex id of HEAD
pub fn head_sha(path: &Path) -> TestResult<String> {
    git_output(&["rev-parse", "HEAD"], path)
}

/// Checkout a specific commit or branch
#[allow(dead_code)]
pub fn checkout(path: &Path, ref_name: &str) -> TestResult {
    run_git_command(&["checkout", "--quiet", ref_name], path)
}

/// Create and switch to a branch
#[allow(dead_code)]
pub fn branch(path: &Path, name: &str) -> TestResult {
    run_git_command(&["checkout", "--quiet", "-b", name], path)
}

/// Merge a branch into the current one
#[allow(dead_code)]
pub fn merge(path: &Path, name: &str) -> TestResult {
    run_git_command(&["merge", "--no-edit", "--no-ff", name], path)
}

/// The first 16 bits of a full hex commit id, with the legacy clamp applied
pub fn clamped_first_u16(sha: &str) -> u16 {
    let raw = u16::from_str_radix(&sha[..4], 16).expect("valid hex sha");
    if raw == 0xffff {
        0xfffe
    } else {
        raw
    }
}
