//! CLI tests that spawn the `rsm` binary against a throwaway config.
//!
//! These cover the command surface: init, enqueue (file and directory),
//! worker --drain, status, and delete. Query commands against a populated
//! index live in the pipeline tests, because the in-memory index backend
//! does not outlive a process.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rsm_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rsm");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Test resumes
    let resumes_dir = root.join("resumes");
    fs::create_dir_all(resumes_dir.join("2024")).unwrap();
    fs::write(
        resumes_dir.join("jane.txt"),
        "Jane Doe\nEmail: jane.doe@example.com\n\nExperience\nSenior engineer with 7 years of experience building python services.\n\nSkills\npython kubernetes docker\n",
    ).unwrap();
    fs::write(
        resumes_dir.join("2024").join("bob.md"),
        "Bob Stone\n\nExperience\n3 years of experience shipping react interfaces.\n\nSkills\nreact typescript\n",
    ).unwrap();
    fs::write(resumes_dir.join("headshot.png"), b"\x89PNG\r\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/rsm.db"

[storage]
root = "{root}/objects"
secret = "cli-test-secret"

[queue]
spool_dir = "{root}/spool"
max_attempts = 3
backoff_base_secs = 0
poll_interval_ms = 10
concurrency = 2

[embedding]
provider = "local"
dims = 64

[completion]
provider = "local"

[index]
backend = "memory"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("rsm.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rsm(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rsm_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rsm binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Pull the document id out of an `enqueue` line: `queued <id>  <file>`.
fn queued_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("queued "))
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_else(|| panic!("no queued line in output: {}", stdout))
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rsm(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/rsm.db").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_rsm(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_rsm(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_enqueue_worker_status_flow() {
    let (tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let resume = tmp.path().join("resumes/jane.txt");
    let (stdout, stderr, success) =
        run_rsm(&config_path, &["enqueue", resume.to_str().unwrap()]);
    assert!(success, "enqueue failed: stdout={}, stderr={}", stdout, stderr);
    let id = queued_id(&stdout);

    let (stdout, stderr, success) = run_rsm(&config_path, &["worker", "--drain"]);
    assert!(success, "worker failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Queue drained."));
    assert!(stdout.contains("indexed: 1"), "drain summary: {}", stdout);

    let (stdout, stderr, success) = run_rsm(&config_path, &["status", &id]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("stage:         indexed"), "status: {}", stdout);
    assert!(stdout.contains("processed:     true"));
    assert!(stdout.contains("download:      file://"));
    assert!(stdout.contains("--- Metadata ---"));
    assert!(stdout.contains("email:      jane.doe@example.com"));
    assert!(stdout.contains("skills:"));

    // Summary view counts the document and shows an empty queue.
    let (stdout, _, success) = run_rsm(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("--- Documents ---"));
    assert!(stdout.contains("indexed"));
    assert!(stdout.contains("queued:  0"));
    assert!(stdout.contains("failed:  0"));
}

#[test]
fn test_status_summary_before_any_documents() {
    let (_tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let (stdout, _, success) = run_rsm(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("(none)"));
}

#[test]
fn test_unsupported_extension_reports_failed() {
    let (tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let sheet = tmp.path().join("data.xlsx");
    fs::write(&sheet, b"not a spreadsheet").unwrap();

    let (stdout, _, success) = run_rsm(&config_path, &["enqueue", sheet.to_str().unwrap()]);
    assert!(success, "enqueue should accept the file: {}", stdout);
    let id = queued_id(&stdout);

    let (stdout, _, success) = run_rsm(&config_path, &["worker", "--drain"]);
    assert!(success, "worker run itself should not fail: {}", stdout);
    assert!(stdout.contains("abandoned jobs: 1"), "drain summary: {}", stdout);

    let (stdout, _, success) = run_rsm(&config_path, &["status", &id]);
    assert!(success);
    assert!(stdout.contains("stage:         failed"), "status: {}", stdout);
    assert!(stdout.contains("unsupported format"), "status: {}", stdout);
}

#[test]
fn test_enqueue_directory_matches_globs() {
    let (tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let dir = tmp.path().join("resumes");

    // Defaults pick up .txt and .md anywhere below the directory, but not
    // the .png.
    let (stdout, stderr, success) = run_rsm(&config_path, &["enqueue", dir.to_str().unwrap()]);
    assert!(success, "enqueue failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("jane.txt"));
    assert!(stdout.contains("bob.md"));
    assert!(!stdout.contains("headshot.png"));
    assert!(stdout.contains("2 file(s) queued."), "output: {}", stdout);

    // A narrower include takes over completely.
    let (stdout, _, success) = run_rsm(
        &config_path,
        &["enqueue", dir.to_str().unwrap(), "--include", "*.md"],
    );
    assert!(success);
    assert!(stdout.contains("bob.md"));
    assert!(!stdout.contains("jane.txt"));
    assert!(stdout.contains("1 file(s) queued."), "output: {}", stdout);
}

#[test]
fn test_enqueue_missing_path_fails() {
    let (tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let missing = tmp.path().join("nope.pdf");
    let (_, stderr, success) = run_rsm(&config_path, &["enqueue", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("not a file"), "stderr: {}", stderr);
}

#[test]
fn test_worker_drain_on_empty_queue_exits() {
    let (_tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let (stdout, stderr, success) = run_rsm(&config_path, &["worker", "--drain"]);
    assert!(success, "worker failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Queue drained."));
}

#[test]
fn test_search_on_empty_index_reports_no_results() {
    let (_tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let (stdout, stderr, success) = run_rsm(&config_path, &["search", "python"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_rejects_blank_query() {
    let (_tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let (_, stderr, success) = run_rsm(&config_path, &["search", "   "]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"), "stderr: {}", stderr);
}

#[test]
fn test_delete_removes_document() {
    let (tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let resume = tmp.path().join("resumes/jane.txt");
    let (stdout, _, _) = run_rsm(&config_path, &["enqueue", resume.to_str().unwrap()]);
    let id = queued_id(&stdout);
    run_rsm(&config_path, &["worker", "--drain"]);

    let (stdout, stderr, success) = run_rsm(&config_path, &["delete", &id]);
    assert!(success, "delete failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&format!("deleted {}", id)));

    // The stored object is gone along with the row.
    let objects = tmp.path().join("objects");
    let leftover = walk_files(&objects);
    assert!(leftover.is_empty(), "objects left behind: {:?}", leftover);

    let (_, stderr, success) = run_rsm(&config_path, &["status", &id]);
    assert!(!success);
    assert!(stderr.contains("document not found"), "stderr: {}", stderr);
}

#[test]
fn test_delete_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_rsm(&config_path, &["init"]);

    let (_, stderr, success) = run_rsm(&config_path, &["delete", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("document not found"), "stderr: {}", stderr);
}

#[test]
fn test_completions_generate_without_config() {
    let (_tmp, config_path) = setup_test_env();

    // Shell completion runs before config loading, so it works even when
    // the config path does not exist.
    let missing = config_path.with_file_name("nonexistent.toml");
    let (stdout, stderr, success) = run_rsm(&missing, &["completions", "bash"]);
    assert!(success, "completions failed: stderr={}", stderr);
    assert!(stdout.contains("rsm"));
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(walk_files(&path));
        } else {
            files.push(path);
        }
    }
    files
}
