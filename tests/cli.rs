use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(
        data_dir.join("questions.json"),
        r#"[{"Title":"Binary Trees","ID":"1001"},{"Title":"Graph Search","ID":"1002"}]"#,
    )
    .unwrap();
    fs::write(data_dir.join("more.json"), r#"[{"Title":"Merge Sort"}]"#).unwrap();

    // Embedding and generation are never reached by a dry run.
    let config_content = format!(
        r#"[data]
dir = "{}/data"

[chunking]
chunk_size = 512
overlap = 32

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
base_url = "http://127.0.0.1:9"

[generation]
provider = "ollama"
model = "llama3"
base_url = "http://127.0.0.1:9"
"#,
        root.display()
    );

    let config_path = root.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_index_dry_run_counts() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_docqa(&config, &["index", "--dry-run"]);
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("3 documents"), "stdout: {}", stdout);
    assert!(stdout.contains("3 chunks"), "stdout: {}", stdout);
    assert!(stdout.contains("chunk_size=512"), "stdout: {}", stdout);
}

#[test]
fn test_dry_run_reports_bad_json() {
    let (tmp, config) = setup_test_env();
    fs::write(tmp.path().join("data/broken.json"), "{\"not\": \"an array\"}").unwrap();

    let (_stdout, stderr, success) = run_docqa(&config, &["index", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("broken.json"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_stdout, stderr, success) =
        run_docqa(&tmp.path().join("absent.toml"), &["index", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_ask_fails_when_services_unreachable() {
    let (_tmp, config) = setup_test_env();
    let (_stdout, stderr, success) = run_docqa(&config, &["ask", "What is a tree?"]);
    assert!(!success);
    assert!(stderr.contains("embedding"), "stderr: {}", stderr);
}
