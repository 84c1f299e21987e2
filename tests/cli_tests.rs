//! Integration tests for the uncors-tls CLI
//!
//! These tests run the actual uncors-tls binary and verify its behavior.
//! Each test uses an isolated temp directory via UNCORS_CONFIG_DIR.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Create a test environment with isolated directories
struct TestEnv {
    /// Temporary directory that will be cleaned up on drop
    _temp_dir: TempDir,
    /// The directory where uncors-tls stores its files
    config_dir: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = temp_dir.path().join("uncors");

        TestEnv {
            _temp_dir: temp_dir,
            config_dir,
        }
    }

    /// Run uncors-tls with the isolated environment
    fn run(&self, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_uncors-tls"))
            .args(args)
            .env("UNCORS_CONFIG_DIR", &self.config_dir)
            .env("HOME", self._temp_dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute uncors-tls")
    }

    fn ca_cert(&self) -> PathBuf {
        self.config_dir.join("ca.crt")
    }

    fn ca_key(&self) -> PathBuf {
        self.config_dir.join("ca.key")
    }
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// Test: uncors-tls generate-certs
// ============================================================================

#[test]
fn test_generate_certs_creates_ca() {
    let env = TestEnv::new();

    let output = env.run(&["generate-certs"]);
    assert!(
        output.status.success(),
        "generate-certs failed: {}",
        stderr(&output)
    );

    assert!(env.ca_cert().exists(), "CA certificate was not created");
    assert!(env.ca_key().exists(), "CA key was not created");

    let cert = std::fs::read_to_string(env.ca_cert()).unwrap();
    let key = std::fs::read_to_string(env.ca_key()).unwrap();
    assert!(cert.contains("BEGIN CERTIFICATE"));
    assert!(key.contains("BEGIN RSA PRIVATE KEY"));

    let out = stdout(&output);
    assert!(out.contains(&env.ca_cert().display().to_string()));
    assert!(out.contains(&env.ca_key().display().to_string()));
    assert!(out.contains("365 days"));
}

#[cfg(unix)]
#[test]
fn test_generate_certs_key_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let env = TestEnv::new();
    let output = env.run(&["generate-certs"]);
    assert!(output.status.success());

    let mode = std::fs::metadata(env.ca_key()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600, "CA key should be owner-only");
}

#[test]
fn test_generate_certs_with_validity_days() {
    let env = TestEnv::new();

    let output = env.run(&["generate-certs", "--validity-days", "30"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("30 days"));

    let info = uncors_tls::parse_cert_pem(&std::fs::read_to_string(env.ca_cert()).unwrap())
        .unwrap();
    assert_eq!(info.validity(), time::Duration::days(30));
}

#[test]
fn test_generate_certs_rejects_zero_days() {
    let env = TestEnv::new();

    let output = env.run(&["generate-certs", "--validity-days", "0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error"));
    assert!(!env.ca_cert().exists());
}

#[test]
fn test_generate_certs_refuses_to_overwrite_without_force() {
    let env = TestEnv::new();

    let output = env.run(&["generate-certs"]);
    assert!(output.status.success(), "First run should succeed");

    let original_cert = std::fs::read(env.ca_cert()).unwrap();
    let original_key = std::fs::read(env.ca_key()).unwrap();

    let output = env.run(&["generate-certs"]);
    assert!(
        !output.status.success(),
        "Second run without --force should fail"
    );

    let err = stderr(&output);
    assert!(err.contains("already exists"), "unexpected stderr: {}", err);
    assert!(err.contains(&env.ca_cert().display().to_string()));

    assert_eq!(std::fs::read(env.ca_cert()).unwrap(), original_cert);
    assert_eq!(std::fs::read(env.ca_key()).unwrap(), original_key);
}

#[test]
fn test_generate_certs_with_force_regenerates_ca() {
    let env = TestEnv::new();

    let output = env.run(&["generate-certs"]);
    assert!(output.status.success(), "First run should succeed");
    let original = std::fs::read(env.ca_cert()).unwrap();

    let output = env.run(&["generate-certs", "--force"]);
    assert!(
        output.status.success(),
        "--force should succeed: {}",
        stderr(&output)
    );

    let regenerated = std::fs::read(env.ca_cert()).unwrap();
    assert_ne!(original, regenerated, "CA should be regenerated with --force");
}

#[test]
fn test_generate_certs_uses_config_default() {
    let env = TestEnv::new();
    std::fs::create_dir_all(&env.config_dir).unwrap();
    std::fs::write(env.config_dir.join("config.toml"), "ca_days = 90\n").unwrap();

    let output = env.run(&["generate-certs"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("90 days"));
}

// ============================================================================
// Test: uncors-tls status
// ============================================================================

#[test]
fn test_status_without_ca() {
    let env = TestEnv::new();

    let output = env.run(&["status"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("not initialized"));
}

#[test]
fn test_status_with_ca() {
    let env = TestEnv::new();
    assert!(env.run(&["generate-certs"]).status.success());

    let output = env.run(&["status"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("initialized"));
    assert!(out.contains(&env.ca_cert().display().to_string()));
    assert!(out.contains("Expires:"));
}

#[test]
fn test_status_warns_when_expiring() {
    let env = TestEnv::new();
    assert!(env
        .run(&["generate-certs", "--validity-days", "1"])
        .status
        .success());

    let output = env.run(&["status"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("expires soon"));
}

#[test]
fn test_quiet_and_verbose_conflict() {
    let env = TestEnv::new();
    let output = env.run(&["status", "--quiet", "--verbose"]);
    assert!(!output.status.success());
}

#[test]
fn test_relative_config_dir_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_uncors-tls"))
        .arg("status")
        .env("UNCORS_CONFIG_DIR", "relative/uncors")
        .output()
        .expect("Failed to execute uncors-tls");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("UNCORS_CONFIG_DIR"));
}
