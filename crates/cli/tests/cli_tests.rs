//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const SAFE_SAMPLE: [&str; 9] = [
    "7.0", "200.0", "20000.0", "7.0", "300.0", "500.0", "15.0", "80.0", "4.0",
];

fn potab(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_potab"))
        .args(args)
        .env_remove("POTAB_API_URL")
        .env_remove("POTAB_API_KEY")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute potab")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn generate(path: &Path, samples: &str) -> Output {
    potab(&[
        "generate-data",
        "--output",
        path.to_str().unwrap(),
        "--samples",
        samples,
    ])
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = potab(&["--help"]);
    let stdout = stdout(&output);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Water Potability Predictor"), "Should show app name");
    assert!(stdout.contains("train"), "Should show train command");
    assert!(stdout.contains("generate-data"), "Should show generate-data command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("model"), "Should show model command");
    assert!(stdout.contains("remote"), "Should show remote command");
    assert!(stdout.contains("POTAB_API_URL"), "Should show env var");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = potab(&["--version"]);
    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout(&output).contains("potab"), "Should show binary name");
}

#[test]
fn test_train_help() {
    let output = potab(&["train", "--help"]);
    let stdout = stdout(&output);
    assert!(output.status.success());
    assert!(stdout.contains("--data"));
    assert!(stdout.contains("--quick"));
    assert!(stdout.contains("--max-overfitting"));
}

#[test]
fn test_generate_data_writes_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("water.csv");

    let output = generate(&path, "150");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "pH,Hardness,Solids,Chloramines,Sulfate,Conductivity,Organic_carbon,Trihalomethanes,Turbidity,Potability"
    );
    assert_eq!(lines.count(), 150);
}

#[test]
fn test_predict_without_model_uses_fallback() {
    let dir = TempDir::new().unwrap();
    let mut args = vec!["--format", "json", "predict", "--model-dir", dir.path().to_str().unwrap()];
    args.extend(SAFE_SAMPLE);

    let output = potab(&args);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["prediction"], 1);
    assert_eq!(result["label"], "Safe");
    assert_eq!(result["model_version"], "fallback-1.0.0");
}

#[test]
fn test_predict_rejects_wrong_length() {
    let dir = TempDir::new().unwrap();
    let output = potab(&["predict", "--model-dir", dir.path().to_str().unwrap(), "7.0", "1.0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("expected 9 features"));
}

#[test]
fn test_train_then_predict() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("water.csv");
    let model_dir = dir.path().join("model");
    assert!(generate(&data, "300").status.success());

    let output = potab(&[
        "--format",
        "json",
        "train",
        "--data",
        data.to_str().unwrap(),
        "--model-dir",
        model_dir.to_str().unwrap(),
        "--quick",
        "--folds",
        "3",
        "--model-version",
        "rf-cli",
        "--force",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let outcome: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(outcome["model_saved"], true);
    assert_eq!(outcome["version"], "rf-cli");
    assert!(model_dir.join("model.json").exists());
    assert!(model_dir.join("scaler.json").exists());

    let mut args = vec!["--format", "json", "predict", "--model-dir", model_dir.to_str().unwrap()];
    args.extend(SAFE_SAMPLE);
    let output = potab(&args);
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["model_version"], "rf-cli");
}

#[test]
fn test_train_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = potab(&[
        "train",
        "--data",
        dir.path().join("absent.csv").to_str().unwrap(),
        "--model-dir",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = potab(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = potab(&["train"]);
    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}
