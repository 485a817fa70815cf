use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use nmm_inference::{SimulationResult, load_npz};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_nmm"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("nmm_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

const TINY_CONFIG: &str = r#"{
  "n": 30,
  "n_sim": 2,
  "est_nsamp": 40,
  "model": { "encoder_hidden": [6], "decoder_hidden": [6], "sim_z": 5, "nchain": 2 },
  "fit": { "epochs": 5 },
  "bias_correction": { "epochs": 4, "warmups": 1, "burnin": 2 }
}"#;

fn write_config(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(&path, TINY_CONFIG).unwrap();
    path
}

#[test]
fn cli_runs_and_writes_archive_summary_and_log() {
    let dir = tmp_path("run");
    let config = write_config(&dir);
    let output = dir.join("results").join("out.npz");
    let summary = dir.join("summary.json");
    let log = dir.join("run.log");

    let out = run(&[
        "--config",
        config.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--summary",
        summary.to_str().unwrap(),
        "--log-file",
        log.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));

    let arrays = load_npz(&output).unwrap();
    assert_eq!(arrays.len(), SimulationResult::KEYS.len());
    for key in SimulationResult::KEYS {
        assert_eq!(arrays[key].dim(), (2, 40), "{}", key);
        assert!(arrays[key].iter().all(|v| v.is_finite()), "{}", key);
    }

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(v.as_array().map(|a| a.len()), Some(2));

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("===> Simulation 0\n\n"));
    assert!(text.contains("===> Simulation 1 finished in"));
    // Section headers and per-estimate distances are followed by a blank line.
    let blank_after = |prefix: &str| {
        let lines: Vec<&str> = text.lines().collect();
        lines.windows(2).filter(|w| w[0].trim_start().starts_with(prefix)).all(|w| w[1].is_empty())
    };
    assert!(blank_after("===> Simulation"));
    assert!(blank_after("=> W = "));
    assert!(text.contains("=> Bias correction"));
    assert!(text.contains("=> KS = "));
    assert!(!text.contains("INFO"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_flags_override_config() {
    let dir = tmp_path("override");
    let config = write_config(&dir);
    let out = run(&[
        "--config",
        config.to_str().unwrap(),
        "--n-sim",
        "7",
        "--seed",
        "99",
        "--print-config",
    ]);
    assert!(out.status.success(), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["n_sim"], 7);
    assert_eq!(v["seed"], 99);
    assert_eq!(v["n"], 30);
    assert_eq!(v["mixture"]["mu2"], 3.0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_rejects_invalid_config() {
    let dir = tmp_path("invalid");
    std::fs::create_dir_all(&dir).unwrap();
    let config = dir.join("bad.json");
    std::fs::write(&config, r#"{"bias_correction": {"epochs": 5, "warmups": 10}}"#).unwrap();
    let output = dir.join("never.npz");

    let out = run(&["--config", config.to_str().unwrap(), "--output", output.to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("warmups"));
    assert!(!output.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_binary_is_named_nmm() {
    let out = run(&["--version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("nmm "), "{}", stdout);
    assert_eq!(bin_path().file_stem().and_then(|s| s.to_str()), Some("nmm"));
}
