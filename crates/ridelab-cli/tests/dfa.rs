use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};
use tempfile::TempDir;

#[derive(Deserialize)]
struct DfaOutput {
    alpha1: f64,
    beats: usize,
    retained: usize,
    artifacts_removed: usize,
}

#[derive(Deserialize)]
struct Alpha1Point {
    elapsed_ms: f64,
    alpha1: f64,
}

#[derive(Deserialize)]
struct DfaSeriesOutput {
    points: Vec<Alpha1Point>,
}

#[derive(Deserialize)]
struct HrvOutput {
    n: usize,
    mean_rr_ms: f64,
    rmssd_ms: f64,
}

fn synthetic_rr(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            800.0 + 40.0 * (t * 0.7).sin() + 15.0 * (t * 2.3).sin()
        })
        .collect()
}

fn write_series(dir: &TempDir, name: &str, values: &[f64]) -> PathBuf {
    let path = dir.path().join(name);
    let text: String = values.iter().map(|v| format!("{v}\n")).collect();
    fs::write(&path, format!("# rr ms\n{text}")).expect("write series");
    path
}

#[test]
fn dfa_reports_alpha_and_artifacts() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let mut rr = synthetic_rr(200);
    rr[50] = 2000.0;
    let path = write_series(&dir, "rr.txt", &rr);

    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args([
        "dfa",
        "--input",
        path.to_str().expect("utf8 path"),
        "--threshold",
        "0.5",
        "--window-ms",
        "600000",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: DfaOutput = serde_json::from_slice(&out)?;
    assert!(value.alpha1.is_finite());
    assert_eq!(value.beats, 200);
    assert_eq!(value.artifacts_removed, 1);
    assert_eq!(value.retained, 199);
    Ok(())
}

#[test]
fn dfa_window_limits_retained_beats() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = write_series(&dir, "rr.txt", &synthetic_rr(400));

    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args([
        "dfa",
        "--input",
        path.to_str().expect("utf8 path"),
        "--threshold",
        "auto",
        "--window-ms",
        "60000",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: DfaOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.artifacts_removed, 0);
    // 60 s of beats between 745 and 855 ms
    assert!((70..=80).contains(&value.retained), "retained {}", value.retained);
    Ok(())
}

#[test]
fn dfa_needs_three_beats() {
    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args(["dfa"]).write_stdin("800\n810\n");
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("too few data points"), "{stderr}");
}

#[test]
fn dfa_series_reads_every_step() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = write_series(&dir, "rr.txt", &synthetic_rr(400));

    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args([
        "dfa-series",
        "--input",
        path.to_str().expect("utf8 path"),
        "--threshold",
        "auto",
        "--step-ms",
        "30000",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: DfaSeriesOutput = serde_json::from_slice(&out)?;
    assert!(value.points.len() >= 5, "{} readings", value.points.len());
    assert!(value.points[0].elapsed_ms >= 120_000.0);
    assert!(value.points.iter().all(|p| p.alpha1.is_finite()));
    Ok(())
}

#[test]
fn hrv_from_stdin() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args(["hrv"]).write_stdin("800\n900\n800\n900\n800\n");
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: HrvOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.n, 5);
    assert!((value.mean_rr_ms - 840.0).abs() < 1e-9);
    assert!((value.rmssd_ms - 100.0).abs() < 1e-9);
    Ok(())
}
