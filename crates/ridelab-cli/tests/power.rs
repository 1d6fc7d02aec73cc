use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};
use tempfile::TempDir;

#[derive(Deserialize)]
struct CurvePoint {
    duration_s: usize,
    watts: f64,
}

#[derive(Deserialize)]
struct MeanMaxOutput {
    samples: usize,
    points: Vec<CurvePoint>,
    ftp_estimate: Option<f64>,
    means: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct Detection {
    offset: usize,
    error_metric: f64,
}

#[derive(Deserialize)]
struct StagesOutput {
    mode: String,
    total_duration: usize,
    detection: Option<Detection>,
    below_threshold: bool,
}

#[derive(Deserialize)]
struct LapSummary {
    started_at: usize,
    duration: usize,
    average: f64,
}

#[derive(Deserialize)]
struct LapsOutput {
    laps: Vec<LapSummary>,
}

const STEP_SIGNAL: &str = "10\n20\n25\n30\n40\n50\n60\n67\n40\n50\n60\n67\n20\n20\n30\n30\n50\n50\n";

fn steps(levels: &[(usize, f64)]) -> Vec<f64> {
    levels
        .iter()
        .flat_map(|&(len, watts)| std::iter::repeat(watts).take(len))
        .collect()
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write input");
    path
}

fn as_lines(values: &[f64]) -> String {
    values.iter().map(|v| format!("{v}\n")).collect()
}

#[test]
fn mean_max_from_csv_column() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let power = steps(&[(300, 150.0), (1200, 280.0), (300, 150.0)]);
    let mut csv = String::from("secs,watts,hr\n");
    for (i, watts) in power.iter().enumerate() {
        csv.push_str(&format!("{i},{watts},140\n"));
    }
    let path = write_file(&dir, "ride.csv", &csv);

    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args([
        "mean-max",
        "--input",
        path.to_str().expect("utf8 path"),
        "--column",
        "watts",
        "--full",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: MeanMaxOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.samples, 1800);
    assert_eq!(value.points.first().map(|p| p.duration_s), Some(1));
    assert!(value.points.iter().all(|p| p.watts <= 280.0 + 1e-9));
    assert!((value.ftp_estimate.expect("20 min present") - 266.0).abs() < 1e-6);
    let means = value.means.expect("full curve requested");
    assert_eq!(means.len(), 1800);
    assert!((means[1799] - power.iter().sum::<f64>() / 1800.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn stages_batch_worked_example() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args([
        "stages", "--ftp", "100", "--stage", "2:0.2", "--stage", "2:0.3", "--stage", "2:0.5",
    ])
    .write_stdin(STEP_SIGNAL);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: StagesOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.mode, "batch");
    assert_eq!(value.total_duration, 6);
    let detection = value.detection.expect("batch always detects");
    assert_eq!(detection.offset, 12);
    assert!(detection.error_metric.abs() < 1e-9);
    assert!(value.below_threshold);
    Ok(())
}

#[test]
fn stages_streaming_from_config() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = write_file(
        &dir,
        "athlete.toml",
        r#"
ftp = 100.0
stage_threshold = 0.4

[[stages]]
duration_s = 2
ftp_fraction = 0.2

[[stages]]
duration_s = 2
ftp_fraction = 0.3

[[stages]]
duration_s = 2
ftp_fraction = 0.5
"#,
    );
    let input = write_file(&dir, "power.txt", STEP_SIGNAL);

    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args([
        "stages",
        "--streaming",
        "--config",
        config.to_str().expect("utf8 path"),
        "--input",
        input.to_str().expect("utf8 path"),
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: StagesOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.mode, "streaming");
    let detection = value.detection.expect("match below threshold");
    assert_eq!(detection.offset, 12);
    assert!(detection.error_metric.abs() < 1e-9);
    Ok(())
}

#[test]
fn stages_without_ftp_fail() {
    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args(["stages", "--stage", "2:0.5"]).write_stdin(STEP_SIGNAL);
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("ftp"), "{stderr}");
}

#[test]
fn laps_cover_recording() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let power = steps(&[(120, 100.0), (120, 200.0), (120, 150.0)]);
    let input = write_file(&dir, "power.txt", &as_lines(&power));
    let config = write_file(&dir, "athlete.toml", "ftp = 200.0\n\n[laps]\nmin_lap_duration = 60\n");

    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args([
        "laps",
        "--config",
        config.to_str().expect("utf8 path"),
        "--input",
        input.to_str().expect("utf8 path"),
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: LapsOutput = serde_json::from_slice(&out)?;
    assert_eq!(value.laps.len(), 3);
    assert_eq!(value.laps[0].started_at, 0);
    for w in value.laps.windows(2) {
        assert_eq!(w[0].started_at + w[0].duration, w[1].started_at);
    }
    assert_eq!(value.laps.iter().map(|l| l.duration).sum::<usize>(), 360);
    assert!(value.laps[1].average > value.laps[2].average);
    Ok(())
}

#[test]
fn laps_need_ftp() {
    let power = steps(&[(120, 100.0), (120, 200.0)]);
    let mut cmd = cargo_bin_cmd!("ridelab");
    cmd.args(["laps"]).write_stdin(as_lines(&power));
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("missing configuration: ftp"), "{stderr}");
}
