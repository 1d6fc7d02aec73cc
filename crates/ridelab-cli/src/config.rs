use anyhow::{Context, Result};
use ridelab_lib::{DfaConfig, LapConfig, StageSpec};
use serde::Deserialize;
use std::path::Path;

/// Athlete profile read from `--config`; command-line flags override it.
///
/// ```toml
/// ftp = 250.0
/// stage_threshold = 0.1
///
/// [dfa]
/// artifact_threshold = "auto"
/// window_ms = 120000.0
///
/// [laps]
/// min_lap_duration = 90
///
/// [[stages]]
/// duration_s = 360
/// ftp_fraction = 0.7
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AthleteConfig {
    pub ftp: Option<f64>,
    pub stage_threshold: f64,
    pub dfa: DfaConfig,
    pub laps: LapConfig,
    pub stages: Vec<StageSpec>,
}

impl Default for AthleteConfig {
    fn default() -> Self {
        Self {
            ftp: None,
            stage_threshold: 0.1,
            dfa: DfaConfig::default(),
            laps: LapConfig::default(),
            stages: Vec::new(),
        }
    }
}

impl AthleteConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Parse `DURATION:FRACTION`, e.g. `360:0.7` for six minutes at 70% FTP.
pub fn parse_stage(text: &str) -> std::result::Result<StageSpec, String> {
    let (duration, fraction) = text
        .split_once(':')
        .ok_or_else(|| format!("expected DURATION:FRACTION, got {text:?}"))?;
    let duration_s = duration
        .trim()
        .parse()
        .map_err(|_| format!("stage duration is not a whole number of seconds: {duration:?}"))?;
    let ftp_fraction = fraction
        .trim()
        .parse()
        .map_err(|_| format!("stage FTP fraction is not a number: {fraction:?}"))?;
    Ok(StageSpec {
        duration_s,
        ftp_fraction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridelab_lib::ArtifactThreshold;

    #[test]
    fn parses_full_profile() {
        let cfg: AthleteConfig = toml::from_str(
            r#"
            ftp = 250.0
            [dfa]
            artifact_threshold = "auto"
            [laps]
            min_lap_duration = 90
            [[stages]]
            duration_s = 360
            ftp_fraction = 0.7
            [[stages]]
            duration_s = 60
            ftp_fraction = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.ftp, Some(250.0));
        assert_eq!(cfg.dfa.artifact_threshold, ArtifactThreshold::Auto);
        assert_eq!(cfg.dfa.window_ms, 120_000.0);
        assert_eq!(cfg.laps.min_lap_duration, 90);
        assert_eq!(cfg.laps.rolling_window, 10);
        assert_eq!(cfg.stages.len(), 2);
        assert_eq!(cfg.stage_threshold, 0.1);
    }

    #[test]
    fn stage_flag_syntax() {
        let spec = parse_stage("360:0.7").unwrap();
        assert_eq!(spec.duration_s, 360);
        assert_eq!(spec.ftp_fraction, 0.7);
        assert!(parse_stage("360").is_err());
        assert!(parse_stage("x:0.7").is_err());
    }
}
