mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{parse_stage, AthleteConfig};
use log::info;
use plotters::prelude::*;
use ridelab_lib::{
    detectors::{
        laps::{detect_laps, summarize_laps, LapSummary},
        stage::{
            detect_stage_profile_with_progress, DetectionResult, StageProfile, StageSpec,
            StreamingStageDetector,
        },
    },
    io::{csv as csv_io, text as text_io},
    metrics::{
        dfa::{alpha1_series, Alpha1Point, ArtifactThreshold, DfaAlpha1, DfaConfig},
        hrv::hrv_time,
        mean_max::{mean_max_curve_with_progress, CurvePoint, STANDARD_DURATIONS},
    },
    plot::{figure_from_alpha1, figure_from_mean_max, Figure, PlotBackend, Series},
    signal::{PowerSeries, RRSeries},
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ridelab",
    version,
    about = "Ridelab: heart-rate variability and power analysis for training sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Newline-delimited samples or a CSV/TSV export (with --column); stdin if omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Column to read from a CSV/TSV export
    #[arg(long)]
    column: Option<String>,
}

#[derive(Args)]
struct DfaArgs {
    /// Athlete profile (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Artifact threshold: fraction of the previous beat, or "auto"
    #[arg(long)]
    threshold: Option<ArtifactThreshold>,
    /// Retained history in ms
    #[arg(long)]
    window_ms: Option<f64>,
}

impl DfaArgs {
    fn resolve(&self) -> Result<DfaConfig> {
        let mut cfg = AthleteConfig::load(self.config.as_deref())?.dfa;
        if let Some(threshold) = self.threshold {
            cfg.artifact_threshold = threshold;
        }
        if let Some(window_ms) = self.window_ms {
            cfg.window_ms = window_ms;
        }
        Ok(cfg)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// DFA alpha-1 over the final window of a beat-to-beat (ms) recording
    Dfa {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        dfa: DfaArgs,
    },
    /// Alpha-1 time series, one reading per step once a window has elapsed
    DfaSeries {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        dfa: DfaArgs,
        #[arg(long, default_value_t = 5_000.0)]
        step_ms: f64,
        /// Render the series to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Time-domain HRV from beat-to-beat intervals (ms)
    Hrv {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Mean-maximal power curve of a 1 Hz power recording
    MeanMax {
        #[command(flatten)]
        input: InputArgs,
        /// Include the best mean for every duration
        #[arg(long)]
        full: bool,
        /// Render the curve to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Locate a staged test protocol in a power recording
    Stages {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        ftp: Option<f64>,
        /// Protocol stage as DURATION:FTP_FRACTION; repeat in order
        #[arg(long = "stage", value_parser = parse_stage)]
        stages: Vec<StageSpec>,
        /// Acceptance threshold for streaming detections
        #[arg(long)]
        threshold: Option<f64>,
        /// Feed samples one by one instead of scanning the whole recording
        #[arg(long)]
        streaming: bool,
    },
    /// Split a power recording into laps at sustained step changes
    Laps {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        ftp: Option<f64>,
        #[arg(long)]
        min_lap_s: Option<usize>,
        #[arg(long)]
        threshold_fraction: Option<f64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Dfa { input, dfa } => cmd_dfa(&input, &dfa)?,
        Commands::DfaSeries {
            input,
            dfa,
            step_ms,
            plot,
        } => cmd_dfa_series(&input, &dfa, step_ms, plot.as_deref())?,
        Commands::Hrv { input } => cmd_hrv(&input)?,
        Commands::MeanMax { input, full, plot } => cmd_mean_max(&input, full, plot.as_deref())?,
        Commands::Stages {
            input,
            config,
            ftp,
            stages,
            threshold,
            streaming,
        } => cmd_stages(
            &input,
            config.as_deref(),
            ftp,
            stages,
            threshold,
            streaming,
        )?,
        Commands::Laps {
            input,
            config,
            ftp,
            min_lap_s,
            threshold_fraction,
        } => cmd_laps(
            &input,
            config.as_deref(),
            ftp,
            min_lap_s,
            threshold_fraction,
        )?,
    }
    Ok(())
}

fn read_samples(input: &InputArgs) -> Result<Vec<f64>> {
    match (&input.input, &input.column) {
        (Some(path), Some(column)) => csv_io::read_csv_column(path, column),
        (Some(path), None) => text_io::read_f64_series(path),
        (None, column) => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            match column {
                Some(column) => csv_io::read_csv_column_from(buf.as_bytes(), column, b','),
                None => text_io::parse_f64_series(&buf),
            }
        }
    }
}

fn log_progress(task: &'static str) -> impl FnMut(f64) {
    move |fraction| {
        if (fraction * 100.0).round() as usize % 10 == 0 {
            info!("{task}: {:.0}%", fraction * 100.0);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[derive(Serialize)]
struct DfaOutput {
    alpha1: f64,
    beats: usize,
    recording_ms: f64,
    retained: usize,
    retained_duration_ms: f64,
    artifacts_removed: usize,
}

fn cmd_dfa(input: &InputArgs, args: &DfaArgs) -> Result<()> {
    let rr = RRSeries {
        rr: read_samples(input)?,
    };
    let mut estimator = DfaAlpha1::new(args.resolve()?)?;
    for &value in &rr.rr {
        estimator.add(value);
    }
    let alpha1 = estimator.alpha1().context("alpha-1 unavailable")?;
    print_json(&DfaOutput {
        alpha1,
        beats: rr.len(),
        recording_ms: rr.duration_ms(),
        retained: estimator.len(),
        retained_duration_ms: estimator.retained_duration(),
        artifacts_removed: estimator.artifacts_removed(),
    })
}

#[derive(Serialize)]
struct DfaSeriesOutput {
    points: Vec<Alpha1Point>,
}

fn cmd_dfa_series(
    input: &InputArgs,
    args: &DfaArgs,
    step_ms: f64,
    plot: Option<&Path>,
) -> Result<()> {
    let rr = read_samples(input)?;
    let points = alpha1_series(&rr, args.resolve()?, step_ms, log_progress("alpha-1"))?;
    if let Some(path) = plot {
        PngBackend::new(path).draw(&figure_from_alpha1(&points, 1024))?;
    }
    print_json(&DfaSeriesOutput { points })
}

fn cmd_hrv(input: &InputArgs) -> Result<()> {
    let rr = RRSeries {
        rr: read_samples(input)?,
    };
    print_json(&hrv_time(&rr))
}

#[derive(Serialize)]
struct MeanMaxOutput {
    samples: usize,
    average_watts: f64,
    points: Vec<CurvePoint>,
    ftp_estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    means: Option<Vec<f64>>,
}

fn cmd_mean_max(input: &InputArgs, full: bool, plot: Option<&Path>) -> Result<()> {
    let power = PowerSeries {
        watts: read_samples(input)?,
    };
    let curve = mean_max_curve_with_progress(&power.watts, log_progress("mean-max"));
    if let Some(path) = plot {
        PngBackend::new(path).draw(&figure_from_mean_max(&curve, 1024))?;
    }
    print_json(&MeanMaxOutput {
        samples: power.len(),
        average_watts: power.average(),
        points: curve.points(STANDARD_DURATIONS),
        ftp_estimate: curve.ftp_estimate(),
        means: full.then(|| curve.means.clone()),
    })
}

#[derive(Serialize)]
struct StagesOutput {
    mode: &'static str,
    total_duration: usize,
    threshold: f64,
    detection: Option<DetectionResult>,
    below_threshold: bool,
}

fn cmd_stages(
    input: &InputArgs,
    config: Option<&Path>,
    ftp: Option<f64>,
    stages: Vec<StageSpec>,
    threshold: Option<f64>,
    streaming: bool,
) -> Result<()> {
    let cfg = AthleteConfig::load(config)?;
    let specs = if stages.is_empty() { cfg.stages } else { stages };
    if specs.is_empty() {
        anyhow::bail!("no protocol stages given; use --stage or [[stages]] in --config");
    }
    let profile = StageProfile::from_ftp_fractions(&specs, ftp.or(cfg.ftp))?;
    let threshold = threshold.unwrap_or(cfg.stage_threshold);
    let power = read_samples(input)?;
    let total_duration = profile.total_duration();

    let (mode, detection) = if streaming {
        let mut detector = StreamingStageDetector::new(profile, threshold);
        for &watts in &power {
            detector.push(watts);
        }
        ("streaming", detector.best())
    } else {
        let detection =
            detect_stage_profile_with_progress(&power, &profile, log_progress("stages"))?;
        ("batch", Some(detection))
    };
    print_json(&StagesOutput {
        mode,
        total_duration,
        threshold,
        detection,
        below_threshold: detection.map_or(false, |d| d.error_metric < threshold),
    })
}

#[derive(Serialize)]
struct LapsOutput {
    laps: Vec<LapSummary>,
}

fn cmd_laps(
    input: &InputArgs,
    config: Option<&Path>,
    ftp: Option<f64>,
    min_lap_s: Option<usize>,
    threshold_fraction: Option<f64>,
) -> Result<()> {
    let cfg = AthleteConfig::load(config)?;
    let mut lap_cfg = cfg.laps;
    if let Some(min_lap_s) = min_lap_s {
        lap_cfg.min_lap_duration = min_lap_s;
    }
    if let Some(fraction) = threshold_fraction {
        lap_cfg.threshold_fraction = fraction;
    }
    let power = PowerSeries {
        watts: read_samples(input)?,
    };
    let laps = detect_laps(&power.watts, ftp.or(cfg.ftp), &lap_cfg)?;
    print_json(&LapsOutput {
        laps: summarize_laps(&power.watts, &laps),
    })
}

/// Renders figures to a PNG file via plotters.
struct PngBackend<'a> {
    path: &'a Path,
    size: (u32, u32),
}

impl<'a> PngBackend<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            size: (800, 480),
        }
    }
}

impl PlotBackend for PngBackend<'_> {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let Some((x_min, x_max, y_min, y_max)) = fig.bounds() else {
            anyhow::bail!("nothing to plot");
        };
        let (x_max, y_max) = (x_max.max(x_min + 1e-9), y_max.max(y_min + 1e-9));
        let root = BitMapBackend::new(self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        chart
            .configure_mesh()
            .x_desc(fig.x.label.clone().unwrap_or_default())
            .y_desc(fig.y.label.clone().unwrap_or_default())
            .draw()?;
        for series in &fig.series {
            match series {
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    chart.draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                    ))?;
                }
            }
        }
        root.present()
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
