use crate::metrics::{dfa::Alpha1Point, mean_max::MeanMaxCurve};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn with_labels(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.into());
        self.y.label = Some(y.into());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all series; `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        Some(points.fold(
            (first[0], first[0], first[1], first[1]),
            |(x0, x1, y0, y1), p| (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1])),
        ))
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

fn line(name: &str, points: Vec<[f64; 2]>, width: f32, color: u32) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points,
        style: Style {
            width,
            dash: None,
            color: Color(color),
        },
    })
}

/// Mean-maximal curve against duration in seconds.
pub fn figure_from_mean_max(curve: &MeanMaxCurve, max_points: usize) -> Figure {
    let points: Vec<[f64; 2]> = curve
        .means
        .iter()
        .enumerate()
        .map(|(d, watts)| [(d + 1) as f64, *watts])
        .collect();
    let mut fig = Figure::new(Some("Mean maximal power".into())).with_labels("duration (s)", "W");
    fig.add_series(line("MMP", decimate_points(&points, max_points), 2.0, 0xFF0077));
    fig
}

/// Alpha-1 readings against elapsed minutes, with the 0.75 and 0.5 guide
/// lines used for aerobic/anaerobic threshold estimates.
pub fn figure_from_alpha1(points: &[Alpha1Point], max_points: usize) -> Figure {
    let series: Vec<[f64; 2]> = points
        .iter()
        .map(|p| [p.elapsed_ms / 60_000.0, p.alpha1])
        .collect();
    let mut fig = Figure::new(Some("DFA alpha-1".into())).with_labels("time (min)", "alpha-1");
    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        let (start, end) = (first[0], last[0]);
        fig.add_series(line("alpha-1", decimate_points(&series, max_points), 2.0, 0x0077FF));
        fig.add_series(line("0.75", vec![[start, 0.75], [end, 0.75]], 1.0, 0x999999));
        fig.add_series(line("0.5", vec![[start, 0.5], [end, 0.5]], 1.0, 0x999999));
    }
    fig
}
