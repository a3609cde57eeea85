use chrono::{Duration, NaiveDate};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use rust_decimal::prelude::ToPrimitive;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::models::{Observation, Series};
use crate::{AppError, Result};

const TITLE: &str = "Gold Price History";
const X_DESC: &str = "Date";
const Y_DESC: &str = "Price (₹ per 1g, 22K)";
const FONT_FAMILY: &str = "sans-serif";

const GRID: RGBColor = RGBColor(225, 225, 225);
const GOLD: RGBColor = RGBColor(212, 175, 55);
const MARKER: RGBColor = RGBColor(160, 120, 20);

/// Tried in order when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

// Fonts are registered process-wide, so the first renderer's choice sticks.
static LABEL_FONT: OnceLock<Option<PathBuf>> = OnceLock::new();

#[cfg_attr(test, mockall::automock)]
pub trait TrendRenderer: Send + Sync {
    /// `Ok(None)` when the series is too short to show a trend.
    fn render(&self, series: &Series) -> Result<Option<PathBuf>>;
}

/// Draws the price history as a PNG line chart at a fixed path. Title, axis
/// descriptions and date ticks need a TrueType font; without one the chart
/// is drawn bare rather than not at all.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    path: PathBuf,
    width: u32,
    height: u32,
    font: Option<PathBuf>,
}

impl ChartRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_size(path, 1000, 500)
    }

    pub fn with_size(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width: width.max(200),
            height: height.max(150),
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<PathBuf>) -> Self {
        self.font = font;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn draw(&self, points: &[(i64, f64)], first: NaiveDate, labelled: bool) -> Result<()> {
        let chart_error = |e: &dyn std::fmt::Display| {
            AppError::Chart(format!("Failed to draw {}: {}", self.path.display(), e))
        };

        let span = points.last().map(|(day, _)| *day).unwrap_or(0).max(1);
        let (low, high) = price_bounds(points);

        let root = BitMapBackend::new(&self.path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| chart_error(&e))?;

        let mut builder = ChartBuilder::on(&root);
        builder.margin(20);
        if labelled {
            builder
                .caption(TITLE, (FONT_FAMILY, 24))
                .x_label_area_size(45)
                .y_label_area_size(80);
        }
        let mut chart = builder
            .build_cartesian_2d(0i64..span, low..high)
            .map_err(|e| chart_error(&e))?;

        if labelled {
            let x_formatter = |day: &i64| date_label(first, *day);
            let y_formatter = |price: &f64| format!("{:.0}", price);
            chart
                .configure_mesh()
                .light_line_style(GRID.stroke_width(1))
                .x_labels(6)
                .y_labels(6)
                .x_label_formatter(&x_formatter)
                .y_label_formatter(&y_formatter)
                .x_desc(X_DESC)
                .y_desc(Y_DESC)
                .label_style((FONT_FAMILY, 13))
                .draw()
                .map_err(|e| chart_error(&e))?;
        }

        chart
            .draw_series(LineSeries::new(points.iter().copied(), GOLD.stroke_width(2)))
            .map_err(|e| chart_error(&e))?;
        chart
            .draw_series(points.iter().map(|point| Circle::new(*point, 4, MARKER.filled())))
            .map_err(|e| chart_error(&e))?;

        root.present().map_err(|e| chart_error(&e))
    }
}

/// Registers the first readable font once per process.
fn label_font_available(preferred: Option<&Path>) -> bool {
    LABEL_FONT
        .get_or_init(|| {
            let candidates = preferred
                .map(Path::to_path_buf)
                .into_iter()
                .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

            for path in candidates {
                let Ok(bytes) = fs::read(&path) else {
                    continue;
                };
                // plotters keeps registered font data for the life of the process
                let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
                    debug!(font = %path.display(), "Registered chart label font");
                    return Some(path);
                }
            }

            warn!("No usable TrueType font found, trend chart will have no labels");
            None
        })
        .is_some()
}

/// Observations as (days since the first, price) pairs, sorted by date.
fn plot_points(series: &Series) -> Option<(NaiveDate, Vec<(i64, f64)>)> {
    let sorted = series.sorted_by_date();
    let first = sorted.first()?.date;

    let points = sorted
        .iter()
        .map(|o: &Observation| ((o.date - first).num_days(), o.price.to_f64().unwrap_or(0.0)))
        .collect();
    Some((first, points))
}

/// Price range with 10% headroom; flat series get a ±1 band.
fn price_bounds(points: &[(i64, f64)]) -> (f64, f64) {
    let (mut low, mut high) = points
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), (_, p)| (lo.min(*p), hi.max(*p)));
    if (high - low).abs() < f64::EPSILON {
        low -= 1.0;
        high += 1.0;
    }
    let pad = (high - low) * 0.1;
    (low - pad, high + pad)
}

fn date_label(first: NaiveDate, day: i64) -> String {
    (first + Duration::days(day)).format("%d %b %Y").to_string()
}

impl TrendRenderer for ChartRenderer {
    fn render(&self, series: &Series) -> Result<Option<PathBuf>> {
        if series.len() < 2 {
            debug!(points = series.len(), "Not enough history to draw a trend");
            return Ok(None);
        }
        let Some((first, points)) = plot_points(series) else {
            return Ok(None);
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Chart(format!("Failed to create chart directory: {}", e))
                })?;
            }
        }

        let labelled = label_font_available(self.font.as_deref());
        self.draw(&points, first, labelled)?;

        info!(path = %self.path.display(), points = series.len(), labelled, "Rendered trend chart");
        Ok(Some(self.path.clone()))
    }
}
