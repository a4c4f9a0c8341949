//! SVG line charts of metric series across releases.
//!
//! The x axis is categorical: release `i` sits at `x = i` and the tick
//! formatter maps positions back to release labels. Series with gaps are
//! drawn through the releases that have values.

use camino::{Utf8Path, Utf8PathBuf};
use plotters::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::table::Series;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 700;

/// Errors from chart rendering.
#[derive(Error, Debug)]
pub enum ChartError {
    /// Nothing to plot.
    #[error("chart {0:?} has no data points")]
    Empty(String),

    /// The output directory could not be created.
    #[error("failed to create {path}: {source}")]
    Io {
        /// Directory involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The plotting backend failed.
    #[error("failed to render {path}: {message}")]
    Render {
        /// Output file.
        path: Utf8PathBuf,
        /// Backend error text.
        message: String,
    },
}

/// Result alias for chart operations.
pub type ChartResult<T> = Result<T, ChartError>;

/// A line chart with one x position per release.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    /// File name without extension.
    pub name: String,
    /// Caption.
    pub title: String,
    /// X axis description.
    pub x_desc: String,
    /// Y axis description.
    pub y_desc: String,
    /// Release labels in plotting order.
    pub releases: Vec<String>,
    /// Series aligned with `releases`.
    pub series: Vec<Series>,
}

impl LineChart {
    /// Whether any series has at least one value.
    pub fn has_data(&self) -> bool {
        self.series
            .iter()
            .any(|s| s.points.iter().any(Option::is_some))
    }

    /// `<name>.svg` inside `dir`.
    pub fn path_in(&self, dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(format!("{}.svg", self.name))
    }

    /// Padded min/max over every value.
    fn y_range(&self) -> Option<(f64, f64)> {
        let values = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().flatten().copied());
        let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;

        let pad = if (max - min).abs() < f64::EPSILON {
            min.abs().max(1.0) * 0.1
        } else {
            (max - min) * 0.05
        };
        Some((min - pad, max + pad))
    }
}

/// Render `chart` into `dir`, returning the written path.
#[instrument(skip(chart), fields(chart = %chart.name))]
pub fn render_svg(chart: &LineChart, dir: &Utf8Path) -> ChartResult<Utf8PathBuf> {
    let Some(y_range) = chart.y_range() else {
        return Err(ChartError::Empty(chart.name.clone()));
    };

    std::fs::create_dir_all(dir).map_err(|source| ChartError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = chart.path_in(dir);

    draw(chart, &path, y_range).map_err(|e| ChartError::Render {
        path: path.clone(),
        message: e.to_string(),
    })?;

    debug!(%path, "chart written");
    Ok(path)
}

#[allow(clippy::cast_precision_loss)]
fn draw(
    chart: &LineChart,
    path: &Utf8Path,
    (y_min, y_max): (f64, f64),
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path.as_std_path(), (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let n = chart.releases.len();
    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 26))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)?;

    let releases = &chart.releases;
    let label = |x: &f64| release_at(releases, *x);
    ctx.configure_mesh()
        .x_desc(chart.x_desc.as_str())
        .y_desc(chart.y_desc.as_str())
        .x_labels(n.max(1))
        .x_label_formatter(&label)
        .y_label_formatter(&|y| format!("{y:.2}"))
        .draw()?;

    for (i, series) in chart.series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let points: Vec<(f64, f64)> = series
            .points
            .iter()
            .enumerate()
            .filter_map(|(x, y)| y.map(|y| (x as f64, y)))
            .collect();

        ctx.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(series.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        ctx.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
        )?;
    }

    if chart.series.len() > 1 {
        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// Release label at an integral x position; blank between releases.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn release_at(releases: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    releases.get(rounded as usize).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chart(series: Vec<Series>) -> LineChart {
        LineChart {
            name: "bugs_total".into(),
            title: "Total bugs per release".into(),
            x_desc: "Release".into(),
            y_desc: "Bugs".into(),
            releases: vec!["3.15.0".into(), "3.16.0".into(), "3.17.0".into()],
            series,
        }
    }

    fn series(name: &str, points: Vec<Option<f64>>) -> Series {
        Series {
            name: name.into(),
            points,
        }
    }

    #[test]
    fn labels_only_on_release_positions() {
        let releases = vec!["3.16.0".to_string(), "3.17.0".to_string()];
        assert_eq!(release_at(&releases, 0.0), "3.16.0");
        assert_eq!(release_at(&releases, 1.0), "3.17.0");
        assert_eq!(release_at(&releases, 0.5), "");
        assert_eq!(release_at(&releases, -1.0), "");
        assert_eq!(release_at(&releases, 7.0), "");
    }

    #[test]
    fn y_range_is_padded() {
        let c = chart(vec![series("Total", vec![Some(10.0), None, Some(30.0)])]);
        let (lo, hi) = c.y_range().unwrap();
        assert!((lo - 9.0).abs() < 1e-9);
        assert!((hi - 31.0).abs() < 1e-9);
    }

    #[test]
    fn flat_series_still_has_height() {
        let c = chart(vec![series("Total", vec![Some(0.0), Some(0.0), Some(0.0)])]);
        let (lo, hi) = c.y_range().unwrap();
        assert!(lo < 0.0 && hi > 0.0);
    }

    #[test]
    fn empty_chart_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        let c = chart(vec![series("Total", vec![None, None, None])]);
        assert!(!c.has_data());
        assert!(matches!(render_svg(&c, dir), Err(ChartError::Empty(_))));
    }

    #[test]
    fn renders_svg_file() {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap().join("charts");
        let c = chart(vec![
            series("BAD_PRACTICE", vec![Some(3.0), Some(2.0), Some(2.0)]),
            series("PERFORMANCE", vec![None, Some(1.0), Some(4.0)]),
        ]);

        let path = render_svg(&c, &dir).unwrap();
        assert_eq!(path, dir.join("bugs_total.svg"));
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Total bugs per release"));
    }
}
