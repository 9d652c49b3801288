//! Backend-independent residual chart description.
//!
//! A [`PlotModel`] is rebuilt from the store on every redraw and handed to a
//! [`ResidualRenderer`]. Backends only draw what the model lists: they never
//! look at the store themselves.

pub mod plotters_backend;

pub use plotters_backend::{ImageFormat, PlottersRenderer};

use crate::export::VariableFilter;
use crate::palette::{Rgb, DIAGNOSTIC_COLOR};
use crate::series::TimeSeriesStore;
use foamwatch_case::XAxis;
use std::collections::BTreeSet;

pub const DIAGNOSTIC_NAME: &str = "max alpha";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Markers,
}

/// One drawn series. Consecutive present samples form a segment; an absent
/// or non-positive sample ends the segment, so no line crosses a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotLine {
    pub name: String,
    pub color: Rgb,
    pub style: LineStyle,
    pub segments: Vec<Vec<(f64, f64)>>,
}

impl PlotLine {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.segments.iter().flatten().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub name: String,
    pub color: Rgb,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotBounds {
    pub x_min: f64,
    pub x_max: f64,
    /// Both strictly positive: the value axis is logarithmic.
    pub y_min: f64,
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotModel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub lines: Vec<PlotLine>,
    pub legend: Vec<LegendEntry>,
    pub bounds: Option<PlotBounds>,
}

/// Display options that are not part of the run state.
#[derive(Debug, Clone, Default)]
pub struct PlotView {
    pub title: String,
    pub axis: XAxis,
    pub filter: VariableFilter,
    pub hidden: BTreeSet<String>,
    pub show_diagnostic: bool,
}

impl PlotView {
    pub fn is_visible(&self, variable: &str) -> bool {
        !self.hidden.contains(variable)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("no samples to draw")]
    NoData,
    #[error("backend error: {0}")]
    Backend(String),
}

/// A display backend for residual charts.
pub trait ResidualRenderer {
    fn render(&mut self, model: &PlotModel) -> Result<(), RenderError>;
}

impl PlotModel {
    pub fn build(store: &TimeSeriesStore, view: &PlotView) -> Self {
        let xs: Vec<f64> = match view.axis {
            XAxis::Time => store.times().to_vec(),
            XAxis::Iteration => (1..=store.times().len()).map(|i| i as f64).collect(),
        };

        let mut legend = Vec::new();
        let mut lines = Vec::new();
        for series in store.series() {
            if !view.filter.allows(series.name()) || !series.has_data() {
                continue;
            }
            let visible = view.is_visible(series.name());
            legend.push(LegendEntry {
                name: series.name().to_string(),
                color: series.color(),
                visible,
            });
            if visible {
                lines.push(PlotLine {
                    name: series.name().to_string(),
                    color: series.color(),
                    style: LineStyle::Solid,
                    segments: segments(&xs, series.samples()),
                });
            }
        }

        if view.show_diagnostic && store.diagnostic().iter().any(Option::is_some) {
            lines.push(PlotLine {
                name: DIAGNOSTIC_NAME.to_string(),
                color: DIAGNOSTIC_COLOR,
                style: LineStyle::Markers,
                segments: segments(&xs, store.diagnostic()),
            });
        }

        let bounds = compute_bounds(&lines);
        Self {
            title: view.title.clone(),
            x_label: view.axis.label().to_string(),
            y_label: "Residual".to_string(),
            lines,
            legend,
            bounds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.segments.is_empty())
    }
}

fn segments(xs: &[f64], samples: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (x, sample) in xs.iter().zip(samples) {
        match sample {
            Some(value) if *value > 0.0 => current.push((*x, *value)),
            _ => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// X range padded when degenerate; y range widened to whole decades.
fn compute_bounds(lines: &[PlotLine]) -> Option<PlotBounds> {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for (x, y) in lines.iter().flat_map(PlotLine::points) {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !x_min.is_finite() || !y_min.is_finite() {
        return None;
    }
    if x_min == x_max {
        let pad = if x_min == 0.0 { 1.0 } else { x_min.abs() * 0.05 };
        x_min -= pad;
        x_max += pad;
    }
    let mut low = y_min.log10().floor();
    let mut high = y_max.log10().ceil();
    if low == high {
        low -= 1.0;
        high += 1.0;
    }
    Some(PlotBounds {
        x_min,
        x_max,
        y_min: 10f64.powi(low as i32).max(f64::MIN_POSITIVE),
        y_max: 10f64.powi(high as i32).min(f64::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_gap() -> TimeSeriesStore {
        let mut store = TimeSeriesStore::new();
        store.record_time(1.0);
        store.record_residual("p", 0.1);
        store.record_residual("U", 0.5);
        store.record_time(2.0);
        store.record_residual("U", 0.4);
        store.record_time(3.0);
        store.record_residual("p", 0.01);
        store
    }

    #[test]
    fn gap_splits_line_into_segments() {
        let model = PlotModel::build(&store_with_gap(), &PlotView::default());
        let p = model.lines.iter().find(|l| l.name == "p").expect("p line");
        assert_eq!(p.segments, vec![vec![(1.0, 0.1)], vec![(3.0, 0.01)]]);
        assert!(p.points().all(|(x, _)| x != 2.0));
    }

    #[test]
    fn hidden_variable_keeps_legend_entry_without_line() {
        let mut view = PlotView::default();
        view.hidden.insert("U".to_string());
        let model = PlotModel::build(&store_with_gap(), &view);
        assert_eq!(model.lines.len(), 1);
        assert_eq!(model.legend.len(), 2);
        assert!(!model.legend.iter().find(|e| e.name == "U").expect("U").visible);
    }

    #[test]
    fn subnormal_residual_keeps_lower_bound_positive() {
        let mut store = TimeSeriesStore::new();
        store.record_time(1.0);
        store.record_residual("p", 1e-320);
        store.record_time(2.0);
        store.record_residual("p", 1e-3);
        let bounds = PlotModel::build(&store, &PlotView::default())
            .bounds
            .expect("bounds");
        assert_eq!(bounds.y_min, f64::MIN_POSITIVE);
        assert!(bounds.y_max.is_finite());
    }

    #[test]
    fn bounds_are_whole_decades() {
        let model = PlotModel::build(&store_with_gap(), &PlotView::default());
        let bounds = model.bounds.expect("bounds");
        assert!((bounds.y_min - 0.01).abs() < 1e-12);
        assert!((bounds.y_max - 1.0).abs() < 1e-12);
        assert_eq!((bounds.x_min, bounds.x_max), (1.0, 3.0));
    }

    #[test]
    fn non_positive_samples_are_not_drawn() {
        let mut store = TimeSeriesStore::new();
        store.record_time(1.0);
        store.record_residual("p", 0.0);
        store.record_time(2.0);
        store.record_residual("p", 1e-3);
        let model = PlotModel::build(&store, &PlotView::default());
        assert_eq!(model.lines[0].segments, vec![vec![(2.0, 1e-3)]]);
    }

    #[test]
    fn iteration_axis_uses_positions() {
        let view = PlotView {
            axis: XAxis::Iteration,
            ..PlotView::default()
        };
        let model = PlotModel::build(&store_with_gap(), &view);
        let u = model.lines.iter().find(|l| l.name == "U").expect("U line");
        assert_eq!(u.segments, vec![vec![(1.0, 0.5), (2.0, 0.4)]]);
        assert_eq!(model.x_label, "Iteration");
    }

    #[test]
    fn empty_store_has_no_bounds() {
        let model = PlotModel::build(&TimeSeriesStore::new(), &PlotView::default());
        assert!(model.is_empty());
        assert!(model.bounds.is_none());
    }
}
