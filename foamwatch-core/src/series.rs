use crate::palette::{palette_color, Rgb};
use crate::patterns::SolverPerformance;
use std::collections::{HashMap, VecDeque};

pub const PROFILING_CAPACITY: usize = 10_000;

/// Samples of one variable, positionally aligned with the store's time points.
/// `None` marks a time point without a sample for this variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    color: Rgb,
    samples: Vec<Option<f64>>,
}

impl Series {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn samples(&self) -> &[Option<f64>] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_some()).count()
    }

    pub fn has_data(&self) -> bool {
        self.samples.iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfilingEntry {
    Solver {
        time_index: Option<usize>,
        performance: SolverPerformance,
    },
    Clock(String),
}

/// Run state: time points, per-variable aligned samples, colour assignments
/// and the auxiliary values shown in the status line.
///
/// Every series and the diagnostic series always have exactly `times().len()`
/// entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesStore {
    times: Vec<f64>,
    time_label: Option<String>,
    delta_t: Option<f64>,
    series: Vec<Series>,
    index: HashMap<String, usize>,
    diagnostic: Vec<Option<f64>>,
    profiling: VecDeque<ProfilingEntry>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a time point unless the last one already equals `value`.
    /// Returns the index of the current time point.
    pub fn record_time(&mut self, value: f64) -> usize {
        if let Some(last) = self.times.last() {
            if *last == value {
                return self.times.len() - 1;
            }
        }
        self.times.push(value);
        let len = self.times.len();
        for series in &mut self.series {
            series.samples.resize(len, None);
        }
        self.diagnostic.resize(len, None);
        len - 1
    }

    pub fn set_time_label(&mut self, label: impl Into<String>) {
        self.time_label = Some(label.into());
    }

    pub fn set_delta_t(&mut self, delta_t: f64) {
        self.delta_t = Some(delta_t);
    }

    /// Stores `value` for `variable` at the current time point.
    ///
    /// Unknown variables are created, padded with absent markers and given the
    /// next palette colour. Returns `false` when nothing was stored: there is
    /// no time point yet, or the variable already has a sample at this one.
    pub fn record_residual(&mut self, variable: &str, value: f64) -> bool {
        let Some(current) = self.current_index() else {
            return false;
        };
        let len = self.times.len();
        let idx = match self.index.get(variable) {
            Some(idx) => *idx,
            None => {
                let idx = self.series.len();
                self.series.push(Series {
                    name: variable.to_string(),
                    color: palette_color(idx),
                    samples: vec![None; len],
                });
                self.index.insert(variable.to_string(), idx);
                idx
            }
        };
        let series = &mut self.series[idx];
        if series.samples.len() < len {
            series.samples.resize(len, None);
        }
        match series.samples[current] {
            Some(_) => false,
            None => {
                series.samples[current] = Some(value);
                true
            }
        }
    }

    /// Latest diagnostic value at the current time point wins.
    pub fn record_diagnostic(&mut self, value: f64) -> bool {
        let Some(current) = self.current_index() else {
            return false;
        };
        self.diagnostic[current] = Some(value);
        true
    }

    pub fn push_profiling(&mut self, entry: ProfilingEntry) {
        if self.profiling.len() == PROFILING_CAPACITY {
            self.profiling.pop_front();
        }
        self.profiling.push_back(entry);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current_index(&self) -> Option<usize> {
        self.times.len().checked_sub(1)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn time_label(&self) -> Option<&str> {
        self.time_label.as_deref()
    }

    pub fn delta_t(&self) -> Option<f64> {
        self.delta_t
    }

    /// Series in discovery order.
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn get(&self, variable: &str) -> Option<&Series> {
        self.index.get(variable).map(|idx| &self.series[*idx])
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(Series::name)
    }

    pub fn diagnostic(&self) -> &[Option<f64>] {
        &self.diagnostic
    }

    pub fn profiling(&self) -> impl Iterator<Item = &ProfilingEntry> {
        self.profiling.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty() && self.series.is_empty() && self.profiling.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        let len = self.times.len();
        self.diagnostic.len() == len && self.series.iter().all(|s| s.samples.len() == len)
    }
}
