use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod settings;
pub use settings::{
    normalize_case_settings, parse_variable_list, MAX_REFRESH_INTERVAL_MS,
    MIN_REFRESH_INTERVAL_MS,
};

pub const DEFAULT_LOG_FILE: &str = "log.foamRun";
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1000;

/// Settings for monitoring one simulation case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseSettings {
    pub case_dir: PathBuf,
    pub log_file: String,
    pub refresh_interval_ms: u64,
    pub x_axis: XAxis,
    /// Variables to plot and export. Empty means every variable found in the log.
    pub tracked_variables: Vec<String>,
    pub show_diagnostic: bool,
    pub plot: PlotSettings,
    pub command: Option<SimulationCommand>,
}

impl Default for CaseSettings {
    fn default() -> Self {
        Self {
            case_dir: PathBuf::from("."),
            log_file: DEFAULT_LOG_FILE.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            x_axis: XAxis::Time,
            tracked_variables: Vec::new(),
            show_diagnostic: false,
            plot: PlotSettings::default(),
            command: None,
        }
    }
}

/// Quantity used for the horizontal plot axis and the first export column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XAxis {
    #[default]
    Time,
    Iteration,
}

impl XAxis {
    pub fn label(self) -> &'static str {
        match self {
            XAxis::Time => "Time",
            XAxis::Iteration => "Iteration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub dark_theme: bool,
    pub show_legend: bool,
    pub show_grid: bool,
    pub line_width: u32,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            title: "Residuals".to_string(),
            width: 1200,
            height: 700,
            dark_theme: false,
            show_legend: true,
            show_grid: true,
            line_width: 1,
        }
    }
}

/// External solver invocation. Runs inside `case_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Copy the solver's stdout into the tracked log file.
    #[serde(default)]
    pub tee_log: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum CaseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl CaseSettings {
    pub fn for_log(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let case_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let log_file = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
        Self {
            case_dir,
            log_file,
            ..Self::default()
        }
    }

    /// Path of the tracked log. An absolute `log_file` is used as is.
    pub fn log_path(&self) -> PathBuf {
        let log_file = Path::new(&self.log_file);
        if log_file.is_absolute() {
            log_file.to_path_buf()
        } else {
            self.case_dir.join(log_file)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaseError> {
        let data = fs::read(path)?;
        let settings: CaseSettings = serde_json::from_slice(&data)?;
        normalize_case_settings(settings)
    }
}
