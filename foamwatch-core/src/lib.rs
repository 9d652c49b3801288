pub mod export;
pub mod ingest;
pub mod monitor;
pub mod palette;
pub mod patterns;
pub mod plot;
pub mod scheduler;
pub mod series;

pub use export::{export_csv_file, write_csv, ExportError, ExportTable, VariableFilter};
pub use ingest::{
    apply_line, replay_finished_text, replay_text, LogFingerprint, LogIngestor, ScanOutcome,
};
pub use monitor::ResidualMonitor;
pub use palette::{palette_color, Rgb};
pub use patterns::{ParsedLine, PatternRegistry};
pub use plot::{
    ImageFormat, LegendEntry, LineStyle, PlotLine, PlotModel, PlotView, PlottersRenderer,
    RenderError, ResidualRenderer,
};
pub use scheduler::{RefreshScheduler, SchedulerState};
pub use series::{ProfilingEntry, Series, TimeSeriesStore};
