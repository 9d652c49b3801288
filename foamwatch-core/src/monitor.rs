//! The control surface a shell drives: tracked path, plotting on/off,
//! clear, export and legend toggles.

use crate::export::{export_csv_file, ExportError, VariableFilter};
use crate::ingest::{LogFingerprint, LogIngestor, ScanOutcome};
use crate::plot::{PlotModel, PlotView, PlottersRenderer, RenderError, ResidualRenderer};
use crate::scheduler::RefreshScheduler;
use crate::series::TimeSeriesStore;
use foamwatch_case::{CaseSettings, PlotSettings, XAxis};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct ResidualMonitor {
    store: TimeSeriesStore,
    ingestor: LogIngestor,
    scheduler: RefreshScheduler,
    view: PlotView,
    redraw_pending: bool,
    /// Tracked file as it was before the current run; not rescanned until
    /// it changes.
    stale_log: Option<LogFingerprint>,
}

impl ResidualMonitor {
    pub fn new(settings: &CaseSettings) -> Self {
        let view = PlotView {
            title: settings.plot.title.clone(),
            axis: settings.x_axis,
            filter: VariableFilter::from_list(&settings.tracked_variables),
            hidden: Default::default(),
            show_diagnostic: settings.show_diagnostic,
        };
        Self {
            store: TimeSeriesStore::new(),
            ingestor: LogIngestor::new(Some(settings.log_path())),
            scheduler: RefreshScheduler::from_millis(settings.refresh_interval_ms),
            view,
            redraw_pending: false,
            stale_log: None,
        }
    }

    /// Monitor for a bare log path with default settings.
    pub fn for_log(path: impl Into<PathBuf>) -> Self {
        Self::new(&CaseSettings::for_log(path))
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.ingestor.path()
    }

    /// Switches the tracked log: stop, reset, set path, then restart if
    /// plotting was active.
    pub fn set_log_path(&mut self, path: impl Into<PathBuf>, now: Instant) {
        let path = path.into();
        let was_running = self.scheduler.stop();
        self.reset_state();
        log::info!("tracking log {}", path.display());
        self.ingestor.set_path(Some(path));
        self.stale_log = None;
        if was_running {
            self.scheduler.start(now);
        }
    }

    /// Drops all run state and halts refreshing.
    pub fn clear(&mut self) {
        if self.scheduler.stop() {
            log::info!("plotting stopped");
        }
        self.reset_state();
    }

    fn reset_state(&mut self) {
        self.store.reset();
        self.view.hidden.clear();
        self.redraw_pending = true;
    }

    pub fn start_plotting(&mut self, now: Instant) -> bool {
        let started = self.scheduler.start(now);
        if started {
            log::info!(
                "plotting started, refresh every {} ms",
                self.scheduler.interval().as_millis()
            );
        }
        started
    }

    /// Stops refreshing. Ingested data is kept.
    pub fn stop_plotting(&mut self) -> bool {
        let stopped = self.scheduler.stop();
        if stopped {
            log::info!("plotting stopped");
        }
        stopped
    }

    pub fn is_plotting(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Streaming entry point for one fresh output line.
    pub fn ingest_line(&mut self, line: &str) -> bool {
        let changed = self.ingestor.ingest_line(&mut self.store, line);
        self.redraw_pending |= changed;
        changed
    }

    /// Treats the tracked file's current content as left over from an
    /// earlier run. Rescans skip it until the file is modified, so output
    /// streamed from a run that does not write the log is kept.
    pub fn ignore_existing_log(&mut self) {
        self.stale_log = self.ingestor.fingerprint();
        if let (Some(_), Some(path)) = (self.stale_log, self.ingestor.path()) {
            log::info!("ignoring existing content of {} until it changes", path.display());
        }
    }

    fn log_is_stale(&mut self) -> bool {
        match self.stale_log {
            Some(before) if self.ingestor.fingerprint() == Some(before) => true,
            Some(_) => {
                self.stale_log = None;
                false
            }
            None => false,
        }
    }

    /// Rebuilds the store from the tracked file. A missing file contributes
    /// no data and leaves the current state alone; an unreadable one is
    /// reported and also leaves it alone.
    pub fn rescan(&mut self) -> bool {
        if self.log_is_stale() {
            return false;
        }
        let outcome = self.ingestor.rescan();
        self.apply_scan(outcome)
    }

    /// Like [`Self::rescan`], for a log that is complete: an unterminated
    /// last line is parsed too.
    pub fn rescan_finished(&mut self) -> bool {
        if self.log_is_stale() {
            return false;
        }
        let outcome = self.ingestor.rescan_finished();
        self.apply_scan(outcome)
    }

    fn apply_scan(&mut self, outcome: ScanOutcome) -> bool {
        match outcome {
            ScanOutcome::Scanned { store, .. } => {
                self.store = store;
                self.redraw_pending = true;
                true
            }
            ScanOutcome::Missing => false,
            ScanOutcome::Unreadable(err) => {
                if let Some(path) = self.ingestor.path() {
                    log::warn!("cannot read {}: {}", path.display(), err);
                }
                false
            }
        }
    }

    /// One turn of the owner's loop. Returns whether `renderer` was called.
    pub fn tick(&mut self, now: Instant, renderer: &mut dyn ResidualRenderer) -> bool {
        if self.scheduler.poll(now) {
            self.rescan();
            self.redraw(renderer);
            true
        } else if self.redraw_pending {
            self.redraw(renderer);
            true
        } else {
            false
        }
    }

    pub fn redraw(&mut self, renderer: &mut dyn ResidualRenderer) {
        self.redraw_pending = false;
        match renderer.render(&self.plot_model()) {
            Ok(()) | Err(RenderError::NoData) => {}
            Err(err) => log::warn!("redraw failed: {}", err),
        }
    }

    pub fn redraw_pending(&self) -> bool {
        self.redraw_pending
    }

    /// Current chart, titled with the run status.
    pub fn plot_model(&self) -> PlotModel {
        let mut model = PlotModel::build(&self.store, &self.view);
        let status = self.status_line();
        model.title = if self.view.title.is_empty() {
            status
        } else {
            format!("{} ({})", self.view.title, status)
        };
        model
    }

    pub fn status_line(&self) -> String {
        let delta_t = self
            .store
            .delta_t()
            .map_or_else(|| "--".to_string(), |dt| dt.to_string());
        let time = self.store.time_label().unwrap_or("--");
        format!("deltaT: {delta_t} | Time: {time}")
    }

    /// Flips the visibility of a tracked variable and returns the new flag.
    pub fn toggle_variable_visibility(&mut self, name: &str) -> Option<bool> {
        self.store.get(name)?;
        let visible = if self.view.hidden.remove(name) {
            true
        } else {
            self.view.hidden.insert(name.to_string());
            false
        };
        self.redraw_pending = true;
        Some(visible)
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.view.is_visible(name)
    }

    /// Writes the CSV table. Failures are logged and reported as `false`.
    pub fn export(&self, path: &Path) -> bool {
        match self.try_export(path) {
            Ok(()) => {
                log::info!("exported residuals to {}", path.display());
                true
            }
            Err(err) => {
                log::warn!("export to {} failed: {}", path.display(), err);
                false
            }
        }
    }

    pub fn try_export(&self, path: &Path) -> Result<(), ExportError> {
        let table = self.store.export_table(&self.view.filter, self.view.axis);
        export_csv_file(&table, path)
    }

    /// Renders the current chart to a PNG or SVG file.
    pub fn export_plot(&self, path: &Path, settings: &PlotSettings) -> bool {
        match self.try_export_plot(path, settings) {
            Ok(()) => {
                log::info!("saved plot to {}", path.display());
                true
            }
            Err(err) => {
                log::warn!("saving plot to {} failed: {}", path.display(), err);
                false
            }
        }
    }

    pub fn try_export_plot(&self, path: &Path, settings: &PlotSettings) -> Result<(), ExportError> {
        let mut renderer = PlottersRenderer::new(path, settings.clone());
        renderer.render(&self.plot_model()).map_err(|err| match err {
            RenderError::NoData => ExportError::NoData,
            RenderError::Backend(message) => ExportError::Render(message),
        })
    }

    pub fn set_axis(&mut self, axis: XAxis) {
        self.view.axis = axis;
        self.redraw_pending = true;
    }

    pub fn set_filter(&mut self, filter: VariableFilter) {
        self.view.filter = filter;
        self.redraw_pending = true;
    }

    pub fn set_show_diagnostic(&mut self, show: bool) {
        self.view.show_diagnostic = show;
        self.redraw_pending = true;
    }

    pub fn set_refresh_interval(&mut self, interval: Duration) {
        self.scheduler.set_interval(interval);
    }

    pub fn view(&self) -> &PlotView {
        &self.view
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }
}
