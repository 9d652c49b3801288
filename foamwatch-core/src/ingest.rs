use crate::patterns::{ParsedLine, PatternRegistry};
use crate::series::{ProfilingEntry, TimeSeriesStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Result of one full rescan.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Freshly built store from the complete lines of the file.
    Scanned {
        store: TimeSeriesStore,
        lines: usize,
        matched: usize,
        /// A trailing line without newline was left for the next scan.
        deferred_tail: bool,
    },
    /// The file does not exist (yet). Equivalent to an empty log.
    Missing,
    /// The file exists but could not be read. The caller keeps its state.
    Unreadable(std::io::Error),
}

pub struct LogIngestor {
    path: Option<PathBuf>,
    registry: PatternRegistry,
}

impl LogIngestor {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            registry: PatternRegistry::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Changes the tracked file. The owner must reset its store before the
    /// next scan.
    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Streaming mode: applies one freshly produced output line to `store`.
    /// Returns whether the line changed anything.
    pub fn ingest_line(&self, store: &mut TimeSeriesStore, line: &str) -> bool {
        apply_line(&self.registry, store, line)
    }

    /// Full rescan of the tracked file into a new store. A trailing line
    /// without newline is left for a later scan.
    pub fn rescan(&self) -> ScanOutcome {
        self.scan(TailMode::Defer)
    }

    /// Full rescan of a log nobody writes to any more: the trailing line is
    /// parsed even without a newline.
    pub fn rescan_finished(&self) -> ScanOutcome {
        self.scan(TailMode::Flush)
    }

    /// Size and modification time of the tracked file, if it exists.
    pub fn fingerprint(&self) -> Option<LogFingerprint> {
        let metadata = std::fs::metadata(self.path.as_deref()?).ok()?;
        Some(LogFingerprint {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    fn scan(&self, tail: TailMode) -> ScanOutcome {
        let Some(path) = self.path.as_deref() else {
            return ScanOutcome::Missing;
        };
        match std::fs::read(path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let (store, report) = replay(&self.registry, &text, tail);
                log::debug!(
                    "rescanned {}: {} lines, {} matched, {} time points, {} variables",
                    path.display(),
                    report.lines,
                    report.matched,
                    store.times().len(),
                    store.series().len()
                );
                ScanOutcome::Scanned {
                    store,
                    lines: report.lines,
                    matched: report.matched,
                    deferred_tail: report.deferred_tail,
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => ScanOutcome::Missing,
            Err(err) => ScanOutcome::Unreadable(err),
        }
    }
}

/// Identifies one state of a log file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFingerprint {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailMode {
    Defer,
    Flush,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub lines: usize,
    pub matched: usize,
    pub deferred_tail: bool,
}

/// Replays the complete lines of `text` into a fresh store, in order.
/// A last line without a terminating newline is still being written and is
/// not parsed.
pub fn replay_text(registry: &PatternRegistry, text: &str) -> (TimeSeriesStore, ReplayReport) {
    replay(registry, text, TailMode::Defer)
}

/// Replays every line of a finished log, including an unterminated last one.
pub fn replay_finished_text(
    registry: &PatternRegistry,
    text: &str,
) -> (TimeSeriesStore, ReplayReport) {
    replay(registry, text, TailMode::Flush)
}

fn replay(registry: &PatternRegistry, text: &str, tail: TailMode) -> (TimeSeriesStore, ReplayReport) {
    let mut store = TimeSeriesStore::new();
    let mut report = ReplayReport::default();
    let complete = match (tail, text.rfind('\n')) {
        (TailMode::Flush, _) => text,
        (TailMode::Defer, Some(end)) => {
            report.deferred_tail = end + 1 < text.len();
            &text[..end + 1]
        }
        (TailMode::Defer, None) => {
            report.deferred_tail = !text.is_empty();
            ""
        }
    };
    for line in complete.lines() {
        report.lines += 1;
        if apply_line(registry, &mut store, line) {
            report.matched += 1;
        }
    }
    (store, report)
}

/// Applies one line's effect. Shared by streaming and rescan so both modes
/// produce identical state.
pub fn apply_line(registry: &PatternRegistry, store: &mut TimeSeriesStore, line: &str) -> bool {
    let line = line.trim_end_matches(['\r', '\n']);
    let parsed = registry.parse_line(line);
    if parsed.is_empty() {
        return false;
    }
    apply_parsed(store, parsed, line)
}

fn apply_parsed(store: &mut TimeSeriesStore, parsed: ParsedLine, line: &str) -> bool {
    let mut changed = false;
    if parsed.clock {
        store.push_profiling(ProfilingEntry::Clock(line.trim().to_string()));
        changed = true;
    }
    if let Some(delta_t) = parsed.delta_t {
        store.set_delta_t(delta_t);
        changed = true;
    }
    if let Some(marker) = parsed.time {
        store.record_time(marker.value);
        store.set_time_label(marker.label);
        changed = true;
    }
    if let Some(residual) = parsed.residual {
        if let Some(marker) = residual.time {
            store.record_time(marker.value);
            store.set_time_label(marker.label);
            changed = true;
        }
        changed |= store.record_residual(&residual.variable, residual.initial);
    }
    if let Some(performance) = parsed.performance {
        store.push_profiling(ProfilingEntry::Solver {
            time_index: store.current_index(),
            performance,
        });
        changed = true;
    }
    if let Some(value) = parsed.diagnostic {
        changed |= store.record_diagnostic(value);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_last_line_is_deferred() {
        let registry = PatternRegistry::new();
        let text = "Time = 0.1\nGAMG:  Solving for p, Initial residual = 0.5, Final residual = 1e-6, No Iterations 2\nTime = 0.";
        let (store, report) = replay_text(&registry, text);
        assert!(report.deferred_tail);
        assert_eq!(report.lines, 2);
        assert_eq!(store.times(), &[0.1]);
    }

    #[test]
    fn text_without_newline_is_entirely_deferred() {
        let registry = PatternRegistry::new();
        let (store, report) = replay_text(&registry, "Time = 0.1");
        assert!(report.deferred_tail);
        assert!(store.times().is_empty());
    }

    #[test]
    fn finished_text_keeps_unterminated_last_line() {
        let registry = PatternRegistry::new();
        let text = "Time = 1\nSolving for p, Initial residual = 0.1";
        let (store, report) = replay_finished_text(&registry, text);
        assert!(!report.deferred_tail);
        assert_eq!(report.lines, 2);
        assert_eq!(store.get("p").expect("p").samples(), &[Some(0.1)]);
    }

    #[test]
    fn finished_rescan_reads_the_whole_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.foamRun");
        std::fs::write(&path, "Time = 1\nSolving for p, Initial residual = 0.1").expect("write");
        let ingestor = LogIngestor::new(Some(path));

        match ingestor.rescan() {
            ScanOutcome::Scanned { store, deferred_tail, .. } => {
                assert!(deferred_tail);
                assert!(store.get("p").is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match ingestor.rescan_finished() {
            ScanOutcome::Scanned { store, deferred_tail, .. } => {
                assert!(!deferred_tail);
                assert_eq!(store.get("p").expect("p").samples(), &[Some(0.1)]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn fingerprint_changes_when_the_file_grows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.foamRun");
        let ingestor = LogIngestor::new(Some(path.clone()));
        assert!(ingestor.fingerprint().is_none());
        std::fs::write(&path, "Time = 1\n").expect("write");
        let before = ingestor.fingerprint().expect("fingerprint");
        std::fs::write(&path, "Time = 1\nTime = 2\n").expect("write");
        assert_ne!(ingestor.fingerprint(), Some(before));
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let registry = PatternRegistry::new();
        let (store, _) = replay_text(&registry, "Time = 2s\r\nTime = 3s\r\n");
        assert_eq!(store.times(), &[2.0, 3.0]);
        assert_eq!(store.time_label(), Some("3s"));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let ingestor = LogIngestor::new(Some(PathBuf::from("/nonexistent/foamwatch/log.foamRun")));
        assert!(matches!(ingestor.rescan(), ScanOutcome::Missing));
        assert!(matches!(LogIngestor::new(None).rescan(), ScanOutcome::Missing));
    }

    #[test]
    fn solver_performance_goes_to_profiling_only() {
        let registry = PatternRegistry::new();
        let mut store = TimeSeriesStore::new();
        apply_line(&registry, &mut store, "Time = 1");
        apply_line(
            &registry,
            &mut store,
            "GAMG:  Solving for p, Initial residual = 0.5, Final residual = 1e-6, No Iterations 7",
        );
        apply_line(&registry, &mut store, "ExecutionTime = 0.5 s  ClockTime = 1 s");

        let entries: Vec<_> = store.profiling().collect();
        assert_eq!(entries.len(), 2);
        match entries[0] {
            ProfilingEntry::Solver {
                time_index,
                performance,
            } => {
                assert_eq!(*time_index, Some(0));
                assert_eq!(performance.iterations, 7);
            }
            other => panic!("unexpected entry {other:?}"),
        }
        assert_eq!(store.series().len(), 1);
    }
}
