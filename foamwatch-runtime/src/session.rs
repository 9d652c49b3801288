use crate::supervisor::{LaunchSpec, ProcessEvent, ProcessSupervisor, SupervisorError};
use foamwatch_case::CaseSettings;
use foamwatch_core::{ResidualMonitor, ResidualRenderer};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const TERMINAL_CAPACITY: usize = 5_000;

/// What one [`Session::turn`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub lines: usize,
    pub rendered: bool,
    pub exited: Option<Option<i32>>,
}

/// Supervisor and monitor driven from one cooperative loop.
pub struct Session {
    monitor: ResidualMonitor,
    supervisor: ProcessSupervisor,
    terminal: VecDeque<String>,
    last_exit: Option<Option<i32>>,
}

impl Session {
    pub fn new(settings: &CaseSettings) -> Self {
        Self::with_parts(ResidualMonitor::new(settings), ProcessSupervisor::new())
    }

    pub fn with_parts(monitor: ResidualMonitor, supervisor: ProcessSupervisor) -> Self {
        Self {
            monitor,
            supervisor,
            terminal: VecDeque::new(),
            last_exit: None,
        }
    }

    /// Starts a run: stop plotting, reset, track `log_path`, spawn, then
    /// plot again. Without a tee the file at `log_path` may belong to an
    /// earlier run and is ignored until something writes to it.
    pub fn launch(
        &mut self,
        spec: &LaunchSpec,
        log_path: impl Into<PathBuf>,
        now: Instant,
    ) -> Result<u32, SupervisorError> {
        if self.supervisor.is_active() {
            return Err(SupervisorError::AlreadyRunning);
        }
        self.monitor.clear();
        self.monitor.set_log_path(log_path, now);
        if spec.tee_log.is_none() {
            self.monitor.ignore_existing_log();
        }
        self.terminal.clear();
        self.last_exit = None;
        let pid = self.supervisor.start(spec)?;
        self.monitor.start_plotting(now);
        Ok(pid)
    }

    /// Drains process output into the monitor, then lets the monitor tick.
    pub fn turn(&mut self, now: Instant, renderer: &mut dyn ResidualRenderer) -> TurnReport {
        let mut report = TurnReport::default();
        for event in self.supervisor.poll_events() {
            match event {
                ProcessEvent::Stdout(line) => {
                    self.monitor.ingest_line(&line);
                    self.push_terminal(line);
                    report.lines += 1;
                }
                ProcessEvent::Stderr(line) => {
                    self.push_terminal(format!("Error: {line}"));
                    report.lines += 1;
                }
                ProcessEvent::Exited(code) => {
                    self.monitor.stop_plotting();
                    self.monitor.rescan_finished();
                    self.monitor.redraw(renderer);
                    self.push_terminal(match code {
                        Some(code) => format!("process exited with code {code}"),
                        None => "process terminated by signal".to_string(),
                    });
                    self.last_exit = Some(code);
                    report.exited = Some(code);
                    report.rendered = true;
                }
            }
        }
        if report.exited.is_none() {
            report.rendered = self.monitor.tick(now, renderer);
        }
        report
    }

    /// Loops until the supervised process exits. Returns its exit code.
    pub fn run_until_exit(
        &mut self,
        renderer: &mut dyn ResidualRenderer,
        poll_interval: Duration,
    ) -> Option<i32> {
        loop {
            let report = self.turn(Instant::now(), renderer);
            if let Some(code) = report.exited {
                return code;
            }
            if !self.supervisor.is_active() {
                return self.last_exit.flatten();
            }
            std::thread::sleep(self.idle_time(poll_interval));
        }
    }

    /// Follows the tracked log without a process for `duration`.
    pub fn watch_for(&mut self, renderer: &mut dyn ResidualRenderer, duration: Duration) {
        let start = Instant::now();
        self.monitor.start_plotting(start);
        while start.elapsed() < duration {
            self.turn(Instant::now(), renderer);
            let left = duration.saturating_sub(start.elapsed());
            std::thread::sleep(self.idle_time(left));
        }
        self.monitor.stop_plotting();
    }

    fn idle_time(&self, cap: Duration) -> Duration {
        self.monitor
            .scheduler()
            .time_until_next(Instant::now())
            .map_or(cap, |next| next.min(cap))
            .max(Duration::from_millis(1))
    }

    fn push_terminal(&mut self, line: String) {
        if self.terminal.len() == TERMINAL_CAPACITY {
            self.terminal.pop_front();
        }
        self.terminal.push_back(line);
    }

    pub fn pause(&mut self) -> Result<(), SupervisorError> {
        self.supervisor.pause()
    }

    pub fn resume(&mut self) -> Result<(), SupervisorError> {
        self.supervisor.resume()
    }

    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        self.supervisor.stop()
    }

    pub fn terminal(&self) -> impl Iterator<Item = &str> {
        self.terminal.iter().map(String::as_str)
    }

    pub fn last_exit(&self) -> Option<Option<i32>> {
        self.last_exit
    }

    pub fn monitor(&self) -> &ResidualMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut ResidualMonitor {
        &mut self.monitor
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }
}
