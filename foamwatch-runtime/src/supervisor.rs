//! Owns one external solver process and turns its output into events.
//!
//! Output is read on two helper threads (stdout, stderr) that forward lines
//! over an mpsc channel; the owner drains it with [`ProcessSupervisor::poll_events`]
//! and never blocks on the child.

use foamwatch_case::{CaseSettings, SimulationCommand};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Time allowed for late output after the child has exited, for the case
/// where a grandchild keeps the pipes open.
const EXIT_DRAIN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Append every stdout line to this file before it is reported.
    pub tee_log: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            tee_log: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn tee_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.tee_log = Some(path.into());
        self
    }

    /// Runs `command` inside the case directory, teeing into the case log
    /// when requested.
    pub fn from_case(command: &SimulationCommand, settings: &CaseSettings) -> Self {
        let spec = Self::new(command.program.clone())
            .args(command.args.iter().cloned())
            .current_dir(settings.case_dir.clone());
        if command.tee_log {
            spec.tee_log(settings.log_path())
        } else {
            spec
        }
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    /// Error output. Shown to the user, never parsed.
    Stderr(String),
    /// Exit code, `None` when the process was ended by a signal.
    Exited(Option<i32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Running,
    Paused,
    Stopping,
    Exited(Option<i32>),
}

#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open log {path}: {source}")]
    TeeLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a process is already running")]
    AlreadyRunning,
    #[error("no process is running")]
    NotRunning,
    #[error("signal delivery failed: {0}")]
    Signal(std::io::Error),
    #[error("not supported on this platform")]
    Unsupported,
}

enum StreamMessage {
    Event(ProcessEvent),
    Closed,
}

pub struct ProcessSupervisor {
    child: Option<Child>,
    rx: Option<Receiver<StreamMessage>>,
    open_streams: usize,
    state: ProcessState,
    grace: Duration,
    kill_deadline: Option<Instant>,
    exited_at: Option<Instant>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_STOP_GRACE)
    }

    /// `grace` is how long `stop` waits after SIGTERM before SIGKILL.
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            child: None,
            rx: None,
            open_streams: 0,
            state: ProcessState::Idle,
            grace,
            kill_deadline: None,
            exited_at: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Running, paused or stopping.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            ProcessState::Running | ProcessState::Paused | ProcessState::Stopping
        )
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Spawns the process in its own process group. Returns its pid.
    pub fn start(&mut self, spec: &LaunchSpec) -> Result<u32, SupervisorError> {
        if self.is_active() {
            return Err(SupervisorError::AlreadyRunning);
        }
        let tee = match &spec.tee_log {
            Some(path) => Some(open_tee(path)?),
            None => None,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setpgid(0, 0) == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel();
        let mut open_streams = 0;
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone(), ProcessEvent::Stdout, tee);
            open_streams += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx, ProcessEvent::Stderr, None);
            open_streams += 1;
        }

        let pid = child.id();
        log::info!("started '{}' (pid {})", spec.display(), pid);
        self.child = Some(child);
        self.rx = Some(rx);
        self.open_streams = open_streams;
        self.state = ProcessState::Running;
        self.kill_deadline = None;
        self.exited_at = None;
        Ok(pid)
    }

    /// Drains pending output without blocking. The exit event comes last,
    /// after every line the process wrote.
    pub fn poll_events(&mut self) -> Vec<ProcessEvent> {
        let mut events = Vec::new();
        if let Some(rx) = &self.rx {
            loop {
                match rx.try_recv() {
                    Ok(StreamMessage::Event(event)) => events.push(event),
                    Ok(StreamMessage::Closed) => {
                        self.open_streams = self.open_streams.saturating_sub(1);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.open_streams = 0;
                        break;
                    }
                }
            }
        }

        self.escalate_stop();

        if let Some(code) = self.reap() {
            events.push(ProcessEvent::Exited(code));
        }
        events
    }

    pub fn pause(&mut self) -> Result<(), SupervisorError> {
        if self.state != ProcessState::Running {
            return Err(SupervisorError::NotRunning);
        }
        self.signal(Signal::Stop)?;
        self.state = ProcessState::Paused;
        log::info!("process paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SupervisorError> {
        if self.state != ProcessState::Paused {
            return Err(SupervisorError::NotRunning);
        }
        self.signal(Signal::Continue)?;
        self.state = ProcessState::Running;
        log::info!("process resumed");
        Ok(())
    }

    /// Asks the process group to terminate. Escalates to a kill once the
    /// grace period has passed; see [`ProcessSupervisor::poll_events`].
    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        match self.state {
            ProcessState::Stopping => Ok(()),
            ProcessState::Running | ProcessState::Paused => {
                self.signal(Signal::Terminate)?;
                if self.state == ProcessState::Paused {
                    self.signal(Signal::Continue)?;
                }
                self.state = ProcessState::Stopping;
                self.kill_deadline = Some(Instant::now() + self.grace);
                log::info!("stopping process");
                Ok(())
            }
            ProcessState::Idle | ProcessState::Exited(_) => Err(SupervisorError::NotRunning),
        }
    }

    fn escalate_stop(&mut self) {
        let Some(deadline) = self.kill_deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        self.kill_deadline = None;
        log::warn!("process ignored termination, killing it");
        if let Err(err) = self.signal(Signal::Kill) {
            log::warn!("{}", err);
        }
    }

    fn reap(&mut self) -> Option<Option<i32>> {
        let child = self.child.as_mut()?;
        if self.exited_at.is_none() {
            match child.try_wait() {
                Ok(Some(_)) => self.exited_at = Some(Instant::now()),
                Ok(None) => return None,
                Err(err) => {
                    log::warn!("cannot query process status: {}", err);
                    return None;
                }
            }
        }
        let drained = self
            .exited_at
            .map_or(false, |at| at.elapsed() >= EXIT_DRAIN);
        if self.open_streams > 0 && !drained {
            return None;
        }
        let code = child.try_wait().ok().flatten().and_then(|status| status.code());
        self.child = None;
        self.rx = None;
        self.kill_deadline = None;
        self.state = ProcessState::Exited(code);
        log::info!("process exited with {:?}", code);
        Some(code)
    }

    #[cfg(unix)]
    fn signal(&self, signal: Signal) -> Result<(), SupervisorError> {
        let pid = self.pid().ok_or(SupervisorError::NotRunning)?;
        let signo = match signal {
            Signal::Stop => libc::SIGSTOP,
            Signal::Continue => libc::SIGCONT,
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        // Negative pid: the whole process group.
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), signo) };
        if rc == -1 {
            return Err(SupervisorError::Signal(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn signal(&mut self, signal: Signal) -> Result<(), SupervisorError> {
        match signal {
            Signal::Terminate | Signal::Kill => {
                let child = self.child.as_mut().ok_or(SupervisorError::NotRunning)?;
                child.kill().map_err(SupervisorError::Signal)
            }
            Signal::Stop | Signal::Continue => Err(SupervisorError::Unsupported),
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.is_active() {
            let _ = self.signal(Signal::Kill);
            if let Some(child) = self.child.as_mut() {
                let _ = child.wait();
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Stop,
    Continue,
    Terminate,
    Kill,
}

fn open_tee(path: &Path) -> Result<File, SupervisorError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| SupervisorError::TeeLog {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    File::create(path).map_err(|source| SupervisorError::TeeLog {
        path: path.to_path_buf(),
        source,
    })
}

fn spawn_reader<R>(
    stream: R,
    tx: Sender<StreamMessage>,
    wrap: fn(String) -> ProcessEvent,
    mut tee: Option<File>,
) where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    let tee_failed = match tee.as_mut() {
                        Some(file) => writeln!(file, "{line}").and_then(|_| file.flush()).err(),
                        None => None,
                    };
                    if let Some(err) = tee_failed {
                        log::warn!("writing log copy failed: {}", err);
                        tee = None;
                    }
                    if tx.send(StreamMessage::Event(wrap(line))).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    log::warn!("reading process output failed: {}", err);
                    break;
                }
            }
        }
        let _ = tx.send(StreamMessage::Closed);
    });
}
