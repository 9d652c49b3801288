#![cfg(unix)]

use foamwatch_case::CaseSettings;
use foamwatch_core::{PlotModel, RenderError, ResidualMonitor, ResidualRenderer};
use foamwatch_runtime::{
    LaunchSpec, ProcessEvent, ProcessState, ProcessSupervisor, Session, SupervisorError,
};
use std::time::{Duration, Instant};

fn shell(script: &str) -> LaunchSpec {
    LaunchSpec::new("sh").args(["-c", script])
}

fn collect_until_exit(supervisor: &mut ProcessSupervisor) -> Vec<ProcessEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        let batch = supervisor.poll_events();
        let done = batch.iter().any(|e| matches!(e, ProcessEvent::Exited(_)));
        events.extend(batch);
        if done {
            return events;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("process did not exit in time; events so far: {events:?}");
}

struct CountingRenderer {
    renders: usize,
    last: Option<PlotModel>,
}

impl ResidualRenderer for CountingRenderer {
    fn render(&mut self, model: &PlotModel) -> Result<(), RenderError> {
        self.renders += 1;
        self.last = Some(model.clone());
        Ok(())
    }
}

#[test]
fn output_lines_arrive_before_exit() {
    let mut supervisor = ProcessSupervisor::new();
    supervisor
        .start(&shell("echo 'Time = 1'; echo oops 1>&2; echo done; exit 3"))
        .expect("start");
    let events = collect_until_exit(&mut supervisor);

    assert!(events.contains(&ProcessEvent::Stdout("Time = 1".to_string())));
    assert!(events.contains(&ProcessEvent::Stderr("oops".to_string())));
    assert_eq!(events.last(), Some(&ProcessEvent::Exited(Some(3))));
    let stdout: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProcessEvent::Stdout(line) => Some(line.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(stdout, vec!["Time = 1", "done"]);
    assert_eq!(supervisor.state(), ProcessState::Exited(Some(3)));
}

#[test]
fn tee_copies_stdout_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("case").join("log.foamRun");
    let mut supervisor = ProcessSupervisor::new();
    supervisor
        .start(&shell("echo 'Time = 1'; echo hidden 1>&2; echo 'Time = 2'").tee_log(&log))
        .expect("start");
    collect_until_exit(&mut supervisor);
    let text = std::fs::read_to_string(&log).expect("log");
    assert_eq!(text, "Time = 1\nTime = 2\n");
}

#[test]
fn second_start_is_rejected_while_running() {
    let mut supervisor = ProcessSupervisor::new();
    supervisor.start(&shell("sleep 5")).expect("start");
    assert!(matches!(
        supervisor.start(&shell("true")),
        Err(SupervisorError::AlreadyRunning)
    ));
    supervisor.stop().expect("stop");
    let events = collect_until_exit(&mut supervisor);
    assert_eq!(events.last(), Some(&ProcessEvent::Exited(None)));
    assert!(!supervisor.is_active());
}

#[test]
fn paused_process_can_be_resumed_and_stopped() {
    let mut supervisor = ProcessSupervisor::new();
    supervisor.start(&shell("sleep 5")).expect("start");
    supervisor.pause().expect("pause");
    assert_eq!(supervisor.state(), ProcessState::Paused);
    assert!(matches!(supervisor.pause(), Err(SupervisorError::NotRunning)));
    supervisor.resume().expect("resume");
    assert_eq!(supervisor.state(), ProcessState::Running);
    supervisor.pause().expect("pause again");
    supervisor.stop().expect("stop while paused");
    assert_eq!(supervisor.state(), ProcessState::Stopping);
    collect_until_exit(&mut supervisor);
}

#[test]
fn stubborn_process_is_killed_after_grace() {
    let mut supervisor = ProcessSupervisor::with_grace(Duration::from_millis(200));
    supervisor
        .start(&shell("trap '' TERM; echo ready; while true; do sleep 1; done"))
        .expect("start");
    let deadline = Instant::now() + Duration::from_secs(5);
    while !supervisor
        .poll_events()
        .contains(&ProcessEvent::Stdout("ready".to_string()))
    {
        assert!(Instant::now() < deadline, "no output from shell");
        std::thread::sleep(Duration::from_millis(10));
    }
    supervisor.stop().expect("stop");
    let events = collect_until_exit(&mut supervisor);
    assert_eq!(events.last(), Some(&ProcessEvent::Exited(None)));
}

#[test]
fn unknown_program_fails_to_spawn() {
    let mut supervisor = ProcessSupervisor::new();
    let err = supervisor
        .start(&LaunchSpec::new("/nonexistent/foamwatch-solver"))
        .expect_err("spawn must fail");
    assert!(matches!(err, SupervisorError::Spawn { .. }));
    assert_eq!(supervisor.state(), ProcessState::Idle);
}

#[test]
fn session_streams_then_rescans_after_exit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("log.foamRun");
    let script = "\
echo 'deltaT = 0.01'
echo 'Time = 0.01'
echo 'GAMG:  Solving for p, Initial residual = 0.5, Final residual = 1e-6, No Iterations 4'
echo 'smoothSolver:  Solving for Ux, Initial residual = 0.1, Final residual = 1e-6, No Iterations 1'
echo 'Time = 0.02'
echo 'GAMG:  Solving for p, Initial residual = 0.05, Final residual = 1e-6, No Iterations 3'
echo 'warning' 1>&2
";
    let mut settings = CaseSettings::for_log(&log);
    settings.refresh_interval_ms = 100;
    let mut session = Session::with_parts(ResidualMonitor::new(&settings), ProcessSupervisor::new());
    let mut renderer = CountingRenderer {
        renders: 0,
        last: None,
    };

    session
        .launch(&shell(script).tee_log(&log), &log, Instant::now())
        .expect("launch");
    assert!(session.monitor().is_plotting());
    let code = session.run_until_exit(&mut renderer, Duration::from_millis(20));

    assert_eq!(code, Some(0));
    assert!(!session.monitor().is_plotting());
    let store = session.monitor().store();
    assert_eq!(store.times(), &[0.01, 0.02]);
    assert_eq!(store.get("p").expect("p").samples(), &[Some(0.5), Some(0.05)]);
    assert_eq!(store.get("Ux").expect("Ux").samples(), &[Some(0.1), None]);
    assert!(session.terminal().any(|line| line == "Error: warning"));
    assert!(renderer.renders >= 1);
    let last = renderer.last.expect("final model");
    assert_eq!(last.lines.len(), 2);
    assert!(last.title.contains("deltaT: 0.01"));
}

#[test]
fn launch_while_running_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("log.foamRun");
    let mut session = Session::new(&CaseSettings::for_log(&log));
    session
        .launch(&shell("sleep 5"), &log, Instant::now())
        .expect("launch");
    assert!(matches!(
        session.launch(&shell("true"), &log, Instant::now()),
        Err(SupervisorError::AlreadyRunning)
    ));
    session.stop().expect("stop");
}

#[test]
fn untee_run_keeps_streamed_output_over_leftover_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("log.foamRun");
    std::fs::write(&log, "Time = 99\nSolving for old, Initial residual = 0.3\n").expect("write");
    let mut settings = CaseSettings::for_log(&log);
    settings.refresh_interval_ms = 100;
    let mut session = Session::new(&settings);
    let mut renderer = CountingRenderer {
        renders: 0,
        last: None,
    };

    let script = "echo 'Time = 1'; sleep 0.3; echo 'Solving for p, Initial residual = 0.5'";
    session
        .launch(&shell(script), &log, Instant::now())
        .expect("launch");
    let code = session.run_until_exit(&mut renderer, Duration::from_millis(20));

    assert_eq!(code, Some(0));
    let store = session.monitor().store();
    assert_eq!(store.times(), &[1.0]);
    assert_eq!(store.get("p").expect("p").samples(), &[Some(0.5)]);
    assert!(store.get("old").is_none());
}
