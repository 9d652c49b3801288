use crate::commands::PlotOutputs;
use crate::output::{print_error, print_info};
use foamwatch_case::{parse_variable_list, CaseSettings, SimulationCommand, XAxis};
use foamwatch_core::{
    write_csv, PlotModel, PlottersRenderer, RenderError, ResidualMonitor, ResidualRenderer,
    VariableFilter,
};
use foamwatch_gui::{run_gui, GuiConfig};
use foamwatch_runtime::{LaunchSpec, Session};
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

type CliResult<T> = Result<T, Box<dyn Error>>;

const RUN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Terminal logger on stderr (stdout may carry CSV), plus an optional file.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> CliResult<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        loggers.push(WriteLogger::new(level, Config::default(), File::create(path)?));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn load_settings(config: Option<&Path>) -> CliResult<CaseSettings> {
    match config {
        Some(path) => Ok(CaseSettings::load_from_file(path)?),
        None => Ok(CaseSettings::default()),
    }
}

fn axis_for(outputs: &PlotOutputs) -> XAxis {
    if outputs.iteration {
        XAxis::Iteration
    } else {
        XAxis::Time
    }
}

/// Prints a one-line summary per redraw and optionally refreshes an image.
struct ConsoleRenderer {
    image: Option<PlottersRenderer>,
    last_title: String,
}

impl ConsoleRenderer {
    fn new(image: Option<PlottersRenderer>) -> Self {
        Self {
            image,
            last_title: String::new(),
        }
    }
}

impl ResidualRenderer for ConsoleRenderer {
    fn render(&mut self, model: &PlotModel) -> Result<(), RenderError> {
        if model.title != self.last_title {
            let latest: Vec<String> = model
                .lines
                .iter()
                .filter_map(|line| line.points().last().map(|(_, y)| format!("{}={y:.3e}", line.name)))
                .collect();
            print_info(&format!("{}  {}", model.title, latest.join(" ")));
            self.last_title = model.title.clone();
        }
        match self.image.as_mut() {
            Some(image) => image.render(model),
            None => Ok(()),
        }
    }
}

fn write_outputs(monitor: &ResidualMonitor, outputs: &PlotOutputs, settings: &CaseSettings) -> CliResult<()> {
    if let Some(csv) = &outputs.csv {
        monitor.try_export(csv)?;
        print_info(&format!("Residual table written to {}", csv.display()));
    }
    if let Some(png) = &outputs.png {
        monitor.try_export_plot(png, &settings.plot)?;
        print_info(&format!("Chart written to {}", png.display()));
    }
    Ok(())
}

pub fn handle_gui(config: Option<PathBuf>, log: Option<PathBuf>) -> CliResult<()> {
    let mut settings = load_settings(config.as_deref())?;
    if let Some(log) = log {
        let for_log = CaseSettings::for_log(log);
        settings.case_dir = for_log.case_dir;
        settings.log_file = for_log.log_file;
    }
    run_gui(GuiConfig::default(), settings)?;
    Ok(())
}

pub fn handle_watch(
    log: PathBuf,
    interval_ms: Option<u64>,
    duration_s: Option<u64>,
    outputs: PlotOutputs,
) -> CliResult<()> {
    let mut settings = CaseSettings::for_log(&log);
    if let Some(interval_ms) = interval_ms {
        settings.refresh_interval_ms = interval_ms;
    }
    settings.x_axis = axis_for(&outputs);
    let settings = foamwatch_case::normalize_case_settings(settings)?;

    let image = outputs
        .png
        .as_ref()
        .map(|path| PlottersRenderer::new(path, settings.plot.clone()));
    let mut renderer = ConsoleRenderer::new(image);
    let mut session = Session::new(&settings);
    print_info(&format!("Watching {}", log.display()));
    let duration = duration_s.map_or(Duration::MAX, Duration::from_secs);
    session.watch_for(&mut renderer, duration);

    if let Some(csv) = &outputs.csv {
        session.monitor().try_export(csv)?;
        print_info(&format!("Residual table written to {}", csv.display()));
    }
    Ok(())
}

pub fn handle_run(
    config: Option<PathBuf>,
    case: Option<PathBuf>,
    tee: bool,
    outputs: PlotOutputs,
    program: Vec<String>,
) -> CliResult<Option<i32>> {
    let mut settings = load_settings(config.as_deref())?;
    if let Some(case) = case {
        settings.case_dir = case;
    }
    if let Some((first, rest)) = program.split_first() {
        settings.command = Some(SimulationCommand {
            program: first.clone(),
            args: rest.to_vec(),
            tee_log: tee,
        });
    } else if tee {
        if let Some(command) = settings.command.as_mut() {
            command.tee_log = true;
        }
    }
    if outputs.iteration {
        settings.x_axis = XAxis::Iteration;
    }
    let settings = foamwatch_case::normalize_case_settings(settings)?;
    let command = settings
        .command
        .clone()
        .ok_or("no solver command given (use `-- PROGRAM ARGS` or a config file)")?;

    let spec = LaunchSpec::from_case(&command, &settings);
    let mut session = Session::new(&settings);
    let mut renderer = ConsoleRenderer::new(None);
    let pid = session.launch(&spec, settings.log_path(), std::time::Instant::now())?;
    print_info(&format!("Started {} (pid {pid})", spec.display()));

    let code = session.run_until_exit(&mut renderer, RUN_POLL_INTERVAL);
    for line in session.terminal().filter(|line| line.starts_with("Error: ")) {
        print_error(line);
    }
    match code {
        Some(code) => print_info(&format!("Solver exited with code {code}")),
        None => print_info("Solver terminated by a signal"),
    }
    write_outputs(session.monitor(), &outputs, &settings)?;
    Ok(code)
}

pub fn handle_export(
    log: PathBuf,
    svg: Option<PathBuf>,
    variables: Option<String>,
    outputs: PlotOutputs,
) -> CliResult<()> {
    if !log.exists() {
        return Err(format!("log file {} does not exist", log.display()).into());
    }
    let mut settings = CaseSettings::for_log(&log);
    settings.x_axis = axis_for(&outputs);
    if let Some(variables) = variables.as_deref() {
        settings.tracked_variables = parse_variable_list(variables);
    }
    let settings = foamwatch_case::normalize_case_settings(settings)?;

    let mut monitor = ResidualMonitor::new(&settings);
    monitor.rescan_finished();
    let store = monitor.store();
    log::info!(
        "{}: {} time points, {} variables",
        log.display(),
        store.times().len(),
        store.series().len()
    );

    if outputs.csv.is_none() && outputs.png.is_none() && svg.is_none() {
        let table = store.export_table(
            &VariableFilter::from_list(&settings.tracked_variables),
            settings.x_axis,
        );
        write_csv(&table, std::io::stdout().lock())?;
        return Ok(());
    }

    write_outputs(&monitor, &outputs, &settings)?;
    if let Some(svg) = &svg {
        monitor.try_export_plot(svg, &settings.plot)?;
        print_info(&format!("Chart written to {}", svg.display()));
    }
    Ok(())
}
