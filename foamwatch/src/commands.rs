use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "foamwatch", version, about = "Live residual monitor for CFD solver logs")]
pub struct Cli {
    /// Log verbosity (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LevelFilter,
    /// Also write diagnostics to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the monitor window (default)
    Gui {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Solver log to track
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Follow a log file without a window
    Watch {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stop after this many seconds (default: run until interrupted)
        #[arg(long)]
        duration_s: Option<u64>,
        #[command(flatten)]
        outputs: PlotOutputs,
    },
    /// Launch a solver and monitor its output
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Case directory the solver runs in
        #[arg(long)]
        case: Option<PathBuf>,
        /// Copy solver output into the case log
        #[arg(long)]
        tee: bool,
        #[command(flatten)]
        outputs: PlotOutputs,
        /// Solver program and its arguments
        #[arg(last = true)]
        program: Vec<String>,
    },
    /// Parse a finished log and write the residual table or chart
    Export {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        svg: Option<PathBuf>,
        /// Comma separated variable names to keep
        #[arg(long)]
        variables: Option<String>,
        #[command(flatten)]
        outputs: PlotOutputs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlotOutputs {
    /// Write the chart to this PNG (or .svg) file
    #[arg(long)]
    pub png: Option<PathBuf>,
    /// Write the residual table to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Use the iteration number instead of simulation time on the x axis
    #[arg(long)]
    pub iteration: bool,
}
