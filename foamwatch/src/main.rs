mod commands;
mod handlers;
mod output;

use clap::Parser;
use commands::{Cli, Commands};
use output::print_error;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = handlers::init_logging(cli.log_level, cli.log_file.as_deref()) {
        print_error(&format!("Failed to initialize logging: {err}"));
    }

    let result = match cli.command {
        None => handlers::handle_gui(None, None).map(|_| None),
        Some(Commands::Gui { config, log }) => handlers::handle_gui(config, log).map(|_| None),
        Some(Commands::Watch {
            log,
            interval_ms,
            duration_s,
            outputs,
        }) => handlers::handle_watch(log, interval_ms, duration_s, outputs).map(|_| None),
        Some(Commands::Run {
            config,
            case,
            tee,
            outputs,
            program,
        }) => handlers::handle_run(config, case, tee, outputs, program),
        Some(Commands::Export {
            log,
            svg,
            variables,
            outputs,
        }) => handlers::handle_export(log, svg, variables, outputs).map(|_| None),
    };

    match result {
        Ok(Some(code)) if code != 0 => std::process::exit(code),
        Ok(_) => {}
        Err(err) => {
            print_error(&err.to_string());
            std::process::exit(1);
        }
    }
}
