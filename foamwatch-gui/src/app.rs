use crate::plotter::EguiRenderer;
use foamwatch_case::{CaseSettings, XAxis};
use foamwatch_runtime::{LaunchSpec, ProcessState, Session};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const MAX_REPAINT_DELAY: Duration = Duration::from_millis(100);
const TERMINAL_LINES_SHOWN: usize = 500;

pub struct FoamwatchApp {
    session: Session,
    renderer: EguiRenderer,
    settings: CaseSettings,
    log_path_input: String,
    command_input: String,
    show_terminal: bool,
    status: String,
}

impl FoamwatchApp {
    pub fn new(settings: CaseSettings) -> Self {
        let session = Session::new(&settings);
        let renderer = EguiRenderer::new(&settings.plot);
        let command_input = settings
            .command
            .as_ref()
            .map(|command| {
                std::iter::once(command.program.as_str())
                    .chain(command.args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        Self {
            session,
            renderer,
            log_path_input: settings.log_path().display().to_string(),
            command_input,
            settings,
            show_terminal: true,
            status: String::new(),
        }
    }

    fn track_input_path(&mut self) {
        let path = PathBuf::from(self.log_path_input.trim());
        self.session.monitor_mut().set_log_path(path, Instant::now());
        self.status = format!("Tracking {}", self.log_path_input.trim());
    }

    fn run_command(&mut self) {
        let mut words = self.command_input.split_whitespace();
        let Some(program) = words.next() else {
            self.status = "Enter a command to run".to_string();
            return;
        };
        let log_path = PathBuf::from(self.log_path_input.trim());
        let mut spec = LaunchSpec::new(program)
            .args(words)
            .current_dir(self.settings.case_dir.clone());
        if self.settings.command.as_ref().map_or(true, |c| c.tee_log) {
            spec = spec.tee_log(log_path.clone());
        }
        self.status = match self.session.launch(&spec, log_path, Instant::now()) {
            Ok(pid) => format!("Started {} (pid {pid})", spec.display()),
            Err(err) => {
                log::warn!("{}", err);
                err.to_string()
            }
        };
    }

    fn export_csv(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name("residuals.csv")
            .save_file()
        else {
            return;
        };
        self.status = if self.session.monitor().export(&path) {
            format!("Exported {}", path.display())
        } else {
            format!("Export to {} failed", path.display())
        };
    }

    fn export_image(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .add_filter("SVG", &["svg"])
            .set_file_name("residuals.png")
            .save_file()
        else {
            return;
        };
        self.status = if self
            .session
            .monitor()
            .export_plot(&path, &self.settings.plot)
        {
            format!("Saved {}", path.display())
        } else {
            format!("Saving {} failed", path.display())
        };
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Log:");
            ui.add(egui::TextEdit::singleline(&mut self.log_path_input).desired_width(360.0));
            if ui.button("Browse…").clicked() {
                if let Some(path) = rfd::FileDialog::new().pick_file() {
                    self.log_path_input = path.display().to_string();
                    self.track_input_path();
                }
            }
            if ui.button("Track").clicked() {
                self.track_input_path();
            }
            ui.separator();
            let plotting = self.session.monitor().is_plotting();
            if ui.add_enabled(!plotting, egui::Button::new("Start")).clicked() {
                self.session.monitor_mut().start_plotting(Instant::now());
            }
            if ui.add_enabled(plotting, egui::Button::new("Stop")).clicked() {
                self.session.monitor_mut().stop_plotting();
            }
            if ui.button("Clear").clicked() {
                self.session.monitor_mut().clear();
                self.status = "Cleared".to_string();
            }
            ui.separator();
            if ui.button("Export CSV").clicked() {
                self.export_csv();
            }
            if ui.button("Save image").clicked() {
                self.export_image();
            }
        });

        ui.horizontal(|ui| {
            let mut axis = self.session.monitor().view().axis;
            egui::ComboBox::from_label("X axis")
                .selected_text(axis.label())
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut axis, XAxis::Time, XAxis::Time.label());
                    ui.selectable_value(&mut axis, XAxis::Iteration, XAxis::Iteration.label());
                });
            if axis != self.session.monitor().view().axis {
                self.session.monitor_mut().set_axis(axis);
            }
            let mut show_diagnostic = self.session.monitor().view().show_diagnostic;
            if ui.checkbox(&mut show_diagnostic, "max alpha").changed() {
                self.session.monitor_mut().set_show_diagnostic(show_diagnostic);
            }
            ui.checkbox(&mut self.show_terminal, "Terminal");
        });

        ui.horizontal(|ui| {
            ui.label("Command:");
            ui.add(egui::TextEdit::singleline(&mut self.command_input).desired_width(360.0));
            let state = self.session.supervisor().state();
            let active = self.session.supervisor().is_active();
            if ui.add_enabled(!active, egui::Button::new("Run")).clicked() {
                self.run_command();
            }
            if ui
                .add_enabled(state == ProcessState::Running, egui::Button::new("Pause"))
                .clicked()
            {
                self.report(|session| session.pause());
            }
            if ui
                .add_enabled(state == ProcessState::Paused, egui::Button::new("Resume"))
                .clicked()
            {
                self.report(|session| session.resume());
            }
            if ui
                .add_enabled(
                    matches!(state, ProcessState::Running | ProcessState::Paused),
                    egui::Button::new("Stop"),
                )
                .clicked()
            {
                self.report(|session| session.stop());
            }
            ui.label(state_label(state));
        });
    }

    fn report<E: std::fmt::Display>(&mut self, action: impl FnOnce(&mut Session) -> Result<(), E>) {
        if let Err(err) = action(&mut self.session) {
            log::warn!("{}", err);
            self.status = err.to_string();
        }
    }

    fn terminal_ui(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                let lines: Vec<&str> = self.session.terminal().collect();
                let skip = lines.len().saturating_sub(TERMINAL_LINES_SHOWN);
                for line in &lines[skip..] {
                    ui.monospace(*line);
                }
            });
    }
}

fn state_label(state: ProcessState) -> String {
    match state {
        ProcessState::Idle => "idle".to_string(),
        ProcessState::Running => "running".to_string(),
        ProcessState::Paused => "paused".to_string(),
        ProcessState::Stopping => "stopping".to_string(),
        ProcessState::Exited(Some(code)) => format!("exited ({code})"),
        ProcessState::Exited(None) => "terminated".to_string(),
    }
}

impl eframe::App for FoamwatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let report = self.session.turn(now, &mut self.renderer);
        if let Some(code) = report.exited {
            self.status = match code {
                Some(code) => format!("Process exited with code {code}"),
                None => "Process terminated".to_string(),
            };
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            self.controls_ui(ui);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(&self.status);
        });

        if self.show_terminal {
            egui::TopBottomPanel::bottom("terminal")
                .resizable(true)
                .default_height(160.0)
                .show(ctx, |ui| {
                    self.terminal_ui(ui);
                });
        }

        let mut toggled = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            toggled = self.renderer.show(ui);
        });
        if let Some(name) = toggled {
            self.session.monitor_mut().toggle_variable_visibility(&name);
        }

        if self.session.monitor().is_plotting() || self.session.supervisor().is_active() {
            let delay = self
                .session
                .monitor()
                .scheduler()
                .time_until_next(Instant::now())
                .map_or(MAX_REPAINT_DELAY, |next| next.min(MAX_REPAINT_DELAY));
            ctx.request_repaint_after(delay);
        } else if self.session.monitor().redraw_pending() {
            ctx.request_repaint();
        }
    }
}
