mod app;
pub mod plotter;

pub use app::FoamwatchApp;
pub use plotter::EguiRenderer;

use foamwatch_case::CaseSettings;

#[derive(Debug, Clone)]
pub struct GuiConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            title: "foamwatch".to_string(),
            width: 1280.0,
            height: 800.0,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum GuiError {
    #[error("gui error: {0}")]
    Gui(String),
}

/// Opens the residual monitor window for `settings` and blocks until it is
/// closed.
pub fn run_gui(config: GuiConfig, settings: CaseSettings) -> Result<(), GuiError> {
    let mut options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([config.width, config.height]),
        ..Default::default()
    };
    // NOTE: Vsync generates hangs and lag on occluded windows.
    options.vsync = false;

    eframe::run_native(
        &config.title,
        options,
        Box::new(move |_cc| Box::new(FoamwatchApp::new(settings))),
    )
    .map_err(|err| GuiError::Gui(err.to_string()))
}
