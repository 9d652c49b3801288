use egui_plot::{GridMark, Line, Plot, PlotPoints, Points};
use foamwatch_case::PlotSettings;
use foamwatch_core::{LineStyle, PlotModel, RenderError, ResidualRenderer, Rgb};
use std::ops::RangeInclusive;

/// Keeps the last rendered model and paints it into an egui panel.
///
/// egui_plot has no logarithmic axis, so values are plotted as `log10(y)` and
/// the tick labels are formatted back to powers of ten.
pub struct EguiRenderer {
    model: Option<PlotModel>,
    dark_theme: bool,
    show_grid: bool,
    show_legend: bool,
    line_width: f32,
}

impl EguiRenderer {
    pub fn new(settings: &PlotSettings) -> Self {
        Self {
            model: None,
            dark_theme: settings.dark_theme,
            show_grid: settings.show_grid,
            show_legend: settings.show_legend,
            line_width: settings.line_width.max(1) as f32,
        }
    }

    pub fn model(&self) -> Option<&PlotModel> {
        self.model.as_ref()
    }

    /// Draws the chart and the legend row. Returns the variable whose legend
    /// entry was clicked, if any.
    pub fn show(&self, ui: &mut egui::Ui) -> Option<String> {
        let model = self.model.as_ref()?;
        if !self.dark_theme {
            ui.style_mut().visuals = egui::Visuals::light();
        }

        ui.with_layout(egui::Layout::top_down(egui::Align::Center), |ui| {
            ui.label(egui::RichText::new(&model.title).strong().size(16.0));
        });

        let mut toggled = None;
        if self.show_legend && !model.legend.is_empty() {
            ui.horizontal_wrapped(|ui| {
                for entry in &model.legend {
                    let mut visible = entry.visible;
                    let text = egui::RichText::new(&entry.name).color(to_color32(entry.color));
                    if ui.checkbox(&mut visible, text).changed() {
                        toggled = Some(entry.name.clone());
                    }
                }
            });
        }

        let plot = Plot::new("residuals")
            .x_axis_label(model.x_label.clone())
            .y_axis_label(model.y_label.clone())
            .y_axis_formatter(|mark: GridMark, _max_chars: usize, _range: &RangeInclusive<f64>| {
                decade_label(mark.value)
            })
            .show_grid(self.show_grid)
            .allow_scroll(false);

        let width = self.line_width;
        plot.show(ui, |plot_ui| {
            for line in &model.lines {
                let color = to_color32(line.color);
                match line.style {
                    LineStyle::Markers => {
                        let points: PlotPoints = log_points(line.points()).into();
                        plot_ui.points(Points::new(points).radius(3.0).color(color).name(&line.name));
                    }
                    LineStyle::Solid => {
                        for segment in &line.segments {
                            let points: PlotPoints = log_points(segment.iter().copied()).into();
                            if segment.len() == 1 {
                                plot_ui.points(
                                    Points::new(points).radius(2.0).color(color).name(&line.name),
                                );
                            } else {
                                plot_ui.line(
                                    Line::new(points).color(color).width(width).name(&line.name),
                                );
                            }
                        }
                    }
                }
            }
            if let Some(bounds) = model.bounds {
                plot_ui.set_plot_bounds(egui_plot::PlotBounds::from_min_max(
                    [bounds.x_min, bounds.y_min.log10()],
                    [bounds.x_max, bounds.y_max.log10()],
                ));
            }
        });
        toggled
    }
}

impl ResidualRenderer for EguiRenderer {
    fn render(&mut self, model: &PlotModel) -> Result<(), RenderError> {
        self.model = Some(model.clone());
        Ok(())
    }
}

pub fn to_color32(color: Rgb) -> egui::Color32 {
    egui::Color32::from_rgb(color.0, color.1, color.2)
}

fn log_points(points: impl Iterator<Item = (f64, f64)>) -> Vec<[f64; 2]> {
    points.map(|(x, y)| [x, y.log10()]).collect()
}

/// Tick label for a `log10` coordinate.
fn decade_label(exponent: f64) -> String {
    let rounded = exponent.round();
    if (exponent - rounded).abs() < 1e-9 {
        format!("1e{}", rounded as i32)
    } else {
        format!("{:.1e}", 10f64.powf(exponent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decade_ticks_print_as_powers_of_ten() {
        assert_eq!(decade_label(-3.0), "1e-3");
        assert_eq!(decade_label(0.0), "1e0");
        assert_eq!(decade_label(2.0f64.log10()), "2.0e0");
    }

    #[test]
    fn points_are_moved_to_log_space() {
        let points = log_points(vec![(1.0, 100.0), (2.0, 0.001)].into_iter());
        assert_eq!(points[0][0], 1.0);
        assert!((points[0][1] - 2.0).abs() < 1e-12);
        assert!((points[1][1] + 3.0).abs() < 1e-12);
    }

    #[test]
    fn render_keeps_the_latest_model() {
        let mut renderer = EguiRenderer::new(&PlotSettings::default());
        assert!(renderer.model().is_none());
        let model = PlotModel::build(
            &foamwatch_core::TimeSeriesStore::new(),
            &foamwatch_core::PlotView::default(),
        );
        renderer.render(&model).expect("render");
        assert_eq!(renderer.model(), Some(&model));
    }
}
