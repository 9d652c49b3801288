use super::{LineStyle, PlotBounds, PlotModel, RenderError, ResidualRenderer};
use crate::palette::Rgb;
use foamwatch_case::PlotSettings;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    /// Picks the format from the file extension. Anything but `.svg` is PNG.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => Self::Svg,
            _ => Self::Png,
        }
    }
}

/// Writes each rendered model to an image file.
pub struct PlottersRenderer {
    path: PathBuf,
    format: ImageFormat,
    settings: PlotSettings,
}

impl PlottersRenderer {
    pub fn new(path: impl Into<PathBuf>, settings: PlotSettings) -> Self {
        let path = path.into();
        let format = ImageFormat::from_path(&path);
        Self {
            path,
            format,
            settings,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl ResidualRenderer for PlottersRenderer {
    fn render(&mut self, model: &PlotModel) -> Result<(), RenderError> {
        let bounds = model.bounds.ok_or(RenderError::NoData)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| RenderError::Backend(e.to_string()))?;
            }
        }
        let size = (self.settings.width, self.settings.height);
        let result = match self.format {
            ImageFormat::Png => {
                let root = BitMapBackend::new(&self.path, size).into_drawing_area();
                draw_model(&root, model, bounds, &self.settings)
                    .and_then(|_| root.present().map_err(|e| e.to_string()))
            }
            ImageFormat::Svg => {
                let root = SVGBackend::new(&self.path, size).into_drawing_area();
                draw_model(&root, model, bounds, &self.settings)
                    .and_then(|_| root.present().map_err(|e| e.to_string()))
            }
        };
        result.map_err(RenderError::Backend)?;
        log::debug!("wrote residual plot to {}", self.path.display());
        Ok(())
    }
}

fn rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

fn draw_model<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    model: &PlotModel,
    bounds: PlotBounds,
    settings: &PlotSettings,
) -> Result<(), String> {
    let dark = settings.dark_theme;
    let bg_color = if dark {
        RGBColor(24, 24, 24)
    } else {
        RGBColor(255, 255, 255)
    };
    let text_color = if dark {
        RGBColor(220, 220, 220)
    } else {
        RGBColor(40, 40, 40)
    };
    let axis_color = if dark {
        RGBColor(80, 80, 80)
    } else {
        RGBColor(120, 120, 120)
    };

    root.fill(&bg_color).map_err(|e| e.to_string())?;

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40);
    if !model.title.is_empty() {
        builder.caption(
            &model.title,
            ("sans-serif", 24).into_font().color(&text_color),
        );
    }
    let mut chart = builder
        .build_cartesian_2d(
            bounds.x_min..bounds.x_max,
            (bounds.y_min..bounds.y_max).log_scale(),
        )
        .map_err(|e| e.to_string())?;

    let mut mesh = chart.configure_mesh();
    mesh.x_desc(model.x_label.as_str())
        .y_desc(model.y_label.as_str())
        .y_label_formatter(&|v| format!("{v:.0e}"))
        .axis_desc_style(("sans-serif", 16).into_font().color(&text_color))
        .label_style(("sans-serif", 14).into_font().color(&text_color))
        .axis_style(&axis_color);
    if settings.show_grid {
        mesh.light_line_style(axis_color.mix(0.3))
            .bold_line_style(&axis_color);
    } else {
        mesh.disable_mesh();
    }
    mesh.draw().map_err(|e| e.to_string())?;

    let width = settings.line_width.max(1);
    for line in &model.lines {
        let color = rgb(line.color);
        let name = line.name.clone();
        match line.style {
            LineStyle::Markers => {
                let series_plot = chart
                    .draw_series(
                        line.points()
                            .map(|point| Circle::new(point, 3, color.filled())),
                    )
                    .map_err(|e| e.to_string())?;
                if settings.show_legend {
                    series_plot
                        .label(name)
                        .legend(move |(x, y)| Circle::new((x + 10, y), 3, color.filled()));
                }
            }
            LineStyle::Solid => {
                for (idx, segment) in line.segments.iter().enumerate() {
                    let series_plot = if segment.len() == 1 {
                        chart
                            .draw_series(
                                segment
                                    .iter()
                                    .map(|point| Circle::new(*point, 2, color.filled())),
                            )
                            .map_err(|e| e.to_string())?
                    } else {
                        chart
                            .draw_series(LineSeries::new(
                                segment.iter().copied(),
                                color.stroke_width(width),
                            ))
                            .map_err(|e| e.to_string())?
                    };
                    if idx == 0 && settings.show_legend {
                        series_plot.label(name.clone()).legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], &color)
                        });
                    }
                }
            }
        }
    }

    if settings.show_legend && !model.lines.is_empty() {
        chart
            .configure_series_labels()
            .background_style(if dark {
                RGBColor(18, 18, 18)
            } else {
                RGBColor(240, 240, 240)
            })
            .border_style(&axis_color)
            .label_font(("sans-serif", 16).into_font().color(&text_color))
            .position(SeriesLabelPosition::UpperRight)
            .margin(12)
            .draw()
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ImageFormat::from_path(Path::new("a/plot.svg")), ImageFormat::Svg);
        assert_eq!(ImageFormat::from_path(Path::new("plot.SVG")), ImageFormat::Svg);
        assert_eq!(ImageFormat::from_path(Path::new("plot.png")), ImageFormat::Png);
        assert_eq!(ImageFormat::from_path(Path::new("plot")), ImageFormat::Png);
    }

    #[test]
    fn gapped_model_renders_to_svg() {
        let mut store = crate::series::TimeSeriesStore::new();
        for (time, p, alpha) in [
            (0.1, Some(0.5), Some(0.2)),
            (0.2, Some(0.05), None),
            (0.3, Some(0.01), Some(0.02)),
            (0.4, None, Some(0.01)),
        ] {
            store.record_time(time);
            if let Some(p) = p {
                store.record_residual("p_rgh", p);
            }
            if let Some(alpha) = alpha {
                store.record_residual("alpha.water", alpha);
            }
        }
        let model = PlotModel::build(&store, &super::super::PlotView::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("charts").join("residuals.svg");
        let mut renderer = PlottersRenderer::new(&path, PlotSettings::default());

        renderer.render(&model).expect("render svg");

        let svg = std::fs::read_to_string(&path).expect("svg written");
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<polyline") || svg.contains("<path"));
        assert!(svg.contains("p_rgh"));
        assert!(svg.contains("alpha.water"));
    }

    #[test]
    fn empty_model_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut renderer = PlottersRenderer::new(dir.path().join("plot.svg"), PlotSettings::default());
        let model = PlotModel::build(
            &crate::series::TimeSeriesStore::new(),
            &super::super::PlotView::default(),
        );
        assert!(matches!(renderer.render(&model), Err(RenderError::NoData)));
        assert!(!renderer.path().exists());
    }
}
