use crate::analysis::{BinarySummary, ChartKind, GradeSummary};
use crate::error::ChartError;
use plotters::prelude::*;

/// Colour per course, in course order. Wraps around after the last entry.
const PALETTE: [RGBColor; 10] = [
    RGBColor(0x63, 0x6E, 0xFA),
    RGBColor(0xEF, 0x55, 0x3B),
    RGBColor(0x00, 0xCC, 0x96),
    RGBColor(0xAB, 0x63, 0xFA),
    RGBColor(0xFF, 0xA1, 0x5A),
    RGBColor(0x19, 0xD3, 0xF3),
    RGBColor(0xFF, 0x66, 0x92),
    RGBColor(0xB6, 0xE8, 0x80),
    RGBColor(0xFF, 0x97, 0xFF),
    RGBColor(0xFE, 0xCB, 0x52),
];

/// Share of each x slot taken by the bars drawn in it
const GROUP_WIDTH: f64 = 0.8;

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Gráfico".to_string(),
            x_label: "X".to_string(),
            y_label: "Y".to_string(),
            width: 800,
            height: 450,
        }
    }
}

impl GraphOptions {
    /// Titles and axis labels of the grade distribution chart of `subject`
    pub fn for_grades(subject: &str, kind: ChartKind) -> Self {
        Self {
            title: format!(
                "{} de Frecuencias de Calificaciones para: {}",
                kind.title(),
                subject
            ),
            x_label: "Calificación (Nota)".to_string(),
            y_label: "Cantidad de Estudiantes".to_string(),
            ..Self::default()
        }
    }

    /// Titles and axis labels of the success-rate chart of `subject`
    pub fn for_rates(subject: &str, kind: ChartKind) -> Self {
        Self {
            title: format!("{} de Tasa de Acierto (0-1) para: {}", kind.title(), subject),
            x_label: "Curso".to_string(),
            y_label: "Tasa de Acierto (0-1)".to_string(),
            ..Self::default()
        }
    }
}

fn course_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

fn drawing<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Drawing(e.to_string())
}

/// Draws the grade distribution of one activity as an inline SVG fragment
///
/// The x-axis is the grade, fixed to 0-10 with a tick per grade; the y-axis is
/// the number of students. Each selected course gets its own colour. Bars are
/// grouped side by side per grade; trend draws one line with point markers per
/// course through the grades that occur.
///
/// # Errors
/// * Returns [`ChartError::Drawing`] if plotters fails to lay out the chart
pub fn grade_chart(summary: &GradeSummary, kind: ChartKind) -> Result<String, ChartError> {
    let options = GraphOptions::for_grades(&summary.subject, kind);
    let max_count = summary
        .frequencies
        .iter()
        .flat_map(|(_, counts)| counts.values().copied())
        .max()
        .unwrap_or(0);
    // Counts are whole students, so the axis is integral.
    let y_max = u32::try_from(max_count).unwrap_or(u32::MAX - 1) + 1;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(drawing)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5f64..10.5f64, 0u32..y_max)
            .map_err(drawing)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(12)
            .x_label_formatter(&|x| (x.round() as i64).to_string())
            .y_label_formatter(&|y| y.to_string())
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(drawing)?;

        let groups = summary.frequencies.len().max(1);
        let bar_width = GROUP_WIDTH / groups as f64;

        for (i, (course, counts)) in summary.frequencies.iter().enumerate() {
            let color = course_color(i);
            match kind {
                ChartKind::Bars => {
                    let offset = -GROUP_WIDTH / 2.0 + i as f64 * bar_width;
                    chart
                        .draw_series(counts.iter().map(|(&grade, &count)| {
                            let x0 = grade as f64 + offset;
                            Rectangle::new([(x0, 0), (x0 + bar_width, count as u32)], color.filled())
                        }))
                        .map_err(drawing)?
                        .label(course.as_str())
                        .legend(move |(x, y)| {
                            Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                        });
                }
                ChartKind::Trend => {
                    let points: Vec<(f64, u32)> = counts
                        .iter()
                        .map(|(&grade, &count)| (grade as f64, count as u32))
                        .collect();
                    chart
                        .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
                        .map_err(drawing)?
                        .label(course.as_str())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 14, y)], color.stroke_width(2))
                        });
                    chart
                        .draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))
                        .map_err(drawing)?;
                }
            }
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(drawing)?;

        root.present().map_err(drawing)?;
    }

    Ok(svg)
}

/// Draws the success rate of one sub-topic per course as an inline SVG fragment
///
/// One bar per course with data, coloured per course, on a 0-1 rate axis.
/// A trend request draws the same bar chart.
///
/// # Errors
/// * Returns [`ChartError::Drawing`] if plotters fails to lay out the chart
pub fn rate_chart(summary: &BinarySummary, kind: ChartKind) -> Result<String, ChartError> {
    let options = GraphOptions::for_rates(&summary.subject, kind);
    let courses: Vec<&str> = summary
        .indicators
        .iter()
        .map(|i| i.course.as_str())
        .collect();
    let slots = courses.len().max(1) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(drawing)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5f64..slots - 0.5, 0f64..1.0f64)
            .map_err(drawing)?;

        let course_label = |x: &f64| {
            let slot = x.round();
            if (x - slot).abs() < 1e-6 && slot >= 0.0 {
                courses.get(slot as usize).map(|c| c.to_string()).unwrap_or_default()
            } else {
                String::new()
            }
        };

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(courses.len() + 1)
            .x_label_formatter(&course_label)
            .y_label_formatter(&|y| format!("{:.1}", y))
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(drawing)?;

        for (i, indicator) in summary.indicators.iter().enumerate() {
            let color = course_color(i);
            let x = i as f64;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x - GROUP_WIDTH / 2.0, 0.0), (x + GROUP_WIDTH / 2.0, indicator.mean)],
                    color.filled(),
                )))
                .map_err(drawing)?
                .label(indicator.course.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(drawing)?;

        root.present().map_err(drawing)?;
    }

    Ok(svg)
}
