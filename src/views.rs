//! HTML pages, rendered with handlebars templates compiled at startup.

use crate::analysis::{Band, BinarySummary, ChartKind, GradeSummary, Indicator, Selection};
use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

const TEMPLATES: [(&str, &str); 3] = [
    ("index", include_str!("./templates/index.hbs")),
    ("resultados", include_str!("./templates/resultados.hbs")),
    ("evaluaciones", include_str!("./templates/evaluaciones.hbs")),
];

const PARTIALS: [(&str, &str); 4] = [
    ("head", include_str!("./templates/head.hbs")),
    ("nav", include_str!("./templates/nav.hbs")),
    ("filters", include_str!("./templates/filters.hbs")),
    ("subjects", include_str!("./templates/subjects.hbs")),
];

/// A checkbox of the filter form
#[derive(Debug, Serialize)]
pub struct Choice {
    pub field: &'static str,
    pub value: String,
    pub checked: bool,
}

fn choices(field: &'static str, values: &[String], selected: &[String]) -> Vec<Choice> {
    values
        .iter()
        .map(|v| Choice {
            field,
            value: v.clone(),
            checked: selected.contains(v),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct IndicatorView {
    pub course: String,
    pub value: String,
    pub band: Band,
}

impl From<&Indicator> for IndicatorView {
    fn from(indicator: &Indicator) -> Self {
        Self {
            course: indicator.course.clone(),
            value: format!("{:.2}", indicator.indicator),
            band: indicator.band,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountRow {
    pub label: String,
    pub count: usize,
}

/// Frequency table of one course
#[derive(Debug, Serialize)]
pub struct FrequencyView {
    pub course: String,
    pub value_header: &'static str,
    pub total: usize,
    pub rows: Vec<CountRow>,
}

/// Everything shown for one subject: indicators, chart and statistics
#[derive(Debug, Serialize)]
pub struct SubjectView {
    pub subject: String,
    pub chart: String,
    pub indicators: Vec<IndicatorView>,
    pub frequencies: Vec<FrequencyView>,
}

impl SubjectView {
    pub fn from_grades(summary: &GradeSummary, chart: String) -> Self {
        Self {
            subject: summary.subject.clone(),
            chart,
            indicators: summary.indicators.iter().map(IndicatorView::from).collect(),
            frequencies: summary
                .frequencies
                .iter()
                .map(|(course, counts)| FrequencyView {
                    course: course.clone(),
                    value_header: "Nota",
                    total: counts.values().sum(),
                    rows: counts
                        .iter()
                        .map(|(grade, &count)| CountRow {
                            label: grade.to_string(),
                            count,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn from_flags(summary: &BinarySummary, chart: String) -> Self {
        Self {
            subject: summary.subject.clone(),
            chart,
            indicators: summary.indicators.iter().map(IndicatorView::from).collect(),
            frequencies: summary
                .frequencies
                .iter()
                .map(|(course, tally)| FrequencyView {
                    course: course.clone(),
                    value_header: "Resultado",
                    total: tally.total(),
                    rows: vec![
                        CountRow {
                            label: "Aciertos (1)".to_string(),
                            count: tally.correct,
                        },
                        CountRow {
                            label: "Errores (0)".to_string(),
                            count: tally.wrong,
                        },
                    ],
                })
                .collect(),
        }
    }
}

/// Filter controls plus results of one analysis page
#[derive(Debug, Serialize)]
pub struct AnalysisPage {
    pub courses: Vec<Choice>,
    pub subjects_available: Vec<Choice>,
    pub subject_legend: &'static str,
    pub bars: bool,
    pub subjects: Vec<SubjectView>,
    pub error: Option<String>,
}

impl AnalysisPage {
    /// Filter controls for the tasks pipeline. `selection` ticks the posted boxes.
    pub fn tasks(courses: &[String], tasks: &[String], selection: Option<&Selection>) -> Self {
        Self::build(courses, tasks, selection, "tareas", "Tareas")
    }

    /// Filter controls for the evaluations pipeline.
    pub fn evaluations(
        courses: &[String],
        subtopics: &[String],
        selection: Option<&Selection>,
    ) -> Self {
        Self::build(courses, subtopics, selection, "subtemas", "Subtemas")
    }

    fn build(
        courses: &[String],
        subjects: &[String],
        selection: Option<&Selection>,
        field: &'static str,
        legend: &'static str,
    ) -> Self {
        let none: Vec<String> = Vec::new();
        let (picked_courses, picked_subjects) = match selection {
            Some(s) => (&s.courses, &s.subjects),
            None => (&none, &none),
        };
        Self {
            courses: choices("cursos", courses, picked_courses),
            subjects_available: choices(field, subjects, picked_subjects),
            subject_legend: legend,
            bars: selection.is_none_or(|s| s.kind == ChartKind::Bars),
            subjects: Vec::new(),
            error: None,
        }
    }
}

#[derive(Serialize)]
struct UploadPage<'a> {
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct EvaluationsPage<'a> {
    has_data: bool,
    error_general: Option<&'a str>,
    #[serde(flatten)]
    analysis: Option<&'a AnalysisPage>,
}

/// Compiled page templates
pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        for (name, source) in PARTIALS {
            registry.register_partial(name, source)?;
        }
        for (name, source) in TEMPLATES {
            registry.register_template_string(name, source)?;
        }
        Ok(Self { registry })
    }

    /// Upload form of the tasks pipeline
    pub fn upload(&self, error: Option<&str>) -> Result<String, RenderError> {
        self.registry.render("index", &UploadPage { error })
    }

    /// Filters and results of the tasks pipeline
    pub fn results(&self, page: &AnalysisPage) -> Result<String, RenderError> {
        self.registry.render("resultados", page)
    }

    /// Evaluations page: the upload form when `analysis` is `None`, filters
    /// and results otherwise.
    pub fn evaluations(
        &self,
        analysis: Option<&AnalysisPage>,
        error_general: Option<&str>,
    ) -> Result<String, RenderError> {
        let page = EvaluationsPage {
            has_data: analysis.is_some(),
            error_general,
            analysis,
        };
        self.registry.render("evaluaciones", &page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BinaryCounts, GradeCounts, SubjectSummary};

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn templates_compile() {
        assert!(Views::new().is_ok());
    }

    #[test]
    fn upload_page_shows_error_escaped() {
        let views = Views::new().unwrap();
        let html = views.upload(Some("falta <Curso>")).unwrap();
        assert!(html.contains("archivo_excel"));
        assert!(html.contains("falta &lt;Curso&gt;"));
    }

    #[test]
    fn results_page_ticks_posted_selection() {
        let views = Views::new().unwrap();
        let selection = Selection {
            courses: strings(&["1B"]),
            subjects: strings(&["Tarea2"]),
            kind: ChartKind::Trend,
        };
        let page = AnalysisPage::tasks(
            &strings(&["1A", "1B"]),
            &strings(&["Tarea1", "Tarea2"]),
            Some(&selection),
        );
        assert!(!page.bars);
        assert!(!page.courses[0].checked);
        assert!(page.courses[1].checked);
        let html = views.results(&page).unwrap();
        assert!(html.contains(r#"name="tareas" value="Tarea2" checked"#));
        assert!(html.contains(r#"name="cursos" value="1A">"#));
    }

    #[test]
    fn subject_view_embeds_chart_unescaped() {
        let views = Views::new().unwrap();
        let counts: GradeCounts = [(8, 2)].into_iter().collect();
        let summary = SubjectSummary {
            subject: "Tarea1".to_string(),
            indicators: vec![],
            frequencies: vec![("1A".to_string(), counts)],
        };
        let mut page = AnalysisPage::tasks(&strings(&["1A"]), &strings(&["Tarea1"]), None);
        page.subjects
            .push(SubjectView::from_grades(&summary, "<svg id=\"c\"></svg>".to_string()));
        let html = views.results(&page).unwrap();
        assert!(html.contains("<svg id=\"c\"></svg>"));
        assert!(html.contains("(2 registros)"));
    }

    #[test]
    fn flag_view_has_both_buckets() {
        let summary = SubjectSummary {
            subject: "P1".to_string(),
            indicators: vec![],
            frequencies: vec![("1A".to_string(), BinaryCounts { correct: 0, wrong: 2 })],
        };
        let view = SubjectView::from_flags(&summary, String::new());
        let labels: Vec<&str> = view.frequencies[0].rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Aciertos (1)", "Errores (0)"]);
        assert_eq!(view.frequencies[0].rows[0].count, 0);
    }

    #[test]
    fn evaluations_without_data_shows_upload_form() {
        let views = Views::new().unwrap();
        let html = views.evaluations(None, None).unwrap();
        assert!(html.contains("archivo_evaluaciones"));
        assert!(!html.contains("generar_analisis"));
    }
}
