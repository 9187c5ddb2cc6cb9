use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::{
    Form,
    cookie::{Cookie, CookieJar},
};
use handlebars::RenderError;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::analysis::{ChartKind, Selection, analyze_evaluations, analyze_tasks};
use crate::columns::{evaluation_columns, task_columns};
use crate::config::ServerConfig;
use crate::error::{ChartError, IngestError};
use crate::graph::{grade_chart, rate_chart};
use crate::loader::{SheetMode, load_workbook};
use crate::session::{SESSION_COOKIE, SessionStore, Slot};
use crate::table::Table;
use crate::views::{AnalysisPage, SubjectView, Views};

const TASKS_UPLOAD_FIELD: &str = "archivo_excel";
const EVALUATIONS_UPLOAD_FIELD: &str = "archivo_evaluaciones";

/// Shared state of every request handler
pub struct AppState {
    pub sessions: SessionStore,
    pub views: Views,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self, handlebars::TemplateError> {
        Ok(Self {
            sessions: SessionStore::new(config.session_ttl),
            views: Views::new()?,
        })
    }
}

/// Fields of both filter forms
#[derive(Debug, Default, Deserialize)]
pub struct FilterForm {
    #[serde(default)]
    pub cursos: Vec<String>,
    #[serde(default)]
    pub tareas: Vec<String>,
    #[serde(default)]
    pub subtemas: Vec<String>,
    pub tipo_grafico: Option<String>,
    pub generar_analisis: Option<String>,
}

impl FilterForm {
    fn task_selection(self) -> Selection {
        Selection {
            kind: ChartKind::from_form(self.tipo_grafico.as_deref()),
            courses: self.cursos,
            subjects: self.tareas,
        }
    }

    fn evaluation_selection(self) -> Selection {
        Selection {
            kind: ChartKind::from_form(self.tipo_grafico.as_deref()),
            courses: self.cursos,
            subjects: self.subtemas,
        }
    }
}

/// What a read of a session slot found
enum Stored {
    Loaded(Table),
    Empty,
    Corrupt,
}

fn load_slot(state: &AppState, session_id: &str, slot: Slot) -> Stored {
    match state.sessions.get(session_id, slot) {
        Ok(Some(table)) => Stored::Loaded(table),
        Ok(None) => Stored::Empty,
        Err(_) => Stored::Corrupt,
    }
}

/// Builds the application router.
///
/// Separate from [`run`] so tests can drive it without a socket.
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(upload_form).post(upload_tasks))
        .route("/resultados", get(show_results).post(filter_results))
        .route("/limpiar", get(clear_tasks))
        .route("/evaluaciones", get(show_evaluations).post(post_evaluations))
        .route("/limpiar_evaluaciones", get(clear_evaluations))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(&config)?);
    let app = router(state, &config);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Returns the session id carried by the cookie, issuing a new cookie when
/// the request has none or its value is not one of ours.
fn session_id(jar: CookieJar, sessions: &SessionStore) -> (CookieJar, String) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if Uuid::parse_str(cookie.value()).is_ok() {
            let id = cookie.value().to_string();
            return (jar, id);
        }
    }
    let id = sessions.create_session();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true);
    (jar.add(cookie), id)
}

fn render(jar: CookieJar, page: Result<String, RenderError>) -> Response {
    match page {
        Ok(html) => (jar, Html(html)).into_response(),
        Err(e) => {
            error!("page rendering failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                jar,
                "Error interno al generar la página",
            )
                .into_response()
        }
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Reads the bytes of the file field `field_name` from an upload form.
async fn read_upload(mut multipart: Multipart, field_name: &str) -> Result<Vec<u8>, IngestError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| IngestError::Workbook(e.to_string()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let named = field.file_name().is_some_and(|n| !n.is_empty());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| IngestError::Workbook(e.to_string()))?;
        if !named || bytes.is_empty() {
            return Err(IngestError::MissingFile);
        }
        return Ok(bytes.to_vec());
    }
    Err(IngestError::MissingFile)
}

async fn ingest(multipart: Multipart, field_name: &str, mode: SheetMode) -> Result<Table, IngestError> {
    let bytes = read_upload(multipart, field_name).await?;
    load_workbook(&bytes, mode)
}

fn grade_views(table: &Table, selection: &Selection) -> Result<Vec<SubjectView>, String> {
    let summaries = analyze_tasks(table, selection).map_err(|e| e.to_string())?;
    summaries
        .iter()
        .map(|s| Ok(SubjectView::from_grades(s, grade_chart(s, selection.kind)?)))
        .collect::<Result<_, ChartError>>()
        .map_err(|e| {
            error!("{}", e);
            "No se pudo generar el gráfico.".to_string()
        })
}

fn flag_views(table: &Table, selection: &Selection) -> Result<Vec<SubjectView>, String> {
    let summaries = analyze_evaluations(table, selection).map_err(|e| e.to_string())?;
    summaries
        .iter()
        .map(|s| Ok(SubjectView::from_flags(s, rate_chart(s, selection.kind)?)))
        .collect::<Result<_, ChartError>>()
        .map_err(|e| {
            error!("{}", e);
            "No se pudo generar el gráfico.".to_string()
        })
}

// Activities / tasks pipeline

async fn upload_form(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, _) = session_id(jar, &state.sessions);
    render(jar, state.views.upload(None))
}

async fn upload_tasks(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);

    // A body that is not a multipart upload carries no file.
    let multipart = if is_multipart(&request) {
        Multipart::from_request(request, &state).await.ok()
    } else {
        None
    };
    let stored = match multipart {
        Some(multipart) => ingest(multipart, TASKS_UPLOAD_FIELD, SheetMode::All).await,
        None => Err(IngestError::MissingFile),
    }
    .and_then(|table| {
        state
            .sessions
            .put(&sid, Slot::Tasks, &table)
            .map_err(|e| IngestError::Workbook(e.to_string()))
    });

    match stored {
        Ok(()) => (jar, Redirect::to("/resultados")).into_response(),
        Err(e) => {
            warn!("tasks upload failed: {}", e);
            render(jar, state.views.upload(Some(&e.to_string())))
        }
    }
}

async fn show_results(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);
    let Stored::Loaded(table) = load_slot(&state, &sid, Slot::Tasks) else {
        return (jar, Redirect::to("/")).into_response();
    };

    let page = AnalysisPage::tasks(&table.courses(), &task_columns(table.columns()), None);
    render(jar, state.views.results(&page))
}

async fn filter_results(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<FilterForm>,
) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);
    let Stored::Loaded(table) = load_slot(&state, &sid, Slot::Tasks) else {
        return (jar, Redirect::to("/")).into_response();
    };

    let selection = form.task_selection();
    let mut page = AnalysisPage::tasks(
        &table.courses(),
        &task_columns(table.columns()),
        Some(&selection),
    );
    match grade_views(&table, &selection) {
        Ok(views) => page.subjects = views,
        Err(message) => {
            warn!("tasks analysis failed: {}", message);
            page.error = Some(message);
        }
    }
    render(jar, state.views.results(&page))
}

async fn clear_tasks(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);
    state.sessions.clear(&sid, Slot::Tasks);
    (jar, Redirect::to("/")).into_response()
}

// Evaluations / sub-topics pipeline

fn evaluation_page(table: &Table, selection: Option<&Selection>) -> AnalysisPage {
    AnalysisPage::evaluations(&table.courses(), &evaluation_columns(table), selection)
}

async fn show_evaluations(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);
    match load_slot(&state, &sid, Slot::Evaluations) {
        Stored::Loaded(table) => {
            let page = evaluation_page(&table, None);
            render(jar, state.views.evaluations(Some(&page), None))
        }
        Stored::Empty => render(jar, state.views.evaluations(None, None)),
        Stored::Corrupt => (jar, Redirect::to("/evaluaciones")).into_response(),
    }
}

/// Uploads and filter submissions share this route; multipart bodies are
/// uploads, url-encoded bodies are filter submissions.
async fn post_evaluations(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Response {
    if is_multipart(&request) {
        match Multipart::from_request(request, &state).await {
            Ok(multipart) => upload_evaluations(state, jar, multipart).await,
            Err(rejection) => rejection.into_response(),
        }
    } else {
        // Bodies that are not a filter form fall back to the plain view.
        let form = match Form::<FilterForm>::from_request(request, &state).await {
            Ok(Form(form)) => form,
            Err(rejection) => {
                debug!("ignoring evaluations form body: {}", rejection);
                FilterForm::default()
            }
        };
        filter_evaluations(state, jar, form)
    }
}

async fn upload_evaluations(state: Arc<AppState>, jar: CookieJar, multipart: Multipart) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);

    let stored = ingest(multipart, EVALUATIONS_UPLOAD_FIELD, SheetMode::First)
        .await
        .and_then(|table| {
            state
                .sessions
                .put(&sid, Slot::Evaluations, &table)
                .map_err(|e| IngestError::Workbook(e.to_string()))
        });

    match stored {
        Ok(()) => (jar, Redirect::to("/evaluaciones")).into_response(),
        Err(e) => {
            warn!("evaluations upload failed: {}", e);
            let message = format!(
                "{} Asegúrate de que tenga el formato correcto (encabezados en la fila 3).",
                e
            );
            render(jar, state.views.evaluations(None, Some(&message)))
        }
    }
}

fn filter_evaluations(state: Arc<AppState>, jar: CookieJar, form: FilterForm) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);
    let table = match load_slot(&state, &sid, Slot::Evaluations) {
        Stored::Loaded(table) => table,
        Stored::Empty => return render(jar, state.views.evaluations(None, None)),
        Stored::Corrupt => return (jar, Redirect::to("/evaluaciones")).into_response(),
    };

    if form.generar_analisis.is_none() {
        let page = evaluation_page(&table, None);
        return render(jar, state.views.evaluations(Some(&page), None));
    }

    let selection = form.evaluation_selection();
    let mut page = evaluation_page(&table, Some(&selection));
    match flag_views(&table, &selection) {
        Ok(views) => page.subjects = views,
        Err(message) => {
            warn!("evaluations analysis failed: {}", message);
            page.error = Some(message);
        }
    }
    render(jar, state.views.evaluations(Some(&page), None))
}

async fn clear_evaluations(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, sid) = session_id(jar, &state.sessions);
    state.sessions.clear(&sid, Slot::Evaluations);
    (jar, Redirect::to("/evaluaciones")).into_response()
}
