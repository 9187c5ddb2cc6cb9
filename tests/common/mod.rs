#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use gradeboard::app::{AppState, router};
use gradeboard::config::ServerConfig;
use rust_xlsxwriter::Workbook;
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "gradeboard-test-boundary";

/// One worksheet: name, header row, data rows. Numeric-looking strings are
/// written as numbers, empty strings leave the cell blank.
pub type Sheet<'a> = (&'a str, Vec<&'a str>, Vec<Vec<&'a str>>);

/// Builds an xlsx workbook with two title rows above each header row.
pub fn workbook(sheets: Vec<Sheet>) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, header, rows) in sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(name).unwrap();
        ws.write_string(0, 0, "Colegio de prueba").unwrap();
        ws.write_string(1, 0, "Reporte de notas").unwrap();
        for (c, h) in header.iter().enumerate() {
            ws.write_string(2, c as u16, *h).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            let r = 3 + r as u32;
            for (c, v) in row.iter().enumerate() {
                if v.is_empty() {
                    continue;
                }
                match v.parse::<f64>() {
                    Ok(n) => ws.write_number(r, c as u16, n).unwrap(),
                    Err(_) => ws.write_string(r, c as u16, *v).unwrap(),
                };
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Activities workbook: course 1A has Tarea1 grades 8, 8, 9, 10.
pub fn tasks_workbook() -> Vec<u8> {
    workbook(vec![(
        "Hoja1",
        vec!["Cédula", "Nombre", "Curso", "Tarea1", "Tarea2"],
        vec![
            vec!["101", "Ana", "1A", "8", "6"],
            vec!["102", "Luis", "1A", "8", "7"],
            vec!["103", "Eva", "1A", "9", ""],
            vec!["104", "Juan", "1A", "10", "5"],
            vec!["105", "Sara", "1B", "4", "9"],
        ],
    )])
}

/// Evaluations workbook: course 1A answers P1 with 1, 1, 1, 0. `Nota` is the
/// final score column and `Obs` is free text, so neither is a sub-topic.
pub fn evaluations_workbook() -> Vec<u8> {
    workbook(vec![(
        "Hoja1",
        vec!["Nombre", "Curso", "P1", "P2", "Obs", "Nota"],
        vec![
            vec!["Ana", "1A", "1", "0", "bien", "7"],
            vec!["Luis", "1A", "1", "1", "", "8"],
            vec!["Eva", "1A", "1", "0", "", "6"],
            vec!["Juan", "1A", "0", "0", "falta", "4"],
        ],
    )])
}

pub fn test_app() -> (Router, Arc<AppState>) {
    let config = ServerConfig::default();
    let state = Arc::new(AppState::new(&config).unwrap());
    (router(state.clone(), &config), state)
}

pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

pub fn upload_request(uri: &str, field: &str, bytes: &[u8], cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(multipart_body(field, "notas.xlsx", bytes))
        .unwrap()
}

pub fn form_request(uri: &str, form: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie)
        .body(Body::from(form.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

/// The `name=value` pair of the session cookie set by `response`.
pub fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response sets a cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().trim().to_string()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response redirects")
        .to_str()
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
