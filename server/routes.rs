use std::io::{Cursor, Read};

use serde::Serialize;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::handlers;
use crate::state::SharedState;

pub type JsonResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

pub fn json_response<T: Serialize>(status: u16, body: &T) -> JsonResponse {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Could not serialize response body");
        br#"{"detail":"internal serialization error"}"#.to_vec()
    });
    let len = bytes.len();
    let headers = [
        header("Content-Type", "application/json"),
        header("Access-Control-Allow-Origin", "*"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    Response::new(StatusCode(status), headers, Cursor::new(bytes), Some(len), None)
}

/// `{"detail": message}` with the given status.
pub fn error_response(status: u16, message: impl Into<String>) -> JsonResponse {
    json_response(status, &json!({ "detail": message.into() }))
}

pub fn not_found() -> JsonResponse {
    error_response(404, "Not Found")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub fn request_header(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_owned())
}

/// Reads the whole body, refusing anything over `limit` bytes.
pub fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>, JsonResponse> {
    let mut body = Vec::new();
    let mut reader = request.as_reader().take(limit as u64 + 1);
    if let Err(e) = reader.read_to_end(&mut body) {
        return Err(error_response(400, format!("could not read request body: {}", e)));
    }
    if body.len() > limit {
        return Err(error_response(413, format!("request body exceeds {} bytes", limit)));
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

pub fn dispatch(mut request: Request, state: SharedState) {
    let method = request.method().clone();
    let url = request.url().to_owned();

    let (path, query) = match url.find('?') {
        Some(pos) => (url[..pos].to_owned(), url[pos + 1..].to_owned()),
        None => (url.clone(), String::new()),
    };

    let response = match (&method, path.as_str()) {
        (Method::Get, "/") => handlers::status::handle_root(),
        (Method::Get, "/health") => handlers::status::handle_health(&state),
        (Method::Get, "/metrics") => handlers::status::handle_metrics(&state),
        (Method::Get, "/training-logs") => handlers::retrain::handle_logs(&state),

        (Method::Post, "/predict") => handlers::predict::handle(&mut request, &state),
        (Method::Post, "/upload-bulk") => handlers::bulk::handle(&mut request, &state),
        (Method::Post, "/retrain") => handlers::retrain::handle_start(&query, &state),

        _ => not_found(),
    };

    let status = response.status_code().0;
    tracing::debug!(%method, path = %path, status, "Request handled");
    if let Err(e) = request.respond(response) {
        tracing::warn!(error = %e, path = %path, "Failed to send response");
    }
}
