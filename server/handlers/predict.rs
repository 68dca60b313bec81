use std::time::Instant;

use serde::Serialize;
use tiny_http::Request;

use landcover_nn::error::{ModelError, PredictError};
use landcover_nn::model::PredictionResult;

use crate::routes::{error_response, json_response, read_body, request_header, JsonResponse};
use crate::state::AppState;
use crate::util::multipart::{extract_boundary, extract_files};

#[derive(Serialize)]
struct PredictResponse {
    #[serde(flatten)]
    result: PredictionResult,
    latency_ms: f64,
}

// ---------------------------------------------------------------------------
// POST /predict
// ---------------------------------------------------------------------------

pub fn handle(request: &mut Request, state: &AppState) -> JsonResponse {
    let started = Instant::now();

    let content_type = request_header(request, "Content-Type").unwrap_or_default();
    let Some(boundary) = extract_boundary(&content_type) else {
        return error_response(400, "expected a multipart/form-data upload");
    };
    let body = match read_body(request, state.config.server.max_upload_bytes) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(file) = extract_files(&body, &boundary).into_iter().next() else {
        return error_response(400, "no file in upload");
    };
    if let Some(ct) = &file.content_type {
        if !ct.to_ascii_lowercase().starts_with("image/") {
            return error_response(400, "File must be an image");
        }
    }

    match state.handle.predict_bytes(&file.bytes) {
        Ok(result) => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            state.stats.record_prediction(latency_ms);
            tracing::info!(
                file = %file.filename,
                class = %result.predicted_class_name,
                confidence = result.confidence,
                latency_ms,
                "Prediction served"
            );
            json_response(200, &PredictResponse { result, latency_ms })
        }
        Err(PredictError::Decode(e)) => error_response(400, e.to_string()),
        Err(PredictError::Model(ModelError::NotLoaded)) => error_response(503, "model is not loaded"),
        Err(PredictError::Model(e)) => {
            tracing::error!(error = %e, "Prediction failed");
            error_response(500, e.to_string())
        }
    }
}
