use tiny_http::Request;

use landcover_nn::ingest::UploadedFile;

use crate::routes::{error_response, json_response, read_body, request_header, JsonResponse};
use crate::state::AppState;
use crate::util::multipart::{extract_boundary, extract_files};

// ---------------------------------------------------------------------------
// POST /upload-bulk
// ---------------------------------------------------------------------------

pub fn handle(request: &mut Request, state: &AppState) -> JsonResponse {
    let content_type = request_header(request, "Content-Type").unwrap_or_default();
    let Some(boundary) = extract_boundary(&content_type) else {
        return error_response(400, "expected a multipart/form-data upload");
    };
    let body = match read_body(request, state.config.server.max_upload_bytes) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let files: Vec<UploadedFile> = extract_files(&body, &boundary)
        .into_iter()
        .map(|part| UploadedFile {
            filename: part.filename,
            content_type: part.content_type,
            bytes: part.bytes,
        })
        .collect();
    if files.is_empty() {
        return error_response(400, "no files in upload");
    }

    match state.ingestor.ingest(&state.handle, &files) {
        Ok(report) => {
            tracing::info!(
                batch = %report.batch_id,
                total = report.total_files,
                valid = report.valid_files,
                "Bulk upload processed"
            );
            json_response(200, &report)
        }
        Err(e) => {
            tracing::error!(error = %e, "Bulk upload failed");
            error_response(500, e.to_string())
        }
    }
}
