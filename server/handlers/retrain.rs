use serde_json::json;

use landcover_nn::error::StartRetrainError;

use crate::routes::{error_response, json_response, JsonResponse};
use crate::state::AppState;
use crate::util::form::{form_get, parse_form};

// ---------------------------------------------------------------------------
// POST /retrain?train_data_path=...&epochs=...
// ---------------------------------------------------------------------------

pub fn handle_start(query: &str, state: &AppState) -> JsonResponse {
    let pairs = parse_form(query);
    let path = form_get(&pairs, "train_data_path")
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| state.config.paths.upload_root.display().to_string());
    let epochs = match form_get(&pairs, "epochs").filter(|e| !e.is_empty()) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => return error_response(400, format!("epochs must be a positive integer, got '{}'", raw)),
        },
        None => None,
    };

    match state.orchestrator.start(path.as_str(), epochs) {
        Ok(_worker) => {
            let epochs = epochs.unwrap_or(state.orchestrator.defaults().epochs);
            tracing::info!(path = %path, epochs, "Retraining started");
            json_response(
                202,
                &json!({
                    "message": "Retraining started",
                    "train_data_path": path,
                    "epochs": epochs,
                }),
            )
        }
        Err(e @ StartRetrainError::Conflict) => error_response(409, e.to_string()),
        Err(e @ StartRetrainError::DatasetPathNotFound(_)) => error_response(404, e.to_string()),
        Err(e @ StartRetrainError::InvalidEpochs) => error_response(400, e.to_string()),
        Err(e @ StartRetrainError::Spawn(_)) => error_response(500, e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /training-logs
// ---------------------------------------------------------------------------

pub fn handle_logs(state: &AppState) -> JsonResponse {
    json_response(200, &state.orchestrator.status())
}
