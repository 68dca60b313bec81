use crate::classes::{class_name, ClassCode, BARE_SPARSE};
use crate::model::PredictionResult;

/// Classes a bare/sparse tile is easily confused with.
pub const BARE_SPARSE_LOOKALIKES: [ClassCode; 4] = [20, 40, 30, 50];

/// Minimum confidence for accepting a look-alike prediction.
pub const LOOKALIKE_THRESHOLD: f64 = 0.85;

/// Outcome of comparing a claimed class with the model's prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub valid: bool,
    pub note: Option<String>,
}

/// Exact match is always valid. A `bare_sparse` claim also accepts a
/// confident look-alike prediction, with a note saying so.
pub fn judge(claimed: Option<ClassCode>, prediction: &PredictionResult) -> Verdict {
    let predicted = prediction.predicted_class;
    match claimed {
        Some(code) if code == predicted => Verdict { valid: true, note: None },
        Some(BARE_SPARSE)
            if BARE_SPARSE_LOOKALIKES.contains(&predicted)
                && prediction.confidence >= LOOKALIKE_THRESHOLD =>
        {
            Verdict {
                valid: true,
                note: Some(format!(
                    "Accepted: {} is similar to {}",
                    class_name(predicted),
                    class_name(BARE_SPARSE)
                )),
            }
        }
        _ => Verdict { valid: false, note: None },
    }
}
