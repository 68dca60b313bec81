use serde::Serialize;

use crate::classes::{class_name, ClassCode, ReverseMapping};
use crate::error::ModelError;

/// One entry of the top-3 list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPrediction {
    pub class: String,
    pub class_code: ClassCode,
    pub confidence: f64,
}

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_class: ClassCode,
    pub predicted_class_name: String,
    pub confidence: f64,
    pub top_3: Vec<TopPrediction>,
}

/// Turns a probability vector into a [`PredictionResult`].
///
/// The winner is the first maximum. The top list is ordered by descending
/// probability; equal probabilities keep output-index order.
pub fn interpret(probabilities: &[f64], mapping: &ReverseMapping) -> Result<PredictionResult, ModelError> {
    if probabilities.len() != mapping.len() || probabilities.is_empty() {
        return Err(ModelError::Shape(format!(
            "model produced {} outputs for {} mapped classes",
            probabilities.len(),
            mapping.len()
        )));
    }

    let mut ranked: Vec<(usize, f64)> = probabilities.iter().copied().enumerate().collect();
    // sort_by is stable, so ties stay in index order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let entry = |index: usize, confidence: f64| -> Result<TopPrediction, ModelError> {
        let code = mapping
            .code_for(index)
            .ok_or_else(|| ModelError::Shape(format!("output index {} has no class code", index)))?;
        Ok(TopPrediction { class: class_name(code), class_code: code, confidence })
    };

    let top_3 = ranked
        .iter()
        .take(3)
        .map(|&(i, p)| entry(i, p))
        .collect::<Result<Vec<_>, _>>()?;
    let best = top_3[0].clone();

    Ok(PredictionResult {
        predicted_class: best.class_code,
        predicted_class_name: best.class,
        confidence: best.confidence,
        top_3,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_and_top_three_follow_probabilities() {
        let mapping = ReverseMapping::new(vec![10, 20, 60, 80]);
        let result = interpret(&[0.1, 0.2, 0.6, 0.1], &mapping).unwrap();
        assert_eq!(result.predicted_class, 60);
        assert_eq!(result.predicted_class_name, "bare_sparse");
        assert_eq!(result.confidence, 0.6);
        let codes: Vec<ClassCode> = result.top_3.iter().map(|t| t.class_code).collect();
        // 10 and 80 tie; the lower index wins.
        assert_eq!(codes, vec![60, 20, 10]);
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let mapping = ReverseMapping::new(vec![30, 40]);
        let result = interpret(&[0.5, 0.5], &mapping).unwrap();
        assert_eq!(result.predicted_class, 30);
        assert_eq!(result.top_3.len(), 2);
    }

    #[test]
    fn size_mismatch_is_a_shape_error() {
        let mapping = ReverseMapping::new(vec![10, 20, 30]);
        assert!(matches!(interpret(&[1.0, 0.0], &mapping), Err(ModelError::Shape(_))));
    }
}
