use serde::Serialize;

use crate::retrain::params::RetrainSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingStatus {
    Idle,
    Training,
    Completed,
    Failed,
}

/// Observable state of the current (or most recent) retraining run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRun {
    pub status: TrainingStatus,
    /// 0–100.
    pub progress: u8,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RetrainSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for TrainingRun {
    fn default() -> Self {
        TrainingRun {
            status: TrainingStatus::Idle,
            progress: 0,
            logs: Vec::new(),
            result: None,
            error: None,
        }
    }
}

impl TrainingRun {
    pub(crate) fn started() -> TrainingRun {
        TrainingRun { status: TrainingStatus::Training, ..TrainingRun::default() }
    }

    pub fn is_active(&self) -> bool {
        self.status == TrainingStatus::Training
    }
}

/// Epoch progress scaled to 0–95; the rest is reserved for the save step.
pub fn epoch_progress(epoch: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (epoch.min(total) * 95 / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_tops_out_at_95() {
        assert_eq!(epoch_progress(0, 10), 0);
        assert_eq!(epoch_progress(1, 3), 31);
        assert_eq!(epoch_progress(3, 3), 95);
        assert_eq!(epoch_progress(7, 3), 95);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(TrainingRun::started()).unwrap();
        assert_eq!(json["status"], "training");
        assert_eq!(json["progress"], 0);
        assert!(json.get("result").is_none());
    }
}
