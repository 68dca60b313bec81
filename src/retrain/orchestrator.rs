use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::Local;

use crate::error::{RetrainError, StartRetrainError};
use crate::model::ModelHandle;
use crate::retrain::params::{RetrainParams, RetrainSummary};
use crate::retrain::run::{epoch_progress, TrainingRun, TrainingStatus};

/// Runs retraining in the background and exposes its progress.
///
/// At most one run is active. The status check and the transition to
/// `training` happen under one lock, so a second request can never reset
/// a run that is already underway.
#[derive(Clone)]
pub struct RetrainOrchestrator {
    handle: Arc<ModelHandle>,
    run: Arc<Mutex<TrainingRun>>,
    defaults: RetrainParams,
}

impl RetrainOrchestrator {
    pub fn new(handle: Arc<ModelHandle>, defaults: RetrainParams) -> RetrainOrchestrator {
        RetrainOrchestrator {
            handle,
            run: Arc::new(Mutex::new(TrainingRun::default())),
            defaults,
        }
    }

    pub fn handle(&self) -> &Arc<ModelHandle> {
        &self.handle
    }

    pub fn defaults(&self) -> &RetrainParams {
        &self.defaults
    }

    /// Snapshot of the current run for pollers.
    pub fn status(&self) -> TrainingRun {
        self.lock_run().clone()
    }

    /// Starts a run on `dataset`. Returns the worker's join handle; callers
    /// that only poll [`status`](Self::status) may drop it.
    pub fn start(
        &self,
        dataset: impl Into<PathBuf>,
        epochs: Option<usize>,
    ) -> Result<JoinHandle<()>, StartRetrainError> {
        let dataset = dataset.into();
        let params = RetrainParams {
            epochs: epochs.unwrap_or(self.defaults.epochs),
            ..self.defaults.clone()
        };
        if params.epochs == 0 {
            return Err(StartRetrainError::InvalidEpochs);
        }
        if !dataset.exists() {
            return Err(StartRetrainError::DatasetPathNotFound(dataset));
        }

        {
            let mut run = self.lock_run();
            if run.is_active() {
                tracing::warn!(dataset = %dataset.display(), "Retrain rejected: a run is already in progress");
                return Err(StartRetrainError::Conflict);
            }
            *run = TrainingRun::started();
        }

        let sink = RunSink { run: Arc::clone(&self.run) };
        let message = format!("Starting retraining on {} for {} epochs", dataset.display(), params.epochs);
        tracing::info!(dataset = %dataset.display(), epochs = params.epochs, "{}", message);
        sink.log(&message);

        let handle = Arc::clone(&self.handle);
        self.spawn_worker(sink, move |sink: &RunSink| {
            handle.retrain(
                &dataset,
                &params,
                &|line: &str| sink.log(line),
                &|epoch: usize, total: usize| sink.progress(epoch, total),
            )
        })
    }

    /// Runs `job` on the worker thread and records how it ended. A panic
    /// inside the job fails the run like any other error, so the run never
    /// stays in `training`.
    fn spawn_worker<F>(&self, sink: RunSink, job: F) -> Result<JoinHandle<()>, StartRetrainError>
    where
        F: FnOnce(&RunSink) -> Result<RetrainSummary, RetrainError> + Send + 'static,
    {
        let worker_sink = sink.clone();
        let spawned = thread::Builder::new()
            .name("retrain".to_owned())
            .spawn(move || {
                let sink = worker_sink;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&sink)))
                    .unwrap_or_else(|payload| Err(RetrainError::Panicked(panic_message(payload.as_ref()))));
                match outcome {
                    Ok(summary) => {
                        tracing::info!(version = summary.model_version, "Retraining completed successfully");
                        sink.log("Retraining completed successfully");
                        let mut run = sink.lock();
                        run.status = TrainingStatus::Completed;
                        run.progress = 100;
                        run.result = Some(summary);
                    }
                    Err(err) => sink.fail(&err.to_string()),
                }
            });

        spawned.map_err(|err| {
            sink.fail(&format!("could not start worker: {}", err));
            StartRetrainError::Spawn(err)
        })
    }

    fn lock_run(&self) -> MutexGuard<'_, TrainingRun> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Log and progress sinks feeding one [`TrainingRun`].
#[derive(Clone)]
struct RunSink {
    run: Arc<Mutex<TrainingRun>>,
}

impl RunSink {
    fn lock(&self) -> MutexGuard<'_, TrainingRun> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a timestamped line to the run log.
    fn log(&self, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        self.lock().logs.push(line);
    }

    fn progress(&self, epoch: usize, total: usize) {
        self.lock().progress = epoch_progress(epoch, total);
    }

    fn fail(&self, error: &str) {
        tracing::error!(error = %error, "Retraining failed");
        self.log(&format!("Error: {}", error));
        let mut run = self.lock();
        run.status = TrainingStatus::Failed;
        run.error = Some(error.to_owned());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_owned());
    format!("worker panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ReverseMapping;
    use crate::model::{ModelPaths, ModelStore};
    use crate::network::{Network, NetworkSpec};
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::tempdir;

    fn orchestrator() -> (tempfile::TempDir, RetrainOrchestrator) {
        let dir = tempdir().unwrap();
        let paths = ModelPaths::new(dir.path().join("models"));
        let network = Network::from_spec(&NetworkSpec::landcover(2, 2), &mut StdRng::seed_from_u64(3));
        ModelStore::new(paths.clone())
            .install(&network, &ReverseMapping::new(vec![10, 80]), false)
            .unwrap();
        let handle = Arc::new(ModelHandle::load(paths).unwrap());
        (dir, RetrainOrchestrator::new(handle, RetrainParams::with_epochs(1)))
    }

    #[test]
    fn request_during_training_is_rejected_without_reset() {
        let (dir, orch) = orchestrator();
        {
            let mut run = orch.lock_run();
            run.status = TrainingStatus::Training;
            run.progress = 42;
            run.logs = vec!["[10:00:00] Epoch 4/10".to_owned()];
        }
        let before = orch.status();

        let err = orch.start(dir.path(), Some(3)).unwrap_err();
        assert!(matches!(err, StartRetrainError::Conflict));
        assert_eq!(orch.status(), before);
    }

    #[test]
    fn missing_dataset_and_zero_epochs_are_refused_up_front() {
        let (dir, orch) = orchestrator();
        assert!(matches!(
            orch.start(dir.path().join("nope"), None).unwrap_err(),
            StartRetrainError::DatasetPathNotFound(_)
        ));
        assert!(matches!(
            orch.start(dir.path(), Some(0)).unwrap_err(),
            StartRetrainError::InvalidEpochs
        ));
        assert_eq!(orch.status().status, TrainingStatus::Idle);
    }

    #[test]
    fn insufficient_data_fails_the_run() {
        let (dir, orch) = orchestrator();
        let data = dir.path().join("data");
        std::fs::create_dir_all(data.join("trees")).unwrap();

        orch.start(&data, None).unwrap().join().unwrap();
        let run = orch.status();
        assert_eq!(run.status, TrainingStatus::Failed);
        assert!(run.error.unwrap().contains("at least 2 classes"));
        assert!(run.logs.iter().all(|l| l.starts_with('[')));
        assert!(run.logs.last().unwrap().contains("Error:"));
    }

    #[test]
    fn panicking_worker_fails_the_run_and_frees_the_slot() {
        let (dir, orch) = orchestrator();
        *orch.lock_run() = TrainingRun::started();
        let sink = RunSink { run: Arc::clone(&orch.run) };
        orch.spawn_worker(sink, |_: &RunSink| panic!("weights out of shape"))
            .unwrap()
            .join()
            .unwrap();

        let run = orch.status();
        assert_eq!(run.status, TrainingStatus::Failed);
        let error = run.error.unwrap();
        assert!(error.contains("panicked") && error.contains("weights out of shape"), "{}", error);
        assert!(run.logs.last().unwrap().contains("Error: worker panicked"));

        let data = dir.path().join("data");
        std::fs::create_dir_all(data.join("trees")).unwrap();
        orch.start(&data, None).unwrap().join().unwrap();
        assert_eq!(orch.status().status, TrainingStatus::Failed);
        assert!(orch.status().error.unwrap().contains("at least 2 classes"));
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn each_epoch_reaches_tracing_once() {
        let (dir, orch) = orchestrator();
        let data = dir.path().join("data");
        for (folder, colour) in [("trees", [20, 140, 30]), ("water", [20, 40, 200])] {
            std::fs::create_dir_all(data.join(folder)).unwrap();
            for i in 0..2 {
                image::RgbImage::from_pixel(8, 8, image::Rgb(colour))
                    .save(data.join(folder).join(format!("{}.png", i)))
                    .unwrap();
            }
        }

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let sink = RunSink { run: Arc::clone(&orch.run) };
        tracing::subscriber::with_default(subscriber, || {
            orch.handle()
                .retrain(
                    &data,
                    &RetrainParams::with_epochs(1),
                    &|line: &str| sink.log(line),
                    &|_: usize, _: usize| {},
                )
                .unwrap();
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("Epoch 1/1").count(), 1, "{}", output);
        assert!(output.contains("Loading training data"));
        assert_eq!(sink.lock().logs.iter().filter(|l| l.contains("Epoch 1/1")).count(), 1);
    }
}
