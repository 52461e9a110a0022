use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    clock::{Clock, SystemClock},
    config::RecognizerConfig,
    detector::{Detector, DetectorEntry, DetectorRegistry},
    error::Result,
    source::{CaptureDevice, FrameSource},
    status::{DisplayBuffer, DisplayFrame, StatusCell, WorkerStatus},
    worker::{RecognitionWorker, SourceOpener, WorkerOptions, WorkerState},
};

/// Creates a fresh, unopened capture device for each run.
pub type DeviceFactory = Arc<dyn Fn() -> Box<dyn CaptureDevice> + Send + Sync>;

/// Owns the detector registry and at most one running capture worker.
///
/// Every [`start`](Self::start) stops the previous worker first and opens a new
/// device, so a recognizer can be restarted after its worker gave up.
pub struct Recognizer {
    config: RecognizerConfig,
    factory: DeviceFactory,
    clock: Arc<dyn Clock>,
    registry: DetectorRegistry,
    status: StatusCell,
    display: DisplayBuffer,
    worker: Mutex<Option<Arc<RecognitionWorker>>>,
}

impl Recognizer {
    pub fn new<F>(config: RecognizerConfig, factory: F) -> Self
    where
        F: Fn() -> Box<dyn CaptureDevice> + Send + Sync + 'static,
    {
        Self::with_clock(config, factory, Arc::new(SystemClock))
    }

    pub fn with_clock<F>(config: RecognizerConfig, factory: F, clock: Arc<dyn Clock>) -> Self
    where
        F: Fn() -> Box<dyn CaptureDevice> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Arc::new(factory),
            clock,
            registry: DetectorRegistry::new(),
            status: StatusCell::default(),
            display: DisplayBuffer::default(),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Registers an enabled detector.
    pub fn register_detector(
        &self,
        name: impl Into<String>,
        detector: Arc<dyn Detector>,
    ) -> Result<()> {
        self.registry.register(name, detector, true)
    }

    pub fn register_detector_with(
        &self,
        name: impl Into<String>,
        detector: Arc<dyn Detector>,
        enabled: bool,
    ) -> Result<()> {
        self.registry.register(name, detector, enabled)
    }

    pub fn unregister_detector(&self, name: &str) -> Result<DetectorEntry> {
        self.registry.unregister(name)
    }

    /// Takes effect from the next captured frame.
    pub fn set_detector_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.registry.set_enabled(name, enabled)
    }

    pub fn detector_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    /// Stops any running worker, then starts a new one on a fresh device.
    /// Fails if the device cannot be opened; the error is also recorded in
    /// [`status`](Self::status).
    ///
    /// Blocks while the device opens, but holds no lock meanwhile: status
    /// reads go through and a concurrent [`stop`](Self::stop) cancels the
    /// pending run.
    pub fn start(&self) -> Result<()> {
        let worker = Arc::new(RecognitionWorker::new(
            self.source_opener(),
            self.registry.clone(),
            self.status.clone(),
            self.display.clone(),
            WorkerOptions::from(&self.config),
            self.clock.clone(),
        ));
        let previous = self.worker_slot().replace(worker.clone());
        if let Some(previous) = previous {
            shutdown(&previous);
        }

        if let Err(err) = worker.start() {
            let mut slot = self.worker_slot();
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &worker)) {
                slot.take();
            }
            return Err(err);
        }
        Ok(())
    }

    /// Cancels the worker and waits for it to release the device. Safe to
    /// call when nothing is running.
    pub fn stop(&self) {
        let previous = self.worker_slot().take();
        if let Some(worker) = previous {
            shutdown(&worker);
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker_slot()
            .as_ref()
            .is_some_and(|worker| worker.state() == WorkerState::Running)
    }

    pub fn status(&self) -> Arc<WorkerStatus> {
        self.status.snapshot()
    }

    pub fn latest_frame(&self) -> Option<Arc<DisplayFrame>> {
        self.display.latest()
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }

    fn source_opener(&self) -> SourceOpener {
        let factory = self.factory.clone();
        let policy = self.config.reconnect;
        let clock = self.clock.clone();
        let index = self.config.device_index;
        Box::new(move || {
            let mut source = FrameSource::with_clock(factory(), policy, clock);
            source.open(index)?;
            Ok(source)
        })
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<Arc<RecognitionWorker>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn shutdown(worker: &RecognitionWorker) {
    worker.cancel();
    worker.join();
}

impl Drop for Recognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        error::{DeviceError, RecognizerError},
        source::mock::{MockDevice, MockTally},
        types::Frame,
    };
    use std::{
        thread,
        time::{Duration, Instant},
    };

    struct Noop;

    impl Detector for Noop {
        fn detect(&self, _frame: &mut Frame) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Recognizer whose factory hands out devices built by `make`, keeping a
    /// tally for each one.
    fn recognizer(
        make: fn() -> (MockDevice, MockTally),
    ) -> (Recognizer, Arc<Mutex<Vec<MockTally>>>) {
        let tallies = Arc::new(Mutex::new(Vec::new()));
        let sink = tallies.clone();
        let recognizer = Recognizer::with_clock(
            RecognizerConfig::default(),
            move || {
                let (device, tally) = make();
                sink.lock().unwrap().push(tally);
                Box::new(device) as Box<dyn CaptureDevice>
            },
            Arc::new(ManualClock::new()),
        );
        (recognizer, tallies)
    }

    fn wait_until(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (recognizer, _) = recognizer(MockDevice::new);
        recognizer.register_detector("open", Arc::new(Noop)).unwrap();
        assert_eq!(
            recognizer.register_detector("open", Arc::new(Noop)),
            Err(RecognizerError::DuplicateName("open".to_string()))
        );
        recognizer
            .register_detector_with("closed", Arc::new(Noop), false)
            .unwrap();
        assert_eq!(recognizer.detector_names(), vec!["open", "closed"]);
        assert_eq!(recognizer.registry().is_enabled("closed"), Some(false));

        recognizer.set_detector_enabled("closed", true).unwrap();
        assert_eq!(
            recognizer.set_detector_enabled("missing", true),
            Err(RecognizerError::UnknownDetector("missing".to_string()))
        );
        recognizer.unregister_detector("open").unwrap();
        assert_eq!(recognizer.detector_names(), vec!["closed"]);
    }

    #[test]
    fn restart_replaces_the_worker_and_device() {
        let (recognizer, tallies) = recognizer(MockDevice::new);

        recognizer.start().unwrap();
        assert!(recognizer.is_running());
        recognizer.start().unwrap();
        assert!(recognizer.is_running());
        wait_until(|| recognizer.status().frames > 0);

        recognizer.stop();
        assert!(!recognizer.is_running());
        assert!(!recognizer.status().running);
        assert!(recognizer.latest_frame().is_some());

        let tallies = tallies.lock().unwrap();
        assert_eq!(tallies.len(), 2);
        for tally in tallies.iter() {
            assert_eq!(tally.opens(), 1);
            assert_eq!(tally.releases(), 1);
        }
    }

    #[test]
    fn open_failure_surfaces_from_start() {
        let (recognizer, _) = recognizer(|| {
            let (device, tally) = MockDevice::new();
            (device.failing_open(), tally)
        });

        let err = recognizer.start().unwrap_err();
        assert!(matches!(
            err,
            RecognizerError::DeviceUnavailable(DeviceError::OpenFailed { .. })
        ));
        assert!(!recognizer.is_running());
        assert_eq!(recognizer.status().last_error, Some(err));
    }

    #[test]
    fn recovers_with_a_new_start_after_the_device_died() {
        let (recognizer, tallies) = recognizer(|| MockDevice::frames_then_dead(2));

        recognizer.start().unwrap();
        wait_until(|| !recognizer.status().running);
        let status = recognizer.status();
        assert_eq!(status.frames, 2);
        assert!(status.last_error.is_some());
        assert!(!recognizer.is_running());

        recognizer.start().unwrap();
        wait_until(|| !recognizer.status().running);
        assert_eq!(tallies.lock().unwrap().len(), 2);
    }

    #[test]
    fn readers_and_stop_are_not_held_up_by_a_slow_open() {
        let tallies = Arc::new(Mutex::new(Vec::new()));
        let sink = tallies.clone();
        let recognizer = Arc::new(Recognizer::with_clock(
            RecognizerConfig::default(),
            move || {
                thread::sleep(Duration::from_millis(400));
                let (device, tally) = MockDevice::new();
                sink.lock().unwrap().push(tally);
                Box::new(device) as Box<dyn CaptureDevice>
            },
            Arc::new(ManualClock::new()),
        ));

        let starter = {
            let recognizer = recognizer.clone();
            thread::spawn(move || recognizer.start())
        };
        thread::sleep(Duration::from_millis(50));

        let asked = Instant::now();
        assert!(!recognizer.is_running());
        let _ = recognizer.status();
        assert!(asked.elapsed() < Duration::from_millis(200));

        recognizer.stop();
        starter.join().unwrap().unwrap();
        assert!(!recognizer.is_running());
        assert!(!recognizer.status().running);
        let tallies = tallies.lock().unwrap();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].releases(), 1);
    }

    #[test]
    fn stop_without_start_is_harmless() {
        let (recognizer, tallies) = recognizer(MockDevice::new);
        recognizer.stop();
        recognizer.stop();
        assert!(tallies.lock().unwrap().is_empty());
        assert_eq!(*recognizer.status(), WorkerStatus::default());
    }
}
