//! The background capture loop: read a frame, run every enabled detector on
//! it in registration order, then publish the annotated frame for display.

use std::{
    any::Any,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam_channel::{Sender, bounded};
use image::{RgbaImage, imageops};

use crate::{
    clock::Clock,
    config::RecognizerConfig,
    detector::DetectorRegistry,
    error::{DeviceError, RecognizerError, Result},
    fps::FpsCounter,
    source::FrameSource,
    status::{DisplayBuffer, DisplayFrame, StatusCell, WorkerStatus},
    types::Frame,
};

/// Builds and opens the frame source. Runs on the worker thread, since some
/// camera backends must stay on the thread that opened them.
pub type SourceOpener = Box<dyn FnOnce() -> std::result::Result<FrameSource, DeviceError> + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    /// Capture thread spawned, device still opening.
    Starting,
    Running,
    Cancelling,
    /// Terminal. A stopped worker is never restarted.
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerOptions {
    pub fps_block: u32,
    pub mirror_display: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::from(&RecognizerConfig::default())
    }
}

impl From<&RecognizerConfig> for WorkerOptions {
    fn from(config: &RecognizerConfig) -> Self {
        Self {
            fps_block: config.fps_block,
            mirror_display: config.mirror_display,
        }
    }
}

struct Job {
    open: SourceOpener,
    registry: DetectorRegistry,
    status: StatusCell,
    display: DisplayBuffer,
    options: WorkerOptions,
    clock: Arc<dyn Clock>,
}

struct Shared {
    state: Mutex<WorkerState>,
    cancel: AtomicBool,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct RecognitionWorker {
    shared: Arc<Shared>,
    job: Mutex<Option<Job>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RecognitionWorker {
    pub fn new(
        open: SourceOpener,
        registry: DetectorRegistry,
        status: StatusCell,
        display: DisplayBuffer,
        options: WorkerOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(WorkerState::Idle),
                cancel: AtomicBool::new(false),
            }),
            job: Mutex::new(Some(Job {
                open,
                registry,
                status,
                display,
                options,
                clock,
            })),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state()
    }

    /// Spawns the capture thread and waits until the device is open. The
    /// state lock is not held while waiting, so `state` and `cancel` stay
    /// responsive; a cancel that arrives during the open stops the worker
    /// before its first frame.
    ///
    /// Returns `Ok(false)` without doing anything when the worker has already
    /// been started or has stopped. An open failure leaves the worker `Stopped`.
    pub fn start(&self) -> Result<bool> {
        let (ready_tx, ready_rx) = bounded(1);
        {
            let mut state = self.shared.state();
            match *state {
                WorkerState::Idle => {}
                WorkerState::Starting | WorkerState::Running | WorkerState::Cancelling => {
                    return Ok(false);
                }
                WorkerState::Stopped => {
                    log::warn!("recognition worker already stopped; create a new one to restart");
                    return Ok(false);
                }
            }
            let Some(job) = self.job.lock().unwrap_or_else(PoisonError::into_inner).take() else {
                return Ok(false);
            };

            let shared = self.shared.clone();
            let handle = thread::Builder::new()
                .name("gesture-recognition".to_string())
                .spawn(move || run(job, shared, ready_tx))
                .map_err(|err| {
                    *state = WorkerState::Stopped;
                    RecognizerError::ThreadSpawn(format!("recognition worker: {err}"))
                })?;
            *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            *state = WorkerState::Starting;
        }

        let opened = ready_rx.recv();

        if matches!(opened, Ok(Ok(()))) {
            let mut state = self.shared.state();
            // A cancel during the open, or a run that already ended, wins.
            if *state == WorkerState::Starting {
                *state = WorkerState::Running;
            }
            return Ok(true);
        }

        self.join();
        *self.shared.state() = WorkerState::Stopped;
        match opened {
            Ok(Err(err)) => Err(err.into()),
            _ => Err(RecognizerError::ThreadSpawn(
                "recognition worker exited before opening the device".to_string(),
            )),
        }
    }

    /// Asks the loop to stop after the current cycle. Returns immediately;
    /// use [`join`](Self::join) to wait.
    pub fn cancel(&self) {
        let mut state = self.shared.state();
        self.shared.cancel.store(true, Ordering::SeqCst);
        match *state {
            WorkerState::Starting | WorkerState::Running => *state = WorkerState::Cancelling,
            WorkerState::Idle => {
                // Never started: drop the opener so no device gets touched.
                self.job.lock().unwrap_or_else(PoisonError::into_inner).take();
                *state = WorkerState::Stopped;
            }
            WorkerState::Cancelling | WorkerState::Stopped => {}
        }
    }

    pub fn join(&self) {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("recognition worker thread panicked");
                *self.shared.state() = WorkerState::Stopped;
            }
        }
    }
}

impl Drop for RecognitionWorker {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}

fn run(job: Job, shared: Arc<Shared>, ready: Sender<std::result::Result<(), DeviceError>>) {
    let Job {
        open,
        registry,
        status,
        display,
        options,
        clock,
    } = job;

    let mut source = match open() {
        Ok(source) => source,
        Err(err) => {
            log::error!("{err}");
            status.update(|s| {
                s.running = false;
                s.last_error = Some(err.clone().into());
            });
            *shared.state() = WorkerState::Stopped;
            let _ = ready.send(Err(err));
            return;
        }
    };

    let device = source.info().clone();
    status.update(|s| {
        *s = WorkerStatus {
            running: true,
            device: Some(device),
            ..WorkerStatus::default()
        }
    });
    let _ = ready.send(Ok(()));
    drop(ready);

    log::info!("recognition worker running on {}", source.info().label);
    let outcome = capture_loop(
        &mut source,
        &registry,
        &status,
        &display,
        options,
        clock.as_ref(),
        &shared.cancel,
    );
    source.release();

    match outcome {
        Ok(()) => {
            log::info!("recognition worker cancelled");
            status.update(|s| s.running = false);
        }
        Err(err) => {
            log::error!("recognition worker stopped: {err}");
            status.update(|s| {
                s.running = false;
                s.last_error = Some(err);
            });
        }
    }
    *shared.state() = WorkerState::Stopped;
}

fn capture_loop(
    source: &mut FrameSource,
    registry: &DetectorRegistry,
    status: &StatusCell,
    display: &DisplayBuffer,
    options: WorkerOptions,
    clock: &dyn Clock,
    cancel: &AtomicBool,
) -> Result<()> {
    let mut frame = Frame::empty();
    let mut fps = FpsCounter::new(options.fps_block, clock.now());
    let mut sequence = 0u64;

    while !cancel.load(Ordering::SeqCst) {
        source.read_frame(&mut frame)?;
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        sequence += 1;
        let reading = fps.tick(clock.now());

        let failures = run_detectors(registry, &mut frame);
        publish_display(&mut frame, sequence, options.mirror_display, display)?;

        let device = (sequence == 1).then(|| source.info().clone());
        status.update(|s| {
            s.frames = sequence;
            s.detector_failures += failures;
            if let Some(fps) = reading {
                s.fps = fps;
            }
            if device.is_some() {
                s.device = device;
            }
        });
    }
    Ok(())
}

/// Runs each enabled detector once on `frame`. A detector that errors or
/// panics is logged and skipped; the rest still run. Returns the failure count.
fn run_detectors(registry: &DetectorRegistry, frame: &mut Frame) -> u64 {
    let mut failures = 0;
    for (name, detector) in registry.enabled_snapshot() {
        if !detector.is_enabled() {
            continue;
        }
        let message = match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(frame))) {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => format!("{err:#}"),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        failures += 1;
        log::warn!("{}", RecognizerError::DetectorFailure { name, message });
    }
    failures
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Hands the frame's pixels to the display buffer, mirrored if requested.
/// Leaves `frame.rgba` empty for the next read to refill.
fn publish_display(
    frame: &mut Frame,
    sequence: u64,
    mirror: bool,
    display: &DisplayBuffer,
) -> Result<()> {
    let rgba = mem::take(&mut frame.rgba);
    let len = rgba.len();
    let mut image = RgbaImage::from_raw(frame.width, frame.height, rgba).ok_or_else(|| {
        RecognizerError::EncodeFailure(format!(
            "{len} bytes do not hold a {}x{} RGBA image",
            frame.width, frame.height
        ))
    })?;
    if mirror {
        imageops::flip_horizontal_in_place(&mut image);
    }
    display.publish(DisplayFrame {
        image,
        captured_at: frame.timestamp,
        sequence,
    });
    Ok(())
}
