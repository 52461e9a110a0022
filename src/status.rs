//! Worker state shared with observers: the running flag, the FPS readout and
//! the latest annotated frame. Readers never wait on the capture loop beyond a
//! pointer copy.

use std::{
    io::Cursor,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use image::{DynamicImage, RgbaImage, codecs::jpeg::JpegEncoder};

use crate::{
    error::{RecognizerError, Result},
    source::DeviceInfo,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkerStatus {
    pub running: bool,
    /// Most recent block-average frame rate. Kept after the worker stops.
    pub fps: f64,
    /// Frames processed since the last successful start.
    pub frames: u64,
    pub detector_failures: u64,
    pub last_error: Option<RecognizerError>,
    pub device: Option<DeviceInfo>,
}

/// Copy-on-write status snapshot. Writers swap in a fresh `Arc`.
#[derive(Clone, Debug, Default)]
pub struct StatusCell {
    inner: Arc<RwLock<Arc<WorkerStatus>>>,
}

impl StatusCell {
    pub fn snapshot(&self) -> Arc<WorkerStatus> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut WorkerStatus)) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = WorkerStatus::clone(&slot);
        apply(&mut next);
        *slot = Arc::new(next);
    }
}

/// An annotated frame as published for display.
#[derive(Clone, Debug)]
pub struct DisplayFrame {
    pub image: RgbaImage,
    pub captured_at: Instant,
    pub sequence: u64,
}

impl DisplayFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// JPEG bytes of the frame. Alpha is dropped.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.image.clone()).to_rgb8();
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|err| RecognizerError::EncodeFailure(err.to_string()))?;
        Ok(out.into_inner())
    }
}

/// Latest display frame plus optional push notification. Watchers get a
/// one-slot channel; a watcher that has not taken the previous frame misses
/// the new one rather than stalling the capture loop.
#[derive(Clone, Default)]
pub struct DisplayBuffer {
    latest: Arc<RwLock<Option<Arc<DisplayFrame>>>>,
    watchers: Arc<Mutex<Vec<Sender<Arc<DisplayFrame>>>>>,
}

impl DisplayBuffer {
    pub fn latest(&self) -> Option<Arc<DisplayFrame>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn watch(&self) -> Receiver<Arc<DisplayFrame>> {
        let (tx, rx) = bounded(1);
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, frame: DisplayFrame) {
        let frame = Arc::new(frame);
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());

        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.retain(|tx| !matches!(tx.try_send(frame.clone()), Err(TrySendError::Disconnected(_))));
    }
}
