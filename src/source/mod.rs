#[cfg(feature = "camera-nokhwa")]
pub mod camera;
#[cfg(test)]
pub(crate) mod mock;
pub mod rgba_converter;
pub mod synthetic;

use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    config::ReconnectPolicy,
    error::DeviceError,
    types::Frame,
};

pub use synthetic::SyntheticDevice;

/// A physical or virtual capture device. Devices are built and used on the
/// capture thread, so they need not be `Send`.
pub trait CaptureDevice {
    fn open(&mut self, index: u32) -> Result<(), DeviceError>;

    fn is_opened(&self) -> bool;

    /// Fills `frame` with the next image. `Ok(false)` means the device
    /// produced nothing this time, which the reconnect policy retries.
    fn read(&mut self, frame: &mut Frame) -> Result<bool, DeviceError>;

    fn release(&mut self);

    fn label(&self) -> String;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: u32,
    pub label: String,
    pub width: u32,
    pub height: u32,
}

/// Owns one capture device and makes reads resilient to short outages.
///
/// A read that yields no frame is retried after `policy.delay`, reopening
/// the device first if it closed, up to `policy.max_attempts` times. Past
/// that the read fails with [`DeviceError::DeviceUnavailable`].
pub struct FrameSource {
    device: Box<dyn CaptureDevice>,
    policy: ReconnectPolicy,
    clock: Arc<dyn Clock>,
    info: DeviceInfo,
    opened: bool,
}

impl FrameSource {
    pub fn new(device: Box<dyn CaptureDevice>, policy: ReconnectPolicy) -> Self {
        Self::with_clock(device, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        device: Box<dyn CaptureDevice>,
        policy: ReconnectPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let info = DeviceInfo {
            label: device.label(),
            ..DeviceInfo::default()
        };
        Self {
            device,
            policy,
            clock,
            info,
            opened: false,
        }
    }

    /// Opens the device. A no-op when it is already open.
    pub fn open(&mut self, index: u32) -> Result<(), DeviceError> {
        if self.opened && self.device.is_opened() {
            return Ok(());
        }
        self.device.open(index)?;
        self.opened = true;
        self.info.index = index;
        self.info.label = self.device.label();
        log::info!("opened capture device {index} ({})", self.info.label);
        Ok(())
    }

    pub fn is_opened(&self) -> bool {
        self.opened && self.device.is_opened()
    }

    /// Blocks until `frame` holds a new non-empty image or the reconnect
    /// budget is spent.
    pub fn read_frame(&mut self, frame: &mut Frame) -> Result<(), DeviceError> {
        if !self.device.is_opened() {
            log::warn!("capture device is not opened at this time");
        }

        let mut attempt = 1;
        loop {
            match self.device.read(frame) {
                Ok(true) if !frame.is_empty() => {
                    self.info.width = frame.width;
                    self.info.height = frame.height;
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => log::warn!("capture read failed: {err}"),
            }

            if attempt > self.policy.max_attempts {
                log::error!(
                    "no image from capture device {} after {} reconnect attempts; \
                     check that the camera is connected and working",
                    self.info.index,
                    self.policy.max_attempts
                );
                return Err(DeviceError::DeviceUnavailable {
                    attempts: self.policy.max_attempts,
                });
            }

            log::warn!(
                "couldn't retrieve image from capture device, retrying in {:.1}s ({attempt}/{})",
                self.policy.delay.as_secs_f32(),
                self.policy.max_attempts
            );
            self.clock.sleep(self.policy.delay);
            attempt += 1;

            if !self.device.is_opened() {
                match self.device.open(self.info.index) {
                    Ok(()) => self.opened = true,
                    Err(err) => log::warn!("reopening capture device failed: {err}"),
                }
            }
        }
    }

    /// Releases the device handle. Safe to call repeatedly or before `open`.
    pub fn release(&mut self) {
        if !self.opened {
            return;
        }
        self.device.release();
        self.opened = false;
        log::debug!("capture device {} released", self.info.index);
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}
