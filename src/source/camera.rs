use anyhow::anyhow;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use super::{
    CaptureDevice,
    rgba_converter::{self, PixelFormat},
};
use crate::{error::DeviceError, types::Frame};

// Built-in macOS cameras often reject YUYV even though it is advertised, so
// the raw formats come first.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Anything nokhwa can decode, still favouring frame rate since some
        // drivers default to 15 FPS.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: u32,
    pub label: String,
}

pub fn available_cameras() -> anyhow::Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .filter_map(|info| {
            let index = info.index().as_index().ok()?;
            Some(CameraDevice {
                index,
                label: info.human_name(),
            })
        })
        .collect())
}

fn build_camera(index: u32) -> anyhow::Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(CameraIndex::Index(index), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

fn pixel_format(format: FrameFormat) -> PixelFormat {
    match format {
        FrameFormat::NV12 => PixelFormat::Nv12,
        FrameFormat::YUYV => PixelFormat::Yuyv,
        FrameFormat::MJPEG => PixelFormat::Mjpeg,
        FrameFormat::RAWRGB => PixelFormat::Rgb,
        FrameFormat::RAWBGR => PixelFormat::Bgr,
        FrameFormat::GRAY => PixelFormat::Gray,
    }
}

/// The part of a camera handle the reopen path needs.
trait StreamHandle {
    fn is_stream_open(&self) -> bool;
    fn open_stream(&mut self) -> anyhow::Result<()>;
}

impl StreamHandle for Camera {
    fn is_stream_open(&self) -> bool {
        Camera::is_stream_open(self)
    }

    fn open_stream(&mut self) -> anyhow::Result<()> {
        Camera::open_stream(self).map_err(Into::into)
    }
}

/// Leaves `slot` holding a handle with a running stream. A handle whose
/// stream stopped is restarted first; if that fails it is discarded and a
/// new one is built.
fn ensure_streaming<C: StreamHandle>(
    slot: &mut Option<C>,
    build: impl FnOnce() -> anyhow::Result<C>,
) -> anyhow::Result<()> {
    if let Some(handle) = slot.as_mut() {
        if handle.is_stream_open() {
            return Ok(());
        }
        match handle.open_stream() {
            Ok(()) => return Ok(()),
            Err(err) => {
                log::warn!("restarting camera stream failed, rebuilding camera: {err:#}");
                *slot = None;
            }
        }
    }
    *slot = Some(build()?);
    Ok(())
}

/// A native camera opened through nokhwa.
#[derive(Default)]
pub struct NokhwaDevice {
    camera: Option<Camera>,
    label: Option<String>,
}

impl NokhwaDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureDevice for NokhwaDevice {
    fn open(&mut self, index: u32) -> Result<(), DeviceError> {
        ensure_streaming(&mut self.camera, || build_camera(index)).map_err(|err| {
            DeviceError::OpenFailed {
                index,
                message: format!("{err:#}"),
            }
        })?;
        if let Some(camera) = &self.camera {
            self.label = Some(camera.info().human_name());
        }
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.camera
            .as_ref()
            .is_some_and(|camera| camera.is_stream_open())
    }

    fn read(&mut self, frame: &mut Frame) -> Result<bool, DeviceError> {
        let camera = self.camera.as_mut().ok_or(DeviceError::NotOpened)?;
        let buffer = camera
            .frame()
            .map_err(|err| DeviceError::ReadFailed(err.to_string()))?;
        if buffer.buffer().is_empty() {
            return Ok(false);
        }

        let resolution = buffer.resolution();
        rgba_converter::convert_into(
            frame,
            buffer.buffer(),
            resolution.width_x,
            resolution.height_y,
            pixel_format(buffer.source_frame_format()),
        )
        .map_err(|err| DeviceError::ReadFailed(format!("{err:#}")))?;
        Ok(true)
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err}");
            }
        }
    }

    fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| "camera".to_string())
    }
}
