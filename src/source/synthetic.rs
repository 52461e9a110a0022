use std::{thread, time::Duration};

use super::{
    CaptureDevice,
    rgba_converter::{self, PixelFormat},
};
use crate::{error::DeviceError, types::Frame};

const BACKGROUND_LUMA: u8 = 24;
const SQUARE_LUMA: u8 = 240;
const NEUTRAL_CHROMA: u8 = 128;

/// Hardware-free camera: a dark YUYV scene with a bright square sweeping
/// left and right, decoded like a real device's frames.
pub struct SyntheticDevice {
    width: u32,
    height: u32,
    square: u32,
    frame_interval: Duration,
    sequence: u64,
    opened: bool,
    yuyv: Vec<u8>,
}

impl SyntheticDevice {
    pub fn new(width: u32, height: u32) -> Self {
        // YUYV packs pixel pairs.
        let width = (width.max(2) + 1) & !1;
        let height = height.max(1);
        Self {
            width,
            height,
            square: (width.min(height) / 4).max(1),
            frame_interval: Duration::from_millis(33),
            sequence: 0,
            opened: false,
            yuyv: Vec::new(),
        }
    }

    /// Time each read blocks for, pacing the stream like a real camera.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_square(mut self, side: u32) -> Self {
        self.square = side.clamp(1, self.width.min(self.height));
        self
    }

    /// Top-left corner of the square in frame `sequence`.
    pub fn square_origin(&self, sequence: u64) -> (u32, u32) {
        let travel = u64::from(self.width - self.square);
        let x = if travel == 0 {
            0
        } else {
            let phase = (sequence * 4) % (travel * 2);
            if phase <= travel { phase } else { travel * 2 - phase }
        };
        (x as u32, (self.height - self.square) / 2)
    }

    fn render(&mut self) {
        let (sx, sy) = self.square_origin(self.sequence);
        let (ex, ey) = (sx + self.square, sy + self.square);
        let row_len = self.width as usize * 2;
        self.yuyv.resize(row_len * self.height as usize, 0);

        for (y, row) in self.yuyv.chunks_exact_mut(row_len).enumerate() {
            let y = y as u32;
            for (pair, px) in row.chunks_exact_mut(4).enumerate() {
                let x0 = pair as u32 * 2;
                let luma = |x: u32| {
                    if x >= sx && x < ex && y >= sy && y < ey {
                        SQUARE_LUMA
                    } else {
                        BACKGROUND_LUMA
                    }
                };
                px.copy_from_slice(&[luma(x0), NEUTRAL_CHROMA, luma(x0 + 1), NEUTRAL_CHROMA]);
            }
        }
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl CaptureDevice for SyntheticDevice {
    fn open(&mut self, _index: u32) -> Result<(), DeviceError> {
        self.opened = true;
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read(&mut self, frame: &mut Frame) -> Result<bool, DeviceError> {
        if !self.opened {
            return Err(DeviceError::NotOpened);
        }
        if !self.frame_interval.is_zero() {
            thread::sleep(self.frame_interval);
        }

        self.render();
        rgba_converter::convert_into(frame, &self.yuyv, self.width, self.height, PixelFormat::Yuyv)
            .map_err(|err| DeviceError::ReadFailed(format!("{err:#}")))?;
        self.sequence += 1;
        Ok(true)
    }

    fn release(&mut self) {
        self.opened = false;
    }

    fn label(&self) -> String {
        format!("Synthetic {}x{}", self.width, self.height)
    }
}
