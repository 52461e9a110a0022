//! Scripted capture device for tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use super::CaptureDevice;
use crate::{error::DeviceError, types::Frame};

pub const MOCK_WIDTH: u32 = 16;
pub const MOCK_HEIGHT: u32 = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Deliver a frame.
    Frame,
    /// Read succeeds but yields nothing.
    Empty,
    /// Read returns an error.
    Error,
    /// Device closes itself and yields nothing.
    Disconnect,
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    reads: AtomicUsize,
    releases: AtomicUsize,
}

/// Observes a [`MockDevice`] after it has been moved into a source.
#[derive(Clone, Debug)]
pub struct MockTally(Arc<Counters>);

impl MockTally {
    pub fn opens(&self) -> usize {
        self.0.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.0.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.0.releases.load(Ordering::SeqCst)
    }
}

pub struct MockDevice {
    script: VecDeque<Step>,
    tail: Step,
    opened: bool,
    fail_open: bool,
    counters: Arc<Counters>,
}

impl MockDevice {
    /// Device that always delivers frames.
    pub fn new() -> (Self, MockTally) {
        Self::build(Vec::new(), Step::Frame)
    }

    /// Runs `script` first, then delivers frames forever.
    pub fn with_script(script: impl IntoIterator<Item = Step>) -> (Self, MockTally) {
        Self::build(script, Step::Frame)
    }

    /// Never delivers a frame.
    pub fn dead() -> (Self, MockTally) {
        Self::build(Vec::new(), Step::Empty)
    }

    /// Delivers `frames` frames, then nothing.
    pub fn frames_then_dead(frames: usize) -> (Self, MockTally) {
        Self::build(vec![Step::Frame; frames], Step::Empty)
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    fn build(script: impl IntoIterator<Item = Step>, tail: Step) -> (Self, MockTally) {
        let counters = Arc::new(Counters::default());
        let device = Self {
            script: script.into_iter().collect(),
            tail,
            opened: false,
            fail_open: false,
            counters: Arc::clone(&counters),
        };
        (device, MockTally(counters))
    }
}

impl CaptureDevice for MockDevice {
    fn open(&mut self, index: u32) -> Result<(), DeviceError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(DeviceError::OpenFailed {
                index,
                message: "mock device refuses to open".to_string(),
            });
        }
        self.opened = true;
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read(&mut self, frame: &mut Frame) -> Result<bool, DeviceError> {
        let read = self.counters.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front().unwrap_or(self.tail) {
            Step::Frame => {
                frame.width = MOCK_WIDTH;
                frame.height = MOCK_HEIGHT;
                frame.rgba.clear();
                frame
                    .rgba
                    .resize((MOCK_WIDTH * MOCK_HEIGHT * 4) as usize, (read % 255) as u8);
                frame.timestamp = std::time::Instant::now();
                Ok(true)
            }
            Step::Empty => Ok(false),
            Step::Error => Err(DeviceError::ReadFailed("mock read error".to_string())),
            Step::Disconnect => {
                self.opened = false;
                Ok(false)
            }
        }
    }

    fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.opened = false;
    }

    fn label(&self) -> String {
        "Mock Camera".to_string()
    }
}
