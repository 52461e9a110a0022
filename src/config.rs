use std::time::Duration;

pub const DEFAULT_DEVICE_INDEX: u32 = 0;
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2_000);
pub const DEFAULT_FPS_BLOCK: u32 = 8;
pub const DEFAULT_LISTENER_QUEUE_CAPACITY: usize = 64;

/// Bounded retry-with-delay applied when a device read yields no frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecognizerConfig {
    pub device_index: u32,
    pub reconnect: ReconnectPolicy,
    /// Frames per FPS block average.
    pub fps_block: u32,
    pub listener_queue_capacity: usize,
    /// Flip the published frame horizontally so it reads like a mirror.
    pub mirror_display: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            device_index: DEFAULT_DEVICE_INDEX,
            reconnect: ReconnectPolicy::default(),
            fps_block: DEFAULT_FPS_BLOCK,
            listener_queue_capacity: DEFAULT_LISTENER_QUEUE_CAPACITY,
            mirror_display: true,
        }
    }
}

impl RecognizerConfig {
    pub fn with_device_index(mut self, index: u32) -> Self {
        self.device_index = index;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_fps_block(mut self, frames: u32) -> Self {
        self.fps_block = frames.max(1);
        self
    }

    pub fn with_listener_queue_capacity(mut self, capacity: usize) -> Self {
        self.listener_queue_capacity = capacity.max(1);
        self
    }

    pub fn with_mirror_display(mut self, mirror: bool) -> Self {
        self.mirror_display = mirror;
        self
    }
}
