use std::time::Instant;

/// Block-average frame rate, recomputed once every `block` frames.
#[derive(Debug)]
pub struct FpsCounter {
    block: u32,
    count: u32,
    checkpoint: Instant,
}

impl FpsCounter {
    pub fn new(block: u32, start: Instant) -> Self {
        Self {
            block: block.max(1),
            count: 0,
            checkpoint: start,
        }
    }

    /// Counts one frame seen at `now`. On every `block`-th frame returns
    /// `block * 1000 / elapsed_ms` since the previous checkpoint and moves
    /// the checkpoint to `now`.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.count += 1;
        if self.count < self.block {
            return None;
        }

        let elapsed_ms = now.saturating_duration_since(self.checkpoint).as_secs_f64() * 1_000.0;
        self.count = 0;
        self.checkpoint = now;

        if elapsed_ms <= 0.0 {
            return None;
        }
        Some(f64::from(self.block) * 1_000.0 / elapsed_ms)
    }
}
