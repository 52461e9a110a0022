use rayon::prelude::*;

use crate::{
    gesture::Classifier,
    types::{Frame, Rect},
};

const DEFAULT_THRESHOLD: u8 = 200;
const DEFAULT_MIN_PIXELS: usize = 64;

/// Placeholder classifier: reports the bounding box of all pixels whose mean
/// channel value reaches `threshold`, if there are at least `min_pixels`.
#[derive(Clone, Debug)]
pub struct BrightnessClassifier {
    threshold: u8,
    min_pixels: usize,
}

impl BrightnessClassifier {
    pub fn new(threshold: u8, min_pixels: usize) -> Self {
        Self {
            threshold,
            min_pixels: min_pixels.max(1),
        }
    }
}

impl Default for BrightnessClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MIN_PIXELS)
    }
}

#[derive(Clone, Copy, Debug)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    count: usize,
}

impl Bounds {
    const EMPTY: Bounds = Bounds {
        min_x: u32::MAX,
        min_y: u32::MAX,
        max_x: 0,
        max_y: 0,
        count: 0,
    };

    fn merge(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            count: self.count + other.count,
        }
    }
}

impl Classifier for BrightnessClassifier {
    fn find_regions(&self, frame: &Frame) -> anyhow::Result<Vec<Rect>> {
        if !frame.is_consistent() {
            anyhow::bail!(
                "frame buffer size mismatch: got {}, expected {}x{}x4",
                frame.rgba.len(),
                frame.width,
                frame.height
            );
        }
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = u32::from(self.threshold);
        let row_len = frame.width as usize * 4;
        let bounds = frame
            .rgba
            .par_chunks_exact(row_len)
            .enumerate()
            .map(|(y, row)| {
                let mut bounds = Bounds::EMPTY;
                for (x, px) in row.chunks_exact(4).enumerate() {
                    let mean = (u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2])) / 3;
                    if mean >= threshold {
                        let (x, y) = (x as u32, y as u32);
                        bounds = bounds.merge(Bounds {
                            min_x: x,
                            min_y: y,
                            max_x: x,
                            max_y: y,
                            count: 1,
                        });
                    }
                }
                bounds
            })
            .reduce(|| Bounds::EMPTY, Bounds::merge);

        if bounds.count < self.min_pixels {
            return Ok(Vec::new());
        }

        Ok(vec![Rect::new(
            bounds.min_x as i32,
            bounds.min_y as i32,
            (bounds.max_x - bounds.min_x + 1) as i32,
            (bounds.max_y - bounds.min_y + 1) as i32,
        )])
    }
}
