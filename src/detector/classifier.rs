use std::sync::Arc;

use crate::{
    gesture::Gesture,
    overlay::{self, CENTROID_RADIUS, REGION_THICKNESS},
    types::{Frame, Rgba},
};

use super::Detector;

/// Runs a gesture's classifier over the frame, outlines every match and
/// publishes the best one to the gesture's listeners.
pub struct ClassifierDetector {
    gesture: Arc<Gesture>,
}

impl ClassifierDetector {
    pub fn new(gesture: Arc<Gesture>) -> Self {
        Self { gesture }
    }

    pub fn gesture(&self) -> &Arc<Gesture> {
        &self.gesture
    }
}

impl Detector for ClassifierDetector {
    fn detect(&self, frame: &mut Frame) -> anyhow::Result<()> {
        let regions = self.gesture.classifier().find_regions(frame)?;
        if regions.is_empty() {
            return Ok(());
        }

        for region in &regions {
            overlay::draw_region(frame, region, self.gesture.color(), REGION_THICKNESS);
            overlay::draw_circle(frame, region.center(), CENTROID_RADIUS, Rgba::YELLOW);
        }

        if let Some(event) = self.gesture.notify(&regions) {
            log::trace!("{} matched {} region(s): {event}", self.gesture.name(), regions.len());
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.gesture.is_enabled()
    }
}
