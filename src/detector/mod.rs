mod brightness;
mod classifier;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    error::{RecognizerError, Result},
    types::Frame,
};

pub use brightness::BrightnessClassifier;
pub use classifier::ClassifierDetector;

/// Inspects one frame for a visual pattern.
///
/// Implementations may annotate `frame` in place and publish events through
/// their own listeners; nothing is returned synchronously. The frame must not
/// be retained past the call.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &mut Frame) -> anyhow::Result<()>;

    /// The detector's own switch, checked alongside the registry flag.
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct DetectorEntry {
    pub name: String,
    pub detector: Arc<dyn Detector>,
    pub enabled: bool,
}

/// Name-keyed detector registry shared between the UI side and the worker.
///
/// Entries keep registration order. The worker only ever iterates a copy
/// taken with [`DetectorRegistry::enabled_snapshot`], so the lock is never
/// held while a detector runs.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    entries: Arc<Mutex<Vec<DetectorEntry>>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `DuplicateName` and leaves the existing entry untouched if
    /// `name` is taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        detector: Arc<dyn Detector>,
        enabled: bool,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RecognizerError::InvalidArgument(
                "detector name must not be empty".to_string(),
            ));
        }

        let mut entries = self.lock();
        if entries.iter().any(|entry| entry.name == name) {
            return Err(RecognizerError::DuplicateName(name));
        }
        log::debug!("registered detector '{name}' (enabled: {enabled})");
        entries.push(DetectorEntry {
            name,
            detector,
            enabled,
        });
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<DetectorEntry> {
        let mut entries = self.lock();
        let idx = entries
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| RecognizerError::UnknownDetector(name.to_string()))?;
        Ok(entries.remove(idx))
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut entries = self.lock();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.name == name)
            .ok_or_else(|| RecognizerError::UnknownDetector(name.to_string()))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.lock()
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.enabled)
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies out the detectors that should run on the next frame.
    pub fn enabled_snapshot(&self) -> Vec<(String, Arc<dyn Detector>)> {
        self.lock()
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| (entry.name.clone(), Arc::clone(&entry.detector)))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DetectorEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Detector for Noop {
        fn detect(&self, _frame: &mut Frame) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_name_keeps_original() {
        let registry = DetectorRegistry::new();
        let original: Arc<dyn Detector> = Arc::new(Noop);
        registry.register("palm", Arc::clone(&original), true).unwrap();

        let err = registry.register("palm", Arc::new(Noop), false).unwrap_err();
        assert_eq!(err, RecognizerError::DuplicateName("palm".to_string()));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.is_enabled("palm"), Some(true));
        let snapshot = registry.enabled_snapshot();
        assert!(Arc::ptr_eq(&snapshot[0].1, &original));
    }

    #[test]
    fn snapshot_skips_disabled_and_keeps_order() {
        let registry = DetectorRegistry::new();
        registry.register("a", Arc::new(Noop), true).unwrap();
        registry.register("b", Arc::new(Noop), false).unwrap();
        registry.register("c", Arc::new(Noop), true).unwrap();

        let names: Vec<String> = registry
            .enabled_snapshot()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);

        registry.set_enabled("b", true).unwrap();
        assert_eq!(registry.enabled_snapshot().len(), 3);
        assert_eq!(registry.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_names_are_reported() {
        let registry = DetectorRegistry::new();
        assert!(matches!(
            registry.set_enabled("ghost", true),
            Err(RecognizerError::UnknownDetector(_))
        ));
        assert!(registry.unregister("ghost").is_err());
        assert_eq!(registry.is_enabled("ghost"), None);
    }

    #[test]
    fn unregister_frees_the_name() {
        let registry = DetectorRegistry::new();
        registry.register("fist", Arc::new(Noop), true).unwrap();
        let removed = registry.unregister("fist").unwrap();
        assert_eq!(removed.name, "fist");
        assert!(registry.is_empty());
        registry.register("fist", Arc::new(Noop), true).unwrap();
    }

    #[test]
    fn blank_name_is_rejected() {
        let registry = DetectorRegistry::new();
        assert!(matches!(
            registry.register(" ", Arc::new(Noop), true),
            Err(RecognizerError::InvalidArgument(_))
        ));
    }
}
