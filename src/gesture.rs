use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    clock::current_millis,
    config::DEFAULT_LISTENER_QUEUE_CAPACITY,
    error::{RecognizerError, Result},
    events::{EventHub, GestureListener, WeakListener},
    types::{Frame, GestureEvent, GestureKind, Rect, Rgba},
};

/// Opaque pattern matcher behind a gesture, e.g. a cascade classifier.
pub trait Classifier: Send + Sync {
    fn find_regions(&self, frame: &Frame) -> anyhow::Result<Vec<Rect>>;
}

/// Binds a classifier's raw match regions to a semantic gesture kind.
///
/// The gesture holds its primary listener weakly; whoever created the
/// listener keeps it alive. Further listeners can subscribe via [`Gesture::events`].
pub struct Gesture {
    name: String,
    kind: GestureKind,
    classifier: Arc<dyn Classifier>,
    color: Rgba,
    enabled: AtomicBool,
    events: EventHub,
}

impl Gesture {
    pub fn builder(name: impl Into<String>, kind: GestureKind) -> GestureBuilder {
        GestureBuilder {
            name: name.into(),
            kind,
            classifier: None,
            color: None,
            listener: None,
            enabled: true,
            queue_capacity: DEFAULT_LISTENER_QUEUE_CAPACITY,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Turns a set of match regions into one event located at the centroid
    /// of the largest region. Equal areas keep the earliest region.
    pub fn resolve_best_match(&self, regions: &[Rect]) -> Option<GestureEvent> {
        let best = best_match(regions)?;
        let (x, y) = best.center();
        GestureEvent::new(self.name.as_str(), self.kind, current_millis(), x, y).ok()
    }

    /// Resolves the best match and queues it for the gesture's listeners.
    /// Returns the event that was published, if any.
    pub fn notify(&self, regions: &[Rect]) -> Option<GestureEvent> {
        let event = self.resolve_best_match(regions)?;
        self.events.publish(event.clone());
        Some(event)
    }
}

impl fmt::Debug for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gesture")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("color", &self.color)
            .field("enabled", &self.is_enabled())
            .field("listeners", &self.events.listener_count())
            .finish()
    }
}

pub struct GestureBuilder {
    name: String,
    kind: GestureKind,
    classifier: Option<Arc<dyn Classifier>>,
    color: Option<Rgba>,
    listener: Option<Weak<dyn GestureListener>>,
    enabled: bool,
    queue_capacity: usize,
}

impl GestureBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn color(mut self, color: Rgba) -> Self {
        self.color = Some(color);
        self
    }

    pub fn listener(mut self, listener: Weak<dyn GestureListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Fails with `InvalidArgument` unless name, classifier, color and a live
    /// listener were all supplied.
    pub fn build(self) -> Result<Gesture> {
        let invalid = |what: &str| {
            RecognizerError::InvalidArgument(format!(
                "gesture '{}' ({}): {what}",
                self.name, self.kind
            ))
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        let classifier = self
            .classifier
            .clone()
            .ok_or_else(|| invalid("missing classifier"))?;
        let color = self.color.ok_or_else(|| invalid("missing color"))?;
        let listener = match &self.listener {
            Some(weak) if weak.strong_count() > 0 => weak.clone(),
            Some(_) => return Err(invalid("listener already dropped")),
            None => return Err(invalid("missing listener")),
        };

        let events = EventHub::with_capacity(self.queue_capacity);
        events.subscribe(Arc::new(WeakListener(listener)))?;

        Ok(Gesture {
            name: self.name,
            kind: self.kind,
            classifier,
            color,
            enabled: AtomicBool::new(self.enabled),
            events,
        })
    }
}

/// Largest-area region, first one wins on ties.
pub fn best_match(regions: &[Rect]) -> Option<Rect> {
    let mut best: Option<Rect> = None;
    for region in regions {
        match best {
            Some(current) if region.area() <= current.area() => {}
            _ => best = Some(*region),
        }
    }
    best
}
