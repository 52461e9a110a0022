use std::{
    fs,
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use gesture_recognizer::{
    BrightnessClassifier, CaptureDevice, ClassifierDetector, Gesture, GestureEvent, GestureKind,
    GestureListener, Recognizer, RecognizerConfig, Rgba, SyntheticDevice,
};

#[derive(Parser, Debug)]
#[command(version, about = "Detect gestures on a live camera feed")]
struct Args {
    /// Camera index to open.
    #[arg(long, default_value_t = 0)]
    device: u32,

    /// Use the built-in moving square instead of a camera.
    #[arg(long)]
    synthetic: bool,

    /// Stop after this many seconds. 0 runs until the device gives up.
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Brightness a pixel needs to count towards the demo gesture.
    #[arg(long, default_value_t = 200)]
    threshold: u8,

    /// Print the available cameras and exit.
    #[arg(long)]
    list: bool,

    /// Save the last display frame as JPEG on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        return list_cameras();
    }

    let config = RecognizerConfig::default().with_device_index(args.device);
    let recognizer = if args.synthetic {
        Recognizer::new(config, || {
            Box::new(SyntheticDevice::default()) as Box<dyn CaptureDevice>
        })
    } else {
        Recognizer::new(config, camera_device)
    };

    let listener: Arc<dyn GestureListener> = Arc::new(|event: &GestureEvent| -> Result<()> {
        log::info!("{event}");
        Ok(())
    });
    let gesture = Gesture::builder("bright-palm", GestureKind::OpenedHand)
        .classifier(Arc::new(BrightnessClassifier::new(args.threshold, 64)))
        .color(Rgba::GREEN)
        .listener(Arc::downgrade(&listener))
        .build()?;
    recognizer.register_detector(
        gesture.name().to_string(),
        Arc::new(ClassifierDetector::new(Arc::new(gesture))),
    )?;

    recognizer.start()?;
    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));

    loop {
        thread::sleep(Duration::from_secs(1));
        let status = recognizer.status();
        log::info!(
            "{:.1} fps, {} frames, {} detector failures",
            status.fps,
            status.frames,
            status.detector_failures
        );
        if !status.running {
            if let Some(err) = &status.last_error {
                log::error!("recognition stopped: {err}");
            }
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
    }
    recognizer.stop();

    if let Some(path) = args.snapshot {
        match recognizer.latest_frame() {
            Some(frame) => {
                fs::write(&path, frame.to_jpeg(85)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                log::info!("saved frame {} to {}", frame.sequence, path.display());
            }
            None => log::warn!("no frame was captured; nothing to save"),
        }
    }
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn camera_device() -> Box<dyn CaptureDevice> {
    Box::new(gesture_recognizer::source::camera::NokhwaDevice::new())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn camera_device() -> Box<dyn CaptureDevice> {
    log::warn!("built without camera support, falling back to the synthetic source");
    Box::new(SyntheticDevice::default())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = gesture_recognizer::source::camera::available_cameras()?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for camera in cameras {
        println!("{}: {}", camera.index, camera.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    println!("built without camera support");
    Ok(())
}
