use thiserror::Error;

/// Failures reported by a capture device or by the reconnect policy around it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("capture device is not opened")]
    NotOpened,
    #[error("failed to open capture device {index}: {message}")]
    OpenFailed { index: u32, message: String },
    #[error("failed to read from capture device: {0}")]
    ReadFailed(String),
    #[error("capture device unavailable after {attempts} reconnect attempts")]
    DeviceUnavailable { attempts: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecognizerError {
    #[error(transparent)]
    DeviceUnavailable(#[from] DeviceError),
    #[error("a detector named '{0}' is already registered")]
    DuplicateName(String),
    #[error("no detector named '{0}' is registered")]
    UnknownDetector(String),
    #[error("detector '{name}' failed: {message}")]
    DetectorFailure { name: String, message: String },
    #[error("failed to encode display frame: {0}")]
    EncodeFailure(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to spawn {0} thread")]
    ThreadSpawn(String),
}

pub type Result<T, E = RecognizerError> = std::result::Result<T, E>;
