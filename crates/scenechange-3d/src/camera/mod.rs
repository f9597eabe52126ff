mod extrinsics;
mod intrinsics;

/// Serializable pose records and pose-source loaders.
pub mod pose;

pub use extrinsics::CameraExtrinsics;
pub use intrinsics::{CalibrationRecord, CameraInfoRecord, CameraIntrinsics};

/// Error types for the camera module.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// Malformed or missing calibration / pose fields.
    #[error("Invalid camera configuration: {0}")]
    InvalidConfiguration(String),

    /// A basis vector had zero magnitude and could not be normalized.
    #[error("Cannot normalize the {0} vector with zero magnitude")]
    DegenerateVector(&'static str),

    /// Error reading a calibration or pose file.
    #[error("error reading camera file")]
    Io(#[from] std::io::Error),

    /// Error decoding a calibration or pose record.
    #[error("error decoding camera record")]
    Json(#[from] serde_json::Error),
}
