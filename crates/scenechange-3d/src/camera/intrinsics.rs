use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use super::CameraError;

/// Calibration record with explicit focal lengths or a single shared focal length `f`.
///
/// ```json
/// { "f": 1658.5, "cx": 0.66, "cy": -11.5, "width": 1920, "height": 1080 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Focal length in x, takes precedence over `f`.
    #[serde(default)]
    pub fx: Option<f64>,
    /// Focal length in y, takes precedence over `f`.
    #[serde(default)]
    pub fy: Option<f64>,
    /// Shared focal length used when `fx` / `fy` are absent.
    #[serde(default)]
    pub f: Option<f64>,
    /// Principal point x.
    pub cx: Option<f64>,
    /// Principal point y.
    pub cy: Option<f64>,
    /// Image width in pixels.
    pub width: Option<u32>,
    /// Image height in pixels.
    pub height: Option<u32>,
    /// Plumb-bob coefficients k1, k2, p1, p2, k3.
    #[serde(default)]
    pub distortion: Option<Vec<f64>>,
}

/// ROS style camera info record: a row-major 3x3 `K`, distortion `D` and resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfoRecord {
    /// Row-major 3x3 camera matrix.
    #[serde(rename = "K")]
    pub k: Vec<f64>,
    /// Distortion coefficients, empty for an undistorted camera.
    #[serde(rename = "D", default)]
    pub d: Vec<f64>,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

/// The intrinsic parameters of a pinhole camera with optional plumb-bob distortion.
///
/// Values are validated on construction: focal lengths and the image size must be positive.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x, in pixels.
    pub fx: f64,
    /// Focal length in y, in pixels.
    pub fy: f64,
    /// Principal point x, in pixels.
    pub cx: f64,
    /// Principal point y, in pixels.
    pub cy: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Distortion coefficients k1, k2, p1, p2, k3.
    pub distortion: Option<[f64; 5]>,
}

impl CameraIntrinsics {
    /// Create camera intrinsics from focal lengths, principal point and image size.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidConfiguration`] if a focal length or the image size
    /// is not positive.
    pub fn new(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        width: u32,
        height: u32,
        distortion: Option<[f64; 5]>,
    ) -> Result<Self, CameraError> {
        if !(fx > 0.0 && fy > 0.0) {
            return Err(CameraError::InvalidConfiguration(format!(
                "focal lengths must be positive, got fx={fx} fy={fy}"
            )));
        }
        if !(cx.is_finite() && cy.is_finite()) {
            return Err(CameraError::InvalidConfiguration(format!(
                "principal point must be finite, got cx={cx} cy={cy}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidConfiguration(format!(
                "image size must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
            distortion,
        })
    }

    /// Create camera intrinsics from a calibration record.
    ///
    /// `fx` and `fy` fall back to the shared focal length `f`. There is no default for any
    /// of the pinhole parameters.
    pub fn from_record(record: &CalibrationRecord) -> Result<Self, CameraError> {
        let fx = record.fx.or(record.f).ok_or_else(|| missing("fx"))?;
        let fy = record.fy.or(record.f).ok_or_else(|| missing("fy"))?;
        let cx = record.cx.ok_or_else(|| missing("cx"))?;
        let cy = record.cy.ok_or_else(|| missing("cy"))?;
        let width = record.width.ok_or_else(|| missing("width"))?;
        let height = record.height.ok_or_else(|| missing("height"))?;
        let distortion = match &record.distortion {
            Some(d) => parse_distortion(d)?,
            None => None,
        };
        Self::new(fx, fy, cx, cy, width, height, distortion)
    }

    /// Create camera intrinsics from a camera info record with a flattened `K` matrix.
    pub fn from_camera_info(record: &CameraInfoRecord) -> Result<Self, CameraError> {
        let k: [f64; 9] = record.k.as_slice().try_into().map_err(|_| {
            CameraError::InvalidConfiguration(format!(
                "K must have 9 elements, got {}",
                record.k.len()
            ))
        })?;
        let matrix = [[k[0], k[1], k[2]], [k[3], k[4], k[5]], [k[6], k[7], k[8]]];
        let distortion = parse_distortion(&record.d)?;
        Self::from_matrix(&matrix, distortion, record.width, record.height)
    }

    /// Create camera intrinsics from a 3x3 camera matrix.
    ///
    /// The matrix must have the form `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn from_matrix(
        k: &[[f64; 3]; 3],
        distortion: Option<[f64; 5]>,
        width: u32,
        height: u32,
    ) -> Result<Self, CameraError> {
        if k[0][1] != 0.0 || k[1][0] != 0.0 || k[2] != [0.0, 0.0, 1.0] {
            return Err(CameraError::InvalidConfiguration(
                "camera matrix must have form [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]".to_string(),
            ));
        }
        Self::new(k[0][0], k[1][1], k[0][2], k[1][2], width, height, distortion)
    }

    /// Load intrinsics from a JSON calibration record file.
    pub fn load_calibration(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let reader = BufReader::new(File::open(path)?);
        let record: CalibrationRecord = serde_json::from_reader(reader)?;
        Self::from_record(&record)
    }

    /// Load intrinsics from a JSON camera info file (`K`, `D`, `width`, `height`).
    pub fn load_camera_info(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let reader = BufReader::new(File::open(path)?);
        let record: CameraInfoRecord = serde_json::from_reader(reader)?;
        Self::from_camera_info(&record)
    }

    /// Returns the camera matrix as a 3x3 array.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Returns the 3x4 camera matrix used to project homogeneous 4-vectors.
    pub fn homogeneous_matrix(&self) -> [[f64; 4]; 3] {
        [
            [self.fx, 0.0, self.cx, 0.0],
            [0.0, self.fy, self.cy, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]
    }

    /// Returns the distortion coefficients, or zeros for an undistorted camera.
    pub fn distortion_coeffs(&self) -> [f64; 5] {
        self.distortion.unwrap_or([0.0; 5])
    }

    /// Returns the image size as `(width, height)`.
    pub fn image_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn missing(field: &str) -> CameraError {
    CameraError::InvalidConfiguration(format!("missing field `{field}`"))
}

// an empty coefficient list means an undistorted camera
fn parse_distortion(d: &[f64]) -> Result<Option<[f64; 5]>, CameraError> {
    match d.len() {
        0 => Ok(None),
        5 => Ok(Some([d[0], d[1], d[2], d[3], d[4]])),
        n => Err(CameraError::InvalidConfiguration(format!(
            "distortion must have 5 coefficients (k1, k2, p1, p2, k3), got {n}"
        ))),
    }
}
