use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use super::{CameraError, CameraExtrinsics};

/// A scalar-first quaternion record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionRecord {
    /// Scalar part.
    pub w: f64,
    /// First vector component.
    pub x: f64,
    /// Second vector component.
    pub y: f64,
    /// Third vector component.
    pub z: f64,
}

/// A translation record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Translation along x.
    pub x: f64,
    /// Translation along y.
    pub y: f64,
    /// Translation along z.
    pub z: f64,
}

/// Camera placement given as a quaternion and a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionPose {
    /// Rotation of the camera in the world frame.
    pub rotation: QuaternionRecord,
    /// Position of the camera in the world frame.
    pub translation: TranslationRecord,
}

/// An Open3D style viewpoint record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookAtRecord {
    /// Point the camera looks at.
    pub lookat: [f64; 3],
    /// Viewing direction.
    pub front: [f64; 3],
    /// Approximate up direction.
    pub up: [f64; 3],
    /// Distance factor between `lookat` and the camera.
    pub zoom: f64,
}

/// One entry of a per-scene transformation list, keyed by frame id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRecord {
    /// Frame id.
    pub id: u64,
    /// Image file the pose belongs to.
    pub file_name: String,
    /// Capture timestamp in seconds.
    #[serde(default)]
    pub timestamp: f64,
    /// Source frame of the transform.
    #[serde(default)]
    pub origin_frame: Option<String>,
    /// Target frame of the transform.
    #[serde(default)]
    pub target_frame: Option<String>,
    /// Rotation of the camera in the world frame.
    pub rotation: QuaternionRecord,
    /// Position of the camera in the world frame.
    pub translation: TranslationRecord,
}

impl TransformationRecord {
    /// The pose of this record as a [`PoseSource`].
    pub fn pose_source(&self) -> PoseSource {
        PoseSource::Quaternion(QuaternionPose {
            rotation: self.rotation,
            translation: self.translation,
        })
    }
}

/// The source formats a camera pose can be built from.
#[derive(Debug, Clone, PartialEq)]
pub enum PoseSource {
    /// A row-major 4x4 world to camera matrix, used verbatim.
    Matrix([[f64; 4]; 4]),
    /// A look-at viewpoint and the scale applied to the zoom distance.
    LookAt {
        /// The viewpoint record.
        record: LookAtRecord,
        /// Scale applied to `zoom`.
        scale: f64,
    },
    /// A quaternion and translation placement.
    Quaternion(QuaternionPose),
}

impl CameraExtrinsics {
    /// Create extrinsics from any supported pose source.
    pub fn from_source(source: &PoseSource) -> Result<Self, CameraError> {
        match source {
            PoseSource::Matrix(m) => Self::from_matrix(m),
            PoseSource::LookAt { record, scale } => Self::from_lookat(
                &record.lookat,
                &record.front,
                &record.up,
                record.zoom,
                *scale,
            ),
            PoseSource::Quaternion(pose) => {
                let q = pose.rotation;
                let t = pose.translation;
                Self::from_quaternion(q.w, q.x, q.y, q.z, &[t.x, t.y, t.z])
            }
        }
    }
}

#[derive(Deserialize)]
struct ViewpointFile {
    trajectory: Vec<LookAtRecord>,
}

#[derive(Deserialize)]
struct QuaternionPoseFile {
    transformation: QuaternionPose,
}

/// Read a viewpoint file `{"trajectory": [{lookat, front, up, zoom}, ...]}`.
///
/// Only the first trajectory entry is used.
pub fn load_viewpoint(path: impl AsRef<Path>) -> Result<LookAtRecord, CameraError> {
    let reader = BufReader::new(File::open(path)?);
    let file: ViewpointFile = serde_json::from_reader(reader)?;
    file.trajectory
        .into_iter()
        .next()
        .ok_or_else(|| CameraError::InvalidConfiguration("empty trajectory".to_string()))
}

/// Read a single pose file `{"transformation": {rotation, translation}}`.
pub fn load_quaternion_pose(path: impl AsRef<Path>) -> Result<QuaternionPose, CameraError> {
    let reader = BufReader::new(File::open(path)?);
    let file: QuaternionPoseFile = serde_json::from_reader(reader)?;
    Ok(file.transformation)
}

/// Read a list of per-frame transformations and index it by frame id.
///
/// # Errors
///
/// Returns [`CameraError::InvalidConfiguration`] if two entries share an id.
pub fn load_transformations(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<u64, TransformationRecord>, CameraError> {
    let reader = BufReader::new(File::open(path)?);
    let records: Vec<TransformationRecord> = serde_json::from_reader(reader)?;
    index_transformations(records)
}

/// Index a list of per-frame transformations by frame id.
pub fn index_transformations(
    records: Vec<TransformationRecord>,
) -> Result<BTreeMap<u64, TransformationRecord>, CameraError> {
    let mut transformations = BTreeMap::new();
    for record in records {
        let id = record.id;
        if transformations.insert(id, record).is_some() {
            return Err(CameraError::InvalidConfiguration(format!(
                "duplicate transformation id {id}"
            )));
        }
    }
    log::debug!("loaded {} transformations", transformations.len());
    Ok(transformations)
}
