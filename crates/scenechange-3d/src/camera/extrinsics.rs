use glam::{DMat3, DMat4, DVec3, DVec4};

use super::CameraError;

// tolerance used to accept a user supplied rotation as orthonormal
const ORTHONORMAL_EPS: f64 = 1e-6;

/// The extrinsic parameters of a camera.
///
/// `rotation` and `position` describe the placement of the camera in the world frame. The
/// world to camera transform is the inverse of that placement and is computed once on
/// construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraExtrinsics {
    rotation: DMat3,
    position: DVec3,
    pose: DMat4,
}

impl CameraExtrinsics {
    /// Create extrinsics from a row-major rotation matrix and the camera position in world.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidConfiguration`] if the rotation is not orthonormal.
    pub fn from_pose(rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> Result<Self, CameraError> {
        let rotation = DMat3::from_cols_array_2d(rotation).transpose();
        if !is_orthonormal(&rotation, ORTHONORMAL_EPS) {
            return Err(CameraError::InvalidConfiguration(format!(
                "rotation must be orthonormal, got {rotation:?}"
            )));
        }
        Self::from_placement(rotation, DVec3::from_array(*translation))
    }

    /// Create extrinsics from a scalar-first quaternion and the camera position in world.
    ///
    /// PRECONDITION: `(qw, qx, qy, qz)` is a unit quaternion. The input is not
    /// re-normalized, a non-unit quaternion yields a non-orthonormal rotation.
    pub fn from_quaternion(
        qw: f64,
        qx: f64,
        qy: f64,
        qz: f64,
        translation: &[f64; 3],
    ) -> Result<Self, CameraError> {
        let rotation = quaternion_to_rotation(qw, qx, qy, qz);
        Self::from_placement(rotation, DVec3::from_array(*translation))
    }

    /// Create extrinsics from an Open3D style look-at viewpoint.
    ///
    /// The camera is placed at `lookat + front * zoom * scale`. The basis is built from the
    /// normalized `front`, `right = normalize(up x front)` and `up' = front x right`.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::DegenerateVector`] if `front`, `up` or the derived `right`
    /// vector has zero magnitude.
    pub fn from_lookat(
        lookat: &[f64; 3],
        front: &[f64; 3],
        up: &[f64; 3],
        zoom: f64,
        scale: f64,
    ) -> Result<Self, CameraError> {
        let lookat = DVec3::from_array(*lookat);
        let front = DVec3::from_array(*front);
        let up = DVec3::from_array(*up);

        let position = lookat + front * zoom * scale;

        let front = normalize(front, "front")?;
        let up = normalize(up, "up")?;
        let right = normalize(up.cross(front), "right")?;
        // recompute up to guarantee an orthogonal basis
        let up = front.cross(right);

        Self::from_placement(DMat3::from_cols(right, up, front), position)
    }

    /// Create extrinsics from a row-major 4x4 world to camera matrix.
    ///
    /// The matrix is used verbatim as the pose; rotation and position are recovered from
    /// its inverse.
    pub fn from_matrix(matrix: &[[f64; 4]; 4]) -> Result<Self, CameraError> {
        let pose = DMat4::from_cols_array_2d(matrix).transpose();
        let det = pose.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON {
            return Err(CameraError::InvalidConfiguration(format!(
                "pose matrix is not invertible, determinant {det}"
            )));
        }
        let placement = pose.inverse();
        Ok(Self {
            rotation: DMat3::from_mat4(placement),
            position: placement.w_axis.truncate(),
            pose,
        })
    }

    /// Create extrinsics from a whitespace separated, row-major 4x4 matrix.
    ///
    /// ```
    /// use scenechange_3d::camera::CameraExtrinsics;
    ///
    /// let text = "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1";
    /// let extrinsics = CameraExtrinsics::from_matrix_text(text).unwrap();
    /// assert_eq!(extrinsics.position().to_array(), [0.0, 0.0, 0.0]);
    /// ```
    pub fn from_matrix_text(text: &str) -> Result<Self, CameraError> {
        let values = text
            .split_whitespace()
            .map(|s| {
                s.parse::<f64>().map_err(|e| {
                    CameraError::InvalidConfiguration(format!("invalid matrix entry {s}: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.len() != 16 {
            return Err(CameraError::InvalidConfiguration(format!(
                "pose matrix must have 16 entries, got {}",
                values.len()
            )));
        }

        let mut matrix = [[0.0; 4]; 4];
        for (row, chunk) in matrix.iter_mut().zip(values.chunks_exact(4)) {
            row.copy_from_slice(chunk);
        }
        Self::from_matrix(&matrix)
    }

    fn from_placement(rotation: DMat3, position: DVec3) -> Result<Self, CameraError> {
        let placement = placement_matrix(&rotation, &position);
        let det = placement.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON {
            return Err(CameraError::InvalidConfiguration(format!(
                "camera placement is not invertible, determinant {det}"
            )));
        }
        Ok(Self {
            rotation,
            position,
            // full inverse: the placement is the camera pose in world, not the transform
            pose: placement.inverse(),
        })
    }

    /// The camera rotation in the world frame.
    pub fn rotation(&self) -> DMat3 {
        self.rotation
    }

    /// The camera position in the world frame.
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// The camera placement `[R|t]` in the world frame as a 4x4 matrix.
    pub fn placement_matrix(&self) -> DMat4 {
        placement_matrix(&self.rotation, &self.position)
    }

    /// The 4x4 homogeneous world to camera transform.
    pub fn pose_matrix(&self) -> DMat4 {
        self.pose
    }

    /// The world to camera transform as a row-major 4x4 array.
    pub fn homogeneous_matrix(&self) -> [[f64; 4]; 4] {
        self.pose.transpose().to_cols_array_2d()
    }

    /// The top three rows of the world to camera transform.
    pub fn matrix(&self) -> [[f64; 4]; 3] {
        let rows = self.homogeneous_matrix();
        [rows[0], rows[1], rows[2]]
    }

    /// Transform world-frame points into the camera frame.
    pub fn transform_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        points
            .iter()
            .map(|p| {
                let pc = self.pose * DVec4::new(p[0], p[1], p[2], 1.0);
                [pc.x, pc.y, pc.z]
            })
            .collect()
    }
}

/// Convert a scalar-first quaternion to a rotation matrix using the closed form.
pub(crate) fn quaternion_to_rotation(q0: f64, q1: f64, q2: f64, q3: f64) -> DMat3 {
    let rows = [
        [
            2.0 * (q0 * q0 + q1 * q1) - 1.0,
            2.0 * (q1 * q2 - q0 * q3),
            2.0 * (q1 * q3 + q0 * q2),
        ],
        [
            2.0 * (q1 * q2 + q0 * q3),
            2.0 * (q0 * q0 + q2 * q2) - 1.0,
            2.0 * (q2 * q3 - q0 * q1),
        ],
        [
            2.0 * (q1 * q3 - q0 * q2),
            2.0 * (q2 * q3 + q0 * q1),
            2.0 * (q0 * q0 + q3 * q3) - 1.0,
        ],
    ];
    DMat3::from_cols_array_2d(&rows).transpose()
}

fn placement_matrix(rotation: &DMat3, position: &DVec3) -> DMat4 {
    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        position.extend(1.0),
    )
}

fn normalize(v: DVec3, name: &'static str) -> Result<DVec3, CameraError> {
    let norm = v.length();
    if norm == 0.0 || !norm.is_finite() {
        return Err(CameraError::DegenerateVector(name));
    }
    Ok(v / norm)
}

fn is_orthonormal(r: &DMat3, eps: f64) -> bool {
    (r.transpose() * *r).abs_diff_eq(DMat3::IDENTITY, eps)
}
