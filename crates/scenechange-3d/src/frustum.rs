use serde::{Deserialize, Serialize};

/// Error types for the frustum module.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrustumError {
    /// No point lies inside the viewing frustum.
    #[error("No points in frustum")]
    Empty,
}

/// Horizontal and vertical field of view of a camera, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    /// Horizontal field of view in degrees.
    pub x_deg: f64,
    /// Vertical field of view in degrees.
    pub y_deg: f64,
}

impl FieldOfView {
    /// A field of view with the same opening angle on both axes.
    pub fn uniform(deg: f64) -> Self {
        Self {
            x_deg: deg,
            y_deg: deg,
        }
    }

    /// Indices of the camera-frame points inside this field of view.
    pub fn cull(&self, points: &[[f64; 3]]) -> Result<Vec<usize>, FrustumError> {
        cull(points, self.x_deg, self.y_deg)
    }
}

impl Default for FieldOfView {
    fn default() -> Self {
        Self::uniform(60.0)
    }
}

/// Depth range of a point set, used as the near/far bounds of the frustum.
#[derive(Debug, Clone, Copy)]
struct DepthRange {
    near: f64,
    far: f64,
}

impl DepthRange {
    fn of(points: &[[f64; 3]]) -> Self {
        points.iter().fold(
            Self {
                near: f64::NEG_INFINITY,
                far: f64::INFINITY,
            },
            |r, p| Self {
                near: r.near.max(p[2]),
                far: r.far.min(p[2]),
            },
        )
    }
}

fn inside_frustum(point: &[f64; 3], tan_x: f64, tan_y: f64, depth: DepthRange) -> bool {
    let [x, y, z] = *point;
    // near and far are taken from the same points, this never rejects one
    if z > depth.near || z < depth.far {
        return false;
    }
    if x.abs() > (z * tan_x).abs() {
        return false;
    }
    if y.abs() > (z * tan_y).abs() {
        return false;
    }
    true
}

/// Return the indices of the camera-frame points inside the viewing frustum.
///
/// A point is kept when `|x| <= |z * tan(fov_x / 2)|` and `|y| <= |z * tan(fov_y / 2)|`.
/// The near and far planes are the largest and smallest depth of the input.
///
/// # Arguments
///
/// * `points` - Points in the camera frame, with `z` along the optical axis.
/// * `fov_x_deg` - Horizontal field of view in degrees.
/// * `fov_y_deg` - Vertical field of view in degrees.
///
/// # Errors
///
/// Returns [`FrustumError::Empty`] when no point qualifies.
///
/// Example:
/// ```
/// use scenechange_3d::frustum::cull;
///
/// let points = [[0.0, 0.0, 5.0], [10.0, 0.0, 1.0]];
/// assert_eq!(cull(&points, 60.0, 60.0).unwrap(), vec![0]);
/// ```
pub fn cull(points: &[[f64; 3]], fov_x_deg: f64, fov_y_deg: f64) -> Result<Vec<usize>, FrustumError> {
    let tan_x = (fov_x_deg / 2.0).to_radians().tan();
    let tan_y = (fov_y_deg / 2.0).to_radians().tan();
    let depth = DepthRange::of(points);

    let indices = points
        .iter()
        .enumerate()
        .filter(|(_, p)| inside_frustum(p, tan_x, tan_y, depth))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    if indices.is_empty() {
        return Err(FrustumError::Empty);
    }

    log::debug!("{} of {} points inside the frustum", indices.len(), points.len());

    Ok(indices)
}

/// Frustum culling with the same field of view on both axes.
pub fn cull_single_fov(points: &[[f64; 3]], fov_deg: f64) -> Result<Vec<usize>, FrustumError> {
    cull(points, fov_deg, fov_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optical_axis_visible() {
        assert_eq!(cull(&[[0.0, 0.0, 5.0]], 1.0, 1.0), Ok(vec![0]));
        assert_eq!(cull_single_fov(&[[0.0, 0.0, 5.0]], 180.0), Ok(vec![0]));
    }

    #[test]
    fn test_narrow_fov_empty() {
        let points = [[1.0, 0.0, 5.0]];
        assert_eq!(cull_single_fov(&points, 1.0), Err(FrustumError::Empty));
        assert_eq!(cull_single_fov(&points, 180.0), Ok(vec![0]));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(cull(&[], 60.0, 60.0), Err(FrustumError::Empty));
    }

    #[test]
    fn test_depth_bounds_keep_everything_in_fov() {
        let points = [[0.0, 0.0, 1.0], [0.0, 0.0, 2.0], [0.0, 0.0, 3.0]];
        assert_eq!(cull(&points, 60.0, 60.0), Ok(vec![0, 1, 2]));
    }

    #[test]
    fn test_axes_are_independent() {
        // tan(45deg / 2) * 4 ~= 1.66, tan(90deg / 2) * 4 = 4
        let points = [[3.0, 0.0, 4.0], [0.0, 3.0, 4.0]];
        assert_eq!(cull(&points, 90.0, 45.0), Ok(vec![0]));
        assert_eq!(cull(&points, 45.0, 90.0), Ok(vec![1]));
    }

    #[test]
    fn test_points_behind_camera_use_absolute_depth() {
        let points = [[0.5, 0.5, -5.0]];
        assert_eq!(cull(&points, 60.0, 60.0), Ok(vec![0]));
    }

    #[test]
    fn test_monotone_in_fov() {
        let points = (0..50)
            .map(|i| {
                let t = i as f64;
                [t.sin() * t * 0.1, t.cos() * t * 0.05, 1.0 + t * 0.2]
            })
            .collect::<Vec<_>>();

        let mut previous = points.len();
        for fov in [170.0, 120.0, 90.0, 60.0, 30.0, 10.0] {
            let count = cull(&points, fov, fov).map(|i| i.len()).unwrap_or(0);
            assert!(count <= previous);
            previous = count;
        }
    }

    #[test]
    fn test_default_fov() {
        let fov = FieldOfView::default();
        assert_eq!(fov, FieldOfView::uniform(60.0));
        assert_eq!(fov.cull(&[[0.0, 0.0, 1.0], [2.0, 0.0, 1.0]]), Ok(vec![0]));
    }
}
