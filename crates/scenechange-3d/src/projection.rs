use crate::{
    camera::CameraIntrinsics,
    distortion::{distort_point_plumb_bob, NUM_COEFFS},
};

/// Error types for the projection module.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// An input array does not have the expected shape.
    #[error("Shape error: {0}")]
    Shape(String),

    /// The target image has a zero dimension.
    #[error("Invalid image size ({width}x{height})")]
    InvalidImageSize {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
}

/// Reinterpret a flat buffer as a list of 3D points.
///
/// # Errors
///
/// Returns [`ProjectionError::Shape`] if the buffer length is not a multiple of three.
pub fn points_from_flat(data: &[f64]) -> Result<Vec<[f64; 3]>, ProjectionError> {
    if data.len() % 3 != 0 {
        return Err(ProjectionError::Shape(format!(
            "points must be Nx3, got a buffer of {} values",
            data.len()
        )));
    }
    Ok(data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// Project camera-frame points onto the image plane.
///
/// Each point is multiplied by the homogeneous intrinsic matrix `k`, the
/// resulting `(x', y')` pair is distorted before the division by depth, and the
/// pixel coordinates are rounded (ties to even) and clipped to the image.
///
/// # Arguments
///
/// * `points` - Points in the camera frame.
/// * `k` - The 3x4 homogeneous intrinsic matrix.
/// * `d` - Distortion coefficients `(k1, k2, p1, p2, k3)`.
/// * `width` - The image width in pixels.
/// * `height` - The image height in pixels.
///
/// # Returns
///
/// The `u` and `v` pixel coordinates, one per input point.
///
/// # Errors
///
/// * [`ProjectionError::Shape`] if `d` does not hold five coefficients.
/// * [`ProjectionError::InvalidImageSize`] if `width` or `height` is zero.
///
/// Example:
/// ```
/// use scenechange_3d::projection::project_points;
///
/// let k = [
///     [500.0, 0.0, 320.0, 0.0],
///     [0.0, 500.0, 240.0, 0.0],
///     [0.0, 0.0, 1.0, 0.0],
/// ];
/// let (u, v) = project_points(&[[0.0, 0.0, 5.0]], &k, &[0.0; 5], 640, 480).unwrap();
/// assert_eq!((u[0], v[0]), (320, 240));
/// ```
pub fn project_points(
    points: &[[f64; 3]],
    k: &[[f64; 4]; 3],
    d: &[f64],
    width: u32,
    height: u32,
) -> Result<(Vec<u32>, Vec<u32>), ProjectionError> {
    let d: &[f64; NUM_COEFFS] = d.try_into().map_err(|_| {
        ProjectionError::Shape(format!(
            "distortion must have {NUM_COEFFS} coefficients, got {}",
            d.len()
        ))
    })?;
    project_impl(points, k, Some(d), width, height)
}

/// Project camera-frame points onto the image plane without lens distortion.
pub fn project_points_undistorted(
    points: &[[f64; 3]],
    k: &[[f64; 4]; 3],
    width: u32,
    height: u32,
) -> Result<(Vec<u32>, Vec<u32>), ProjectionError> {
    project_impl(points, k, None, width, height)
}

/// Project camera-frame points with the matrix, distortion and image size of a camera.
pub fn project_with_intrinsics(
    points: &[[f64; 3]],
    intrinsics: &CameraIntrinsics,
) -> Result<(Vec<u32>, Vec<u32>), ProjectionError> {
    let k = intrinsics.homogeneous_matrix();
    let (width, height) = intrinsics.image_size();
    match intrinsics.distortion {
        Some(d) => project_impl(points, &k, Some(&d), width, height),
        None => project_impl(points, &k, None, width, height),
    }
}

fn project_impl(
    points: &[[f64; 3]],
    k: &[[f64; 4]; 3],
    d: Option<&[f64; NUM_COEFFS]>,
    width: u32,
    height: u32,
) -> Result<(Vec<u32>, Vec<u32>), ProjectionError> {
    if width == 0 || height == 0 {
        return Err(ProjectionError::InvalidImageSize { width, height });
    }

    let (fx, fy) = (k[0][0], k[1][1]);
    let (cx, cy) = (k[0][2], k[1][2]);

    let mut u = Vec::with_capacity(points.len());
    let mut v = Vec::with_capacity(points.len());

    for p in points {
        let row = |r: &[f64; 4]| r[0] * p[0] + r[1] * p[1] + r[2] * p[2] + r[3];
        let (x, y, z) = (row(&k[0]), row(&k[1]), row(&k[2]));

        let [x, y] = match d {
            Some(d) => distort_point_plumb_bob(x, y, fx, fy, cx, cy, d),
            None => [x, y],
        };

        u.push(to_pixel(x / z, width));
        v.push(to_pixel(y / z, height));
    }

    log::trace!("projected {} points onto a {width}x{height} image", points.len());

    Ok((u, v))
}

// NaN maps to 0, infinities saturate before clipping.
fn to_pixel(value: f64, size: u32) -> u32 {
    let max = i64::from(size) - 1;
    (value.round_ties_even() as i64).clamp(0, max) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: [[f64; 4]; 3] = [
        [500.0, 0.0, 320.0, 0.0],
        [0.0, 500.0, 240.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];

    #[test]
    fn test_optical_axis() -> Result<(), ProjectionError> {
        let (u, v) = project_points(&[[0.0, 0.0, 5.0]], &K, &[0.0; 5], 640, 480)?;
        assert_eq!(u, vec![320]);
        assert_eq!(v, vec![240]);
        Ok(())
    }

    #[test]
    fn test_project_offset_points() -> Result<(), ProjectionError> {
        let points = [[1.0, 0.5, 5.0], [-1.0, -0.5, 10.0]];
        let (u, v) = project_points_undistorted(&points, &K, 640, 480)?;
        assert_eq!(u, vec![420, 270]);
        assert_eq!(v, vec![290, 215]);
        Ok(())
    }

    #[test]
    fn test_round_half_to_even() -> Result<(), ProjectionError> {
        let k = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let points = [[2.5, 3.5, 1.0], [0.5, 1.5, 1.0]];
        let (u, v) = project_points_undistorted(&points, &k, 10, 10)?;
        assert_eq!(u, vec![2, 0]);
        assert_eq!(v, vec![4, 2]);
        Ok(())
    }

    #[test]
    fn test_clipping() -> Result<(), ProjectionError> {
        let points = [
            [1e6, -1e6, 1.0],
            [0.0, 0.0, -5.0],
            [3.0, 3.0, 0.0],
            [0.0, 0.0, 0.0],
        ];
        let (u, v) = project_points(&points, &K, &[0.1, 0.01, 0.0, 0.0, 0.0], 640, 480)?;
        for (&u, &v) in u.iter().zip(v.iter()) {
            assert!(u < 640);
            assert!(v < 480);
        }
        assert_eq!((u[0], v[0]), (639, 0));
        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<(), ProjectionError> {
        let points = (0..100)
            .map(|i| {
                let t = i as f64 * 0.1;
                [t.sin(), t.cos(), 2.0 + t]
            })
            .collect::<Vec<_>>();
        let first = project_points(&points, &K, &[0.0; 5], 640, 480)?;
        let second = project_points(&points, &K, &[0.0; 5], 640, 480)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_shape_errors() {
        let res = project_points(&[[0.0, 0.0, 1.0]], &K, &[0.0; 3], 640, 480);
        assert!(matches!(res, Err(ProjectionError::Shape(_))));

        let res = points_from_flat(&[0.0, 1.0, 2.0, 3.0]);
        assert!(matches!(res, Err(ProjectionError::Shape(_))));

        let res = project_points_undistorted(&[[0.0, 0.0, 1.0]], &K, 0, 480);
        assert!(matches!(
            res,
            Err(ProjectionError::InvalidImageSize {
                width: 0,
                height: 480
            })
        ));
    }

    #[test]
    fn test_points_from_flat() -> Result<(), ProjectionError> {
        let points = points_from_flat(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0])?;
        assert_eq!(points, vec![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]);
        Ok(())
    }

    #[test]
    fn test_project_with_intrinsics() -> Result<(), Box<dyn std::error::Error>> {
        let intrinsics = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0, 640, 480, None)?;
        let (u, v) = project_with_intrinsics(&[[0.0, 0.0, 5.0], [1.0, 0.5, 5.0]], &intrinsics)?;
        assert_eq!(u, vec![320, 420]);
        assert_eq!(v, vec![240, 290]);
        Ok(())
    }
}
