use crate::projection::ProjectionError;

/// Number of plumb-bob coefficients `(k1, k2, p1, p2, k3)`.
pub const NUM_COEFFS: usize = 5;

/// Distort a single point with the plumb-bob (Brown-Conrady) model.
///
/// # Arguments
///
/// * `x` - The x coordinate in pixels.
/// * `y` - The y coordinate in pixels.
/// * `fx`, `fy` - Focal lengths.
/// * `cx`, `cy` - Principal point.
/// * `d` - Coefficients `(k1, k2, p1, p2, k3)`.
///
/// # Returns
///
/// The distorted point in pixels.
#[allow(clippy::too_many_arguments)]
pub fn distort_point_plumb_bob(
    x: f64,
    y: f64,
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    d: &[f64; NUM_COEFFS],
) -> [f64; 2] {
    let [k1, k2, p1, p2, k3] = *d;

    // normalize
    let x = (x - cx) / fx;
    let y = (y - cy) / fy;

    let r2 = x * x + y * y;
    let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;

    let xy = x * y;
    let xd = x * radial + 2.0 * p1 * xy + p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * xy;

    [xd * fx + cx, yd * fy + cy]
}

/// Apply plumb-bob distortion to a set of 2D points.
///
/// The focal lengths and principal point are read from the homogeneous
/// intrinsic matrix `k` (3x4, row-major).
///
/// # Errors
///
/// Returns [`ProjectionError::Shape`] if `d` does not hold exactly five coefficients.
///
/// Example:
/// ```
/// use scenechange_3d::distortion::apply_distortion;
///
/// let k = [
///     [500.0, 0.0, 320.0, 0.0],
///     [0.0, 500.0, 240.0, 0.0],
///     [0.0, 0.0, 1.0, 0.0],
/// ];
/// let points = [[320.0, 240.0], [400.0, 300.0]];
/// let distorted = apply_distortion(&points, &k, &[0.0; 5]).unwrap();
/// assert_eq!(distorted, points.to_vec());
/// ```
pub fn apply_distortion(
    points_2d: &[[f64; 2]],
    k: &[[f64; 4]; 3],
    d: &[f64],
) -> Result<Vec<[f64; 2]>, ProjectionError> {
    let d: &[f64; NUM_COEFFS] = d.try_into().map_err(|_| {
        ProjectionError::Shape(format!(
            "distortion must have {NUM_COEFFS} coefficients, got {}",
            d.len()
        ))
    })?;

    let (fx, fy) = (k[0][0], k[1][1]);
    let (cx, cy) = (k[0][2], k[1][2]);

    Ok(points_2d
        .iter()
        .map(|p| distort_point_plumb_bob(p[0], p[1], fx, fy, cx, cy, d))
        .collect())
}
