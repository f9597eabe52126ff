/// Area of a box `[x_min, y_min, x_max, y_max]`, zero for inverted boxes.
pub fn box_area(b: &[f64; 4]) -> f64 {
    (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

/// Intersection over union of two boxes in `xyxy` form.
///
/// Extents are `max - min` without a `+1` pixel term. Two boxes without
/// overlap, or with an empty union, have an IoU of zero.
///
/// Example:
/// ```
/// use scenechange_bbox::iou::box_iou;
///
/// let iou = box_iou(&[0.0, 0.0, 10.0, 10.0], &[5.0, 0.0, 15.0, 10.0]);
/// assert!((iou - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn box_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let iw = a[2].min(b[2]) - a[0].max(b[0]);
    let ih = a[3].min(b[3]) - a[1].max(b[1]);
    if iw <= 0.0 || ih <= 0.0 {
        return 0.0;
    }
    let inter = iw * ih;
    let union = box_area(a) + box_area(b) - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Pairwise IoU matrix, `ious[i][j] = box_iou(a[i], b[j])`.
pub fn box_iou_matrix(a: &[[f64; 4]], b: &[[f64; 4]]) -> Vec<Vec<f64>> {
    a.iter()
        .map(|ai| b.iter().map(|bj| box_iou(ai, bj)).collect())
        .collect()
}
