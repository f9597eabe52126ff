use crate::{BBox, BBoxError, ImageSize};

/// Default strength of [`squeeze_coordinates`].
pub const DEFAULT_SQUEEZE_STRENGTH: f64 = 0.0005;

fn check_lengths(u: &[u32], v: &[u32]) -> Result<(), BBoxError> {
    if u.len() != v.len() {
        return Err(BBoxError::LengthMismatch(u.len(), v.len()));
    }
    Ok(())
}

/// Reduce the projected pixel coordinates of one object to its bounding box.
///
/// # Errors
///
/// * [`BBoxError::EmptyInput`] if there are no coordinates.
/// * [`BBoxError::LengthMismatch`] if `u` and `v` differ in length.
///
/// Example:
/// ```
/// use scenechange_bbox::{extract::extract, BBox};
///
/// let bbox = extract(&[5, 10, 3], &[5, 10, 3]).unwrap();
/// assert_eq!(bbox, BBox::new(3, 3, 10, 10));
/// ```
pub fn extract(u: &[u32], v: &[u32]) -> Result<BBox, BBoxError> {
    check_lengths(u, v)?;

    let (Some(&min_x), Some(&max_x)) = (u.iter().min(), u.iter().max()) else {
        return Err(BBoxError::EmptyInput);
    };
    let (Some(&min_y), Some(&max_y)) = (v.iter().min(), v.iter().max()) else {
        return Err(BBoxError::EmptyInput);
    };

    Ok(BBox {
        min_x,
        min_y,
        max_x,
        max_y,
    })
}

fn rescale_axis(values: &[u32], from: u32, to: u32) -> Vec<u32> {
    let scale = f64::from(to) / f64::from(from);
    let max = f64::from(to - 1);
    values
        .iter()
        .map(|&x| (f64::from(x) * scale).round_ties_even().clamp(0.0, max) as u32)
        .collect()
}

/// Rescale pixel coordinates from one image resolution to another.
///
/// Each axis is scaled independently, `u' = round(u * to_w / from_w)`, and clipped
/// to the target image.
///
/// # Errors
///
/// * [`BBoxError::InvalidSize`] if either size has a zero dimension.
/// * [`BBoxError::LengthMismatch`] if `u` and `v` differ in length.
pub fn resize(
    u: &[u32],
    v: &[u32],
    from_size: ImageSize,
    to_size: ImageSize,
) -> Result<(Vec<u32>, Vec<u32>), BBoxError> {
    check_lengths(u, v)?;
    let from_size = from_size.validate()?;
    let to_size = to_size.validate()?;

    Ok((
        rescale_axis(u, from_size.width, to_size.width),
        rescale_axis(v, from_size.height, to_size.height),
    ))
}

impl BBox {
    /// Rescale the box corners from one image resolution to another.
    pub fn resize(&self, from_size: ImageSize, to_size: ImageSize) -> Result<Self, BBoxError> {
        let (u, v) = resize(
            &[self.min_x, self.max_x],
            &[self.min_y, self.max_y],
            from_size,
            to_size,
        )?;
        Ok(BBox::new(u[0], v[0], u[1], v[1]))
    }
}

/// Drop boxes whose area is below `min_area`.
pub fn filter_by_area(boxes: &[BBox], min_area: u64) -> Vec<BBox> {
    let kept = boxes
        .iter()
        .filter(|b| b.area() >= min_area)
        .copied()
        .collect::<Vec<_>>();
    log::debug!(
        "dropped {} of {} boxes with area below {min_area}",
        boxes.len() - kept.len(),
        boxes.len()
    );
    kept
}

/// Compress horizontal pixel coordinates towards the image center.
///
/// With `c = width / 2` and `o = u - c`, every coordinate maps to
/// `c + o * (1 - strength * |o|)`, clipped to `[0, width - 1]` and truncated.
pub fn squeeze_coordinates(u: &[u32], width: u32, strength: f64) -> Vec<u32> {
    let center = f64::from(width) / 2.0;
    let max = f64::from(width.saturating_sub(1));
    u.iter()
        .map(|&x| {
            let offset = f64::from(x) - center;
            let stretched = center + offset * (1.0 - strength * offset.abs());
            stretched.clamp(0.0, max) as u32
        })
        .collect()
}
