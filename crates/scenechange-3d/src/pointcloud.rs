use glam::{DMat4, DVec3};

/// Error types for the point cloud module.
#[derive(Debug, thiserror::Error)]
pub enum PointCloudError {
    /// The number of colors does not match the number of points.
    #[error("Point cloud has {points} points but {colors} colors")]
    ColorCountMismatch {
        /// Number of points.
        points: usize,
        /// Number of colors.
        colors: usize,
    },

    /// A selection index is outside the point cloud.
    #[error("Index {index} out of range for a point cloud of {len} points")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of points in the cloud.
        len: usize,
    },
}

/// A point cloud with positions and RGB colors in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    points: Vec<[f64; 3]>,
    colors: Vec<[f64; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from positions and per-point colors.
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::ColorCountMismatch`] if the lengths differ.
    pub fn new(points: Vec<[f64; 3]>, colors: Vec<[f64; 3]>) -> Result<Self, PointCloudError> {
        if points.len() != colors.len() {
            return Err(PointCloudError::ColorCountMismatch {
                points: points.len(),
                colors: colors.len(),
            });
        }
        Ok(Self { points, colors })
    }

    /// Create a point cloud with every point painted black.
    pub fn from_points(points: Vec<[f64; 3]>) -> Self {
        let colors = vec![[0.0; 3]; points.len()];
        Self { points, colors }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> &[[f64; 3]] {
        &self.colors
    }

    /// Select a subset of points.
    ///
    /// The returned cloud is renumbered `0..indices.len()` in the order of `indices`.
    pub fn select_by_index(&self, indices: &[usize]) -> Result<Self, PointCloudError> {
        let mut points = Vec::with_capacity(indices.len());
        let mut colors = Vec::with_capacity(indices.len());
        for &index in indices {
            let (Some(p), Some(c)) = (self.points.get(index), self.colors.get(index)) else {
                return Err(PointCloudError::IndexOutOfRange {
                    index,
                    len: self.len(),
                });
            };
            points.push(*p);
            colors.push(*c);
        }
        Ok(Self { points, colors })
    }

    /// Apply a homogeneous transform to every point.
    pub fn transform(&self, transform: &DMat4) -> Self {
        let points = self
            .points
            .iter()
            .map(|p| transform.transform_point3(DVec3::from_array(*p)).to_array())
            .collect();
        Self {
            points,
            colors: self.colors.clone(),
        }
    }

    /// Paint the given points with a single color.
    pub fn paint(&mut self, indices: &[usize], color: [f64; 3]) -> Result<(), PointCloudError> {
        let len = self.len();
        for &index in indices {
            let c = self
                .colors
                .get_mut(index)
                .ok_or(PointCloudError::IndexOutOfRange { index, len })?;
            *c = color;
        }
        Ok(())
    }

    /// Axis-aligned bounds of the point cloud as `(min, max)`.
    ///
    /// Returns `None` for an empty cloud.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = DVec3::from_array(*self.points.first()?);
        let (min, max) = self.points.iter().fold((first, first), |(min, max), p| {
            let p = DVec3::from_array(*p);
            (min.min(p), max.max(p))
        });
        Some((min.to_array(), max.to_array()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> Result<PointCloud, PointCloudError> {
        PointCloud::new(
            vec![[0.0, 0.0, 1.0], [1.0, 2.0, 3.0], [-1.0, 4.0, 0.5]],
            vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        )
    }

    #[test]
    fn test_select_renumbers() -> Result<(), PointCloudError> {
        let cloud = cloud()?;
        let subset = cloud.select_by_index(&[2, 0])?;
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.points(), &[[-1.0, 4.0, 0.5], [0.0, 0.0, 1.0]]);
        assert_eq!(subset.colors()[0], [0.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_select_out_of_range() -> Result<(), PointCloudError> {
        let res = cloud()?.select_by_index(&[0, 3]);
        assert!(matches!(
            res,
            Err(PointCloudError::IndexOutOfRange { index: 3, len: 3 })
        ));
        Ok(())
    }

    #[test]
    fn test_color_count_mismatch() {
        let res = PointCloud::new(vec![[0.0; 3]; 2], vec![[0.0; 3]]);
        assert!(matches!(res, Err(PointCloudError::ColorCountMismatch { .. })));
    }

    #[test]
    fn test_transform() -> Result<(), PointCloudError> {
        let t = DMat4::from_translation(DVec3::new(1.0, -1.0, 2.0));
        let moved = cloud()?.transform(&t);
        assert_eq!(moved.points()[1], [2.0, 1.0, 5.0]);
        assert_eq!(moved.colors(), cloud()?.colors());
        Ok(())
    }

    #[test]
    fn test_paint() -> Result<(), PointCloudError> {
        let mut cloud = cloud()?;
        cloud.paint(&[0, 2], [0.1, 0.9, 0.1])?;
        assert_eq!(cloud.colors()[0], [0.1, 0.9, 0.1]);
        assert_eq!(cloud.colors()[1], [0.0, 1.0, 0.0]);
        assert_eq!(cloud.colors()[2], [0.1, 0.9, 0.1]);
        assert!(cloud.paint(&[7], [0.0; 3]).is_err());
        Ok(())
    }

    #[test]
    fn test_bounds() -> Result<(), PointCloudError> {
        let (min, max) = cloud()?.bounds().expect("non-empty cloud");
        assert_eq!(min, [-1.0, 0.0, 0.5]);
        assert_eq!(max, [1.0, 4.0, 3.0]);
        assert!(PointCloud::from_points(vec![]).bounds().is_none());
        Ok(())
    }
}
