use serde::{Deserialize, Serialize};

/// Error types for the bbox crate.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BBoxError {
    /// A box cannot be extracted from zero coordinates.
    #[error("Cannot extract a bounding box from empty coordinates")]
    EmptyInput,

    /// The `u` and `v` coordinate lists have different lengths.
    #[error("Coordinate lengths differ: {0} != {1}")]
    LengthMismatch(usize, usize),

    /// An image size with a zero dimension.
    #[error("Invalid image size {0}")]
    InvalidSize(ImageSize),
}

/// Image size in pixels.
///
/// Example:
///
/// ```
/// use scenechange_bbox::ImageSize;
///
/// let image_size = ImageSize {
///   width: 640,
///   height: 480,
/// };
///
/// assert_eq!(image_size.width, 640);
/// assert_eq!(image_size.height, 480);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: u32,
    /// Height of the image in pixels
    pub height: u32,
}

impl ImageSize {
    pub(crate) fn validate(self) -> Result<Self, BBoxError> {
        if self.width == 0 || self.height == 0 {
            return Err(BBoxError::InvalidSize(self));
        }
        Ok(self)
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[u32; 2]> for ImageSize {
    fn from(size: [u32; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// An axis-aligned box in integer pixel coordinates, corners inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge.
    pub min_x: u32,
    /// Top edge.
    pub min_y: u32,
    /// Right edge.
    pub max_x: u32,
    /// Bottom edge.
    pub max_y: u32,
}

impl BBox {
    /// Create a box, swapping corners so that `min <= max` on both axes.
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// Horizontal extent `max_x - min_x`.
    #[inline]
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    /// Vertical extent `max_y - min_y`.
    #[inline]
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    /// Area `width * height`. A single-pixel box has zero area.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// The box as `[min_x, min_y, max_x, max_y]` floats.
    pub fn to_xyxy(&self) -> [f64; 4] {
        [
            f64::from(self.min_x),
            f64::from(self.min_y),
            f64::from(self.max_x),
            f64::from(self.max_y),
        ]
    }

    /// Clip the box to `[0, width - 1] x [0, height - 1]`.
    pub fn clip(&self, size: ImageSize) -> Self {
        let max_x = size.width.saturating_sub(1);
        let max_y = size.height.saturating_sub(1);
        Self {
            min_x: self.min_x.min(max_x),
            min_y: self.min_y.min(max_y),
            max_x: self.max_x.min(max_x),
            max_y: self.max_y.min(max_y),
        }
    }
}

impl From<BBox> for [u32; 4] {
    fn from(b: BBox) -> Self {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_geometry() {
        let b = BBox::new(10, 40, 4, 20);
        assert_eq!(<[u32; 4]>::from(b), [4, 20, 10, 40]);
        assert_eq!(b.width(), 6);
        assert_eq!(b.height(), 20);
        assert_eq!(b.area(), 120);
        assert_eq!(b.to_xyxy(), [4.0, 20.0, 10.0, 40.0]);
    }

    #[test]
    fn test_clip() {
        let b = BBox::new(600, 10, 700, 500).clip(ImageSize::from([640, 480]));
        assert_eq!(<[u32; 4]>::from(b), [600, 10, 639, 479]);
    }

    #[test]
    fn test_invalid_size() {
        let size = ImageSize::from([0, 480]);
        assert_eq!(size.validate(), Err(BBoxError::InvalidSize(size)));
    }

    #[test]
    fn test_serde() -> Result<(), serde_json::Error> {
        let b = BBox::new(1, 2, 3, 4);
        let json = serde_json::to_string(&b)?;
        assert_eq!(json, r#"{"min_x":1,"min_y":2,"max_x":3,"max_y":4}"#);
        Ok(())
    }
}
