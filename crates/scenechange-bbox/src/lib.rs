#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod bbox;
pub use bbox::{BBox, BBoxError, ImageSize};

/// Reduce projected pixel coordinates to boxes and rescale them.
pub mod extract;

/// Area and intersection-over-union of boxes in `xyxy` form.
pub mod iou;
