#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use scenechange_3d as scene3d;

#[doc(inline)]
pub use scenechange_bbox as bbox;

#[doc(inline)]
pub use scenechange_eval as eval;

/// Per-scene ground-truth box generation across camera viewpoints.
pub mod pipeline;
