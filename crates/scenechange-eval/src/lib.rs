#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Alignment of ground-truth targets with the inference batch order.
pub mod align;

/// Per-image prediction and target records.
pub mod detection;

mod error;
pub use error::EvalError;

/// Mean average precision and recall.
pub mod map;
