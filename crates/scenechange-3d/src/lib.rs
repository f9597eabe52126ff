#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera intrinsics and extrinsics.
pub mod camera;

/// Plumb-bob lens distortion.
pub mod distortion;

/// Field-of-view based visibility culling.
pub mod frustum;

/// I/O utilities for reading annotation files.
pub mod io;

/// Point cloud container.
pub mod pointcloud;

/// Projection of camera-frame points onto the image plane.
pub mod projection;
