// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types of the relief core.
//!
//! Only asset loading can fail. Degenerate geometry and degenerate numeric
//! inputs (flat images, faces smaller than the margin) are clamped where
//! they occur and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`ReliefError`].
pub type Result<T> = std::result::Result<T, ReliefError>;

#[derive(Error, Debug)]
pub enum ReliefError {
    /// The source image could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The decoded image has no pixel.
    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// The mesh asset could not be read.
    #[error("failed to load mesh from {}: {message}", .path.display())]
    MeshLoad { path: PathBuf, message: String },

    /// The mesh asset was read but contains no usable triangle.
    #[error("mesh contains no valid triangles")]
    EmptyMesh,

    /// Encoding an output raster failed.
    #[error("failed to encode raster: {0}")]
    Encode(#[source] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReliefError {
    /// Mesh load error for an in-memory asset (no path on disk).
    pub fn mesh_in_memory<T: std::fmt::Display>(message: T) -> Self {
        ReliefError::MeshLoad {
            path: PathBuf::from("<memory>"),
            message: message.to_string(),
        }
    }
}
