// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! # Photo bas-relief placement
//!
//! Turns a photograph into displacement and normal fields,
//! and places the resulting relief flush against a face of an object's bounding box.

// #![warn(missing_docs)]

pub mod camera;
pub mod compose;
pub mod error;
pub mod face;
pub mod field;
pub mod fit;
pub mod geometry;
pub mod interop;
pub mod mesh;
pub mod relief;
pub mod session;
pub mod utils;

pub use error::{ReliefError, Result};
