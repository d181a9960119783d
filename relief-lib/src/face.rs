// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Placement of a relief plane flush against one face of a bounding box.

use nalgebra::{Point3, Rotation3, Vector3};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::geometry::BoundingBox;

/// Outward offset of the plane, in box units, avoiding z-fighting with the face.
pub const FACE_EPSILON: f64 = 1e-4;

/// Below this length the `up × normal` cross product is considered degenerate.
const DEGENERATE_LENGTH: f64 = 1e-6;

/// One of the six faces of an axis aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub enum FaceCode {
    #[cfg_attr(feature = "serde", serde(rename = "+x", alias = "px", alias = "+X"))]
    PosX,
    #[cfg_attr(feature = "serde", serde(rename = "-x", alias = "nx", alias = "-X"))]
    NegX,
    #[cfg_attr(feature = "serde", serde(rename = "+y", alias = "py", alias = "+Y"))]
    PosY,
    #[cfg_attr(feature = "serde", serde(rename = "-y", alias = "ny", alias = "-Y"))]
    NegY,
    #[cfg_attr(feature = "serde", serde(rename = "+z", alias = "pz", alias = "+Z"))]
    PosZ,
    #[cfg_attr(feature = "serde", serde(rename = "-z", alias = "nz", alias = "-Z"))]
    NegZ,
}

impl FaceCode {
    pub const ALL: [FaceCode; 6] = [
        FaceCode::PosX,
        FaceCode::NegX,
        FaceCode::PosY,
        FaceCode::NegY,
        FaceCode::PosZ,
        FaceCode::NegZ,
    ];

    /// Index of the normal axis (0 = x, 1 = y, 2 = z).
    pub fn axis(self) -> usize {
        match self {
            FaceCode::PosX | FaceCode::NegX => 0,
            FaceCode::PosY | FaceCode::NegY => 1,
            FaceCode::PosZ | FaceCode::NegZ => 2,
        }
    }

    /// +1 for faces at the max side of the box, -1 at the min side.
    pub fn sign(self) -> f64 {
        match self {
            FaceCode::PosX | FaceCode::PosY | FaceCode::PosZ => 1.0,
            FaceCode::NegX | FaceCode::NegY | FaceCode::NegZ => -1.0,
        }
    }

    pub fn outward_normal(self) -> Vector3<f64> {
        let mut n = Vector3::zeros();
        n[self.axis()] = self.sign();
        n
    }
}

impl fmt::Display for FaceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaceCode::PosX => "+x",
            FaceCode::NegX => "-x",
            FaceCode::PosY => "+y",
            FaceCode::NegY => "-y",
            FaceCode::PosZ => "+z",
            FaceCode::NegZ => "-z",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown face code {0:?}, expected one of +x -x +y -y +z -z")]
pub struct ParseFaceError(String);

impl FromStr for FaceCode {
    type Err = ParseFaceError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "+x" | "px" | "x" => Ok(FaceCode::PosX),
            "-x" | "nx" => Ok(FaceCode::NegX),
            "+y" | "py" | "y" => Ok(FaceCode::PosY),
            "-y" | "ny" => Ok(FaceCode::NegY),
            "+z" | "pz" | "z" => Ok(FaceCode::PosZ),
            "-z" | "nz" => Ok(FaceCode::NegZ),
            _ => Err(ParseFaceError(s.to_string())),
        }
    }
}

/// In-plane (width, height) of a face.
/// Width runs along the placement right vector, height along its up vector.
pub fn face_size(bbox: &BoundingBox, face: FaceCode) -> (f64, f64) {
    let size = bbox.size();
    match face {
        FaceCode::PosX | FaceCode::NegX => (size.z, size.y),
        FaceCode::PosY | FaceCode::NegY => (size.x, size.z),
        FaceCode::PosZ | FaceCode::NegZ => (size.x, size.y),
    }
}

/// Position and orientation of a plane attached to a box face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacePlacement {
    pub face: FaceCode,
    /// Center of the face, pushed outward by [`FACE_EPSILON`].
    pub position: Point3<f64>,
    /// Columns are (right, up, normal): plane local +Z faces outward.
    pub rotation: Rotation3<f64>,
    pub normal: Vector3<f64>,
    pub up: Vector3<f64>,
    pub right: Vector3<f64>,
    pub face_width: f64,
    pub face_height: f64,
}

/// Compute where and how to attach a plane onto a face of the box.
pub fn face_placement(bbox: &BoundingBox, face: FaceCode) -> FacePlacement {
    let normal = face.outward_normal();
    let (right, up) = plane_basis(&normal, &Vector3::y());

    let axis = face.axis();
    let mut position = bbox.center();
    position[axis] = if face.sign() > 0.0 {
        bbox.max[axis] + FACE_EPSILON
    } else {
        bbox.min[axis] - FACE_EPSILON
    };

    let (face_width, face_height) = face_size(bbox, face);
    FacePlacement {
        face,
        position,
        rotation: Rotation3::from_basis_unchecked(&[right, up, normal]),
        normal,
        up,
        right,
        face_width,
        face_height,
    }
}

/// Right and up vectors completing `normal` into a right handed orthonormal basis,
/// with up as close as possible to `up_ref`.
pub fn plane_basis(normal: &Vector3<f64>, up_ref: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let normal = normal.normalize();
    let right = up_ref.cross(&normal);
    let right = match right.try_normalize(DEGENERATE_LENGTH) {
        Some(r) => r,
        // up_ref is parallel to the normal.
        None => {
            let fallback = Vector3::x();
            (fallback - normal * normal.dot(&fallback)).normalize()
        }
    };
    let up = normal.cross(&right).normalize();
    (right, up)
}
