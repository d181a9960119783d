// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-frame composition of face placement, fit and user adjustments
//! into the final transform of the relief plane.
//!
//! Nothing here touches the fields, so it is cheap enough to run every frame.

use nalgebra::{Isometry3, Matrix4, Point3, Rotation3, Translation3, UnitQuaternion, Vector2, Vector3};

#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::face::FacePlacement;
use crate::fit::{DesignTarget, FitResult, MM_TO_UNITS};

/// Tolerance of the overflow check, in box units.
const OVERFLOW_TOLERANCE: f64 = 1e-9;

/// User adjustable relief parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReliefParams {
    /// Physical relief depth, clamped to the design target depth range.
    pub depth_mm: f64,
    /// Depth multiplier.
    pub boost: f64,
    /// Carve into the object instead of raising out of it.
    pub invert: bool,
    /// In-plane rotation added to the automatic fit rotation.
    pub rotation_deg: f64,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Offset in field pixels, along the face right and up axes.
    pub offset_px: (f64, f64),
    /// Uniform multiplier applied after the automatic fit.
    pub scale: f64,
}

impl Default for ReliefParams {
    fn default() -> Self {
        Self {
            depth_mm: 2.0,
            boost: 1.0,
            invert: false,
            rotation_deg: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            offset_px: (0.0, 0.0),
            scale: 1.0,
        }
    }
}

/// Final transform of the relief plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneTransform {
    pub position: Point3<f64>,
    pub rotation: UnitQuaternion<f64>,
    /// Unrotated plane extent, box units.
    pub width: f64,
    pub height: f64,
    /// In-plane angle (radians) of the design relative to the face basis.
    pub angle: f64,
    /// Offset from the face center along the face (right, up) axes.
    pub offset: Vector2<f64>,
    /// Box units of displacement per unit of field value, negative when inverted.
    pub displacement_scale: f64,
    pub mirror_u: bool,
    pub mirror_v: bool,
}

impl PlaneTransform {
    /// Height of the relief surface for a displacement field value.
    pub fn displace(&self, value: f32) -> f64 {
        value as f64 * self.displacement_scale
    }

    /// Extent of the rotated plane along the face (right, up) axes.
    pub fn footprint(&self) -> (f64, f64) {
        let (sin, cos) = self.angle.sin_cos();
        let (sin, cos) = (sin.abs(), cos.abs());
        (
            self.width * cos + self.height * sin,
            self.width * sin + self.height * cos,
        )
    }

    /// Whether the plane, offsets included, spills out of the available area.
    pub fn overflows(&self, placement: &FacePlacement, margin: f64) -> bool {
        let avail_w = (placement.face_width - margin).max(0.0);
        let avail_h = (placement.face_height - margin).max(0.0);
        let (w, h) = self.footprint();
        self.offset.x.abs() + 0.5 * w > 0.5 * avail_w + OVERFLOW_TOLERANCE
            || self.offset.y.abs() + 0.5 * h > 0.5 * avail_h + OVERFLOW_TOLERANCE
    }

    /// Model matrix of a unit plane centered at the origin in the XY plane.
    /// Mirroring is folded into negative scales.
    pub fn model_matrix(&self) -> Matrix4<f64> {
        let sign = |m: bool| if m { -1.0 } else { 1.0 };
        let isometry = Isometry3::from_parts(Translation3::from(self.position.coords), self.rotation);
        isometry.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&Vector3::new(
                sign(self.mirror_u) * self.width,
                sign(self.mirror_v) * self.height,
                1.0,
            ))
    }
}

/// Compose the plane transform from the face placement, the fit and the user parameters.
///
/// `field_size` is the (width, height) of the fields in pixels, used to convert
/// `offset_px`. A zero size, when no field exists yet, disables the offsets.
pub fn compose(
    placement: &FacePlacement,
    fit: &FitResult,
    target: &DesignTarget,
    params: &ReliefParams,
    field_size: (usize, usize),
) -> PlaneTransform {
    let (design_width, design_height) = target.size_units();
    let scale = fit.scale * params.scale.max(0.0);
    let width = design_width * scale;
    let height = design_height * scale;

    let angle = (fit.rotation_deg() + params.rotation_deg).to_radians();
    let spin = Rotation3::from_axis_angle(&Vector3::z_axis(), angle);
    let rotation = UnitQuaternion::from_rotation_matrix(&(placement.rotation * spin));

    let (field_width, field_height) = field_size;
    let per_pixel = |extent: f64, pixels: usize| {
        if pixels == 0 {
            0.0
        } else {
            extent / pixels as f64
        }
    };
    let offset = Vector2::new(
        params.offset_px.0 * per_pixel(width, field_width),
        params.offset_px.1 * per_pixel(height, field_height),
    );
    let position = placement.position + placement.right * offset.x + placement.up * offset.y;

    let depth_units = target.clamp_depth_mm(params.depth_mm) * params.boost * MM_TO_UNITS;
    let displacement_scale = if params.invert {
        -depth_units
    } else {
        depth_units
    };

    PlaneTransform {
        position,
        rotation,
        width,
        height,
        angle,
        offset,
        displacement_scale,
        mirror_u: params.flip_horizontal,
        mirror_v: params.flip_vertical,
    }
}
