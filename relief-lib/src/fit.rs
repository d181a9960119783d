// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fit a physical design onto the available area of a face.

#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::face::{face_size, FaceCode};
use crate::geometry::BoundingBox;

/// Default margin kept free around the design, in box units.
pub const DEFAULT_MARGIN: f64 = 0.002;

/// Box units per millimeter. Meshes are in meters after auto scaling.
pub const MM_TO_UNITS: f64 = 0.001;

/// Physical description of the relief design to produce.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DesignTarget {
    pub width_mm: f64,
    pub height_mm: f64,
    pub default_face: FaceCode,
    pub depth_min_mm: f64,
    pub depth_max_mm: f64,
}

impl Default for DesignTarget {
    fn default() -> Self {
        Self {
            width_mm: 100.0,
            height_mm: 120.0,
            default_face: FaceCode::PosZ,
            depth_min_mm: 0.5,
            depth_max_mm: 5.0,
        }
    }
}

impl DesignTarget {
    /// Design (width, height) in box units.
    pub fn size_units(&self) -> (f64, f64) {
        (self.width_mm * MM_TO_UNITS, self.height_mm * MM_TO_UNITS)
    }

    pub fn clamp_depth_mm(&self, depth_mm: f64) -> f64 {
        let (lo, hi) = if self.depth_min_mm <= self.depth_max_mm {
            (self.depth_min_mm, self.depth_max_mm)
        } else {
            (self.depth_max_mm, self.depth_min_mm)
        };
        depth_mm.max(lo).min(hi)
    }

    /// Plan the fit of this design on a face of the box.
    pub fn plan_on(&self, bbox: &BoundingBox, face: FaceCode, margin: f64) -> FitResult {
        let (face_width, face_height) = face_size(bbox, face);
        let (design_width, design_height) = self.size_units();
        plan_fit(face_width, face_height, design_width, design_height, margin)
    }
}

/// Outcome of the fit planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    /// Design turned by 90° on the face.
    pub rotate_by_90: bool,
    /// Uniform scale in [0,1] applied to the design.
    pub scale: f64,
    /// Footprint of the scaled design along the face width.
    pub plane_width: f64,
    /// Footprint of the scaled design along the face height.
    pub plane_height: f64,
}

impl FitResult {
    /// No room at all on the face.
    pub fn is_empty(&self) -> bool {
        self.scale <= 0.0
    }

    pub fn rotation_deg(&self) -> f64 {
        if self.rotate_by_90 {
            90.0
        } else {
            0.0
        }
    }
}

/// Largest scale keeping a `design` rectangle inside an `avail` one, 0 if none.
fn fit_ratio(avail: (f64, f64), design: (f64, f64)) -> f64 {
    if design.0 <= 0.0 || design.1 <= 0.0 {
        return 0.0;
    }
    (avail.0 / design.0).min(avail.1 / design.1)
}

/// Decide the design orientation and scale on a face.
///
/// The margin is subtracted from both face dimensions.
/// Rotation is chosen only when strictly better, and the design is never enlarged.
pub fn plan_fit(
    face_width: f64,
    face_height: f64,
    design_width: f64,
    design_height: f64,
    margin: f64,
) -> FitResult {
    let avail = (
        (face_width - margin).max(0.0),
        (face_height - margin).max(0.0),
    );
    let fit_0 = fit_ratio(avail, (design_width, design_height));
    let fit_90 = fit_ratio(avail, (design_height, design_width));
    let rotate_by_90 = fit_90 > fit_0;
    let scale = fit_0.max(fit_90).min(1.0).max(0.0);
    if scale == 0.0 {
        log::warn!(
            "No room for a {:.4}x{:.4} design on a {:.4}x{:.4} face",
            design_width,
            design_height,
            face_width,
            face_height
        );
    }

    let (footprint_width, footprint_height) = if rotate_by_90 {
        (design_height, design_width)
    } else {
        (design_width, design_height)
    };
    FitResult {
        rotate_by_90,
        scale,
        plane_width: footprint_width * scale,
        plane_height: footprint_height * scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn rotation_chosen_when_better() {
        let fit = plan_fit(0.12, 0.10, 0.05, 0.15, 0.0);
        assert!(fit.rotate_by_90);
        assert_relative_eq!(fit.scale, 0.8, epsilon = 1e-12);
        assert!(fit.plane_width <= 0.12 + 1e-12);
        assert!(fit.plane_height <= 0.10 + 1e-12);
    }

    #[test]
    fn no_rotation_when_worse() {
        // 0° ratio is min(2, 0.8) = 0.8, 90° ratio is min(0.667, 2.4).
        let fit = plan_fit(0.10, 0.12, 0.05, 0.15, 0.0);
        assert!(!fit.rotate_by_90);
        assert_relative_eq!(fit.scale, 0.8, epsilon = 1e-12);
        assert_relative_eq!(fit.plane_width, 0.04, epsilon = 1e-12);
        assert_relative_eq!(fit.plane_height, 0.12, epsilon = 1e-12);
    }

    #[test]
    fn ties_favor_no_rotation() {
        let fit = plan_fit(0.2, 0.2, 0.1, 0.1, 0.0);
        assert!(!fit.rotate_by_90);
        assert_eq!(fit.scale, 1.0);
    }

    #[test]
    fn never_upscales() {
        let fit = plan_fit(1.0, 1.0, 0.1, 0.2, DEFAULT_MARGIN);
        assert_eq!(fit.scale, 1.0);
        assert_relative_eq!(fit.plane_width, 0.1);
        assert_relative_eq!(fit.plane_height, 0.2);
    }

    #[test]
    fn face_smaller_than_margin_has_no_room() {
        let fit = plan_fit(0.001, 0.5, 0.1, 0.1, DEFAULT_MARGIN);
        assert!(fit.is_empty());
        assert_eq!(fit.plane_width, 0.0);
        assert_eq!(fit.plane_height, 0.0);
        let fit = plan_fit(0.5, 0.5, 0.0, 0.1, DEFAULT_MARGIN);
        assert!(fit.is_empty());
    }

    #[test]
    fn urn_top_face_scenario() {
        let bbox = BoundingBox::centered(Vector3::new(0.2, 0.3, 0.15));
        let (w, h) = face_size(&bbox, FaceCode::PosY);
        assert_relative_eq!(w, 0.2, epsilon = 1e-12);
        assert_relative_eq!(h, 0.15, epsilon = 1e-12);

        let target = DesignTarget {
            width_mm: 100.0,
            height_mm: 120.0,
            ..DesignTarget::default()
        };
        let fit = target.plan_on(&bbox, FaceCode::PosY, DEFAULT_MARGIN);
        // fit 0° = min(1.98, 1.233), fit 90° = min(1.65, 1.48): rotation wins.
        assert!(fit.rotate_by_90);
        assert_eq!(fit.scale, 1.0);
        assert_relative_eq!(fit.plane_width, 0.12, epsilon = 1e-12);
        assert_relative_eq!(fit.plane_height, 0.1, epsilon = 1e-12);
        assert!(fit.plane_width <= 0.198 && fit.plane_height <= 0.148);
    }

    #[test]
    fn depth_is_clamped_to_target_range() {
        let target = DesignTarget::default();
        assert_eq!(target.clamp_depth_mm(10.0), 5.0);
        assert_eq!(target.clamp_depth_mm(0.0), 0.5);
        assert_eq!(target.clamp_depth_mm(2.0), 2.0);
    }
}
