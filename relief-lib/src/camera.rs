// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Framing of the viewing camera around the loaded object.

use nalgebra::{Point3, Vector3};

use crate::geometry::BoundingBox;

/// Default ratio between camera distance and box diagonal.
pub const DEFAULT_PADDING: f64 = 1.6;

const NEAR_FLOOR: f64 = 0.001;
const FAR_FLOOR: f64 = 100.0;
const MIN_DISTANCE_RATIO: f64 = 0.35;
const MAX_DISTANCE_RATIO: f64 = 6.0;

/// Camera placement and orbit control limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub position: Point3<f64>,
    pub target: Point3<f64>,
    /// Near clip plane.
    pub near: f64,
    /// Far clip plane.
    pub far: f64,
    /// Closest orbit distance allowed to the user.
    pub min_distance: f64,
    /// Farthest orbit distance allowed to the user.
    pub max_distance: f64,
}

impl Default for CameraFrame {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 3.0),
            target: Point3::origin(),
            near: 0.01,
            far: FAR_FLOOR,
            min_distance: 0.1,
            max_distance: FAR_FLOOR,
        }
    }
}

impl CameraFrame {
    /// Camera framed on the box.
    pub fn framing(bbox: &BoundingBox, padding: f64) -> Self {
        let mut frame = Self::default();
        fit_camera(&mut frame, bbox, padding);
        frame
    }

    /// Distance between the camera and its target.
    pub fn distance(&self) -> f64 {
        (self.position - self.target).norm()
    }
}

/// Oblique viewing direction, slightly above the diagonal.
fn view_direction() -> Vector3<f64> {
    Vector3::new(1.0, 1.05, 1.0).normalize()
}

/// Place the camera so the whole box is comfortably in view.
///
/// Clip planes and orbit limits scale with the box diagonal.
/// Only depends on the box and the padding, so refitting is idempotent.
pub fn fit_camera(frame: &mut CameraFrame, bbox: &BoundingBox, padding: f64) {
    let center = bbox.center();
    let diagonal = bbox.diagonal();
    frame.target = center;
    frame.position = center + view_direction() * (diagonal * padding);
    frame.near = (diagonal / 500.0).max(NEAR_FLOOR);
    frame.far = (diagonal * 50.0).max(FAR_FLOOR);
    frame.min_distance = MIN_DISTANCE_RATIO * diagonal;
    frame.max_distance = MAX_DISTANCE_RATIO * diagonal;
    log::debug!(
        "Camera at distance {:.4} (near {:.5}, far {:.1})",
        diagonal * padding,
        frame.near,
        frame.far
    );
}
