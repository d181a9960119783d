// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Axis aligned bounding box shared by placement, fitting and camera framing.

use nalgebra::{Point3, Vector3};

/// Axis aligned box in object units, `min <= max` componentwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Box spanned by two opposite corners, in any order.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: Point3::from(a.coords.inf(&b.coords)),
            max: Point3::from(a.coords.sup(&b.coords)),
        }
    }

    /// Box centered at the origin with the given size.
    pub fn centered(size: Vector3<f64>) -> Self {
        let half = size.abs() * 0.5;
        Self::new(Point3::from(-half), Point3::from(half))
    }

    /// Tightest box around the points, `None` if there is none.
    pub fn from_points<'a, I: IntoIterator<Item = &'a Point3<f64>>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Self::new(first, first), |bbox, p| Self {
            min: Point3::from(bbox.min.coords.inf(&p.coords)),
            max: Point3::from(bbox.max.coords.sup(&p.coords)),
        }))
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Length of the main diagonal.
    pub fn diagonal(&self) -> f64 {
        self.size().norm()
    }

    pub fn max_dimension(&self) -> f64 {
        self.size().max()
    }

    /// Same box after a uniform scale about the origin.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.min * factor, self.max * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn corners_are_ordered() {
        let bbox = BoundingBox::new(Point3::new(1.0, -2.0, 3.0), Point3::new(-1.0, 2.0, 0.0));
        assert_eq!(bbox.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.size(), Vector3::new(2.0, 4.0, 3.0));
        assert_eq!(bbox.center(), Point3::new(0.0, 0.0, 1.5));
        assert_relative_eq!(bbox.diagonal(), 29f64.sqrt());
        assert_eq!(bbox.max_dimension(), 4.0);
    }

    #[test]
    fn box_around_points() {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, -1.0, 0.5),
            Point3::new(-1.0, 3.0, 0.25),
        ];
        let bbox = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bbox.min, Point3::new(-1.0, -1.0, 0.0));
        assert_eq!(bbox.max, Point3::new(2.0, 3.0, 0.5));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn negative_scale_keeps_invariant() {
        let bbox = BoundingBox::centered(Vector3::new(2.0, 4.0, 6.0)).scaled(-0.5);
        assert_eq!(bbox.size(), Vector3::new(1.0, 2.0, 3.0));
    }
}
