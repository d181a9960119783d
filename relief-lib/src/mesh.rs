// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mesh intake: load, orient, and bring the object into meter units.

use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::error::{ReliefError, Result};
use crate::geometry::BoundingBox;

/// Boxes larger than this are assumed to be authored in millimeters.
pub const MILLIMETER_THRESHOLD: f64 = 3.0;

/// Orientation directive applied to a mesh before any placement math.
///
/// The rotation (XYZ Euler angles, degrees) is applied first,
/// then the mirroring along the flagged axes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Orientation {
    pub rotation_deg: [f64; 3],
    pub mirror: [bool; 3],
}

impl Orientation {
    pub fn rotation(&self) -> Rotation3<f64> {
        let [x, y, z] = self.rotation_deg;
        Rotation3::from_axis_angle(&Vector3::x_axis(), x.to_radians())
            * Rotation3::from_axis_angle(&Vector3::y_axis(), y.to_radians())
            * Rotation3::from_axis_angle(&Vector3::z_axis(), z.to_radians())
    }

    /// Single composed transform `mirror * rotation`.
    pub fn matrix(&self) -> Matrix3<f64> {
        let flip = |m: bool| if m { -1.0 } else { 1.0 };
        let [mx, my, mz] = self.mirror;
        let mirror = Matrix3::from_diagonal(&Vector3::new(flip(mx), flip(my), flip(mz)));
        mirror * self.rotation().matrix()
    }

    /// An odd number of mirrored axes turns the triangles inside out.
    pub fn flips_winding(&self) -> bool {
        self.mirror.iter().filter(|&&m| m).count() % 2 == 1
    }
}

/// Uniform scale bringing a mesh into meters.
pub fn auto_scale(bbox: &BoundingBox) -> f64 {
    if bbox.max_dimension() > MILLIMETER_THRESHOLD {
        0.001
    } else {
        1.0
    }
}

/// Triangle mesh ready for placement, in post-scale units.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<[usize; 3]>,
    pub bbox: BoundingBox,
    /// Scale that was applied by [`auto_scale`].
    pub scale: f64,
}

impl MeshAsset {
    /// Orient and scale raw triangles.
    /// Degenerate and out of range triangles are dropped.
    pub fn from_triangles(
        vertices: Vec<Point3<f64>>,
        triangles: Vec<[usize; 3]>,
        orientation: &Orientation,
    ) -> Result<Self> {
        let nb_vertices = vertices.len();
        let flip = orientation.flips_winding();
        let triangles: Vec<[usize; 3]> = triangles
            .into_iter()
            .filter(|&[a, b, c]| {
                a < nb_vertices && b < nb_vertices && c < nb_vertices && a != b && b != c && a != c
            })
            .map(|[a, b, c]| if flip { [a, c, b] } else { [a, b, c] })
            .collect();
        if triangles.is_empty() {
            return Err(ReliefError::EmptyMesh);
        }

        let transform = orientation.matrix();
        let mut vertices: Vec<Point3<f64>> = vertices
            .iter()
            .map(|p| Point3::from(transform * p.coords))
            .collect();
        let raw_bbox = BoundingBox::from_points(&vertices).ok_or(ReliefError::EmptyMesh)?;
        let scale = auto_scale(&raw_bbox);
        if scale != 1.0 {
            log::info!(
                "Mesh spans {:.1} units, assuming millimeters (scale {})",
                raw_bbox.max_dimension(),
                scale
            );
            vertices
                .iter_mut()
                .for_each(|p| *p = Point3::from(p.coords * scale));
        }
        let bbox = raw_bbox.scaled(scale);
        log::info!(
            "Mesh loaded: {} vertices, {} triangles, size {:.4} x {:.4} x {:.4}",
            vertices.len(),
            triangles.len(),
            bbox.size().x,
            bbox.size().y,
            bbox.size().z
        );
        Ok(Self {
            vertices,
            triangles,
            bbox,
            scale,
        })
    }
}

/// Read a binary or ASCII STL mesh.
pub fn read_stl<R: Read + Seek>(reader: &mut R, orientation: &Orientation) -> Result<MeshAsset> {
    let stl = stl_io::read_stl(reader).map_err(ReliefError::mesh_in_memory)?;
    from_indexed_mesh(stl, orientation)
}

/// Load a binary or ASCII STL file.
pub fn load_stl<P: AsRef<Path>>(path: P, orientation: &Orientation) -> Result<MeshAsset> {
    let path = path.as_ref();
    let load_error = |e: std::io::Error| ReliefError::MeshLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut file = File::open(path).map_err(load_error)?;
    let stl = stl_io::read_stl(&mut file).map_err(load_error)?;
    from_indexed_mesh(stl, orientation)
}

fn from_indexed_mesh(stl: stl_io::IndexedMesh, orientation: &Orientation) -> Result<MeshAsset> {
    let vertices = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
        .collect();
    let triangles = stl.faces.iter().map(|f| f.vertices).collect();
    MeshAsset::from_triangles(vertices, triangles, orientation)
}
