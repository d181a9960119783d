// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Relief-only heightfield surface, exported as STL for preview.
//!
//! This is an open grid sheet, not a closed solid.

use nalgebra::{DMatrix, Matrix4, Point3};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::compose::PlaneTransform;
use crate::error::Result;

/// Regular grid surface sampled from a displacement field.
#[derive(Debug, Clone)]
pub struct HeightfieldMesh {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<[usize; 3]>,
    /// Number of sampled (columns, rows).
    pub grid: (usize, usize),
}

/// Grid spanning `[-width/2, width/2] x [-height/2, height/2]`, with
/// `z = value * depth`. The first field row lands on the `+y` side.
/// One sample every `stride` texels, the last row and column always included,
/// two triangles per grid cell, facing `+z`.
pub fn heightfield_mesh(
    field: &DMatrix<f32>,
    width: f64,
    height: f64,
    depth: f64,
    stride: usize,
) -> HeightfieldMesh {
    let (nrows, ncols) = field.shape();
    let col_samples = sample_indices(ncols, stride);
    let row_samples = sample_indices(nrows, stride);
    let (cols, rows) = (col_samples.len(), row_samples.len());
    if cols < 2 || rows < 2 {
        log::warn!("Field of {}x{} texels is too small for a relief grid", ncols, nrows);
        return HeightfieldMesh {
            vertices: Vec::new(),
            triangles: Vec::new(),
            grid: (cols, rows),
        };
    }

    // Vertices sit at their texel position, so the sheet matches the texture.
    let mut vertices = Vec::with_capacity(cols * rows);
    for &r in row_samples.iter() {
        let y = 0.5 * height - height * r as f64 / (nrows - 1) as f64;
        for &c in col_samples.iter() {
            let x = -0.5 * width + width * c as f64 / (ncols - 1) as f64;
            let z = field[(r, c)] as f64 * depth;
            vertices.push(Point3::new(x, y, z));
        }
    }

    let mut triangles = Vec::with_capacity(2 * (cols - 1) * (rows - 1));
    for j in 0..rows - 1 {
        for i in 0..cols - 1 {
            let k = j * cols + i;
            triangles.push([k, k + cols, k + 1]);
            triangles.push([k + 1, k + cols, k + cols + 1]);
        }
    }

    HeightfieldMesh {
        vertices,
        triangles,
        grid: (cols, rows),
    }
}

/// Texel indices `0, stride, 2 stride, ...` followed by `len - 1` if it was skipped.
fn sample_indices(len: usize, stride: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let last = len - 1;
    let mut indices: Vec<usize> = (0..len).step_by(stride.max(1)).collect();
    if indices.last() != Some(&last) {
        indices.push(last);
    }
    indices
}

/// Relief surface placed on the object, in box units.
pub fn relief_on_plane(field: &DMatrix<f32>, plane: &PlaneTransform, stride: usize) -> HeightfieldMesh {
    let mut mesh = heightfield_mesh(field, 1.0, 1.0, plane.displacement_scale, stride);
    mesh.transform(&plane.model_matrix());
    if plane.mirror_u != plane.mirror_v {
        mesh.flip_winding();
    }
    mesh
}

impl HeightfieldMesh {
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        self.vertices
            .iter_mut()
            .for_each(|p| *p = matrix.transform_point(p));
    }

    pub fn flip_winding(&mut self) {
        self.triangles.iter_mut().for_each(|t| t.swap(1, 2));
    }

    pub fn to_stl_triangles(&self) -> Vec<stl_io::Triangle> {
        let to_vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);
        self.triangles
            .iter()
            .map(|&[a, b, c]| {
                let (p0, p1, p2) = (&self.vertices[a], &self.vertices[b], &self.vertices[c]);
                let n = (p1 - p0)
                    .cross(&(p2 - p0))
                    .try_normalize(1e-18)
                    .unwrap_or_else(nalgebra::Vector3::z);
                stl_io::Triangle {
                    normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                    vertices: [to_vertex(p0), to_vertex(p1), to_vertex(p2)],
                }
            })
            .collect()
    }

    /// Write as binary STL.
    pub fn write_stl<W: Write>(&self, writer: &mut W) -> Result<()> {
        let triangles = self.to_stl_triangles();
        stl_io::write_stl(writer, triangles.iter())?;
        Ok(())
    }

    pub fn save_stl<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_stl(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{compose, ReliefParams};
    use crate::face::{face_placement, FaceCode};
    use crate::fit::{DesignTarget, DEFAULT_MARGIN};
    use crate::geometry::BoundingBox;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::io::Cursor;

    #[test]
    fn grid_layout_and_heights() {
        let field = DMatrix::from_row_slice(2, 3, &[0.0, 0.5, 1.0, 0.0, 0.0, 0.0]);
        let mesh = heightfield_mesh(&field, 120.0, 60.0, 2.0, 1);
        assert_eq!(mesh.grid, (3, 2));
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangles.len(), 4);
        assert_eq!(mesh.vertices[0], Point3::new(-60.0, 30.0, 0.0));
        assert_eq!(mesh.vertices[2], Point3::new(60.0, 30.0, 2.0));
        assert_eq!(mesh.vertices[4], Point3::new(0.0, -30.0, 0.0));
    }

    #[test]
    fn flat_grid_faces_up() {
        let field = DMatrix::zeros(4, 4);
        let mesh = heightfield_mesh(&field, 1.0, 1.0, 1.0, 1);
        for tri in mesh.to_stl_triangles() {
            assert_relative_eq!(tri.normal[2], 1.0);
        }
    }

    #[test]
    fn stride_subsamples() {
        let field = DMatrix::zeros(9, 5);
        let mesh = heightfield_mesh(&field, 1.0, 1.0, 1.0, 4);
        assert_eq!(mesh.grid, (2, 3));
        assert_eq!(mesh.triangles.len(), 4);
        let tiny = heightfield_mesh(&DMatrix::zeros(1, 8), 1.0, 1.0, 1.0, 1);
        assert!(tiny.triangles.is_empty());
    }

    #[test]
    fn stride_keeps_last_texels() {
        let field = DMatrix::from_fn(5, 10, |r, c| (r * 10 + c) as f32);
        let mesh = heightfield_mesh(&field, 9.0, 4.0, 1.0, 4);
        // Columns 0, 4, 8, 9 and rows 0, 4.
        assert_eq!(mesh.grid, (4, 2));
        assert_eq!(mesh.triangles.len(), 6);
        let last = mesh.vertices[mesh.vertices.len() - 1];
        assert_eq!(last, Point3::new(4.5, -2.0, 49.0));
        assert_eq!(mesh.vertices[2], Point3::new(3.5, 2.0, 8.0));

        // Two rows with the default CLI stride still make a sheet.
        let thin = heightfield_mesh(&DMatrix::zeros(2, 50), 1.0, 1.0, 1.0, 2);
        assert_eq!(thin.grid, (26, 2));
        assert_eq!(thin.triangles.len(), 50);
    }

    #[test]
    fn stl_round_trip_keeps_triangle_count() {
        let field = DMatrix::from_fn(5, 6, |r, c| ((r + c) % 3) as f32 / 2.0);
        let mesh = heightfield_mesh(&field, 10.0, 8.0, 1.0, 1);
        let mut buffer = Cursor::new(Vec::new());
        mesh.write_stl(&mut buffer).unwrap();
        buffer.set_position(0);
        let stl = stl_io::read_stl(&mut buffer).unwrap();
        assert_eq!(stl.faces.len(), mesh.triangles.len());
    }

    #[test]
    fn relief_is_placed_on_the_face() {
        let bbox = BoundingBox::centered(Vector3::new(0.2, 0.3, 0.15));
        let target = DesignTarget::default();
        let placement = face_placement(&bbox, FaceCode::PosX);
        let fit = target.plan_on(&bbox, FaceCode::PosX, DEFAULT_MARGIN);
        let plane = compose(&placement, &fit, &target, &ReliefParams::default(), (4, 4));
        let field = DMatrix::repeat(4, 4, 1.0);
        let mesh = relief_on_plane(&field, &plane, 1);
        for p in mesh.vertices.iter() {
            // Raised by the full depth along +x.
            assert_relative_eq!(p.x, placement.position.x + 0.002, epsilon = 1e-12);
        }
        for tri in mesh.to_stl_triangles() {
            assert_relative_eq!(tri.normal[0], 1.0, epsilon = 1e-6);
        }
    }
}
