// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Conversions between `image` rasters and the matrices the fields live in.

use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Luma, Primitive, Rgb, RgbImage};
use nalgebra::{DMatrix, Scalar};

use crate::error::{ReliefError, Result};

// Matrix -> Image -------------------------------------------------------------
// -----------------------------------------------------------------------------

/// Convert a matrix into a gray level image.
///
/// Matrices are column major with `nrows = height`,
/// hence the index swap while filling the row major buffer.
#[allow(clippy::cast_possible_truncation)]
pub fn image_from_matrix<T: Scalar + Primitive>(mat: &DMatrix<T>) -> ImageBuffer<Luma<T>, Vec<T>> {
    let (nb_rows, nb_cols) = mat.shape();
    let mut img_buf = ImageBuffer::new(nb_cols as u32, nb_rows as u32);
    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        *pixel = Luma([mat[(y as usize, x as usize)]]);
    }
    img_buf
}

/// Convert a `(T, T, T)` matrix into an RGB image.
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_from_matrix<T: Scalar + Primitive>(
    mat: &DMatrix<(T, T, T)>,
) -> ImageBuffer<Rgb<T>, Vec<T>> {
    let (nb_rows, nb_cols) = mat.shape();
    let mut img_buf = ImageBuffer::new(nb_cols as u32, nb_rows as u32);
    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        let (r, g, b) = mat[(y as usize, x as usize)];
        *pixel = Rgb([r, g, b]);
    }
    img_buf
}

pub trait ToImage {
    fn to_image(&self) -> DynamicImage;
}

impl ToImage for DMatrix<u8> {
    fn to_image(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(image_from_matrix(self))
    }
}

impl ToImage for DMatrix<(u8, u8, u8)> {
    fn to_image(&self) -> DynamicImage {
        DynamicImage::ImageRgb8(rgb_from_matrix(self))
    }
}

/// Encode any matrix raster as an in-memory PNG file.
pub fn encode_png<Im: ToImage>(mat: &Im) -> Result<Vec<u8>> {
    let img = mat.to_image();
    let mut buffer: Vec<u8> = Vec::new();
    img.write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(ReliefError::Encode)?;
    Ok(buffer)
}

// Image -> Matrix -------------------------------------------------------------
// -----------------------------------------------------------------------------

/// Convert an RGB image into a `(u8, u8, u8)` matrix.
/// Inverse operation of `rgb_from_matrix`.
pub fn matrix_from_rgb_image(img: &RgbImage) -> DMatrix<(u8, u8, u8)> {
    let (width, height) = img.dimensions();
    DMatrix::from_fn(height as usize, width as usize, |row, col| {
        let Rgb([r, g, b]) = *img.get_pixel(col as u32, row as u32);
        (r, g, b)
    })
}
