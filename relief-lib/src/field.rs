// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Displacement and normal fields from a single photograph.
//!
//! The pipeline runs once per source image:
//! luminance, percentile normalization, binomial blur,
//! unsharp mask with tone shaping, and finally Sobel normals.
//! Fields are column major matrices with `nrows = height`.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use nalgebra::{DMatrix, Vector3};
use std::cmp::Ordering;
use std::io::Cursor;

#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::error::{ReliefError, Result};
use crate::interop;
use crate::utils::{clamp01, clamp_index, luma_bt709, percentile_sorted};

/// 5 taps binomial kernel, sums to 16.
const BINOMIAL_5: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];

/// Configuration (parameters) of the field construction.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FieldConfig {
    /// Working resolution cap, per axis.
    pub max_resolution: u32,
    pub low_percentile: f32,
    pub high_percentile: f32,
    /// Below this percentile span the image is considered flat.
    pub min_span: f32,
    /// Weight of the high frequencies in the unsharp mask.
    pub unsharp_amount: f32,
    pub gamma: f32,
    pub gain: f32,
    /// Gradient gain applied before normalizing the normals.
    pub normal_strength: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            max_resolution: 1024,
            low_percentile: 0.04,
            high_percentile: 0.96,
            min_span: 1e-6,
            unsharp_amount: 1.2,
            gamma: 0.85,
            gain: 1.5,
            normal_strength: 2.2,
        }
    }
}

/// Output of one field construction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReliefFields {
    /// Enhanced luminance in [0,1], used as displacement.
    pub displacement: DMatrix<f32>,
    /// Unit tangent space normals.
    pub normals: DMatrix<Vector3<f32>>,
}

impl ReliefFields {
    pub fn width(&self) -> usize {
        self.displacement.ncols()
    }

    pub fn height(&self) -> usize {
        self.displacement.nrows()
    }

    /// Displacement as 8 bit gray levels.
    pub fn displacement_gray(&self) -> DMatrix<u8> {
        self.displacement.map(|d| (clamp01(d) * 255.0).round() as u8)
    }

    /// Normals packed into bytes with `(n * 0.5 + 0.5) * 255`.
    pub fn normal_rgb(&self) -> DMatrix<(u8, u8, u8)> {
        self.normals.map(|n| pack_normal(&n))
    }

    pub fn displacement_png(&self) -> Result<Vec<u8>> {
        interop::encode_png(&self.displacement_gray())
    }

    pub fn normal_png(&self) -> Result<Vec<u8>> {
        interop::encode_png(&self.normal_rgb())
    }

    /// Nearest texel displacement at normalized texture coordinates.
    /// `v = 0` is the bottom row, like GPU texture space.
    pub fn sample_displacement(&self, u: f32, v: f32) -> f32 {
        self.displacement[self.texel(u, v)]
    }

    pub fn sample_normal(&self, u: f32, v: f32) -> Vector3<f32> {
        self.normals[self.texel(u, v)]
    }

    fn texel(&self, u: f32, v: f32) -> (usize, usize) {
        let col = (clamp01(u) * (self.width() - 1) as f32).round() as usize;
        let row = ((1.0 - clamp01(v)) * (self.height() - 1) as f32).round() as usize;
        (row, col)
    }
}

/// Decode an encoded image (png, jpeg) from memory.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = image::io::Reader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.decode().map_err(ReliefError::Decode)
}

/// Decode then build the fields of an encoded image.
pub fn build_from_bytes(bytes: &[u8], config: &FieldConfig) -> Result<ReliefFields> {
    let img = decode_image(bytes)?;
    build_fields(&img, config)
}

/// Compute the displacement and normal fields of an image.
pub fn build_fields(img: &DynamicImage, config: &FieldConfig) -> Result<ReliefFields> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ReliefError::EmptyImage { width, height });
    }
    let rgb = working_image(img, config.max_resolution);
    log::info!(
        "Building relief fields at {}x{} (source {}x{})",
        rgb.width(),
        rgb.height(),
        width,
        height
    );

    let mut lum = luminance(&interop::matrix_from_rgb_image(&rgb));
    let (low, high) = percentile_normalize(&mut lum, config);
    log::debug!("Percentile range: [{:.4}, {:.4}]", low, high);

    let base = binomial_blur(&lum);
    let displacement = enhance(&lum, &base, config);
    let normals = sobel_normals(&displacement, config.normal_strength);
    log::debug!("Mean displacement: {:.4}", displacement.mean());

    Ok(ReliefFields {
        displacement,
        normals,
    })
}

/// Downsample so that no axis exceeds `max_resolution`.
/// Smaller images are kept at their native size.
pub fn working_image(img: &DynamicImage, max_resolution: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let largest = width.max(height);
    if largest <= max_resolution {
        return img.to_rgb8();
    }
    let scale = max_resolution as f64 / largest as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1).min(max_resolution);
    let new_height = ((height as f64 * scale).round() as u32).max(1).min(max_resolution);
    img.resize_exact(new_width, new_height, FilterType::Triangle)
        .into_rgb8()
}

/// BT.709 luminance of each pixel.
pub fn luminance(rgb: &DMatrix<(u8, u8, u8)>) -> DMatrix<f32> {
    rgb.map(luma_bt709)
}

/// Rescale in place so that the low percentile maps to 0 and the high one to 1,
/// clamping the outliers. Returns the (low, high) percentile values.
///
/// A span below `min_span` (flat image) gives a uniform mid-gray field.
pub fn percentile_normalize(field: &mut DMatrix<f32>, config: &FieldConfig) -> (f32, f32) {
    let mut sorted: Vec<f32> = field.iter().cloned().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let low = percentile_sorted(&sorted, config.low_percentile);
    let high = percentile_sorted(&sorted, config.high_percentile);
    let span = high - low;
    if span < config.min_span {
        log::debug!("Flat luminance around {:.4}, using mid-gray", low);
        field.fill(0.5);
        return (low, high);
    }
    field
        .iter_mut()
        .for_each(|x| *x = clamp01((*x - low) / span));
    (low, high)
}

/// Separable [1,4,6,4,1] / 16 blur, horizontal then vertical, clamp to edge.
pub fn binomial_blur(field: &DMatrix<f32>) -> DMatrix<f32> {
    let (nrows, ncols) = field.shape();
    let horizontal = DMatrix::from_fn(nrows, ncols, |r, c| {
        let acc: f32 = BINOMIAL_5
            .iter()
            .enumerate()
            .map(|(k, w)| w * field[(r, clamp_index(c as isize + k as isize - 2, ncols))])
            .sum();
        acc / 16.0
    });
    DMatrix::from_fn(nrows, ncols, |r, c| {
        let acc: f32 = BINOMIAL_5
            .iter()
            .enumerate()
            .map(|(k, w)| w * horizontal[(clamp_index(r as isize + k as isize - 2, nrows), c)])
            .sum();
        acc / 16.0
    })
}

/// Unsharp mask followed by gamma, smoothstep contrast and global gain.
pub fn enhance(field: &DMatrix<f32>, blurred: &DMatrix<f32>, config: &FieldConfig) -> DMatrix<f32> {
    field.zip_map(blurred, |x, base| {
        let highpass = x - base;
        let v = clamp01(x + config.unsharp_amount * highpass);
        let v = v.powf(config.gamma);
        let v = v * v * (3.0 - 2.0 * v);
        clamp01(v * config.gain)
    })
}

/// Tangent space normals from the Sobel gradients of a height field.
///
/// `gx` grows toward increasing columns (+u) and `gy` toward the top row (+v),
/// so that the normal `(-k gx, -k gy, 1)` leans away from the slope.
pub fn sobel_normals(field: &DMatrix<f32>, strength: f32) -> DMatrix<Vector3<f32>> {
    let (nrows, ncols) = field.shape();
    let at = |r: isize, c: isize| field[(clamp_index(r, nrows), clamp_index(c, ncols))];
    DMatrix::from_fn(nrows, ncols, |r, c| {
        let (r, c) = (r as isize, c as isize);
        let gx = (at(r - 1, c + 1) + 2.0 * at(r, c + 1) + at(r + 1, c + 1))
            - (at(r - 1, c - 1) + 2.0 * at(r, c - 1) + at(r + 1, c - 1));
        let gy = (at(r - 1, c - 1) + 2.0 * at(r - 1, c) + at(r - 1, c + 1))
            - (at(r + 1, c - 1) + 2.0 * at(r + 1, c) + at(r + 1, c + 1));
        Vector3::new(-gx * strength, -gy * strength, 1.0).normalize()
    })
}

pub fn pack_normal(n: &Vector3<f32>) -> (u8, u8, u8) {
    let pack = |x: f32| (clamp01(x * 0.5 + 0.5) * 255.0) as u8;
    (pack(n.x), pack(n.y), pack(n.z))
}

pub fn unpack_normal((r, g, b): (u8, u8, u8)) -> Vector3<f32> {
    let unpack = |x: u8| x as f32 / 255.0 * 2.0 - 1.0;
    Vector3::new(unpack(r), unpack(g), unpack(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{ImageBuffer, Rgb};

    fn uniform_image(width: u32, height: u32, gray: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([gray, gray, gray])))
    }

    /// Horizontal ramp, brighter to the right.
    fn ramp_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, _| {
            let v = (x * 255 / (width - 1)) as u8;
            Rgb([v, v, v])
        }))
    }

    #[test]
    fn uniform_image_gives_flat_fields() {
        for &(w, h) in &[(1, 1), (7, 3), (40, 25)] {
            let fields = build_fields(&uniform_image(w, h, 128), &FieldConfig::default()).unwrap();
            assert_eq!((fields.width(), fields.height()), (w as usize, h as usize));
            let first = fields.displacement[(0, 0)];
            assert!(fields.displacement.iter().all(|d| (d - first).abs() < 1e-6));
            for n in fields.normal_rgb().iter() {
                let decoded = unpack_normal(*n);
                assert!(decoded.x.abs() < 0.01 && decoded.y.abs() < 0.01);
                assert!((decoded.z - 1.0).abs() < 0.01);
            }
        }
    }

    #[test]
    fn uniform_image_is_deterministic() {
        let img = uniform_image(16, 9, 77);
        let a = build_fields(&img, &FieldConfig::default()).unwrap();
        let b = build_fields(&img, &FieldConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn large_images_are_downsampled_keeping_aspect() {
        let img = uniform_image(2048, 1024, 10);
        let rgb = working_image(&img, 1024);
        assert_eq!(rgb.dimensions(), (1024, 512));
        let small = uniform_image(300, 200, 10);
        assert_eq!(working_image(&small, 1024).dimensions(), (300, 200));
    }

    #[test]
    fn empty_image_is_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 4));
        match build_fields(&img, &FieldConfig::default()) {
            Err(ReliefError::EmptyImage { width: 0, height: 4 }) => (),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn percentiles_map_to_unit_range() {
        let mut field = DMatrix::from_fn(1, 101, |_, c| c as f32 / 100.0);
        let (low, high) = percentile_normalize(&mut field, &FieldConfig::default());
        assert_relative_eq!(low, 0.04);
        assert_relative_eq!(high, 0.96);
        assert_eq!(field[(0, 0)], 0.0);
        assert_eq!(field[(0, 4)], 0.0);
        assert_relative_eq!(field[(0, 50)], 0.5, epsilon = 1e-5);
        assert_eq!(field[(0, 96)], 1.0);
        assert_eq!(field[(0, 100)], 1.0);
    }

    #[test]
    fn flat_field_normalizes_to_mid_gray() {
        let mut field = DMatrix::repeat(3, 3, 0.3);
        percentile_normalize(&mut field, &FieldConfig::default());
        assert!(field.iter().all(|x| *x == 0.5));
    }

    #[test]
    fn uniform_image_displacement_is_mid_tone() {
        let fields = build_fields(&uniform_image(8, 8, 200), &FieldConfig::default()).unwrap();
        let v = 0.5f32.powf(0.85);
        let expected = (v * v * (3.0 - 2.0 * v) * 1.5).min(1.0);
        assert!(fields.displacement.iter().all(|d| (d - expected).abs() < 1e-6));
        assert!(expected > 0.0 && expected < 1.0);
    }

    #[test]
    fn blur_preserves_constants_and_spreads_impulses() {
        let flat = DMatrix::repeat(4, 6, 0.25);
        let blurred = binomial_blur(&flat);
        assert!(blurred.iter().all(|x| (x - 0.25).abs() < 1e-6));

        let mut impulse = DMatrix::zeros(9, 9);
        impulse[(4, 4)] = 1.0;
        let blurred = binomial_blur(&impulse);
        assert_relative_eq!(blurred[(4, 4)], 36.0 / 256.0, epsilon = 1e-6);
        assert_relative_eq!(blurred[(4, 5)], 24.0 / 256.0, epsilon = 1e-6);
        assert_relative_eq!(blurred[(2, 2)], 1.0 / 256.0, epsilon = 1e-6);
        assert_relative_eq!(blurred.sum(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn enhance_shapes_tones() {
        let config = FieldConfig::default();
        let field = DMatrix::from_row_slice(1, 3, &[0.0, 0.5, 1.0]);
        let out = enhance(&field, &field, &config);
        assert_eq!(out[(0, 0)], 0.0);
        assert_eq!(out[(0, 2)], 1.0);
        let v = 0.5f32.powf(0.85);
        let expected = (v * v * (3.0 - 2.0 * v) * 1.5).min(1.0);
        assert_relative_eq!(out[(0, 1)], expected, epsilon = 1e-6);
    }

    #[test]
    fn normals_lean_away_from_slope() {
        // Height grows with the column index.
        let field = DMatrix::from_fn(5, 5, |_, c| c as f32 * 0.1);
        let normals = sobel_normals(&field, 2.2);
        let n = normals[(2, 2)];
        assert!(n.x < 0.0);
        assert_relative_eq!(n.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-6);
        let gx = 0.8f32;
        assert_relative_eq!(n.x, -gx * 2.2 / (gx * gx * 2.2 * 2.2 + 1.0).sqrt(), epsilon = 1e-5);

        // Height grows toward the top row: normal leans down (-v).
        let field = DMatrix::from_fn(5, 5, |r, _| (4 - r) as f32 * 0.1);
        assert!(sobel_normals(&field, 2.2)[(2, 2)].y < 0.0);
    }

    #[test]
    fn ramp_produces_tilted_normals() {
        let fields = build_fields(&ramp_image(32, 8), &FieldConfig::default()).unwrap();
        let left = fields.sample_displacement(0.0, 0.5);
        let right = fields.sample_displacement(1.0, 0.5);
        assert!(left < right);
        assert!(fields.sample_normal(0.5, 0.5).x < 0.0);
    }

    #[test]
    fn pack_normal_layout() {
        assert_eq!(pack_normal(&Vector3::new(0.0, 0.0, 1.0)), (127, 127, 255));
        assert_eq!(pack_normal(&Vector3::new(-1.0, 1.0, 0.0)), (0, 255, 127));
    }

    #[test]
    fn rasters_encode_to_png() {
        let fields = build_fields(&ramp_image(10, 4), &FieldConfig::default()).unwrap();
        let png = fields.normal_png().unwrap();
        let decoded = decode_image(&png).unwrap();
        assert_eq!(decoded.dimensions(), (10, 4));
        let gray = decode_image(&fields.displacement_png().unwrap()).unwrap();
        assert_eq!(gray.color(), image::ColorType::L8);
        assert_eq!(gray.dimensions(), (10, 4));
        // Brightest texel on the right of the ramp.
        assert_eq!(gray.to_luma8().get_pixel(9, 0)[0], fields.displacement_gray()[(0, 9)]);
    }
}
