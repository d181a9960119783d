// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper module for functions that didn't fit anywhere else.

/// Relative luminance of an 8 bit RGB pixel, in [0,1].
/// Rec. ITU-R BT.709 weights: 0.2126 * R + 0.7152 * G + 0.0722 * B
pub fn luma_bt709((r, g, b): (u8, u8, u8)) -> f32 {
    (0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32) / 255.0
}

/// Clamp a possibly out of range index to the nearest valid one.
/// Used for clamp-to-edge sampling of kernels at field boundaries.
pub fn clamp_index(i: isize, len: usize) -> usize {
    if i <= 0 {
        0
    } else {
        (i as usize).min(len - 1)
    }
}

pub fn clamp01(x: f32) -> f32 {
    x.max(0.0).min(1.0)
}

/// Nearest rank percentile of already sorted values.
/// `p` is in [0,1], the index picked is `round(p * (n - 1))`.
pub fn percentile_sorted(sorted: &[f32], p: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    let idx = (p.max(0.0).min(1.0) * last as f32).round() as usize;
    sorted[idx.min(last)]
}
