//! Channel width estimation
//!
//! Average widths come from dividing channel area by centerline
//! length, which is insensitive to how densely the centerline is
//! sampled. Two variants are reported: wetted width from the mask as
//! given, and extent width from the mask with interior holes (bars,
//! islands) filled.

use rivnet_core::raster::neighbors;
use rivnet_core::{Error, Pixel, Raster, Result};
use std::collections::VecDeque;

/// Average channel widths in map units
#[derive(Debug, Clone, Copy)]
pub struct WidthEstimate {
    /// Wetted area over centerline length
    pub avg_width_wetted: f64,
    /// Hole-filled (bankfull extent) area over centerline length
    pub avg_width_extent: f64,
}

/// Estimate average channel width from a binary mask and centerline.
///
/// `centerline` is the pixel path of the reach (at least two pixels
/// with nonzero length); `mask` is nonzero on water. Lengths and areas
/// are scaled by the mask's transform.
pub fn chan_width(centerline: &[Pixel], mask: &Raster<u8>) -> Result<WidthEstimate> {
    if centerline.len() < 2 {
        return Err(Error::precondition(
            "chan_width",
            "centerline needs at least two pixels",
        ));
    }
    let length_px: f64 = centerline
        .windows(2)
        .map(|w| rivnet_core::raster::pixel_distance(w[0], w[1]))
        .sum();
    if length_px == 0.0 {
        return Err(Error::precondition(
            "chan_width",
            "centerline has zero length",
        ));
    }
    let (rows, cols) = mask.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    let wetted_px = mask.data().iter().filter(|&&v| v != 0).count();
    let holes_px = interior_hole_pixels(mask);

    let length = length_px * mask.pixel_length();
    let area = mask.pixel_area();
    Ok(WidthEstimate {
        avg_width_wetted: wetted_px as f64 * area / length,
        avg_width_extent: (wetted_px + holes_px) as f64 * area / length,
    })
}

/// Count background pixels not connected to the raster border:
/// interior holes of the mask.
fn interior_hole_pixels(mask: &Raster<u8>) -> usize {
    let (rows, cols) = mask.shape();
    let mut outside = vec![false; rows * cols];
    let mut queue: VecDeque<Pixel> = VecDeque::new();

    let mut seed = |r: usize, c: usize, outside: &mut Vec<bool>, queue: &mut VecDeque<Pixel>| {
        // Borders are background seeds
        if mask.get(r, c).map(|v| v == 0).unwrap_or(false) && !outside[r * cols + c] {
            outside[r * cols + c] = true;
            queue.push_back((r, c));
        }
    };
    for c in 0..cols {
        seed(0, c, &mut outside, &mut queue);
        seed(rows - 1, c, &mut outside, &mut queue);
    }
    for r in 0..rows {
        seed(r, 0, &mut outside, &mut queue);
        seed(r, cols - 1, &mut outside, &mut queue);
    }

    while let Some((r, c)) = queue.pop_front() {
        for (nr, nc) in neighbors(r, c, rows, cols) {
            let i = nr * cols + nc;
            if !outside[i] && mask.get(nr, nc).map(|v| v == 0).unwrap_or(false) {
                outside[i] = true;
                queue.push_back((nr, nc));
            }
        }
    }

    mask.data()
        .indexed_iter()
        .filter(|&((r, c), &v)| v == 0 && !outside[r * cols + c])
        .count()
}

/// Resample a polyline to `n` points evenly spaced by arc length.
///
/// The first and last input points are preserved. Points are (x, y)
/// pairs in any consistent unit.
pub fn resample_line(points: &[(f64, f64)], n: usize) -> Result<Vec<(f64, f64)>> {
    if points.len() < 2 {
        return Err(Error::precondition(
            "resample_line",
            "polyline needs at least two points",
        ));
    }
    if n < 2 {
        return Err(Error::precondition(
            "resample_line",
            "at least two output points are required",
        ));
    }

    // Cumulative arc length per vertex
    let mut cumulative = Vec::with_capacity(points.len());
    cumulative.push(0.0);
    for w in points.windows(2) {
        let (dx, dy) = (w[1].0 - w[0].0, w[1].1 - w[0].1);
        let seg = (dx * dx + dy * dy).sqrt();
        cumulative.push(cumulative.last().copied().unwrap_or(0.0) + seg);
    }
    let total = *cumulative.last().unwrap_or(&0.0);
    if total == 0.0 {
        return Err(Error::precondition(
            "resample_line",
            "polyline has zero length",
        ));
    }

    let mut out = Vec::with_capacity(n);
    let mut seg = 0usize;
    for k in 0..n {
        let target = total * k as f64 / (n - 1) as f64;
        while seg + 1 < cumulative.len() - 1 && cumulative[seg + 1] < target {
            seg += 1;
        }
        let span = cumulative[seg + 1] - cumulative[seg];
        let t = if span == 0.0 {
            0.0
        } else {
            (target - cumulative[seg]) / span
        };
        let (p0, p1) = (points[seg], points[seg + 1]);
        out.push((p0.0 + (p1.0 - p0.0) * t, p0.1 + (p1.1 - p0.1) * t));
    }
    // Guard against accumulation error at the far end
    if let Some(last) = out.last_mut() {
        *last = points[points.len() - 1];
    }
    Ok(out)
}
