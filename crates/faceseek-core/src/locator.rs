//! Cascade-style face locator.
//!
//! Multi-scale sliding-window classifier over grayscale intensity, built on
//! an integral image. Haar-like contrast stages (eye band vs cheek band,
//! eyes vs nose bridge) reject windows cheaply; surviving hits are grouped
//! by rectangle overlap and a minimum-neighbor count. Deterministic given
//! identical pixel input: fixed scan order, no randomness.

use crate::types::Region;
use image::{DynamicImage, GenericImageView, GrayImage};

// --- Named constants (defaults for the tunable fields) ---
const MIN_FACE_SIZE: u32 = 24;
const SCALE_FACTOR: f32 = 1.2;
const MIN_NEIGHBORS: usize = 3;
const PADDING_FRACTION: f32 = 0.10;
const GROUP_OVERLAP: f32 = 0.3;
const STRIDE_DIVISOR: u32 = 8;
const MIN_WINDOW_VARIANCE: f64 = 64.0;
const STAGE_CONTRAST_MARGIN: f64 = 8.0;

/// Summed-area table over a grayscale image, with squared sums for variance.
struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let width = gray.width() as usize;
        let height = gray.height() as usize;
        let stride = width + 1;
        let mut sum = vec![0u64; stride * (height + 1)];
        let mut sq_sum = vec![0u64; stride * (height + 1)];

        for y in 0..height {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..width {
                let p = gray.get_pixel(x as u32, y as u32).0[0] as u64;
                row += p;
                row_sq += p * p;
                sum[(y + 1) * stride + (x + 1)] = sum[y * stride + (x + 1)] + row;
                sq_sum[(y + 1) * stride + (x + 1)] = sq_sum[y * stride + (x + 1)] + row_sq;
            }
        }

        Self { width, height, sum, sq_sum }
    }

    fn rect_sum(&self, table: &[u64], x: u32, y: u32, w: u32, h: u32) -> u64 {
        let stride = self.width + 1;
        let (x0, y0) = (x as usize, y as usize);
        let x1 = (x0 + w as usize).min(self.width);
        let y1 = (y0 + h as usize).min(self.height);
        table[y1 * stride + x1] + table[y0 * stride + x0]
            - table[y0 * stride + x1]
            - table[y1 * stride + x0]
    }

    fn rect_mean(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let n = (w as u64 * h as u64).max(1) as f64;
        self.rect_sum(&self.sum, x, y, w, h) as f64 / n
    }

    fn rect_variance(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let n = (w as u64 * h as u64).max(1) as f64;
        let mean = self.rect_sum(&self.sum, x, y, w, h) as f64 / n;
        let mean_sq = self.rect_sum(&self.sq_sum, x, y, w, h) as f64 / n;
        (mean_sq - mean * mean).max(0.0)
    }
}

/// Finds the most probable face region within an image.
#[derive(Debug, Clone)]
pub struct FaceLocator {
    /// Smallest sliding-window side length, in pixels.
    pub min_face_size: u32,
    /// Geometric step between window scales.
    pub scale_factor: f32,
    /// Overlapping raw hits required before a candidate is accepted.
    pub min_neighbors: usize,
    /// Context margin added around the selected face, as a fraction of width.
    pub padding_fraction: f32,
}

impl Default for FaceLocator {
    fn default() -> Self {
        Self {
            min_face_size: MIN_FACE_SIZE,
            scale_factor: SCALE_FACTOR,
            min_neighbors: MIN_NEIGHBORS,
            padding_fraction: PADDING_FRACTION,
        }
    }
}

impl FaceLocator {
    /// Detect all candidate face regions, grouped and deterministic.
    pub fn detect(&self, image: &DynamicImage) -> Vec<Region> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        if width < self.min_face_size || height < self.min_face_size {
            return Vec::new();
        }

        let integral = IntegralImage::new(&gray);
        let max_side = width.min(height);
        let mut hits = Vec::new();

        let mut scale = self.min_face_size as f32;
        while scale.round() as u32 <= max_side {
            let side = scale.round() as u32;
            let stride = (side / STRIDE_DIVISOR).max(2);
            let mut y = 0;
            while y + side <= height {
                let mut x = 0;
                while x + side <= width {
                    if classify_window(&integral, x, y, side) {
                        hits.push(Region { x, y, width: side, height: side });
                    }
                    x += stride;
                }
                y += stride;
            }
            scale *= self.scale_factor;
        }

        let grouped = group_hits(&hits, GROUP_OVERLAP, self.min_neighbors);
        tracing::debug!(raw = hits.len(), grouped = grouped.len(), "face detection pass");
        grouped
    }

    /// Locate the most probable face: largest candidate (ties broken
    /// top-left-most), expanded by the padding margin and clipped to bounds.
    ///
    /// `None` means no face; callers fall back to the full image.
    pub fn locate(&self, image: &DynamicImage) -> Option<Region> {
        let candidates = self.detect(image);
        let best = candidates.into_iter().min_by(|a, b| {
            b.area()
                .cmp(&a.area())
                .then(a.x.cmp(&b.x))
                .then(a.y.cmp(&b.y))
        })?;
        Some(best.expanded(self.padding_fraction, image.width(), image.height()))
    }

    /// Number of candidate face regions in the image.
    pub fn count(&self, image: &DynamicImage) -> usize {
        self.detect(image).len()
    }
}

/// Window-relative band, in fractions of the window side.
fn band(x: u32, y: u32, side: u32, fx0: f32, fy0: f32, fx1: f32, fy1: f32) -> (u32, u32, u32, u32) {
    let s = side as f32;
    let bx = x + (s * fx0) as u32;
    let by = y + (s * fy0) as u32;
    let bw = ((s * (fx1 - fx0)) as u32).max(1);
    let bh = ((s * (fy1 - fy0)) as u32).max(1);
    (bx, by, bw, bh)
}

/// Haar-like stage tests for one square window.
///
/// Stage 1 rejects flat regions by variance. Stage 2 requires the eye band
/// to be darker than the cheek band. Stage 3 requires the nose bridge to be
/// brighter than both eye sockets.
fn classify_window(integral: &IntegralImage, x: u32, y: u32, side: u32) -> bool {
    if integral.rect_variance(x, y, side, side) < MIN_WINDOW_VARIANCE {
        return false;
    }

    let (ex, ey, ew, eh) = band(x, y, side, 0.10, 0.20, 0.90, 0.45);
    let (cx, cy, cw, ch) = band(x, y, side, 0.10, 0.50, 0.90, 0.78);
    let eye_band = integral.rect_mean(ex, ey, ew, eh);
    let cheek_band = integral.rect_mean(cx, cy, cw, ch);
    if cheek_band - eye_band < STAGE_CONTRAST_MARGIN {
        return false;
    }

    let (lx, ly, lw, lh) = band(x, y, side, 0.12, 0.20, 0.38, 0.45);
    let (rx, ry, rw, rh) = band(x, y, side, 0.62, 0.20, 0.88, 0.45);
    let (bx, by, bw, bh) = band(x, y, side, 0.40, 0.20, 0.60, 0.45);
    let left_eye = integral.rect_mean(lx, ly, lw, lh);
    let right_eye = integral.rect_mean(rx, ry, rw, rh);
    let bridge = integral.rect_mean(bx, by, bw, bh);

    bridge - left_eye >= STAGE_CONTRAST_MARGIN && bridge - right_eye >= STAGE_CONTRAST_MARGIN
}

/// Intersection-over-union between two regions.
fn overlap(a: &Region, b: &Region) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) as f32 * (y2 - y1) as f32;
    let union = a.area() as f32 + b.area() as f32 - inter;
    if union > 0.0 { inter / union } else { 0.0 }
}

/// Group raw window hits by overlap; groups smaller than `min_neighbors`
/// are discarded, the rest collapse to their component-wise mean rectangle.
fn group_hits(hits: &[Region], overlap_threshold: f32, min_neighbors: usize) -> Vec<Region> {
    let mut groups: Vec<Vec<Region>> = Vec::new();

    for hit in hits {
        match groups
            .iter_mut()
            .find(|g| overlap(&g[0], hit) > overlap_threshold)
        {
            Some(group) => group.push(*hit),
            None => groups.push(vec![*hit]),
        }
    }

    groups
        .into_iter()
        .filter(|g| g.len() >= min_neighbors.max(1))
        .map(|g| {
            let n = g.len() as u64;
            Region {
                x: (g.iter().map(|r| r.x as u64).sum::<u64>() / n) as u32,
                y: (g.iter().map(|r| r.y as u64).sum::<u64>() / n) as u32,
                width: (g.iter().map(|r| r.width as u64).sum::<u64>() / n) as u32,
                height: (g.iter().map(|r| r.height as u64).sum::<u64>() / n) as u32,
            }
        })
        .collect()
}
