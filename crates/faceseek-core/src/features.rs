//! Fixed feature families for embedding extraction.
//!
//! Six pure extractors, each mapping a pixel region to a fixed-length
//! sub-vector. Order and lengths are part of the embedding format contract:
//! reordering silently breaks compatibility with every stored embedding.
//!
//! Every extractor is a total function — degenerate input produces the
//! all-zero sub-vector of the correct length, never a panic.

use crate::types::Region;
use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, RgbImage};
use ndarray::{arr2, Array2};

// --- Sub-vector lengths (96 + 32 + 96 + 8 + 4 + 8 = 244) ---
pub const ORIENTATION_LEN: usize = 96;
pub const INTENSITY_HIST_LEN: usize = 32;
pub const COLOR_HIST_LEN: usize = 96;
pub const TEXTURE_LEN: usize = 8;
pub const SHAPE_LEN: usize = 4;
pub const SPATIAL_LEN: usize = 8;

const ORIENTATION_BINS: usize = 8;
const ORIENTATION_BIN_WIDTH: f32 = 180.0 / ORIENTATION_BINS as f32;
/// Orientation histograms are computed at full, half and quarter resolution.
const ORIENTATION_SCALES: usize = 3;
const HIST_BINS: usize = 32;
const HIST_EPSILON: f32 = 1e-6;

/// Regions below this side length are upscaled before extraction so the
/// derivative kernels stay well-defined.
const MIN_REGION_SIDE: u32 = 16;
const UPSCALED_SIDE: u32 = 32;

const EDGE_LOW_THRESHOLD: f32 = 100.0;
const EDGE_HIGH_THRESHOLD: f32 = 200.0;

/// Hysteresis thresholds for the binary edge map feeding the shape family.
#[derive(Debug, Clone, Copy)]
pub struct EdgeThresholds {
    pub low: f32,
    pub high: f32,
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        Self { low: EDGE_LOW_THRESHOLD, high: EDGE_HIGH_THRESHOLD }
    }
}

/// Crop the region out of the image (full image when `None`), upscaling
/// anything smaller than 16×16 to 32×32.
pub fn prepare_region(image: &DynamicImage, region: Option<Region>) -> DynamicImage {
    let patch = match region {
        Some(r) => image.crop_imm(r.x, r.y, r.width, r.height),
        None => image.clone(),
    };
    if patch.width() == 0 || patch.height() == 0 {
        return DynamicImage::new_luma8(UPSCALED_SIDE, UPSCALED_SIDE);
    }
    if patch.width() < MIN_REGION_SIDE || patch.height() < MIN_REGION_SIDE {
        patch.resize_exact(UPSCALED_SIDE, UPSCALED_SIDE, FilterType::Triangle)
    } else {
        patch
    }
}

/// Multi-scale gradient-orientation histograms, 96 values.
///
/// Sobel 3×3 derivatives; magnitude-weighted 8-bin histogram over [0°, 180°)
/// at full, half and quarter resolution. The 24 live values are zero-padded
/// to 96 — the pad positions are part of the format contract.
pub fn orientation_histograms(gray: &GrayImage) -> Vec<f32> {
    let img = to_float(gray);
    let gx = convolve(&img, &sobel3_x());
    let gy = convolve(&img, &sobel3_y());

    let (h, w) = img.dim();
    let mut magnitude = Array2::<f32>::zeros((h, w));
    let mut angle = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let (dx, dy) = (gx[[y, x]], gy[[y, x]]);
            magnitude[[y, x]] = (dx * dx + dy * dy).sqrt();
            let mut a = dy.atan2(dx).to_degrees();
            if a < 0.0 {
                a += 180.0;
            }
            angle[[y, x]] = a;
        }
    }

    let mut features = Vec::with_capacity(ORIENTATION_LEN);
    features.extend_from_slice(&weighted_orientation_hist(&magnitude, &angle));
    for _ in 1..ORIENTATION_SCALES {
        magnitude = downsample_half(&magnitude);
        angle = downsample_half(&angle);
        features.extend_from_slice(&weighted_orientation_hist(&magnitude, &angle));
    }

    features.truncate(ORIENTATION_LEN);
    features.resize(ORIENTATION_LEN, 0.0);
    features
}

/// 32-bin grayscale intensity histogram over [0, 256), unit-normalized.
pub fn intensity_histogram(gray: &GrayImage) -> Vec<f32> {
    let mut hist = vec![0.0f32; INTENSITY_HIST_LEN];
    for pixel in gray.pixels() {
        hist[(pixel.0[0] as usize) >> 3] += 1.0;
    }
    l2_normalize(&mut hist);
    hist
}

/// Three 32-bin channel histograms in fixed RGB order, each unit-normalized.
pub fn color_histograms(rgb: &RgbImage) -> Vec<f32> {
    let mut features = Vec::with_capacity(COLOR_HIST_LEN);
    for channel in 0..3 {
        let mut hist = vec![0.0f32; HIST_BINS];
        for pixel in rgb.pixels() {
            hist[(pixel.0[channel] as usize) >> 3] += 1.0;
        }
        l2_normalize(&mut hist);
        features.extend_from_slice(&hist);
    }
    features
}

/// Texture and edge statistics, 8 values: variance, mean, std, max, min of
/// the Laplacian response; variance of the 5×5 Sobel-x and Sobel-y
/// responses; mean gradient magnitude of the 5×5 responses.
pub fn texture_statistics(gray: &GrayImage) -> Vec<f32> {
    let img = to_float(gray);
    if img.is_empty() {
        return vec![0.0; TEXTURE_LEN];
    }

    let lap = convolve(&img, &laplacian());
    let var = variance_of(&lap);

    let sx = convolve(&img, &sobel5_x());
    let sy = convolve(&img, &sobel5_y());
    let mean_magnitude = sx
        .iter()
        .zip(sy.iter())
        .map(|(a, b)| (a * a + b * b).sqrt())
        .sum::<f32>()
        / sx.len() as f32;

    vec![
        var,
        mean_of(&lap),
        var.sqrt(),
        lap.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        lap.iter().copied().fold(f32::INFINITY, f32::min),
        variance_of(&sx),
        variance_of(&sy),
        mean_magnitude,
    ]
}

/// Shape descriptors from a binary edge map, 4 values: component count,
/// mean component area, total component area, mean component perimeter.
/// All zero when the edge map is empty.
pub fn shape_descriptors(gray: &GrayImage, thresholds: EdgeThresholds) -> Vec<f32> {
    let img = to_float(gray);
    let gx = convolve(&img, &sobel3_x());
    let gy = convolve(&img, &sobel3_y());
    let (h, w) = img.dim();
    let mut magnitude = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let (dx, dy) = (gx[[y, x]], gy[[y, x]]);
            magnitude[[y, x]] = (dx * dx + dy * dy).sqrt();
        }
    }

    let edges = hysteresis_edges(&magnitude, thresholds);
    let components = connected_components(&edges, w, h);
    if components.is_empty() {
        return vec![0.0; SHAPE_LEN];
    }

    let count = components.len() as f32;
    let total_area: f32 = components.iter().map(|c| c.area as f32).sum();
    let total_perimeter: f32 = components.iter().map(|c| c.perimeter as f32).sum();

    vec![count, total_area / count, total_area, total_perimeter / count]
}

/// Grayscale region block-averaged to an 8×1 grid, scaled to [0, 1].
pub fn spatial_grid(gray: &GrayImage) -> Vec<f32> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return vec![0.0; SPATIAL_LEN];
    }

    let mut features = Vec::with_capacity(SPATIAL_LEN);
    for cell in 0..SPATIAL_LEN {
        let x0 = (cell as u32 * w) / SPATIAL_LEN as u32;
        let x1 = (((cell + 1) as u32 * w) / SPATIAL_LEN as u32).max(x0 + 1).min(w);
        let mut sum = 0u64;
        for x in x0..x1 {
            for y in 0..h {
                sum += gray.get_pixel(x, y).0[0] as u64;
            }
        }
        let n = ((x1 - x0) as u64 * h as u64).max(1);
        features.push(sum as f32 / n as f32 / 255.0);
    }
    features
}

// --- Kernels ---

fn sobel3_x() -> Array2<f32> {
    arr2(&[[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]])
}

fn sobel3_y() -> Array2<f32> {
    arr2(&[[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]])
}

fn laplacian() -> Array2<f32> {
    arr2(&[[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]])
}

/// Separable 5×5 Sobel: smoothing [1,4,6,4,1] ⊗ derivative [-1,-2,0,2,1].
fn sobel5_x() -> Array2<f32> {
    separable_kernel(&[1.0, 4.0, 6.0, 4.0, 1.0], &[-1.0, -2.0, 0.0, 2.0, 1.0])
}

fn sobel5_y() -> Array2<f32> {
    separable_kernel(&[-1.0, -2.0, 0.0, 2.0, 1.0], &[1.0, 4.0, 6.0, 4.0, 1.0])
}

fn separable_kernel(col: &[f32; 5], row: &[f32; 5]) -> Array2<f32> {
    Array2::from_shape_fn((5, 5), |(y, x)| col[y] * row[x])
}

// --- Shared numeric helpers ---

fn to_float(gray: &GrayImage) -> Array2<f32> {
    let (w, h) = gray.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        gray.get_pixel(x as u32, y as u32).0[0] as f32
    })
}

/// 2D convolution with replicated borders.
fn convolve(src: &Array2<f32>, kernel: &Array2<f32>) -> Array2<f32> {
    let (h, w) = src.dim();
    let (kh, kw) = kernel.dim();
    let (ry, rx) = (kh as isize / 2, kw as isize / 2);

    Array2::from_shape_fn((h, w), |(y, x)| {
        let mut acc = 0.0f32;
        for ky in 0..kh {
            for kx in 0..kw {
                let sy = (y as isize + ky as isize - ry).clamp(0, h as isize - 1) as usize;
                let sx = (x as isize + kx as isize - rx).clamp(0, w as isize - 1) as usize;
                acc += src[[sy, sx]] * kernel[[ky, kx]];
            }
        }
        acc
    })
}

/// 2×2 block-average downsampling; odd trailing rows/columns are dropped.
fn downsample_half(src: &Array2<f32>) -> Array2<f32> {
    let (h, w) = src.dim();
    Array2::from_shape_fn((h / 2, w / 2), |(y, x)| {
        (src[[2 * y, 2 * x]]
            + src[[2 * y, 2 * x + 1]]
            + src[[2 * y + 1, 2 * x]]
            + src[[2 * y + 1, 2 * x + 1]])
            / 4.0
    })
}

/// Magnitude-weighted orientation histogram, L1-normalized by its own sum.
fn weighted_orientation_hist(magnitude: &Array2<f32>, angle: &Array2<f32>) -> [f32; ORIENTATION_BINS] {
    let mut hist = [0.0f32; ORIENTATION_BINS];
    for (m, a) in magnitude.iter().zip(angle.iter()) {
        let bin = ((a / ORIENTATION_BIN_WIDTH) as usize).min(ORIENTATION_BINS - 1);
        hist[bin] += m;
    }
    let sum: f32 = hist.iter().sum::<f32>() + HIST_EPSILON;
    for v in &mut hist {
        *v /= sum;
    }
    hist
}

fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > HIST_EPSILON {
        for v in values {
            *v /= norm;
        }
    }
}

fn mean_of(a: &Array2<f32>) -> f32 {
    if a.is_empty() {
        0.0
    } else {
        a.iter().sum::<f32>() / a.len() as f32
    }
}

fn variance_of(a: &Array2<f32>) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let mean = mean_of(a);
    a.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / a.len() as f32
}

// --- Edge map and components for the shape family ---

/// Double-threshold hysteresis: strong pixels seed, weak pixels join when
/// 8-connected to a strong chain.
fn hysteresis_edges(magnitude: &Array2<f32>, thresholds: EdgeThresholds) -> Vec<bool> {
    let (h, w) = magnitude.dim();
    let mut edges = vec![false; w * h];
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if magnitude[[y, x]] >= thresholds.high && !edges[y * w + x] {
                edges[y * w + x] = true;
                stack.push((x, y));
                while let Some((cx, cy)) = stack.pop() {
                    for (nx, ny) in neighbors8(cx, cy, w, h) {
                        if !edges[ny * w + nx] && magnitude[[ny, nx]] >= thresholds.low {
                            edges[ny * w + nx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }

    edges
}

struct Component {
    area: usize,
    perimeter: usize,
}

/// 8-connected components over the edge mask. Perimeter counts component
/// pixels with at least one 4-neighbor outside the mask (or the image).
fn connected_components(edges: &[bool], w: usize, h: usize) -> Vec<Component> {
    let mut visited = vec![false; w * h];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if !edges[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push((start % w, start / w));
        let mut area = 0usize;
        let mut perimeter = 0usize;

        while let Some((x, y)) = stack.pop() {
            area += 1;
            let on_mask_boundary = [
                x == 0 || !edges[y * w + (x - 1)],
                x + 1 == w || !edges[y * w + (x + 1)],
                y == 0 || !edges[(y - 1) * w + x],
                y + 1 == h || !edges[(y + 1) * w + x],
            ]
            .iter()
            .any(|&b| b);
            if on_mask_boundary {
                perimeter += 1;
            }

            for (nx, ny) in neighbors8(x, y, w, h) {
                if edges[ny * w + nx] && !visited[ny * w + nx] {
                    visited[ny * w + nx] = true;
                    stack.push((nx, ny));
                }
            }
        }

        components.push(Component { area, perimeter });
    }

    components
}

fn neighbors8(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    const OFFSETS: [(isize, isize); 8] = [
        (-1, -1), (0, -1), (1, -1),
        (-1, 0), (1, 0),
        (-1, 1), (0, 1), (1, 1),
    ];
    OFFSETS.iter().filter_map(move |&(dx, dy)| {
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx >= 0 && ny >= 0 && (nx as usize) < w && (ny as usize) < h {
            Some((nx as usize, ny as usize))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn uniform(w: u32, h: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([value]))
    }

    /// Vertical step edge down the middle of the image.
    fn step_edge(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| if x < w / 2 { Luma([0u8]) } else { Luma([255u8]) })
    }

    #[test]
    fn test_family_lengths() {
        let gray = step_edge(48, 48);
        let rgb = DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
        assert_eq!(orientation_histograms(&gray).len(), ORIENTATION_LEN);
        assert_eq!(intensity_histogram(&gray).len(), INTENSITY_HIST_LEN);
        assert_eq!(color_histograms(&rgb).len(), COLOR_HIST_LEN);
        assert_eq!(texture_statistics(&gray).len(), TEXTURE_LEN);
        assert_eq!(shape_descriptors(&gray, EdgeThresholds::default()).len(), SHAPE_LEN);
        assert_eq!(spatial_grid(&gray).len(), SPATIAL_LEN);
    }

    #[test]
    fn test_uniform_image_degenerates_to_zeros() {
        let gray = uniform(32, 32, 128);
        assert!(orientation_histograms(&gray).iter().all(|&v| v == 0.0));
        assert!(texture_statistics(&gray).iter().all(|&v| v == 0.0));
        assert!(shape_descriptors(&gray, EdgeThresholds::default())
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn test_intensity_histogram_single_bin_spike() {
        let hist = intensity_histogram(&uniform(16, 16, 128));
        // 128 >> 3 = bin 16; the lone occupied bin L2-normalizes to 1.0.
        assert!((hist[16] - 1.0).abs() < 1e-6);
        assert!(hist.iter().enumerate().filter(|(i, _)| *i != 16).all(|(_, &v)| v == 0.0));
    }

    #[test]
    fn test_color_histograms_unit_norm_per_channel() {
        let rgb = DynamicImage::ImageLuma8(step_edge(32, 32)).to_rgb8();
        let hist = color_histograms(&rgb);
        for channel in 0..3 {
            let slice = &hist[channel * HIST_BINS..(channel + 1) * HIST_BINS];
            let norm = slice.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "channel {channel} norm {norm}");
        }
    }

    #[test]
    fn test_orientation_histogram_captures_step_edge() {
        let features = orientation_histograms(&step_edge(48, 48));
        // A vertical edge produces horizontal gradients: mass in the bins
        // around 0°/180°, and the live values sum to ~1 per scale.
        let full_scale: f32 = features[..ORIENTATION_BINS].iter().sum();
        assert!(full_scale > 0.9, "sum {full_scale}");
        assert!(features[0] + features[ORIENTATION_BINS - 1] > 0.9);
        // Pad positions beyond the three live scales stay zero.
        assert!(features[ORIENTATION_BINS * ORIENTATION_SCALES..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_texture_statistics_see_contrast() {
        let stats = texture_statistics(&step_edge(32, 32));
        assert!(stats[0] > 0.0, "laplacian variance");
        assert!(stats[5] > 0.0, "sobel-x variance");
        // A vertical edge has no vertical gradient.
        assert!(stats[6].abs() < 1e-3, "sobel-y variance {}", stats[6]);
        assert!(stats[7] > 0.0, "mean gradient magnitude");
    }

    #[test]
    fn test_shape_descriptors_find_step_edge() {
        let shape = shape_descriptors(&step_edge(32, 32), EdgeThresholds::default());
        assert!(shape[0] >= 1.0, "component count {}", shape[0]);
        assert!(shape[2] > 0.0, "total area");
        assert!(shape[3] > 0.0, "mean perimeter");
    }

    #[test]
    fn test_spatial_grid_scaled_to_unit_range() {
        let grid = spatial_grid(&uniform(24, 24, 255));
        assert!(grid.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        let dark = spatial_grid(&uniform(24, 24, 0));
        assert!(dark.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_spatial_grid_follows_horizontal_structure() {
        let grid = spatial_grid(&step_edge(64, 16));
        assert!(grid[0] < 0.1, "left cells dark: {}", grid[0]);
        assert!(grid[7] > 0.9, "right cells bright: {}", grid[7]);
    }

    #[test]
    fn test_prepare_region_upscales_small_regions() {
        let img = DynamicImage::ImageLuma8(uniform(64, 64, 90));
        let patch = prepare_region(&img, Some(Region { x: 0, y: 0, width: 4, height: 4 }));
        assert_eq!(patch.width(), 32);
        assert_eq!(patch.height(), 32);
    }

    #[test]
    fn test_prepare_region_full_image_fallback() {
        let img = DynamicImage::ImageLuma8(uniform(64, 48, 90));
        let patch = prepare_region(&img, None);
        assert_eq!((patch.width(), patch.height()), (64, 48));
    }

    #[test]
    fn test_downsample_half_averages_blocks() {
        let src = arr2(&[[0.0, 4.0], [8.0, 12.0]]);
        let down = downsample_half(&src);
        assert_eq!(down.dim(), (1, 1));
        assert!((down[[0, 0]] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_connected_components_two_blobs() {
        // Two disjoint pixels on a 4-wide row mask.
        let edges = vec![true, false, false, true];
        let comps = connected_components(&edges, 4, 1);
        assert_eq!(comps.len(), 2);
        assert!(comps.iter().all(|c| c.area == 1 && c.perimeter == 1));
    }
}
