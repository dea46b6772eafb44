use std::path::Path;

use image::{DynamicImage, GrayImage};
use imageproc::contrast::threshold;

use crate::utils::ValidatorError;

/// Clip limit and tile grid for the local equalization pass.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;
pub const CLAHE_GRID: u32 = 8;

/// Global cutoff applied after equalization. Strictly greater maps to white.
pub const BINARY_THRESHOLD: u8 = 127;

/// A loaded sheet: the original image kept for text extraction and the
/// binarized copy used only for code detection.
#[derive(Debug)]
pub struct PreparedScan {
    pub original: DynamicImage,
    pub binary: GrayImage,
}

pub struct ImageProcessor;

impl ImageProcessor {
    /// Loads a sheet from disk. A missing or undecodable file is the one
    /// fatal error in the pipeline.
    pub fn prepare(image_path: &Path) -> Result<PreparedScan, ValidatorError> {
        let img = image::open(image_path).map_err(|e| {
            ValidatorError::ImageLoad(format!("Failed to open {}: {}", image_path.display(), e))
        })?;
        log::debug!(
            "loaded {} ({}x{})",
            image_path.display(),
            img.width(),
            img.height()
        );
        Ok(Self::prepare_from_image(img))
    }

    /// Grayscale, local contrast equalization, fixed binarization.
    pub fn prepare_from_image(original: DynamicImage) -> PreparedScan {
        let gray = original.to_luma8();
        let equalized = clahe(&gray, CLAHE_CLIP_LIMIT, CLAHE_GRID, CLAHE_GRID);
        let binary = threshold(&equalized, BINARY_THRESHOLD);
        PreparedScan { original, binary }
    }
}

/// Contrast-limited adaptive histogram equalization over a tile grid.
///
/// The grid clamps to the image size and partitions each axis evenly, so
/// tile spans differ by at most one pixel and no tile is empty. Each tile
/// gets a 256-bin histogram clipped at `clip_limit` (scaled by tile area,
/// minimum 1); the clipped excess is redistributed across all bins,
/// remainder spread with a stride so near-constant tiles keep their level
/// instead of collapsing. Per-pixel output blends the four surrounding
/// tile LUTs bilinearly, which hides tile seams.
pub fn clahe(image: &GrayImage, clip_limit: f32, grid_cols: u32, grid_rows: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let cols = grid_cols.max(1).min(width) as usize;
    let rows = grid_rows.max(1).min(height) as usize;
    let w = width as usize;
    let h = height as usize;

    // One LUT per tile.
    let mut luts = vec![[0u8; 256]; cols * rows];
    for ty in 0..rows {
        for tx in 0..cols {
            let x0 = tx * w / cols;
            let y0 = ty * h / rows;
            let x1 = (tx + 1) * w / cols;
            let y1 = (ty + 1) * h / rows;

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x as u32, y as u32)[0] as usize] += 1;
                }
            }

            let area = ((x1 - x0) * (y1 - y0)) as u32;
            luts[ty * cols + tx] = tile_lut(&hist, area, clip_limit);
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        // Position in tile space, offset so tile centers interpolate.
        let fy = (y as f32 + 0.5) * rows as f32 / h as f32 - 0.5;
        let (ty0, ty1, wy) = split_tile_coord(fy, rows);
        for x in 0..width {
            let fx = (x as f32 + 0.5) * cols as f32 / w as f32 - 0.5;
            let (tx0, tx1, wx) = split_tile_coord(fx, cols);

            let v = image.get_pixel(x, y)[0] as usize;
            let top = luts[ty0 * cols + tx0][v] as f32 * (1.0 - wx)
                + luts[ty0 * cols + tx1][v] as f32 * wx;
            let bottom = luts[ty1 * cols + tx0][v] as f32 * (1.0 - wx)
                + luts[ty1 * cols + tx1][v] as f32 * wx;
            let blended = top * (1.0 - wy) + bottom * wy;
            out.put_pixel(x, y, image::Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Builds one tile's clipped-equalization lookup table.
fn tile_lut(hist: &[u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut clipped = *hist;
    let mut excess = 0u32;
    for bin in clipped.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    // Even share to every bin, remainder strided across the range.
    let share = excess / 256;
    let mut remainder = excess % 256;
    for bin in clipped.iter_mut() {
        *bin += share;
    }
    if remainder > 0 {
        let step = (256 / remainder).max(1) as usize;
        let mut idx = 0;
        while remainder > 0 && idx < 256 {
            clipped[idx] += 1;
            remainder -= 1;
            idx += step;
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (value, bin) in clipped.iter().enumerate() {
        cumulative += *bin;
        lut[value] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Maps a fractional tile coordinate to the two neighboring tile indices
/// and the blend weight toward the second one. Clamps at the grid edges.
fn split_tile_coord(coord: f32, count: usize) -> (usize, usize, f32) {
    if coord <= 0.0 {
        return (0, 0, 0.0);
    }
    let last = count - 1;
    if coord >= last as f32 {
        return (last, last, 0.0);
    }
    let lower = coord.floor() as usize;
    (lower, lower + 1, coord - lower as f32)
}
