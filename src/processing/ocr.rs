use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::filter::filter3x3;
use imageproc::rect::Rect;
use tesseract::Tesseract;

use crate::models::CodePair;
use crate::utils::ValidatorError;

/// Padding punched out around each code's box so no QR pixels leak into
/// the recognized text.
pub const QR_MASK_PADDING: i32 = 30;

/// Enhancement factors applied to the text band before recognition.
pub const CONTRAST_FACTOR: f32 = 2.0;
pub const SHARPNESS_FACTOR: f32 = 1.5;

/// 3x3 smoothing kernel the sharpening step interpolates away from.
const SMOOTH_KERNEL: [f32; 9] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    5.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
];

pub struct OcrProcessor;

impl OcrProcessor {
    /// Recognizes the advisory text printed around one pair. The band
    /// spans the full sheet width, half a code height above and below the
    /// pair; both QR boxes are masked out before enhancement. Output is
    /// advisory only, the caller treats any failure as an empty string.
    pub fn extract_pair_text(
        original: &DynamicImage,
        pair: &CodePair,
    ) -> Result<String, ValidatorError> {
        let gray = original.to_luma8();
        let (band_top, band_bottom) = text_band(pair, gray.height());
        if band_bottom <= band_top {
            return Ok(String::new());
        }

        let band_height = band_bottom - band_top;
        let band = imageops::crop_imm(&gray, 0, band_top, gray.width(), band_height).to_image();

        let mut mask = GrayImage::from_pixel(band.width(), band.height(), Luma([255]));
        for rect in mask_rects(pair, band_top as i32, band.width(), band.height()) {
            draw_filled_rect_mut(&mut mask, rect, Luma([0]));
        }

        let masked = apply_mask(&band, &mask);
        let contrasted = adjust_contrast(&masked, CONTRAST_FACTOR);
        let sharpened = sharpen(&contrasted, SHARPNESS_FACTOR);
        let composited = composite_over_white(&sharpened, &mask);

        recognize_block(&composited)
    }
}

/// Vertical band `[start, end)` covering the pair plus half a code height
/// of margin, clamped to the image.
pub fn text_band(pair: &CodePair, image_height: u32) -> (u32, u32) {
    let qr_top = pair.left.top.min(pair.right.top);
    let qr_bottom = pair.left.bottom().max(pair.right.bottom());
    let qr_height = qr_bottom - qr_top;

    let y_start = ((qr_top - qr_height / 2).max(0) as u32).min(image_height);
    let y_end = ((qr_bottom + qr_height / 2).max(0) as u32).min(image_height);
    (y_start, y_end.max(y_start))
}

/// Both codes' boxes in band coordinates, grown by `QR_MASK_PADDING` and
/// clipped to the band.
pub fn mask_rects(pair: &CodePair, band_top: i32, band_width: u32, band_height: u32) -> Vec<Rect> {
    if band_width == 0 || band_height == 0 {
        return Vec::new();
    }
    let band_rect = Rect::at(0, 0).of_size(band_width, band_height);
    [&pair.left, &pair.right]
        .iter()
        .filter_map(|code| {
            let padded = Rect::at(
                code.left - QR_MASK_PADDING,
                code.top - band_top - QR_MASK_PADDING,
            )
            .of_size(
                code.width + 2 * QR_MASK_PADDING as u32,
                code.height + 2 * QR_MASK_PADDING as u32,
            );
            padded.intersect(band_rect)
        })
        .collect()
}

fn apply_mask(band: &GrayImage, mask: &GrayImage) -> GrayImage {
    let mut out = band.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] == 0 {
            *pixel = Luma([0]);
        }
    }
    out
}

/// Mean-anchored contrast: pixels move away from the band mean by
/// `factor`. The mean is taken over the masked band, zeros included.
fn adjust_contrast(image: &GrayImage, factor: f32) -> GrayImage {
    let pixel_count = (image.width() as u64 * image.height() as u64).max(1);
    let sum: u64 = image.pixels().map(|p| p[0] as u64).sum();
    let mean = sum as f32 / pixel_count as f32;

    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let value = mean + (pixel[0] as f32 - mean) * factor;
        out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
    }
    out
}

/// Interpolates away from a 3x3 smooth, which sharpens for factors > 1.
fn sharpen(image: &GrayImage, factor: f32) -> GrayImage {
    let smooth: GrayImage = filter3x3(image, &SMOOTH_KERNEL);
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let base = smooth.get_pixel(x, y)[0] as f32;
        let value = base + (pixel[0] as f32 - base) * factor;
        out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
    }
    out
}

/// Masked-out areas end up uniform white instead of enhanced black.
fn composite_over_white(image: &GrayImage, mask: &GrayImage) -> GrayImage {
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] == 0 {
            *pixel = Luma([255]);
        }
    }
    out
}

/// Runs recognition configured for a single uniform text block with
/// inter-word spacing preserved.
fn recognize_block(image: &GrayImage) -> Result<String, ValidatorError> {
    let temp = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .map_err(|e| ValidatorError::Recognition(format!("Failed to create temp file: {}", e)))?;
    let temp_path = temp
        .path()
        .to_str()
        .ok_or_else(|| ValidatorError::Recognition("Temp path is not valid UTF-8".to_string()))?;
    image
        .save(temp.path())
        .map_err(|e| ValidatorError::Recognition(format!("Failed to write band image: {}", e)))?;

    let mut tess = Tesseract::new(None, Some("eng"))
        .map_err(|e| ValidatorError::Recognition(format!("Tesseract init error: {}", e)))?
        .set_variable("preserve_interword_spaces", "1")
        .map_err(|e| ValidatorError::Recognition(format!("Tesseract set variable error: {}", e)))?
        .set_image(temp_path)
        .map_err(|e| ValidatorError::Recognition(format!("Tesseract set image error: {}", e)))?;
    // Page seg mode has no fallible setter, it mutates in place.
    tess.set_page_seg_mode(tesseract::PageSegMode::PsmSingleBlock);

    let text = tess
        .get_text()
        .map_err(|e| ValidatorError::Recognition(format!("Tesseract error: {}", e)))?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DetectedCode;

    fn code(top: i32, left: i32, size: u32) -> DetectedCode {
        DetectedCode {
            payload: String::new(),
            top,
            left,
            width: size,
            height: size,
        }
    }

    fn pair(top: i32) -> CodePair {
        CodePair::new(code(top, 50, 120), code(top, 500, 120))
    }

    #[test]
    fn band_extends_half_a_code_height_each_way() {
        let (start, end) = text_band(&pair(100), 1000);
        assert_eq!(start, 40);
        assert_eq!(end, 280);
    }

    #[test]
    fn band_clamps_to_image_edges() {
        // Margins would run from -50 to 190 on a 150 px tall image.
        let (start, end) = text_band(&pair(10), 150);
        assert_eq!(start, 0);
        assert_eq!(end, 150);
    }

    #[test]
    fn band_collapses_for_a_pair_below_the_frame() {
        // Boxes lying wholly outside a short image yield an empty band,
        // never coordinates past the bottom edge.
        let (start, end) = text_band(&pair(600), 200);
        assert_eq!(start, 200);
        assert_eq!(end, 200);
    }

    #[test]
    fn band_tracks_the_taller_code() {
        let uneven = CodePair::new(code(100, 50, 120), code(80, 500, 200));
        let (start, end) = text_band(&uneven, 2000);
        // Span runs from top 80 to bottom 280, so the half-height margin
        // is 100 on each side, clamped at the top of the image.
        assert_eq!(start, 0);
        assert_eq!(end, 380);
    }

    #[test]
    fn mask_rects_pad_and_offset_into_band() {
        let rects = mask_rects(&pair(100), 40, 800, 240);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].left(), 20);
        assert_eq!(rects[0].top(), 30);
        assert_eq!(rects[0].width(), 180);
        assert_eq!(rects[0].height(), 180);
    }

    #[test]
    fn mask_rects_clip_at_band_borders() {
        let near_edge = CodePair::new(code(100, 10, 120), code(100, 500, 120));
        let rects = mask_rects(&near_edge, 40, 640, 240);
        assert_eq!(rects.len(), 2);
        // Left code: padded box starts off-frame and clips to zero.
        assert_eq!(rects[0].left(), 0);
        assert_eq!(rects[0].width(), 160);
        // Right code: padded box runs past the band's right edge.
        assert_eq!(rects[1].left(), 470);
        assert_eq!(rects[1].width(), 170);
    }

    #[test]
    fn contrast_moves_pixels_away_from_mean() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, Luma([100]));
        img.put_pixel(1, 0, Luma([150]));
        img.put_pixel(0, 1, Luma([100]));
        img.put_pixel(1, 1, Luma([150]));

        let out = adjust_contrast(&img, 2.0);
        assert_eq!(out.get_pixel(0, 0)[0], 75);
        assert_eq!(out.get_pixel(1, 0)[0], 175);
    }

    #[test]
    fn contrast_clamps_at_range_edges() {
        let mut img = GrayImage::new(2, 1);
        img.put_pixel(0, 0, Luma([10]));
        img.put_pixel(1, 0, Luma([250]));

        let out = adjust_contrast(&img, 2.0);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn sharpening_keeps_flat_areas_flat() {
        let img = GrayImage::from_pixel(16, 16, Luma([128]));
        let out = sharpen(&img, SHARPNESS_FACTOR);
        assert!(out.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn masked_pixels_zero_then_composite_white() {
        let band = GrayImage::from_pixel(4, 4, Luma([90]));
        let mut mask = GrayImage::from_pixel(4, 4, Luma([255]));
        draw_filled_rect_mut(&mut mask, Rect::at(0, 0).of_size(2, 2), Luma([0]));

        let masked = apply_mask(&band, &mask);
        assert_eq!(masked.get_pixel(0, 0)[0], 0);
        assert_eq!(masked.get_pixel(3, 3)[0], 90);

        let composited = composite_over_white(&masked, &mask);
        assert_eq!(composited.get_pixel(0, 0)[0], 255);
        assert_eq!(composited.get_pixel(3, 3)[0], 90);
    }
}
