use image::GrayImage;

use crate::models::DetectedCode;

pub struct QrLocator;

impl QrLocator {
    /// Finds and decodes every QR code in the binarized sheet. Grids that
    /// are located but fail to decode are dropped; their absence surfaces
    /// later as an incomplete pair. An empty result is a value, not an
    /// error.
    pub fn locate(binary: &GrayImage) -> Vec<DetectedCode> {
        let (width, height) = binary.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                binary.get_pixel(x as u32, y as u32)[0]
            });
        let grids = prepared.detect_grids();
        log::debug!("detector found {} candidate grid(s)", grids.len());

        let codes: Vec<DetectedCode> = grids
            .iter()
            .filter_map(|grid| {
                let (_, payload) = grid
                    .decode()
                    .map_err(|e| log::warn!("QR grid failed to decode: {:?}", e))
                    .ok()?;
                Some(Self::code_from_bounds(payload, &grid.bounds))
            })
            .collect();
        log::debug!("decoded {} code(s)", codes.len());
        codes
    }

    /// Axis-aligned bounding box around the four detected corners.
    fn code_from_bounds(payload: String, bounds: &[rqrr::Point; 4]) -> DetectedCode {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for point in bounds {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        DetectedCode {
            payload,
            top: min_y,
            left: min_x,
            width: (max_x - min_x).max(1) as u32,
            height: (max_y - min_y).max(1) as u32,
        }
    }
}
