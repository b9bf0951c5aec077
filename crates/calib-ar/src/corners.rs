//! Harris corner experiment: detect, mark every response peak and save.

use crate::overlay::{draw_thick_line, RED};
use crate::text::draw_text;
use calib_ar_core::GrayImageView;
use calib_ar_vision::{detect_harris, HarrisError, HarrisParams};
use image::RgbImage;
use nalgebra::Point2;

const CROSS_HALF: f64 = 5.0;
const CROSS_THICKNESS: u32 = 2;

/// Run the Harris detector on `frame` and draw a red cross on each corner
/// plus a corner count. Returns the number of corners found.
pub fn annotate_harris(frame: &mut RgbImage, params: &HarrisParams) -> Result<usize, HarrisError> {
    let gray = image::imageops::grayscale(&*frame);
    let view = GrayImageView {
        width: gray.width() as usize,
        height: gray.height() as usize,
        data: gray.as_raw(),
    };
    let corners = detect_harris(&view, params)?;
    log::debug!(
        "harris: {} corners (threshold {}, block {}, aperture {})",
        corners.len(),
        params.threshold,
        params.block_size,
        params.aperture
    );

    for c in &corners {
        let (x, y) = (c.x, c.y);
        draw_thick_line(
            frame,
            Point2::new(x - CROSS_HALF, y),
            Point2::new(x + CROSS_HALF, y),
            CROSS_THICKNESS,
            RED,
        );
        draw_thick_line(
            frame,
            Point2::new(x, y - CROSS_HALF),
            Point2::new(x, y + CROSS_HALF),
            CROSS_THICKNESS,
            RED,
        );
    }
    draw_text(frame, 10, 10, 2, RED, &format!("CORNERS: {}", corners.len()));
    Ok(corners.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn flat_frame_has_no_corners() {
        let mut frame = RgbImage::from_pixel(80, 60, Rgb([90, 90, 90]));
        let n = annotate_harris(&mut frame, &HarrisParams::default()).unwrap();
        assert_eq!(0, n);
        // the count label is still drawn
        assert!(frame.pixels().any(|p| *p == RED));
    }

    #[test]
    fn rejects_even_aperture() {
        let mut frame = RgbImage::new(32, 32);
        let params = HarrisParams {
            aperture: 4,
            ..HarrisParams::default()
        };
        assert!(annotate_harris(&mut frame, &params).is_err());
    }
}
