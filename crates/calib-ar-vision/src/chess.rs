//! ChESS corners from the `chess-corners` detector, adapted to the grid
//! builder's corner type.

use crate::params::ChessParams;
use calib_ar_core::GrayImageView;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A ChESS corner candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChessCorner {
    /// Sub-pixel position; pixel centres sit on integer coordinates.
    pub position: Point2<f32>,
    /// Direction of the bright diagonal in radians, modulo π.
    pub orientation: f32,
    pub strength: f32,
}

impl From<&CornerDescriptor> for ChessCorner {
    fn from(c: &CornerDescriptor) -> Self {
        Self {
            position: Point2::new(c.x, c.y),
            orientation: c.orientation,
            strength: c.response,
        }
    }
}

impl ChessParams {
    /// Single-scale `chess-corners` configuration for these settings.
    pub fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel;
        cfg.params.nms_radius = self.nms_radius;
        cfg.params.min_cluster_size = self.min_cluster_size;
        cfg
    }
}

/// Detect ChESS corners in `img`.
///
/// Returns nothing for an empty view or one whose buffer does not match its
/// dimensions.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(width = img.width, height = img.height))
)]
pub fn find_chess_corners(img: &GrayImageView<'_>, params: &ChessParams) -> Vec<ChessCorner> {
    if img.width == 0 || img.height == 0 {
        return Vec::new();
    }
    let (Ok(w), Ok(h)) = (u32::try_from(img.width), u32::try_from(img.height)) else {
        return Vec::new();
    };
    let Some(gray) = image::GrayImage::from_raw(w, h, img.data.to_vec()) else {
        log::warn!(
            "gray buffer of {} bytes does not match {}x{}",
            img.data.len(),
            img.width,
            img.height
        );
        return Vec::new();
    };

    find_chess_corners_image(&gray, &params.chess_config())
        .iter()
        .map(ChessCorner::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_ar_core::GrayImage;

    /// Four squares meeting at the pixel boundary `(cx - 0.5, cy - 0.5)`,
    /// dark top-left.
    fn x_junction(w: usize, h: usize, cx: usize, cy: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| if (x < cx) == (y < cy) { 20 } else { 235 })
    }

    #[test]
    fn config_carries_thresholds() {
        let params = ChessParams {
            threshold_rel: 0.35,
            nms_radius: 4,
            min_cluster_size: 3,
        };
        let cfg = params.chess_config();
        assert_eq!(0.35, cfg.params.threshold_rel);
        assert_eq!(4, cfg.params.nms_radius);
        assert_eq!(3, cfg.params.min_cluster_size);
    }

    #[test]
    fn finds_single_x_junction() {
        let img = x_junction(64, 48, 32, 24);
        let corners = find_chess_corners(&img.view(), &ChessParams::default());
        let best = corners
            .iter()
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
            .expect("corner");
        assert!((best.position.x - 31.5).abs() < 1.0, "{best:?}");
        assert!((best.position.y - 23.5).abs() < 1.0, "{best:?}");
        assert!(best.strength > 0.0);
    }

    #[test]
    fn empty_image_has_no_corners() {
        let empty = GrayImage::new(0, 0);
        assert!(find_chess_corners(&empty.view(), &ChessParams::default()).is_empty());
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let data = vec![0u8; 10];
        let view = GrayImageView {
            width: 8,
            height: 8,
            data: &data,
        };
        assert!(find_chess_corners(&view, &ChessParams::default()).is_empty());
    }
}
