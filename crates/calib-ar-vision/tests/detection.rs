use calib_ar_core::{GrayImage, PatternSpec, VisionBackend};
use calib_ar_vision::{Homography, NativeBackend};
use nalgebra::{Matrix3, Point2};

/// Board square coordinates to pixels; the 10x7-square board sits at
/// `[0, 10) x [0, 7)`.
fn board_to_image() -> Homography {
    Homography::new(Matrix3::new(
        30.0, 5.0, 120.0, -3.0, 28.0, 100.0, 0.01, -0.008, 1.0,
    ))
}

fn render_perspective_board() -> GrayImage {
    let inv = board_to_image().inverse().expect("invertible");
    GrayImage::from_fn(520, 380, |x, y| {
        let mut acc: f64 = 0.0;
        for sy in 0..4 {
            for sx in 0..4 {
                let u = x as f64 - 0.5 + (sx as f64 + 0.5) / 4.0;
                let v = y as f64 - 0.5 + (sy as f64 + 0.5) / 4.0;
                let b = inv.apply(Point2::new(u, v));
                acc += if (0.0..10.0).contains(&b.x) && (0.0..7.0).contains(&b.y) {
                    if (b.x.floor() + b.y.floor()) as i64 % 2 == 0 {
                        10.0
                    } else {
                        245.0
                    }
                } else {
                    255.0
                };
            }
        }
        (acc / 16.0).round() as u8
    })
}

#[test]
fn detects_and_refines_perspective_board() {
    let img = render_perspective_board();
    let backend = NativeBackend::default();
    let pattern = PatternSpec::new(9, 6).unwrap();

    let raw = backend
        .detect_pattern(&img.view(), pattern)
        .expect("board detected");
    assert_eq!(54, raw.len());

    let refined = backend.refine(&img.view(), &raw);
    assert_eq!(raw.len(), refined.len());

    let h = board_to_image();
    for r in 0..6 {
        for c in 0..9 {
            let expected = h.apply(Point2::new((c + 1) as f64, (r + 1) as f64));
            let got = refined[r * 9 + c];
            let err = (got - expected).norm();
            assert!(err < 0.2, "corner ({c}, {r}): {got} vs {expected}");
            assert!((raw[r * 9 + c] - expected).norm() < 0.6);
        }
    }
}

#[test]
fn transposed_pattern_is_also_found() {
    let img = render_perspective_board();
    let backend = NativeBackend::default();
    let corners = backend
        .detect_pattern(&img.view(), PatternSpec::new(6, 9).unwrap())
        .expect("board detected");
    assert_eq!(54, corners.len());
}
