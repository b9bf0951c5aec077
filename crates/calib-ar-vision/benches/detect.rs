use std::hint::black_box;

use calib_ar_core::{GrayImage, PatternSpec};
use calib_ar_vision::{detect_board, find_chess_corners, refine_corners, DetectorParams};
use criterion::{criterion_group, criterion_main, Criterion};

fn board_image() -> GrayImage {
    let (x0, y0, square) = (170usize, 135usize, 30usize);
    GrayImage::from_fn(640, 480, |x, y| {
        if x < x0 || y < y0 {
            return 255;
        }
        let (cx, cy) = ((x - x0) / square, (y - y0) / square);
        if cx > 9 || cy > 6 {
            255
        } else if (cx + cy) % 2 == 0 {
            20
        } else {
            235
        }
    })
}

fn bench_detection(c: &mut Criterion) {
    let img = board_image();
    let params = DetectorParams::default();
    let pattern = PatternSpec::new(9, 6).unwrap();

    c.bench_function("chess_corners_640x480", |b| {
        b.iter(|| find_chess_corners(black_box(&img.view()), &params.chess))
    });
    c.bench_function("detect_board_640x480", |b| {
        b.iter(|| detect_board(black_box(&img.view()), pattern, &params))
    });
    if let Some(corners) = detect_board(&img.view(), pattern, &params) {
        c.bench_function("refine_54_corners", |b| {
            b.iter(|| refine_corners(black_box(&img.view()), black_box(&corners), &params.refine))
        });
    }
}

criterion_group!(benches, bench_detection);
criterion_main!(benches);
