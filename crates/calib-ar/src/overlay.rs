//! Corner markers and the virtual objects drawn over a detected board.

use calib_ar_core::PatternSpec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use nalgebra::{Point2, Point3, Vector2};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const YELLOW: Rgb<u8> = Rgb([255, 220, 0]);
const MAGENTA: Rgb<u8> = Rgb([255, 0, 255]);

/// Per-row marker colours, cycled.
const ROW_COLORS: [Rgb<u8>; 7] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 200, 0]),
    Rgb([0, 200, 200]),
    Rgb([0, 0, 255]),
    Rgb([200, 0, 200]),
];

/// Length of each axis of the triad, in board squares.
pub const AXIS_LENGTH: f64 = 3.0;

/// Which virtual object to draw once a pose is known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    #[default]
    Pyramid,
    Axes,
}

impl std::str::FromStr for OverlayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pyramid" => Ok(Self::Pyramid),
            "axes" | "axis" => Ok(Self::Axes),
            other => Err(format!("unknown overlay `{other}` (expected pyramid or axes)")),
        }
    }
}

/// Origin and the tips of the X, Y and Z axes in board coordinates.
pub fn axes_points() -> [Point3<f64>; 4] {
    [
        Point3::origin(),
        Point3::new(AXIS_LENGTH, 0.0, 0.0),
        Point3::new(0.0, AXIS_LENGTH, 0.0),
        Point3::new(0.0, 0.0, AXIS_LENGTH),
    ]
}

/// Four base corners, base centre and apex of a pyramid standing on the
/// middle of the board. Positive z points out of the board towards the camera.
pub fn pyramid_points(pattern: PatternSpec) -> [Point3<f64>; 6] {
    let w = (pattern.columns() - 1) as f64;
    let h = (pattern.rows() - 1) as f64;
    let (cx, cy) = (0.5 * w, -0.5 * h);
    let hx = (0.25 * w).max(0.5);
    let hy = (0.25 * h).max(0.5);
    let height = 2.0 * hx.max(hy);
    [
        Point3::new(cx - hx, cy + hy, 0.0),
        Point3::new(cx + hx, cy + hy, 0.0),
        Point3::new(cx + hx, cy - hy, 0.0),
        Point3::new(cx - hx, cy - hy, 0.0),
        Point3::new(cx, cy, 0.0),
        Point3::new(cx, cy, height),
    ]
}

/// Edges between [`pyramid_points`]: four base edges, four apex edges.
pub const PYRAMID_EDGES: [(usize, usize); 8] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (5, 0),
    (5, 1),
    (5, 2),
    (5, 3),
];

fn drawable(p: &Point2<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.x.abs() < 1e6 && p.y.abs() < 1e6
}

/// Line of roughly `thickness` pixels, built from parallel one-pixel segments.
pub fn draw_thick_line(img: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, thickness: u32, color: Rgb<u8>) {
    if !drawable(&a) || !drawable(&b) {
        return;
    }
    let dir = b - a;
    let normal = if dir.norm() > 1e-9 {
        Vector2::new(-dir.y, dir.x).normalize()
    } else {
        Vector2::new(0.0, 1.0)
    };
    let t = thickness.max(1) as i32;
    for k in 0..t {
        let offset = normal * (k as f64 - (t - 1) as f64 / 2.0);
        let (pa, pb) = (a + offset, b + offset);
        draw_line_segment_mut(
            img,
            (pa.x as f32, pa.y as f32),
            (pb.x as f32, pb.y as f32),
            color,
        );
    }
}

/// Circle every corner and join consecutive corners, coloured per row.
pub fn draw_corners(img: &mut RgbImage, corners: &[Point2<f64>], columns: usize, thickness: u32) {
    let columns = columns.max(1);
    for (i, p) in corners.iter().enumerate() {
        if !drawable(p) {
            continue;
        }
        let color = ROW_COLORS[(i / columns) % ROW_COLORS.len()];
        if let Some(next) = corners.get(i + 1) {
            draw_thick_line(img, *p, *next, thickness, color);
        }
        let (x, y) = (p.x.round() as i32, p.y.round() as i32);
        for r in 4..4 + thickness.max(1) as i32 {
            draw_hollow_circle_mut(img, (x, y), r, color);
        }
    }
}

/// Axis triad from the projections of [`axes_points`].
pub fn draw_axes(img: &mut RgbImage, projected: &[Point2<f64>], thickness: u32) {
    let [origin, x, y, z] = projected else {
        return;
    };
    draw_thick_line(img, *origin, *x, thickness, RED);
    draw_thick_line(img, *origin, *y, thickness, GREEN);
    draw_thick_line(img, *origin, *z, thickness, BLUE);
}

/// Pyramid wireframe from the projections of [`pyramid_points`].
pub fn draw_pyramid(img: &mut RgbImage, projected: &[Point2<f64>], thickness: u32) {
    if projected.len() != 6 {
        return;
    }
    for (k, &(a, b)) in PYRAMID_EDGES.iter().enumerate() {
        let color = if k < 4 { YELLOW } else { MAGENTA };
        draw_thick_line(img, projected[a], projected[b], thickness, color);
    }
    let centre = projected[4];
    if drawable(&centre) {
        draw_cross_mut(img, YELLOW, centre.x.round() as i32, centre.y.round() as i32);
    }
}
