/// Borrowed 8-bit grayscale image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // len = w*h
}

/// Owned 8-bit grayscale image.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl<'a> GrayImageView<'a> {
    /// Wrap a buffer, returning `None` when its length does not match `width * height`.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        (width * height == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Pixel lookup with coordinates clamped to the image border.
    #[inline]
    pub fn pixel_clamped(&self, x: i64, y: i64) -> u8 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixel(x, y)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Bilinear sample with border clamping; pixel centres sit on integer coordinates.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f64, y: f64) -> f64 {
    if src.is_empty() {
        return 0.0;
    }
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = src.pixel_clamped(x0, y0) as f64;
    let p10 = src.pixel_clamped(x0 + 1, y0) as f64;
    let p01 = src.pixel_clamped(x0, y0 + 1) as f64;
    let p11 = src.pixel_clamped(x0 + 1, y0 + 1) as f64;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn view_rejects_mismatched_buffer() {
        let data = [0u8; 5];
        assert!(GrayImageView::new(2, 3, &data).is_none());
        assert!(GrayImageView::new(1, 5, &data).is_some());
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage::from_fn(2, 2, |x, y| (x * 100 + y * 50) as u8);
        let view = img.view();
        assert_relative_eq!(sample_bilinear(&view, 0.0, 0.0), 0.0);
        assert_relative_eq!(sample_bilinear(&view, 0.5, 0.0), 50.0);
        assert_relative_eq!(sample_bilinear(&view, 0.5, 0.5), 75.0);
        assert_relative_eq!(sample_bilinear(&view, 1.0, 1.0), 150.0);
    }

    #[test]
    fn bilinear_clamps_outside_image() {
        let img = GrayImage::from_fn(2, 1, |x, _| if x == 0 { 10 } else { 200 });
        let view = img.view();
        assert_relative_eq!(sample_bilinear(&view, -3.0, 0.0), 10.0);
        assert_relative_eq!(sample_bilinear(&view, 5.0, 4.0), 200.0);
    }
}
