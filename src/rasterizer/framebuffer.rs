//! RGBA pixel sink written by the rasterizer
//!
//! No depth buffer: visibility comes entirely from draw order.

use std::path::Path;

use super::types::Color;

pub struct Framebuffer {
    pub pixels: Vec<u8>, // RGBA, 4 bytes per pixel
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height * 4],
            width,
            height,
        }
    }

    pub fn clear(&mut self, color: Color) {
        let bytes = color.to_bytes();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            self.pixels[idx..idx + 4].copy_from_slice(&color.to_bytes());
        }
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            Some(Color::with_alpha(
                self.pixels[idx],
                self.pixels[idx + 1],
                self.pixels[idx + 2],
                self.pixels[idx + 3],
            ))
        } else {
            None
        }
    }

    /// Mutable RGBA bytes of one row
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let stride = self.width * 4;
        &mut self.pixels[y * stride..(y + 1) * stride]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Export as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), image::ImageError> {
        image::save_buffer(
            path,
            &self.pixels,
            self.width as u32,
            self.height as u32,
            image::ExtendedColorType::Rgba8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_and_pixels() {
        let mut fb = Framebuffer::new(4, 3);
        fb.clear(Color::new(1, 2, 3));
        assert_eq!(fb.get_pixel(3, 2), Some(Color::new(1, 2, 3)));
        fb.set_pixel(1, 1, Color::RED);
        assert_eq!(fb.get_pixel(1, 1), Some(Color::RED));
        assert_eq!(fb.get_pixel(4, 0), None);
        fb.set_pixel(10, 10, Color::RED);
    }

    #[test]
    fn test_row_slice() {
        let mut fb = Framebuffer::new(4, 3);
        fb.row_mut(2)[0] = 77;
        assert_eq!(fb.pixels[2 * 16], 77);
        assert_eq!(fb.row_mut(0).len(), 16);
    }

    #[test]
    fn test_png_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut fb = Framebuffer::new(8, 4);
        fb.clear(Color::BLUE);
        fb.save_png(&path).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(7, 3).0, [0, 0, 255, 255]);
    }
}
