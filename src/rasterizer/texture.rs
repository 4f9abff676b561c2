//! Textures and the slot registry the pipeline reads them through
//!
//! Textures are power-of-two in both dimensions so the fillers can wrap
//! coordinates with a mask. Dimensions are stored as log2.

use std::path::Path;

use super::types::Color;

/// Errors that can occur while building or loading textures
#[derive(Debug)]
pub enum TextureError {
    IoError(std::io::Error),
    ImageError(image::ImageError),
    NotPowerOfTwo { width: usize, height: usize },
    SizeMismatch { expected: usize, actual: usize },
    EmptyAnimation,
}

impl From<std::io::Error> for TextureError {
    fn from(e: std::io::Error) -> Self {
        TextureError::IoError(e)
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        TextureError::ImageError(e)
    }
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureError::IoError(e) => write!(f, "IO error: {}", e),
            TextureError::ImageError(e) => write!(f, "Image error: {}", e),
            TextureError::NotPowerOfTwo { width, height } => {
                write!(f, "Texture size {}x{} is not a power of two", width, height)
            }
            TextureError::SizeMismatch { expected, actual } => {
                write!(f, "Expected {} pixels, got {}", expected, actual)
            }
            TextureError::EmptyAnimation => write!(f, "Animated slot needs at least one frame"),
        }
    }
}

impl std::error::Error for TextureError {}

/// Power-of-two RGBA texture with an optional mipmap chain
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub width_log2: u32,
    pub height_log2: u32,
    pub pixels: Vec<Color>,
    /// Any texel below full alpha; forces blended fills
    pub has_alpha: bool,
    /// Successively halved copies, level 1 first
    pub mipmaps: Vec<Texture>,
}

fn log2_exact(n: usize) -> Option<u32> {
    if n == 0 || !n.is_power_of_two() {
        None
    } else {
        Some(n.trailing_zeros())
    }
}

impl Texture {
    /// White texture of the given size
    pub fn new(width: usize, height: usize) -> Result<Self, TextureError> {
        Self::from_pixels("", width, height, vec![Color::WHITE; width * height])
    }

    pub fn from_pixels(
        name: impl Into<String>,
        width: usize,
        height: usize,
        pixels: Vec<Color>,
    ) -> Result<Self, TextureError> {
        let (width_log2, height_log2) = match (log2_exact(width), log2_exact(height)) {
            (Some(w), Some(h)) => (w, h),
            _ => return Err(TextureError::NotPowerOfTwo { width, height }),
        };
        if pixels.len() != width * height {
            return Err(TextureError::SizeMismatch {
                expected: width * height,
                actual: pixels.len(),
            });
        }
        let has_alpha = pixels.iter().any(|p| p.a < 255);
        Ok(Self {
            name: name.into(),
            width_log2,
            height_log2,
            pixels,
            has_alpha,
            mipmaps: Vec::new(),
        })
    }

    /// Single-color texture
    pub fn solid(width: usize, height: usize, color: Color) -> Result<Self, TextureError> {
        Self::from_pixels("solid", width, height, vec![color; width * height])
    }

    /// Checkerboard with square cells of `cell` texels
    pub fn checkerboard(
        width: usize,
        height: usize,
        cell: usize,
        color1: Color,
        color2: Color,
    ) -> Result<Self, TextureError> {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let even = ((x / cell) + (y / cell)) % 2 == 0;
                pixels.push(if even { color1 } else { color2 });
            }
        }
        Self::from_pixels("checkerboard", width, height, pixels)
    }

    /// Load from a PNG/JPEG/BMP file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_image(name, img)
    }

    /// Decode from an in-memory image file
    pub fn from_bytes(bytes: &[u8], name: impl Into<String>) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes)?;
        Self::from_image(name.into(), img)
    }

    fn from_image(name: String, img: image::DynamicImage) -> Result<Self, TextureError> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| Color::with_alpha(p[0], p[1], p[2], p[3]))
            .collect();
        Self::from_pixels(name, width as usize, height as usize, pixels)
    }

    #[inline]
    pub fn width(&self) -> usize {
        1 << self.width_log2
    }

    #[inline]
    pub fn height(&self) -> usize {
        1 << self.height_log2
    }

    /// Texel at integer coordinates, wrapping in both directions
    #[inline]
    pub fn texel(&self, tx: i32, ty: i32) -> Color {
        let x = (tx & (self.width() as i32 - 1)) as usize;
        let y = (ty & (self.height() as i32 - 1)) as usize;
        self.pixels[(y << self.width_log2) | x]
    }

    /// Nearest sample at normalized coordinates (wrapping)
    pub fn sample(&self, u: f32, v: f32) -> Color {
        let tx = (u * self.width() as f32).floor() as i32;
        let ty = (v * self.height() as f32).floor() as i32;
        self.texel(tx, ty)
    }

    /// Rebuild the mipmap chain with a 2x2 box filter down to 1x1
    pub fn build_mipmaps(&mut self) {
        self.mipmaps.clear();
        let mut w_log2 = self.width_log2;
        let mut h_log2 = self.height_log2;
        let mut src = self.pixels.clone();

        while w_log2 > 0 || h_log2 > 0 {
            let (sw, sh) = (1usize << w_log2, 1usize << h_log2);
            let nw_log2 = w_log2.saturating_sub(1);
            let nh_log2 = h_log2.saturating_sub(1);
            let (nw, nh) = (1usize << nw_log2, 1usize << nh_log2);
            let dx = if sw > 1 { 1 } else { 0 };
            let dy = if sh > 1 { 1 } else { 0 };

            let mut dst = Vec::with_capacity(nw * nh);
            for y in 0..nh {
                for x in 0..nw {
                    let (sx, sy) = (x * (1 + dx), y * (1 + dy));
                    let quad = [
                        src[sy * sw + sx],
                        src[sy * sw + sx + dx],
                        src[(sy + dy) * sw + sx],
                        src[(sy + dy) * sw + sx + dx],
                    ];
                    let avg = |f: fn(&Color) -> u8| -> u8 {
                        (quad.iter().map(|c| f(c) as u32).sum::<u32>() / 4) as u8
                    };
                    dst.push(Color::with_alpha(
                        avg(|c| c.r),
                        avg(|c| c.g),
                        avg(|c| c.b),
                        avg(|c| c.a),
                    ));
                }
            }

            self.mipmaps.push(Texture {
                name: format!("{}#{}", self.name, self.mipmaps.len() + 1),
                width_log2: nw_log2,
                height_log2: nh_log2,
                has_alpha: dst.iter().any(|p| p.a < 255),
                pixels: dst.clone(),
                mipmaps: Vec::new(),
            });

            src = dst;
            w_log2 = nw_log2;
            h_log2 = nh_log2;
        }
    }

    /// Builder form of `build_mipmaps`
    pub fn with_mipmaps(mut self) -> Self {
        self.build_mipmaps();
        self
    }

    /// Number of levels below the base texture
    pub fn mip_levels(&self) -> usize {
        self.mipmaps.len()
    }

    /// Level 0 is the texture itself; levels past the chain clamp to the last
    pub fn mip_level(&self, level: usize) -> &Texture {
        if level == 0 || self.mipmaps.is_empty() {
            self
        } else {
            &self.mipmaps[(level - 1).min(self.mipmaps.len() - 1)]
        }
    }
}

/// Texture lookup by integer slot, as consumed by the renderer and
/// rasterizer. Animated slots resolve to their current frame.
pub trait TextureSource {
    fn texture_count(&self) -> usize;
    fn texture(&self, slot: usize) -> Option<&Texture>;
}

impl TextureSource for Vec<Texture> {
    fn texture_count(&self) -> usize {
        self.len()
    }

    fn texture(&self, slot: usize) -> Option<&Texture> {
        self.get(slot)
    }
}

impl TextureSource for [Texture] {
    fn texture_count(&self) -> usize {
        self.len()
    }

    fn texture(&self, slot: usize) -> Option<&Texture> {
        self.get(slot)
    }
}

#[derive(Debug, Clone)]
pub enum TextureSlot {
    Static(Texture),
    Animated { frames: Vec<Texture>, cursor: usize },
}

impl TextureSlot {
    pub fn current(&self) -> &Texture {
        match self {
            TextureSlot::Static(t) => t,
            TextureSlot::Animated { frames, cursor } => &frames[*cursor % frames.len()],
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, TextureSlot::Animated { .. })
    }
}

/// Slot registry owned by the application for the whole session
#[derive(Debug, Clone, Default)]
pub struct TextureBank {
    slots: Vec<TextureSlot>,
}

impl TextureBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a texture, returning its slot
    pub fn insert(&mut self, texture: Texture) -> usize {
        self.slots.push(TextureSlot::Static(texture));
        self.slots.len() - 1
    }

    /// Add an animated slot whose frames are cycled by `advance`
    pub fn insert_animated(&mut self, frames: Vec<Texture>) -> Result<usize, TextureError> {
        if frames.is_empty() {
            return Err(TextureError::EmptyAnimation);
        }
        self.slots.push(TextureSlot::Animated { frames, cursor: 0 });
        Ok(self.slots.len() - 1)
    }

    pub fn slot(&self, slot: usize) -> Option<&TextureSlot> {
        self.slots.get(slot)
    }

    /// Step one animated slot to its next frame (no-op for static slots)
    pub fn advance(&mut self, slot: usize) {
        if let Some(TextureSlot::Animated { frames, cursor }) = self.slots.get_mut(slot) {
            *cursor = (*cursor + 1) % frames.len();
        }
    }

    pub fn advance_all(&mut self) {
        for i in 0..self.slots.len() {
            self.advance(i);
        }
    }

    pub fn set_cursor(&mut self, slot: usize, frame: usize) {
        if let Some(TextureSlot::Animated { frames, cursor }) = self.slots.get_mut(slot) {
            *cursor = frame % frames.len();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Load every image in a directory (sorted by file name), building
    /// mipmaps when asked. Files that fail to load are skipped with a warning.
    /// Returns the slots that were filled.
    pub fn load_directory<P: AsRef<Path>>(
        &mut self,
        dir: P,
        mipmapped: bool,
    ) -> Result<Vec<usize>, TextureError> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|ext| {
                        let ext = ext.to_ascii_lowercase();
                        ext == "png" || ext == "bmp" || ext == "jpg" || ext == "jpeg"
                    })
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut loaded = Vec::new();
        for path in paths {
            match Texture::from_file(&path) {
                Ok(mut tex) => {
                    if mipmapped {
                        tex.build_mipmaps();
                    }
                    log::debug!("texture {} ({}x{})", tex.name, tex.width(), tex.height());
                    loaded.push(self.insert(tex));
                }
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
        log::info!("loaded {} textures from {}", loaded.len(), dir.display());
        Ok(loaded)
    }
}

impl TextureSource for TextureBank {
    fn texture_count(&self) -> usize {
        self.slots.len()
    }

    fn texture(&self, slot: usize) -> Option<&Texture> {
        self.slots.get(slot).map(TextureSlot::current)
    }
}
