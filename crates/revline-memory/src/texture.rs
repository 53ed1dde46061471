//! CPU-side textures with optional mip chains.

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::error::TextureError;

/// Calculates the number of mip levels for the given dimensions.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    if width == 0 || height == 0 {
        return 0;
    }
    (width.max(height) as f32).log2().floor() as u32 + 1
}

/// An RGBA8 texture. Level 0 of the mip chain is the full-resolution image.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    mip_chain: Vec<RgbaImage>,
    anisotropy: u32,
}

impl Texture {
    /// Wrap a single-level image with anisotropy 1.
    pub fn new(image: RgbaImage) -> Self {
        Self {
            mip_chain: vec![image],
            anisotropy: 1,
        }
    }

    /// Build a texture from raw RGBA8 bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, TextureError> {
        let expected = width as usize * height as usize * 4;
        let actual = data.len();
        let image = RgbaImage::from_raw(width, height, data).ok_or(
            TextureError::DataSizeMismatch {
                actual,
                expected,
                width,
                height,
            },
        )?;
        Ok(Self::new(image))
    }

    /// Full-resolution image.
    #[must_use]
    pub fn base(&self) -> &RgbaImage {
        &self.mip_chain[0]
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.base().width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.base().height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.base().dimensions()
    }

    #[must_use]
    pub fn mip_chain(&self) -> &[RgbaImage] {
        &self.mip_chain
    }

    /// Number of mip levels (1 if mipmaps were not generated).
    #[must_use]
    pub fn mip_level_count(&self) -> u32 {
        self.mip_chain.len() as u32
    }

    /// Sampler anisotropy to use with this texture.
    #[must_use]
    pub fn anisotropy(&self) -> u32 {
        self.anisotropy
    }

    /// Bytes held across every mip level.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.mip_chain
            .iter()
            .map(|level| level.as_raw().len() as u64)
            .sum()
    }

    /// Replace any existing chain with a full one, halving down to 1x1.
    #[must_use]
    pub(crate) fn with_mipmaps(mut self) -> Self {
        let (width, height) = self.dimensions();
        let count = mip_level_count(width, height) as usize;
        self.mip_chain.truncate(1);
        self.mip_chain.reserve(count.saturating_sub(1));

        for level in 1..count {
            let prev = &self.mip_chain[level - 1];
            let w = (prev.width() / 2).max(1);
            let h = (prev.height() / 2).max(1);
            let downscaled = imageops::resize(prev, w, h, FilterType::Triangle);
            self.mip_chain.push(downscaled);
        }
        self
    }

    #[must_use]
    pub(crate) fn with_anisotropy(mut self, anisotropy: u32) -> Self {
        self.anisotropy = anisotropy.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mipmap_level_count_calculation() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(512, 256), 10);
        assert_eq!(mip_level_count(300, 170), 9);
        assert_eq!(mip_level_count(0, 64), 0);
    }

    #[test]
    fn test_from_rgba_validates_size() {
        assert!(Texture::from_rgba(2, 2, vec![0; 16]).is_ok());
        let err = Texture::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            TextureError::DataSizeMismatch {
                actual: 15,
                expected: 16,
                ..
            }
        ));
    }

    #[test]
    fn test_mip_chain_halves_to_one_pixel() {
        let texture = Texture::new(RgbaImage::new(64, 16)).with_mipmaps();
        assert_eq!(texture.mip_level_count(), 7);
        let dims: Vec<_> = texture.mip_chain().iter().map(|m| m.dimensions()).collect();
        assert_eq!(
            dims,
            [(64, 16), (32, 8), (16, 4), (8, 2), (4, 1), (2, 1), (1, 1)]
        );
    }

    #[test]
    fn test_size_counts_every_level() {
        let flat = Texture::new(RgbaImage::new(8, 8));
        assert_eq!(flat.size_bytes(), 256);
        let mipped = flat.with_mipmaps();
        // 8x8 + 4x4 + 2x2 + 1x1 texels, 4 bytes each.
        assert_eq!(mipped.size_bytes(), (64 + 16 + 4 + 1) * 4);
    }

    #[test]
    fn test_anisotropy_floor_is_one() {
        let texture = Texture::new(RgbaImage::new(1, 1)).with_anisotropy(0);
        assert_eq!(texture.anisotropy(), 1);
    }
}
