//! Texture quality presets and the codecs they re-encode through.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageError, ImageFormat, RgbaImage};

use crate::error::UnknownPresetError;

/// Named quality tier, ordered from highest (`Ultra`) to lowest (`Minimal`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityPreset {
    Ultra,
    High,
    Medium,
    Low,
    Minimal,
}

/// Format a variant is round-tripped through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureEncoding {
    WebpLossless,
    Jpeg,
}

/// Limits and sampler settings of one preset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualitySettings {
    pub max_width: u32,
    pub max_height: u32,
    pub encoding: TextureEncoding,
    /// In `(0, 1]`; JPEG quality is `compression_level * 100`.
    pub compression_level: f32,
    pub mipmaps_enabled: bool,
    pub anisotropy: u32,
}

impl QualityPreset {
    /// Every preset, highest quality first.
    pub const ALL: [QualityPreset; 5] = [
        QualityPreset::Ultra,
        QualityPreset::High,
        QualityPreset::Medium,
        QualityPreset::Low,
        QualityPreset::Minimal,
    ];

    #[must_use]
    pub const fn settings(self) -> QualitySettings {
        match self {
            QualityPreset::Ultra => QualitySettings {
                max_width: 2048,
                max_height: 2048,
                encoding: TextureEncoding::WebpLossless,
                compression_level: 0.9,
                mipmaps_enabled: true,
                anisotropy: 16,
            },
            QualityPreset::High => QualitySettings {
                max_width: 1024,
                max_height: 1024,
                encoding: TextureEncoding::WebpLossless,
                compression_level: 0.8,
                mipmaps_enabled: true,
                anisotropy: 8,
            },
            QualityPreset::Medium => QualitySettings {
                max_width: 512,
                max_height: 512,
                encoding: TextureEncoding::WebpLossless,
                compression_level: 0.7,
                mipmaps_enabled: true,
                anisotropy: 4,
            },
            QualityPreset::Low => QualitySettings {
                max_width: 256,
                max_height: 256,
                encoding: TextureEncoding::Jpeg,
                compression_level: 0.6,
                mipmaps_enabled: false,
                anisotropy: 2,
            },
            QualityPreset::Minimal => QualitySettings {
                max_width: 128,
                max_height: 128,
                encoding: TextureEncoding::Jpeg,
                compression_level: 0.4,
                mipmaps_enabled: false,
                anisotropy: 1,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityPreset::Ultra => "ultra",
            QualityPreset::High => "high",
            QualityPreset::Medium => "medium",
            QualityPreset::Low => "low",
            QualityPreset::Minimal => "minimal",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPreset {
    type Err = UnknownPresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityPreset::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPresetError(s.to_string()))
    }
}

impl TextureEncoding {
    /// Encode `image` and decode it back, applying the format's loss.
    pub fn round_trip(
        self,
        image: &RgbaImage,
        compression_level: f32,
    ) -> Result<RgbaImage, ImageError> {
        let (width, height) = image.dimensions();
        let mut bytes = Vec::new();

        let format = match self {
            TextureEncoding::WebpLossless => {
                WebPEncoder::new_lossless(&mut bytes).encode(
                    image.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgba8,
                )?;
                ImageFormat::WebP
            }
            TextureEncoding::Jpeg => {
                // JPEG has no alpha channel.
                let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
                let quality = (compression_level * 100.0).round().clamp(1.0, 100.0) as u8;
                JpegEncoder::new_with_quality(&mut bytes, quality).encode(
                    rgb.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )?;
                ImageFormat::Jpeg
            }
        };

        let decoded = image::load(Cursor::new(bytes), format)?;
        Ok(decoded.into_rgba8())
    }
}
