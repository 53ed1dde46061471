//! Errors raised by resource disposal, monitoring and texture derivation.

/// A resource's release callback failed. The resource stays registered.
#[derive(Debug, thiserror::Error)]
#[error("dispose failed: {reason}")]
pub struct DisposeError {
    pub reason: String,
}

impl DisposeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors from the memory monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The sampler thread could not be started.
    #[error("failed to spawn memory monitor thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A sampling interval of zero would spin.
    #[error("monitoring interval must be non-zero")]
    ZeroInterval,
}

/// Errors that can occur while deriving a texture variant.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    /// Width or height is zero.
    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },

    /// Pixel data length doesn't match the dimensions.
    #[error("texture data size ({actual}) does not match expected ({expected}) for {width}x{height} RGBA8")]
    DataSizeMismatch {
        actual: usize,
        expected: usize,
        width: u32,
        height: u32,
    },

    /// Encoding to or decoding from the preset's format failed.
    #[error("texture codec error: {0}")]
    Codec(#[from] image::ImageError),
}

/// A quality preset name that is not in the preset table.
#[derive(Debug, thiserror::Error)]
#[error("unknown texture quality preset '{0}'")]
pub struct UnknownPresetError(pub String);
