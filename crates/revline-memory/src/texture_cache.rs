//! Memoized, downscaled and re-encoded texture variants under a memory budget.
//!
//! [`TextureCache`] derives one variant per `(texture id, quality preset)`
//! and hands out the same [`Arc<Texture>`] for repeated requests. Variants
//! are evicted least recently used first once the budget is exceeded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use image::imageops::{self, FilterType};

use crate::clock::{Clock, SystemClock};
use crate::error::TextureError;
use crate::metrics::bytes_to_mb;
use crate::texture::Texture;
use crate::texture_quality::{QualityPreset, QualitySettings};

/// Default variant budget, in MB.
pub const DEFAULT_TEXTURE_BUDGET_MB: f64 = 500.0;

/// Fraction of the budget enforcement shrinks usage to.
const BUDGET_HEADROOM: f64 = 0.8;

/// Backend limits that affect derived variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderCapabilities {
    pub max_anisotropy: u32,
}

/// One derived texture and its bookkeeping.
#[derive(Clone, Debug)]
pub struct CachedTextureVariant {
    texture: Arc<Texture>,
    preset: QualityPreset,
    original_size_bytes: u64,
    compressed_size_bytes: u64,
    last_accessed_at: Duration,
    sequence: u64,
}

impl CachedTextureVariant {
    #[must_use]
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    #[must_use]
    pub fn preset(&self) -> QualityPreset {
        self.preset
    }

    /// Size of the source's full-resolution level.
    #[must_use]
    pub fn original_size_bytes(&self) -> u64 {
        self.original_size_bytes
    }

    /// Size of the variant across its mip chain.
    #[must_use]
    pub fn compressed_size_bytes(&self) -> u64 {
        self.compressed_size_bytes
    }

    #[must_use]
    pub fn last_accessed_at(&self) -> Duration {
        self.last_accessed_at
    }
}

/// Summary of the cache contents.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureMemoryInfo {
    pub total_textures: usize,
    pub total_memory_mb: f64,
    pub largest_texture_mb: f64,
    /// Time since the least recently used variant was last accessed.
    pub oldest_texture_age: Duration,
}

/// One entry of [`TextureCache::optimize_batch`].
#[derive(Clone, Debug)]
pub struct OptimizeRequest {
    pub source: Arc<Texture>,
    pub preset: QualityPreset,
    pub texture_id: String,
}

type VariantKey = (String, QualityPreset);

/// Cache of quality-reduced texture variants.
#[derive(Debug)]
pub struct TextureCache {
    variants: HashMap<VariantKey, CachedTextureVariant>,
    budget_bytes: u64,
    capabilities: Option<RenderCapabilities>,
    variant_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    next_sequence: u64,
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(DEFAULT_TEXTURE_BUDGET_MB)
    }
}

fn mb_to_bytes(mb: f64) -> u64 {
    (mb.max(0.0) * 1024.0 * 1024.0) as u64
}

impl TextureCache {
    pub fn new(budget_mb: f64) -> Self {
        Self::with_clock(budget_mb, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(budget_mb: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            variants: HashMap::new(),
            budget_bytes: mb_to_bytes(budget_mb),
            capabilities: None,
            variant_ttl: None,
            clock,
            next_sequence: 0,
        }
    }

    /// Return the `preset` variant of `source`, deriving it on first request.
    ///
    /// A cached, unexpired variant is returned as the identical `Arc`. If the
    /// variant cannot be derived the source itself is returned and nothing is
    /// cached. The budget is enforced after every call.
    pub fn optimize(
        &mut self,
        source: &Arc<Texture>,
        preset: QualityPreset,
        texture_id: &str,
    ) -> Arc<Texture> {
        let now = self.clock.now();
        let key = (texture_id.to_string(), preset);

        if self.is_expired(&key, now) {
            self.variants.remove(&key);
            tracing::debug!(texture = texture_id, %preset, "Cached texture variant expired");
        }

        let texture = match self.variants.get_mut(&key) {
            Some(variant) => {
                variant.last_accessed_at = now;
                tracing::trace!(texture = texture_id, %preset, "Using cached texture variant");
                Arc::clone(&variant.texture)
            }
            None => self.derive_and_insert(source, key, now),
        };

        self.enforce_budget();
        texture
    }

    /// Optimize each request independently, returning results in input order.
    pub fn optimize_batch(&mut self, requests: &[OptimizeRequest]) -> Vec<Arc<Texture>> {
        requests
            .iter()
            .map(|request| self.optimize(&request.source, request.preset, &request.texture_id))
            .collect()
    }

    fn derive_and_insert(
        &mut self,
        source: &Arc<Texture>,
        key: VariantKey,
        now: Duration,
    ) -> Arc<Texture> {
        let preset = key.1;
        let settings = preset.settings();
        let max_anisotropy = self.capabilities.map(|caps| caps.max_anisotropy);

        let derived = match derive_variant(source, &settings, max_anisotropy) {
            Ok(derived) => Arc::new(derived),
            Err(err) => {
                tracing::warn!(texture = %key.0, preset = %key.1, error = %err, "Texture optimization failed, using source");
                return Arc::clone(source);
            }
        };

        let (width, height) = source.dimensions();
        let original_size_bytes = u64::from(width) * u64::from(height) * 4;
        let compressed_size_bytes = derived.size_bytes();
        tracing::debug!(
            texture = %key.0,
            preset = %key.1,
            from = %format!("{width}x{height}"),
            to = %format!("{}x{}", derived.width(), derived.height()),
            original_mb = %format!("{:.2}", bytes_to_mb(original_size_bytes)),
            variant_mb = %format!("{:.2}", bytes_to_mb(compressed_size_bytes)),
            "Texture optimized"
        );

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.variants.insert(
            key,
            CachedTextureVariant {
                texture: Arc::clone(&derived),
                preset,
                original_size_bytes,
                compressed_size_bytes,
                last_accessed_at: now,
                sequence,
            },
        );
        derived
    }

    fn is_expired(&self, key: &VariantKey, now: Duration) -> bool {
        match (self.variant_ttl, self.variants.get(key)) {
            (Some(ttl), Some(variant)) => now.saturating_sub(variant.last_accessed_at) > ttl,
            _ => false,
        }
    }

    /// Evict least recently used variants until usage is at most 80 % of the
    /// budget, if the budget is exceeded. Returns the number evicted.
    fn enforce_budget(&mut self) -> usize {
        let total = self.total_bytes();
        if total <= self.budget_bytes {
            return 0;
        }
        tracing::warn!(
            total_mb = %format!("{:.1}", bytes_to_mb(total)),
            budget_mb = %format!("{:.1}", bytes_to_mb(self.budget_bytes)),
            "Texture memory budget exceeded"
        );

        let target = (self.budget_bytes as f64 * BUDGET_HEADROOM) as u64;
        let mut order: Vec<(Duration, u64, VariantKey)> = self
            .variants
            .iter()
            .map(|(key, v)| (v.last_accessed_at, v.sequence, key.clone()))
            .collect();
        order.sort();

        let mut remaining = total;
        let mut evicted = 0;
        for (_, _, key) in order {
            if remaining <= target {
                break;
            }
            if let Some(variant) = self.variants.remove(&key) {
                remaining -= variant.compressed_size_bytes;
                evicted += 1;
                tracing::debug!(texture = %key.0, preset = %key.1, "Freed texture variant");
            }
        }

        tracing::info!(
            evicted,
            freed_mb = %format!("{:.1}", bytes_to_mb(total - remaining)),
            "Texture budget enforced"
        );
        evicted
    }

    fn total_bytes(&self) -> u64 {
        self.variants
            .values()
            .map(|v| v.compressed_size_bytes)
            .sum()
    }

    /// Drop every cached variant. Textures already handed out stay valid.
    pub fn clear_cache(&mut self) {
        let count = self.variants.len();
        self.variants.clear();
        tracing::info!(count, "Texture cache cleared");
    }

    /// Change the budget and enforce it immediately.
    pub fn set_budget_mb(&mut self, budget_mb: f64) {
        self.budget_bytes = mb_to_bytes(budget_mb);
        self.enforce_budget();
    }

    #[must_use]
    pub fn budget_mb(&self) -> f64 {
        bytes_to_mb(self.budget_bytes)
    }

    /// Set backend limits for variants derived from now on.
    pub fn set_capabilities(&mut self, capabilities: RenderCapabilities) {
        self.capabilities = Some(capabilities);
    }

    /// Expire variants not accessed for longer than `ttl`. `None` disables expiry.
    pub fn set_variant_ttl(&mut self, ttl: Option<Duration>) {
        self.variant_ttl = ttl;
    }

    /// Remove every expired variant. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let Some(ttl) = self.variant_ttl else {
            return 0;
        };
        let now = self.clock.now();
        let before = self.variants.len();
        self.variants
            .retain(|_, v| now.saturating_sub(v.last_accessed_at) <= ttl);
        before - self.variants.len()
    }

    /// The cached variant for `(texture_id, preset)`, without refreshing it.
    #[must_use]
    pub fn variant(&self, texture_id: &str, preset: QualityPreset) -> Option<&CachedTextureVariant> {
        self.variants.get(&(texture_id.to_string(), preset))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn memory_info(&self) -> TextureMemoryInfo {
        let now = self.clock.now();
        let largest = self
            .variants
            .values()
            .map(|v| v.compressed_size_bytes)
            .max()
            .unwrap_or(0);
        let oldest = self
            .variants
            .values()
            .map(|v| v.last_accessed_at)
            .min()
            .unwrap_or(now);

        TextureMemoryInfo {
            total_textures: self.variants.len(),
            total_memory_mb: bytes_to_mb(self.total_bytes()),
            largest_texture_mb: bytes_to_mb(largest),
            oldest_texture_age: now.saturating_sub(oldest),
        }
    }
}

/// Largest size within `max_width x max_height` preserving aspect ratio.
/// Never scales up and never returns a zero dimension.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let w = ((f64::from(width) * scale).floor() as u32).clamp(1, max_width.max(1));
    let h = ((f64::from(height) * scale).floor() as u32).clamp(1, max_height.max(1));
    (w, h)
}

fn derive_variant(
    source: &Texture,
    settings: &QualitySettings,
    max_anisotropy: Option<u32>,
) -> Result<Texture, TextureError> {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 {
        return Err(TextureError::ZeroDimensions { width, height });
    }

    let (w, h) = fit_within(width, height, settings.max_width, settings.max_height);
    let resized = if (w, h) == (width, height) {
        source.base().clone()
    } else {
        imageops::resize(source.base(), w, h, FilterType::Lanczos3)
    };

    let decoded = settings
        .encoding
        .round_trip(&resized, settings.compression_level)?;

    let mut variant = Texture::new(decoded);
    if settings.mipmaps_enabled {
        variant = variant.with_mipmaps();
    }
    let anisotropy = max_anisotropy.map_or(1, |max| settings.anisotropy.min(max));
    Ok(variant.with_anisotropy(anisotropy))
}
