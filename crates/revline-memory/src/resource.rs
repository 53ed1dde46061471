//! Disposable rendering resources tracked by the memory manager.

use std::fmt;
use std::time::Duration;

use crate::error::DisposeError;

/// Category of a managed resource, used for per-kind memory accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Texture,
    Geometry,
    Material,
    RenderTarget,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Texture,
        ResourceKind::Geometry,
        ResourceKind::Material,
        ResourceKind::RenderTarget,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Texture => "texture",
            ResourceKind::Geometry => "geometry",
            ResourceKind::Material => "material",
            ResourceKind::RenderTarget => "renderTarget",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release callback. Must tolerate being called more than once.
pub type DisposeFn = Box<dyn FnMut() -> Result<(), DisposeError> + Send>;

/// A disposable unit registered with the memory manager.
///
/// Recency and access count are stamped by the manager on registration and
/// on every access.
pub struct ManagedResource {
    id: String,
    kind: ResourceKind,
    size_bytes: u64,
    is_essential: bool,
    last_accessed_at: Duration,
    access_count: u64,
    dispose: DisposeFn,
}

impl ManagedResource {
    pub fn new(
        id: impl Into<String>,
        kind: ResourceKind,
        size_bytes: u64,
        dispose: impl FnMut() -> Result<(), DisposeError> + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            size_bytes,
            is_essential: false,
            last_accessed_at: Duration::ZERO,
            access_count: 0,
            dispose: Box::new(dispose),
        }
    }

    /// Mark the resource as exempt from every automatic eviction tier.
    #[must_use]
    pub fn essential(mut self) -> Self {
        self.is_essential = true;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    #[must_use]
    pub fn is_essential(&self) -> bool {
        self.is_essential
    }

    #[must_use]
    pub fn last_accessed_at(&self) -> Duration {
        self.last_accessed_at
    }

    #[must_use]
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Run the release callback.
    pub fn dispose(&mut self) -> Result<(), DisposeError> {
        (self.dispose)()
    }

    pub(crate) fn stamp_registered(&mut self, now: Duration) {
        self.last_accessed_at = now;
        self.access_count = 0;
    }

    pub(crate) fn touch(&mut self, now: Duration) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }

    pub(crate) fn info(&self) -> ResourceInfo {
        ResourceInfo {
            id: self.id.clone(),
            kind: self.kind,
            size_bytes: self.size_bytes,
            is_essential: self.is_essential,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
        }
    }
}

impl fmt::Debug for ManagedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedResource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("size_bytes", &self.size_bytes)
            .field("is_essential", &self.is_essential)
            .field("last_accessed_at", &self.last_accessed_at)
            .field("access_count", &self.access_count)
            .finish_non_exhaustive()
    }
}

/// Read-only snapshot of a registered resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: String,
    pub kind: ResourceKind,
    pub size_bytes: u64,
    pub is_essential: bool,
    pub last_accessed_at: Duration,
    pub access_count: u64,
}
