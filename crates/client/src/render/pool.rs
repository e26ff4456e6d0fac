//! Shared render surface.
//!
//! One browser and one browsing context serve every detail page of a batch.
//! The surface is launched on first use, relaunched when it dies, and torn
//! down explicitly with [`RenderPool::release_all`].

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{Launcher, RenderError, RenderSurface};

/// Lazily started render surface guarded by one async mutex.
///
/// Launch and teardown both happen under the lock, so concurrent callers
/// never start two browsers.
pub struct RenderPool<L: Launcher> {
    launcher: L,
    surface: Mutex<Option<Arc<L::Surface>>>,
}

impl<L: Launcher> RenderPool<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher, surface: Mutex::new(None) }
    }

    /// Return the live surface, launching one if there is none or the
    /// current one died.
    pub async fn acquire(&self) -> Result<Arc<L::Surface>, RenderError> {
        let mut slot = self.surface.lock().await;

        if let Some(surface) = slot.as_ref() {
            if surface.is_alive() {
                return Ok(Arc::clone(surface));
            }
            tracing::warn!("render surface is gone, relaunching");
            surface.shutdown().await;
            *slot = None;
        }

        tracing::info!("launching render surface");
        let surface = Arc::new(self.launcher.launch().await?);
        *slot = Some(Arc::clone(&surface));
        Ok(surface)
    }

    /// Tear the surface down. Always leaves the pool uninitialized.
    pub async fn release_all(&self) {
        let mut slot = self.surface.lock().await;
        if let Some(surface) = slot.take() {
            surface.shutdown().await;
            tracing::info!("render surface released");
        }
    }

    /// `true` while a surface is held, alive or not.
    pub async fn is_initialized(&self) -> bool {
        self.surface.lock().await.is_some()
    }
}
