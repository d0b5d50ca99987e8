use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::settings::domain::settings::{Quality, Resolution, Settings};
use crate::shared::error::FaceSwapError;

/// Process-wide settings shared by the control surface (writer) and the
/// capture and pipeline threads (readers).
///
/// Readers take a [`Settings`] snapshot once per iteration; the lock is only
/// held for the copy. Resolution writes bump a generation counter so the
/// capture loop can detect a pending device restart with one atomic load.
pub struct SettingsState {
    inner: Mutex<Settings>,
    resolution_generation: AtomicU64,
}

/// Tracks which resolution generation a reader has already acted on.
#[derive(Debug)]
pub struct ResolutionWatch {
    seen: u64,
}

impl SettingsState {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
            resolution_generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Settings {
        *self.lock()
    }

    pub fn set_resolution(&self, resolution: Resolution) {
        let mut settings = self.lock();
        if settings.resolution != resolution {
            settings.resolution = resolution;
            self.resolution_generation.fetch_add(1, Ordering::Release);
            log::info!("Resolution set to {resolution}");
        }
    }

    pub fn set_detection_enabled(&self, enabled: bool) {
        self.lock().detection_enabled = enabled;
        log::info!("Face detection {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Validates and stores a quality level; out-of-range values leave the
    /// current quality untouched.
    pub fn set_quality(&self, value: u32) -> Result<(), FaceSwapError> {
        let quality = Quality::new(value)?;
        self.lock().quality = quality;
        Ok(())
    }

    /// Starts watching for resolution changes made after this call.
    pub fn watch_resolution(&self) -> ResolutionWatch {
        ResolutionWatch {
            seen: self.resolution_generation.load(Ordering::Acquire),
        }
    }

    /// Returns the new resolution if it changed since the watch last saw it,
    /// and marks the change as seen. Several writes in between collapse into
    /// one notification carrying the latest value.
    pub fn resolution_changed(&self, watch: &mut ResolutionWatch) -> Option<Resolution> {
        let current = self.resolution_generation.load(Ordering::Acquire);
        if current == watch.seen {
            return None;
        }
        let settings = self.lock();
        watch.seen = self.resolution_generation.load(Ordering::Acquire);
        Some(settings.resolution)
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        // Settings is plain Copy data; a panicked writer cannot leave it torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SettingsState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
