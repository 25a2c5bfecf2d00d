//! Detection backend abstraction.
//!
//! The `DetectionBackend` trait decouples the analyzer from any specific
//! service (HTTP detection API, deterministic stub, future local inference).
//!
//! `&mut self` intentionally expresses that backends may be stateful —
//! connection pools, call counters, warm caches. All mutation is serialised
//! through `DetectorHandle`'s `parking_lot::Mutex`.

pub mod http;
pub mod stub;

pub use http::{HttpDetector, HttpDetectorConfig};
pub use stub::StubDetector;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ipc::events::{ImageReport, VideoReport};
use crate::media::MediaFile;

/// Liveness/readiness report from a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    pub model_loaded: bool,
}

/// Contract for driver-distraction detection backends.
pub trait DetectionBackend: Send + 'static {
    /// Cheap liveness probe. Called at startup and on demand from the UI.
    ///
    /// # Errors
    /// Returns an error when the backend is unreachable.
    fn probe(&mut self) -> Result<BackendHealth>;

    /// Analyze a single image.
    fn analyze_image(&mut self, media: &MediaFile) -> Result<ImageReport>;

    /// Analyze a video, returning per-frame detections.
    fn analyze_video(&mut self, media: &MediaFile) -> Result<VideoReport>;
}

/// Thread-safe reference-counted handle to any `DetectionBackend` implementor.
#[derive(Clone)]
pub struct DetectorHandle(pub Arc<Mutex<dyn DetectionBackend>>);

impl DetectorHandle {
    /// Wrap any `DetectionBackend` in a `DetectorHandle`.
    pub fn new<B: DetectionBackend>(backend: B) -> Self {
        Self(Arc::new(Mutex::new(backend)))
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle").finish_non_exhaustive()
    }
}
