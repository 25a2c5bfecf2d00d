//! # vigil-core
//!
//! Reusable driver-distraction alert SDK.
//!
//! ## Architecture
//!
//! ```text
//! Media file → MediaFile::from_bytes (sniff + limits)
//!                  │
//!          VigilEngine::analyze (spawn_blocking)
//!                  │
//!        DetectionBackend::analyze_{image,video}
//!                  │
//!     broadcast::Sender<AnalysisEvent> ──► UI
//!                  │
//!          High severity? ──► AlarmPlayer::play_alarm
//!                  └────────► AlarmPlayer::play_beep
//!
//! AlarmPlayer ──► Mixer (voice table) ──► cpal output callback
//!                    └──────────────────► offline WAV preview / tests
//! ```
//!
//! The alarm path is sample-accurate: voices schedule their envelope, warble,
//! and end point in samples, so the audible result is identical whether the
//! mixer is pulled by a sound card or rendered offline.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod alarm;
pub mod analysis;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod media;

// Convenience re-exports for downstream crates
pub use alarm::{AlarmPlayer, AlarmTone, BeepTone};
pub use analysis::{
    BackendHealth, DetectionBackend, DetectorHandle, HttpDetector, HttpDetectorConfig,
    StubDetector,
};
pub use engine::{EngineConfig, VigilEngine};
pub use error::VigilError;
pub use ipc::events::{
    AlarmStateEvent, AlarmStatus, AnalysisEvent, AnalysisReport, AnalyzerStatus,
    AnalyzerStatusEvent, FrameDetection, ImageReport, Severity, VideoReport,
};
pub use media::{MediaFile, MediaKind};
