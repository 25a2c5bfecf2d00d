//! Event types emitted over the Tauri IPC channel, plus the report types
//! shared with the detection service wire format.
//!
//! ## Channel names
//!
//! | Event | Channel |
//! |-------|---------|
//! | `AnalysisEvent` | `"vigil://analysis"` |
//! | `AnalyzerStatusEvent` | `"vigil://status"` |
//! | `AlarmStateEvent` | `"vigil://alarm"` |
//!
//! Event envelopes use camelCase like the rest of the IPC surface. The report
//! types keep the service's own snake_case field names — the UI consumes them
//! exactly as the service spells them.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity classification returned by the detection service.
///
/// Serialized with the exact capitalization the service uses
/// (`"Low"` / `"Medium"` / `"High"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Whether this severity warrants the audible alarm.
    pub fn requires_alarm(self) -> bool {
        matches!(self, Severity::High)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis reports (wire format)
// ---------------------------------------------------------------------------

/// Result of analyzing a single image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReport {
    pub severity: Severity,
    /// 0.0 = safe, 1.0 = maximally distracted.
    pub score: f64,
    pub explanation: String,
    /// Predicted class label (e.g. `"texting_right"`), when provided.
    #[serde(default)]
    pub class: Option<String>,
    /// Raw model confidence for the predicted class, when provided.
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One analyzed frame of a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDetection {
    pub frame_number: u32,
    /// Offset into the video in seconds.
    pub timestamp: f64,
    /// Human-readable `mm:ss` form of `timestamp`.
    pub timestamp_formatted: String,
    pub class: String,
    pub severity: Severity,
    pub confidence: f64,
    pub explanation: String,
}

/// Result of analyzing a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoReport {
    pub total_frames_analyzed: u32,
    pub distracted_frames: u32,
    pub distraction_percentage: f64,
    pub detections: Vec<FrameDetection>,
}

impl VideoReport {
    /// True when any analyzed frame reached High severity.
    pub fn has_high_severity(&self) -> bool {
        self.detections.iter().any(|d| d.severity.requires_alarm())
    }
}

/// Either kind of analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnalysisReport {
    Image(ImageReport),
    Video(VideoReport),
}

impl AnalysisReport {
    /// Whether this report warrants the audible alarm.
    pub fn requires_alarm(&self) -> bool {
        match self {
            AnalysisReport::Image(report) => report.severity.requires_alarm(),
            AnalysisReport::Video(report) => report.has_high_severity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer events
// ---------------------------------------------------------------------------

/// Emitted on channel `"vigil://analysis"` when an analysis completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Name of the analyzed file.
    pub file_name: String,
    pub report: AnalysisReport,
}

/// Emitted on channel `"vigil://status"` when the analyzer state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerStatusEvent {
    pub status: AnalyzerStatus,
    /// Optional human-readable detail (file name, error message).
    pub detail: Option<String>,
}

/// Current state of the analyzer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerStatus {
    /// No analysis in flight.
    Idle,
    /// A submission is being validated/uploaded/analyzed.
    Analyzing,
    /// The last submission failed; the next one starts fresh.
    Error,
}

// ---------------------------------------------------------------------------
// Alarm events
// ---------------------------------------------------------------------------

/// Emitted on channel `"vigil://alarm"` when alarm playback starts or stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmStateEvent {
    pub playing: bool,
}

/// Current state of the alarm player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStatus {
    /// No audio output context yet — `initialize()` has not succeeded.
    Uninitialized,
    /// Initialized, nothing sounding.
    Idle,
    /// An alarm is sounding.
    Playing,
}
