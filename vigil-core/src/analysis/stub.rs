//! `StubDetector` — placeholder backend that classifies without a service.
//!
//! Used during development before the detection service is reachable, and to
//! exercise the full analyze → event → alarm path deterministically: the
//! verdict is a pure function of the payload length, so the same file always
//! produces the same severity.

use tracing::debug;

use crate::error::Result;
use crate::ipc::events::{FrameDetection, ImageReport, Severity, VideoReport};
use crate::media::MediaFile;

use super::{BackendHealth, DetectionBackend};

const EXPLANATIONS: [&str; 3] = [
    "No strong distraction indicators detected. The driver appears focused on the road.",
    "Some distraction cues detected. Consider removing potential distractions.",
    "Strong distraction signs present. Immediate attention required for safety.",
];

/// Deterministic stub backend.
pub struct StubDetector {
    analyses: u32,
}

impl StubDetector {
    pub fn new() -> Self {
        Self { analyses: 0 }
    }

    fn verdict_for(bytes: &[u8]) -> (Severity, &'static str, f64) {
        match bytes.len() % 3 {
            0 => (Severity::Low, "safe_driving", 0.12),
            1 => (Severity::Medium, "drinking", 0.58),
            _ => (Severity::High, "texting_right", 0.91),
        }
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionBackend for StubDetector {
    fn probe(&mut self) -> Result<BackendHealth> {
        Ok(BackendHealth {
            status: "stub".into(),
            model_loaded: true,
        })
    }

    fn analyze_image(&mut self, media: &MediaFile) -> Result<ImageReport> {
        self.analyses += 1;
        let (severity, class, score) = Self::verdict_for(&media.bytes);
        debug!(analysis = self.analyses, file = %media.name, %severity, "stub image verdict");

        Ok(ImageReport {
            severity,
            score,
            explanation: format!(
                "{} Detected: {}.",
                EXPLANATIONS[severity as usize],
                class.replace('_', " ")
            ),
            class: Some(class.to_string()),
            confidence: Some(score),
        })
    }

    fn analyze_video(&mut self, media: &MediaFile) -> Result<VideoReport> {
        self.analyses += 1;
        let (severity, class, score) = Self::verdict_for(&media.bytes);

        // One detection per simulated second, ending on the derived verdict.
        let frames = 3u32;
        let detections: Vec<FrameDetection> = (0..frames)
            .map(|i| {
                let last = i == frames - 1;
                let (sev, cls, conf) = if last {
                    (severity, class, score)
                } else {
                    (Severity::Low, "safe_driving", 0.95)
                };
                FrameDetection {
                    frame_number: i * 30,
                    timestamp: i as f64,
                    timestamp_formatted: format!("00:{i:02}"),
                    class: cls.to_string(),
                    severity: sev,
                    confidence: conf,
                    explanation: EXPLANATIONS[sev as usize].to_string(),
                }
            })
            .collect();

        let distracted = detections
            .iter()
            .filter(|d| d.class != "safe_driving")
            .count() as u32;

        Ok(VideoReport {
            total_frames_analyzed: frames,
            distracted_frames: distracted,
            distraction_percentage: (distracted as f64 / frames as f64 * 100.0).round(),
            detections,
        })
    }
}
