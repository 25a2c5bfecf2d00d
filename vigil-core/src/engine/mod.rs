//! `VigilEngine` — analyzer orchestration and alert policy.
//!
//! ## Flow (per submission)
//!
//! ```text
//! analyze(media)
//!     ├─ admit: exactly one analysis in flight (else AnalysisInFlight)
//!     ├─ status → Analyzing
//!     ├─ DetectionBackend::analyze_{image,video}
//!     ├─ broadcast AnalysisEvent { seq, file_name, report }
//!     ├─ High severity → AlarmPlayer::play_alarm
//!     │  otherwise    → AlarmPlayer::play_beep (when enabled)
//!     └─ status → Idle (or Error with detail)
//! ```
//!
//! `analyze` is blocking — backends do network I/O — and is intended to run
//! inside `spawn_blocking`, keeping the host's async executor free for IPC.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::alarm::{AlarmPlayer, AlarmTone, BeepTone};
use crate::analysis::{BackendHealth, DetectorHandle};
use crate::error::{Result, VigilError};
use crate::ipc::events::{
    AnalysisEvent, AnalysisReport, AnalyzerStatus, AnalyzerStatusEvent,
};
use crate::media::{MediaFile, MediaKind};

/// Broadcast channel capacity: enough for slow consumers during a burst of
/// submissions.
const BROADCAST_CAP: usize = 64;

/// Configuration for `VigilEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sound the alarm when a report reaches High severity. Default: true.
    pub alarm_on_high: bool,
    /// Play a short acknowledgement beep for non-High results. Default: true.
    pub beep_on_result: bool,
    /// Alarm burst parameters passed to the player.
    pub alarm: AlarmTone,
    /// Acknowledgement beep parameters.
    pub beep: BeepTone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alarm_on_high: true,
            beep_on_result: true,
            alarm: AlarmTone::default(),
            beep: BeepTone::default(),
        }
    }
}

/// Shared analyzer counters for observability.
#[derive(Debug, Default)]
pub struct EngineDiagnostics {
    pub analyses_started: AtomicUsize,
    pub analyses_completed: AtomicUsize,
    pub analyses_failed: AtomicUsize,
    pub submissions_rejected: AtomicUsize,
    pub alarms_triggered: AtomicUsize,
    pub beeps_played: AtomicUsize,
}

impl EngineDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            analyses_started: self.analyses_started.load(Ordering::Relaxed),
            analyses_completed: self.analyses_completed.load(Ordering::Relaxed),
            analyses_failed: self.analyses_failed.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            alarms_triggered: self.alarms_triggered.load(Ordering::Relaxed),
            beeps_played: self.beeps_played.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub analyses_started: usize,
    pub analyses_completed: usize,
    pub analyses_failed: usize,
    pub submissions_rejected: usize,
    pub alarms_triggered: usize,
    pub beeps_played: usize,
}

/// The top-level analyzer handle.
///
/// `VigilEngine` is `Send + Sync` — all fields use interior mutability. Wrap
/// in `Arc<VigilEngine>` to share between the Tauri app state and
/// event-forwarding async tasks.
pub struct VigilEngine {
    config: EngineConfig,
    detector: DetectorHandle,
    alarm: Arc<AlarmPlayer>,
    /// `true` while a submission is being analyzed.
    in_flight: AtomicBool,
    /// Canonical status (read from commands, written around each analysis).
    status: Mutex<AnalyzerStatus>,
    analysis_tx: broadcast::Sender<AnalysisEvent>,
    status_tx: broadcast::Sender<AnalyzerStatusEvent>,
    /// Monotonically increasing event sequence counter.
    seq: AtomicU64,
    diagnostics: Arc<EngineDiagnostics>,
}

impl VigilEngine {
    pub fn new(config: EngineConfig, detector: DetectorHandle, alarm: Arc<AlarmPlayer>) -> Self {
        let (analysis_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            detector,
            alarm,
            in_flight: AtomicBool::new(false),
            status: Mutex::new(AnalyzerStatus::Idle),
            analysis_tx,
            status_tx,
            seq: AtomicU64::new(0),
            diagnostics: Arc::new(EngineDiagnostics::default()),
        }
    }

    /// The shared alarm player (for manual trigger/stop from the UI).
    pub fn alarm(&self) -> &Arc<AlarmPlayer> {
        &self.alarm
    }

    /// Probe the detection backend.
    pub fn probe_backend(&self) -> Result<BackendHealth> {
        self.detector.0.lock().probe()
    }

    /// Analyze one media submission, broadcast the result, and apply the
    /// alert policy.
    ///
    /// Blocking — run inside `spawn_blocking`.
    ///
    /// # Errors
    /// - `VigilError::AnalysisInFlight` when a submission is already running.
    /// - Backend errors are re-broadcast as an Error status and returned.
    pub fn analyze(&self, media: MediaFile) -> Result<AnalysisReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.diagnostics
                .submissions_rejected
                .fetch_add(1, Ordering::Relaxed);
            return Err(VigilError::AnalysisInFlight);
        }

        self.diagnostics
            .analyses_started
            .fetch_add(1, Ordering::Relaxed);
        self.set_status(AnalyzerStatus::Analyzing, Some(media.name.clone()));

        let outcome = {
            let mut detector = self.detector.0.lock();
            match media.kind {
                MediaKind::Image => detector.analyze_image(&media).map(AnalysisReport::Image),
                MediaKind::Video => detector.analyze_video(&media).map(AnalysisReport::Video),
            }
        };

        let result = match outcome {
            Ok(report) => {
                self.diagnostics
                    .analyses_completed
                    .fetch_add(1, Ordering::Relaxed);

                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                let event = AnalysisEvent {
                    seq,
                    file_name: media.name.clone(),
                    report: report.clone(),
                };
                let emitted = self.analysis_tx.send(event).is_ok();
                info!(
                    seq,
                    file = %media.name,
                    requires_alarm = report.requires_alarm(),
                    emitted,
                    "analysis complete"
                );

                self.apply_alert_policy(&report);
                self.set_status(AnalyzerStatus::Idle, None);
                Ok(report)
            }
            Err(e) => {
                self.diagnostics
                    .analyses_failed
                    .fetch_add(1, Ordering::Relaxed);
                warn!(file = %media.name, error = %e, "analysis failed");
                self.set_status(AnalyzerStatus::Error, Some(e.to_string()));
                Err(e)
            }
        };

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Current analyzer status (snapshot).
    pub fn status(&self) -> AnalyzerStatus {
        *self.status.lock()
    }

    /// Subscribe to completed-analysis events.
    pub fn subscribe_analyses(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.analysis_tx.subscribe()
    }

    /// Subscribe to analyzer status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<AnalyzerStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of analyzer counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn apply_alert_policy(&self, report: &AnalysisReport) {
        if report.requires_alarm() {
            if self.config.alarm_on_high {
                self.alarm.play_alarm(self.config.alarm);
                self.diagnostics
                    .alarms_triggered
                    .fetch_add(1, Ordering::Relaxed);
            }
        } else if self.config.beep_on_result {
            self.alarm.play_beep(self.config.beep);
            self.diagnostics.beeps_played.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn set_status(&self, new_status: AnalyzerStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(AnalyzerStatusEvent {
            status: new_status,
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;
    use std::time::Duration;

    use crate::analysis::DetectionBackend;
    use crate::ipc::events::{ImageReport, Severity};

    const RATE: u32 = 10_000;

    struct ScriptedDetector {
        severity: Severity,
        fail: bool,
        /// When set, `analyze_image` blocks until the receiver side is
        /// released — used to hold an analysis in flight.
        release: Option<std::sync::mpsc::Receiver<()>>,
    }

    impl ScriptedDetector {
        fn with_severity(severity: Severity) -> Self {
            Self {
                severity,
                fail: false,
                release: None,
            }
        }
    }

    impl DetectionBackend for ScriptedDetector {
        fn probe(&mut self) -> crate::error::Result<BackendHealth> {
            Ok(BackendHealth {
                status: "scripted".into(),
                model_loaded: true,
            })
        }

        fn analyze_image(&mut self, _media: &MediaFile) -> crate::error::Result<ImageReport> {
            if let Some(release) = &self.release {
                let _ = release.recv();
            }
            if self.fail {
                return Err(VigilError::Api("intentional test failure".into()));
            }
            Ok(ImageReport {
                severity: self.severity,
                score: 0.9,
                explanation: "scripted".into(),
                class: None,
                confidence: None,
            })
        }

        fn analyze_video(
            &mut self,
            _media: &MediaFile,
        ) -> crate::error::Result<crate::ipc::events::VideoReport> {
            unimplemented!("scripted detector only analyzes images")
        }
    }

    fn png_media() -> MediaFile {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 24]);
        MediaFile::from_bytes("driver.png", bytes).unwrap()
    }

    fn engine_with(detector: ScriptedDetector) -> (VigilEngine, Arc<AlarmPlayer>) {
        let alarm = Arc::new(AlarmPlayer::new());
        alarm.initialize_detached(RATE);
        let engine = VigilEngine::new(
            EngineConfig::default(),
            DetectorHandle::new(detector),
            Arc::clone(&alarm),
        );
        (engine, alarm)
    }

    #[test]
    fn high_severity_triggers_the_alarm_and_broadcasts() {
        let (engine, alarm) = engine_with(ScriptedDetector::with_severity(Severity::High));
        let mut rx = engine.subscribe_analyses();

        let report = engine.analyze(png_media()).unwrap();
        assert!(report.requires_alarm());
        assert!(alarm.is_playing());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.seq, 0);
        assert_eq!(event.file_name, "driver.png");
        assert!(event.report.requires_alarm());

        let diag = engine.diagnostics_snapshot();
        assert_eq!(diag.alarms_triggered, 1);
        assert_eq!(diag.beeps_played, 0);

        alarm.stop_alarm();
    }

    #[test]
    fn non_high_results_beep_without_raising_the_alarm() {
        let (engine, alarm) = engine_with(ScriptedDetector::with_severity(Severity::Low));

        engine.analyze(png_media()).unwrap();
        assert!(!alarm.is_playing());

        let diag = engine.diagnostics_snapshot();
        assert_eq!(diag.alarms_triggered, 0);
        assert_eq!(diag.beeps_played, 1);
    }

    #[test]
    fn seq_increments_across_analyses() {
        let (engine, _alarm) = engine_with(ScriptedDetector::with_severity(Severity::Low));
        let mut rx = engine.subscribe_analyses();

        engine.analyze(png_media()).unwrap();
        engine.analyze(png_media()).unwrap();

        assert_eq!(rx.try_recv().unwrap().seq, 0);
        assert_eq!(rx.try_recv().unwrap().seq, 1);
    }

    #[test]
    fn a_second_submission_is_rejected_while_one_is_in_flight() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let mut detector = ScriptedDetector::with_severity(Severity::Low);
        detector.release = Some(release_rx);

        let (engine, _alarm) = engine_with(detector);
        let engine = Arc::new(engine);

        let background = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.analyze(png_media()))
        };

        // Wait for the background analysis to be admitted.
        let admitted = (0..100).any(|_| {
            thread::sleep(Duration::from_millis(5));
            engine.status() == AnalyzerStatus::Analyzing
        });
        assert!(admitted, "background analysis never started");

        let err = engine.analyze(png_media()).unwrap_err();
        assert!(matches!(err, VigilError::AnalysisInFlight));
        assert_eq!(engine.diagnostics_snapshot().submissions_rejected, 1);

        release_tx.send(()).unwrap();
        background.join().unwrap().unwrap();
        assert_eq!(engine.status(), AnalyzerStatus::Idle);
    }

    #[test]
    fn failures_set_error_status_and_release_the_slot() {
        let mut detector = ScriptedDetector::with_severity(Severity::Low);
        detector.fail = true;
        let (engine, alarm) = engine_with(detector);
        let mut status_rx = engine.subscribe_status();

        let err = engine.analyze(png_media()).unwrap_err();
        assert!(matches!(err, VigilError::Api(_)));
        assert_eq!(engine.status(), AnalyzerStatus::Error);
        assert!(!alarm.is_playing());

        // Analyzing → Error was broadcast.
        assert_eq!(
            status_rx.try_recv().unwrap().status,
            AnalyzerStatus::Analyzing
        );
        let error_event = status_rx.try_recv().unwrap();
        assert_eq!(error_event.status, AnalyzerStatus::Error);
        assert!(error_event.detail.unwrap().contains("intentional"));

        // The slot is free again: a fresh failure is admitted, not rejected.
        let err = engine.analyze(png_media()).unwrap_err();
        assert!(matches!(err, VigilError::Api(_)));
    }

    #[test]
    fn uninitialized_alarm_does_not_block_analysis() {
        let alarm = Arc::new(AlarmPlayer::new());
        let engine = VigilEngine::new(
            EngineConfig::default(),
            DetectorHandle::new(ScriptedDetector::with_severity(Severity::High)),
            Arc::clone(&alarm),
        );

        let report = engine.analyze(png_media()).unwrap();
        assert!(report.requires_alarm());
        // The play call was a logged no-op.
        assert!(!alarm.is_playing());
        assert_eq!(engine.diagnostics_snapshot().alarms_triggered, 1);
    }
}
