//! Vigil desktop application entry point.
//!
//! ## Runtime note
//!
//! Tauri v2 manages its own Tokio runtime internally.
//! We use `tauri::async_runtime::spawn` (not `tokio::spawn`) so our tasks
//! share Tauri's runtime and can safely call Tauri APIs.

#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

mod commands;
mod settings;
mod state;
mod storage;

use std::sync::{atomic::AtomicUsize, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use tauri::Emitter;
use tracing::info;
use vigil_core::{
    AlarmPlayer, AlarmStateEvent, DetectorHandle, HttpDetector, HttpDetectorConfig, StubDetector,
    VigilEngine,
};

use settings::{default_settings_path, load_settings};
use state::AppState;
use storage::LocalStore;

/// Pick the detection backend: the HTTP service by default, the deterministic
/// stub when requested (`VIGIL_DETECTOR=stub`) or when the client cannot be
/// built.
fn select_detector(app_settings: &settings::AppSettings) -> DetectorHandle {
    let forced_stub = std::env::var("VIGIL_DETECTOR")
        .map(|v| v.eq_ignore_ascii_case("stub"))
        .unwrap_or(false);
    if forced_stub {
        info!("using StubDetector (VIGIL_DETECTOR=stub)");
        return DetectorHandle::new(StubDetector::new());
    }

    let config = HttpDetectorConfig {
        base_url: app_settings.detection_base_url.clone(),
        timeout: Duration::from_secs(app_settings.request_timeout_secs),
    };
    match HttpDetector::new(config) {
        Ok(detector) => {
            info!(base_url = %app_settings.detection_base_url, "using HTTP detection service");
            DetectorHandle::new(detector)
        }
        Err(e) => {
            tracing::warn!("HTTP detector unavailable ({e}) — falling back to StubDetector");
            DetectorHandle::new(StubDetector::new())
        }
    }
}

fn main() {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info".parse().unwrap()),
        )
        .init();

    info!("Vigil starting");

    let settings_path = default_settings_path();
    let app_settings = load_settings(&settings_path);
    info!(
        settings_path = ?settings_path,
        detection_base_url = %app_settings.detection_base_url,
        alarm_on_high = app_settings.alarm_on_high,
        "runtime settings loaded"
    );

    // ── Engine setup ──────────────────────────────────────────────────────
    // The alarm player is constructed now but initializes its audio output
    // lazily, on the first user interaction forwarded by the frontend.
    let alarm = Arc::new(AlarmPlayer::new());
    let detector = select_detector(&app_settings);
    let engine = Arc::new(VigilEngine::new(
        app_settings.engine_config(),
        detector,
        Arc::clone(&alarm),
    ));

    // Non-fatal startup probe: the service may come up after us.
    {
        let engine = Arc::clone(&engine);
        std::thread::Builder::new()
            .name("startup-probe".into())
            .spawn(move || match engine.probe_backend() {
                Ok(health) => info!(
                    status = %health.status,
                    model_loaded = health.model_loaded,
                    "detection service reachable"
                ),
                Err(e) => tracing::warn!(
                    "detection service unreachable ({e}) — submissions will fail until it is up"
                ),
            })
            .expect("failed to spawn startup probe thread");
    }

    let store = Arc::new(
        LocalStore::new(LocalStore::default_db_path())
            .expect("failed to initialize local history storage"),
    );
    if let Err(e) = store.prune_history(app_settings.retention_days) {
        tracing::warn!("history prune failed at startup: {e}");
    }

    let settings_state = Arc::new(Mutex::new(app_settings));

    // ── Tauri app ─────────────────────────────────────────────────────────
    let engine_for_setup = Arc::clone(&engine);
    let alarm_for_setup = Arc::clone(&alarm);

    tauri::Builder::default()
        .setup(move |app| {
            let app_handle = app.handle().clone();

            // ── Forward engine events → Tauri event bus ───────────────────
            // Use tauri::async_runtime::spawn to share Tauri's Tokio runtime.

            let mut analysis_rx = engine_for_setup.subscribe_analyses();
            let handle1 = app_handle.clone();
            let alarm_for_events = Arc::clone(&alarm_for_setup);
            tauri::async_runtime::spawn(async move {
                loop {
                    match analysis_rx.recv().await {
                        Ok(event) => {
                            if let Err(e) = handle1.emit("vigil://analysis", &event) {
                                tracing::warn!("emit analysis: {e}");
                            }
                            // The alert policy may have started the alarm.
                            let _ = handle1.emit(
                                "vigil://alarm",
                                AlarmStateEvent {
                                    playing: alarm_for_events.is_playing(),
                                },
                            );
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("analysis receiver lagged by {n} events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            let mut status_rx = engine_for_setup.subscribe_status();
            let handle2 = app_handle.clone();
            tauri::async_runtime::spawn(async move {
                loop {
                    match status_rx.recv().await {
                        Ok(event) => {
                            if let Err(e) = handle2.emit("vigil://status", &event) {
                                tracing::warn!("emit status: {e}");
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("status receiver lagged by {n} events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            Ok(())
        })
        .manage(AppState {
            engine: Arc::clone(&engine),
            alarm: Arc::clone(&alarm),
            settings: Arc::clone(&settings_state),
            settings_path,
            store,
            audio_init_requests: Arc::new(AtomicUsize::new(0)),
            manual_alarms: Arc::new(AtomicUsize::new(0)),
        })
        .invoke_handler(tauri::generate_handler![
            commands::init_audio,
            commands::analyze_media,
            commands::trigger_alarm,
            commands::stop_alarm,
            commands::play_beep,
            commands::get_alarm_status,
            commands::get_analyzer_status,
            commands::backend_health,
            commands::list_audio_devices,
            commands::get_settings,
            commands::set_settings,
            commands::get_history,
            commands::delete_history,
            commands::get_diagnostics,
        ])
        .run(tauri::generate_context!())
        .expect("error while running Tauri application");
}
