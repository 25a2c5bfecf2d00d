//! Tauri command handlers.
//!
//! Each function is registered with `tauri::Builder::invoke_handler` and
//! callable from the frontend via `invoke(...)`. Blocking work (network,
//! SQLite) runs through `spawn_blocking` so the IPC thread stays responsive.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tauri::{Emitter, State};
use tracing::info;
use vigil_core::alarm::device::DeviceInfo;
use vigil_core::{
    AlarmStateEvent, AlarmStatus, AnalysisReport, AnalyzerStatus, BackendHealth, MediaFile,
};

use crate::settings::{save_settings, AppSettings};
use crate::state::{AppDiagnostics, AppState};
use crate::storage::{HistoryPage, HistoryRecordInput};

/// Create the audio output context.
///
/// Called by the frontend from its first pointer-down handler (platform audio
/// policy requires a user gesture). Idempotent; failure to open a device is a
/// logged no-op, so this command never errors.
#[tauri::command]
pub async fn init_audio(state: State<'_, AppState>) -> Result<AlarmStatus, String> {
    state.audio_init_requests.fetch_add(1, Ordering::Relaxed);
    let preferred = state.settings.lock().preferred_output_device.clone();
    let alarm = Arc::clone(&state.alarm);
    tauri::async_runtime::spawn_blocking(move || {
        alarm.initialize_with_device(preferred.as_deref());
        alarm.status()
    })
    .await
    .map_err(|e| e.to_string())
}

/// Analyze a media payload handed over from the webview.
///
/// The engine broadcasts the result (and sounds the alarm on High severity);
/// the report is also returned directly for the submitting view.
#[tauri::command]
pub async fn analyze_media(
    state: State<'_, AppState>,
    app: tauri::AppHandle,
    file_name: String,
    data_base64: String,
) -> Result<AnalysisReport, String> {
    let bytes = BASE64
        .decode(data_base64.as_bytes())
        .map_err(|e| format!("invalid payload: {e}"))?;
    let media = MediaFile::from_bytes(file_name, bytes).map_err(|e| e.to_string())?;

    let media_kind = media.kind;
    let media_name = media.name.clone();
    let engine = Arc::clone(&state.engine);
    let report = tauri::async_runtime::spawn_blocking(move || engine.analyze(media))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    let _ = app.emit(
        "vigil://alarm",
        AlarmStateEvent {
            playing: state.alarm.is_playing(),
        },
    );

    let (history_enabled, input) = {
        let settings = state.settings.lock();
        (
            settings.history_enabled,
            HistoryRecordInput::from_report(&media_name, media_kind, &report),
        )
    };
    if history_enabled {
        let store = Arc::clone(&state.store);
        let persisted = tauri::async_runtime::spawn_blocking(move || store.insert_history(input))
            .await
            .map_err(|e| e.to_string())?;
        if let Err(e) = persisted {
            tracing::warn!("failed to persist history: {e}");
        }
    }

    Ok(report)
}

/// Manual alarm trigger from the result card.
#[tauri::command]
pub async fn trigger_alarm(state: State<'_, AppState>, app: tauri::AppHandle) -> Result<(), String> {
    state.manual_alarms.fetch_add(1, Ordering::Relaxed);
    let tone = state.settings.lock().alarm_tone();
    state.alarm.play_alarm(tone);
    let _ = app.emit("vigil://alarm", AlarmStateEvent { playing: true });
    Ok(())
}

/// Stop alarm playback immediately.
#[tauri::command]
pub async fn stop_alarm(state: State<'_, AppState>, app: tauri::AppHandle) -> Result<(), String> {
    state.alarm.stop_alarm();
    let _ = app.emit("vigil://alarm", AlarmStateEvent { playing: false });
    Ok(())
}

/// Play the short acknowledgement beep.
#[tauri::command]
pub async fn play_beep(state: State<'_, AppState>) -> Result<(), String> {
    let beep = state.settings.lock().beep_tone();
    state.alarm.play_beep(beep);
    Ok(())
}

/// Return the current alarm player state.
#[tauri::command]
pub async fn get_alarm_status(state: State<'_, AppState>) -> Result<AlarmStatus, String> {
    Ok(state.alarm.status())
}

/// Return the current analyzer state.
#[tauri::command]
pub async fn get_analyzer_status(state: State<'_, AppState>) -> Result<AnalyzerStatus, String> {
    Ok(state.engine.status())
}

/// Probe the detection service.
#[tauri::command]
pub async fn backend_health(state: State<'_, AppState>) -> Result<BackendHealth, String> {
    let engine = Arc::clone(&state.engine);
    tauri::async_runtime::spawn_blocking(move || engine.probe_backend())
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

/// Return a list of available audio output devices.
#[tauri::command]
pub async fn list_audio_devices(_state: State<'_, AppState>) -> Result<Vec<DeviceInfo>, String> {
    Ok(vigil_core::alarm::device::list_output_devices())
}

/// Return persisted settings.
#[tauri::command]
pub async fn get_settings(state: State<'_, AppState>) -> Result<AppSettings, String> {
    Ok(state.settings.lock().clone())
}

/// Persist settings.
///
/// Alarm parameters apply immediately to manual triggers and beeps; the
/// engine's automatic alert policy and the detection endpoint are re-read on
/// next app start.
#[tauri::command]
pub async fn set_settings(
    state: State<'_, AppState>,
    mut new_settings: AppSettings,
) -> Result<AppSettings, String> {
    new_settings.normalize();
    {
        let mut settings = state.settings.lock();
        *settings = new_settings.clone();
    }
    save_settings(&state.settings_path, &new_settings).map_err(|e| e.to_string())?;
    info!("settings saved");
    Ok(new_settings)
}

/// Return a page of analysis history, newest first.
#[tauri::command]
pub async fn get_history(
    state: State<'_, AppState>,
    page: usize,
    page_size: usize,
) -> Result<HistoryPage, String> {
    let store = Arc::clone(&state.store);
    tauri::async_runtime::spawn_blocking(move || store.get_history(page, page_size))
        .await
        .map_err(|e| e.to_string())?
}

/// Delete history rows by id.
#[tauri::command]
pub async fn delete_history(state: State<'_, AppState>, ids: Vec<i64>) -> Result<usize, String> {
    let store = Arc::clone(&state.store);
    tauri::async_runtime::spawn_blocking(move || store.delete_history(&ids))
        .await
        .map_err(|e| e.to_string())?
}

/// Snapshot of app + engine counters for the diagnostics view.
#[tauri::command]
pub async fn get_diagnostics(state: State<'_, AppState>) -> Result<AppDiagnostics, String> {
    Ok(state.diagnostics_snapshot())
}
