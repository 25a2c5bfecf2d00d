//! Tauri application state.
//!
//! `AppState` is managed via `app.manage(...)` and injected into command
//! handlers by Tauri's `State<'_, AppState>` extractor.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use vigil_core::{AlarmPlayer, VigilEngine};

use crate::settings::AppSettings;
use crate::storage::LocalStore;

/// Shared application state — available in every `#[tauri::command]`.
pub struct AppState {
    /// The core analyzer engine. Wrapped in `Arc` so it can be cloned into
    /// event-forwarding tasks started after setup.
    pub engine: Arc<VigilEngine>,
    /// The alarm player, shared with the engine.
    pub alarm: Arc<AlarmPlayer>,
    /// Persisted app settings cache.
    pub settings: Arc<Mutex<AppSettings>>,
    /// Absolute path to `settings.json`.
    pub settings_path: PathBuf,
    /// Analysis history storage.
    pub store: Arc<LocalStore>,
    /// Count of user-interaction events that requested audio initialization.
    pub audio_init_requests: Arc<AtomicUsize>,
    /// Count of manual alarm triggers from the UI.
    pub manual_alarms: Arc<AtomicUsize>,
}

impl AppState {
    pub fn diagnostics_snapshot(&self) -> AppDiagnostics {
        let engine = self.engine.diagnostics_snapshot();
        AppDiagnostics {
            audio_init_requests: self.audio_init_requests.load(Ordering::Relaxed),
            manual_alarms: self.manual_alarms.load(Ordering::Relaxed),
            engine,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDiagnostics {
    pub audio_init_requests: usize,
    pub manual_alarms: usize,
    #[serde(flatten)]
    pub engine: vigil_core::engine::DiagnosticsSnapshot,
}
