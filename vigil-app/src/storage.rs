//! Local SQLite storage for analysis history.
//!
//! One connection per call keeps the store `Send + Sync` without holding a
//! connection across await points; the history volume (one row per analyzed
//! file) makes pooling unnecessary.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use vigil_core::{AnalysisReport, MediaKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: i64,
    pub created_at: String,
    pub file_name: String,
    /// `"image"` or `"video"`.
    pub media_kind: String,
    pub severity: String,
    pub score: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct HistoryRecordInput {
    pub file_name: String,
    pub media_kind: MediaKind,
    pub severity: String,
    pub score: f64,
    pub explanation: String,
}

impl HistoryRecordInput {
    /// Flatten an analysis report into one history row. A video is summarised
    /// by its worst detection.
    pub fn from_report(file_name: &str, kind: MediaKind, report: &AnalysisReport) -> Self {
        let (severity, score, explanation) = match report {
            AnalysisReport::Image(image) => (
                image.severity.to_string(),
                image.score,
                image.explanation.clone(),
            ),
            AnalysisReport::Video(video) => {
                let worst = video.detections.iter().max_by(|a, b| {
                    a.severity
                        .cmp(&b.severity)
                        .then(a.confidence.total_cmp(&b.confidence))
                });
                match worst {
                    Some(d) => (d.severity.to_string(), d.confidence, d.explanation.clone()),
                    None => (
                        "Low".to_string(),
                        0.0,
                        "No distractions detected.".to_string(),
                    ),
                }
            }
        };
        Self {
            file_name: file_name.to_string(),
            media_kind: kind,
            severity,
            score,
            explanation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    db_path: PathBuf,
}

impl LocalStore {
    pub fn default_db_path() -> PathBuf {
        crate::settings::default_settings_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("history.sqlite")
    }

    pub fn new(db_path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let store = Self { db_path };
        store.init_schema()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, String> {
        Connection::open(&self.db_path).map_err(|e| e.to_string())
    }

    fn init_schema(&self) -> Result<(), String> {
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                media_kind TEXT NOT NULL,
                severity TEXT NOT NULL,
                score REAL NOT NULL,
                explanation TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_created
                ON analysis_history(created_at DESC);
            "#,
        )
        .map_err(|e| e.to_string())
    }

    pub fn insert_history(&self, input: HistoryRecordInput) -> Result<(), String> {
        let conn = self.open()?;
        let kind = match input.media_kind {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        };
        conn.execute(
            "INSERT INTO analysis_history
                (created_at, file_name, media_kind, severity, score, explanation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().timestamp(),
                input.file_name,
                kind,
                input.severity,
                input.score,
                input.explanation,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn get_history(&self, page: usize, page_size: usize) -> Result<HistoryPage, String> {
        let page_size = page_size.clamp(1, 200);
        let conn = self.open()?;

        let total: usize = conn
            .query_row("SELECT COUNT(*) FROM analysis_history", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .map_err(|e| e.to_string())?;

        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, file_name, media_kind, severity, score, explanation
                 FROM analysis_history
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1 OFFSET ?2",
            )
            .map_err(|e| e.to_string())?;

        let items = stmt
            .query_map(params![page_size as i64, (page * page_size) as i64], |row| {
                Ok(HistoryItem {
                    id: row.get(0)?,
                    created_at: ts_to_rfc3339(row.get(1)?),
                    file_name: row.get(2)?,
                    media_kind: row.get(3)?,
                    severity: row.get(4)?,
                    score: row.get(5)?,
                    explanation: row.get(6)?,
                })
            })
            .map_err(|e| e.to_string())?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;

        Ok(HistoryPage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub fn delete_history(&self, ids: &[i64]) -> Result<usize, String> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.open()?;
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("DELETE FROM analysis_history WHERE id IN ({placeholders})");
        let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
        stmt.execute(rusqlite::params_from_iter(ids.iter()))
            .map_err(|e| e.to_string())
    }

    pub fn prune_history(&self, retention_days: usize) -> Result<usize, String> {
        let cutoff = (Utc::now() - Duration::days(retention_days as i64)).timestamp();
        let conn = self.open()?;
        conn.execute(
            "DELETE FROM analysis_history WHERE created_at < ?1",
            params![cutoff],
        )
        .map_err(|e| e.to_string())
    }
}

fn ts_to_rfc3339(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt: DateTime<Utc>| dt.to_rfc3339())
        .unwrap_or_default()
}
