//! HTTP detection client.
//!
//! Talks to the detection service's simple request/response API: multipart
//! uploads to `/api/detect` and `/api/detect-video`, JSON bodies back.
//! Blocking on purpose — one user action maps to one request, and the
//! analyzer runs it inside `spawn_blocking`. No retries: a failed analysis is
//! reported to the user, who resubmits.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, VigilError};
use crate::ipc::events::{ImageReport, VideoReport};
use crate::media::MediaFile;

use super::{BackendHealth, DetectionBackend};

/// Configuration for [`HttpDetector`].
#[derive(Debug, Clone)]
pub struct HttpDetectorConfig {
    /// Service root, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Per-request timeout. Video analysis can take a while.
    pub timeout: Duration,
}

impl Default for HttpDetectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Detection backend backed by the remote analysis service.
pub struct HttpDetector {
    http: Client,
    base_url: String,
}

impl HttpDetector {
    /// Build the client. Fails only if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: HttpDetectorConfig) -> Result<Self> {
        let http = Client::builder()
            .pool_max_idle_per_host(2)
            .timeout(config.timeout)
            .build()
            .map_err(|e| VigilError::Api(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn submit<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        field: &str,
        media: &MediaFile,
    ) -> Result<T> {
        let part = Part::bytes(media.bytes.clone())
            .file_name(media.name.clone())
            .mime_str(media.mime)
            .map_err(|e| VigilError::Api(e.to_string()))?;
        let form = Form::new().part(field.to_string(), part);

        debug!(
            endpoint,
            file = %media.name,
            bytes = media.bytes.len(),
            "submitting media for analysis"
        );

        let response = self
            .http
            .post(format!("{}{}", self.base_url, endpoint))
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    VigilError::Api("detection request timed out".into())
                } else {
                    VigilError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| VigilError::Api(e.to_string()))?;
        decode_response(status, &body)
    }
}

impl DetectionBackend for HttpDetector {
    fn probe(&mut self) -> Result<BackendHealth> {
        let response = self
            .http
            .get(format!("{}/api/health", self.base_url))
            .send()
            .map_err(|e| VigilError::Api(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| VigilError::Api(e.to_string()))?;
        let health: BackendHealth = decode_response(status, &body)?;
        info!(
            status = %health.status,
            model_loaded = health.model_loaded,
            "detection service probed"
        );
        Ok(health)
    }

    fn analyze_image(&mut self, media: &MediaFile) -> Result<ImageReport> {
        self.submit("/api/detect", "image", media)
    }

    fn analyze_video(&mut self, media: &MediaFile) -> Result<VideoReport> {
        self.submit("/api/detect-video", "video", media)
    }
}

/// Error body the service sends alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Map a service response to a decoded body or the appropriate error.
///
/// 4xx and 503 carry a user-addressable `{error}` message (`Rejected`);
/// anything else non-2xx is an `Api` failure; a 2xx body that does not parse
/// is a `Decode` failure.
fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if status.is_success() {
        return serde_json::from_str(body).map_err(|e| VigilError::Decode(e.to_string()));
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("status {status}"));

    if status.is_client_error() || status == StatusCode::SERVICE_UNAVAILABLE {
        Err(VigilError::Rejected(message))
    } else {
        Err(VigilError::Api(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::events::Severity;

    #[test]
    fn decodes_a_successful_image_response() {
        let body = r#"{
            "severity": "Medium",
            "score": 0.62,
            "explanation": "Some distraction cues detected. Detected: drinking.",
            "class": "drinking",
            "confidence": 0.62
        }"#;

        let report: ImageReport = decode_response(StatusCode::OK, body).unwrap();
        assert_eq!(report.severity, Severity::Medium);
        assert_eq!(report.class.as_deref(), Some("drinking"));
    }

    #[test]
    fn decodes_a_successful_video_response() {
        let body = r#"{
            "total_frames_analyzed": 2,
            "distracted_frames": 1,
            "distraction_percentage": 50.0,
            "detections": [{
                "frame_number": 12,
                "timestamp": 0.4,
                "timestamp_formatted": "00:00",
                "class": "reaching_behind",
                "severity": "High",
                "confidence": 0.8,
                "explanation": "Strong distraction signs present."
            }]
        }"#;

        let report: VideoReport = decode_response(StatusCode::OK, body).unwrap();
        assert_eq!(report.total_frames_analyzed, 2);
        assert!(report.has_high_severity());
    }

    #[test]
    fn maps_service_error_bodies_to_rejections() {
        let err = decode_response::<ImageReport>(
            StatusCode::BAD_REQUEST,
            r#"{"error": "File too large. Maximum size is 5MB."}"#,
        )
        .unwrap_err();
        assert!(
            matches!(&err, VigilError::Rejected(msg) if msg.contains("File too large")),
            "got {err:?}"
        );

        let err = decode_response::<ImageReport>(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error": "Model not loaded. Please add model file."}"#,
        )
        .unwrap_err();
        assert!(matches!(err, VigilError::Rejected(_)));
    }

    #[test]
    fn maps_server_failures_to_api_errors() {
        let err = decode_response::<ImageReport>(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "Internal server error."}"#,
        )
        .unwrap_err();
        assert!(matches!(err, VigilError::Api(_)));

        // Unparseable error bodies still carry the status.
        let err =
            decode_response::<ImageReport>(StatusCode::BAD_GATEWAY, "<html>nginx</html>")
                .unwrap_err();
        assert!(matches!(&err, VigilError::Api(msg) if msg.contains("502")));
    }

    #[test]
    fn malformed_success_bodies_are_decode_errors() {
        let err = decode_response::<ImageReport>(StatusCode::OK, r#"{"severity": 12}"#)
            .unwrap_err();
        assert!(matches!(err, VigilError::Decode(_)));
    }
}
