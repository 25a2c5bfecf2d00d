//! Audio output device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio output device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default output device.
    pub is_default: bool,
    /// Heuristic recommendation for the best alert playback device.
    pub is_recommended: bool,
}

const VIRTUAL_KEYWORDS: &[&str] = &[
    "monitor of",
    "loopback",
    "virtual",
    "null",
    "dummy",
    "cable input",
];

const SPEAKER_POSITIVE_KEYWORDS: &[&str] = &[
    "speaker",
    "speakers",
    "headphone",
    "headphones",
    "headset",
    "built-in",
    "analog",
];

/// Best-effort heuristic for virtual/loopback sinks that a user would not
/// actually hear.
pub fn is_virtual_sink_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    VIRTUAL_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Score a device name for likely audible alert playback.
///
/// Higher is better. Physical speakers and headphones beat HDMI and virtual
/// sinks.
pub fn playback_preference_score(name: &str) -> i32 {
    let lowered = name.trim().to_ascii_lowercase();
    let mut score = 0;
    if !is_virtual_sink_name(&lowered) {
        score += 8;
    } else {
        score -= 16;
    }
    if SPEAKER_POSITIVE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        score += 6;
    }
    if lowered.contains("hdmi") || lowered.contains("displayport") {
        score -= 4;
    }
    if lowered.contains("default") {
        score += 1;
    }
    score
}

/// List all available audio output devices on the system.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    match host.output_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo {
                        name,
                        is_default,
                        is_recommended: false,
                    }
                })
                .collect::<Vec<_>>();

            if let Some((idx, _)) = list.iter().enumerate().max_by_key(|(_, d)| {
                playback_preference_score(&d.name) + if d.is_default { 2 } else { 0 }
            }) {
                if let Some(best) = list.get_mut(idx) {
                    best.is_recommended = true;
                }
            }

            list.sort_by_key(|d| {
                (
                    !d.is_recommended,
                    !d.is_default,
                    d.name.to_ascii_lowercase(),
                )
            });
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {e}");
            if let Some(default) = host.default_output_device() {
                let name = default
                    .name()
                    .unwrap_or_else(|_| "Default Output Device".to_string());
                let is_recommended = !is_virtual_sink_name(&name);
                vec![DeviceInfo {
                    name,
                    is_default: true,
                    is_recommended,
                }]
            } else {
                vec![]
            }
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    vec![]
}
