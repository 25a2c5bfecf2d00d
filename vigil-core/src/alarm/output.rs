//! Audio output via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal output callback runs on an OS audio thread at elevated priority.
//! It only pulls mixed frames out of the shared [`Mixer`]; the mixer's voice
//! table is guarded by a `parking_lot::Mutex` that is held for the duration of
//! one buffer and never across I/O.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). The stream is therefore created, parked, and dropped on one
//! dedicated OS thread owned by [`AudioOutput`]; a sync channel propagates the
//! open result (actual device sample rate, or the error) back to the caller.

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, StreamConfig,
};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use crate::error::Result;
#[cfg(feature = "audio-cpal")]
use crate::error::VigilError;

use super::mixer::Mixer;

/// How often the park loop checks the shutdown flag.
#[cfg(feature = "audio-cpal")]
const PARK_POLL: std::time::Duration = std::time::Duration::from_millis(50);

/// Handle to an open audio output stream.
///
/// The stream itself lives on the `alarm-output` thread; dropping this handle
/// signals that thread to drop the stream and joins it.
pub struct AudioOutput {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    /// Actual output sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

impl AudioOutput {
    /// Open the system default output device and wire the mixer into its
    /// callback.
    ///
    /// Blocks until the device is confirmed open (or fails). On success the
    /// mixer has adopted the device sample rate.
    ///
    /// # Errors
    /// Returns `VigilError::NoDefaultOutputDevice` when the platform has no
    /// output device, or `VigilError::AudioStream` if cpal fails to build the
    /// stream.
    pub fn open(mixer: Arc<Mixer>) -> Result<Self> {
        Self::open_with_preference(mixer, None)
    }

    /// Open an output device by preferred name, otherwise fall back to the
    /// default output device and then the first available device.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        mixer: Arc<Mixer>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);
        let preferred = preferred_device_name.map(ToOwned::to_owned);

        // Sync oneshot: the output thread signals open success/failure.
        // Carries the actual device sample rate on success.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        let thread = std::thread::Builder::new()
            .name("alarm-output".into())
            .spawn(move || {
                // ── Open device (must happen on THIS thread — cpal::Stream is !Send) ──
                let stream = match build_output_stream(&mixer, preferred.as_deref()) {
                    Ok((stream, rate)) => {
                        let _ = open_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };

                while !shutdown_for_thread.load(Ordering::Acquire) {
                    std::thread::sleep(PARK_POLL);
                }

                // Stream drops here, releasing the audio device on this thread.
                drop(stream);
            })
            .map_err(|e| VigilError::AudioStream(format!("failed to spawn output thread: {e}")))?;

        match open_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Self {
                shutdown,
                thread: Some(thread),
                sample_rate,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                // Channel closed before a message was sent — thread panicked?
                Err(VigilError::AudioStream(
                    "output thread died during device open".into(),
                ))
            }
        }
    }

    /// Stub when the `audio-cpal` feature is disabled.
    #[cfg(not(feature = "audio-cpal"))]
    pub fn open_with_preference(
        _mixer: Arc<Mixer>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(crate::error::VigilError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Build and start the output stream, returning it with the device rate.
#[cfg(feature = "audio-cpal")]
fn build_output_stream(
    mixer: &Arc<Mixer>,
    preferred_device_name: Option<&str>,
) -> Result<(cpal::Stream, u32)> {
    use cpal::traits::HostTrait;
    use tracing::{error, info, warn};

    let host = cpal::default_host();
    let mut selected_device = None;

    if let Some(preferred_name) = preferred_device_name {
        match host.output_devices() {
            Ok(mut devices) => {
                selected_device = devices.find(|device| {
                    device
                        .name()
                        .map(|name| name == preferred_name)
                        .unwrap_or(false)
                });

                if selected_device.is_none() {
                    warn!(
                        "preferred output device '{}' not found, falling back",
                        preferred_name
                    );
                }
            }
            Err(e) => {
                warn!("failed to list output devices while resolving preference: {e}");
            }
        }
    }

    let device = if let Some(device) = selected_device {
        device
    } else if let Some(default) = host.default_output_device() {
        default
    } else {
        let mut devices = host
            .output_devices()
            .map_err(|e| VigilError::AudioDevice(e.to_string()))?;
        let fallback = devices.next().ok_or(VigilError::NoDefaultOutputDevice)?;
        warn!("no default output device, falling back to first available output");
        fallback
    };

    info!(
        device = device.name().unwrap_or_default().as_str(),
        "opening output device"
    );

    let supported = device
        .default_output_config()
        .map_err(|e| VigilError::AudioDevice(e.to_string()))?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();

    info!(sample_rate, channels, "audio config selected");

    // Voices created from now on schedule in samples at the device rate.
    mixer.set_sample_rate(sample_rate);

    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let ch = channels as usize;
    let mixer_f32 = Arc::clone(mixer);
    let mixer_i16 = Arc::clone(mixer);
    let mixer_u8 = Arc::clone(mixer);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _info| {
                mixer_f32.render_interleaved(data, ch);
            },
            |err| error!("audio stream error: {err}"),
            None,
        ),

        SampleFormat::I16 => {
            let mut mix_buf: Vec<f32> = Vec::new();
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _info| {
                    mix_buf.resize(data.len(), 0.0);
                    mixer_i16.render_interleaved(&mut mix_buf, ch);
                    for (dst, src) in data.iter_mut().zip(mix_buf.iter()) {
                        *dst = (src * 32767.0) as i16;
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
        }

        SampleFormat::U8 => {
            let mut mix_buf: Vec<f32> = Vec::new();
            device.build_output_stream(
                &config,
                move |data: &mut [u8], _info| {
                    mix_buf.resize(data.len(), 0.0);
                    mixer_u8.render_interleaved(&mut mix_buf, ch);
                    for (dst, src) in data.iter_mut().zip(mix_buf.iter()) {
                        *dst = ((src * 127.0) + 128.0) as u8;
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
        }

        fmt => {
            return Err(VigilError::AudioStream(format!(
                "unsupported sample format: {fmt:?}"
            )))
        }
    }
    .map_err(|e| VigilError::AudioStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| VigilError::AudioStream(e.to_string()))?;

    Ok((stream, sample_rate))
}
