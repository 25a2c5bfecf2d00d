//! Voice table shared between the alarm player and the output callback.
//!
//! The mixer is the testable half of the audio path: the cpal callback (when a
//! device is attached), the offline preview tool, and the unit tests all drive
//! the same `render` method. Voices retire themselves at their end sample or
//! when their handle is halted, whichever comes first.

use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};

use parking_lot::Mutex;

use super::synth::{samples_for_ms, GainEnvelope, ToneGenerator, WarbleSchedule};

/// Handle to a running tone generator.
///
/// Halting is idempotent: halting an already-halted generator is silently
/// tolerated, and a handle whose voice has already retired is a no-op.
#[derive(Debug, Clone)]
pub struct ToneHandle {
    halted: Arc<AtomicBool>,
}

impl ToneHandle {
    fn new() -> Self {
        Self {
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Halt the voice. Safe to call any number of times.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// Parameters for one voice.
#[derive(Debug, Clone, Copy)]
pub struct VoiceSpec {
    /// Base frequency (the constant tone, or the warble's resting value).
    pub frequency_hz: f32,
    /// When set, the voice pulses between `(high, low)` on the fixed
    /// 100 ms / 50 ms schedule instead of holding `frequency_hz`.
    pub warble: Option<(f32, f32)>,
    /// Envelope start gain (linear, 0..1).
    pub start_gain: f32,
    /// Envelope end gain (linear, 0..1).
    pub end_gain: f32,
    /// Voice length in milliseconds.
    pub duration_ms: u32,
}

struct Voice {
    osc: ToneGenerator,
    envelope: GainEnvelope,
    warble: Option<WarbleSchedule>,
    frequency_hz: f32,
    pos: u64,
    end: u64,
    halted: Arc<AtomicBool>,
}

impl Voice {
    fn new(spec: &VoiceSpec, sample_rate: u32, handle: &ToneHandle) -> Self {
        let end = samples_for_ms(spec.duration_ms, sample_rate).max(1);
        Self {
            osc: ToneGenerator::new(sample_rate),
            envelope: GainEnvelope::new(spec.start_gain, spec.end_gain, end),
            warble: spec
                .warble
                .map(|(high, low)| WarbleSchedule::new(high, low, sample_rate)),
            frequency_hz: spec.frequency_hz,
            pos: 0,
            end,
            halted: Arc::clone(&handle.halted),
        }
    }

    #[inline]
    fn finished(&self) -> bool {
        self.pos >= self.end || self.halted.load(Ordering::Acquire)
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        let freq = match self.warble {
            Some(w) => w.frequency_at(self.pos),
            None => self.frequency_hz,
        };
        let sample = self.osc.next_sample(freq) * self.envelope.value_at(self.pos);
        self.pos += 1;
        sample
    }
}

/// Mixing table of currently-sounding voices.
pub struct Mixer {
    voices: Mutex<Vec<Voice>>,
    sample_rate: AtomicU32,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            voices: Mutex::new(Vec::new()),
            sample_rate: AtomicU32::new(sample_rate),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    /// Adopt the rate reported by the output device. Called once, before the
    /// stream starts pulling samples.
    pub(crate) fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate, Ordering::Release);
    }

    /// Add a voice and return its handle. The voice starts sounding on the
    /// next rendered buffer.
    pub fn spawn_voice(&self, spec: &VoiceSpec) -> ToneHandle {
        let handle = ToneHandle::new();
        let voice = Voice::new(spec, self.sample_rate(), &handle);
        self.voices.lock().push(voice);
        handle
    }

    /// Number of voices that have not yet retired.
    pub fn active_voices(&self) -> usize {
        let mut voices = self.voices.lock();
        voices.retain(|v| !v.finished());
        voices.len()
    }

    /// Render mono frames into `out`, retiring voices that end inside the
    /// buffer. Silence is written where no voice is sounding.
    pub fn render(&self, out: &mut [f32]) {
        let mut voices = self.voices.lock();

        for slot in out.iter_mut() {
            let mut mixed = 0.0f32;
            for voice in voices.iter_mut() {
                if !voice.finished() {
                    mixed += voice.next_sample();
                }
            }
            *slot = mixed.clamp(-1.0, 1.0);
        }

        voices.retain(|v| !v.finished());
    }

    /// Render interleaved frames for a device with `channels` channels: the
    /// mono mix is duplicated into every channel of each frame.
    pub fn render_interleaved(&self, out: &mut [f32], channels: usize) {
        if channels <= 1 {
            self.render(out);
            return;
        }

        let frames = out.len() / channels;
        let mut voices = self.voices.lock();

        for f in 0..frames {
            let mut mixed = 0.0f32;
            for voice in voices.iter_mut() {
                if !voice.finished() {
                    mixed += voice.next_sample();
                }
            }
            let mixed = mixed.clamp(-1.0, 1.0);
            let base = f * channels;
            for c in 0..channels {
                out[base + c] = mixed;
            }
        }

        voices.retain(|v| !v.finished());
    }
}
