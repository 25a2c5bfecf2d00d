//! Alarm synthesis and playback.
//!
//! ## Lifecycle
//!
//! ```text
//! AlarmPlayer::new()                 → Uninitialized
//!     └─► initialize()               → output context opened, Idle
//!         └─► play_alarm(..)         → two voices spawned, Playing
//!             ├─► stop_alarm()       → voices halted now, Idle
//!             └─► (timeout)          → voices halted at duration_ms, Idle
//! ```
//!
//! The output context is created at most once and reused for the life of the
//! process. `initialize()` is expected to be called from a user-interaction
//! handler; when the platform has no audio capability the failure is logged
//! and the player simply stays `Uninitialized` — playback calls then warn and
//! do nothing rather than erroring.
//!
//! ## Deferred stop
//!
//! Each `play_alarm` schedules a one-shot timeout thread for `duration_ms`.
//! An earlier `stop_alarm` does **not** cancel that timer: stopping halts the
//! generators immediately, and the timer's later halt call is a harmless
//! no-op against already-halted generators. A timer belonging to a superseded
//! alarm is recognized by its epoch and leaves the bookkeeping of the alarm
//! that replaced it untouched.

pub mod device;
pub mod mixer;
pub mod output;
pub mod synth;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::ipc::events::AlarmStatus;

use self::mixer::{Mixer, ToneHandle, VoiceSpec};
use self::output::AudioOutput;

/// Default alarm length.
pub const DEFAULT_ALARM_DURATION_MS: u32 = 3_000;
/// Default upper warble frequency.
pub const DEFAULT_ALARM_HIGH_HZ: f32 = 800.0;
/// Default lower warble frequency (also the steady second tone).
pub const DEFAULT_ALARM_LOW_HZ: f32 = 600.0;
/// Default acknowledgement beep frequency.
pub const DEFAULT_BEEP_HZ: f32 = 1_000.0;
/// Default acknowledgement beep length.
pub const DEFAULT_BEEP_DURATION_MS: u32 = 200;

/// Sample rate used before an output device has reported its own, and by
/// detached (device-less) players.
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

const ALARM_START_GAIN: f32 = 0.3;
const ALARM_END_GAIN: f32 = 0.01;
const BEEP_START_GAIN: f32 = 0.2;
const BEEP_END_GAIN: f32 = 0.01;

/// Parameters for one alarm burst.
#[derive(Debug, Clone, Copy)]
pub struct AlarmTone {
    pub duration_ms: u32,
    pub high_hz: f32,
    pub low_hz: f32,
}

impl Default for AlarmTone {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_ALARM_DURATION_MS,
            high_hz: DEFAULT_ALARM_HIGH_HZ,
            low_hz: DEFAULT_ALARM_LOW_HZ,
        }
    }
}

/// Parameters for one acknowledgement beep.
#[derive(Debug, Clone, Copy)]
pub struct BeepTone {
    pub frequency_hz: f32,
    pub duration_ms: u32,
}

impl Default for BeepTone {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_BEEP_HZ,
            duration_ms: DEFAULT_BEEP_DURATION_MS,
        }
    }
}

struct PlayerInner {
    /// Kept alive so the output stream thread is not torn down prematurely.
    /// `None` for detached players (offline preview, tests).
    _output: Option<AudioOutput>,
    /// Present once initialized (with or without a device).
    mixer: Option<Arc<Mixer>>,
    /// Handles for the currently-sounding alarm voices (0 or exactly 2).
    active_tones: Vec<ToneHandle>,
    /// True from alarm start until stop (explicit or timeout-driven).
    playing: bool,
    /// Bumped on every `play_alarm`; stale timeouts compare against it.
    epoch: u64,
}

/// Two-tone pulsing alarm with a lazily-created audio output context.
///
/// `AlarmPlayer` is `Send + Sync` — all state sits behind one lock. Wrap it
/// in `Arc` and share it between the engine and the UI shell; construct once
/// at startup and drop at shutdown. (A pending timeout keeps the inner state,
/// output stream included, alive until it fires; at most `duration_ms` past
/// the drop.)
pub struct AlarmPlayer {
    inner: Arc<Mutex<PlayerInner>>,
}

impl AlarmPlayer {
    /// Create an uninitialized player. No audio resources are touched until
    /// [`initialize`](Self::initialize).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlayerInner {
                _output: None,
                mixer: None,
                active_tones: Vec::new(),
                playing: false,
                epoch: 0,
            })),
        }
    }

    /// Create the audio output context if it does not exist yet.
    ///
    /// Idempotent. Must be called from a user-interaction event handler per
    /// platform audio policy. When no output device is available the failure
    /// is logged and the player stays uninitialized — not an error.
    pub fn initialize(&self) {
        self.initialize_with_device(None);
    }

    /// Like [`initialize`](Self::initialize) with a preferred output device
    /// name.
    pub fn initialize_with_device(&self, preferred_device_name: Option<&str>) {
        let mut inner = self.inner.lock();
        if inner.mixer.is_some() {
            debug!("alarm player already initialized");
            return;
        }

        let mixer = Arc::new(Mixer::new(FALLBACK_SAMPLE_RATE));
        match AudioOutput::open_with_preference(Arc::clone(&mixer), preferred_device_name) {
            Ok(output) => {
                info!(sample_rate = output.sample_rate, "alarm output ready");
                inner._output = Some(output);
                inner.mixer = Some(mixer);
            }
            Err(e) => {
                // Treated as a no-op, not an error: the platform simply has
                // no audio capability.
                warn!(error = %e, "audio output unavailable — alarm playback disabled");
            }
        }
    }

    /// Initialize without opening a device: voices render through the mixer
    /// only. Used by the offline preview tool and by tests.
    pub fn initialize_detached(&self, sample_rate: u32) {
        let mut inner = self.inner.lock();
        if inner.mixer.is_some() {
            debug!("alarm player already initialized");
            return;
        }
        inner.mixer = Some(Arc::new(Mixer::new(sample_rate)));
    }

    /// The mixer, once initialized. Detached callers pull rendered frames
    /// from it directly.
    pub fn mixer(&self) -> Option<Arc<Mixer>> {
        self.inner.lock().mixer.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().mixer.is_some()
    }

    /// True from the moment an alarm starts until it is stopped.
    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    /// Snapshot of the player state machine.
    pub fn status(&self) -> AlarmStatus {
        let inner = self.inner.lock();
        if inner.mixer.is_none() {
            AlarmStatus::Uninitialized
        } else if inner.playing {
            AlarmStatus::Playing
        } else {
            AlarmStatus::Idle
        }
    }

    /// Play the two-tone pulsing alarm.
    ///
    /// If an alarm is already playing it is fully stopped first — at most one
    /// alarm is audible at any instant. The first generator warbles between
    /// `high_hz` and `low_hz` on the 100 ms / 50 ms schedule; the second holds
    /// `low_hz`. Both share the 0.3 → 0.01 exponential envelope and halt
    /// automatically after `duration_ms`.
    ///
    /// Warns and does nothing when the player is uninitialized.
    pub fn play_alarm(&self, tone: AlarmTone) {
        let (first, second, epoch) = {
            let mut inner = self.inner.lock();
            let Some(mixer) = inner.mixer.clone() else {
                warn!("audio output not initialized — ignoring play_alarm");
                return;
            };

            if inner.playing {
                halt_active(&mut inner);
            }

            inner.epoch += 1;
            let epoch = inner.epoch;

            let first = mixer.spawn_voice(&VoiceSpec {
                frequency_hz: tone.high_hz,
                warble: Some((tone.high_hz, tone.low_hz)),
                start_gain: ALARM_START_GAIN,
                end_gain: ALARM_END_GAIN,
                duration_ms: tone.duration_ms,
            });
            let second = mixer.spawn_voice(&VoiceSpec {
                frequency_hz: tone.low_hz,
                warble: None,
                start_gain: ALARM_START_GAIN,
                end_gain: ALARM_END_GAIN,
                duration_ms: tone.duration_ms,
            });

            inner.active_tones = vec![first.clone(), second.clone()];
            inner.playing = true;
            debug!(
                duration_ms = tone.duration_ms,
                high_hz = tone.high_hz,
                low_hz = tone.low_hz,
                "alarm started"
            );
            (first, second, epoch)
        };

        self.schedule_auto_stop(tone.duration_ms, [first, second], epoch);
    }

    /// Stop the alarm immediately.
    ///
    /// Halts every active tone (halting an already-halted generator is
    /// silently tolerated), clears the active set, and resets the playing
    /// flag. No-op when nothing is playing.
    pub fn stop_alarm(&self) {
        let mut inner = self.inner.lock();
        if !inner.playing {
            return;
        }
        halt_active(&mut inner);
        debug!("alarm stopped");
    }

    /// Play a short single beep.
    ///
    /// One generator at `frequency_hz` with a 0.2 → 0.01 envelope over
    /// `duration_ms`; the voice retires itself. Fire-and-forget: independent
    /// of the alarm's active-tone bookkeeping and playing flag.
    ///
    /// Warns and does nothing when the player is uninitialized.
    pub fn play_beep(&self, beep: BeepTone) {
        let inner = self.inner.lock();
        let Some(mixer) = inner.mixer.as_ref() else {
            warn!("audio output not initialized — ignoring play_beep");
            return;
        };

        mixer.spawn_voice(&VoiceSpec {
            frequency_hz: beep.frequency_hz,
            warble: None,
            start_gain: BEEP_START_GAIN,
            end_gain: BEEP_END_GAIN,
            duration_ms: beep.duration_ms,
        });
        debug!(
            frequency_hz = beep.frequency_hz,
            duration_ms = beep.duration_ms,
            "beep"
        );
    }

    /// One-shot timeout that halts the alarm voices after `duration_ms`.
    ///
    /// Never cancelled: when the alarm was already stopped (or replaced) the
    /// halt calls are no-ops, and the epoch check keeps a stale timer from
    /// clearing a newer alarm's bookkeeping.
    fn schedule_auto_stop(&self, duration_ms: u32, handles: [ToneHandle; 2], epoch: u64) {
        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("alarm-timeout".into())
            .spawn(move || {
                std::thread::sleep(Duration::from_millis(duration_ms as u64));
                for handle in &handles {
                    handle.halt();
                }
                let mut inner = inner.lock();
                if inner.epoch == epoch {
                    inner.active_tones.clear();
                    inner.playing = false;
                }
            });
        if let Err(e) = spawned {
            warn!("failed to spawn alarm timeout thread: {e}");
        }
    }
}

impl Default for AlarmPlayer {
    fn default() -> Self {
        Self::new()
    }
}

fn halt_active(inner: &mut PlayerInner) {
    for tone in &inner.active_tones {
        tone.halt();
    }
    inner.active_tones.clear();
    inner.playing = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 10_000;

    fn detached_player() -> AlarmPlayer {
        let player = AlarmPlayer::new();
        player.initialize_detached(RATE);
        player
    }

    fn short_alarm(duration_ms: u32) -> AlarmTone {
        AlarmTone {
            duration_ms,
            ..AlarmTone::default()
        }
    }

    #[test]
    fn playback_before_initialize_is_a_logged_noop() {
        let player = AlarmPlayer::new();
        assert_eq!(player.status(), AlarmStatus::Uninitialized);

        player.play_alarm(short_alarm(100));
        player.play_beep(BeepTone::default());
        player.stop_alarm();

        assert_eq!(player.status(), AlarmStatus::Uninitialized);
        assert!(!player.is_playing());
        assert!(player.mixer().is_none());
    }

    #[test]
    fn initialize_detached_is_idempotent() {
        let player = detached_player();
        let first = player.mixer().unwrap();
        player.initialize_detached(RATE);
        let second = player.mixer().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn alarm_sets_playing_immediately_and_times_out() {
        let player = detached_player();

        player.play_alarm(short_alarm(100));
        assert!(player.is_playing());
        assert_eq!(player.status(), AlarmStatus::Playing);
        assert_eq!(player.mixer().unwrap().active_voices(), 2);

        std::thread::sleep(Duration::from_millis(200));
        assert!(!player.is_playing());
        assert_eq!(player.status(), AlarmStatus::Idle);
        assert_eq!(player.mixer().unwrap().active_voices(), 0);
    }

    #[test]
    fn stop_alarm_silences_at_call_time_not_at_duration() {
        let player = detached_player();
        let mixer = player.mixer().unwrap();

        player.play_alarm(short_alarm(3_000));
        assert!(player.is_playing());

        player.stop_alarm();
        assert!(!player.is_playing());
        assert_eq!(player.status(), AlarmStatus::Idle);
        assert_eq!(mixer.active_voices(), 0);

        let mut buf = vec![1.0f32; 256];
        mixer.render(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.0), "halted alarm must be silent");
    }

    #[test]
    fn stop_while_idle_is_a_noop() {
        let player = detached_player();
        player.stop_alarm();
        player.stop_alarm();
        assert_eq!(player.status(), AlarmStatus::Idle);
    }

    #[test]
    fn retrigger_fully_replaces_the_previous_alarm() {
        let player = detached_player();
        let mixer = player.mixer().unwrap();

        player.play_alarm(short_alarm(3_000));
        player.play_alarm(short_alarm(3_000));

        // Exactly one pair of generators audible; nothing leaked.
        assert_eq!(mixer.active_voices(), 2);
        assert!(player.is_playing());

        player.stop_alarm();
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn stale_timeout_does_not_clear_a_newer_alarm() {
        let player = detached_player();

        player.play_alarm(short_alarm(50));
        player.play_alarm(short_alarm(400));

        // The first alarm's timeout has fired by now; its halt calls are
        // no-ops and the epoch check leaves the second alarm playing.
        std::thread::sleep(Duration::from_millis(150));
        assert!(player.is_playing());
        assert_eq!(player.mixer().unwrap().active_voices(), 2);

        std::thread::sleep(Duration::from_millis(400));
        assert!(!player.is_playing());
    }

    #[test]
    fn beep_never_touches_the_alarm_flag() {
        let player = detached_player();
        let mixer = player.mixer().unwrap();

        player.play_beep(BeepTone::default());
        assert!(!player.is_playing());
        assert_eq!(player.status(), AlarmStatus::Idle);
        assert_eq!(mixer.active_voices(), 1);

        player.play_alarm(short_alarm(3_000));
        player.play_beep(BeepTone::default());
        assert!(player.is_playing());
        assert_eq!(mixer.active_voices(), 3);

        // Stopping the alarm leaves the fire-and-forget beep alone.
        player.stop_alarm();
        assert!(!player.is_playing());
        assert_eq!(mixer.active_voices(), 1);
    }
}
