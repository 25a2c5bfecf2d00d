//! End-to-end timing properties of the alarm player, driven through the
//! public API with a detached (device-less) mixer.

use std::time::{Duration, Instant};

use vigil_core::alarm::synth::samples_for_ms;
use vigil_core::{AlarmPlayer, AlarmStatus, AlarmTone, BeepTone};

const RATE: u32 = 44_100;

fn detached_player() -> AlarmPlayer {
    let player = AlarmPlayer::new();
    player.initialize_detached(RATE);
    player
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq = samples.iter().map(|s| s * s).sum::<f32>();
    (sum_sq / samples.len() as f32).sqrt()
}

#[test]
fn playing_flag_clears_no_later_than_the_duration() {
    let player = detached_player();

    let start = Instant::now();
    player.play_alarm(AlarmTone {
        duration_ms: 100,
        ..AlarmTone::default()
    });
    assert!(player.is_playing(), "flag must be set immediately");

    // Poll until the flag clears, with a generous ceiling.
    while player.is_playing() {
        assert!(
            start.elapsed() < Duration::from_millis(1_000),
            "alarm never timed out"
        );
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(player.status(), AlarmStatus::Idle);
}

#[test]
fn audible_output_occupies_exactly_the_requested_window() {
    let player = detached_player();
    let mixer = player.mixer().unwrap();

    player.play_alarm(AlarmTone {
        duration_ms: 100,
        ..AlarmTone::default()
    });

    // 100 ms at 44.1 kHz = 4410 samples; render well past the end.
    let end = samples_for_ms(100, RATE) as usize;
    let mut buf = vec![0.0f32; end * 2];
    mixer.render(&mut buf);

    assert!(
        rms(&buf[..end]) > 0.01,
        "alarm must be audible within its window"
    );
    assert!(
        buf[end..].iter().all(|s| *s == 0.0),
        "alarm must be silent after its window"
    );
}

#[test]
fn explicit_stop_cuts_audio_at_call_time_not_at_duration() {
    let player = detached_player();
    let mixer = player.mixer().unwrap();

    player.play_alarm(AlarmTone::default()); // 3000 ms
    player.stop_alarm();

    let mut buf = vec![0.0f32; 4_096];
    mixer.render(&mut buf);
    assert!(buf.iter().all(|s| *s == 0.0));
    assert!(!player.is_playing());
}

#[test]
fn rapid_retrigger_leaves_exactly_one_alarm_audible() {
    let player = detached_player();
    let mixer = player.mixer().unwrap();

    player.play_alarm(AlarmTone::default());
    player.play_alarm(AlarmTone::default());

    assert_eq!(mixer.active_voices(), 2);

    // The surviving pair renders a coherent (clipped-free) two-voice mix:
    // with a 0.3 starting envelope per voice, four leaked voices would push
    // peaks past 0.6 near the start.
    let mut buf = vec![0.0f32; 2_048];
    mixer.render(&mut buf);
    let peak = buf.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    assert!(peak <= 0.6 + 1e-3, "leaked voices detected: peak {peak}");

    player.stop_alarm();
}

#[test]
fn warble_alternates_between_the_two_frequencies() {
    let player = detached_player();
    let mixer = player.mixer().unwrap();

    // One warbling voice only: suppress the steady tone by stopping the
    // default alarm and spawning via the public alarm with equal frequencies
    // would defeat the test, so assert on the mixed signal instead: the
    // spectrum of the first 50 ms window differs from the second.
    player.play_alarm(AlarmTone {
        duration_ms: 200,
        high_hz: 800.0,
        low_hz: 600.0,
    });

    let half = samples_for_ms(50, RATE) as usize;
    let mut buf = vec![0.0f32; half * 2];
    mixer.render(&mut buf);

    // Goertzel-style correlation against each candidate frequency.
    let energy_at = |window: &[f32], hz: f32| -> f32 {
        let mut re = 0.0f32;
        let mut im = 0.0f32;
        for (n, s) in window.iter().enumerate() {
            let phase = std::f32::consts::TAU * hz * n as f32 / RATE as f32;
            re += s * phase.cos();
            im += s * phase.sin();
        }
        (re * re + im * im).sqrt() / window.len() as f32
    };

    let first_half = &buf[..half];
    let second_half = &buf[half..];

    // 800 Hz is present only while the warble sits high (first 50 ms).
    let high_early = energy_at(first_half, 800.0);
    let high_late = energy_at(second_half, 800.0);
    assert!(
        high_early > high_late * 4.0,
        "800 Hz should dominate the first half-period: early={high_early}, late={high_late}"
    );

    // 600 Hz (the steady second tone) is present throughout.
    let low_early = energy_at(first_half, 600.0);
    let low_late = energy_at(second_half, 600.0);
    assert!(low_early > 0.0 && low_late > 0.0);

    player.stop_alarm();
}

#[test]
fn beep_is_independent_of_the_alarm_lifecycle() {
    let player = detached_player();
    let mixer = player.mixer().unwrap();

    player.play_beep(BeepTone::default());
    assert!(!player.is_playing());

    // 200 ms at 44.1 kHz = 8820 samples.
    let end = samples_for_ms(200, RATE) as usize;
    let mut buf = vec![0.0f32; end + 1_024];
    mixer.render(&mut buf);

    assert!(rms(&buf[..end]) > 0.005, "beep must be audible");
    assert!(buf[end..].iter().all(|s| *s == 0.0));
    assert_eq!(player.status(), AlarmStatus::Idle);
}

#[test]
fn beep_without_initialize_creates_no_generator_and_does_not_panic() {
    let player = AlarmPlayer::new();
    player.play_beep(BeepTone::default());
    assert_eq!(player.status(), AlarmStatus::Uninitialized);
    assert!(player.mixer().is_none());
}
