//! Render the alarm and beep to a WAV file for inspection without a sound
//! card.
//!
//! ```text
//! alarm-preview [OUTPUT.wav] [DURATION_MS]
//! ```

use std::sync::Arc;

use vigil_core::alarm::mixer::Mixer;
use vigil_core::alarm::synth::samples_for_ms;
use vigil_core::{AlarmPlayer, AlarmTone, BeepTone};

const SAMPLE_RATE: u32 = 44_100;
const RENDER_CHUNK: usize = 1_024;

fn main() {
    if let Err(e) = run() {
        eprintln!("alarm preview failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "alarm-preview.wav".into());
    let duration_ms: u32 = match args.next() {
        Some(raw) => raw.parse()?,
        None => vigil_core::alarm::DEFAULT_ALARM_DURATION_MS,
    };

    let player = AlarmPlayer::new();
    player.initialize_detached(SAMPLE_RATE);
    let mixer = player.mixer().expect("detached player always has a mixer");

    println!("rendering {duration_ms} ms alarm + default beep at {SAMPLE_RATE} Hz");

    player.play_alarm(AlarmTone {
        duration_ms,
        ..AlarmTone::default()
    });
    let mut samples = drain(&mixer);

    // A short gap, then the acknowledgement beep.
    samples.extend(std::iter::repeat(0.0).take(samples_for_ms(150, SAMPLE_RATE) as usize));
    player.play_beep(BeepTone::default());
    samples.extend(drain(&mixer));

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&output, spec)?;
    for sample in &samples {
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    let seconds = samples.len() as f64 / SAMPLE_RATE as f64;
    let warble_periods = duration_ms / 100;
    println!(
        "wrote {} ({} samples, {seconds:.2} s, peak {peak:.3}, {warble_periods} warble periods)",
        output,
        samples.len()
    );

    Ok(())
}

/// Pull rendered frames out of the mixer until every voice has retired.
fn drain(mixer: &Arc<Mixer>) -> Vec<f32> {
    let mut out = Vec::new();
    let mut chunk = [0.0f32; RENDER_CHUNK];
    while mixer.active_voices() > 0 {
        mixer.render(&mut chunk);
        out.extend_from_slice(&chunk);
    }
    out
}
