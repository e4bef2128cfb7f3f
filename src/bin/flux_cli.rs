use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use flux_core::testing::{kick_frame, silence_frame, sine_frame, ScriptedAudioInput};
use flux_core::{FluxEngine, InMemorySettingsStore, VisualizerSettings};

#[derive(Parser, Debug)]
#[command(
    name = "flux_cli",
    about = "Drive the Flux analysis pipeline against synthetic audio"
)]
struct Cli {
    /// Synthetic audio scenario to feed the pipeline
    #[arg(long, value_enum, default_value_t = Scenario::Sine)]
    scenario: Scenario,
    /// Number of frames to render before exiting
    #[arg(long, default_value_t = 120)]
    frames: u32,
    /// Emit frames as JSON lines instead of ASCII bars
    #[arg(long)]
    json: bool,
    /// Tone frequency for the sine scenario, in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f32,
    /// Number of spectrum bars
    #[arg(long, default_value_t = 32)]
    bars: u32,
    /// Target frame rate
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Smoothing amount, 0..1
    #[arg(long, default_value_t = 0.5)]
    smoothing: f32,
    /// Responsiveness, 0..1
    #[arg(long, default_value_t = 0.7)]
    responsiveness: f32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Steady tone: exercises bars, bands and pitch hue
    Sine,
    /// Kick bursts over a quiet pad: exercises beat detection
    Kicks,
    /// Pure silence: exercises the fade-out path
    Silence,
}

const SAMPLE_RATE: u32 = 48_000;
const FRAME_SAMPLES: usize = 2048;

fn build_source(cli: &Cli) -> ScriptedAudioInput {
    match cli.scenario {
        Scenario::Sine => ScriptedAudioInput::repeating(vec![sine_frame(
            cli.frequency,
            SAMPLE_RATE,
            FRAME_SAMPLES,
            0.8,
        )]),
        Scenario::Kicks => {
            let pad = sine_frame(220.0, SAMPLE_RATE, FRAME_SAMPLES, 0.05);
            ScriptedAudioInput::looping(vec![
                kick_frame(SAMPLE_RATE, FRAME_SAMPLES, 0.9),
                pad.clone(),
                pad.clone(),
                pad.clone(),
                pad.clone(),
                pad,
            ])
        }
        Scenario::Silence => {
            ScriptedAudioInput::repeating(vec![silence_frame(SAMPLE_RATE, FRAME_SAMPLES)])
        }
    }
}

fn render_ascii(frame: &flux_core::VisualizerFrame) -> String {
    const RAMP: &[u8] = b" .:-=+*#%@";
    let bars: String = frame
        .bars
        .iter()
        .map(|&v| {
            let idx = ((v * (RAMP.len() - 1) as f32).round() as usize).min(RAMP.len() - 1);
            RAMP[idx] as char
        })
        .collect();
    format!(
        "[{}] bass {:.2} mid {:.2} treble {:.2} fade {:.2}{}",
        bars,
        frame.bass,
        frame.mid,
        frame.treble,
        frame.silence_fade,
        if frame.is_beat {
            format!("  BEAT {:.2}", frame.beat_strength)
        } else {
            String::new()
        }
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = VisualizerSettings {
        bar_count: cli.bars,
        target_fps: cli.fps,
        smoothing: cli.smoothing,
        responsiveness: cli.responsiveness,
        ..Default::default()
    };

    let engine = FluxEngine::new(
        Arc::new(build_source(&cli)),
        Arc::new(InMemorySettingsStore::new(settings.clone())),
    )
    .context("engine construction")?;

    let interval = Duration::from_secs_f64(1.0 / settings.target_fps.max(1) as f64);
    let cancel = CancellationToken::new();

    for _ in 0..cli.frames {
        let frame = engine
            .get_frame(cancel.clone())
            .await
            .context("frame computation")?;
        if cli.json {
            println!("{}", serde_json::to_string(&frame)?);
        } else {
            println!("{}", render_ascii(&frame));
        }
        tokio::time::sleep(interval).await;
    }

    tracing::info!(
        "[flux_cli] done: {} frames, {} pipeline executions",
        cli.frames,
        engine.executions()
    );
    Ok(())
}
