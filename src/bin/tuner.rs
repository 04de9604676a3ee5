//! Command-line tuner: analyse a WAV file or listen on an input device.

use anyhow::{anyhow, Result};
use celeste_tuner::config_loader::{self, HostOverrides, TunerConfig};
use celeste_tuner::frame_analysis::{analyze_frames, FrameReport};
use clap::{Parser, Subcommand};
use gethostname::gethostname;
use std::path::PathBuf;

/// Autocorrelation pitch detector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to tuner.yaml next to the manifest)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override for the RMS gate / trim threshold
    #[arg(long)]
    threshold: Option<f32>,
    /// Override for the sample rate (live capture only; files use their own)
    #[arg(long)]
    sample_rate: Option<f32>,
    /// Override for the frequency of A4
    #[arg(long)]
    concert_pitch: Option<f32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the pitch of every frame of a WAV file
    File {
        path: PathBuf,
        /// Samples between frame starts
        #[arg(long)]
        hop: Option<usize>,
        /// Print one JSON object per frame
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Listen on an input device until Ctrl-C (needs the `live` feature)
    Live {
        /// Input device index (defaults to the host config, then the system default)
        #[arg(long)]
        device: Option<u32>,
        /// Input channel to analyse
        #[arg(long)]
        channel: Option<usize>,
    },
}

fn format_report(report: &FrameReport) -> String {
    let pitch = match (report.pitch_hz, &report.note) {
        (Some(hz), Some(note)) => format!("{:9.2} Hz  {}", hz, note),
        (Some(hz), None) => format!("{:9.2} Hz", hz),
        _ => "       --".to_string(),
    };
    format!("{:8.3}s  rms {:.4}  {}", report.start_seconds, report.rms, pitch)
}

fn run_file(mut cfg: TunerConfig, path: PathBuf, hop: Option<usize>, json: bool) -> Result<()> {
    let (samples, rate) = celeste_tuner::wav_input::read_wav_mono(&path)?;
    cfg.sample_rate = rate as f32;
    if let Some(h) = hop {
        cfg.hop_size = h;
    }
    cfg.validate()?;

    let reports = analyze_frames(&samples, &cfg);
    let detected = reports.iter().filter(|r| r.pitch_hz.is_some()).count();
    log::info!("{:?}: {} frames, {} with pitch", path, reports.len(), detected);

    for report in &reports {
        if json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            println!("{}", format_report(report));
        }
    }
    Ok(())
}

#[cfg(feature = "live")]
fn run_live(cfg: TunerConfig, host: HostOverrides, device: Option<u32>, channel: Option<usize>) -> Result<()> {
    use celeste_tuner::capture::capture_queue;
    use celeste_tuner::note::Note;
    use celeste_tuner::{PitchEstimator, SampleBuffer};
    use portaudio as pa;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    let pa = pa::PortAudio::new()?;

    let device_index = match device.or(host.audio_input_device) {
        Some(i) => pa::DeviceIndex(i),
        None => pa.default_input_device()?,
    };
    let device_info = pa.device_info(device_index)
        .map_err(|e| anyhow!("Invalid input device {}: {}", device_index.0, e))?;

    let num_channels = device_info.max_input_channels.max(1) as usize;
    let channel = channel.or(host.audio_channel).unwrap_or(0);
    if channel >= num_channels {
        return Err(anyhow!(
            "Channel {} out of range for device '{}' ({} input channels)",
            channel, device_info.name, num_channels
        ));
    }

    println!(
        "Using device={} ({}) rate={} channel={} window={}",
        device_index.0, device_info.name, cfg.sample_rate as u32, channel, cfg.buffer_size
    );

    let params = pa::StreamParameters::<f32>::new(
        device_index,
        num_channels as i32,
        true,
        device_info.default_low_input_latency,
    );
    let settings = pa::InputStreamSettings::new(params, cfg.sample_rate as f64, cfg.buffer_size as u32);

    let (mut writer, mut reader) = capture_queue(cfg.buffer_size, 8);
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || { r.store(false, Ordering::SeqCst); }).ok();
    }

    let callback = move |pa::stream::InputCallbackArgs { buffer, .. }| {
        writer.push_channel(buffer, num_channels, channel);
        pa::Continue
    };

    let mut stream = pa.open_non_blocking_stream(settings, callback)?;
    stream.start()?;

    let estimator = PitchEstimator::new(cfg.buffer_size, cfg.pitch_config());
    let mut window = SampleBuffer::new(cfg.buffer_size);
    while running.load(Ordering::SeqCst) && stream.is_active()? {
        while reader.next_window(&mut window) {
            let line = match estimator.estimate(window.as_slice()).frequency() {
                Some(hz) => match Note::from_frequency(hz, cfg.concert_pitch) {
                    Some(note) => format!("{:8.2} Hz  {:<10}", hz, note.to_string()),
                    None => format!("{:8.2} Hz", hz),
                },
                None => "      --             ".to_string(),
            };
            print!("\rPitch: {} ", line);
            let _ = io::stdout().flush();
        }
        thread::sleep(Duration::from_millis(10));
    }
    let _ = stream.stop();
    if reader.dropped() > 0 {
        log::warn!("Dropped {} samples; analysis fell behind capture", reader.dropped());
    }
    println!("\nStream stopped.");
    Ok(())
}

#[cfg(not(feature = "live"))]
fn run_live(_cfg: TunerConfig, _host: HostOverrides, _device: Option<u32>, _channel: Option<usize>) -> Result<()> {
    Err(anyhow!("Live capture needs the `live` feature (cargo build --features live)"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let hostname = gethostname().to_string_lossy().to_string();
    let path = args.config.clone().unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(config_loader::CONFIG_FILE)
    });
    let flags = HostOverrides {
        threshold: args.threshold,
        sample_rate: args.sample_rate,
        concert_pitch: args.concert_pitch,
        ..Default::default()
    };
    let (cfg, host) = config_loader::tuner_config_for(&path, &hostname, &flags)?;

    match args.command {
        Command::File { path, hop, json } => run_file(cfg, path, hop, json),
        Command::Live { device, channel } => run_live(cfg, host, device, channel),
    }
}
