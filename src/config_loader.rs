use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::path::Path;

use crate::note::DEFAULT_CONCERT_PITCH;
use crate::pitch_analysis::PitchConfig;
use crate::sample_buffer::BUFFER_SIZE;

/// Default config file name, looked up next to the manifest.
pub const CONFIG_FILE: &str = "tuner.yaml";

/// Resolved tuner settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct TunerConfig {
    /// Samples per analysis window.
    pub buffer_size: usize,
    pub sample_rate: f32,
    /// RMS gate and trim cutoff.
    pub threshold: f32,
    /// Frequency of A4.
    pub concert_pitch: f32,
    /// Distance between frame starts when analysing a recording.
    pub hop_size: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
            sample_rate: 44100.0,
            threshold: 0.02,
            concert_pitch: DEFAULT_CONCERT_PITCH,
            hop_size: BUFFER_SIZE,
        }
    }
}

/// Per-host overrides; unset keys keep the `default` section's value.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HostOverrides {
    pub buffer_size: Option<usize>,
    pub sample_rate: Option<f32>,
    pub threshold: Option<f32>,
    pub concert_pitch: Option<f32>,
    pub hop_size: Option<usize>,
    // Live capture only
    pub audio_input_device: Option<u32>,
    pub audio_channel: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub default: TunerConfig,
    #[serde(default)]
    pub hosts: HashMap<String, HostOverrides>,
}

impl TunerConfig {
    pub fn pitch_config(&self) -> PitchConfig {
        PitchConfig {
            sample_rate: self.sample_rate,
            threshold: self.threshold,
        }
    }

    pub fn apply(&mut self, o: &HostOverrides) {
        if let Some(v) = o.buffer_size { self.buffer_size = v; }
        if let Some(v) = o.sample_rate { self.sample_rate = v; }
        if let Some(v) = o.threshold { self.threshold = v; }
        if let Some(v) = o.concert_pitch { self.concert_pitch = v; }
        if let Some(v) = o.hop_size { self.hop_size = v; }
    }

    /// Applies `TUNER_*` variables from the environment (and `.env`).
    pub fn apply_env(&mut self) -> Result<()> {
        let _ = dotenv();
        if let Some(v) = env_var("TUNER_BUFFER_SIZE")? { self.buffer_size = v; }
        if let Some(v) = env_var("TUNER_SAMPLE_RATE")? { self.sample_rate = v; }
        if let Some(v) = env_var("TUNER_THRESHOLD")? { self.threshold = v; }
        if let Some(v) = env_var("TUNER_CONCERT_PITCH")? { self.concert_pitch = v; }
        if let Some(v) = env_var("TUNER_HOP_SIZE")? { self.hop_size = v; }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < 3 {
            return Err(anyhow!("BUFFER_SIZE must be at least 3, got {}", self.buffer_size));
        }
        if self.hop_size == 0 {
            return Err(anyhow!("HOP_SIZE must be positive"));
        }
        if !(self.sample_rate > 0.0) {
            return Err(anyhow!("SAMPLE_RATE must be positive, got {}", self.sample_rate));
        }
        if !(self.threshold >= 0.0) {
            return Err(anyhow!("THRESHOLD must be non-negative, got {}", self.threshold));
        }
        if !(self.concert_pitch >= 1.0 && self.concert_pitch.is_finite()) {
            return Err(anyhow!("CONCERT_PITCH must be at least 1 Hz, got {}", self.concert_pitch));
        }
        Ok(())
    }
}

fn env_var<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {}={:?}: {}", key, raw, e)),
        Err(_) => Ok(None),
    }
}

pub fn parse_config(yaml: &str) -> Result<ConfigFile> {
    let cfg: ConfigFile = serde_yaml::from_str(yaml)?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open config at {:?}", path))?;
    let cfg: ConfigFile = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(cfg)
}

impl ConfigFile {
    /// `default` section merged with the entry for `hostname`, if any.
    pub fn for_host(&self, hostname: &str) -> TunerConfig {
        let mut cfg = self.default.clone();
        if let Some(o) = self.hosts.get(hostname) {
            log::info!(target: "config_loader", "Applying host overrides for '{}'", hostname);
            cfg.apply(o);
        }
        cfg
    }

    pub fn host_overrides(&self, hostname: &str) -> HostOverrides {
        self.hosts.get(hostname).cloned().unwrap_or_default()
    }
}

/// Loads the config for `hostname`: file (if present), then environment,
/// then `overrides` (command-line flags), validating only the final result.
///
/// A missing file is not an error; built-in defaults are used instead.
pub fn tuner_config_for(
    path: &Path,
    hostname: &str,
    overrides: &HostOverrides,
) -> Result<(TunerConfig, HostOverrides)> {
    let file = if path.exists() {
        load_config(path)?
    } else {
        log::info!(target: "config_loader", "No config at {:?}; using defaults", path);
        ConfigFile::default()
    };
    let mut cfg = file.for_host(hostname);
    cfg.apply_env()?;
    cfg.apply(overrides);
    cfg.validate()?;
    log::info!(
        target: "config_loader",
        "TunerConfig: buffer={}, hop={}, rate={}, threshold={}, A4={} (hostname={})",
        cfg.buffer_size, cfg.hop_size, cfg.sample_rate, cfg.threshold, cfg.concert_pitch, hostname
    );
    Ok((cfg, file.host_overrides(hostname)))
}
