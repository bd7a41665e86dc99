pub mod collect;
pub mod config;
pub mod ports;
pub mod tools;

use std::path::Path;

use clap::Args;
use rngtoolbox_core::{OutputDestination, SessionConfig, SettingsStore};

/// Settings that can be given on the command line for `config set` and
/// `collect`.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Source: "OS Entropy Pool", "Remote Endpoint", or a serial port path
    #[arg(long)]
    pub source: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    pub baud: Option<String>,

    /// Output destination
    #[arg(long, value_parser = ["screen", "file", "none"])]
    pub output: Option<String>,

    /// Number of samples, or "*" to stream until stopped
    #[arg(long)]
    pub samples: Option<String>,

    /// Output file (required for --output file)
    #[arg(long)]
    pub file: Option<String>,

    /// Conditioner id (see `rngtoolbox conditioners`)
    #[arg(long)]
    pub conditioner: Option<String>,

    /// Feed unbounded streams into the OS entropy pool
    #[arg(long)]
    pub entropy_direct: Option<bool>,

    /// Remote QRNG endpoint URL; an empty string clears it
    #[arg(long)]
    pub remote: Option<String>,
}

impl ConfigOverrides {
    /// Apply every given override to `config`.
    pub fn apply(&self, config: &mut SessionConfig) {
        if let Some(source) = &self.source {
            config.source_port = Some(source.clone());
        }
        if let Some(baud) = &self.baud {
            config.baud_rate = baud.clone();
        }
        if let Some(dest) = self.output.as_deref().and_then(OutputDestination::parse) {
            config.output_destination = dest;
        }
        if let Some(samples) = &self.samples {
            config.sample_count = samples.clone();
        }
        if let Some(file) = &self.file {
            config.file_path = file.clone();
        }
        if let Some(conditioner) = &self.conditioner {
            config.conditioner_id = conditioner.clone();
        }
        if let Some(direct) = self.entropy_direct {
            config.entropy_direct = direct;
        }
        if let Some(remote) = &self.remote {
            config.remote_fetch_endpoint =
                (!remote.trim().is_empty()).then(|| remote.trim().to_string());
        }
    }
}

/// Build the multi-threaded runtime, or exit.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    }
}

/// The settings store at `path`, or at the default location.
pub fn settings_store(path: Option<&Path>) -> SettingsStore {
    path.map_or_else(SettingsStore::default_location, SettingsStore::new)
}

/// Load the saved settings (creating defaults on first run).
pub fn load_config(path: Option<&Path>) -> SessionConfig {
    let store = settings_store(path);
    runtime().block_on(store.load())
}

/// Human-readable summary of a configuration, one field per line.
pub fn describe(config: &SessionConfig) -> Vec<String> {
    let or_unset = |s: &str| {
        if s.trim().is_empty() {
            "(unset)".to_string()
        } else {
            s.to_string()
        }
    };
    let samples = if config.is_unbounded() {
        "* (until stopped)".to_string()
    } else {
        or_unset(&config.sample_count)
    };
    let mut lines = vec![
        format!("  Source:       {}", or_unset(config.source_port.as_deref().unwrap_or(""))),
        format!("  Baud rate:    {}", or_unset(&config.baud_rate)),
        format!("  Output:       {}", config.output_destination),
        format!("  Samples:      {samples}"),
        format!("  Conditioner:  {}", config.conditioner_id),
    ];
    if config.output_destination == OutputDestination::File {
        lines.push(format!("  File:         {}", or_unset(&config.file_path)));
    }
    if config.is_unbounded() {
        let direct = if config.entropy_direct { "yes" } else { "no" };
        lines.push(format!("  Entropy pool: {direct}"));
    }
    if let Some(remote) = &config.remote_fetch_endpoint {
        lines.push(format!("  Remote:       {remote}"));
    }
    lines
}
