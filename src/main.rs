//! PCM transcoding demo
//!
//! Encodes a raw f32le PCM file to AAC (ADTS) and MP3, then decodes both
//! streams back to PCM.

use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pcm_transcode::config_file::{generate_default_config, ConfigFile};
use pcm_transcode::{driver, ffmpeg, Result, TranscodeError};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "pcm-transcode";

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let first = args.next();

    if first.as_deref() == Some("--generate-config") {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        generate_default_config(&path).map_err(|e| TranscodeError::Config(e.to_string()))?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration
    let config_path = first.unwrap_or_else(|| "config.toml".to_string());
    let (config_file, load_error) = if Path::new(&config_path).exists() {
        match ConfigFile::from_file(&config_path) {
            Ok(cf) => (Some(cf), None),
            Err(e) => (None, Some(e.to_string())),
        }
    } else {
        (None, None)
    };

    let log_format = config_file
        .as_ref()
        .map(|cf| cf.log_format().to_string())
        .unwrap_or_else(|| "pretty".to_string());
    let config = config_file
        .map(ConfigFile::into_driver_config)
        .unwrap_or_default();

    init_logging(&config.log_level, &log_format);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(e) = load_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }

    ffmpeg::init()?;
    tracing::info!("FFmpeg version: {}", ffmpeg::version_info());
    tracing::info!("Configuration loaded: {:?}", config);

    let report = driver::run(&config)?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!("Failed to serialize report: {}", e),
    }

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pcm_transcode={}", level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
