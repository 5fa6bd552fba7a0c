//! Configuration file support
//!
//! Loads driver configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{DriverConfig, EncoderConfig};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Input PCM settings
    pub input: InputSettings,
    /// AAC encoder settings
    pub aac: CodecSettings,
    /// MP3 encoder settings
    pub mp3: CodecSettings,
    /// Output settings
    pub output: Option<OutputSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSettings {
    /// Raw interleaved f32le PCM file
    pub pcm_path: PathBuf,
    /// Sample rate of the PCM
    pub sample_rate: u32,
    /// Channel count of the PCM (1 or 2)
    pub channels: u16,
    /// Samples per channel per encode call
    pub chunk_samples: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSettings {
    /// Bitrate in bps
    pub bitrate: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory for encoded streams and decoded PCM
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        Self {
            input: InputSettings {
                pcm_path: PathBuf::from("f32le_ar44100_ac2.pcm"),
                sample_rate: 44100,
                channels: 2,
                chunk_samples: Some(1024),
            },
            aac: CodecSettings { bitrate: 80_000 },
            mp3: CodecSettings { bitrate: 320_000 },
            output: Some(OutputSettings {
                dir: PathBuf::from("."),
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Log output format, `pretty` unless set
    pub fn log_format(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .unwrap_or("pretty")
    }

    /// Convert to DriverConfig
    pub fn into_driver_config(self) -> DriverConfig {
        let rate = self.input.sample_rate;
        let channels = self.input.channels;
        DriverConfig {
            pcm_path: self.input.pcm_path,
            output_dir: self
                .output
                .map(|o| o.dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            chunk_samples: self.input.chunk_samples.unwrap_or(1024),
            aac: EncoderConfig::new(self.aac.bitrate, rate, channels),
            mp3: EncoderConfig::new(self.mp3.bitrate, rate, channels),
            log_level: self
                .logging
                .map(|l| l.level)
                .unwrap_or_else(|| "info".to_string()),
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
