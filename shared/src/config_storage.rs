//! Configuration storage for arm calibration data.
//!
//! Persists the image warp matrix and the servo pulse-range calibration as
//! `key: value` text pairs, one per line. The file is rewritten wholesale
//! on save; a recalibration therefore replaces the warp matrix atomically
//! rather than patching it in place.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::PulseRange;
use crate::warp::WarpMatrix;

const KEY_WARP_MATRIX: &str = "Image warp matrix";
const KEY_SHOULDER_MIN: &str = "Shoulder min pulse";
const KEY_SHOULDER_MAX: &str = "Shoulder max pulse";
const KEY_ELBOW_MIN: &str = "Elbow min pulse";
const KEY_ELBOW_MAX: &str = "Elbow max pulse";

/// Persisted arm configuration.
///
/// `warp_matrix` is `None` until the camera has been calibrated once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArmConfig {
    /// Perspective calibration, absent before first camera calibration
    pub warp_matrix: Option<WarpMatrix>,
    /// Shoulder servo pulse calibration
    pub shoulder_pulse: PulseRange,
    /// Elbow servo pulse calibration
    pub elbow_pulse: PulseRange,
}

/// Errors from loading or saving the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying filesystem failure
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A recognized key with an unparseable value
    #[error("malformed value for '{key}': {value:?}")]
    Parse {
        /// Key whose value failed to parse
        key: String,
        /// Offending raw value
        value: String,
    },
}

/// Manager for one plain-text arm configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, or defaults if the file does not exist yet.
    pub fn load_or_default(&self) -> Result<ArmConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(ArmConfig::default());
        }
        self.load()
    }

    /// Load the configuration from the backing file.
    ///
    /// Lines without a `key: value` separator and unrecognized keys are
    /// ignored; missing keys keep their default values.
    pub fn load(&self) -> Result<ArmConfig, ConfigError> {
        let text = std::fs::read_to_string(&self.path)?;
        let mut config = ArmConfig::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                KEY_WARP_MATRIX => config.warp_matrix = Some(parse_warp(value)?),
                KEY_SHOULDER_MIN => config.shoulder_pulse.min = parse_pulse(key, value)?,
                KEY_SHOULDER_MAX => config.shoulder_pulse.max = parse_pulse(key, value)?,
                KEY_ELBOW_MIN => config.elbow_pulse.min = parse_pulse(key, value)?,
                KEY_ELBOW_MAX => config.elbow_pulse.max = parse_pulse(key, value)?,
                other => log::debug!("ignoring unrecognized config key '{other}'"),
            }
        }
        Ok(config)
    }

    /// Write the configuration, replacing the file contents wholesale.
    ///
    /// Writes to a sibling temp file and renames over the target so a
    /// half-written file can never be observed.
    pub fn save(&self, config: &ArmConfig) -> Result<(), ConfigError> {
        let mut text = String::new();
        if let Some(warp) = &config.warp_matrix {
            // `{:e}` prints the shortest representation that parses back to
            // the identical f64, so the matrix survives round trips intact
            let values: Vec<String> = warp
                .to_row_values()
                .iter()
                .map(|v| format!("{v:e}"))
                .collect();
            text.push_str(&format!("{KEY_WARP_MATRIX}: {}\n", values.join(" ")));
        }
        text.push_str(&format!(
            "{KEY_SHOULDER_MIN}: {}\n",
            config.shoulder_pulse.min
        ));
        text.push_str(&format!(
            "{KEY_SHOULDER_MAX}: {}\n",
            config.shoulder_pulse.max
        ));
        text.push_str(&format!("{KEY_ELBOW_MIN}: {}\n", config.elbow_pulse.min));
        text.push_str(&format!("{KEY_ELBOW_MAX}: {}\n", config.elbow_pulse.max));

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn parse_pulse(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::Parse {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_warp(value: &str) -> Result<WarpMatrix, ConfigError> {
    let parts: Vec<f64> = value
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| ConfigError::Parse {
            key: KEY_WARP_MATRIX.to_string(),
            value: value.to_string(),
        })?;
    let values: [f64; 9] = parts.try_into().map_err(|_| ConfigError::Parse {
        key: KEY_WARP_MATRIX.to_string(),
        value: value.to_string(),
    })?;
    Ok(WarpMatrix::from_row_values(&values))
}
