//! Configuration management for dispatcher tuning
//!
//! This module provides runtime configuration loading from JSON files, so
//! queue sizes, selector timing, and the offline audio format can be
//! adjusted without recompilation. Every field has a default and a missing
//! or malformed file falls back to those defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::engine::ChannelLayout;

/// Default config location for desktop tools
pub const DEFAULT_CONFIG_PATH: &str = "assets/dispatcher_config.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dispatcher: DispatcherConfig,
    pub ui: UiConfig,
    pub audio: AudioConfig,
}

/// Dispatcher channel sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Capacity of the control -> owner action ring buffer
    pub action_queue_capacity: usize,
    /// Lagging subscribers lose events beyond this many
    pub notification_buffer: usize,
    /// Engine selected at construction if registered (index 0 otherwise)
    pub default_engine: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            action_queue_capacity: 64,
            notification_buffer: 32,
            default_engine: None,
        }
    }
}

/// Selector screen behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Idle time after which the selector commits and returns
    pub selector_timeout_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            selector_timeout_ms: 3000,
        }
    }
}

impl UiConfig {
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }
}

/// Block format used by the stub backend and offline rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Frames per processing call
    pub block_size: usize,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 256,
            channels: 2,
        }
    }
}

impl AudioConfig {
    /// `None` for channel counts other than 1 or 2
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_channels(self.channels)
    }

    /// Wall-clock duration of one block
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate.max(1) as f64)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file doesn't exist or
    /// the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }
}
