//! Hub configuration resource.
//!
//! Settings for the event hub and the demo frame loop, loaded from an INI
//! file. Defaults allow a safe startup when the file or a key is missing.
//!
//! # Configuration File Format
//!
//! ```ini
//! [hub]
//! log_handler_faults = true
//! queue_warn_depth = 4096
//!
//! [demo]
//! ticks = 60
//! producers = 4
//! events_per_tick = 8
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

use crate::hub::error::HubError;

/// Default safe values for startup
const DEFAULT_LOG_HANDLER_FAULTS: bool = true;
const DEFAULT_QUEUE_WARN_DEPTH: usize = 4096;
const DEFAULT_TICKS: u32 = 60;
const DEFAULT_PRODUCERS: u32 = 4;
const DEFAULT_EVENTS_PER_TICK: u32 = 8;
const DEFAULT_CONFIG_PATH: &str = "./hub.ini";

/// Hub configuration resource.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct HubConfig {
    /// Log each caught listener panic at `warn` level. The process panic hook
    /// runs regardless.
    pub log_handler_faults: bool,
    /// Warn when one flush drains more payloads than this.
    pub queue_warn_depth: usize,
    /// Demo: number of frames to run.
    pub ticks: u32,
    /// Demo: number of producer threads.
    pub producers: u32,
    /// Demo: payloads each producer posts per frame.
    pub events_per_tick: u32,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HubConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            log_handler_faults: DEFAULT_LOG_HANDLER_FAULTS,
            queue_warn_depth: DEFAULT_QUEUE_WARN_DEPTH,
            ticks: DEFAULT_TICKS,
            producers: DEFAULT_PRODUCERS,
            events_per_tick: DEFAULT_EVENTS_PER_TICK,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), HubError> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| HubError::Config(format!("Failed to load config file: {}", e)))?;

        // [hub] section
        if let Some(log_faults) = config.getbool("hub", "log_handler_faults").ok().flatten() {
            self.log_handler_faults = log_faults;
        }
        if let Some(depth) = config.getuint("hub", "queue_warn_depth").ok().flatten() {
            self.queue_warn_depth = depth as usize;
        }

        // [demo] section
        if let Some(ticks) = config.getuint("demo", "ticks").ok().flatten() {
            self.ticks = ticks as u32;
        }
        if let Some(producers) = config.getuint("demo", "producers").ok().flatten() {
            self.producers = producers as u32;
        }
        if let Some(events) = config.getuint("demo", "events_per_tick").ok().flatten() {
            self.events_per_tick = events as u32;
        }

        info!(
            "Loaded config: log_handler_faults={}, queue_warn_depth={}, ticks={}, producers={}, events_per_tick={}",
            self.log_handler_faults,
            self.queue_warn_depth,
            self.ticks,
            self.producers,
            self.events_per_tick
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), HubError> {
        let mut config = Ini::new();

        // [hub] section
        config.set(
            "hub",
            "log_handler_faults",
            Some(self.log_handler_faults.to_string()),
        );
        config.set(
            "hub",
            "queue_warn_depth",
            Some(self.queue_warn_depth.to_string()),
        );

        // [demo] section
        config.set("demo", "ticks", Some(self.ticks.to_string()));
        config.set("demo", "producers", Some(self.producers.to_string()));
        config.set(
            "demo",
            "events_per_tick",
            Some(self.events_per_tick.to_string()),
        );

        config
            .write(&self.config_path)
            .map_err(|e| HubError::Config(format!("Failed to save config file: {}", e)))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }
}
