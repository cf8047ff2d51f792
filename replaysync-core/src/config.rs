// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Configuration for session synchronization
//!
//! All settings are injected at construction. Nothing here is read from
//! global state except through [`SyncConfig::from_env_or_file`].

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default half-width of the contextual window around the playback cursor
pub const DEFAULT_WINDOW_HALF_WIDTH_MS: i64 = 1_500;

/// Environment variable overriding [`SyncConfig::api_base_url`]
pub const API_URL_ENV: &str = "REPLAYSYNC_API_URL";

/// Configuration for the synchronizer and playback driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the session data API
    pub api_base_url: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Half-width W of the contextual window, in milliseconds
    pub window_half_width_ms: i64,

    /// Period of the playback position poll
    pub poll_interval_ms: u64,

    /// Events handed to the replay engine per feeder step
    pub feed_batch_size: usize,

    /// Pause between feeder steps
    pub feed_pause_ms: u64,

    /// Chunks requested per pull
    pub pull_limit: usize,

    /// Recorded events required before playback can start
    pub min_bootstrap_events: usize,

    /// Start playing as soon as the engine is constructed
    pub autoplay: bool,

    /// Trace viewer settings
    pub trace: TraceConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 30_000,
            window_half_width_ms: DEFAULT_WINDOW_HALF_WIDTH_MS,
            poll_interval_ms: 200,
            feed_batch_size: 50,
            feed_pause_ms: 100,
            pull_limit: 50,
            min_bootstrap_events: 2,
            autoplay: true,
            trace: TraceConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Load from an optional file, then apply the environment override.
    pub fn from_env_or_file(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!("Using API URL from {}", API_URL_ENV);
                config.api_base_url = url;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the synchronizer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(SyncError::Config("api_base_url must not be empty".into()));
        }
        if self.window_half_width_ms < 0 {
            return Err(SyncError::Config(
                "window_half_width_ms must not be negative".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(SyncError::Config("poll_interval_ms must be positive".into()));
        }
        if self.feed_batch_size == 0 || self.pull_limit == 0 {
            return Err(SyncError::Config(
                "feed_batch_size and pull_limit must be positive".into(),
            ));
        }
        if self.min_bootstrap_events == 0 {
            return Err(SyncError::Config(
                "min_bootstrap_events must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn feed_pause(&self) -> Duration {
        Duration::from_millis(self.feed_pause_ms)
    }
}

/// Settings for trace flattening and display filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Instrumentation wrapper functions dropped before tree construction
    pub internal_wrappers: Vec<String>,

    /// Path fragment identifying third-party code
    pub vendor_marker: String,

    /// Minimum frame duration kept by the duration-floor filter (0 = off)
    pub duration_floor_ms: f64,

    /// Drop vendor leaves
    pub collapse_vendor: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            internal_wrappers: vec!["{main}".to_string(), "{trace}".to_string()],
            vendor_marker: "/vendor/".to_string(),
            duration_floor_ms: 0.0,
            collapse_vendor: false,
        }
    }
}

impl TraceConfig {
    pub fn is_internal_wrapper(&self, function_name: &str) -> bool {
        self.internal_wrappers.iter().any(|w| w == function_name)
    }
}
