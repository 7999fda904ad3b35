/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Configuration for the mesh core.
///
/// Loaded from `config.toml` in the XDG config directory for the
/// `acton-mesh` prefix; every field has a default, and a missing or
/// malformed file falls back to those defaults with a logged error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// Limits and capacity configuration.
    pub limits: LimitsConfig,
    /// Node identity configuration.
    pub node: NodeConfig,
}

/// Timeout-related configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// How long runtime shutdown waits for the mailman task, in
    /// milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: 30_000,
        }
    }
}

/// Limits and capacity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted frame payload size in bytes.
    pub max_frame_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
        }
    }
}

/// Node identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// When set, used verbatim as the host fingerprint instead of
    /// probing the machine. Pinning this makes node ids deterministic,
    /// which multi-"node" tests rely on.
    pub fingerprint: Option<String>,
}

impl MeshConfig {
    /// The shutdown timeout as a [`Duration`].
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.shutdown_timeout_ms)
    }

    /// Loads configuration from the XDG config location, falling back to
    /// defaults when no file exists or parsing fails.
    #[must_use]
    pub fn load() -> Self {
        use tracing::{error, info};

        let xdg_dirs = match xdg::BaseDirectories::with_prefix("acton-mesh") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {e}");
                return Self::default();
            }
        };

        let Some(path) = xdg_dirs.find_config_file("config.toml") else {
            info!("No configuration file found, using defaults");
            return Self::default();
        };

        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(&path) {
            Ok(config_str) => match toml::from_str::<Self>(&config_str) {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to parse configuration file {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

lazy_static! {
    /// Global configuration instance.
    pub static ref CONFIG: MeshConfig = MeshConfig::load();
}
