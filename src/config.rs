//! Station configuration: match defaults, identity, device and storage settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::{
    device::{
        detector::{DEFAULT_DEBOUNCE, DEFAULT_DIFFICULTY, DetectorSettings},
        serial::SerialSettings,
    },
    state::{match_machine::MatchSettings, roster::Group},
};

/// Default location on disk where the station looks for its JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/station.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KICKLAB_CONFIG_PATH";
const EVENT_ID_ENV: &str = "KICKLAB_EVENT_ID";
const STATION_ID_ENV: &str = "KICKLAB_STATION_ID";
const SERIAL_PORT_ENV: &str = "KICKLAB_SERIAL_PORT";
const QUEUE_DB_ENV: &str = "KICKLAB_QUEUE_DB";

/// Line speed of the kick-pad controller.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Which remote store the station reports scores to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// Keep everything in process; scores are lost on exit.
    #[default]
    Memory,
    /// CouchDB, configured through `COUCH_*` variables.
    Couch,
    /// MongoDB, configured through `MONGO_*` variables.
    Mongo,
}

/// Serial device section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port path; no device is opened when unset.
    pub port: Option<String>,
    /// Line speed.
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Immutable runtime configuration of one station.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Event the station scores for, until one is joined at runtime.
    pub event_id: Option<String>,
    /// Identifier returned when the station registered.
    pub station_id: Option<String>,
    /// Name used when registering the station.
    pub station_name: String,
    /// Offset added to channel numbers to derive remote player ids (Station B uses 4).
    pub player_id_offset: u32,
    /// Round length in seconds.
    pub timer_duration_secs: u32,
    /// Software difficulty (threshold = difficulty * 20).
    pub difficulty: u16,
    /// Minimum spacing between kicks on one channel.
    #[serde(rename = "debounce_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub debounce: Duration,
    /// Hardware sensitivity pushed to the controller on connect.
    pub force_threshold: u8,
    /// Advance to the next group when the clock expires.
    pub auto_advance: bool,
    /// Controller connection.
    pub serial: SerialConfig,
    /// sqlx URL of the local pending-delta database.
    pub queue_database_url: String,
    /// Remote store selection.
    pub remote: RemoteBackend,
    /// Ordered groups, each a list of up to four player names.
    pub groups: Vec<Vec<String>>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            event_id: None,
            station_id: None,
            station_name: "Station A".into(),
            player_id_offset: 0,
            timer_duration_secs: 10,
            difficulty: DEFAULT_DIFFICULTY,
            debounce: DEFAULT_DEBOUNCE,
            force_threshold: 100,
            auto_advance: false,
            serial: SerialConfig::default(),
            queue_database_url: "sqlite://kicklab-queue.db".into(),
            remote: RemoteBackend::Memory,
            groups: Vec::new(),
        }
    }
}

impl StationConfig {
    /// Load the configuration file, falling back to defaults, then apply environment overrides.
    pub fn load() -> Self {
        Self::load_file().overlay_env(|key| env::var(key).ok())
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        groups = config.groups.len(),
                        "loaded station config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Replace fields with non-empty values returned by `lookup` for the `KICKLAB_*` variables.
    pub fn overlay_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value_of = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(event_id) = value_of(EVENT_ID_ENV) {
            self.event_id = Some(event_id);
        }
        if let Some(station_id) = value_of(STATION_ID_ENV) {
            self.station_id = Some(station_id);
        }
        if let Some(port) = value_of(SERIAL_PORT_ENV) {
            self.serial.port = Some(port);
        }
        if let Some(url) = value_of(QUEUE_DB_ENV) {
            self.queue_database_url = url;
        }
        self
    }

    /// Initial match parameters.
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            duration_secs: self.timer_duration_secs,
            difficulty: self.difficulty,
            force_threshold: self.force_threshold,
            auto_advance: self.auto_advance,
            groups: self
                .groups
                .iter()
                .map(|names| Group::from_names(names.iter().cloned(), self.player_id_offset))
                .collect(),
            player_id_offset: self.player_id_offset,
        }
    }

    /// Initial detector parameters.
    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            difficulty: self.difficulty,
            debounce: self.debounce,
        }
    }

    /// Serial settings, when a port is configured.
    pub fn serial_settings(&self) -> Option<SerialSettings> {
        self.serial.port.clone().map(|path| SerialSettings {
            path,
            baud_rate: self.serial.baud_rate,
        })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parses_partial_file_over_defaults() {
        let config: StationConfig = serde_json::from_str(
            r#"{
                "station_name": "Station B",
                "player_id_offset": 4,
                "debounce_ms": 120,
                "remote": "couch",
                "groups": [["Ana", "Bo"], ["Cy"]]
            }"#,
        )
        .unwrap();

        assert_eq!(config.debounce, Duration::from_millis(120));
        assert_eq!(config.remote, RemoteBackend::Couch);
        assert_eq!(config.serial.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timer_duration_secs, 10);

        let settings = config.match_settings();
        assert_eq!(settings.groups.len(), 2);
        assert_eq!(settings.groups[0].players[1].id, 6);
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars = HashMap::from([
            (EVENT_ID_ENV, "evt-1"),
            (SERIAL_PORT_ENV, "/dev/ttyACM0"),
            (QUEUE_DB_ENV, ""),
        ]);

        let config = StationConfig::default()
            .overlay_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.event_id.as_deref(), Some("evt-1"));
        assert_eq!(
            config.serial_settings().map(|s| s.path),
            Some("/dev/ttyACM0".to_string())
        );
        assert_eq!(
            config.queue_database_url,
            StationConfig::default().queue_database_url
        );
    }
}
