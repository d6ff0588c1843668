//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `areamedia.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use areamedia_domain::entity::{ActiveStates, PlayerState};
use areamedia_domain::error::ValidationError;
use areamedia_domain::exclusion::ExclusionSet;
use areamedia_domain::id::EntityId;

const CONFIG_FILE: &str = "areamedia.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which players aggregate and what counts as active.
    pub aggregation: AggregationConfig,
    /// Engine channel sizes.
    pub engine: EngineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// In-memory demo host.
    pub demo: DemoConfig,
}

/// Aggregation settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Entity ids that never take part in any aggregate.
    pub excluded_entities: Vec<String>,
    /// Player states that count as active.
    pub active_states: Vec<String>,
}

/// Engine settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the switch event broadcast.
    pub event_capacity: usize,
    /// Capacity of the engine command queue.
    pub command_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Demo host topology.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Populate the in-memory host on startup.
    pub enabled: bool,
    /// Simulated delay of every power command, in milliseconds.
    pub latency_ms: u64,
    pub areas: Vec<DemoArea>,
    pub devices: Vec<DemoDevice>,
    pub players: Vec<DemoPlayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoArea {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoDevice {
    pub id: String,
    #[serde(default)]
    pub area: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoPlayer {
    pub entity_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "DemoPlayer::default_state")]
    pub state: String,
}

impl DemoPlayer {
    fn default_state() -> String {
        PlayerState::Off.as_str().to_string()
    }
}

impl Config {
    /// Load configuration from `areamedia.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AREAMEDIA_EXCLUDED") {
            self.aggregation.excluded_entities = split_list(&val);
        }
        if let Ok(val) = std::env::var("AREAMEDIA_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "event_capacity must be non-zero".to_string(),
            ));
        }
        if self.engine.command_capacity == 0 {
            return Err(ConfigError::Validation(
                "command_capacity must be non-zero".to_string(),
            ));
        }
        for entity_id in &self.aggregation.excluded_entities {
            EntityId::parse(entity_id)?;
        }
        self.active_states()?;
        Ok(())
    }

    /// Excluded entity ids as a set.
    #[must_use]
    pub fn exclusions(&self) -> ExclusionSet {
        self.aggregation
            .excluded_entities
            .iter()
            .map(String::as_str)
            .collect()
    }

    /// Parsed set of active player states.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a state can never be active.
    pub fn active_states(&self) -> Result<ActiveStates, ConfigError> {
        let states = self
            .aggregation
            .active_states
            .iter()
            .map(|state| PlayerState::from(state.as_str()));
        Ok(ActiveStates::new(states)?)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            excluded_entities: Vec::new(),
            active_states: ActiveStates::default()
                .iter()
                .map(|state| state.as_str().to_string())
                .collect(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            command_capacity: 32,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "areamediad=info,areamedia=info".to_string(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        let area = |id: &str, name: &str| DemoArea {
            id: id.to_string(),
            name: name.to_string(),
        };
        let player = |entity_id: &str, name: &str, area: Option<&str>, device: Option<&str>, state: &str| DemoPlayer {
            entity_id: entity_id.to_string(),
            name: name.to_string(),
            area: area.map(ToString::to_string),
            device: device.map(ToString::to_string),
            state: state.to_string(),
        };
        Self {
            enabled: true,
            latency_ms: 50,
            areas: vec![
                area("living_room", "Living Room"),
                area("kitchen", "Kitchen"),
                area("study", "area_Study"),
            ],
            devices: vec![DemoDevice {
                id: "kitchen_radio".to_string(),
                area: Some("kitchen".to_string()),
            }],
            players: vec![
                player("media_player.living_room_tv", "Living Room TV", Some("living_room"), None, "playing"),
                player("media_player.soundbar", "Soundbar", Some("living_room"), None, "off"),
                player("media_player.kitchen_radio", "Kitchen Radio", None, Some("kitchen_radio"), "idle"),
                player("media_player.desk_speaker", "Desk Speaker", Some("study"), None, "off"),
                player("media_player.portable", "Portable Speaker", None, None, "off"),
            ],
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A value rejected by the domain model.
    #[error("invalid configuration")]
    Invalid(#[from] ValidationError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
