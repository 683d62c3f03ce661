use std::time::Duration;

use crate::error::SensorError;

/// How an agent name filter is compared against an agent
///
/// The legacy sensing surface matched agents against three different
/// naming conventions at once with unclear precedence; here exactly one
/// convention is active per region and is chosen up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentNameMode {
    /// "First Last" (bare first name when the last name is empty)
    #[default]
    DisplayName,
    /// "First Resident" when the last name is empty, otherwise "First Last"
    LegacyResident,
    /// Lowercase "first.last", or "first.resident" when the last name is empty
    Username,
}

/// Sensor engine configuration, one per region
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Smallest allowed repeat cadence / shared timer interval (seconds)
    pub min_interval: f32,
    /// Largest allowed repeat cadence / shared timer interval (seconds)
    pub max_interval: f32,
    /// Capacity of the scene update queue feeding the ingestion worker
    pub queue_capacity: usize,
    /// How long teardown waits for a background thread before detaching it
    pub worker_join_timeout: Duration,
    /// Naming convention used by agent name filters
    pub agent_name_mode: AgentNameMode,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            min_interval: 0.2,
            max_interval: 3600.0,
            queue_capacity: 1024,
            worker_join_timeout: Duration::from_secs(10),
            agent_name_mode: AgentNameMode::DisplayName,
        }
    }
}

impl SensorConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SENSOR_MIN_INTERVAL") {
            if let Ok(parsed) = v.parse::<f32>() {
                if parsed > 0.0 {
                    config.min_interval = parsed;
                } else {
                    tracing::warn!("SENSOR_MIN_INTERVAL must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid SENSOR_MIN_INTERVAL '{}', using default", v);
            }
        }

        if let Ok(v) = std::env::var("SENSOR_MAX_INTERVAL") {
            if let Ok(parsed) = v.parse::<f32>() {
                if parsed > 0.0 {
                    config.max_interval = parsed;
                } else {
                    tracing::warn!("SENSOR_MAX_INTERVAL must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid SENSOR_MAX_INTERVAL '{}', using default", v);
            }
        }

        if let Ok(v) = std::env::var("SENSOR_QUEUE_CAPACITY") {
            if let Ok(parsed) = v.parse::<usize>() {
                if parsed > 0 {
                    config.queue_capacity = parsed;
                } else {
                    tracing::warn!("SENSOR_QUEUE_CAPACITY must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid SENSOR_QUEUE_CAPACITY '{}', using default", v);
            }
        }

        if let Ok(v) = std::env::var("SENSOR_WORKER_JOIN_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                config.worker_join_timeout = Duration::from_secs(parsed);
            } else {
                tracing::warn!("Invalid SENSOR_WORKER_JOIN_TIMEOUT_SECS '{}', using default", v);
            }
        }

        if let Ok(v) = std::env::var("SENSOR_AGENT_NAME_MODE") {
            match v.as_str() {
                "display" => config.agent_name_mode = AgentNameMode::DisplayName,
                "resident" => config.agent_name_mode = AgentNameMode::LegacyResident,
                "username" => config.agent_name_mode = AgentNameMode::Username,
                _ => tracing::warn!("Unknown SENSOR_AGENT_NAME_MODE '{}', using default", v),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.min_interval <= 0.0 {
            return Err(SensorError::InvalidConfig("min_interval must be > 0"));
        }
        if self.max_interval < self.min_interval {
            return Err(SensorError::InvalidConfig(
                "max_interval must be >= min_interval",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SensorError::InvalidConfig("queue_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Clamp a requested repeat cadence into the configured bounds
    #[inline]
    pub fn clamp_cadence(&self, seconds: f32) -> f32 {
        seconds.clamp(self.min_interval, self.max_interval)
    }
}
