use std::fs;
use std::path::Path;
use thiserror::Error;

// Re-export types
pub use self::types::{
    Config, FishConfig, GroundPlane, MappingConfig, MotionConfig, PixelScaleMappingConfig,
    PlanarMappingConfig, ReceiverConfig, ReconcilerConfig, RemovalConfig, RepulsionConfig,
    SpatialMappingConfig, SwimBoundsConfig, TideConfig, WaterConfig,
};
mod types;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// --- Loading Functions ---

/// Load and validate a configuration file.
///
/// Files ending in `.toml` are parsed as TOML, everything else as JSON.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));

    let config = if is_toml {
        parse_toml(&content)?
    } else {
        parse_json(&content)?
    };

    validate(&config)?;
    Ok(config)
}

pub fn parse_json(content: &str) -> Result<Config, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn parse_toml(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

/// Reject values the tick systems cannot work with
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.framerate == 0 {
        return Err(invalid("Framerate cannot be zero."));
    }
    if !config.status_interval_seconds.is_finite() || config.status_interval_seconds <= 0.0 {
        return Err(invalid("Status interval must be a positive number of seconds."));
    }

    let receiver = &config.receiver;
    if receiver.port == 0 {
        return Err(invalid("Receiver port must match the sensor emitter and cannot be zero."));
    }
    if receiver.poll_interval_ms == 0 {
        return Err(invalid("Receiver poll interval must be greater than 0 ms."));
    }
    if receiver.max_datagram_bytes == 0 {
        return Err(invalid("Maximum datagram size must be greater than 0."));
    }

    match &config.mapping {
        MappingConfig::Planar(planar) => {
            if planar.sensor_width <= 0.0 || planar.sensor_height <= 0.0 {
                return Err(invalid("Sensor resolution must be positive."));
            }
            if planar.scene_width <= 0.0 || planar.scene_height <= 0.0 {
                return Err(invalid("Scene dimensions must be positive."));
            }
        }
        MappingConfig::Spatial(spatial) => {
            if spatial.scale <= 0.0 {
                return Err(invalid("Spatial mapping scale must be positive."));
            }
        }
        MappingConfig::PixelScale(pixel) => {
            if pixel.scale_factor <= 0.0 {
                return Err(invalid("Pixel scale factor must be positive."));
            }
        }
    }

    if config.reconciler.proxy_tag.trim().is_empty() {
        return Err(invalid("Proxy tag cannot be empty."));
    }
    if let RemovalConfig::Timeout { timeout_seconds, check_interval_ticks } = config.reconciler.removal {
        if timeout_seconds <= 0.0 {
            return Err(invalid("Removal timeout must be positive."));
        }
        if check_interval_ticks == 0 {
            return Err(invalid("Removal check interval must be at least one tick."));
        }
    }
    if let MotionConfig::Smoothed { rate } = config.reconciler.motion {
        if rate <= 0.0 {
            return Err(invalid("Smoothing rate must be positive."));
        }
    }

    let repulsion = &config.repulsion;
    if repulsion.influence_radius < 0.0 || repulsion.push_speed < 0.0 {
        return Err(invalid("Influence radius and push speed cannot be negative."));
    }

    let fish = &config.fish;
    if fish.bounds.min_x >= fish.bounds.max_x || fish.bounds.min_z >= fish.bounds.max_z {
        return Err(invalid("Fish bounds must have min < max on both axes."));
    }
    if fish.speed < 0.0 || fish.respawn_margin < 0.0 || fish.fade_in_seconds < 0.0 {
        return Err(invalid("Fish speed, respawn margin and fade-in cannot be negative."));
    }

    let tide = &config.tide;
    if tide.duration_seconds <= 0.0 {
        return Err(invalid("Tide transition duration must be positive."));
    }
    if let Some(interval) = tide.auto_toggle_seconds {
        if interval <= 0.0 {
            return Err(invalid("Tide auto-toggle interval must be positive."));
        }
    }

    Ok(())
}
