//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::snacks::Bounds;
use crate::game::types::{Coord, Direction, SnakeId};
use crate::store::DEFAULT_CHANNEL_CAPACITY;
use crate::util::rate_limit::DEFAULT_INPUT_RATE;
use crate::util::time::{DEFAULT_FRAME_RATE, DEFAULT_TICK_RATE};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma separated. `None` allows any.
    pub client_origin: Option<String>,
    /// Buffered notifications per store channel
    pub channel_capacity: usize,
    /// Client messages accepted per second on each connection
    pub input_rate: u32,
    /// Simulation settings handed to every session
    pub game: GameSettings,
}

/// Per-session simulation settings
#[derive(Clone, Debug)]
pub struct GameSettings {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Frames pushed to the client per second
    pub frame_rate: u32,
    /// Region snacks and spawns are placed in
    pub bounds: Bounds,
    /// Snacks kept on the field at startup
    pub snack_count: usize,
    /// Fixed seed for placement, random when unset
    pub snack_seed: Option<u64>,
    /// Heading of a freshly spawned snake
    pub start_direction: Direction,
    /// Identities drawn in the background but never collided with
    pub showcase: Vec<SnakeId>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            frame_rate: DEFAULT_FRAME_RATE,
            bounds: Bounds::default(),
            snack_count: 48,
            snack_seed: None,
            start_direction: Direction::North,
            showcase: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR for hosted deployments
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = GameSettings::default();
        let min = Coord::new(
            parse_var("SNACK_MIN_X", defaults.bounds.min.x)?,
            parse_var("SNACK_MIN_Y", defaults.bounds.min.y)?,
        );
        let max = Coord::new(
            parse_var("SNACK_MAX_X", defaults.bounds.max.x)?,
            parse_var("SNACK_MAX_Y", defaults.bounds.max.y)?,
        );
        let bounds = Bounds::new(min, max).ok_or(ConfigError::InvalidBounds { min, max })?;

        let tick_rate: u32 = parse_var("TICK_RATE", defaults.tick_rate)?;
        let frame_rate: u32 = parse_var("FRAME_RATE", defaults.frame_rate)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if frame_rate == 0 {
            return Err(ConfigError::Invalid("FRAME_RATE"));
        }

        let snack_seed = match env::var("SNACK_SEED") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("SNACK_SEED"))?),
            Err(_) => None,
        };

        let showcase = env::var("SHOWCASE_SNAKES")
            .map(|raw| parse_list(&raw).into_iter().map(SnakeId::from).collect())
            .unwrap_or_default();

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),

            channel_capacity: parse_var("CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY)?,

            input_rate: parse_var("INPUT_RATE_LIMIT", DEFAULT_INPUT_RATE)?,

            game: GameSettings {
                tick_rate,
                frame_rate,
                bounds,
                snack_count: parse_var("SNACK_COUNT", defaults.snack_count)?,
                snack_seed,
                start_direction: parse_var("START_DIRECTION", defaults.start_direction)?,
                showcase,
            },
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Split a comma separated list, dropping blanks
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Snack bounds min {min} must not exceed max {max}")]
    InvalidBounds { min: Coord, max: Coord },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parsing_skips_blanks() {
        assert_eq!(parse_list(" champion , ,ghost,"), vec!["champion", "ghost"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn unset_variable_uses_default() {
        let value: u32 = parse_var("SNAKE_RELAY_TEST_UNSET_VARIABLE", 24).unwrap();
        assert_eq!(value, 24);
    }

    #[test]
    fn defaults_match_the_classic_field() {
        let game = GameSettings::default();
        assert_eq!(game.tick_rate, 24);
        assert_eq!(game.bounds.min, Coord::new(-64, -64));
        assert_eq!(game.bounds.max, Coord::new(64, 64));
        assert_eq!(game.start_direction, Direction::North);
    }
}
