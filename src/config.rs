//! Configuration and CLI argument handling

use std::time::Duration;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "room-timers")]
#[command(about = "Shared countdown and stopwatch timers coordinated across rooms")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Room expiration window in seconds, refreshed on activity
    #[arg(long, default_value = "86400")]
    pub room_ttl: u64,

    /// Default timer capacity of new rooms (1-50)
    #[arg(long, default_value = "10")]
    pub max_timers: u32,

    /// Maximum tick events broadcast per room per second
    #[arg(long, default_value = "10")]
    pub tick_rate_limit: u32,

    /// Seconds between expired room sweeps
    #[arg(long, default_value = "3600")]
    pub cleanup_interval: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval.max(1))
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            room_ttl: Duration::from_secs(self.room_ttl.max(1)),
            default_max_timers: self.max_timers,
            tick_rate_limit: self.tick_rate_limit,
        }
    }
}

/// Settings the services are built from, independent of the CLI
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub room_ttl: Duration,
    pub default_max_timers: u32,
    pub tick_rate_limit: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            room_ttl: Duration::from_secs(86_400),
            default_max_timers: 10,
            tick_rate_limit: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_defaults() {
        let config = Config::parse_from(["room-timers"]);
        let settings = config.service_settings();
        let defaults = ServiceSettings::default();

        assert_eq!(config.address(), "0.0.0.0:8080");
        assert_eq!(config.log_level(), "info");
        assert_eq!(settings.room_ttl, defaults.room_ttl);
        assert_eq!(settings.default_max_timers, defaults.default_max_timers);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "room-timers",
            "--room-ttl",
            "60",
            "--max-timers",
            "3",
            "-v",
        ]);
        assert_eq!(config.service_settings().room_ttl, Duration::from_secs(60));
        assert_eq!(config.max_timers, 3);
        assert_eq!(config.log_level(), "debug");
    }
}
