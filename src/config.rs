//! Configuration and CLI argument handling

use clap::Parser;

use crate::state::EditPolicy;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "countdown-server")]
#[command(about = "A state-managed HTTP server hosting a pausable countdown timer")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Allow editing the duration while the countdown is paused
    #[arg(long)]
    pub edit_while_paused: bool,

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

    pub fn edit_policy(&self) -> EditPolicy {
        if self.edit_while_paused {
            EditPolicy::IdleOrPaused
        } else {
            EditPolicy::IdleOnly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["countdown-server"]).unwrap();
        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.edit_policy(), EditPolicy::IdleOnly);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "countdown-server", "-p", "8080", "--host", "127.0.0.1", "--edit-while-paused", "-v",
        ])
        .unwrap();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.edit_policy(), EditPolicy::IdleOrPaused);
    }
}
