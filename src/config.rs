//! Runtime configuration from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_VOTING_SECONDS: u32 = 20;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Snapshots and results files
    pub data_dir: PathBuf,
    /// `<tournament>.txt` prompt lists
    pub prompts_dir: PathBuf,
    pub voting_seconds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_dir: PathBuf::from("data"),
            prompts_dir: PathBuf::from("prompts"),
            voting_seconds: DEFAULT_VOTING_SECONDS,
        }
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match std::env::var("BRACKET_BIND_ADDR") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Invalid BRACKET_BIND_ADDR '{}', using {}",
                    raw,
                    DEFAULT_BIND_ADDR
                );
                defaults.bind_addr
            }),
            Err(_) => defaults.bind_addr,
        };

        let data_dir = std::env::var("BRACKET_DATA_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let prompts_dir = std::env::var("BRACKET_PROMPTS_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.prompts_dir);

        let voting_seconds = match std::env::var("BRACKET_VOTING_SECONDS") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    tracing::warn!(
                        "Invalid BRACKET_VOTING_SECONDS '{}', using {}",
                        raw,
                        DEFAULT_VOTING_SECONDS
                    );
                    DEFAULT_VOTING_SECONDS
                }
            },
            Err(_) => DEFAULT_VOTING_SECONDS,
        };

        Self {
            bind_addr,
            data_dir,
            prompts_dir,
            voting_seconds,
        }
    }

    pub fn voting_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.voting_seconds))
    }
}
