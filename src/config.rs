//! Runtime configuration for both binaries.
//!
//! Values start from defaults, are overridden by `GROUPS_*` environment variables and
//! finally by `--flag value` command-line arguments.

use anyhow::{Context, Result, bail};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::DEFAULT_CHUNK_SIZE;

pub const DEFAULT_BIND: &str = "127.0.0.1:4555";
pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const MIN_TIMEOUT: Duration = Duration::from_secs(3);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub workers: usize,
    pub chunk_size: usize,
    /// JSON snapshot file; `None` keeps everything in memory.
    pub data_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 4555)),
            workers: DEFAULT_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            data_file: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(bind) = lookup("GROUPS_BIND") {
            config.bind = parse_addr("GROUPS_BIND", &bind)?;
        }
        if let Some(workers) = lookup("GROUPS_WORKERS") {
            config.workers = parse_workers(&workers)?;
        }
        if let Some(path) = lookup("GROUPS_DATA_FILE") {
            config.data_file = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    /// Applies `--bind`, `--workers` and `--data-file` overrides.
    pub fn apply_args(mut self, args: &[String]) -> Result<Self> {
        for (flag, value) in flag_pairs(args)? {
            match flag {
                "--bind" => self.bind = parse_addr(flag, value)?,
                "--workers" => self.workers = parse_workers(value)?,
                "--data-file" => self.data_file = Some(PathBuf::from(value)),
                other => bail!("unknown server option {}", other),
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: SocketAddr,
    pub timeout: Duration,
    pub recovery_log: PathBuf,
    /// Where `F` segments of responses are appended.
    pub transcript: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: SocketAddr::from(([127, 0, 0, 1], 4555)),
            timeout: DEFAULT_TIMEOUT,
            recovery_log: PathBuf::from("session.recovery"),
            transcript: PathBuf::from("transcript.log"),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(server) = lookup("GROUPS_SERVER") {
            config.server = parse_addr("GROUPS_SERVER", &server)?;
        }
        if let Some(timeout) = lookup("GROUPS_TIMEOUT_MS") {
            config.timeout = parse_timeout(&timeout)?;
        }
        if let Some(path) = lookup("GROUPS_RECOVERY_LOG") {
            config.recovery_log = PathBuf::from(path);
        }
        if let Some(path) = lookup("GROUPS_TRANSCRIPT") {
            config.transcript = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Applies `--server`, `--timeout-ms`, `--recovery-log` and `--transcript` overrides.
    pub fn apply_args(mut self, args: &[String]) -> Result<Self> {
        for (flag, value) in flag_pairs(args)? {
            match flag {
                "--server" => self.server = parse_addr(flag, value)?,
                "--timeout-ms" => self.timeout = parse_timeout(value)?,
                "--recovery-log" => self.recovery_log = PathBuf::from(value),
                "--transcript" => self.transcript = PathBuf::from(value),
                other => bail!("unknown client option {}", other),
            }
        }
        Ok(self)
    }
}

fn flag_pairs(args: &[String]) -> Result<Vec<(&str, &str)>> {
    let mut pairs = Vec::new();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        if !flag.starts_with("--") {
            bail!("unexpected argument {}", flag);
        }
        let value = iter
            .next()
            .with_context(|| format!("{} needs a value", flag))?;
        pairs.push((flag.as_str(), value.as_str()));
    }
    Ok(pairs)
}

fn parse_addr(name: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .with_context(|| format!("{} is not a socket address: {}", name, value))
}

fn parse_workers(value: &str) -> Result<usize> {
    let workers: usize = value
        .parse()
        .with_context(|| format!("worker count is not a number: {}", value))?;
    if workers == 0 {
        bail!("worker count must be at least 1");
    }
    Ok(workers)
}

/// Timeouts outside 3 to 10 seconds are clamped into that range.
fn parse_timeout(value: &str) -> Result<Duration> {
    let millis: u64 = value
        .parse()
        .with_context(|| format!("timeout is not a number of milliseconds: {}", value))?;
    let requested = Duration::from_millis(millis);
    let clamped = requested.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
    if clamped != requested {
        tracing::warn!("Timeout {:?} clamped to {:?}", requested, clamped);
    }
    Ok(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_server_defaults_env_then_args() {
        let env: HashMap<&str, &str> =
            HashMap::from([("GROUPS_WORKERS", "8"), ("GROUPS_DATA_FILE", "groups.json")]);
        let config = ServerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()))
            .unwrap()
            .apply_args(&args(&["--bind", "0.0.0.0:9000"]))
            .unwrap();

        assert_eq!(config.bind.to_string(), "0.0.0.0:9000");
        assert_eq!(config.workers, 8);
        assert_eq!(config.data_file, Some(PathBuf::from("groups.json")));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(ServerConfig::default().bind.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(ServerConfig::default().apply_args(&args(&["--workers", "0"])).is_err());
        assert!(ServerConfig::default().apply_args(&args(&["--bind"])).is_err());
        assert!(ServerConfig::default().apply_args(&args(&["--colour", "red"])).is_err());
        assert!(ClientConfig::default().apply_args(&args(&["--server", "nowhere"])).is_err());
    }

    #[test]
    fn test_client_timeout_is_clamped() {
        let short = ClientConfig::default()
            .apply_args(&args(&["--timeout-ms", "100"]))
            .unwrap();
        assert_eq!(short.timeout, MIN_TIMEOUT);

        let long = ClientConfig::from_lookup(|k| {
            (k == "GROUPS_TIMEOUT_MS").then(|| "60000".to_string())
        })
        .unwrap();
        assert_eq!(long.timeout, MAX_TIMEOUT);
    }
}
