//! Configuration for rumord

use anyhow::Context;
use clap::Parser;
use rumor_core::NodeRecord;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// rumord - push/pull gossip daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "rumord")]
#[command(about = "Epidemic state dissemination over HTTP")]
pub struct Config {
    /// Listen address for inbound pushes
    #[arg(short, long, default_value = "0.0.0.0:9100")]
    pub listen: SocketAddr,

    /// Address peers use to reach us (defaults to http://<listen>)
    #[arg(long)]
    pub advertise: Option<String>,

    /// Node identifier (generated if not provided)
    #[arg(long, env = "RUMOR_NODE_ID")]
    pub node_id: Option<String>,

    /// JSON file holding an array of peer records to seed the registry with
    #[arg(long)]
    pub seed_file: Option<PathBuf>,

    /// Addresses to introduce ourselves to at startup (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub bootstrap: Vec<String>,

    /// Broadcast interval in seconds
    #[arg(long, default_value = "5")]
    pub broadcast_interval_secs: u64,

    /// Per-request timeout for outbound pushes in seconds
    #[arg(long, default_value = "10")]
    pub request_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.broadcast_interval_secs == 0 {
            anyhow::bail!("Broadcast interval must be at least one second");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be at least one second");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!("Unknown log format: {}", self.log_format);
        }
        if matches!(&self.node_id, Some(id) if id.trim().is_empty()) {
            anyhow::bail!("Node id cannot be empty");
        }
        let advertise = self.advertise_address();
        if !(advertise.starts_with("http://") || advertise.starts_with("https://")) {
            anyhow::bail!("Advertise address must be an http(s) URL: {}", advertise);
        }
        Ok(())
    }

    /// Address placed in our record for peers to push to
    pub fn advertise_address(&self) -> String {
        self.advertise
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen))
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs(self.broadcast_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Read seed records, if a seed file is configured
    pub fn load_seeds(&self) -> anyhow::Result<Vec<NodeRecord>> {
        let Some(path) = &self.seed_file else {
            return Ok(Vec::new());
        };
        let raw = std::fs::read(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("parsing seed file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("rumord").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert!(config.validate().is_ok());
        assert_eq!(config.advertise_address(), "http://0.0.0.0:9100");
        assert_eq!(config.broadcast_interval(), Duration::from_secs(5));
        assert!(config.bootstrap.is_empty());
    }

    #[test]
    fn test_bootstrap_list() {
        let config = parse(&["--bootstrap", "http://a:1,http://b:2"]);
        assert_eq!(config.bootstrap, vec!["http://a:1", "http://b:2"]);
    }

    #[test]
    fn test_validation_failures() {
        assert!(parse(&["--broadcast-interval-secs", "0"]).validate().is_err());
        assert!(parse(&["--log-format", "xml"]).validate().is_err());
        assert!(parse(&["--advertise", "10.0.0.1:9100"]).validate().is_err());
        assert!(parse(&["--node-id", " "]).validate().is_err());
    }

    #[test]
    fn test_load_seeds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"b","sequence":2,"payload":null,"address":"http://127.0.0.1:8002","peers":{{}}}}]"#
        )
        .unwrap();

        let config = parse(&["--seed-file", file.path().to_str().unwrap()]);
        let seeds = config.load_seeds().unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].sequence, 2);
    }

    #[test]
    fn test_load_seeds_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let config = parse(&["--seed-file", file.path().to_str().unwrap()]);
        assert!(config.load_seeds().is_err());
    }
}
