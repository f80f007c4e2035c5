use alloy::primitives::Address;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub approval_monitor: ApprovalMonitorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub rpc_http: String,
    pub rpc_ws: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

// ============================================================
// Approval Monitor Config
// ============================================================

/// Whether the emission quota closes for good once reached, or applies to
/// each transaction on its own.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    #[default]
    Cumulative,
    PerCall,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApprovalMonitorConfig {
    /// Approvals per token, since the last reset, at which findings start.
    #[serde(default = "default_emission_threshold")]
    pub emission_threshold: u64,
    /// Counts strictly above this are Medium.
    #[serde(default = "default_medium_severity_threshold")]
    pub medium_severity_threshold: u64,
    /// Counts strictly above this are High.
    #[serde(default = "default_high_severity_threshold")]
    pub high_severity_threshold: u64,
    #[serde(default = "default_max_findings")]
    pub max_findings: usize,
    #[serde(default)]
    pub quota_scope: QuotaScope,
    #[serde(default = "default_reset_interval_secs")]
    pub reset_interval_secs: u64,
    /// Restrict counting to a single token contract.
    pub token_filter: Option<String>,
}

impl Default for ApprovalMonitorConfig {
    fn default() -> Self {
        Self {
            emission_threshold: default_emission_threshold(),
            medium_severity_threshold: default_medium_severity_threshold(),
            high_severity_threshold: default_high_severity_threshold(),
            max_findings: default_max_findings(),
            quota_scope: QuotaScope::default(),
            reset_interval_secs: default_reset_interval_secs(),
            token_filter: None,
        }
    }
}

fn default_emission_threshold() -> u64 {
    10
}

fn default_medium_severity_threshold() -> u64 {
    15
}

fn default_high_severity_threshold() -> u64 {
    25
}

fn default_max_findings() -> usize {
    5
}

fn default_reset_interval_secs() -> u64 {
    3600
}

impl ApprovalMonitorConfig {
    pub fn reset_interval(&self) -> Duration {
        Duration::from_secs(self.reset_interval_secs)
    }

    /// Parsed `token_filter`. Only valid after `Config::validate` has run.
    pub fn token_filter_address(&self) -> eyre::Result<Option<Address>> {
        self.token_filter
            .as_deref()
            .map(|s| {
                Address::from_str(s)
                    .map_err(|e| eyre::eyre!("Invalid token_filter address '{}': {}", s, e))
            })
            .transpose()
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.emission_threshold == 0 {
            return Err(eyre::eyre!("emission_threshold must be at least 1"));
        }
        if self.medium_severity_threshold >= self.high_severity_threshold {
            return Err(eyre::eyre!(
                "medium_severity_threshold ({}) must be below high_severity_threshold ({})",
                self.medium_severity_threshold,
                self.high_severity_threshold
            ));
        }
        if self.max_findings == 0 {
            return Err(eyre::eyre!("max_findings must be at least 1"));
        }
        if self.reset_interval_secs == 0 {
            return Err(eyre::eyre!("reset_interval_secs must be at least 1"));
        }
        if let Some(token) = &self.token_filter {
            if !token.starts_with("0x") || token.len() != 42 {
                return Err(eyre::eyre!("Invalid token_filter address '{}'", token));
            }
            self.token_filter_address()?;
        }
        Ok(())
    }
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.chain.name.is_empty() {
            return Err(eyre::eyre!("Chain name must not be empty"));
        }
        if !self.chain.rpc_http.starts_with("http://")
            && !self.chain.rpc_http.starts_with("https://")
        {
            return Err(eyre::eyre!(
                "Invalid rpc_http '{}' for chain '{}'",
                self.chain.rpc_http,
                self.chain.name
            ));
        }
        if self.chain.poll_interval_ms == 0 {
            return Err(eyre::eyre!("poll_interval_ms must be at least 1"));
        }
        self.approval_monitor.validate()
    }
}
