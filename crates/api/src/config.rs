//! Service configuration.
//!
//! Loaded from a TOML file. `${VAR_NAME}` placeholders are replaced with environment
//! variable values before parsing, everywhere except inside comments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use taodiv_core::Coldkey;

/// URL scheme that selects the in-process chain instead of a gateway.
pub const MEMORY_CHAIN_URL: &str = "memory://";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener and auth.
    pub server: ServerConfig,

    /// Dividend cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Chain gateway and staking wallet.
    pub chain: ChainConfig,

    /// Ledger database.
    pub database: DatabaseConfig,

    /// Tweet source and scoring backend.
    pub sentiment: SentimentConfig,

    /// Background stake workers.
    #[serde(default)]
    pub staker: StakerConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret expected verbatim in the `Authorization` header.
    pub auth_token: String,
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL. Without one, lookups always go to the chain.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Gateway JSON-RPC URL, or `memory://` for an empty in-process chain.
    pub rpc_url: String,

    /// Coldkey whose funds are staked.
    pub coldkey: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_chain_timeout_secs")]
    pub timeout_secs: u64,

    /// Startup attempts for the ledger database.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between startup attempts, in seconds.
    #[serde(default = "default_retry_timeout_secs")]
    pub retry_timeout_secs: u64,
}

/// Ledger database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite://taodiv.db`.
    pub url: String,

    /// Pool upper bound.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connections kept open.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Sentiment pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    /// Tweet search endpoint.
    #[serde(default = "default_tweet_url")]
    pub tweet_url: String,

    /// Sent verbatim as the `Authorization` header.
    pub tweet_api_key: String,

    /// Tweets requested per search.
    #[serde(default = "default_tweet_count")]
    pub tweet_count: u32,

    /// Chat-completions endpoint.
    #[serde(default = "default_scoring_url")]
    pub scoring_url: String,

    /// Bearer token for the scoring endpoint.
    pub scoring_api_key: String,

    /// Scoring model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Attempts per remote call, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed wait between attempts, in seconds.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Tweet search timeout in seconds.
    #[serde(default = "default_tweet_timeout_secs")]
    pub tweet_timeout_secs: u64,

    /// Scoring call timeout in seconds.
    #[serde(default = "default_scoring_timeout_secs")]
    pub scoring_timeout_secs: u64,
}

/// Stake worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakerConfig {
    /// Accept `trade=true` requests.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Concurrent adjustments.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Items buffered before submissions are refused.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Burned-register attempts for an unregistered hotkey.
    #[serde(default = "default_registration_attempts")]
    pub registration_attempts: u32,

    /// Wait between registration attempts, in seconds.
    #[serde(default = "default_registration_delay_secs")]
    pub registration_delay_secs: u64,

    /// TAO staked per sentiment point.
    #[serde(default = "default_tao_per_point", alias = "unit_per_point")]
    pub tao_per_point: f64,
}

impl Default for StakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            registration_attempts: default_registration_attempts(),
            registration_delay_secs: default_registration_delay_secs(),
            tao_per_point: default_tao_per_point(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_ttl_secs() -> u64 {
    120
}

fn default_chain_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_timeout_secs() -> u64 {
    5
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_tweet_url() -> String {
    taodiv_sentiment::source::DEFAULT_URL.to_string()
}

fn default_tweet_count() -> u32 {
    10
}

fn default_scoring_url() -> String {
    taodiv_sentiment::scoring::DEFAULT_URL.to_string()
}

fn default_model() -> String {
    taodiv_sentiment::scoring::DEFAULT_MODEL.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_wait_secs() -> u64 {
    2
}

fn default_tweet_timeout_secs() -> u64 {
    15
}

fn default_scoring_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_registration_attempts() -> u32 {
    3
}

fn default_registration_delay_secs() -> u64 {
    5
}

fn default_tao_per_point() -> f64 {
    taodiv_core::DEFAULT_TAO_PER_SENTIMENT_POINT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load, expand and validate a TOML file.
    ///
    /// ```no_run
    /// # use taodiv_api::config::Config;
    /// let config = Config::from_file("taodiv.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = expand_env_vars(&contents)?;
        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML string. No env expansion.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Minimal valid configuration for in-process tests.
    pub fn for_test(auth_token: &str, coldkey: &Coldkey) -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                auth_token: auth_token.to_string(),
            },
            cache: CacheConfig::default(),
            chain: ChainConfig {
                rpc_url: MEMORY_CHAIN_URL.to_string(),
                coldkey: coldkey.to_string(),
                timeout_secs: default_chain_timeout_secs(),
                max_retries: 1,
                retry_timeout_secs: 0,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
            },
            sentiment: SentimentConfig {
                tweet_url: "http://127.0.0.1:9/twitter".to_string(),
                tweet_api_key: "test".to_string(),
                tweet_count: default_tweet_count(),
                scoring_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
                scoring_api_key: "test".to_string(),
                model: default_model(),
                max_attempts: 1,
                wait_secs: 0,
                tweet_timeout_secs: 1,
                scoring_timeout_secs: 1,
            },
            staker: StakerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.auth_token.is_empty() {
            anyhow::bail!("Server auth_token cannot be empty");
        }

        if let Some(url) = &self.cache.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                anyhow::bail!("Cache redis_url must start with redis:// or rediss:// (got '{}')", url);
            }
        }
        if self.cache.ttl_secs == 0 {
            anyhow::bail!("Cache ttl_secs must be > 0");
        }

        let rpc_url = &self.chain.rpc_url;
        if rpc_url.is_empty() {
            anyhow::bail!("Chain rpc_url cannot be empty");
        }
        if rpc_url != MEMORY_CHAIN_URL
            && !rpc_url.starts_with("http://")
            && !rpc_url.starts_with("https://")
        {
            anyhow::bail!(
                "Chain rpc_url must be an http(s) URL or {} (got '{}')",
                MEMORY_CHAIN_URL,
                rpc_url
            );
        }
        Coldkey::parse(&self.chain.coldkey)
            .with_context(|| format!("Chain coldkey is invalid: '{}'", self.chain.coldkey))?;
        if self.chain.timeout_secs == 0 {
            anyhow::bail!("Chain timeout_secs must be > 0");
        }
        if self.chain.max_retries == 0 {
            anyhow::bail!("Chain max_retries must be > 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be > 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        let sentiment = &self.sentiment;
        if sentiment.tweet_url.is_empty() || sentiment.scoring_url.is_empty() {
            anyhow::bail!("Sentiment tweet_url and scoring_url cannot be empty");
        }
        if sentiment.tweet_api_key.is_empty() || sentiment.scoring_api_key.is_empty() {
            anyhow::bail!("Sentiment API keys cannot be empty");
        }
        if sentiment.model.is_empty() {
            anyhow::bail!("Sentiment model cannot be empty");
        }
        if sentiment.max_attempts == 0 {
            anyhow::bail!("Sentiment max_attempts must be > 0");
        }

        if self.staker.workers == 0 {
            anyhow::bail!("Staker workers must be > 0");
        }
        if self.staker.queue_capacity == 0 {
            anyhow::bail!("Staker queue_capacity must be > 0");
        }
        if self.staker.registration_attempts == 0 {
            anyhow::bail!("Staker registration_attempts must be > 0");
        }
        if !(self.staker.tao_per_point.is_finite() && self.staker.tao_per_point > 0.0) {
            anyhow::bail!("Staker tao_per_point must be a positive number");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }

    /// Parsed coldkey. Valid after [`Config::validate`].
    pub fn coldkey(&self) -> Result<Coldkey> {
        Ok(Coldkey::parse(&self.chain.coldkey)?)
    }

    /// Cache entry lifetime.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

/// Lexical region of the TOML text being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    Comment,
    Basic,
    Literal,
    MultiBasic,
    MultiLiteral,
}

/// Replace `${VAR_NAME}` placeholders with environment variable values.
///
/// Placeholders are expanded in bare values and in all four TOML string forms. Comments
/// are copied untouched. A referenced variable that is unset is an error.
pub fn expand_env_vars(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut region = Region::Code;
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        let offset = input.len() - rest.len();

        // Delimiters that open or close a region.
        let token = match (region, ch) {
            (Region::Comment, '\n') => {
                region = Region::Code;
                "\n"
            }
            (Region::Code, '#') => {
                region = Region::Comment;
                "#"
            }
            (Region::Code, '"') if rest.starts_with("\"\"\"") => {
                region = Region::MultiBasic;
                "\"\"\""
            }
            (Region::Code, '"') => {
                region = Region::Basic;
                "\""
            }
            (Region::Code, '\'') if rest.starts_with("'''") => {
                region = Region::MultiLiteral;
                "'''"
            }
            (Region::Code, '\'') => {
                region = Region::Literal;
                "'"
            }
            (Region::Basic | Region::MultiBasic, '\\') => {
                // Copy the escape and the escaped character as one unit.
                let len = rest
                    .chars()
                    .take(2)
                    .map(char::len_utf8)
                    .sum::<usize>();
                &rest[..len]
            }
            (Region::Basic, '"') | (Region::Literal, '\'') => {
                region = Region::Code;
                &rest[..1]
            }
            (Region::MultiBasic, '"') if rest.starts_with("\"\"\"") => {
                region = Region::Code;
                "\"\"\""
            }
            (Region::MultiLiteral, '\'') if rest.starts_with("'''") => {
                region = Region::Code;
                "'''"
            }
            (Region::Basic | Region::Literal, '\n') => {
                // Unterminated single-line string; let the TOML parser report it.
                region = Region::Code;
                "\n"
            }
            (r, '$') if r != Region::Comment && rest.starts_with("${") => {
                let body = &rest[2..];
                let Some(end) = body.find('}') else {
                    anyhow::bail!(
                        "Unclosed environment variable placeholder at byte {}",
                        offset
                    );
                };
                let name = &body[..end];
                if name.is_empty() {
                    anyhow::bail!("Empty environment variable name at byte {}", offset);
                }
                let value = std::env::var(name).map_err(|_| {
                    anyhow::anyhow!(
                        "Environment variable '{}' is not set (referenced at byte {})",
                        name,
                        offset
                    )
                })?;
                out.push_str(&value);
                rest = &body[end + 1..];
                continue;
            }
            _ => &rest[..ch.len_utf8()],
        };

        out.push_str(token);
        rest = &rest[token.len()..];
    }

    Ok(out)
}
