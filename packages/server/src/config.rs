//! サーバーの設定
//!
//! コマンドライン引数（環境変数でも指定可）から [`ServerConfig`] を組み立てます。

use std::{fmt, str::FromStr, time::Duration};

use clap::Parser;

use crate::{
    domain::{DomainError, ProviderName},
    infrastructure::registry::RegistryConfig,
    usecase::QueueConfig,
};

pub const DEFAULT_PROVIDER: &str = "openai=https://api.openai.com/v1";

/// `name=base_url` 形式のプロバイダ指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub name: ProviderName,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderEndpointError {
    #[error("expected NAME=BASE_URL, got '{0}'")]
    MissingSeparator(String),

    #[error("base url must start with http:// or https://, got '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    InvalidName(#[from] DomainError),
}

impl FromStr for ProviderEndpoint {
    type Err = ProviderEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, base_url) = s
            .split_once('=')
            .ok_or_else(|| ProviderEndpointError::MissingSeparator(s.to_string()))?;
        let base_url = base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ProviderEndpointError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            name: ProviderName::new(name.to_string())?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl fmt::Display for ProviderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.base_url)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "hiroba-server")]
#[command(about = "Real-time event stream and AI request queue server", long_about = None)]
pub struct ServerArgs {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HIROBA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "HIROBA_PORT", default_value = "8080")]
    pub port: u16,

    /// Interval between keep-alive pings on each stream
    #[arg(long, env = "HIROBA_KEEP_ALIVE_SECS", default_value = "30")]
    pub keep_alive_secs: u64,

    /// Delay between two requests to the same provider
    #[arg(long, env = "HIROBA_REQUEST_DELAY_MS", default_value = "500")]
    pub request_delay_ms: u64,

    /// Maximum number of waiting requests per provider
    #[arg(long, env = "HIROBA_MAX_QUEUE_LENGTH", default_value = "100")]
    pub max_queue_length: usize,

    /// Upper bound for a single provider call
    #[arg(long, env = "HIROBA_REQUEST_TIMEOUT_SECS", default_value = "120")]
    pub request_timeout_secs: u64,

    /// Provider queue to create, as NAME=BASE_URL (repeatable)
    #[arg(
        long = "provider",
        env = "HIROBA_PROVIDERS",
        value_delimiter = ',',
        default_value = DEFAULT_PROVIDER
    )]
    pub providers: Vec<ProviderEndpoint>,
}

/// 組み立て済みのサーバー設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub registry: RegistryConfig,
    pub queue: QueueConfig,
    pub providers: Vec<ProviderEndpoint>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            registry: RegistryConfig::default(),
            queue: QueueConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            registry: RegistryConfig {
                keep_alive_interval: Duration::from_secs(args.keep_alive_secs.max(1)),
            },
            queue: QueueConfig {
                request_delay: Duration::from_millis(args.request_delay_ms),
                max_queue_length: args.max_queue_length,
                request_timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
            },
            providers: args.providers,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_endpoint() {
        // テスト項目: NAME=BASE_URL を解析でき、名前は小文字化・末尾スラッシュは除去される
        // given (前提条件):
        let input = "Groq=https://api.groq.com/openai/v1/";

        // when (操作):
        let endpoint: ProviderEndpoint = input.parse().unwrap();

        // then (期待する結果):
        assert_eq!(endpoint.name.as_str(), "groq");
        assert_eq!(endpoint.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(endpoint.to_string(), "groq=https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_parse_provider_endpoint_errors() {
        // テスト項目: 不正な指定はそれぞれのエラーになる
        // given (前提条件):
        // when (操作):
        let missing = "openai".parse::<ProviderEndpoint>();
        let bad_url = "openai=ftp://example.com".parse::<ProviderEndpoint>();
        let empty_name = "=https://example.com".parse::<ProviderEndpoint>();

        // then (期待する結果):
        assert_eq!(
            missing,
            Err(ProviderEndpointError::MissingSeparator("openai".to_string()))
        );
        assert!(matches!(bad_url, Err(ProviderEndpointError::InvalidUrl(_))));
        assert!(matches!(
            empty_name,
            Err(ProviderEndpointError::InvalidName(_))
        ));
    }

    #[test]
    fn test_args_defaults_and_conversion() {
        // テスト項目: 引数なしでは既定値になり、ServerConfig に変換できる
        // given (前提条件):
        let args = ServerArgs::try_parse_from(["hiroba-server"]).unwrap();

        // when (操作):
        let config = ServerConfig::from(args);

        // then (期待する結果):
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.registry.keep_alive_interval, Duration::from_secs(30));
        assert_eq!(config.queue.request_delay, Duration::from_millis(500));
        assert_eq!(config.queue.max_queue_length, 100);
        assert_eq!(config.queue.request_timeout, Duration::from_secs(120));
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name.as_str(), "openai");
    }

    #[test]
    fn test_args_repeatable_provider() {
        // テスト項目: --provider は複数指定できる
        // given (前提条件):
        let argv = [
            "hiroba-server",
            "--provider",
            "openai=https://api.openai.com/v1",
            "--provider",
            "local=http://127.0.0.1:11434/v1",
            "--request-delay-ms",
            "0",
        ];

        // when (操作):
        let config = ServerConfig::from(ServerArgs::try_parse_from(argv).unwrap());

        // then (期待する結果):
        let names: Vec<&str> = config.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["openai", "local"]);
        assert_eq!(config.queue.request_delay, Duration::ZERO);
    }
}
