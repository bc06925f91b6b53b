//! Connection configuration for the Redis stream client.

use std::fmt;

use url::Url;

/// Where to find the Redis server.
///
/// `Debug` output masks any password in `url`.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Full connection URL. Takes precedence over `host` and `port`.
    pub url: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            url: None,
        }
    }
}

impl RedisConfig {
    /// Create a config for a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            url: None,
        }
    }

    /// The URL handed to the Redis client.
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }

    /// The connection URL with its password replaced, for log lines.
    pub fn redacted_url(&self) -> String {
        let raw = self.connection_url();
        match Url::parse(&raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<unparseable redis url>".to_string(),
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("url", &self.url.as_ref().map(|_| self.redacted_url()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_from_host_and_port() {
        let config = RedisConfig::new("redis.internal", 6380);
        assert_eq!(config.connection_url(), "redis://redis.internal:6380/");
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = RedisConfig {
            url: Some("rediss://cache:6379/2".to_string()),
            ..RedisConfig::default()
        };
        assert_eq!(config.connection_url(), "rediss://cache:6379/2");
    }

    #[test]
    fn test_password_is_masked() {
        let config = RedisConfig {
            url: Some("redis://:hunter2@cache:6379/0".to_string()),
            ..RedisConfig::default()
        };

        assert_eq!(config.redacted_url(), "redis://:***@cache:6379/0");
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert_eq!(config.connection_url(), "redis://:hunter2@cache:6379/0");
    }

    #[test]
    fn test_url_without_password_is_unchanged() {
        let config = RedisConfig::new("localhost", 6379);
        assert_eq!(config.redacted_url(), "redis://localhost:6379/");
    }
}
