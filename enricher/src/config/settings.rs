//! Runtime settings read from the environment.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use enricher_pipeline::consumer::ConsumerConfig;
use enricher_pipeline::orchestrator::OrchestratorConfig;
use enricher_pipeline::processor::DEFAULT_TOP_K;
use enricher_pipeline::producer::ProducerConfig;
use enricher_pipeline::retry::RetryPolicy;
use enricher_repository::RedisConfig;

use crate::logging::LogFormat;
use crate::EnricherError;

/// All settings of the enricher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub redis: RedisConfig,
    pub input_stream: String,
    pub output_stream: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub payload_field: String,
    pub block_timeout_ms: u64,
    pub max_batch_size: usize,
    pub group_start_id: String,
    pub output_maxlen: Option<usize>,
    pub category_top_k: usize,
    pub publish_max_attempts: u32,
    pub enrich_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            input_stream: "posts".to_string(),
            output_stream: "posts:enriched".to_string(),
            consumer_group: "enricher".to_string(),
            consumer_name: "enricher-1".to_string(),
            payload_field: "data".to_string(),
            block_timeout_ms: 5000,
            max_batch_size: 10,
            group_start_id: "0".to_string(),
            output_maxlen: None,
            category_top_k: DEFAULT_TOP_K,
            publish_max_attempts: 3,
            enrich_max_attempts: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,
            backoff_initial_ms: 500,
            backoff_max_ms: 30_000,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_HOST` / `REDIS_PORT`: Redis server (default: localhost:6379)
    /// - `REDIS_URL`: Full Redis URL, overrides host and port
    /// - `INPUT_STREAM` / `OUTPUT_STREAM`: Stream names (default: posts, posts:enriched)
    /// - `CONSUMER_GROUP` / `CONSUMER_NAME`: Group and stable consumer identity
    /// - `PAYLOAD_FIELD`: Entry field holding the JSON payload (default: data)
    /// - `BLOCK_TIMEOUT_MS`, `MAX_BATCH_SIZE`, `GROUP_START_ID`, `OUTPUT_MAXLEN`
    /// - `CATEGORY_TOP_K`, `PUBLISH_MAX_ATTEMPTS`, `ENRICH_MAX_ATTEMPTS`
    /// - `RETRY_INITIAL_DELAY_MS` / `RETRY_MAX_DELAY_MS`
    /// - `BACKOFF_INITIAL_MS` / `BACKOFF_MAX_MS`
    /// - `LOG_FORMAT`: pretty or json
    pub fn from_env() -> Result<Self, EnricherError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnricherError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let settings = Settings {
            redis: RedisConfig {
                host: get("REDIS_HOST").unwrap_or(defaults.redis.host),
                port: parse(&get, "REDIS_PORT", defaults.redis.port)?,
                url: get("REDIS_URL"),
            },
            input_stream: get("INPUT_STREAM").unwrap_or(defaults.input_stream),
            output_stream: get("OUTPUT_STREAM").unwrap_or(defaults.output_stream),
            consumer_group: get("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            consumer_name: get("CONSUMER_NAME").unwrap_or(defaults.consumer_name),
            payload_field: get("PAYLOAD_FIELD").unwrap_or(defaults.payload_field),
            block_timeout_ms: parse(&get, "BLOCK_TIMEOUT_MS", defaults.block_timeout_ms)?,
            max_batch_size: parse(&get, "MAX_BATCH_SIZE", defaults.max_batch_size)?,
            group_start_id: get("GROUP_START_ID").unwrap_or(defaults.group_start_id),
            output_maxlen: get("OUTPUT_MAXLEN")
                .map(|v| parse_value::<usize>("OUTPUT_MAXLEN", &v))
                .transpose()?,
            category_top_k: parse(&get, "CATEGORY_TOP_K", defaults.category_top_k)?,
            publish_max_attempts: parse(
                &get,
                "PUBLISH_MAX_ATTEMPTS",
                defaults.publish_max_attempts,
            )?,
            enrich_max_attempts: parse(&get, "ENRICH_MAX_ATTEMPTS", defaults.enrich_max_attempts)?,
            retry_initial_delay_ms: parse(
                &get,
                "RETRY_INITIAL_DELAY_MS",
                defaults.retry_initial_delay_ms,
            )?,
            retry_max_delay_ms: parse(&get, "RETRY_MAX_DELAY_MS", defaults.retry_max_delay_ms)?,
            backoff_initial_ms: parse(&get, "BACKOFF_INITIAL_MS", defaults.backoff_initial_ms)?,
            backoff_max_ms: parse(&get, "BACKOFF_MAX_MS", defaults.backoff_max_ms)?,
            log_format: get("LOG_FORMAT")
                .map(|v| v.parse::<LogFormat>())
                .transpose()?
                .unwrap_or(defaults.log_format),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), EnricherError> {
        // BLOCK 0 waits forever in Redis; a zero backoff never sleeps
        let non_zero = [
            ("BLOCK_TIMEOUT_MS", self.block_timeout_ms),
            ("BACKOFF_INITIAL_MS", self.backoff_initial_ms),
            ("MAX_BATCH_SIZE", self.max_batch_size as u64),
            ("CATEGORY_TOP_K", self.category_top_k as u64),
            ("PUBLISH_MAX_ATTEMPTS", self.publish_max_attempts as u64),
            ("ENRICH_MAX_ATTEMPTS", self.enrich_max_attempts as u64),
        ];

        for (key, value) in non_zero {
            if value == 0 {
                return Err(EnricherError::config(format!("{} must be greater than zero", key)));
            }
        }

        if self.output_maxlen == Some(0) {
            return Err(EnricherError::config("OUTPUT_MAXLEN must be greater than zero"));
        }

        Ok(())
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            stream: self.input_stream.clone(),
            group: self.consumer_group.clone(),
            consumer: self.consumer_name.clone(),
            payload_field: self.payload_field.clone(),
            block_timeout: Duration::from_millis(self.block_timeout_ms),
            max_count: self.max_batch_size,
            start_id: self.group_start_id.clone(),
        }
    }

    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            stream: self.output_stream.clone(),
            payload_field: self.payload_field.clone(),
            max_len: self.output_maxlen,
            retry: self.retry_policy(self.publish_max_attempts),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            enrich_retry: self.retry_policy(self.enrich_max_attempts),
            backoff_initial_ms: self.backoff_initial_ms,
            backoff_max_ms: self.backoff_max_ms,
        }
    }

    fn retry_policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: self.retry_initial_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
        }
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> Result<T, EnricherError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, EnricherError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EnricherError::config(format!("Invalid value '{}' for {}: {}", value, key, e)))
}
