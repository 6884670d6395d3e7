// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::constants::{
    endpoint_for_token, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
};
use crate::errors::ConfigError;
use crate::level::Level;
use crate::record::Record;

/// Everything needed to build a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Customer token substituted into the bulk endpoint.
    pub token: String,
    /// Overrides the endpoint derived from `token`.
    pub endpoint: Option<String>,
    /// Number of active groups that triggers a flush.
    pub buffer_size: usize,
    pub flush_interval: Duration,
    /// Minimum severity accepted by the level helpers.
    pub level: Level,
    /// Strip host and caller metadata instead of enriching records.
    pub minimal: bool,
    /// Client-wide tags sent with every batch.
    pub tags: Vec<String>,
    /// Properties added to every record that does not set them itself.
    pub defaults: Record,
    /// Timeout for each bulk POST.
    pub request_timeout: Duration,
    pub https_proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            token: String::new(),
            endpoint: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            level: Level::default(),
            minimal: false,
            tags: Vec::new(),
            defaults: Record::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            https_proxy: None,
        }
    }
}

impl ClientConfig {
    /// Configuration for `token` with the host name as a default property.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        ClientConfig {
            token: token.into(),
            defaults: host_defaults(),
            ..Default::default()
        }
    }

    /// Reads the configuration from `LOGGLY_*` environment variables.
    ///
    /// `LOGGLY_TOKEN` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<ClientConfig, ConfigError> {
        let token = env::var("LOGGLY_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let mut config = ClientConfig::new(token);

        if let Some(size) = parse_env::<usize>("LOGGLY_BUFFER_SIZE")? {
            config.buffer_size = size;
        }
        if let Some(secs) = parse_env::<u64>("LOGGLY_FLUSH_INTERVAL_SECS")? {
            config.flush_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("LOGGLY_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(level) = env::var("LOGGLY_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(minimal) = env::var("LOGGLY_MINIMAL") {
            config.minimal = parse_bool("LOGGLY_MINIMAL", &minimal)?;
        }
        if let Ok(endpoint) = env::var("LOGGLY_ENDPOINT") {
            if !endpoint.is_empty() {
                config.endpoint = Some(endpoint);
            }
        }
        if let Ok(tags) = env::var("LOGGLY_TAGS") {
            config.tags = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        config.https_proxy = env::var("LOGGLY_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok()
            .filter(|p| !p.is_empty());

        Ok(config)
    }

    /// Endpoint batches are posted to.
    #[must_use]
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| endpoint_for_token(&self.token))
    }
}

fn host_defaults() -> Record {
    let mut defaults = Record::new();
    match hostname::get() {
        Ok(host) => {
            defaults.insert(
                "hostname".to_string(),
                Value::from(host.to_string_lossy().into_owned()),
            );
        }
        Err(e) => warn!("LOGGLY | failed to resolve hostname: {e}"),
    }
    defaults
}

fn parse_env<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(None),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}
