// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types returned by the client.
//!
//! Encoding problems surface synchronously from `submit`. Delivery problems
//! only surface from an explicit `flush`; background flushes report them
//! through `tracing` and the configured observer and then drop the batch.

use reqwest::StatusCode;

/// A record could not be turned into a single JSON line.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("record must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A drained batch could not be delivered. The batch is not re-queued.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("bulk endpoint for group {group} answered {status}: {body}")]
    Status {
        group: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to send batch for group {group}: {source}")]
    Transport {
        group: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid {header} header value {value:?}")]
    InvalidHeader { header: &'static str, value: String },
}

impl DeliveryError {
    /// HTTP status of the failed response, if the endpoint answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryError::Status { status, .. } => Some(*status),
            DeliveryError::Transport { source, .. } => source.status(),
            DeliveryError::InvalidHeader { .. } => None,
        }
    }
}

/// Client configuration could not be assembled.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LOGGLY_TOKEN environment variable is not set")]
    MissingToken,

    #[error("unknown log level: {0}")]
    InvalidLevel(String),

    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
