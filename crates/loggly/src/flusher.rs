// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of drained batches to the bulk endpoint.
//!
//! One flush pass takes a [`Drain`] and sends one POST per group:
//!
//! ```text
//!   Drain { groups }
//!       │
//!       v
//!   ┌──────────────┐
//!   │ join by "\n" │ (one body per group)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │  HTTP POST   │ (groups in parallel, X-Loggly-Tag per group)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │   status?    │ (>= 400 or transport error: batch dropped)
//!   └──────────────┘
//! ```
//!
//! Nothing is retried. Every group of a pass is attempted even if another
//! group fails, because the drain already removed all of them from the
//! buffer; the first failure is returned once the pass completes.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::buffer::Drain;
use crate::config::ClientConfig;
use crate::constants::{user_agent, NO_TAG, TAG_HEADER};
use crate::errors::DeliveryError;
use crate::http::get_client;
use crate::observer::{FlushObserver, FlushReason};

/// Ships drained batches over HTTP.
#[derive(Clone)]
pub struct Flusher {
    client: reqwest::Client,
    observer: Arc<dyn FlushObserver>,
}

impl Flusher {
    #[must_use]
    pub fn new(config: &ClientConfig, observer: Arc<dyn FlushObserver>) -> Self {
        Flusher {
            client: get_client(config),
            observer,
        }
    }

    /// Ships every group of `drain` to `endpoint`.
    ///
    /// Returns the first delivery error of the pass, after all groups have
    /// been attempted.
    pub async fn flush(
        &self,
        endpoint: &str,
        drain: Drain,
        reason: FlushReason,
    ) -> Result<(), DeliveryError> {
        if drain.is_empty() {
            debug!("LOGGLY | {reason} flush: no messages to flush");
            return Ok(());
        }

        debug!(
            "LOGGLY | {reason} flush: {} records in {} groups",
            drain.record_count(),
            drain.groups.len()
        );

        let mut set = JoinSet::new();
        for (group, records) in drain.groups {
            let flusher = self.clone();
            let endpoint = endpoint.to_string();
            set.spawn(async move { flusher.ship(&endpoint, &group, &records).await });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("LOGGLY | Failed to join flush task: {e}");
                    continue;
                }
            };
            if let Err(e) = result {
                error!("LOGGLY | {reason} flush dropped a batch: {e}");
                self.observer.on_delivery_error(reason, &e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Sends one group's records as a single POST.
    pub async fn ship(
        &self,
        endpoint: &str,
        group: &str,
        records: &[Vec<u8>],
    ) -> Result<(), DeliveryError> {
        let body = join_records(records);
        let body_len = body.len();
        let headers = build_headers(group, body_len)?;

        debug!("LOGGLY | POST {endpoint} with {body_len} bytes for group {group}");
        let response = self
            .client
            .post(endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                group: group.to_string(),
                source,
            })?;

        let status = response.status();
        debug!("LOGGLY | {status} response for group {group}");
        if status.as_u16() >= 400 {
            // Body is only read for the error message.
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                group: group.to_string(),
                status,
                body,
            });
        }

        self.observer.on_shipped(group, records.len(), body_len);
        Ok(())
    }
}

/// Joins encoded records with a single newline between consecutive records.
#[must_use]
pub fn join_records(records: &[Vec<u8>]) -> Vec<u8> {
    records.join(&b'\n')
}

/// Tag header value for a batch: the group key, unless it is the no-tag
/// sentinel. Client-wide tags are not sent.
#[must_use]
pub fn tag_header_value(group: &str) -> Option<&str> {
    (group != NO_TAG).then_some(group)
}

fn build_headers(group: &str, body_len: usize) -> Result<HeaderMap, DeliveryError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, header_value("User-Agent", user_agent())?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body_len));
    if let Some(tag) = tag_header_value(group) {
        headers.insert(TAG_HEADER, header_value(TAG_HEADER, tag.to_string())?);
    }
    Ok(headers)
}

fn header_value(header: &'static str, value: String) -> Result<HeaderValue, DeliveryError> {
    HeaderValue::from_str(&value).map_err(|_| DeliveryError::InvalidHeader { header, value })
}
