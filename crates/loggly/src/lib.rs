// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Loggly
//!
//! A buffered client for Loggly's bulk HTTP endpoint.
//!
//! Structured records are JSON-encoded into single lines, buffered in memory
//! by their `partnerID` group and shipped in batches, one POST per group,
//! with the group and the client tags in the `X-Loggly-Tag` header.
//!
//! ## Modules
//!
//! - [`client`]: the public [`Client`] facade
//! - [`record`]: record enrichment and encoding
//! - [`buffer`]: grouped in-memory buffer
//! - [`flusher`]: HTTP delivery of drained batches
//! - [`scheduler`]: the periodic flush task
//! - [`config`]: client configuration, from code or the environment
//!
//! ```no_run
//! # async fn run() -> Result<(), loggly::Error> {
//! let client = loggly::Client::new("token", 100, false, ["web"]);
//! client.info("api", None)?;
//! client.flush().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flusher;
pub mod http;
pub mod level;
pub mod observer;
pub mod record;
pub mod scheduler;

pub use client::Client;
pub use config::ClientConfig;
pub use errors::{ConfigError, DeliveryError, EncodeError, Error};
pub use level::Level;
pub use observer::{FlushObserver, FlushReason, NoopObserver};
pub use record::Record;
