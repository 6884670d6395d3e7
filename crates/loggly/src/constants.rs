// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults and wire constants for the Loggly bulk endpoint.

use std::time::Duration;

/// Client version reported in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name reported in the `User-Agent` header.
pub const CLIENT_NAME: &str = "loggly-rs";

/// Bulk endpoint template. `{token}` is replaced by the customer token.
pub const ENDPOINT_TEMPLATE: &str = "https://logs-01.loggly.com/bulk/{token}";

/// Group key used for records that carry no `partnerID`.
///
/// Batches flushed from this group are sent without a group tag.
pub const NO_TAG: &str = "notag";

/// Record key whose value selects the group a record is buffered under.
pub const PARTNER_ID_KEY: &str = "partnerID";

/// Header carrying the comma-separated tag list of a batch.
pub const TAG_HEADER: &str = "X-Loggly-Tag";

/// Keys removed from every record when minimal logging is enabled.
pub const HOST_METADATA_KEYS: [&str; 4] = ["filename", "func", "hostname", "line"];

/// Number of active groups that triggers a flush.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// How often the scheduler flushes, regardless of fill level.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Per-request timeout for bulk POSTs.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Renders the bulk endpoint for a token.
#[must_use]
pub fn endpoint_for_token(token: &str) -> String {
    ENDPOINT_TEMPLATE.replacen("{token}", token, 1)
}

/// Value of the `User-Agent` header.
#[must_use]
pub fn user_agent() -> String {
    format!("{CLIENT_NAME} (version: {VERSION})")
}
