// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use std::error::Error;

use tracing::error;

use crate::config::ClientConfig;

/// Builds the HTTP client used for bulk POSTs.
///
/// An unparsable proxy URL is logged and the client falls back to a direct
/// connection rather than failing construction.
#[must_use]
pub fn get_client(config: &ClientConfig) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "LOGGLY | Unable to parse proxy configuration: {e}, \
                 falling back to direct connection"
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "LOGGLY | Failed to build HTTP client without proxy: {inner}, \
                         using reqwest defaults"
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(
    config: &ClientConfig,
    allow_proxy: bool,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            client = client.proxy(reqwest::Proxy::https(https_uri.as_str())?);
        }
    }

    Ok(client.build()?)
}
