// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use loggly::{Client, ClientConfig};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGGLY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error reading configuration on loggly-pipe startup: {e}");
            return;
        }
    };

    let client = Client::from_config(config);
    info!("Shipping stdin to {}", client.endpoint());

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => submit_line(&client, line),
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    if let Err(e) = client.shutdown().await {
        error!("Final flush failed: {e}");
    }
}

fn submit_line(client: &Client, line: String) {
    if line.trim().is_empty() {
        return;
    }
    match serde_json::from_str::<Value>(&line) {
        Ok(Value::Object(record)) => {
            if let Err(e) = client.submit(record) {
                warn!("Dropping unencodable line: {e}");
            }
        }
        _ => client.submit_raw(line),
    }
}
