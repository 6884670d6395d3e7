// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use loggly::{Client, ClientConfig, DeliveryError, Level, Record};
use mockito::{Matcher, Server};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, timeout, Duration};

fn config_for(server: &Server) -> ClientConfig {
    ClientConfig {
        token: "mock-token".to_string(),
        endpoint: Some(format!("{}/bulk/mock-token", server.url())),
        ..ClientConfig::default()
    }
}

fn record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

#[cfg(test)]
#[tokio::test]
async fn client_ships_on_interval() {
    let mut mock_server = Server::new_async().await;

    let mock = mock_server
        .mock("POST", "/bulk/mock-token")
        .match_header("Content-Type", "text/plain")
        .match_header("X-Loggly-Tag", "checkout")
        .match_header(
            "User-Agent",
            Matcher::Regex(r"^loggly-rs \(version: .+\)$".to_string()),
        )
        .match_body(Matcher::Regex(r#""component":"cart""#.to_string()))
        .with_status(200)
        .create_async()
        .await;

    let client = Client::from_config(ClientConfig {
        flush_interval: Duration::from_millis(50),
        tags: vec!["web".to_string()],
        ..config_for(&mock_server)
    });
    client
        .info("cart", Some(record(json!({"partnerID": "checkout"}))))
        .expect("failed to submit record");

    let flush = async {
        while !mock.matched_async().await {
            sleep(Duration::from_millis(20)).await;
        }
    };

    let result = timeout(Duration::from_secs(5), flush).await;

    match result {
        Ok(()) => mock.assert_async().await,
        Err(_) => panic!("timed out before server received interval flush"),
    }
    assert_eq!(client.buffered_records(), 0);
}

#[cfg(test)]
#[tokio::test]
async fn client_ships_one_request_per_group() {
    let mut server = Server::new_async().await;
    let untagged = server
        .mock("POST", "/bulk/mock-token")
        .match_header("X-Loggly-Tag", Matcher::Missing)
        .match_body("{\"message\":\"plain\"}")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let tagged = server
        .mock("POST", "/bulk/mock-token")
        .match_header("X-Loggly-Tag", "acme")
        .match_body(concat!(
            "{\"message\":\"a\",\"partnerID\":\"acme\"}\n",
            "{\"message\":\"b\",\"partnerID\":\"acme\"}",
        ))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let client = Client::from_config(ClientConfig {
        minimal: true,
        flush_interval: Duration::from_secs(3600),
        ..config_for(&server)
    });
    client
        .submit(record(json!({"message": "a", "partnerID": "acme"})))
        .expect("failed to submit");
    client
        .submit(record(json!({"message": "plain"})))
        .expect("failed to submit");
    client
        .submit(record(json!({"message": "b", "partnerID": "acme"})))
        .expect("failed to submit");

    client.flush().await.expect("flush failed");

    untagged.assert_async().await;
    tagged.assert_async().await;
}

#[cfg(test)]
#[tokio::test]
async fn failed_group_does_not_block_other_groups() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("POST", "/bulk/mock-token")
        .match_header("X-Loggly-Tag", "bad")
        .with_status(503)
        .with_body("unavailable")
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("POST", "/bulk/mock-token")
        .match_header("X-Loggly-Tag", "good")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let client = Client::from_config(ClientConfig {
        flush_interval: Duration::from_secs(3600),
        ..config_for(&server)
    });
    client
        .submit(record(json!({"partnerID": "bad"})))
        .expect("failed to submit");
    client
        .submit(record(json!({"partnerID": "good"})))
        .expect("failed to submit");

    let err = client.flush().await.expect_err("flush should fail");
    match err {
        DeliveryError::Status { group, status, .. } => {
            assert_eq!(group, "bad");
            assert_eq!(status.as_u16(), 503);
        }
        other => panic!("unexpected error: {other}"),
    }

    failing.assert_async().await;
    ok.assert_async().await;
    assert_eq!(client.buffered_records(), 0);

    // Failed batches are not retried.
    client.flush().await.expect("empty flush should succeed");
    failing.assert_async().await;
}

#[cfg(test)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_producers_lose_nothing() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/bulk/mock-token")
        .with_status(200)
        .create_async()
        .await;

    let client = Arc::new(Client::from_config(ClientConfig {
        flush_interval: Duration::from_secs(3600),
        level: Level::Debug,
        ..config_for(&server)
    }));

    let producers: Vec<_> = (0..4)
        .map(|worker| {
            let client = Arc::clone(&client);
            std::thread::spawn(move || {
                for n in 0..250 {
                    client
                        .debug("worker", Some(record(json!({"worker": worker, "n": n}))))
                        .expect("failed to submit");
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    assert_eq!(client.buffered_records(), 1000);
    assert_eq!(client.buffered_groups(), 1);

    client.shutdown().await.expect("shutdown flush failed");
    mock.assert_async().await;
    assert_eq!(client.buffered_records(), 0);
}

#[cfg(test)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flushes_ship_every_record_once() {
    const WORKERS: u64 = 4;
    const PER_WORKER: u64 = 500;

    let received = Arc::new(Mutex::new(Vec::<(u64, u64)>::new()));
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/bulk/mock-token")
        .with_status(200)
        .with_body_from_request({
            let received = Arc::clone(&received);
            move |request| {
                let body = request.body().cloned().unwrap_or_default();
                let mut received = received.lock().expect("lock poisoned");
                for line in body.split(|b| *b == b'\n') {
                    let value: serde_json::Value =
                        serde_json::from_slice(line).expect("shipped line is not JSON");
                    received.push((
                        value["worker"].as_u64().expect("missing worker"),
                        value["n"].as_u64().expect("missing n"),
                    ));
                }
                Vec::new()
            }
        })
        .expect_at_least(1)
        .create_async()
        .await;

    let client = Arc::new(Client::from_config(ClientConfig {
        buffer_size: 3,
        flush_interval: Duration::from_millis(5),
        ..config_for(&server)
    }));

    let producers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let client = Arc::clone(&client);
            tokio::task::spawn_blocking(move || {
                for n in 0..PER_WORKER {
                    let partner = format!("p{}", n % 4);
                    client
                        .submit(record(json!({"partnerID": partner, "worker": worker, "n": n})))
                        .expect("failed to submit");
                }
            })
        })
        .collect();

    let done = Arc::new(AtomicBool::new(false));
    let flusher = tokio::spawn({
        let client = Arc::clone(&client);
        let done = Arc::clone(&done);
        async move {
            while !done.load(Ordering::SeqCst) {
                client.flush().await.expect("flush failed");
                tokio::task::yield_now().await;
            }
        }
    });

    for producer in producers {
        producer.await.expect("producer panicked");
    }
    done.store(true, Ordering::SeqCst);
    flusher.await.expect("flush task panicked");
    client.shutdown().await.expect("shutdown flush failed");

    let total = usize::try_from(WORKERS * PER_WORKER).expect("total fits in usize");
    let wait = async {
        while received.lock().expect("lock poisoned").len() < total {
            sleep(Duration::from_millis(10)).await;
        }
    };
    timeout(Duration::from_secs(10), wait)
        .await
        .expect("timed out before every record was shipped");

    let received = received.lock().expect("lock poisoned").clone();
    let unique: HashSet<_> = received.iter().copied().collect();
    assert_eq!(received.len(), total);
    assert_eq!(unique.len(), total);
    assert_eq!(client.buffered_records(), 0);
}
