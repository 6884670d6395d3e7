// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic flush task.
//!
//! The scheduler sleeps for the current flush interval, runs one tick and
//! starts over. It stops when its cancellation token fires, when it is
//! dropped, or when the owner it polls has gone away (the interval or tick
//! callback returns `None`).

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct Scheduler {
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Spawns the periodic loop on `runtime`.
    ///
    /// `interval` is read before every sleep, so interval changes take effect
    /// from the next cycle on.
    pub fn start<I, F, Fut>(runtime: &Handle, interval: I, tick: F) -> Self
    where
        I: Fn() -> Option<Duration> + Send + 'static,
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let handle = runtime.spawn(run(cancel_token.clone(), interval, tick));
        Scheduler {
            cancel_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Signals the loop to stop. An in-flight tick is allowed to finish.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for the loop to exit. Returns immediately if it was already
    /// joined.
    pub async fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!("LOGGLY | scheduler task ended abnormally: {e}");
            }
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run<I, F, Fut>(cancel_token: CancellationToken, interval: I, mut tick: F)
where
    I: Fn() -> Option<Duration>,
    F: FnMut() -> Option<Fut>,
    Fut: Future<Output = ()>,
{
    debug!("LOGGLY | scheduler started");
    loop {
        let Some(period) = interval() else {
            break;
        };

        tokio::select! {
            () = cancel_token.cancelled() => break,
            () = tokio::time::sleep(period) => {}
        }

        debug!("LOGGLY | interval {period:?} reached");
        match tick() {
            Some(fut) => fut.await,
            None => break,
        }
    }
    debug!("LOGGLY | scheduler stopped");
}
