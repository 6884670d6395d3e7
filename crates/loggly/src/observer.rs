// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic hook for buffering and flush events.
//!
//! The client always emits `tracing` events. An observer is for callers that
//! want the same information programmatically, e.g. to count dropped batches
//! from background flushes whose errors are otherwise only logged.

use std::fmt;

use crate::errors::DeliveryError;

/// Why a flush pass started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushReason {
    /// The number of active groups reached the buffer size.
    Threshold,
    /// The periodic scheduler fired.
    Interval,
    /// A caller invoked `flush`.
    Explicit,
    /// The client is shutting down.
    Shutdown,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FlushReason::Threshold => "threshold",
            FlushReason::Interval => "interval",
            FlushReason::Explicit => "explicit",
            FlushReason::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

/// Receives client events. Every method defaults to a no-op.
pub trait FlushObserver: Send + Sync {
    /// A record was appended to `group`.
    fn on_buffered(&self, _group: &str, _buffered_records: usize, _active_groups: usize) {}

    /// A flush pass is about to drain the buffer.
    fn on_flush(&self, _reason: FlushReason) {}

    /// A batch was accepted by the endpoint.
    fn on_shipped(&self, _group: &str, _records: usize, _bytes: usize) {}

    /// A batch was dropped because delivery failed.
    fn on_delivery_error(&self, _reason: FlushReason, _error: &DeliveryError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FlushObserver for NoopObserver {}
