// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The public client.
//!
//! ```text
//!   submit / send / level helpers      submit_raw / io::Write
//!              │                               │
//!              v                               │
//!   ┌─────────────────────┐                    │
//!   │ enrich or strip,    │                    │
//!   │ group key, encode   │                    │
//!   └──────────┬──────────┘                    │
//!              v                               v
//!   ┌────────────────────────────────────────────────┐
//!   │ GroupedBuffer + tags        (one Mutex)        │
//!   └──────────┬────────────────────────┬────────────┘
//!              │ active groups >= size  │ every flush interval
//!              v                        v
//!        detached flush            Scheduler tick
//!              │                        │
//!              └──────────┬─────────────┘
//!                         v
//!                 Flusher (HTTP POST)
//! ```
//!
//! Encoding and HTTP never run under the buffer lock.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::buffer::GroupedBuffer;
use crate::config::ClientConfig;
use crate::constants::NO_TAG;
use crate::errors::{DeliveryError, EncodeError};
use crate::flusher::Flusher;
use crate::level::Level;
use crate::observer::{FlushObserver, FlushReason, NoopObserver};
use crate::record::{
    encode, ensure_timestamp, group_key, merge_defaults, merge_properties, now_millis,
    strip_host_metadata, to_record, Record,
};
use crate::scheduler::Scheduler;

type MirrorWriter = Box<dyn Write + Send>;

/// Settings that may change after construction.
#[derive(Debug, Clone)]
struct Settings {
    level: Level,
    buffer_size: usize,
    flush_interval: Duration,
    endpoint: String,
    defaults: Record,
    minimal: bool,
}

struct Inner {
    settings: RwLock<Settings>,
    /// Buffer and client-wide tags share this lock.
    state: Mutex<GroupedBuffer>,
    writer: Mutex<Option<MirrorWriter>>,
    flusher: Flusher,
    observer: Arc<dyn FlushObserver>,
    runtime: Handle,
}

impl Inner {
    fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_settings(&self, update: impl FnOnce(&mut Settings)) {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut settings);
    }

    fn state(&self) -> MutexGuard<'_, GroupedBuffer> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best effort: a failing mirror never affects buffering.
    fn mirror(&self, bytes: &[u8], newline: bool) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = writer.as_mut() {
            let result = writer
                .write_all(bytes)
                .and_then(|()| if newline { writer.write_all(b"\n") } else { Ok(()) });
            if let Err(e) = result {
                error!("LOGGLY | failed to write to mirror writer: {e}");
            }
        }
    }

    fn buffer(self: &Arc<Self>, group: &str, line: Vec<u8>) {
        let (records, groups) = {
            let mut state = self.state();
            let records = state.append(group, line);
            (records, state.group_count())
        };
        self.observer.on_buffered(group, records, groups);

        let buffer_size = self.settings().buffer_size;
        if groups >= buffer_size {
            debug!("LOGGLY | {groups} active groups reached buffer size {buffer_size}, flushing");
            let inner = Arc::clone(self);
            self.runtime.spawn(async move {
                // Errors are already logged and reported to the observer.
                let _ = inner.flush(FlushReason::Threshold).await;
            });
        }
    }

    async fn flush(&self, reason: FlushReason) -> Result<(), DeliveryError> {
        self.observer.on_flush(reason);
        let drain = self.state().drain_all();
        let endpoint = self.settings().endpoint.clone();
        self.flusher.flush(&endpoint, drain, reason).await
    }
}

/// Buffered Loggly client.
///
/// Records are grouped by `partnerID`, buffered in memory and shipped when
/// the number of active groups reaches the buffer size, on every flush
/// interval, on [`Client::flush`] and on [`Client::shutdown`]. Failed batches
/// are dropped, never retried.
///
/// The client is `Send + Sync`; share it behind an `Arc` between producers.
pub struct Client {
    inner: Arc<Inner>,
    scheduler: Scheduler,
}

impl Client {
    /// Creates a client for `token` with the default endpoint, the host name
    /// as a default property and the given initial tags.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[must_use]
    pub fn new<I, S>(token: &str, buffer_size: usize, minimal: bool, tags: I) -> Client
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = ClientConfig {
            buffer_size,
            minimal,
            tags: tags.into_iter().map(Into::into).collect(),
            ..ClientConfig::new(token)
        };
        Client::from_config(config)
    }

    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[must_use]
    pub fn from_config(config: ClientConfig) -> Client {
        Client::with_observer(config, Arc::new(NoopObserver))
    }

    /// Creates a client that reports buffering and flush events to
    /// `observer`.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[must_use]
    pub fn with_observer(config: ClientConfig, observer: Arc<dyn FlushObserver>) -> Client {
        Client::with_runtime(config, observer, Handle::current())
    }

    /// Creates a client whose background work runs on `runtime`. Producers may
    /// then call it from any thread.
    #[must_use]
    pub fn with_runtime(
        config: ClientConfig,
        observer: Arc<dyn FlushObserver>,
        runtime: Handle,
    ) -> Client {
        let flusher = Flusher::new(&config, Arc::clone(&observer));

        let mut buffer = GroupedBuffer::new();
        buffer.tag(config.tags.iter().cloned());

        let settings = Settings {
            level: config.level,
            buffer_size: config.buffer_size,
            flush_interval: config.flush_interval,
            endpoint: config.resolved_endpoint(),
            defaults: config.defaults,
            minimal: config.minimal,
        };

        let inner = Arc::new(Inner {
            settings: RwLock::new(settings),
            state: Mutex::new(buffer),
            writer: Mutex::new(None),
            flusher,
            observer,
            runtime: runtime.clone(),
        });

        // The scheduler only holds a weak reference: it never keeps a dropped
        // client alive.
        let interval_ref = Arc::downgrade(&inner);
        let tick_ref: Weak<Inner> = Arc::downgrade(&inner);
        let scheduler = Scheduler::start(
            &runtime,
            move || {
                interval_ref
                    .upgrade()
                    .map(|inner| inner.settings().flush_interval)
            },
            move || {
                let inner = tick_ref.upgrade()?;
                Some(async move {
                    let _ = inner.flush(FlushReason::Interval).await;
                })
            },
        );

        debug!(
            "LOGGLY | client started, endpoint {}",
            inner.settings().endpoint
        );

        Client { inner, scheduler }
    }

    /// Buffers a record for asynchronous delivery.
    ///
    /// Outside minimal mode a missing `timestamp` is filled in and default
    /// properties are added for keys the record does not set. In minimal mode
    /// `filename`, `func`, `hostname` and `line` are removed instead.
    ///
    /// Only encoding errors are returned; delivery happens in the background.
    pub fn submit(&self, mut record: Record) -> Result<(), EncodeError> {
        {
            let settings = self.inner.settings();
            if settings.minimal {
                strip_host_metadata(&mut record);
            } else {
                ensure_timestamp(&mut record, now_millis());
                merge_defaults(&mut record, &settings.defaults);
            }
        }

        let group = group_key(&record);
        let line = encode(&record)?;

        self.inner.mirror(&line, true);
        self.inner.buffer(&group, line);
        Ok(())
    }

    /// Serializes `value`, which must produce a JSON object, and submits it.
    pub fn send<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), EncodeError> {
        self.submit(to_record(value)?)
    }

    /// Buffers pre-encoded bytes under the untagged group, as-is.
    pub fn submit_raw(&self, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        self.inner.mirror(&bytes, false);
        self.inner.buffer(NO_TAG, bytes);
    }

    /// Submits `{"level": level, "component": component}` merged with
    /// `properties`, unless `level` is below the configured minimum.
    pub fn log(
        &self,
        level: Level,
        component: &str,
        properties: Option<Record>,
    ) -> Result<(), EncodeError> {
        if self.inner.settings().level > level {
            return Ok(());
        }

        let mut record = Record::new();
        record.insert("level".to_string(), Value::from(level.as_str()));
        record.insert("component".to_string(), Value::from(component));
        if let Some(properties) = properties {
            merge_properties(&mut record, properties);
        }
        self.submit(record)
    }

    pub fn debug(&self, component: &str, properties: Option<Record>) -> Result<(), EncodeError> {
        self.log(Level::Debug, component, properties)
    }

    pub fn info(&self, component: &str, properties: Option<Record>) -> Result<(), EncodeError> {
        self.log(Level::Info, component, properties)
    }

    pub fn notice(&self, component: &str, properties: Option<Record>) -> Result<(), EncodeError> {
        self.log(Level::Notice, component, properties)
    }

    pub fn warn(&self, component: &str, properties: Option<Record>) -> Result<(), EncodeError> {
        self.log(Level::Warning, component, properties)
    }

    pub fn error(&self, component: &str, properties: Option<Record>) -> Result<(), EncodeError> {
        self.log(Level::Error, component, properties)
    }

    pub fn critical(&self, component: &str, properties: Option<Record>) -> Result<(), EncodeError> {
        self.log(Level::Critical, component, properties)
    }

    pub fn alert(&self, component: &str, properties: Option<Record>) -> Result<(), EncodeError> {
        self.log(Level::Alert, component, properties)
    }

    pub fn emergency(
        &self,
        component: &str,
        properties: Option<Record>,
    ) -> Result<(), EncodeError> {
        self.log(Level::Emergency, component, properties)
    }

    /// Drains the buffer and ships every group now.
    ///
    /// Every group is attempted; the first delivery error is returned and
    /// the failed batches are gone from the buffer either way.
    pub async fn flush(&self) -> Result<(), DeliveryError> {
        self.inner.flush(FlushReason::Explicit).await
    }

    /// Stops the scheduler and ships whatever is still buffered.
    pub async fn shutdown(&self) -> Result<(), DeliveryError> {
        self.scheduler.stop();
        self.scheduler.join().await;
        debug!("LOGGLY | client shutting down");
        self.inner.flush(FlushReason::Shutdown).await
    }

    /// Appends client-wide tags. They are kept with the client and never
    /// removed; the tag header only carries the group key.
    pub fn tag<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.state().tag(tags);
    }

    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.inner.state().tags().to_vec()
    }

    #[must_use]
    pub fn buffered_records(&self) -> usize {
        self.inner.state().len()
    }

    #[must_use]
    pub fn buffered_groups(&self) -> usize {
        self.inner.state().group_count()
    }

    #[must_use]
    pub fn buffered_in_group(&self, group: &str) -> usize {
        self.inner.state().group_len(group)
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.inner.settings().level
    }

    pub fn set_level(&self, level: Level) {
        self.inner.update_settings(|s| s.level = level);
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.inner.settings().flush_interval
    }

    /// Takes effect after the scheduler's current sleep.
    pub fn set_flush_interval(&self, interval: Duration) {
        self.inner.update_settings(|s| s.flush_interval = interval);
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.inner.settings().buffer_size
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        self.inner.settings().endpoint.clone()
    }

    pub fn set_endpoint(&self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        self.inner.update_settings(|s| s.endpoint = endpoint);
    }

    /// Replaces all default properties.
    pub fn set_defaults(&self, defaults: Record) {
        self.inner.update_settings(|s| s.defaults = defaults);
    }

    pub fn set_default(&self, key: impl Into<String>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        self.inner.update_settings(|s| {
            s.defaults.insert(key, value);
        });
    }

    #[must_use]
    pub fn is_minimal(&self) -> bool {
        self.inner.settings().minimal
    }

    pub fn set_minimal(&self, minimal: bool) {
        self.inner.update_settings(|s| s.minimal = minimal);
    }

    /// Mirrors every submitted line to `writer` as well.
    pub fn set_writer(&self, writer: impl Write + Send + 'static) {
        *self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(writer));
    }

    pub fn clear_writer(&self) {
        *self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("settings", &*self.inner.settings())
            .field("buffered_records", &self.buffered_records())
            .field("scheduler_stopped", &self.scheduler.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Raw writes go to the untagged group; `flush` is a no-op because delivery
/// is asynchronous.
impl Write for &Client {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.submit_raw(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for Client {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
