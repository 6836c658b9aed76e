//! Event bus engine

use super::{ChannelKind, ChannelTable, Event, EventQueue, SharedHandler, BAR};
use crate::date::parse_date_key;
use crate::error::SimError;
use crate::history::DateRange;
use crate::sim::SimulationContext;
use crate::store::{child_path, Child, ChildStream, DataStore, Replay, StoreError};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Bus construction options
#[derive(Debug, Clone, Default)]
pub struct BusOptions {
    /// Channel name to delivery path table
    pub channels: ChannelTable,
    /// Upper bound for one durable delivery (write plus notification)
    pub delivery_timeout: Option<Duration>,
}

/// Delivers events one at a time in (timestamp, counter) order
///
/// Durable events are written to `events/{type}` and handed to consumers
/// from the store's append notification, once the write is acknowledged.
/// Ephemeral events go straight to their in-process consumers. The next
/// event is dequeued only after the current one is fully delivered.
pub struct EventBus {
    sim_id: String,
    store: Arc<dyn DataStore>,
    events_path: String,
    symbols: Vec<String>,
    options: BusOptions,
    queue: EventQueue,
    next_counter: u64,
    /// Counters already taken by an event of this bus
    claimed: HashSet<u64>,
    /// Inbox keys written by `publish` and not yet collected
    published: HashSet<String>,
    handlers: HashMap<String, Vec<SharedHandler>>,
    subscriptions: HashMap<String, ChildStream>,
    inbox: Option<ChildStream>,
    started: bool,
    delivered: u64,
}

impl EventBus {
    /// Create a bus bound to one simulation
    pub fn new(ctx: &SimulationContext, store: Arc<dyn DataStore>, options: BusOptions) -> Self {
        Self {
            sim_id: ctx.id().to_string(),
            store,
            events_path: ctx.child_path("events"),
            symbols: ctx.symbols().to_vec(),
            options,
            queue: EventQueue::new(),
            next_counter: 1,
            claimed: HashSet::new(),
            published: HashSet::new(),
            handlers: HashMap::new(),
            subscriptions: HashMap::new(),
            inbox: None,
            started: false,
            delivered: 0,
        }
    }

    /// Delivery path of a channel
    pub fn kind(&self, channel: &str) -> ChannelKind {
        self.options.channels.kind(channel)
    }

    /// Events waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Events delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn inbox_path(&self) -> String {
        child_path(&self.events_path, "inbox")
    }

    /// Check mandatory fields and assign the tie-break counter once
    ///
    /// A preset counter is kept only if no other event of this bus holds it.
    fn validate(&mut self, mut event: Event) -> Result<Event, SimError> {
        if event.event_type.is_empty() {
            return Err(SimError::Validation(format!(
                "Event missing type: {}",
                serde_json::to_string(&event).unwrap_or_default()
            )));
        }
        if event.timestamp.is_none() {
            return Err(SimError::Validation(format!(
                "Event missing timestamp: {}",
                serde_json::to_string(&event).unwrap_or_default()
            )));
        }
        let counter = match event.counter {
            Some(counter) if self.claimed.contains(&counter) => {
                return Err(SimError::Validation(format!(
                    "counter {} already used by event {}",
                    counter,
                    event.event_key()
                )));
            }
            Some(counter) => counter,
            None => self.next_counter,
        };
        let next = counter.checked_add(1).ok_or_else(|| {
            SimError::Validation(format!("counter {} leaves no successor", counter))
        })?;

        self.next_counter = self.next_counter.max(next);
        self.claimed.insert(counter);
        event.counter = Some(counter);
        Ok(event)
    }

    /// Validate an event and place it in the priority queue
    pub fn enqueue(&mut self, event: Event) -> Result<(), SimError> {
        let event = self.validate(event)?;
        self.queue.push(event);
        Ok(())
    }

    /// Load bar events for the range from a `{dateKey}/{symbol}` tree
    ///
    /// All date nodes are validated before any is queued, so a failure
    /// leaves the queue untouched.
    pub async fn seed(&mut self, source: &str, range: &DateRange) -> Result<usize, SimError> {
        if self.started {
            return Err(SimError::Precondition(
                "seed called after the event loop started".to_string(),
            ));
        }
        tracing::info!(sim_id = %self.sim_id, source, range = %range, "Seeding");

        let end = format!("{}~", range.end_key());
        let days = self
            .store
            .children_in_range(source, Some(&range.start_key()), Some(&end))
            .await?;

        let mut events = Vec::with_capacity(days.len());
        for day in &days {
            if let Some(event) = self.bar_event(day) {
                events.push(self.validate(event)?);
            }
        }

        let count = events.len();
        for event in events {
            self.queue.push(event);
        }
        set_gauge(GaugeMetric::QueueDepth, self.queue.len() as f64);
        Ok(count)
    }

    /// Bar event for the tracked symbols present on one date node
    fn bar_event(&self, day: &Child) -> Option<Event> {
        let payload: BTreeMap<String, serde_json::Value> = self
            .symbols
            .iter()
            .filter_map(|symbol| {
                day.value
                    .get(symbol)
                    .map(|bar| (symbol.clone(), bar.clone()))
            })
            .collect();
        if payload.is_empty() {
            return None;
        }

        Some(Event {
            event_type: BAR.to_string(),
            timestamp: parse_date_key(&day.key),
            counter: None,
            payload,
        })
    }

    /// Publish an event onto its channel
    ///
    /// Ephemeral events are queued directly; durable events are appended to
    /// the durable inbox and picked up by the running loop.
    pub async fn publish(&mut self, event: Event) -> Result<(), SimError> {
        let event = self.validate(event)?;
        match self.kind(&event.event_type) {
            ChannelKind::Ephemeral => {
                self.queue.push(event);
            }
            ChannelKind::Durable => {
                let value = serde_json::to_value(&event).map_err(StoreError::from)?;
                let key = self.store.push(&self.inbox_path(), value).await?;
                self.published.insert(key);
            }
        }
        Ok(())
    }

    /// Register a consumer for a channel
    pub async fn watch(&mut self, channel: &str, handler: SharedHandler) -> Result<(), SimError> {
        if self.kind(channel) == ChannelKind::Durable && !self.subscriptions.contains_key(channel) {
            let path = child_path(&self.events_path, channel);
            let stream = self.store.watch_children(&path, Replay::None).await?;
            self.subscriptions.insert(channel.to_string(), stream);
        }
        self.handlers
            .entry(channel.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }

    /// Remove every consumer registered for a channel
    ///
    /// Registrations are tracked per channel name, not per handler, so this
    /// also drops consumers registered by other owners.
    pub fn unwatch(&mut self, channel: &str) {
        self.handlers.remove(channel);
        if let Some(stream) = self.subscriptions.remove(channel) {
            stream.close();
        }
    }

    /// Drop all consumers
    pub fn unwatch_all(&mut self) {
        let channels: Vec<String> = self.handlers.keys().cloned().collect();
        for channel in channels {
            self.unwatch(&channel);
        }
    }

    /// Run until the queue is empty and no inbox arrivals are pending
    pub async fn run_loop(&mut self) -> Result<u64, SimError> {
        tracing::info!(sim_id = %self.sim_id, queued = self.queue.len(), "Starting event loop");
        self.started = true;
        self.inbox = Some(
            self.store
                .watch_children(&self.inbox_path(), Replay::All)
                .await?,
        );

        let result = self.drain().await;

        if let Some(inbox) = self.inbox.take() {
            inbox.close();
        }
        set_gauge(GaugeMetric::QueueDepth, self.queue.len() as f64);
        result.map(|()| self.delivered)
    }

    async fn drain(&mut self) -> Result<(), SimError> {
        loop {
            self.collect_inbox();
            let Some(event) = self.queue.pop() else {
                return Ok(());
            };
            self.deliver(event).await?;
            self.delivered += 1;
            increment(CounterMetric::EventsDelivered);
        }
    }

    /// Move inbox arrivals into the queue; malformed entries are skipped
    fn collect_inbox(&mut self) {
        let mut arrivals = vec![];
        if let Some(inbox) = self.inbox.as_mut() {
            while let Some(child) = inbox.try_recv() {
                arrivals.push(child);
            }
        }

        for child in arrivals {
            let parsed = serde_json::from_value::<Event>(child.value)
                .map_err(|e| SimError::Validation(e.to_string()));
            // Our own writes were validated by `publish` and hold their counter
            let result = match parsed {
                Ok(event) if self.published.remove(&child.key) => {
                    self.queue.push(event);
                    Ok(())
                }
                parsed => parsed.and_then(|event| self.enqueue(event)),
            };
            if let Err(e) = result {
                tracing::warn!(sim_id = %self.sim_id, key = %child.key, error = %e, "Dropping inbox entry");
            }
        }
    }

    async fn deliver(&mut self, event: Event) -> Result<(), SimError> {
        let event_key = event.event_key();

        match self.kind(&event.event_type) {
            ChannelKind::Ephemeral => self.dispatch(&event).await?,
            ChannelKind::Durable => {
                let delivered = match self.options.delivery_timeout {
                    None => self.deliver_durable(&event, &event_key).await?,
                    Some(limit) => {
                        let path = child_path(&self.events_path, &event.event_type);
                        tokio::time::timeout(limit, self.deliver_durable(&event, &event_key))
                            .await
                            .map_err(|_| SimError::Delivery {
                                event_key: event_key.clone(),
                                source: StoreError::Timeout(path),
                            })??
                    }
                };
                if let Some(delivered) = delivered {
                    self.dispatch(&delivered).await?;
                }
            }
        }

        tracing::debug!(sim_id = %self.sim_id, event_key = %event_key, "Event processed");
        Ok(())
    }

    /// Persist an event and wait for its append notification
    ///
    /// Returns the event as read back from the store, or `None` when the
    /// channel has no consumers.
    async fn deliver_durable(
        &mut self,
        event: &Event,
        event_key: &str,
    ) -> Result<Option<Event>, SimError> {
        let delivery_error = |source: StoreError| SimError::Delivery {
            event_key: event_key.to_string(),
            source,
        };

        let path = child_path(&self.events_path, &event.event_type);
        let value = serde_json::to_value(event).map_err(|e| delivery_error(e.into()))?;
        let key = self.store.push(&path, value).await.map_err(delivery_error)?;

        let Some(stream) = self.subscriptions.get_mut(&event.event_type) else {
            return Ok(None);
        };
        loop {
            let Some(child) = stream.recv().await else {
                return Err(delivery_error(StoreError::StreamClosed(path)));
            };
            if child.key == key {
                let stored = serde_json::from_value(child.value)
                    .map_err(|e| delivery_error(e.into()))?;
                return Ok(Some(stored));
            }
            tracing::warn!(channel = %event.event_type, key = %child.key, "Skipping append not written by the bus");
        }
    }

    /// Invoke every consumer of the event's channel, in registration order
    async fn dispatch(&mut self, event: &Event) -> Result<(), SimError> {
        let handlers = self
            .handlers
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            let emitted = {
                let mut handler = handler.lock().await;
                handler.on_event(event).await?
            };
            for next in emitted {
                self.publish(next).await?;
            }
        }
        Ok(())
    }
}
