//! The delivery scheduler.

use mxmail_mime::MessageBuilder;
use mxmail_smtp::{Connector, Envelope, SessionConfig, SessionReport, TcpConnector, deliver};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::MailerConfig;
use crate::event::DeliveryEvent;
use crate::queue::{DeliveryQueue, EntryId, QueueEntry, RetryPolicy};
use crate::resolver::{HickoryLookup, MxLookup, MxResolver};
use crate::Result;

/// Capacity of the delivery event channel.
const EVENT_CAPACITY: usize = 256;

/// Owns the delivery queue and services it on a fixed tick.
///
/// At most one delivery attempt runs at a time: a tick claims the first
/// eligible entry, runs one SMTP session for it and records the outcome.
pub struct Mailer<L = HickoryLookup, C = TcpConnector> {
    config: MailerConfig,
    session: SessionConfig,
    policy: RetryPolicy,
    queue: DeliveryQueue,
    resolver: MxResolver<L>,
    connector: C,
    events: broadcast::Sender<DeliveryEvent>,
    in_flight: Mutex<()>,
}

impl Mailer {
    /// Creates a mailer that resolves with the system DNS configuration and
    /// connects over TCP.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid (for example, no
    /// hostname) or the system resolver cannot be set up.
    pub fn new(config: MailerConfig) -> Result<Self> {
        config.validate()?;
        let lookup = HickoryLookup::from_system_conf()?;
        Self::with_parts(config, lookup, TcpConnector)
    }
}

impl<L: MxLookup, C: Connector> Mailer<L, C> {
    /// Creates a mailer from explicit lookup and connector implementations.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_parts(config: MailerConfig, lookup: L, connector: C) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            session: config.session_config(),
            policy: config.retry_policy(),
            config,
            queue: DeliveryQueue::new(),
            resolver: MxResolver::new(lookup),
            connector,
            events,
            in_flight: Mutex::new(()),
        })
    }

    /// Queues a message for delivery and returns immediately.
    ///
    /// Never fails: malformed addresses are reported by the attempt that
    /// tries to use them.
    pub fn send_mail(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        subject: Option<&str>,
        text: Option<&str>,
    ) -> EntryId {
        self.queue.enqueue(
            from,
            to,
            subject.map(str::to_string),
            text.map(str::to_string),
        )
    }

    /// Returns the delivery queue.
    pub const fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Returns the retry policy in effect.
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Subscribes to delivery outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.events.subscribe()
    }

    /// Runs one scheduler tick.
    ///
    /// Returns the outcome of the attempt made, or `None` if nothing was
    /// eligible or another tick is still running.
    pub async fn tick(&self) -> Option<DeliveryEvent> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("previous tick still running");
            return None;
        };

        let entry = self.queue.claim_next(&self.policy, Instant::now())?;
        let span = info_span!("delivery", id = %entry.id, to = %entry.to);
        let event = self.attempt(entry).instrument(span).await;
        if self.events.send(event.clone()).is_err() {
            debug!("no delivery event subscribers");
        }
        Some(event)
    }

    /// Drives the scheduler until `shutdown` turns true or its sender is
    /// dropped.
    ///
    /// An attempt in progress when shutdown is requested runs to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick to avoid immediate execution
        ticker.tick().await;

        info!(
            tick_ms = self.config.tick_interval_ms,
            retry_limit = self.policy.retry_limit,
            "delivery scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(queued = self.queue.len(), "delivery scheduler stopped");
    }

    async fn attempt(&self, entry: QueueEntry) -> DeliveryEvent {
        info!(attempt = entry.attempts, "delivery attempt started");

        match self.deliver_entry(&entry).await {
            Ok(report) => {
                self.queue.complete(entry.id);
                info!(host = %report.host, secured = report.secured, "delivered");
                DeliveryEvent::Delivered {
                    id: entry.id,
                    host: report.host,
                    secured: report.secured,
                }
            }
            Err(err) if self.policy.should_retry(entry.attempts) => {
                warn!(
                    attempt = entry.attempts,
                    remaining = self.policy.remaining_attempts(entry.attempts),
                    permanent = err.is_permanent(),
                    error = %err,
                    "delivery attempt failed"
                );
                DeliveryEvent::AttemptFailed {
                    id: entry.id,
                    attempt: entry.attempts,
                    error: err.to_string(),
                }
            }
            Err(err) => {
                warn!(
                    attempts = entry.attempts,
                    permanent = err.is_permanent(),
                    error = %err,
                    "delivery attempts exhausted, message stays queued"
                );
                DeliveryEvent::Exhausted {
                    id: entry.id,
                    attempts: entry.attempts,
                    error: err.to_string(),
                }
            }
        }
    }

    async fn deliver_entry(&self, entry: &QueueEntry) -> Result<SessionReport> {
        let envelope = Envelope::new(&entry.from, &entry.to)?;
        let host = self.resolver.resolve(envelope.to().domain()).await;

        let mut builder = MessageBuilder::new(entry.from.as_str(), entry.to.as_str());
        if let Some(subject) = &entry.subject {
            builder = builder.subject(subject.as_str());
        }
        if let Some(text) = &entry.text {
            builder = builder.text(text.as_str());
        }
        let message = builder.build()?;

        let report = deliver(
            &self.connector,
            &host,
            &self.session,
            &envelope,
            &message.to_string(),
        )
        .await?;
        Ok(report)
    }
}
