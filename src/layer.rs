use crate::error::LogError;
use crate::record::{message_payload, Level as JournalLevel, Payload};
use crate::sink::LogSink;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events whose target starts with this prefix come from the journal
/// itself and are never forwarded.
const OWN_TARGET: &str = "checkout_journal";

/// Delivery attempts per batch before the remaining payloads are dropped.
const MAX_SEND_ATTEMPTS: u32 = 5;

/// `tracing_subscriber` layer that turns host events into `log_message`
/// journal payloads and forwards them to a [`LogSink`] via a bounded
/// channel and background task.
///
/// Only events at or above `min_level` are captured. File I/O is fully
/// decoupled from application threads.
pub struct JournalLayer {
    sender: mpsc::Sender<Payload>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl JournalLayer {
    /// Create a new layer and spawn a background task that pulls payloads
    /// from a bounded channel and sends them to the provided [`LogSink`].
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations. The task ends
    /// once the layer is dropped and the channel is drained.
    pub fn new(
        sink: Arc<dyn LogSink>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
        min_level: Level,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<Payload>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let backoff = Duration::from_millis(100);
            let max_backoff = Duration::from_secs(10);
            // One timer for the whole task: incoming events must not push
            // the next flush back.
            let mut flush_tick = interval(flush_interval);
            flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(payload) => {
                            batch.push(payload);
                            if batch.len() >= batch_size {
                                if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                    eprintln!("error sending journal batch: {}", e);
                                }
                            }
                        }
                        None => {
                            if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                eprintln!("error flushing journal batch: {}", e);
                            }
                            break;
                        }
                    },
                    _ = flush_tick.tick() => {
                        if !batch.is_empty() {
                            if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                eprintln!("error flushing journal batch: {}", e);
                            }
                        }
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                min_level,
                total_events,
                enqueued_events,
                dropped_events,
            },
            handle,
        )
    }
}

/// Deliver `batch` in order. Payloads are removed as they are delivered;
/// rejected ones are dropped immediately, transient failures are retried
/// with exponential backoff up to [`MAX_SEND_ATTEMPTS`].
async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<Payload>,
    mut backoff: Duration,
    max_backoff: Duration,
) -> Result<(), LogError> {
    let mut attempt = 1;
    loop {
        let mut delivered = 0;
        let mut last_err = None;
        for payload in batch.iter() {
            match sink.send(payload).await {
                Ok(()) => delivered += 1,
                Err(e) if e.is_rejection() => delivered += 1,
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }
        batch.drain(..delivered);

        match last_err {
            None => return sink.flush().await,
            Some(e) if attempt >= MAX_SEND_ATTEMPTS => {
                batch.clear();
                return Err(e);
            }
            Some(_) => {
                eprintln!("journal sink send failed, retrying in {:?}", backoff);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
                attempt += 1;
            }
        }
    }
}

fn journal_level(level: Level) -> JournalLevel {
    if level == Level::ERROR {
        JournalLevel::Error
    } else if level == Level::WARN {
        JournalLevel::Warning
    } else if level == Level::INFO {
        JournalLevel::Info
    } else {
        JournalLevel::Debug
    }
}

impl<S> Layer<S> for JournalLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.min_level || meta.target().starts_with(OWN_TARGET) {
            return;
        }

        let mut context = Payload::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut context, message: &mut message };
        event.record(&mut visitor);
        context.insert("target".into(), Value::String(meta.target().to_string()));

        let message = message.unwrap_or_else(|| meta.name().to_string());
        let payload = message_payload(&message, journal_level(*meta.level()), context);

        match self.sender.try_send(payload) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("journal channel full, dropping event");
            }
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Payload,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}
