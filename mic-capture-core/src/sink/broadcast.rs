use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::models::frame::AudioFrame;

/// Action name carried by every audio frame event.
pub const AUDIO_DATA_EVENT: &str = "AudioRecordData";

/// Queue depth given to each subscriber.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// A notification on the in-process bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub action: String,
    /// Application the event is addressed to.
    pub package: String,
    /// Base64 (standard alphabet, no line wrapping) of the frame bytes.
    pub data: String,
}

impl BroadcastEvent {
    pub fn decode_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

struct Subscriber {
    action: String,
    sender: Sender<BroadcastEvent>,
}

struct BusInner {
    package: String,
    subscribers: Mutex<Vec<Subscriber>>,
    dropped: AtomicU64,
}

/// In-process notification bus owned by a single application.
///
/// Events addressed to another package are never delivered. Sending never
/// blocks: a subscriber whose queue is full misses the event, and
/// subscribers whose receiver was dropped are pruned. Clones share the bus.
#[derive(Clone)]
pub struct LocalBroadcaster {
    inner: Arc<BusInner>,
}

impl LocalBroadcaster {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                package: package.into(),
                subscribers: Mutex::new(Vec::new()),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn package(&self) -> &str {
        &self.inner.package
    }

    pub fn subscribe(&self, action: &str) -> Receiver<BroadcastEvent> {
        self.subscribe_with_capacity(action, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn subscribe_with_capacity(&self, action: &str, capacity: usize) -> Receiver<BroadcastEvent> {
        let (sender, receiver) = bounded(capacity.max(1));
        self.inner.subscribers.lock().push(Subscriber {
            action: action.to_string(),
            sender,
        });
        receiver
    }

    /// Deliver `event` to every live subscriber of its action.
    ///
    /// Returns how many subscribers accepted it. Zero receivers is not an error.
    pub fn send(&self, event: &BroadcastEvent) -> usize {
        if event.package != self.inner.package {
            log::warn!(
                "Refusing broadcast for package '{}' on bus owned by '{}'",
                event.package,
                self.inner.package
            );
            return 0;
        }

        let mut accepted = 0;
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|sub| {
            if sub.action != event.action {
                return true;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => {
                    accepted += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
        accepted
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Events lost to full subscriber queues.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for LocalBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBroadcaster")
            .field("package", &self.inner.package)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Publishes each frame as an `AUDIO_DATA_EVENT` on the owning app's bus.
/// Fire-and-forget: delivery never fails the pipeline.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    bus: LocalBroadcaster,
    events_sent: u64,
}

impl BroadcastSink {
    pub fn new(bus: LocalBroadcaster) -> Self {
        Self { bus, events_sent: 0 }
    }

    pub fn deliver(&mut self, frame: AudioFrame) {
        let event = BroadcastEvent {
            action: AUDIO_DATA_EVENT.to_string(),
            package: self.bus.package().to_string(),
            data: STANDARD.encode(&frame.data),
        };
        let receivers = self.bus.send(&event);
        if receivers == 0 {
            log::trace!("Frame {} broadcast with no receiver", frame.sequence);
        }
        self.events_sent += 1;
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }
}
