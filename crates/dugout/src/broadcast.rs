// Fire-and-forget fan-out of draft events to live observers.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::roster::PlayerSummary;

/// Topic every draft board observer subscribes to.
pub const DRAFT_TOPIC: &str = "draft_updates";

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftEventKind {
    #[serde(rename = "pick-made")]
    PickMade,
    #[serde(rename = "pick-undone")]
    PickUndone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub id: i64,
    pub name: String,
}

/// A change to the draft board, sent to every current subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftEvent {
    #[serde(rename = "type")]
    pub kind: DraftEventKind,
    pub round: u32,
    pub pick: u32,
    /// The seated player, or the removed one for an undo. `None` when an
    /// undo found nothing to remove.
    pub player: Option<PlayerSummary>,
    pub team: TeamSummary,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Publisher seam
// ---------------------------------------------------------------------------

/// Topic-based publish/subscribe used by the draft engine.
///
/// Publishing never fails: events sent while nobody is subscribed are
/// dropped, and subscribers only see events published after they joined.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, event: DraftEvent);
    fn subscribe(&self, topic: &str) -> Subscription;
}

/// A live feed of events on one topic.
pub struct Subscription {
    topic: String,
    rx: broadcast::Receiver<DraftEvent>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event. Returns `None` once the hub is gone.
    ///
    /// A subscriber that falls further behind than the channel capacity
    /// skips the lost events and keeps going.
    pub async fn recv(&mut self) -> Option<DraftEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Subscriber on {} lagged, skipped {missed} events", self.topic);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-published event without waiting.
    pub fn try_next(&mut self) -> Option<DraftEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("Subscriber on {} lagged, skipped {missed} events", self.topic);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// In-process [`Publisher`] with one tokio broadcast channel per topic.
pub struct BroadcastHub {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<DraftEvent>>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        BroadcastHub {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<DraftEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Current number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).map_or(0, |tx| tx.receiver_count())
    }
}

impl Publisher for BroadcastHub {
    fn publish(&self, topic: &str, event: DraftEvent) {
        match self.sender(topic).send(event) {
            Ok(receivers) => debug!("Published to {topic} ({receivers} subscribers)"),
            Err(_) => debug!("No subscribers on {topic}, event dropped"),
        }
    }

    fn subscribe(&self, topic: &str) -> Subscription {
        Subscription {
            topic: topic.to_string(),
            rx: self.sender(topic).subscribe(),
        }
    }
}
