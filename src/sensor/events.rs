//! Events delivered to sensing subscribers

use crossbeam_channel::Sender;
use uuid::Uuid;

use crate::scene::entity::EntitySnapshot;

/// Result of one sensing evaluation
///
/// Exactly one of these is emitted per due interval of a repeating query
/// and per one-shot call. `Detected` never carries an empty list.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    Detected {
        npc_id: Uuid,
        /// Hits ordered by ascending distance from the sense origin
        detected: Vec<EntitySnapshot>,
    },
    NoneDetected {
        npc_id: Uuid,
    },
}

impl SensorEvent {
    pub fn npc_id(&self) -> Uuid {
        match self {
            SensorEvent::Detected { npc_id, .. } => *npc_id,
            SensorEvent::NoneDetected { npc_id } => *npc_id,
        }
    }
}

/// Destination for sensor events, implemented by the script host
///
/// `post` is called from the scheduler thread, the caller's thread
/// (one-shots), or the ingestion worker's panic-contained section; it must
/// not block for long.
pub trait EventSink: Send + Sync {
    fn post(&self, event: SensorEvent);
}

/// Sink that forwards events into a channel
///
/// Convenient for hosts that drain events on their own dispatch thread. A
/// full or disconnected channel drops the event rather than blocking the
/// scheduler.
pub struct ChannelSink {
    sender: Sender<SensorEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<SensorEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn post(&self, event: SensorEvent) {
        if let Err(e) = self.sender.try_send(event) {
            tracing::debug!("dropping sensor event: {}", e);
        }
    }
}
