//! Typed, topic-based publish/subscribe bus between the fleet bridge and
//! the outside transport.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others. Delivery is best-effort: a slow subscriber is lagged past,
//! never waited for, and nothing is retained for subscribers that attach
//! late. Callers that need at-least-once semantics build them on top (the
//! reconciler's retransmission-on-mismatch protocol does exactly that).
//!
//! # Topics
//!
//! | Topic | Direction | Typical traffic |
//! |---|---|---|
//! | [`Topic::StateReports`] | inbound | continuous robot telemetry |
//! | [`Topic::GpsFixes`] | inbound | raw geodetic fixes (GPS fleets only) |
//! | [`Topic::DockSummaries`] | inbound | named docking paths, per fleet |
//! | [`Topic::PathRequests`] | outbound | navigation / activity / stop commands |
//! | [`Topic::ModeRequests`] | outbound | operating-mode switches |
//! | [`Topic::ActionNotices`] | outbound | "action execution finished" notices |

use fleetlink_types::{BusEvent, FleetError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default per-topic channel capacity (number of buffered events before old
/// ones are dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing lanes on the fleet bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Continuous per-robot telemetry, unbounded rate.
    StateReports,
    /// Raw GPS fixes keyed by robot id; active only for geodetic fleets.
    GpsFixes,
    /// Named docking paths announced by the dock side channel.
    DockSummaries,
    /// Outbound path commands (navigate, run-activity, stop).
    PathRequests,
    /// Outbound operating-mode commands.
    ModeRequests,
    /// Outbound notices that an out-of-band action finished.
    ActionNotices,
}

/// Shared fleet bus. Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct FleetBus {
    state_reports: broadcast::Sender<BusEvent>,
    gps_fixes: broadcast::Sender<BusEvent>,
    dock_summaries: broadcast::Sender<BusEvent>,
    path_requests: broadcast::Sender<BusEvent>,
    mode_requests: broadcast::Sender<BusEvent>,
    action_notices: broadcast::Sender<BusEvent>,
}

impl FleetBus {
    /// Create a new bus; `capacity` is applied to every lane independently.
    pub fn new(capacity: usize) -> Self {
        let (state_reports, _) = broadcast::channel(capacity);
        let (gps_fixes, _) = broadcast::channel(capacity);
        let (dock_summaries, _) = broadcast::channel(capacity);
        let (path_requests, _) = broadcast::channel(capacity);
        let (mode_requests, _) = broadcast::channel(capacity);
        let (action_notices, _) = broadcast::channel(capacity);
        Self {
            state_reports,
            gps_fixes,
            dock_summaries,
            path_requests,
            mode_requests,
            action_notices,
        }
    }

    /// Publish `event` to the given [`Topic`] lane.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// A lane with no subscribers yields [`FleetError::Channel`]; callers on
    /// the fire-and-forget outbound path treat that as "accepted but nobody
    /// listening yet" and log rather than propagate.
    pub fn publish_to(&self, topic: Topic, event: BusEvent) -> Result<usize, FleetError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| FleetError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    /// Subscribe to a single [`Topic`] lane.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<BusEvent> {
        match topic {
            Topic::StateReports => &self.state_reports,
            Topic::GpsFixes => &self.gps_fixes,
            Topic::DockSummaries => &self.dock_summaries,
            Topic::PathRequests => &self.path_requests,
            Topic::ModeRequests => &self.mode_requests,
            Topic::ActionNotices => &self.action_notices,
        }
    }
}

impl Default for FleetBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] lane.
///
/// Obtained via [`FleetBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<BusEvent>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Lag is reported once and skipped over: losing state reports is
    /// acceptable because the next report supersedes the dropped ones.
    /// Returns `None` when the bus has shut down.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "bus subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
