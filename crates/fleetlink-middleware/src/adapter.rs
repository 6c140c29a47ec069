//! The transport adapter seam.
//!
//! The fleet bridge never speaks a wire protocol directly. It publishes to
//! its internal [`FleetBus`][crate::bus::FleetBus]; a [`FleetTransport`]
//! implementation translates bus traffic into whatever the deployment
//! actually uses (DDS, MQTT, a simulator socket, ...) and feeds inbound
//! telemetry back. Delivery and ordering guarantees are whatever the chosen
//! transport documents — the bridge assumes none.

use std::sync::Arc;

use async_trait::async_trait;
use fleetlink_types::{BusEvent, BusPayload, FleetError, ModeRequest, PathRequest};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::{FleetBus, Topic};

/// Every external-transport adapter must implement this trait.
///
/// Sends are fire-and-forget: `Ok(())` means "accepted for transmission",
/// never "received by the robot".
#[async_trait]
pub trait FleetTransport: Send + Sync {
    /// Transmit a path command to the robot fleet.
    async fn send_path_request(&self, request: PathRequest) -> Result<(), FleetError>;

    /// Transmit an operating-mode command to the robot fleet.
    async fn send_mode_request(&self, request: ModeRequest) -> Result<(), FleetError>;

    /// Announce that an out-of-band action finished, on the dedicated
    /// notice channel.
    async fn send_action_notice(&self, notice: ModeRequest) -> Result<(), FleetError>;

    /// Live stream of inbound traffic: state reports, dock summaries and
    /// (for geodetic fleets) raw GPS fixes.
    async fn inbound_stream(&self) -> BoxStream<'static, BusEvent>;
}

/// Wire a [`FleetTransport`] to the bus.
///
/// Spawns one pump per direction and returns their join handles; dropping
/// the bus (all senders) terminates the outbound pumps, and the transport
/// ending its inbound stream terminates the inbound pump. Send failures are
/// logged and skipped — the retransmission protocol upstream is the only
/// recovery mechanism, by design.
pub fn bind_transport(bus: &FleetBus, transport: Arc<dyn FleetTransport>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // Outbound: path commands.
    let mut path_rx = bus.subscribe_to(Topic::PathRequests);
    let t = Arc::clone(&transport);
    handles.push(tokio::spawn(async move {
        while let Some(event) = path_rx.recv().await {
            if let BusPayload::PathRequest(request) = event.payload {
                if let Err(e) = t.send_path_request(request).await {
                    warn!(error = %e, "path request dropped by transport");
                }
            }
        }
    }));

    // Outbound: mode commands.
    let mut mode_rx = bus.subscribe_to(Topic::ModeRequests);
    let t = Arc::clone(&transport);
    handles.push(tokio::spawn(async move {
        while let Some(event) = mode_rx.recv().await {
            if let BusPayload::ModeRequest(request) = event.payload {
                if let Err(e) = t.send_mode_request(request).await {
                    warn!(error = %e, "mode request dropped by transport");
                }
            }
        }
    }));

    // Outbound: action-finished notices.
    let mut notice_rx = bus.subscribe_to(Topic::ActionNotices);
    let t = Arc::clone(&transport);
    handles.push(tokio::spawn(async move {
        while let Some(event) = notice_rx.recv().await {
            if let BusPayload::ActionNotice(notice) = event.payload {
                if let Err(e) = t.send_action_notice(notice).await {
                    warn!(error = %e, "action notice dropped by transport");
                }
            }
        }
    }));

    // Inbound: classify transport traffic onto the matching lane.
    let bus = bus.clone();
    handles.push(tokio::spawn(async move {
        let mut inbound = transport.inbound_stream().await;
        while let Some(event) = inbound.next().await {
            let topic = match &event.payload {
                BusPayload::StateReport(_) => Topic::StateReports,
                BusPayload::DockSummary(_) => Topic::DockSummaries,
                BusPayload::GpsFix { .. } => Topic::GpsFixes,
                other => {
                    debug!(payload = ?other, "ignoring outbound payload on inbound stream");
                    continue;
                }
            };
            if let Err(e) = bus.publish_to(topic, event) {
                debug!(error = %e, "inbound event had no subscribers");
            }
        }
    }));

    handles
}
