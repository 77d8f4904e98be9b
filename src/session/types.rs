//! Shared timing constants and the connection-state machine both endpoints
//! step through. See [`super::classify`] for what a decoded frame means and
//! [`super::server`]/[`super::client`] for the event loops that drive this.

use std::time::Duration;

/// Maximum concurrent sessions the server multiplexer will hold open.
pub const MAX_SESSIONS: usize = 64;

/// Per-connection receive buffer capacity, shared with [`crate::reassembler::RX_CAP`].
pub const RX_CAP: usize = crate::reassembler::RX_CAP;

/// `mio::Poll::poll` wait ceiling. Bounds how stale timer checks can get.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a disconnected client waits before attempting to reconnect.
pub const CONNECT_RETRY: Duration = Duration::from_secs(5);

/// Server-side cadence for `QUERY_REQ` heartbeats to established sessions.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// A session (or a client's view of the server) is considered dead once its
/// `last_heartbeat_at` is this old.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client-side cadence for unacknowledged `TRAFFIC_REALTIME` uploads.
pub const REALTIME_INTERVAL: Duration = Duration::from_secs(2);

/// Client-side cadence for acknowledged `TRAFFIC_STATS` uploads.
pub const STATISTICS_INTERVAL: Duration = Duration::from_secs(60);

/// Client-side cadence for `DETECTOR_STATUS` uploads. Application-policy
/// driven per the wire contract; the demo client fires it midway between
/// two statistics uploads.
pub const DETECTOR_STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// The shared connection lifecycle both the server's per-client session and
/// the client's singleton session step through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Established,
}
