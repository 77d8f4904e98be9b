//! The vehicle detector: a single-threaded client engine that maintains one
//! connection to the signal controller, replies to heartbeats, and uploads
//! simulated traffic data on the cadences of §4.7 / §4.5.

use std::io::{self, ErrorKind, Read};
use std::net::SocketAddr;
use std::time::Instant;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use crate::error::LinkResult;
use crate::packet::{frame, DataTable, DeviceId, ObjectId, Operation};
use crate::primitives::demo_data::{
    detector_status_payload, realtime_payload, statistics_payload, DemoRng,
};
use crate::reassembler::Reassembler;

use super::classify::{classify, Message};
use super::types::{
    ConnectionState, CONNECT_RETRY, DETECTOR_STATUS_INTERVAL, HEARTBEAT_TIMEOUT, POLL_TIMEOUT,
    REALTIME_INTERVAL, STATISTICS_INTERVAL,
};
use super::write_all_non_blocking;

const STREAM_TOKEN: Token = Token(0);

/// The detector's single connection to the controller, plus the upload
/// timers that fire while it's established.
pub struct Detector {
    poll: Poll,
    events: Events,
    server_addr: SocketAddr,
    identity: DeviceId,
    server_id: DeviceId,
    rng: DemoRng,

    stream: Option<TcpStream>,
    state: ConnectionState,
    handshake_sent: bool,
    rx: Reassembler,

    last_connect_attempt_at: Instant,
    last_heartbeat_at: Instant,
    last_realtime_upload_at: Instant,
    last_statistics_upload_at: Instant,
    last_detector_status_upload_at: Instant,
}

impl Detector {
    pub fn new(server_addr: SocketAddr, identity: DeviceId) -> io::Result<Self> {
        let now = Instant::now();
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(128),
            server_addr,
            identity,
            server_id: DeviceId::zeroed(),
            rng: DemoRng::new(identity.device_id as u64 ^ 0x2545_F491_4F6C_DD1D),
            stream: None,
            state: ConnectionState::Disconnected,
            handshake_sent: false,
            rx: Reassembler::new(),
            last_connect_attempt_at: now - CONNECT_RETRY,
            last_heartbeat_at: now,
            last_realtime_upload_at: now,
            last_statistics_upload_at: now,
            last_detector_status_upload_at: now - DETECTOR_STATUS_INTERVAL / 2,
        })
    }

    pub fn run(&mut self, shutdown: &std::sync::atomic::AtomicBool) -> io::Result<()> {
        while !crate::shutdown::should_stop(shutdown) {
            if self.state == ConnectionState::Disconnected {
                self.maybe_connect();
            }

            self.poll.poll(&mut self.events, Some(POLL_TIMEOUT))?;
            let fired = self.events.iter().any(|e| e.token() == STREAM_TOKEN);
            if fired {
                if self.state == ConnectionState::Connecting {
                    self.finish_connect();
                }
                if self.state != ConnectionState::Disconnected {
                    self.service();
                }
            }

            if self.state != ConnectionState::Disconnected {
                self.check_heartbeat_timeout();
            }
            if self.state == ConnectionState::Established {
                self.run_upload_timers();
            }
        }

        self.stream = None;
        Ok(())
    }

    /// Kicks off a non-blocking connect. `mio`'s connect returns before the
    /// three-way handshake completes; the stream is only usable once the
    /// writable readiness event fires, checked in [`finish_connect`].
    fn maybe_connect(&mut self) {
        if self.last_connect_attempt_at.elapsed() < CONNECT_RETRY {
            return;
        }
        self.last_connect_attempt_at = Instant::now();

        match TcpStream::connect(self.server_addr) {
            Ok(mut stream) => {
                if let Err(e) =
                    self.poll
                        .registry()
                        .register(&mut stream, STREAM_TOKEN, Interest::READABLE | Interest::WRITABLE)
                {
                    warn!(error = %e, "failed to register stream");
                    return;
                }
                self.stream = Some(stream);
                self.state = ConnectionState::Connecting;
                self.handshake_sent = false;
                self.rx = Reassembler::new();
                self.last_heartbeat_at = Instant::now();
                info!(addr = %self.server_addr, "connecting");
            }
            Err(e) => {
                debug!(error = %e, "connect failed, will retry");
            }
        }
    }

    /// First readiness event after a non-blocking connect: confirm it
    /// actually succeeded (`take_error`) before trusting the socket, then
    /// send the handshake exactly once.
    fn finish_connect(&mut self) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        match stream.take_error() {
            Ok(None) => {}
            Ok(Some(e)) | Err(e) => {
                debug!(error = %e, "connect failed, will retry");
                self.teardown();
                return;
            }
        }

        if !self.handshake_sent {
            self.handshake_sent = true;
            self.last_heartbeat_at = Instant::now();
            if let Err(e) = self.send_handshake() {
                warn!(error = %e, "failed to send handshake, will retry");
                self.teardown();
            }
        }
    }

    fn send_handshake(&mut self) -> io::Result<()> {
        self.send(Operation::SetReq, ObjectId::COMMUNICATION, Vec::new())
    }

    fn service(&mut self) {
        let mut collected: Vec<LinkResult<DataTable>> = Vec::new();
        let mut dead = false;
        {
            let Some(stream) = self.stream.as_mut() else {
                return;
            };
            let mut buf = [0u8; 2048];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => {
                        info!("server closed connection");
                        dead = true;
                        break;
                    }
                    Ok(n) => collected.extend(self.rx.feed(&buf[..n])),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!(error = %e, "read failed");
                        dead = true;
                        break;
                    }
                }
            }
        }

        if dead {
            self.teardown();
            return;
        }

        for result in collected {
            if self.handle_frame(result).is_err() {
                self.teardown();
                return;
            }
        }
    }

    fn handle_frame(&mut self, result: LinkResult<DataTable>) -> io::Result<()> {
        let dt = match result {
            Ok(dt) => dt,
            Err(e) => {
                debug!(error = %e, "frame decode failed");
                return Ok(());
            }
        };

        let message = classify(&dt);
        if matches!(
            message,
            Message::HandshakeAck | Message::HeartbeatQuery | Message::HeartbeatResponse
        ) {
            self.last_heartbeat_at = Instant::now();
        }

        match message {
            Message::HandshakeAck => {
                self.server_id = dt.sender;
                self.state = ConnectionState::Established;
                info!("handshake acknowledged, session established");
            }
            Message::HeartbeatQuery => {
                self.send(Operation::QueryResp, ObjectId::COMMUNICATION, Vec::new())?;
            }
            Message::StatisticsAck | Message::DetectorStatusAck => {
                debug!("upload acknowledged");
            }
            Message::ErrorReport(code) => {
                warn!(code, "controller reported an error");
            }
            Message::Unknown { operation, object_id } => {
                debug!(operation, object_id, "ignoring unrecognized message");
            }
            Message::HeartbeatResponse
            | Message::RealtimeUpload(_)
            | Message::StatisticsUpload(_)
            | Message::DetectorStatusUpload(_) => {
                debug!("ignoring controller-originated-only message shape");
            }
        }
        Ok(())
    }

    fn check_heartbeat_timeout(&mut self) {
        if self.last_heartbeat_at.elapsed() >= HEARTBEAT_TIMEOUT {
            warn!("heartbeat timeout, reconnecting");
            self.teardown();
        }
    }

    fn run_upload_timers(&mut self) {
        if self.last_realtime_upload_at.elapsed() >= REALTIME_INTERVAL {
            self.last_realtime_upload_at = Instant::now();
            let payload = realtime_payload(&mut self.rng);
            if let Err(e) = self.send(Operation::Upload, ObjectId::TRAFFIC_REALTIME, payload) {
                warn!(error = %e, "realtime upload failed, dropping this sample");
            }
        }
        if self.last_statistics_upload_at.elapsed() >= STATISTICS_INTERVAL {
            self.last_statistics_upload_at = Instant::now();
            let payload = statistics_payload(&mut self.rng);
            if let Err(e) = self.send(Operation::Upload, ObjectId::TRAFFIC_STATS, payload) {
                warn!(error = %e, "statistics upload failed");
            }
        }
        if self.last_detector_status_upload_at.elapsed() >= DETECTOR_STATUS_INTERVAL {
            self.last_detector_status_upload_at = Instant::now();
            let payload = detector_status_payload(&mut self.rng);
            if let Err(e) = self.send(Operation::Upload, ObjectId::DETECTOR_STATUS, payload) {
                warn!(error = %e, "detector status upload failed");
            }
        }
    }

    /// Sends a frame to the server. A `WouldBlock` mid-send is logged and
    /// swallowed rather than returned: the send buffer being momentarily
    /// full is not a reason to tear down an otherwise-healthy connection.
    /// Any other I/O error is genuine and propagates to the caller, which
    /// does tear the connection down.
    fn send(&mut self, operation: Operation, object_id: ObjectId, content: Vec<u8>) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(ErrorKind::NotConnected, "no active connection"));
        };
        let dt = DataTable::new(self.identity, self.server_id, operation, object_id, content)
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e.to_string()))?;
        let wire = frame::encode(&dt).map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))?;
        match write_all_non_blocking(stream, &wire) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                warn!("send buffer full, dropping this frame");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn teardown(&mut self) {
        self.stream = None;
        self.state = ConnectionState::Disconnected;
        self.handshake_sent = false;
    }
}
