//! The signal controller: a single-threaded readiness loop that accepts
//! vehicle detector connections, reassembles their frames, and drives the
//! shared session state machine from the server side (§4.6 of the wire
//! contract).

use std::io::{self, ErrorKind, Read};
use std::net::SocketAddr;
use std::time::Instant;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use crate::error::LinkResult;
use crate::packet::{frame, DataTable, DeviceId, ObjectId, Operation};
use crate::reassembler::Reassembler;

use super::classify::{classify, error_code_for, validate_session_fields, Message};
use super::types::{
    ConnectionState, HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT, MAX_SESSIONS, POLL_TIMEOUT,
};
use super::write_all_non_blocking;

const LISTENER_TOKEN: Token = Token(0);
const READ_BUF_LEN: usize = 2048;

struct ClientSession {
    stream: TcpStream,
    peer_addr: SocketAddr,
    peer_id: Option<DeviceId>,
    state: ConnectionState,
    last_heartbeat_at: Instant,
    rx: Reassembler,
}

/// The signal controller's event loop and session table.
pub struct Controller {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    identity: DeviceId,
    sessions: Vec<Option<ClientSession>>,
    last_heartbeat_sweep: Instant,
}

impl Controller {
    pub fn bind(addr: SocketAddr, identity: DeviceId) -> io::Result<Self> {
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        let mut sessions = Vec::with_capacity(MAX_SESSIONS);
        sessions.resize_with(MAX_SESSIONS, || None);

        Ok(Self {
            poll,
            events: Events::with_capacity(1024),
            listener,
            identity,
            sessions,
            last_heartbeat_sweep: Instant::now(),
        })
    }

    /// Runs the loop until `shutdown` is set. Every iteration waits at most
    /// [`POLL_TIMEOUT`] for readiness, so the flag is checked at least once
    /// a second even under no traffic.
    pub fn run(&mut self, shutdown: &std::sync::atomic::AtomicBool) -> io::Result<()> {
        while !crate::shutdown::should_stop(shutdown) {
            self.poll.poll(&mut self.events, Some(POLL_TIMEOUT))?;

            let tokens: Vec<Token> = self.events.iter().map(|e| e.token()).collect();
            for token in tokens {
                if token == LISTENER_TOKEN {
                    self.accept_all();
                } else {
                    self.service(token);
                }
            }

            self.sweep_heartbeats();
        }

        self.sessions.iter_mut().for_each(|s| *s = None);
        Ok(())
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer_addr)) => {
                    let Some(index) = self.sessions.iter().position(Option::is_none) else {
                        warn!(%peer_addr, "session table full, rejecting connection");
                        drop(stream);
                        continue;
                    };
                    let token = Token(index + 1);
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!(%peer_addr, error = %e, "failed to register accepted socket");
                        continue;
                    }
                    info!(%peer_addr, "accepted connection");
                    self.sessions[index] = Some(ClientSession {
                        stream,
                        peer_addr,
                        peer_id: None,
                        state: ConnectionState::Connecting,
                        last_heartbeat_at: Instant::now(),
                        rx: Reassembler::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn service(&mut self, token: Token) {
        let index = token.0 - 1;

        let mut collected: Vec<LinkResult<DataTable>> = Vec::new();
        let mut dead = false;
        {
            let Some(session) = self.sessions.get_mut(index).and_then(Option::as_mut) else {
                return;
            };
            let mut buf = [0u8; READ_BUF_LEN];
            loop {
                match session.stream.read(&mut buf) {
                    Ok(0) => {
                        info!(peer = %session.peer_addr, "peer closed connection");
                        dead = true;
                        break;
                    }
                    Ok(n) => collected.extend(session.rx.feed(&buf[..n])),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!(error = %e, "read failed, dropping session");
                        dead = true;
                        break;
                    }
                }
            }
        }

        if dead {
            self.sessions[index] = None;
            return;
        }

        for result in collected {
            if self.handle_frame(index, result).is_err() {
                self.sessions[index] = None;
                return;
            }
        }
    }

    fn handle_frame(&mut self, index: usize, result: LinkResult<DataTable>) -> io::Result<()> {
        let dt = match result {
            Ok(dt) => dt,
            Err(e) => {
                debug!(error = %e, "frame decode failed");
                let code = error_code_for(&e);
                return self.reply_error(index, code);
            }
        };

        if let Err(code) = validate_session_fields(&dt) {
            return self.reply_error(index, code);
        }

        let message = classify(&dt);
        let touches_heartbeat = matches!(
            message,
            Message::Handshake
                | Message::HandshakeAck
                | Message::HeartbeatQuery
                | Message::HeartbeatResponse
        );

        {
            let session = self.sessions[index].as_mut().unwrap();
            if touches_heartbeat {
                session.last_heartbeat_at = Instant::now();
            }
            if matches!(message, Message::Handshake) {
                session.peer_id = Some(dt.sender);
                session.state = ConnectionState::Established;
                info!(peer = %session.peer_addr, "handshake complete");
            }
        }

        match message {
            Message::Handshake => {
                self.reply(index, Operation::SetResp, ObjectId::COMMUNICATION, Vec::new())?;
            }
            Message::HeartbeatResponse => {
                debug!(index, "heartbeat ok");
            }
            Message::StatisticsUpload(_) => {
                self.reply(index, Operation::UploadResp, ObjectId::TRAFFIC_STATS, Vec::new())?;
            }
            Message::DetectorStatusUpload(_) => {
                self.reply(
                    index,
                    Operation::UploadResp,
                    ObjectId::DETECTOR_STATUS,
                    Vec::new(),
                )?;
            }
            Message::RealtimeUpload(_) => {
                // no acknowledgment expected
            }
            Message::Unknown { operation, object_id } => {
                debug!(operation, object_id, "ignoring unrecognized message");
            }
            Message::HandshakeAck | Message::HeartbeatQuery | Message::StatisticsAck
            | Message::DetectorStatusAck | Message::ErrorReport(_) => {
                debug!(index, "ignoring client-originated reply shape");
            }
        }
        Ok(())
    }

    /// Sends a reply frame to `index`. A `WouldBlock` mid-send is logged and
    /// swallowed rather than returned: the send buffer being momentarily
    /// full is not a reason to tear down an otherwise-healthy session. Any
    /// other I/O error is genuine and propagates to the caller, which does
    /// tear the session down.
    fn reply(
        &mut self,
        index: usize,
        operation: Operation,
        object_id: ObjectId,
        content: Vec<u8>,
    ) -> io::Result<()> {
        let session = self.sessions[index].as_mut().unwrap();
        let receiver = session.peer_id.unwrap_or_else(DeviceId::zeroed);
        let dt = DataTable::new(self.identity, receiver, operation, object_id, content)
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e.to_string()))?;
        let wire = frame::encode(&dt).map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))?;
        match write_all_non_blocking(&mut session.stream, &wire) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                warn!(peer = %session.peer_addr, "send buffer full, dropping this reply");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn reply_error(&mut self, index: usize, code: u8) -> io::Result<()> {
        self.reply(index, Operation::ErrorResp, ObjectId::ERROR, vec![code])
    }

    fn sweep_heartbeats(&mut self) {
        if self.last_heartbeat_sweep.elapsed() < HEARTBEAT_INTERVAL {
            return;
        }
        self.last_heartbeat_sweep = Instant::now();

        for index in 0..self.sessions.len() {
            let Some(session) = self.sessions[index].as_ref() else {
                continue;
            };
            if session.state != ConnectionState::Established {
                continue;
            }
            if session.last_heartbeat_at.elapsed() >= HEARTBEAT_TIMEOUT {
                warn!(peer = %session.peer_addr, "heartbeat timeout, dropping session");
                self.sessions[index] = None;
                continue;
            }
            let _ = self.reply(index, Operation::QueryReq, ObjectId::COMMUNICATION, Vec::new());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream as StdTcpStream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Drives a real `Controller` over loopback TCP: connect, handshake,
    /// and check the `SET_RESP` it hands back.
    #[test]
    fn handshake_over_real_loopback_socket() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let identity = DeviceId::new(0x01AD24, 0x0001, 1).unwrap();
        let mut controller = Controller::bind(addr, identity).unwrap();
        let bound_addr = controller.listener.local_addr().unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_run = Arc::clone(&shutdown);
        let handle = thread::spawn(move || controller.run(&shutdown_run));

        let mut client = StdTcpStream::connect(bound_addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let detector_id = DeviceId::new(0x01AD24, 0x0002, 100).unwrap();
        let handshake = DataTable::new(
            detector_id,
            DeviceId::zeroed(),
            Operation::SetReq,
            ObjectId::COMMUNICATION,
            Vec::new(),
        )
        .unwrap();
        client.write_all(&frame::encode(&handshake).unwrap()).unwrap();

        let mut buf = [0u8; 256];
        let n = client.read(&mut buf).unwrap();
        let reply = frame::decode(&buf[..n]).unwrap();
        assert_eq!(reply.operation, Operation::SetResp.to_wire());
        assert_eq!(reply.object_id, ObjectId::COMMUNICATION.0);

        shutdown.store(true, Ordering::SeqCst);
        drop(client);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn session_table_starts_with_max_sessions_free_slots() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let identity = DeviceId::new(0x01AD24, 0x0001, 1).unwrap();
        let controller = Controller::bind(addr, identity).unwrap();
        assert_eq!(controller.sessions.len(), MAX_SESSIONS);
        assert!(controller.sessions.iter().all(Option::is_none));
    }
}
