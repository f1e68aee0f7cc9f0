use std::{
    collections::VecDeque,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
};

use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::TangueError;

use super::{
    Status, Telemetry,
    codec::{self, DecodeError},
};

/// Largest datagram read in one receive. Longer datagrams are truncated by the OS.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

#[cfg(windows)]
const WSAEMSGSIZE: i32 = 10040;

/// Result of a single non-blocking poll for telemetry.
#[derive(Debug)]
pub enum PollResult {
    /// Nothing pending.
    NoData,
    /// One datagram was read and decoded.
    Received(Box<Telemetry>),
    /// One datagram was read but could not be decoded.
    ParseError(DecodeError),
    /// The receive itself failed. The source is closed and will not produce more data.
    TransportError(io::Error),
}

impl PollResult {
    pub fn status(&self) -> Status {
        match self {
            PollResult::NoData => Status::NoData,
            PollResult::Received(_) => Status::Success,
            PollResult::ParseError(_) => Status::ParseError,
            PollResult::TransportError(_) => Status::TransportError,
        }
    }
}

/// A source of telemetry that can be polled once per frame without blocking.
///
/// The sampling loop only ever talks to this trait, which lets tests and offline
/// tools script the sequence of results a live socket would produce.
///
/// # Contract
///
/// - `try_receive` consumes at most one datagram and never blocks.
/// - After `close`, `try_receive` returns [`PollResult::NoData`].
/// - After a [`PollResult::TransportError`] the producer is closed.
pub trait TelemetryProducer {
    /// Poll once for a telemetry datagram, reading at most `max_datagram_size`
    /// bytes (capped at [`MAX_DATAGRAM_SIZE`]).
    fn try_receive(&mut self, max_datagram_size: usize) -> PollResult;

    /// Release the underlying resource. Calling it more than once is a no-op.
    fn close(&mut self);
}

/// Non-blocking UDP endpoint receiving telemetry datagrams on `0.0.0.0:<port>`.
pub struct TelemetrySource {
    socket: Option<UdpSocket>,
    local_addr: Option<SocketAddr>,
    buffer: Box<[u8; MAX_DATAGRAM_SIZE]>,
}

impl TelemetrySource {
    /// Create the socket, enable address reuse, switch it to non-blocking mode
    /// and bind it to all interfaces on `port`. Port 0 binds an ephemeral port,
    /// see [`TelemetrySource::local_addr`].
    pub fn open(port: u16) -> Result<Self, TangueError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TangueError::SocketCreateFailed { source: e })?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TangueError::SocketOptionFailed { source: e })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TangueError::SocketOptionFailed { source: e })?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket
            .bind(&SockAddr::from(bind_addr))
            .map_err(|e| TangueError::BindFailed { port, source: e })?;

        let socket: UdpSocket = socket.into();
        let local_addr = socket.local_addr().ok();
        info!(
            "Listening for telemetry on UDP {}",
            local_addr.map_or_else(|| bind_addr.to_string(), |addr| addr.to_string())
        );

        Ok(Self {
            socket: Some(socket),
            local_addr,
            buffer: Box::new([0u8; MAX_DATAGRAM_SIZE]),
        })
    }

    /// Address the socket is bound to, `None` once closed.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and(self.local_addr)
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn decode_datagram(&self, len: usize) -> PollResult {
        match codec::decode(&self.buffer[..len]) {
            Ok(telemetry) => PollResult::Received(Box::new(telemetry)),
            Err(e) => {
                warn!("Dropping datagram: {}", e);
                PollResult::ParseError(e)
            }
        }
    }
}

impl TelemetryProducer for TelemetrySource {
    fn try_receive(&mut self, max_datagram_size: usize) -> PollResult {
        let Some(socket) = self.socket.as_ref() else {
            return PollResult::NoData;
        };
        let read_len = max_datagram_size.min(MAX_DATAGRAM_SIZE);

        match socket.recv_from(&mut self.buffer[..read_len]) {
            Ok((received, sender)) => {
                debug!("Received {} bytes from {}", received, sender);
                self.decode_datagram(received)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => PollResult::NoData,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => PollResult::NoData,
            // Windows fills the buffer but reports an oversized datagram as an error.
            #[cfg(windows)]
            Err(e) if e.raw_os_error() == Some(WSAEMSGSIZE) => {
                debug!("Datagram longer than {} bytes, excess dropped", read_len);
                self.decode_datagram(read_len)
            }
            Err(e) => {
                error!("Error receiving telemetry datagram: {}", e);
                self.close();
                PollResult::TransportError(e)
            }
        }
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("Closed telemetry socket");
        }
    }
}

/// A scripted telemetry producer for tests and offline use.
///
/// Results are handed out in order, one per poll; once the script runs out
/// every poll returns [`PollResult::NoData`].
#[derive(Default)]
pub struct MockTelemetryProducer {
    results: VecDeque<PollResult>,
    closed: bool,
    pub polls: usize,
}

impl MockTelemetryProducer {
    pub fn from_results(results: Vec<PollResult>) -> Self {
        Self {
            results: results.into(),
            ..Default::default()
        }
    }

    /// One successful receive per point.
    pub fn from_points(points: Vec<Telemetry>) -> Self {
        Self::from_results(
            points
                .into_iter()
                .map(|point| PollResult::Received(Box::new(point)))
                .collect(),
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn remaining(&self) -> usize {
        self.results.len()
    }
}

impl TelemetryProducer for MockTelemetryProducer {
    fn try_receive(&mut self, _max_datagram_size: usize) -> PollResult {
        self.polls += 1;
        if self.closed {
            return PollResult::NoData;
        }
        let result = self.results.pop_front().unwrap_or(PollResult::NoData);
        if matches!(result, PollResult::TransportError(_)) {
            self.closed = true;
        }
        result
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
