//! Deterministic stand-ins for the wall clock and the raw socket.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::ping::{Endpoint, ProbeError, HEADER_SIZE, PAYLOAD_FILL, PAYLOAD_SIZE};

/// A clock that only moves when told to.
pub struct MockClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    pub fn new() -> Self {
        MockClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

pub enum RecvStep {
    /// Deliver `datagram` after `delay`.
    Datagram { delay: Duration, datagram: Vec<u8> },
    /// Nothing arrives within the receive timeout.
    Timeout,
    Fail(std::io::ErrorKind),
}

/// An endpoint replaying a script of receive outcomes. Sends succeed unless
/// a failure is queued for them. A datagram delayed past the receive
/// timeout is dropped and the receive times out. Once the script runs out
/// every receive times out.
#[derive(Default)]
pub struct ScriptedEndpoint {
    clock: Option<Arc<MockClock>>,
    recv_script: Mutex<VecDeque<RecvStep>>,
    send_failures: Mutex<VecDeque<bool>>,
    sent: Mutex<Vec<(Vec<u8>, Duration)>>,
    closes: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn with_clock(clock: Arc<MockClock>) -> Self {
        ScriptedEndpoint {
            clock: Some(clock),
            ..Default::default()
        }
    }

    pub fn push_reply(&self, delay: Duration, datagram: Vec<u8>) {
        self.recv_script
            .lock()
            .unwrap()
            .push_back(RecvStep::Datagram { delay, datagram });
    }

    pub fn push_timeout(&self) {
        self.recv_script.lock().unwrap().push_back(RecvStep::Timeout);
    }

    pub fn push_recv_failure(&self, kind: std::io::ErrorKind) {
        self.recv_script.lock().unwrap().push_back(RecvStep::Fail(kind));
    }

    /// Outcome of the next sends, in order: `true` fails the send.
    pub fn push_send_outcomes(&self, failures: &[bool]) {
        self.send_failures.lock().unwrap().extend(failures);
    }

    /// Packets sent so far, with the virtual time of each send.
    pub fn sent(&self) -> Vec<(Vec<u8>, Duration)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn advance(&self, duration: Duration) {
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
    }

    fn elapsed(&self) -> Duration {
        self.clock.as_ref().map_or(Duration::ZERO, |clock| clock.elapsed())
    }
}

impl Endpoint for ScriptedEndpoint {
    fn send(&self, packet: &[u8], _peer: Ipv4Addr) -> Result<(), ProbeError> {
        let fail = self.send_failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(ProbeError::SendFailed(std::io::Error::from_raw_os_error(libc::ENETUNREACH)));
        }
        self.sent.lock().unwrap().push((packet.to_vec(), self.elapsed()));
        Ok(())
    }

    fn recv(&self, buffer: &mut [u8], timeout: Duration) -> Result<(usize, Ipv4Addr), ProbeError> {
        if timeout.is_zero() {
            return Err(ProbeError::Timeout);
        }
        let step = self.recv_script.lock().unwrap().pop_front();
        match step {
            Some(RecvStep::Datagram { delay, .. }) if delay > timeout => {
                self.advance(timeout);
                Err(ProbeError::Timeout)
            }
            Some(RecvStep::Datagram { delay, datagram }) => {
                self.advance(delay);
                let len = datagram.len().min(buffer.len());
                buffer[..len].copy_from_slice(&datagram[..len]);
                Ok((len, Ipv4Addr::LOCALHOST))
            }
            Some(RecvStep::Fail(kind)) => Err(ProbeError::RecvFailed(kind.into())),
            Some(RecvStep::Timeout) | None => {
                self.advance(timeout);
                Err(ProbeError::Timeout)
            }
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// An IPv4 datagram carrying an ICMP echo message with a full payload.
pub fn echo_datagram(ihl: u8, ttl: u8, icmp_type: u8, identifier: u16, sequence: u16) -> Vec<u8> {
    let mut datagram = vec![0u8; ihl as usize * 4];
    datagram[0] = 0x40 | ihl;
    datagram[8] = ttl;
    datagram[9] = libc::IPPROTO_ICMP as u8;
    datagram.extend_from_slice(&[icmp_type, 0, 0, 0]);
    datagram.extend_from_slice(&identifier.to_be_bytes());
    datagram.extend_from_slice(&sequence.to_be_bytes());
    datagram.resize(datagram.len() + PAYLOAD_SIZE, PAYLOAD_FILL);
    debug_assert_eq!(datagram.len(), ihl as usize * 4 + HEADER_SIZE + PAYLOAD_SIZE);
    datagram
}
