use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::event_handler::{EchoReply, ProbeEventHandler};
use crate::ping::{
    build_echo_request, extract_icmp_view, IcmpType, IcmpView, ProbeError, PACKET_SIZE, RECV_BUFFER_SIZE,
    RECV_TIMEOUT,
};
use crate::session::ProbeSession;
use crate::stats::Statistics;

/// Pause between two iterations.
pub const INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive failures tolerated before the loop gives up.
pub const FAILURE_BUDGET: u32 = 5;

/// Outcome of one iteration of the probe loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Iteration {
    /// A correlated reply arrived after this many milliseconds.
    Reply(f64),
    /// The send succeeded but no correlated reply arrived in time.
    NoReply,
    SendFailed,
    /// Too many consecutive failures; the loop must stop.
    BudgetExhausted,
}

/// The send/receive state machine of a probe run.
pub struct ProbeLoop<'a, H: ProbeEventHandler, C: Clock> {
    session: &'a ProbeSession,
    handler: H,
    clock: C,
    stats: Statistics,
    packet: [u8; PACKET_SIZE],
    buffer: [u8; RECV_BUFFER_SIZE],
    sequence: u16,
    consecutive_failures: u32,
    started: bool,
}

impl<'a, H: ProbeEventHandler, C: Clock> ProbeLoop<'a, H, C> {
    pub fn new(session: &'a ProbeSession, handler: H, clock: C) -> Self {
        ProbeLoop {
            session,
            handler,
            clock,
            stats: Statistics::new(session.stats().start()),
            packet: [0u8; PACKET_SIZE],
            buffer: [0u8; RECV_BUFFER_SIZE],
            sequence: 1,
            consecutive_failures: 0,
            started: false,
        }
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Probe until the failure budget is exhausted.
    ///
    /// # Errors
    ///
    /// [`ProbeError::RecvFailed`] when receiving fails for any reason other
    /// than a timeout, [`ProbeError::Output`] when the handler cannot write.
    pub fn run(&mut self) -> Result<(), ProbeError> {
        loop {
            if self.step()? == Iteration::BudgetExhausted {
                return Ok(());
            }
        }
    }

    /// Run a single iteration: send, wait for the reply, pace.
    pub fn step(&mut self) -> Result<Iteration, ProbeError> {
        if !self.started {
            self.handler
                .on_start(self.session.display_name(), self.session.destination())?;
            self.started = true;
        }

        let sequence = self.sequence;
        build_echo_request(&mut self.packet, sequence, self.session.identifier());

        if let Err(err) = self.session.endpoint().send(&self.packet, self.session.destination()) {
            log::debug!("send of icmp_seq {} failed: {}", sequence, err);
            self.handler.on_send_error(sequence, &err)?;
            self.sequence = sequence.wrapping_add(1);
            return self.count_failure(Iteration::SendFailed);
        }
        self.stats.record_send();
        self.session.stats().publish(&self.stats);
        let trip_begin = self.clock.now();

        let iteration = match self.await_reply(trip_begin)? {
            Some(reply) => {
                self.stats.record_rtt(reply.rtt_ms);
                self.session.stats().publish(&self.stats);
                self.handler.on_reply(&reply)?;
                self.consecutive_failures = 0;
                Iteration::Reply(reply.rtt_ms)
            }
            None => {
                self.handler.on_timeout(sequence)?;
                self.count_failure(Iteration::NoReply)?
            }
        };
        if iteration == Iteration::BudgetExhausted {
            return Ok(iteration);
        }

        self.clock.sleep(INTERVAL);
        self.sequence = sequence.wrapping_add(1);
        Ok(iteration)
    }

    fn count_failure(&mut self, iteration: Iteration) -> Result<Iteration, ProbeError> {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= FAILURE_BUDGET {
            self.handler.on_failure_budget_exhausted()?;
            return Ok(Iteration::BudgetExhausted);
        }
        Ok(iteration)
    }

    /// Read datagrams until one correlates with the outstanding request.
    /// `None` when the receive window closes first. Each receive only waits
    /// for what is left of the window, so unsolicited traffic does not
    /// extend it.
    fn await_reply(&mut self, trip_begin: Instant) -> Result<Option<EchoReply>, ProbeError> {
        let deadline = trip_begin + RECV_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(self.clock.now());
            let len = match self.session.endpoint().recv(&mut self.buffer, remaining) {
                Ok((len, _source)) => len,
                Err(ProbeError::Timeout) => return Ok(None),
                Err(err) => {
                    self.handler.on_recv_error(&err)?;
                    return Err(err);
                }
            };
            let trip_end = self.clock.now();
            if trip_end > deadline {
                log::debug!("datagram arrived {:?} after the window closed", trip_end - deadline);
                return Ok(None);
            }

            match extract_icmp_view(&self.buffer[..len]) {
                Ok(view) if self.correlates(&view) => {
                    let rtt = trip_end.saturating_duration_since(trip_begin);
                    return Ok(Some(EchoReply {
                        address: self.session.destination(),
                        sequence: view.sequence(),
                        identifier: view.identifier(),
                        ttl: view.ttl,
                        rtt_ms: rtt.as_nanos() as f64 / 1_000_000.0,
                    }));
                }
                Ok(view) => self.log_discarded(&view),
                Err(err) => log::debug!("discarding datagram: {}", err),
            }
        }
    }

    fn correlates(&self, view: &IcmpView) -> bool {
        view.icmp_type() == u8::from(IcmpType::EchoReply)
            && view.identifier() == self.session.identifier()
            && view.sequence() == self.sequence
    }

    fn log_discarded(&self, view: &IcmpView) {
        match IcmpType::try_from(view.icmp_type()) {
            Ok(IcmpType::EchoReply) => log::debug!(
                "discarding echo reply ident={} icmp_seq={}, waiting for ident={} icmp_seq={}",
                view.identifier(),
                view.sequence(),
                self.session.identifier(),
                self.sequence
            ),
            Ok(icmp_type) => log::debug!("discarding {:?} (code {})", icmp_type, view.code()),
            Err(icmp_type) => log::debug!("discarding unknown ICMP type {}", icmp_type),
        }
        log::trace!("discarded ICMP header {}", hex::encode(view.header()));
    }
}
