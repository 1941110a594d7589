use std::net::Ipv4Addr;

use crate::ping::ProbeError;

pub type GenericResult = std::io::Result<()>;

/// A correlated echo reply.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    /// Address of the probed host.
    pub address: Ipv4Addr,
    pub sequence: u16,
    pub identifier: u16,
    pub ttl: u8,
    /// Round-trip time in milliseconds.
    pub rtt_ms: f64,
}

/// Receives the events of a probe run, in order.
pub trait ProbeEventHandler {
    /// Called once before the first request.
    fn on_start(&mut self, name: &str, address: Ipv4Addr) -> GenericResult;

    fn on_reply(&mut self, reply: &EchoReply) -> GenericResult;

    fn on_timeout(&mut self, sequence: u16) -> GenericResult;

    fn on_send_error(&mut self, sequence: u16, error: &ProbeError) -> GenericResult;

    /// Called for a receive failure that ends the run.
    fn on_recv_error(&mut self, error: &ProbeError) -> GenericResult;

    fn on_failure_budget_exhausted(&mut self) -> GenericResult;
}

impl<H: ProbeEventHandler + ?Sized> ProbeEventHandler for &mut H {
    fn on_start(&mut self, name: &str, address: Ipv4Addr) -> GenericResult {
        (**self).on_start(name, address)
    }

    fn on_reply(&mut self, reply: &EchoReply) -> GenericResult {
        (**self).on_reply(reply)
    }

    fn on_timeout(&mut self, sequence: u16) -> GenericResult {
        (**self).on_timeout(sequence)
    }

    fn on_send_error(&mut self, sequence: u16, error: &ProbeError) -> GenericResult {
        (**self).on_send_error(sequence, error)
    }

    fn on_recv_error(&mut self, error: &ProbeError) -> GenericResult {
        (**self).on_recv_error(error)
    }

    fn on_failure_budget_exhausted(&mut self) -> GenericResult {
        (**self).on_failure_budget_exhausted()
    }
}
