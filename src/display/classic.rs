use std::io::Write;
use std::net::Ipv4Addr;

use crate::event_handler::{EchoReply, GenericResult, ProbeEventHandler};
use crate::ping::{ProbeError, IP_HEADER_SIZE, PACKET_SIZE, PAYLOAD_SIZE};

/// The traditional `ping` output: progress on `out`, failures on `err`.
pub struct ClassicDisplay<O: Write, E: Write> {
    verbose: bool,
    out: O,
    err: E,
}

impl ClassicDisplay<std::io::Stdout, std::io::Stderr> {
    pub fn new(verbose: bool) -> Self {
        Self::with_writers(verbose, std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> ClassicDisplay<O, E> {
    pub fn with_writers(verbose: bool, out: O, err: E) -> Self {
        ClassicDisplay { verbose, out, err }
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> ProbeEventHandler for ClassicDisplay<O, E> {
    fn on_start(&mut self, name: &str, address: Ipv4Addr) -> GenericResult {
        writeln!(
            self.out,
            "PING {} ({}) {}({}) data bytes",
            name,
            address,
            PAYLOAD_SIZE,
            PACKET_SIZE + IP_HEADER_SIZE
        )?;
        self.out.flush()
    }

    fn on_reply(&mut self, reply: &EchoReply) -> GenericResult {
        write!(self.out, "{} bytes from {}: icmp_seq={} ", PACKET_SIZE, reply.address, reply.sequence)?;
        if self.verbose {
            write!(self.out, "ident={} ", reply.identifier)?;
        }
        writeln!(self.out, "ttl={} time={:.3} ms", reply.ttl, reply.rtt_ms)?;
        self.out.flush()
    }

    fn on_timeout(&mut self, sequence: u16) -> GenericResult {
        if self.verbose {
            writeln!(self.out, "Request timeout for icmp_seq {}", sequence)?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn on_send_error(&mut self, _sequence: u16, error: &ProbeError) -> GenericResult {
        writeln!(self.err, "{}", error)
    }

    fn on_recv_error(&mut self, error: &ProbeError) -> GenericResult {
        writeln!(self.err, "{}", error)
    }

    fn on_failure_budget_exhausted(&mut self) -> GenericResult {
        writeln!(self.err, "Too many consecutive failures, exiting.")
    }
}
