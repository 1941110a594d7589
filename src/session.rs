use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::ping::Endpoint;
use crate::stats::SharedStats;
use crate::summary::{Summary, SummaryFormat};

/// Longest display name kept, in bytes.
pub const MAX_DISPLAY_NAME: usize = 255;

/// Process-wide state of one probe run, shared by the probe loop and the
/// interrupt handler.
pub struct ProbeSession {
    display_name: String,
    destination: Ipv4Addr,
    identifier: u16,
    endpoint: Arc<dyn Endpoint>,
    stats: SharedStats,
    finished: AtomicBool,
}

impl ProbeSession {
    pub fn new(
        display_name: &str,
        destination: Ipv4Addr,
        identifier: u16,
        endpoint: Arc<dyn Endpoint>,
        start: Instant,
    ) -> Self {
        Self {
            display_name: truncate_display_name(display_name).to_owned(),
            destination,
            identifier,
            endpoint,
            stats: SharedStats::new(start),
            finished: AtomicBool::new(false),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn destination(&self) -> Ipv4Addr {
        self.destination
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn endpoint(&self) -> &dyn Endpoint {
        self.endpoint.as_ref()
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    pub fn summary(&self, end: Instant) -> Summary {
        self.stats
            .snapshot()
            .summarize(&self.display_name, self.stats.start(), end)
    }

    pub fn write_summary(&self, out: &mut impl Write, format: SummaryFormat, end: Instant) -> std::io::Result<()> {
        let text = self
            .summary(end)
            .format(format)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    /// Print the summary to stdout and close the endpoint, once per session.
    ///
    /// Returns `false` if another caller already finished the session; that
    /// caller is about to end the process.
    pub fn finish(&self, format: SummaryFormat, end: Instant) -> bool {
        self.finish_to(&mut std::io::stdout().lock(), format, end)
    }

    fn finish_to(&self, out: &mut impl Write, format: SummaryFormat, end: Instant) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Err(err) = self.write_summary(out, format, end) {
            log::warn!("cannot write summary: {}", err);
        }
        self.endpoint.close();
        true
    }
}

/// Cut `name` to at most [`MAX_DISPLAY_NAME`] bytes on a character boundary.
pub fn truncate_display_name(name: &str) -> &str {
    if name.len() <= MAX_DISPLAY_NAME {
        return name;
    }
    let mut end = MAX_DISPLAY_NAME;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
