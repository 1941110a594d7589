use std::sync::Arc;
use std::time::Instant;

use crate::session::ProbeSession;
use crate::summary::SummaryFormat;

/// Install the interrupt hook: on Ctrl-C print the summary of `session`,
/// close its endpoint and exit with status 0.
///
/// The handler runs on a dedicated thread and only reads the session. If
/// the probe loop already finished the session, the handler does nothing and
/// lets the main thread exit.
pub fn install(session: Arc<ProbeSession>, format: SummaryFormat) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        if on_interrupt(&session, format) {
            std::process::exit(0);
        }
    })
}

/// Body of the interrupt handler. Returns whether the process should exit.
fn on_interrupt(session: &ProbeSession, format: SummaryFormat) -> bool {
    log::debug!("interrupted");
    session.finish(format, Instant::now())
}
