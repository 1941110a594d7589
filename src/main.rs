mod args;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;

use rawping::clock::{Clock, SystemClock};
use rawping::display::ClassicDisplay;
use rawping::ping::{Endpoint, RawSocket};
use rawping::probe::ProbeLoop;
use rawping::session::ProbeSession;
use rawping::summary::SummaryFormat;
use rawping::terminator;

impl From<args::SummaryFormat> for SummaryFormat {
    fn from(format: args::SummaryFormat) -> Self {
        match format {
            args::SummaryFormat::Text => SummaryFormat::Text,
            args::SummaryFormat::Json => SummaryFormat::Json,
            args::SummaryFormat::Csv => SummaryFormat::Csv,
            args::SummaryFormat::None => SummaryFormat::None,
        }
    }
}

fn resolve(target: &str) -> anyhow::Result<Ipv4Addr> {
    let addrs = dns_lookup::lookup_host(target).with_context(|| target.to_owned())?;
    addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4addr) => Some(v4addr),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| anyhow!("{}: no IPv4 address", target))
}

/// Returns the process exit status.
fn run(args: args::Args) -> anyhow::Result<i32> {
    let destination = resolve(&args.target)?;
    log::debug!("{} resolved to {}", args.target, destination);

    let endpoint: Arc<dyn Endpoint> = Arc::new(RawSocket::open()?);
    let format = SummaryFormat::from(args.summary);
    let clock = SystemClock;
    let identifier = std::process::id() as u16;
    let session = Arc::new(ProbeSession::new(
        &args.target,
        destination,
        identifier,
        endpoint,
        clock.now(),
    ));

    terminator::install(session.clone(), format)
        .inspect_err(|err| log::warn!("interrupt handler not installed: {}", err))
        .context("cannot install interrupt handler")?;

    let display = ClassicDisplay::new(args.verbose);
    let mut probe = ProbeLoop::new(&session, display, clock);
    match probe.run() {
        Ok(()) => {
            if !session.finish(format, clock.now()) {
                // the interrupt handler is printing the summary and exits the process
                loop {
                    std::thread::park();
                }
            }
            Ok(0)
        }
        Err(err) => {
            log::debug!("probe loop stopped: {}", err);
            session.endpoint().close();
            Ok(1)
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = args::Args::parse();
    match run(args) {
        Ok(status) => std::process::exit(status),
        Err(err) => {
            eprintln!("rawping: {:#}", err);
            std::process::exit(1);
        }
    }
}
