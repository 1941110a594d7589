pub mod clock;
pub mod display;
pub mod event_handler;
pub mod ping;
pub mod probe;
pub mod session;
pub mod stats;
pub mod summary;
pub mod terminator;

#[cfg(test)]
pub(crate) mod testing;
