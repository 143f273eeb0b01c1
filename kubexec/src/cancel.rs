//! Cooperative cancellation for the blocking waits in this crate.
//!
//! The Ctrl-C handler runs on its own thread and only flips a flag. Every loop that may block for a long time (job
//! polling, remote exec, watch mode) sleeps in short slices and checks the flag in between, so an interrupt unwinds
//! through the normal return path and cleanup guards get to run.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::debug;

/// Upper bound on how long a sleep goes without looking at the cancellation flag.
const SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a process wide Ctrl-C handler that cancels the returned token. Can only be called once per process.
    pub fn install_ctrlc_handler() -> Result<Self, ctrlc::Error> {
        let token = Self::new();
        ctrlc::set_handler({
            let token = token.clone();
            move || {
                debug!("received interrupt");
                token.cancel();
            }
        })?;
        Ok(token)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless cancelled first. Returns `false` if the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= until {
                return true;
            }
            thread::sleep(SLICE.min(until - now));
        }
    }
}
