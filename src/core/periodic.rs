//! Fixed-period worker threads.
//!
//! Odometry and every sensor poller run on their own named thread that calls
//! a tick closure once per period until the process-wide `running` flag is
//! cleared.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Spawn a named thread calling `tick` every `period` while `running` is set.
///
/// A tick that overruns its period is followed immediately by the next one;
/// missed periods are not replayed.
pub fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    running: Arc<AtomicBool>,
    mut tick: F,
) -> Result<JoinHandle<()>>
where
    F: FnMut() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            log::debug!("{} loop started: period={:?}", name, period);

            while running.load(Ordering::Relaxed) {
                let tick_start = Instant::now();
                tick();

                let elapsed = tick_start.elapsed();
                if elapsed < period {
                    thread::sleep(period - elapsed);
                }
            }

            log::debug!("{} loop terminated", name);
        })
        .map_err(|e| Error::Spawn(name, e))
}
