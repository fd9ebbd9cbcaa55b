use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep};

/// The inactivity timer of one worker.
///
/// A worker owns exactly one and reuses it for every connection it serves.
/// The deadline moves forward on [`rearm`](ReadTimer::rearm); when it passes,
/// [`fired`](ReadTimer::fired) resolves and the connection is torn down.
#[derive(Debug)]
pub struct ReadTimer {
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl ReadTimer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, sleep: Box::pin(sleep(timeout)), armed: false }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Starts a full timeout period from now.
    pub fn arm(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.timeout);
        self.armed = true;
    }

    /// Same as [`arm`](ReadTimer::arm); named for call sites reacting to activity.
    pub fn rearm(&mut self) {
        self.arm();
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Resolves once the deadline passes. Never resolves while disarmed.
    ///
    /// Cancel safe: dropping the future leaves the deadline untouched.
    pub async fn fired(&mut self) {
        if !self.armed {
            future::pending::<()>().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
    }
}
