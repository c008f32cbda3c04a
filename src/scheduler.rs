//! Playback scheduling thread.
//!
//! Ticks the engine at a fixed interval, feeding it the measured wall-clock
//! time since the previous tick so late wakeups never lose or repeat notes.

use crate::app::App;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handle to a running scheduling thread.
///
/// The thread is stopped and joined on drop.
#[derive(Debug)]
pub struct Scheduler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts ticking `app` on a background thread.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned
    pub fn spawn(app: Arc<App>) -> std::io::Result<Self> {
        let interval = Duration::from_millis(app.config().sequencer.tick_interval_ms.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || {
                tracing::debug!(?interval, "Scheduler started");
                let mut last = Instant::now();
                while flag.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    let now = Instant::now();
                    app.tick(now - last);
                    last = now;
                }
                tracing::debug!("Scheduler stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stops the thread and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
