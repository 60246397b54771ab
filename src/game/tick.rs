//! Tick Scheduler
//!
//! Wraps `World::tick` with a reentrancy guard and post-tick callbacks.
//!
//! A timer firing while the previous tick is still running is dropped, not
//! queued. Nothing is caught up later, so under overload the simulation
//! skips ticks instead of running them back to back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::world::{TickResult, World};

/// Callback run after every completed tick.
pub type PostTickCallback = Box<dyn FnMut(&mut World, &TickResult) + Send>;

/// What happened to one timer firing.
#[derive(Debug)]
pub enum TickOutcome {
    /// The tick ran.
    Completed(TickResult),
    /// A tick was already in progress; this firing was discarded.
    Dropped,
    /// The scheduler is stopped.
    Stopped,
}

/// Releases the tick gate when dropped, including on unwind.
struct TickGuard(Arc<AtomicBool>);

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives a `World` once per timer firing.
pub struct TickScheduler {
    running: bool,
    ticking: Arc<AtomicBool>,
    callbacks: Vec<PostTickCallback>,
    completed: u64,
    dropped: u64,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler {
    /// New stopped scheduler.
    pub fn new() -> Self {
        Self {
            running: false,
            ticking: Arc::new(AtomicBool::new(false)),
            callbacks: Vec::new(),
            completed: 0,
            dropped: 0,
        }
    }

    /// Start accepting timer firings. Returns `false` if already running.
    pub fn start(&mut self) -> bool {
        !std::mem::replace(&mut self.running, true)
    }

    /// Stop accepting timer firings. Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Is a tick executing right now.
    pub fn is_ticking(&self) -> bool {
        self.ticking.load(Ordering::Acquire)
    }

    /// The gate flag. Anything holding it `true` makes firings drop.
    #[cfg(test)]
    pub(crate) fn gate(&self) -> Arc<AtomicBool> {
        self.ticking.clone()
    }

    /// Register a callback run after each completed tick, in registration order.
    pub fn on_tick<F>(&mut self, callback: F)
    where
        F: FnMut(&mut World, &TickResult) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }

    /// Handle one timer firing.
    pub fn try_tick(&mut self, world: &mut World) -> TickOutcome {
        if !self.running {
            return TickOutcome::Stopped;
        }

        if self
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.dropped += 1;
            debug!(tick = world.tick_count(), dropped = self.dropped, "tick dropped, previous tick still running");
            return TickOutcome::Dropped;
        }
        let _guard = TickGuard(self.ticking.clone());

        let result = world.tick();
        for callback in &mut self.callbacks {
            callback(world, &result);
        }

        self.completed += 1;
        TickOutcome::Completed(result)
    }

    /// Ticks that ran.
    pub fn completed_ticks(&self) -> u64 {
        self.completed
    }

    /// Firings discarded because a tick was in progress.
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped
    }
}

// =============================================================================
// TESTS
// =============================================================================
