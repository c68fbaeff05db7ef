//! Interval timers for the relay loop.
//!
//! The scheduler notifies a [`SchedulerDelegate`] when a timer elapses;
//! the relay implements the delegate to send the status query or post the
//! heartbeat.  Time comes in from the caller, so tests drive it with a
//! manual clock.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Scheduler::tick(now)                   │
//! │                                                          │
//! │   ┌───────────────────┐        ┌───────────────────┐     │
//! │   │ StatusPoll (30 s) │        │ Heartbeat (30 s)  │     │
//! │   └─────────┬─────────┘        └─────────┬─────────┘     │
//! │             │  now - last > interval     │               │
//! │             ▼                            ▼               │
//! │   ┌──────────────────────────────────────────────────┐   │
//! │   │                SchedulerDelegate                 │   │
//! │   │       (relay queues system_status / posts)       │   │
//! │   └──────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The peer health check is not a timer here: it runs every iteration and
//! measures silence against the last received message instead.

use crate::app::ports::{SchedulerDelegate, TimerId};
use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Interval timer
// ═══════════════════════════════════════════════════════════════

/// Elapsed-time tracker that fires once `interval_ms` has been exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    pub interval_ms: u64,
    pub last_fired_at: u64,
}

impl IntervalTimer {
    pub fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            last_fired_at: now_ms,
        }
    }

    /// Returns `true` and resets when strictly more than the interval has
    /// passed since the last fire.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_fired_at) > self.interval_ms {
            self.last_fired_at = now_ms;
            true
        } else {
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Owns the relay's periodic timers.
///
/// Decoupled from the relay: a fire only invokes the delegate, which keeps
/// the scheduler testable on its own.
pub struct Scheduler {
    status_poll: IntervalTimer,
    heartbeat: IntervalTimer,
}

impl Scheduler {
    /// All timers start counting from `now_ms`.
    pub fn new(status_poll_ms: u64, heartbeat_ms: u64, now_ms: u64) -> Self {
        Self {
            status_poll: IntervalTimer::new(status_poll_ms, now_ms),
            heartbeat: IntervalTimer::new(heartbeat_ms, now_ms),
        }
    }

    pub fn timer(&self, id: TimerId) -> &IntervalTimer {
        match id {
            TimerId::StatusPoll => &self.status_poll,
            TimerId::Heartbeat => &self.heartbeat,
        }
    }

    /// Call once per loop iteration.  Timers fire in a fixed order:
    /// status poll first, then heartbeat.
    pub fn tick(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        for (id, timer) in [
            (TimerId::StatusPoll, &mut self.status_poll),
            (TimerId::Heartbeat, &mut self.heartbeat),
        ] {
            if timer.poll(now_ms) {
                debug!("Scheduler: {:?} fired at {} ms", id, now_ms);
                delegate.on_timer_fired(id);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
