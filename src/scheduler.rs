//! Timer/scheduler engine.
//!
//! A small set of recurring tasks, each gated by its own elapsed-time check
//! against the monotonic millisecond clock.  The scheduler notifies a
//! [`SchedulerDelegate`] when a task comes due; the main loop implements the
//! delegate to push events into the ISR queue.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Recurring tasks (control tick, status publish, …)  │
//! │        │ elapsed-ms gate per task                   │
//! │        ▼                                            │
//! │  SchedulerDelegate (main loop pushes into queue)    │
//! │        ▼                                            │
//! │  DeviceService.tick() / channel pumps               │
//! └─────────────────────────────────────────────────────┘
//! ```

use log::info;

use crate::events::Event;

/// Receives due-task notifications. Decoupled from the event system so the
/// scheduler is independently testable.
pub trait SchedulerDelegate {
    fn on_task_due(&mut self, label: &'static str, event: Event);
}

/// Maximum number of concurrent tasks (stack-allocated).
const MAX_TASKS: usize = 4;

/// A recurring task entry.
#[derive(Debug, Clone)]
struct TaskEntry {
    label: &'static str,
    interval_ms: u64,
    last_fire_ms: u64,
    event: Event,
    enabled: bool,
}

/// The scheduler engine.
pub struct Scheduler {
    tasks: [Option<TaskEntry>; MAX_TASKS],
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: [None, None, None, None],
        }
    }

    /// Add a recurring task.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, label: &'static str, interval_ms: u64, event: Event) -> Option<usize> {
        for (i, slot) in self.tasks.iter_mut().enumerate() {
            if slot.is_none() {
                info!("scheduler: added '{label}' every {interval_ms} ms at slot {i}");
                *slot = Some(TaskEntry {
                    label,
                    interval_ms,
                    last_fire_ms: 0,
                    event,
                    enabled: true,
                });
                return Some(i);
            }
        }
        None // All slots full.
    }

    /// Enable or disable a single task without losing its slot.
    pub fn set_task_enabled(&mut self, slot: usize, enabled: bool) {
        if let Some(Some(entry)) = self.tasks.get_mut(slot) {
            entry.enabled = enabled;
        }
    }

    /// Evaluate all tasks against `now_ms`.  Call once per loop pass.
    /// Each due task fires exactly once and re-arms from `now_ms`, so a
    /// loop stall produces one catch-up fire rather than a burst.
    pub fn tick(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        for slot in self.tasks.iter_mut() {
            let entry = match slot {
                Some(e) if e.enabled => e,
                _ => continue,
            };
            if now_ms.saturating_sub(entry.last_fire_ms) >= entry.interval_ms {
                entry.last_fire_ms = now_ms;
                delegate.on_task_due(entry.label, entry.event);
            }
        }
    }

    /// Number of active (enabled) tasks.
    pub fn active_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|s| s.as_ref().is_some_and(|e| e.enabled))
            .count()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Test delegate that records fires.
    struct RecordingDelegate {
        fires: Vec<(&'static str, Event)>,
    }

    impl RecordingDelegate {
        fn new() -> Self {
            Self { fires: Vec::new() }
        }
    }

    impl SchedulerDelegate for RecordingDelegate {
        fn on_task_due(&mut self, label: &'static str, event: Event) {
            self.fires.push((label, event));
        }
    }

    #[test]
    fn task_fires_at_its_interval() {
        let mut sched = Scheduler::new();
        let mut delegate = RecordingDelegate::new();
        sched.add("publish", 5_000, Event::PublishTick).unwrap();

        // First pass at t=0 fires (last_fire starts at 0 and 0 >= interval
        // is false, so no fire before the interval elapses).
        sched.tick(4_999, &mut delegate);
        assert!(delegate.fires.is_empty());

        sched.tick(5_000, &mut delegate);
        assert_eq!(delegate.fires, vec![("publish", Event::PublishTick)]);

        // Re-arms from the fire time.
        sched.tick(9_999, &mut delegate);
        assert_eq!(delegate.fires.len(), 1);
        sched.tick(10_000, &mut delegate);
        assert_eq!(delegate.fires.len(), 2);
    }

    #[test]
    fn independent_tasks_gate_independently() {
        let mut sched = Scheduler::new();
        let mut delegate = RecordingDelegate::new();
        sched.add("control", 50, Event::ControlTick).unwrap();
        sched.add("publish", 5_000, Event::PublishTick).unwrap();

        sched.tick(50, &mut delegate);
        assert_eq!(delegate.fires, vec![("control", Event::ControlTick)]);

        sched.tick(5_000, &mut delegate);
        assert_eq!(delegate.fires.len(), 3); // control again + publish
        assert!(delegate.fires.contains(&("publish", Event::PublishTick)));
    }

    #[test]
    fn stalled_loop_fires_once_not_in_a_burst() {
        let mut sched = Scheduler::new();
        let mut delegate = RecordingDelegate::new();
        sched.add("control", 50, Event::ControlTick).unwrap();

        // 1 second stall: one catch-up fire, then normal cadence.
        sched.tick(1_000, &mut delegate);
        assert_eq!(delegate.fires.len(), 1);
        sched.tick(1_001, &mut delegate);
        assert_eq!(delegate.fires.len(), 1);
        sched.tick(1_050, &mut delegate);
        assert_eq!(delegate.fires.len(), 2);
    }

    #[test]
    fn disabled_task_does_not_fire() {
        let mut sched = Scheduler::new();
        let mut delegate = RecordingDelegate::new();
        let slot = sched.add("publish", 10, Event::PublishTick).unwrap();
        sched.set_task_enabled(slot, false);

        sched.tick(100, &mut delegate);
        assert!(delegate.fires.is_empty());
        assert_eq!(sched.active_count(), 0);

        sched.set_task_enabled(slot, true);
        sched.tick(200, &mut delegate);
        assert_eq!(delegate.fires.len(), 1);
    }

    #[test]
    fn slots_exhaust_gracefully() {
        let mut sched = Scheduler::new();
        for _ in 0..4 {
            assert!(sched.add("t", 10, Event::ControlTick).is_some());
        }
        assert!(sched.add("overflow", 10, Event::ControlTick).is_none());
    }
}
