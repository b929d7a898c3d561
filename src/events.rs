//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - the button GPIO ISR (press/release timestamps, classified by the driver)
//! - the scheduler (control tick, publish tick)
//! - the command channels (HTTP handler thread, MQTT receive thread)
//!
//! Events are consumed by the main control loop, one at a time per pass.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Button ISR   │────▶│              │     │              │
//! │ Scheduler    │────▶│  Event Queue │────▶│  Main Loop   │
//! │ HTTP / MQTT  │────▶│  (lock-free) │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── User input ────────────────────────────────────────
    /// Debounced short button press (reconnect request).
    ButtonShortPress   = 0,
    /// Long button hold (factory reset request).
    ButtonLongPress    = 1,

    // ── Control ───────────────────────────────────────────
    /// Control loop tick (sweep + deferred restore).
    ControlTick        = 10,

    // ── Communication ─────────────────────────────────────
    /// Status publish timer fired.
    PublishTick        = 20,
    /// A command channel queued an inbound command.
    CommandReceived    = 21,
    /// New credentials arrived on the provisioning endpoint.
    CredentialsUpdated = 22,
    /// Credential wipe requested (reset endpoint or long hold).
    CredentialsCleared = 23,
    /// A new configuration document arrived on the config endpoint.
    ConfigUpdated      = 24,
}

// ── Lock-free MPSC ring buffer ────────────────────────────────
//
// ISRs and channel threads write (produce), main loop reads (consume).
// Atomic head/tail indices; the buffer is a static so ISR callbacks can
// access it.
//
// Slot protocol: 0 marks an empty slot, a pending event is stored as
// `discriminant + 1`.  A producer claims a slot by advancing head, then
// publishes the payload into it; the consumer treats a still-zero slot as
// "claimed but not yet published" and leaves tail in place.  A producer
// preempted between the claim and the store therefore delays delivery by
// a pass, but can never surface a stale or zero byte as a real event.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
#[allow(clippy::declare_interior_mutable_const)]
static EVENT_BUFFER: [AtomicU8; EVENT_QUEUE_CAP] = {
    const EMPTY: AtomicU8 = AtomicU8::new(0);
    [EMPTY; EVENT_QUEUE_CAP]
};

/// Push an event into the queue.
/// Safe to call from ISR context and from channel threads (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let raw = event as u8 + 1; // 0 is the empty-slot marker
    loop {
        let head = EVENT_HEAD.load(Ordering::Relaxed);
        let tail = EVENT_TAIL.load(Ordering::Acquire);
        let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

        if next_head == tail {
            return false; // Queue full — drop event.
        }

        // Claim the slot, then publish the payload into it.
        if EVENT_HEAD
            .compare_exchange(head, next_head, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            EVENT_BUFFER[head as usize].store(raw, Ordering::Release);
            return true;
        }
    }
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty, or if the head slot is claimed
/// but its payload has not landed yet (retry on the next pass).
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = EVENT_BUFFER[tail as usize].swap(0, Ordering::Acquire);
    if raw == 0 {
        return None; // Claimed, payload still in flight.
    }

    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);
    event_from_u8(raw - 1)
}

/// Drain all pending events into a callback, FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0  => Some(Event::ButtonShortPress),
        1  => Some(Event::ButtonLongPress),
        10 => Some(Event::ControlTick),
        20 => Some(Event::PublishTick),
        21 => Some(Event::CommandReceived),
        22 => Some(Event::CredentialsUpdated),
        23 => Some(Event::CredentialsCleared),
        24 => Some(Event::ConfigUpdated),
        _  => None,
    }
}
