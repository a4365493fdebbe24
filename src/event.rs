//! Publisher/subscriber event bus bridging ISR and main-loop contexts
//! (spec.md §4.4).
//!
//! A fixed-capacity ring buffer of [`Event`] plus a fixed subscriber
//! table. `publish` is callable from an interrupt handler or from the
//! main loop with identical semantics; `dispatch_events` drains the queue
//! from the main loop only. Concurrent index updates are guarded by a
//! short critical section (spec.md §5: "critical sections are used
//! sparingly to update the event ring's indices... not used on the
//! measurement path") rather than a lock-free CAS loop, matching the
//! `cortex-m-critical-section` feature's documented fallback in
//! `Cargo.toml`.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use heapless::Vec as HVec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::types::{Status, Variant};

/// Ring capacity `Q` (spec.md §4.4).
pub const QUEUE_CAP: usize = 16;
/// Subscriber table capacity `S` (spec.md §4.4).
pub const MAX_SUBSCRIBERS: usize = 32;

/// Opaque handle identifying an event's originating object, replacing the
/// source's raw pointer (spec.md §9 Design Notes: "the event subscriber
/// `source` filter can be an opaque integer handle rather than a
/// pointer").
pub type ObjectRef = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PropChanged,
    DataReady,
    StateChanged,
    Error,
}

/// The "descriptive integer kind" an `Error` event's payload carries
/// (spec.md §7: "subscribers to `Error` events see the offending channel
/// as source and a descriptive integer kind in the payload"). Round-trips
/// through `Variant::Int` via `num_enum` rather than a hand-written
/// `match` at every publish/subscribe site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i64)]
pub enum ErrorKind {
    /// `Synthesizer::set_frequency` failed during `Setup`.
    SynthesizerFault = 0,
    /// `Receiver::start` failed during `Acquire`.
    AcquisitionFault = 1,
    /// The pipeline returned a non-`Ok` status during `Process`.
    PipelineFault = 2,
    /// A calibration division guard tripped (`|denominator|^2 < EPS`).
    CalibrationBoundary = 3,
}

impl ErrorKind {
    pub fn payload(self) -> Variant {
        Variant::Int(i64::from(self))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub kind: EventKind,
    pub source: ObjectRef,
    pub payload: Variant,
}

impl Event {
    pub fn new(kind: EventKind, source: ObjectRef, payload: Variant) -> Self {
        Self { kind, source, payload }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self {
            kind: EventKind::PropChanged,
            source: 0,
            payload: Variant::Int(0),
        }
    }
}

/// A subscriber entry: an optional source filter, a plain-function
/// callback, and a type-erased context pointer (spec.md §3) — the
/// "generic object with vtable" the source used is replaced here by a
/// concrete function pointer plus opaque context, per spec.md §9 Design
/// Notes.
#[derive(Clone, Copy)]
pub struct Subscriber {
    pub filter_source: Option<ObjectRef>,
    pub callback: fn(&Event, *mut ()),
    pub ctx: *mut (),
}

impl Subscriber {
    fn matches(&self, event: &Event) -> bool {
        match self.filter_source {
            None => true,
            Some(src) => src == event.source,
        }
    }
}

struct Ring {
    slots: UnsafeCell<[Event; QUEUE_CAP]>,
    len: AtomicUsize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: all access to `slots` is made inside `critical_section`, which
// serializes publishers (ISR or main loop) against the single dispatcher.
unsafe impl Sync for Ring {}

/// The event bus: one ring queue plus one subscriber table.
pub struct EventBus {
    ring: Ring,
    subscribers: UnsafeCell<HVec<Subscriber, MAX_SUBSCRIBERS>>,
    dispatching: AtomicBool,
    emitted_during_dispatch: AtomicUsize,
}

// SAFETY: `subscribers` is only mutated by `subscribe`, which the owning
// application calls during single-threaded configuration before any ISR
// can run, and only read during `dispatch_events`, which runs on the main
// loop exclusively.
unsafe impl Sync for EventBus {}

impl EventBus {
    pub const fn new() -> Self {
        Self {
            ring: Ring {
                slots: UnsafeCell::new([Event {
                    kind: EventKind::PropChanged,
                    source: 0,
                    payload: Variant::Int(0),
                }; QUEUE_CAP]),
                len: AtomicUsize::new(0),
                head: AtomicUsize::new(0),
                tail: AtomicUsize::new(0),
            },
            subscribers: UnsafeCell::new(HVec::new()),
            dispatching: AtomicBool::new(false),
            emitted_during_dispatch: AtomicUsize::new(0),
        }
    }

    /// Register a subscriber. Not ISR-safe; call during configuration
    /// only. Returns `Status::Error` if the table is full.
    pub fn subscribe(&self, subscriber: Subscriber) -> Status {
        critical_section(|| {
            // SAFETY: serialized by the critical section; `subscribe` is
            // documented as configuration-time-only, so there is no
            // concurrent dispatch reader in practice, but the critical
            // section costs nothing extra here and keeps the invariant
            // enforced rather than merely assumed.
            let table = unsafe { &mut *self.subscribers.get() };
            match table.push(subscriber) {
                Ok(()) => Status::Ok,
                Err(_) => Status::Error,
            }
        })
    }

    /// Enqueue `event`. Safe to call from an interrupt handler or the main
    /// loop. Returns `Status::Busy` without dropping anything if the
    /// queue is full, or if called from inside a subscriber callback that
    /// has already published `Q - 1` events during the current dispatch
    /// (spec.md §4.4, §8 scenario 4).
    pub fn publish(&self, event: Event) -> Status {
        let status = critical_section(|| {
            if self.dispatching.load(Ordering::Relaxed) {
                let emitted = self.emitted_during_dispatch.load(Ordering::Relaxed);
                if emitted >= QUEUE_CAP - 1 {
                    return Status::Busy;
                }
            }
            if self.ring.len.load(Ordering::Relaxed) >= QUEUE_CAP {
                return Status::Busy;
            }
            let head = self.ring.head.load(Ordering::Relaxed);
            // SAFETY: serialized by the critical section.
            unsafe {
                (*self.ring.slots.get())[head] = event;
            }
            self.ring.head.store((head + 1) % QUEUE_CAP, Ordering::Relaxed);
            self.ring.len.fetch_add(1, Ordering::Relaxed);
            if self.dispatching.load(Ordering::Relaxed) {
                self.emitted_during_dispatch.fetch_add(1, Ordering::Relaxed);
            }
            Status::Ok
        });
        if status == Status::Busy {
            log::warn!("event queue full, dropping publish of {:?} from source {}", event.kind, event.source);
        }
        status
    }

    /// Drain every currently-queued event in FIFO order, invoking every
    /// matching subscriber synchronously for each (spec.md §4.4). Must be
    /// called from the main loop only.
    pub fn dispatch_events(&self) {
        self.dispatching.store(true, Ordering::Relaxed);
        self.emitted_during_dispatch.store(0, Ordering::Relaxed);

        loop {
            let event = critical_section(|| {
                if self.ring.len.load(Ordering::Relaxed) == 0 {
                    return None;
                }
                let tail = self.ring.tail.load(Ordering::Relaxed);
                // SAFETY: serialized by the critical section.
                let event = unsafe { (*self.ring.slots.get())[tail] };
                self.ring.tail.store((tail + 1) % QUEUE_CAP, Ordering::Relaxed);
                self.ring.len.fetch_sub(1, Ordering::Relaxed);
                Some(event)
            });
            let Some(event) = event else { break };

            // SAFETY: no concurrent writer; see `unsafe impl Sync` above.
            let table = unsafe { &*self.subscribers.get() };
            for subscriber in table.iter() {
                if subscriber.matches(&event) {
                    (subscriber.callback)(&event, subscriber.ctx);
                }
            }
        }

        self.dispatching.store(false, Ordering::Relaxed);
    }

    pub fn queued_len(&self) -> usize {
        self.ring.len.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cortex-m-critical-section")]
fn critical_section<F: FnOnce() -> T, T>(f: F) -> T {
    cortex_m::interrupt::free(|_| f())
}

/// Portable fallback for targets without a `cortex-m` critical section: a
/// spinlock over an atomic flag, sufficient on a single-core target that
/// never preempts the publisher mid-update (e.g. host-side tests).
#[cfg(not(feature = "cortex-m-critical-section"))]
fn critical_section<F: FnOnce() -> T, T>(f: F) -> T {
    static LOCK: AtomicBool = AtomicBool::new(false);
    while LOCK
        .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {}
    let result = f();
    LOCK.store(false, Ordering::Release);
    result
}
