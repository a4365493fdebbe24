//! Superloop scheduler (spec.md §2 item 8, §5).
//!
//! The core has no scheduler of its own beyond this: one logical task
//! drains the [`EventBus`], ticks every registered channel once, then
//! calls a caller-supplied idle hook. This mirrors the teacher's RTIC
//! `#[idle]` task (`occheung-stabilizer`'s `dual_iir::idle`, which loops
//! `network.update()` then `cortex_m::asm::wfi()` on `NoChange`), but
//! spec.md's Non-goals rule out RTIC's preemptive task dispatch — so here
//! the loop body is explicit and cooperative rather than framework-driven.

use crate::event::EventBus;
use crate::types::Status;

/// Anything a [`Runtime`] can advance by one non-blocking step: both
/// [`crate::channel::VnaChannel`] and [`crate::channel::SaChannel`]
/// implement this so the scheduler can hold a fixed, heterogeneous set of
/// channels without knowing their HAL type parameters.
pub trait Tickable {
    /// Advance by one `tick` (spec.md §4.5: must complete in well under
    /// 100 microseconds).
    fn tick(&mut self, events: &EventBus) -> Status;
}

impl<S: crate::hal::Synthesizer, X: crate::hal::Receiver> Tickable for crate::channel::VnaChannel<'_, S, X> {
    fn tick(&mut self, events: &EventBus) -> Status {
        crate::channel::VnaChannel::tick(self, events)
    }
}

impl<S: crate::hal::Synthesizer, X: crate::hal::Receiver> Tickable for crate::channel::SaChannel<'_, S, X> {
    fn tick(&mut self, events: &EventBus) -> Status {
        crate::channel::SaChannel::tick(self, events)
    }
}

/// A fixed set of up to `N` channel slots plus the event bus they share.
///
/// Channels are registered once at startup (`register`) by the composing
/// application, which owns the actual channel storage; `Runtime` only
/// borrows references, matching spec.md §5's "all state... is statically
/// or stack-allocated and provided by the composing application".
pub struct Runtime<'a, const N: usize> {
    events: &'a EventBus,
    channels: heapless::Vec<&'a mut dyn Tickable, N>,
}

impl<'a, const N: usize> Runtime<'a, N> {
    pub fn new(events: &'a EventBus) -> Self {
        Self {
            events,
            channels: heapless::Vec::new(),
        }
    }

    /// Add a channel to the scheduling set. Returns `Status::Error`
    /// (without registering it) if the runtime is already holding `N`
    /// channels.
    pub fn register(&mut self, channel: &'a mut dyn Tickable) -> Status {
        match self.channels.push(channel) {
            Ok(()) => Status::Ok,
            Err(_) => Status::Error,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// One superloop iteration: drain the event queue, tick every
    /// registered channel in registration order, then return. Does not
    /// call the idle hook — that's [`Runtime::run_forever`]'s job, since a
    /// single `step` is what tests and host-side drivers call directly.
    pub fn step(&mut self) {
        self.events.dispatch_events();
        for channel in self.channels.iter_mut() {
            channel.tick(self.events);
        }
    }

    /// Run the superloop forever: `step()`, then the idle/sleep hook
    /// (e.g. `cortex_m::asm::wfi()` on real hardware, a no-op on a host
    /// simulation), repeated indefinitely. Never returns, matching
    /// spec.md's single-threaded cooperative scheduling model — there is
    /// no "exit" state for the main loop itself, only for individual
    /// channels.
    pub fn run_forever(&mut self, mut idle: impl FnMut()) -> ! {
        loop {
            self.step();
            idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::VnaChannel;
    use crate::event::EventKind;
    use crate::node::ChannelTrace;
    use crate::types::TraceFormat;
    use crate::R;

    struct FakeSynth;
    impl crate::hal::Synthesizer for FakeSynth {
        fn set_frequency(&mut self, _hz: R) -> Status {
            Status::Ok
        }
        fn set_power(&mut self, _dbm: R) -> Status {
            Status::Ok
        }
        fn enable_output(&mut self, _enabled: bool) -> Status {
            Status::Ok
        }
    }

    struct FakeReceiver;
    impl crate::hal::Receiver for FakeReceiver {
        fn configure(&mut self, _sample_rate: R, _decimation: i32) -> Status {
            Status::Ok
        }
        unsafe fn start(&mut self, _buffer: *mut (), _size: usize) -> Status {
            Status::Ok
        }
        fn stop(&mut self) -> Status {
            Status::Ok
        }
    }

    #[test]
    fn step_dispatches_events_and_ticks_every_registered_channel() {
        let events = EventBus::new();
        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver);
        channel.configure(&mut trace, None, false, 1);
        channel.start_sweep(1_000_000, 1_000_000, 1, None).is_ok();

        let mut runtime: Runtime<2> = Runtime::new(&events);
        assert_eq!(runtime.register(&mut channel), Status::Ok);
        assert_eq!(runtime.channel_count(), 1);

        // Idle -> Setup -> Acquire -> WaitDma (no buffer bound, so
        // data_ready is set synthetically by Acquire itself) across a
        // handful of steps.
        for _ in 0..8 {
            runtime.step();
        }
        assert_eq!(channel.state(), crate::channel::ChannelState::Idle);
    }

    #[test]
    fn registering_past_capacity_is_rejected() {
        let events = EventBus::new();
        let mut trace_a: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut trace_b: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut a = VnaChannel::new(1, FakeSynth, FakeReceiver);
        let mut b = VnaChannel::new(2, FakeSynth, FakeReceiver);
        a.configure(&mut trace_a, None, false, 1);
        b.configure(&mut trace_b, None, false, 1);

        let mut runtime: Runtime<1> = Runtime::new(&events);
        assert_eq!(runtime.register(&mut a), Status::Ok);
        assert_eq!(runtime.register(&mut b), Status::Error);
    }

    #[test]
    fn dispatch_surfaces_published_events_to_subscribers_during_step() {
        static HITS: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);
        fn record(_event: &crate::event::Event, _ctx: *mut ()) {
            HITS.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        }
        HITS.store(0, core::sync::atomic::Ordering::Relaxed);

        let events = EventBus::new();
        events.subscribe(crate::event::Subscriber {
            filter_source: None,
            callback: record,
            ctx: core::ptr::null_mut(),
        });
        events.publish(crate::event::Event::new(EventKind::PropChanged, 1, crate::types::Variant::Int(0)));

        let mut runtime: Runtime<0> = Runtime::new(&events);
        runtime.step();
        assert_eq!(HITS.load(core::sync::atomic::Ordering::Relaxed), 1);
    }
}
