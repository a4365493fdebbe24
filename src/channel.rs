//! VNA and SA channel state machines (spec.md §4.5).
//!
//! Both channels share the same cooperative skeleton —
//! `Idle/Setup/Acquire/WaitDma/Process/Next` — driven one step at a time by
//! `tick()`, never blocking, per spec.md §5's "single-threaded cooperative
//! superloop with interrupt handlers" scheduling model. A channel owns its
//! pipeline [`crate::chain::Chain`], its [`crate::types::Trace`] (borrowed,
//! bound at `configure`), its frequency plan, and the HAL objects it drives.

use core::sync::atomic::{AtomicBool, Ordering};

use meas_kernel::Scalar;

use crate::block::Block;
use crate::chain::Chain;
use crate::dsp::fft::FftContext;
use crate::dsp::window::WindowKind;
use crate::event::{Event, EventBus, EventKind, ErrorKind, ObjectRef};
use crate::hal::{Receiver, Synthesizer};
use crate::node::{
    CalibrationState, ChannelCalibration, ChannelTrace, DdcState, FftState, MagnitudeState, Node,
    SParamState, TraceSinkState, WindowState, MAX_NODE_LEN,
};
use crate::types::{property, Status, Variant};
use crate::R;

/// Lower bound on a stimulus frequency accepted by `start_sweep` (spec.md §6).
pub const MIN_FREQ_HZ: u64 = 10_000;
/// Upper bound on a stimulus frequency accepted by `start_sweep` (spec.md §6).
pub const MAX_FREQ_HZ: u64 = 6_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Setup,
    Acquire,
    WaitDma,
    Process,
    Next,
}

/// `current_hz` at `point_index` on a linear sweep from `start_hz` to
/// `stop_hz` over `points` points (spec.md §4.5 frequency plan). Rounds to
/// the nearest Hz; exact at `point_index == 0` and `point_index == points - 1`.
fn plan_hz(start_hz: u64, stop_hz: u64, points: u32, point_index: u32) -> u64 {
    if points <= 1 {
        return start_hz;
    }
    let span = stop_hz - start_hz;
    let denom = (points - 1) as u64;
    start_hz + (span * point_index as u64 + denom / 2) / denom
}

const DDC_IDX: usize = 0;
const CAL_IDX: usize = 2;
const TRACE_IDX: usize = 3;

/// A vector network analyzer channel: per-point DDC → S-parameter →
/// calibration → trace pipeline, stepped across a linear frequency plan.
pub struct VnaChannel<'a, S, X> {
    state: ChannelState,
    channel_id: ObjectRef,
    start_hz: u64,
    stop_hz: u64,
    points: u32,
    current_point: u32,
    current_hz: u64,
    user_buffer: Option<&'a mut [i16]>,
    pending_acquisition: Option<(*mut i16, usize)>,
    /// Mirrors the `BUFFER_CAP` property (spec.md §6); combined with a
    /// `BUFFER_PTR` property write to arm an acquisition buffer entirely
    /// through the generic property surface, without the caller ever
    /// naming a typed Rust slice (e.g. from a SCPI-style command parser).
    buffer_cap: usize,
    data_ready: AtomicBool,
    pipeline: Chain<'a, 4>,
    synth: S,
    rx: X,
}

impl<'a, S: Synthesizer, X: Receiver> VnaChannel<'a, S, X> {
    pub fn new(channel_id: ObjectRef, synth: S, rx: X) -> Self {
        Self {
            state: ChannelState::Idle,
            channel_id,
            start_hz: 0,
            stop_hz: 0,
            points: 0,
            current_point: 0,
            current_hz: 0,
            user_buffer: None,
            pending_acquisition: None,
            buffer_cap: 0,
            data_ready: AtomicBool::new(false),
            pipeline: Chain::new(),
            synth,
            rx,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Generic property surface (spec.md §6): external configuration
    /// interfaces (shell, serialized state) address channel parameters by
    /// integer ID through a [`Variant`] rather than a typed Rust call.
    /// Type-checks at this boundary and rejects an out-of-range value
    /// without mutating state, per spec.md §6 and §9 Design Notes'
    /// "type-check at the set-property boundary... prefer direct,
    /// strongly-typed setters inside the core" — this is that one
    /// boundary, not a pattern repeated through the rest of the channel.
    /// Publishes `PropChanged` on a successful update (spec.md §5 "the core
    /// emits `PropChanged` on property updates").
    pub fn set_property(&mut self, events: &EventBus, id: u32, value: Variant) -> Status {
        let status = match id {
            property::START_FREQ => match value.as_int() {
                Some(v) if v >= 0 => {
                    self.start_hz = v as u64;
                    Status::Ok
                }
                _ => Status::Error,
            },
            property::STOP_FREQ => match value.as_int() {
                Some(v) if v >= 0 => {
                    self.stop_hz = v as u64;
                    Status::Ok
                }
                _ => Status::Error,
            },
            property::POINTS => match value.as_int() {
                Some(v) if v > 0 && (v as u64) <= crate::MAX_POINTS as u64 => {
                    self.points = v as u32;
                    Status::Ok
                }
                _ => Status::Error,
            },
            property::BUFFER_CAP => match value.as_int() {
                Some(v) if v >= 0 => {
                    self.buffer_cap = v as usize;
                    Status::Ok
                }
                _ => Status::Error,
            },
            property::BUFFER_PTR => match value.as_ptr() {
                Some(ptr) => {
                    self.set_active_buffer(ptr as *mut i16, self.buffer_cap);
                    Status::Ok
                }
                None => Status::Error,
            },
            _ => Status::Error,
        };
        if status == Status::Ok {
            events.publish(Event::new(EventKind::PropChanged, self.channel_id, Variant::Int(id as i64)));
        }
        status
    }

    /// Read back a property previously set via [`VnaChannel::set_property`]
    /// or `start_sweep`. `BUFFER_PTR` is write-only (spec.md §6 models it
    /// as an opaque handoff, not a value the property surface reads back).
    pub fn get_property(&self, id: u32) -> Option<Variant> {
        match id {
            property::START_FREQ => Some(Variant::Int(self.start_hz as i64)),
            property::STOP_FREQ => Some(Variant::Int(self.stop_hz as i64)),
            property::POINTS => Some(Variant::Int(self.points as i64)),
            property::BUFFER_CAP => Some(Variant::Int(self.buffer_cap as i64)),
            _ => None,
        }
    }

    /// Build the DDC → SParam → Calibration → TraceSink pipeline and bind
    /// `trace` and (optionally) `calibration` to it (spec.md §4.5 "pipeline
    /// construction"). `phase_step` is the DDC local-oscillator's sine-table
    /// step per sample.
    pub fn configure(
        &mut self,
        trace: &'a mut ChannelTrace,
        calibration: Option<&'a ChannelCalibration>,
        transmission: bool,
        phase_step: usize,
    ) -> Status {
        self.pipeline.clear();
        if self.pipeline.push(Node::Ddc(DdcState::new(phase_step))) != Status::Ok {
            return Status::Error;
        }
        if self.pipeline.push(Node::SParam(SParamState::new())) != Status::Ok {
            return Status::Error;
        }
        if self
            .pipeline
            .push(Node::Calibration(CalibrationState::new(calibration, transmission)))
            != Status::Ok
        {
            return Status::Error;
        }
        if self
            .pipeline
            .push(Node::TraceSink(TraceSinkState::new(Some(trace))))
            != Status::Ok
        {
            return Status::Error;
        }
        Status::Ok
    }

    /// Validate and arm a sweep (spec.md §4.5 validation rules). On success
    /// transitions `Idle -> Setup`; on failure the channel is left
    /// untouched in `Idle`.
    pub fn start_sweep(
        &mut self,
        start_hz: u64,
        stop_hz: u64,
        points: u32,
        user_buffer: Option<&'a mut [i16]>,
    ) -> Status {
        if self.state != ChannelState::Idle {
            return Status::Error;
        }
        if start_hz > stop_hz
            || points == 0
            || points > crate::MAX_POINTS as u32
            || start_hz < MIN_FREQ_HZ
            || stop_hz > MAX_FREQ_HZ
        {
            log::warn!(
                "channel {} start_sweep rejected: start={} stop={} points={}",
                self.channel_id, start_hz, stop_hz, points
            );
            return Status::Error;
        }
        if let Some(buf) = &user_buffer {
            if points as usize > buf.len() {
                log::warn!("channel {} start_sweep rejected: user buffer too small", self.channel_id);
                return Status::Error;
            }
            self.buffer_cap = buf.len();
        }

        self.start_hz = start_hz;
        self.stop_hz = stop_hz;
        self.points = points;
        self.current_point = 0;
        self.current_hz = start_hz;
        self.user_buffer = user_buffer;
        self.pending_acquisition = None;
        self.data_ready.store(false, Ordering::Relaxed);
        self.pipeline.reset();
        self.state = ChannelState::Setup;
        log::debug!("channel {} Idle -> Setup ({} points)", self.channel_id, points);
        Status::Ok
    }

    /// Force the channel back to `Idle` from any state, stopping any
    /// in-flight acquisition (spec.md §4.5, §5 cancellation).
    pub fn abort_sweep(&mut self) -> Status {
        self.rx.stop();
        self.pending_acquisition = None;
        self.state = ChannelState::Idle;
        log::debug!("channel {} sweep aborted -> Idle", self.channel_id);
        Status::Ok
    }

    /// Record that the bound acquisition buffer has data ready. Safe to
    /// call from an interrupt handler (spec.md §9 "a single atomic flag").
    pub fn mark_data_ready(&self) {
        self.data_ready.store(true, Ordering::Release);
    }

    /// Prefer a driver-delivered buffer over the user-supplied one for the
    /// current iteration (spec.md §4.5 "buffer selection"). The caller must
    /// guarantee the region stays valid until the next `Acquire`
    /// transition (spec.md §9 open question on `active_buffer` lifetime).
    pub fn set_active_buffer(&mut self, ptr: *mut i16, len: usize) {
        self.pending_acquisition = Some((ptr, len));
    }

    /// Advance the state machine by one non-blocking step.
    pub fn tick(&mut self, events: &EventBus) -> Status {
        match self.state {
            ChannelState::Idle => Status::Ok,
            ChannelState::Setup => {
                self.current_hz = plan_hz(self.start_hz, self.stop_hz, self.points, self.current_point);
                // R's precision bounds how exactly a multi-GHz frequency
                // round-trips; the scalar type is a build-time choice the
                // caller already made (spec.md §9 "scalar configurability").
                match self.synth.set_frequency(R::from_f32(self.current_hz as f32)) {
                    Status::Ok => {
                        self.state = ChannelState::Acquire;
                        Status::Ok
                    }
                    other => {
                        self.state = ChannelState::Idle;
                        log::warn!("channel {} synth fault, returning to Idle", self.channel_id);
                        events.publish(Event::new(EventKind::Error, self.channel_id, ErrorKind::SynthesizerFault.payload()));
                        other
                    }
                }
            }
            ChannelState::Acquire => {
                let buffer = self.pending_acquisition.take().or_else(|| {
                    self.user_buffer
                        .as_deref_mut()
                        .map(|buf| (buf.as_mut_ptr(), buf.len()))
                });
                match buffer {
                    Some((ptr, len)) => {
                        self.data_ready.store(false, Ordering::Relaxed);
                        // SAFETY: `ptr`/`len` describe either the caller's
                        // bound `user_buffer` (valid for `'a`) or a
                        // driver-supplied region the caller promised stays
                        // valid until the next `Acquire` (spec.md §9).
                        match unsafe { self.rx.start(ptr as *mut (), len) } {
                            Status::Ok => {
                                self.pending_acquisition = Some((ptr, len));
                                self.state = ChannelState::WaitDma;
                                Status::Ok
                            }
                            other => {
                                self.state = ChannelState::Idle;
                                log::warn!("channel {} acquisition fault, returning to Idle", self.channel_id);
                                events.publish(Event::new(
                                    EventKind::Error,
                                    self.channel_id,
                                    ErrorKind::AcquisitionFault.payload(),
                                ));
                                other
                            }
                        }
                    }
                    None => {
                        // No buffer bound this cycle; Process will skip the
                        // pipeline run (spec.md §4.5 buffer selection).
                        self.pending_acquisition = None;
                        self.data_ready.store(true, Ordering::Relaxed);
                        self.state = ChannelState::WaitDma;
                        Status::Ok
                    }
                }
            }
            ChannelState::WaitDma => {
                if self.data_ready.load(Ordering::Acquire) {
                    self.state = ChannelState::Process;
                }
                Status::Ok
            }
            ChannelState::Process => {
                match self.pending_acquisition.take() {
                    Some((ptr, len)) => {
                        if let Some(Node::TraceSink(sink)) = self.pipeline.node_mut(TRACE_IDX) {
                            sink.set_point_stimulus(self.current_hz);
                        }
                        // SAFETY: the region was validated live for the
                        // `Acquire` that produced it and is read here
                        // exactly once before being released.
                        let samples = unsafe { core::slice::from_raw_parts_mut(ptr, len) };
                        let block = Block::from_slice(self.channel_id, self.current_point, samples);
                        match self.pipeline.run(block) {
                            Ok(_) => {
                                if let Some(Node::Calibration(state)) = self.pipeline.node_mut(CAL_IDX) {
                                    if state.coeffs.map_or(false, |c| c.take_boundary_hit()) {
                                        log::warn!(
                                            "channel {} calibration division guard tripped at point {}",
                                            self.channel_id, self.current_point
                                        );
                                        events.publish(Event::new(
                                            EventKind::Error,
                                            self.channel_id,
                                            ErrorKind::CalibrationBoundary.payload(),
                                        ));
                                    }
                                }
                                events.publish(Event::new(
                                    EventKind::DataReady,
                                    self.channel_id,
                                    Variant::Int(self.current_point as i64),
                                ));
                                self.state = ChannelState::Next;
                                Status::Ok
                            }
                            Err(status) => {
                                self.state = ChannelState::Idle;
                                log::warn!("channel {} pipeline fault, returning to Idle", self.channel_id);
                                events.publish(Event::new(
                                    EventKind::Error,
                                    self.channel_id,
                                    ErrorKind::PipelineFault.payload(),
                                ));
                                status
                            }
                        }
                    }
                    None => {
                        self.state = ChannelState::Next;
                        Status::Ok
                    }
                }
            }
            ChannelState::Next => {
                if self.current_point + 1 < self.points {
                    self.current_point += 1;
                    self.state = ChannelState::Setup;
                } else {
                    self.state = ChannelState::Idle;
                    events.publish(Event::new(
                        EventKind::StateChanged,
                        self.channel_id,
                        Variant::Int(self.current_point as i64),
                    ));
                }
                Status::Ok
            }
        }
    }

    /// Read `this sweep's DDC coefficient index` used by `apply` — the
    /// point the calibration node should read, which is the channel's own
    /// `current_point` carried through the block's `source_id`.
    pub fn calibration_index_hint(&self) -> usize {
        CAL_IDX
    }

    pub fn ddc_index_hint(&self) -> usize {
        DDC_IDX
    }
}

/// A spectrum analyzer channel: single-frame window → FFT → magnitude →
/// log-magnitude → trace pipeline.
///
/// The real-sample-to-complex promotion between `Window` and `Fft` is not
/// part of the generic node catalog (spec.md §4.3 lists `Window: R[] -> R[]`
/// and `Fft: C[] -> C[]`); it is channel-specific glue, done here rather
/// than inventing a node the spec doesn't name.
pub struct SaChannel<'a, S, X> {
    state: ChannelState,
    channel_id: ObjectRef,
    fft_length: usize,
    user_buffer: Option<&'a mut [R]>,
    pending_acquisition: Option<(*mut R, usize)>,
    data_ready: AtomicBool,
    window_chain: Chain<'a, 1>,
    spectrum_chain: Chain<'a, 4>,
    complex_scratch: [meas_kernel::Complex<R>; MAX_NODE_LEN],
    synth: S,
    rx: X,
}

impl<'a, S: Synthesizer, X: Receiver> SaChannel<'a, S, X> {
    pub fn new(channel_id: ObjectRef, synth: S, rx: X) -> Self {
        Self {
            state: ChannelState::Idle,
            channel_id,
            fft_length: 0,
            user_buffer: None,
            pending_acquisition: None,
            data_ready: AtomicBool::new(false),
            window_chain: Chain::new(),
            spectrum_chain: Chain::new(),
            complex_scratch: [meas_kernel::Complex::zero(); MAX_NODE_LEN],
            synth,
            rx,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn configure(
        &mut self,
        trace: &'a mut ChannelTrace,
        window_kind: WindowKind,
        fft_length: usize,
    ) -> Status {
        let ctx = match FftContext::init(fft_length, false) {
            Ok(ctx) => ctx,
            Err(status) => return status,
        };
        self.fft_length = fft_length;

        self.window_chain.clear();
        if self.window_chain.push(Node::Window(WindowState { kind: window_kind })) != Status::Ok {
            return Status::Error;
        }

        self.spectrum_chain.clear();
        if self.spectrum_chain.push(Node::Fft(FftState { ctx })) != Status::Ok {
            return Status::Error;
        }
        if self.spectrum_chain.push(Node::Magnitude(MagnitudeState::new())) != Status::Ok {
            return Status::Error;
        }
        if self.spectrum_chain.push(Node::LogMag) != Status::Ok {
            return Status::Error;
        }
        if self
            .spectrum_chain
            .push(Node::TraceSink(TraceSinkState::new(Some(trace))))
            != Status::Ok
        {
            return Status::Error;
        }
        Status::Ok
    }

    pub fn start_sweep(&mut self, user_buffer: Option<&'a mut [R]>) -> Status {
        if self.state != ChannelState::Idle {
            return Status::Error;
        }
        if self.fft_length == 0 {
            log::warn!("channel {} start_sweep rejected: fft_length is 0", self.channel_id);
            return Status::Error;
        }
        if let Some(buf) = &user_buffer {
            if self.fft_length > buf.len() {
                log::warn!("channel {} start_sweep rejected: user buffer too small", self.channel_id);
                return Status::Error;
            }
        }
        self.user_buffer = user_buffer;
        self.pending_acquisition = None;
        self.data_ready.store(false, Ordering::Relaxed);
        self.window_chain.reset();
        self.spectrum_chain.reset();
        self.state = ChannelState::Setup;
        log::debug!("channel {} Idle -> Setup ({} bin frame)", self.channel_id, self.fft_length);
        Status::Ok
    }

    pub fn abort_sweep(&mut self) -> Status {
        self.rx.stop();
        self.pending_acquisition = None;
        self.state = ChannelState::Idle;
        log::debug!("channel {} sweep aborted -> Idle", self.channel_id);
        Status::Ok
    }

    pub fn mark_data_ready(&self) {
        self.data_ready.store(true, Ordering::Release);
    }

    pub fn set_active_buffer(&mut self, ptr: *mut R, len: usize) {
        self.pending_acquisition = Some((ptr, len));
    }

    pub fn tick(&mut self, events: &EventBus) -> Status {
        match self.state {
            ChannelState::Idle => Status::Ok,
            ChannelState::Setup => {
                // The SA has no per-point stimulus; it sweeps a span at a
                // fixed center frequency already set via the synth before
                // `start_sweep`. Nothing to program here, so move straight
                // to acquisition.
                let _ = &self.synth;
                self.state = ChannelState::Acquire;
                Status::Ok
            }
            ChannelState::Acquire => {
                let buffer = self.pending_acquisition.take().or_else(|| {
                    self.user_buffer
                        .as_deref_mut()
                        .map(|buf| (buf.as_mut_ptr(), buf.len()))
                });
                match buffer {
                    Some((ptr, len)) => {
                        self.data_ready.store(false, Ordering::Relaxed);
                        // SAFETY: see `VnaChannel::tick`'s `Acquire` arm.
                        match unsafe { self.rx.start(ptr as *mut (), len) } {
                            Status::Ok => {
                                self.pending_acquisition = Some((ptr, len));
                                self.state = ChannelState::WaitDma;
                                Status::Ok
                            }
                            other => {
                                self.state = ChannelState::Idle;
                                log::warn!("channel {} acquisition fault, returning to Idle", self.channel_id);
                                events.publish(Event::new(
                                    EventKind::Error,
                                    self.channel_id,
                                    ErrorKind::AcquisitionFault.payload(),
                                ));
                                other
                            }
                        }
                    }
                    None => {
                        self.pending_acquisition = None;
                        self.data_ready.store(true, Ordering::Relaxed);
                        self.state = ChannelState::WaitDma;
                        Status::Ok
                    }
                }
            }
            ChannelState::WaitDma => {
                if self.data_ready.load(Ordering::Acquire) {
                    self.state = ChannelState::Process;
                }
                Status::Ok
            }
            ChannelState::Process => {
                match self.pending_acquisition.take() {
                    Some((ptr, len)) => {
                        let n = len.min(self.fft_length);
                        // SAFETY: the region was validated live for the
                        // `Acquire` that produced it.
                        let samples = unsafe { core::slice::from_raw_parts_mut(ptr, len) };
                        // Window over exactly the `n`-sample frame the FFT
                        // will see, not the whole acquisition buffer —
                        // `start_sweep` only requires `fft_length <=
                        // buf.len()`, so a caller-bound buffer may be
                        // larger than `fft_length`, and windowing the full
                        // buffer would place the taper's zero/0.08
                        // endpoint past the frame boundary instead of at it.
                        let window_block = Block::from_slice(self.channel_id, 0, &mut samples[..n]);
                        let result = self.window_chain.run(window_block).and_then(|windowed| {
                            let real = windowed.as_real_slice().map_err(|_| Status::Error)?;
                            for (slot, v) in self.complex_scratch[..n].iter_mut().zip(real[..n].iter()) {
                                *slot = meas_kernel::Complex::new(*v, R::ZERO);
                            }
                            let spectrum_block =
                                Block::from_slice(self.channel_id, 0, &mut self.complex_scratch[..n]);
                            self.spectrum_chain.run(spectrum_block)
                        });
                        match result {
                            Ok(_) => {
                                events.publish(Event::new(
                                    EventKind::DataReady,
                                    self.channel_id,
                                    Variant::Int(0),
                                ));
                                self.state = ChannelState::Next;
                                Status::Ok
                            }
                            Err(status) => {
                                self.state = ChannelState::Idle;
                                log::warn!("channel {} pipeline fault, returning to Idle", self.channel_id);
                                events.publish(Event::new(
                                    EventKind::Error,
                                    self.channel_id,
                                    ErrorKind::PipelineFault.payload(),
                                ));
                                status
                            }
                        }
                    }
                    None => {
                        self.state = ChannelState::Next;
                        Status::Ok
                    }
                }
            }
            ChannelState::Next => {
                // A single frame per sweep: always the final point.
                self.state = ChannelState::Idle;
                events.publish(Event::new(EventKind::StateChanged, self.channel_id, Variant::Int(0)));
                Status::Ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::window::WindowKind;
    use crate::types::TraceFormat;

    struct FakeSynth;
    impl Synthesizer for FakeSynth {
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

    struct FakeReceiver {
        started: bool,
    }
    impl Receiver for FakeReceiver {
        fn configure(&mut self, _sample_rate: R, _decimation: i32) -> Status {
            Status::Ok
        }
        unsafe fn start(&mut self, _buffer: *mut (), _size: usize) -> Status {
            self.started = true;
            Status::Ok
        }
        fn stop(&mut self) -> Status {
            self.started = false;
            Status::Ok
        }
    }

    #[test]
    fn start_sweep_rejects_frequency_out_of_range() {
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver { started: false });
        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        channel.configure(&mut trace, None, false, 1);
        assert_eq!(channel.start_sweep(20_000_000_000, 21_000_000_000, 1, None), Status::Error);
        assert_eq!(channel.state(), ChannelState::Idle);
    }

    #[test]
    fn cw_sweep_runs_to_completion_and_produces_one_trace_point() {
        let table = crate::dsp::sine_table();
        let mut pcm = [0i16; crate::dsp::SINE_TABLE_LEN * 2];
        for (i, &s) in table.iter().enumerate() {
            pcm[2 * i] = s;
            pcm[2 * i + 1] = s;
        }

        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let events = EventBus::new();
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver { started: false });
        assert_eq!(channel.configure(&mut trace, None, false, 1), Status::Ok);
        assert_eq!(
            channel.start_sweep(1_000_000, 1_000_000, 1, Some(&mut pcm[..])),
            Status::Ok
        );

        // Drive the FSM until it returns to Idle, marking data ready right
        // after the simulated Acquire step since there is no real DMA here.
        for _ in 0..16 {
            if channel.state() == ChannelState::WaitDma {
                channel.mark_data_ready();
            }
            channel.tick(&events);
        }

        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(trace.len(), 1);
        let gamma = trace.y_complex()[0];
        assert!((gamma.magnitude() - R::ONE).fabs() < R::from_f32(0.5));
    }

    #[test]
    fn property_surface_sets_and_reads_back_start_stop_and_points() {
        let events = EventBus::new();
        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver { started: false });
        channel.configure(&mut trace, None, false, 1);

        assert_eq!(channel.set_property(&events, property::START_FREQ, Variant::Int(1_000_000)), Status::Ok);
        assert_eq!(channel.set_property(&events, property::STOP_FREQ, Variant::Int(2_000_000)), Status::Ok);
        assert_eq!(channel.set_property(&events, property::POINTS, Variant::Int(11)), Status::Ok);

        assert_eq!(channel.get_property(property::START_FREQ).unwrap().as_int(), Some(1_000_000));
        assert_eq!(channel.get_property(property::STOP_FREQ).unwrap().as_int(), Some(2_000_000));
        assert_eq!(channel.get_property(property::POINTS).unwrap().as_int(), Some(11));
        assert_eq!(events.queued_len(), 3);
    }

    #[test]
    fn property_surface_rejects_wrong_variant_type_without_mutating_state() {
        let events = EventBus::new();
        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver { started: false });
        channel.configure(&mut trace, None, false, 1);
        channel.set_property(&events, property::START_FREQ, Variant::Int(5_000_000));

        assert_eq!(
            channel.set_property(&events, property::START_FREQ, Variant::Bool(true)),
            Status::Error
        );
        assert_eq!(channel.get_property(property::START_FREQ).unwrap().as_int(), Some(5_000_000));
        // Only the successful set published PropChanged.
        assert_eq!(events.queued_len(), 1);
    }

    #[test]
    fn property_surface_rejects_points_above_max_points() {
        let events = EventBus::new();
        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver { started: false });
        channel.configure(&mut trace, None, false, 1);
        assert_eq!(
            channel.set_property(&events, property::POINTS, Variant::Int(crate::MAX_POINTS as i64 + 1)),
            Status::Error
        );
        assert_eq!(events.queued_len(), 0);
    }

    #[test]
    fn unknown_property_id_is_rejected() {
        let events = EventBus::new();
        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver { started: false });
        channel.configure(&mut trace, None, false, 1);
        assert_eq!(channel.set_property(&events, 0xdead, Variant::Int(0)), Status::Error);
        assert_eq!(channel.get_property(0xdead), None);
    }

    #[test]
    fn abort_sweep_returns_to_idle_from_any_state() {
        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Complex);
        let mut channel = VnaChannel::new(1, FakeSynth, FakeReceiver { started: false });
        channel.configure(&mut trace, None, false, 1);
        channel.start_sweep(1_000_000, 2_000_000, 4, None).is_ok();
        assert_eq!(channel.abort_sweep(), Status::Ok);
        assert_eq!(channel.state(), ChannelState::Idle);
    }

    #[test]
    fn sa_single_frame_sweep_peaks_its_trace_at_the_stimulus_bin() {
        const N: usize = 64;
        let mut samples = [R::ZERO; N];
        for (i, s) in samples.iter_mut().enumerate() {
            let angle = R::TWO_PI * R::from_f32(3.0) * R::from_f32(i as f32) / R::from_f32(N as f32);
            *s = angle.sincos().1;
        }

        let mut trace: ChannelTrace = ChannelTrace::new(TraceFormat::Real);
        let events = EventBus::new();
        let mut channel = SaChannel::new(2, FakeSynth, FakeReceiver { started: false });
        assert_eq!(channel.configure(&mut trace, WindowKind::Rect, N), Status::Ok);
        assert_eq!(channel.start_sweep(Some(&mut samples[..])), Status::Ok);

        for _ in 0..8 {
            if channel.state() == ChannelState::WaitDma {
                channel.mark_data_ready();
            }
            channel.tick(&events);
        }

        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(trace.len(), N);
        let y = trace.y_real();
        let (peak_idx, _) = y
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(peak_idx, 3);
    }
}
