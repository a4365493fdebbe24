//! Processing nodes: the closed set of pipeline stages a [`crate::chain`]
//! executes head-to-tail (spec.md §4.3 node catalog, §9 "replace virtual
//! dispatch with a tagged variant").
//!
//! Each variant owns its state inline — no heap, no trait object, no
//! function-pointer table. `process` is a single `match` over the
//! variant; nodes that must change the element type or count of the
//! stream (`Magnitude`, `Phase`, `Ddc`, `SParam`, `Calibration`) write into
//! their own scratch storage and return a new [`Block`] pointing at it,
//! rather than reinterpreting the bytes of the input block in place —
//! resolving the dual-typed-aliasing ambiguity `SPEC_FULL.md` calls out
//! (spec.md §9 Open Questions).

use meas_kernel::{Complex, Scalar};

use crate::block::Block;
use crate::calibration::Calibration;
use crate::dsp::ddc::{self, DdcAccumulators};
use crate::dsp::dds::{PhaseAccumulator, Waveform};
use crate::dsp::fft::FftContext;
use crate::dsp::window::{self, WindowKind};
use crate::types::{Status, Trace};
use crate::R;

/// Upper bound on a single node's scratch-buffer element count; shared
/// with every sweep/trace/FFT length in the crate (spec.md §4.5's
/// `MAX_POINTS` and the SA's default FFT length are both 1024).
pub const MAX_NODE_LEN: usize = crate::MAX_POINTS;

/// Error-correction arrays sized for a full sweep; the type every
/// [`Node::Calibration`] and channel FSM names.
pub type ChannelCalibration = Calibration<MAX_NODE_LEN>;

/// Trace storage sized for a full sweep; the type every
/// [`Node::TraceSink`] and channel FSM names.
pub type ChannelTrace = Trace<MAX_NODE_LEN>;

fn r_to_db_or_floor(v: R) -> R {
    const FLOOR_DB: f32 = -140.0;
    if v <= R::ZERO {
        R::from_f32(FLOOR_DB)
    } else {
        let db = R::from_f32(20.0) * v.log10();
        if db < R::from_f32(FLOOR_DB) {
            R::from_f32(FLOOR_DB)
        } else {
            db
        }
    }
}

/// Wrap a phase delta into the principal range `(-pi, pi]`.
fn wrap_principal(mut x: R) -> R {
    let mut guard = 0;
    while x > R::PI && guard < 8 {
        x = x - R::TWO_PI;
        guard += 1;
    }
    while x <= -R::PI && guard < 16 {
        x = x + R::TWO_PI;
        guard += 1;
    }
    x
}

#[derive(Debug, Clone, Copy)]
pub struct GainState {
    pub k: R,
}

#[derive(Debug, Clone, Copy)]
pub struct LinearState {
    pub a: R,
    pub b: R,
}

#[derive(Debug, Clone, Copy)]
pub struct WindowState {
    pub kind: WindowKind,
}

pub struct FftState {
    pub ctx: FftContext<MAX_NODE_LEN>,
}

pub struct MagnitudeState {
    out: [R; MAX_NODE_LEN],
    len: usize,
}

impl MagnitudeState {
    pub fn new() -> Self {
        Self {
            out: [R::ZERO; MAX_NODE_LEN],
            len: 0,
        }
    }
}

impl Default for MagnitudeState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PhaseState {
    out: [R; MAX_NODE_LEN],
    len: usize,
}

impl PhaseState {
    pub fn new() -> Self {
        Self {
            out: [R::ZERO; MAX_NODE_LEN],
            len: 0,
        }
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GroupDelayState {
    prev_phase: R,
    delta_omega: R,
    first: bool,
}

impl GroupDelayState {
    pub fn new(delta_omega: R) -> Self {
        Self {
            prev_phase: R::ZERO,
            delta_omega,
            first: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EmaState {
    alpha: R,
    current: R,
    initialized: bool,
}

impl EmaState {
    pub fn new(alpha: R) -> Self {
        Self {
            alpha,
            current: R::ZERO,
            initialized: false,
        }
    }
}

pub struct DdcState {
    pub acc: DdcAccumulators,
    pub phase_index: usize,
    pub phase_step: usize,
}

impl DdcState {
    pub fn new(phase_step: usize) -> Self {
        Self {
            acc: DdcAccumulators::zero(),
            phase_index: 0,
            phase_step,
        }
    }
}

pub struct SParamState {
    pub gamma: Complex<R>,
}

impl SParamState {
    pub fn new() -> Self {
        Self { gamma: Complex::zero() }
    }
}

impl Default for SParamState {
    fn default() -> Self {
        Self::new()
    }
}

/// Calibration node state: a possibly-absent reference to the channel's
/// calibration (spec.md §4.3 note 4 — "null coefficient reference is a
/// pass-through"), the transmission/reflection correction selector, and
/// owned output scratch.
pub struct CalibrationState<'a> {
    pub coeffs: Option<&'a ChannelCalibration>,
    pub transmission: bool,
    out: [Complex<R>; MAX_NODE_LEN],
    len: usize,
}

impl<'a> CalibrationState<'a> {
    pub fn new(coeffs: Option<&'a ChannelCalibration>, transmission: bool) -> Self {
        Self {
            coeffs,
            transmission,
            out: [Complex::zero(); MAX_NODE_LEN],
            len: 0,
        }
    }
}

pub struct WaveGenState {
    pub phase_acc: PhaseAccumulator,
    pub kind: Waveform,
    out: [R; MAX_NODE_LEN],
    len: usize,
}

impl WaveGenState {
    pub fn new(freq: u32, fs: u32, kind: Waveform, len: usize) -> Self {
        Self {
            phase_acc: PhaseAccumulator::new(freq, fs),
            kind,
            out: [R::ZERO; MAX_NODE_LEN],
            len: len.min(MAX_NODE_LEN),
        }
    }
}

/// Trace-sink node state: the bound trace plus the X-axis bookkeeping
/// needed whether the caller feeds it one sweep point at a time (VNA) or a
/// whole spectrum at once (SA). `set_point_stimulus` and
/// `set_spectrum_axis` are called by the owning channel before each
/// `process`, since the trace's X axis (frequency) isn't recoverable from
/// the [`Block`] the DSP nodes pass around.
pub struct TraceSinkState<'a> {
    pub trace: Option<&'a mut ChannelTrace>,
    current_x_hz: u64,
    start_hz: u64,
    bin_spacing_hz: u64,
    x_scratch: [u64; MAX_NODE_LEN],
}

impl<'a> TraceSinkState<'a> {
    pub fn new(trace: Option<&'a mut ChannelTrace>) -> Self {
        Self {
            trace,
            current_x_hz: 0,
            start_hz: 0,
            bin_spacing_hz: 0,
            x_scratch: [0; MAX_NODE_LEN],
        }
    }

    pub fn set_point_stimulus(&mut self, x_hz: u64) {
        self.current_x_hz = x_hz;
    }

    pub fn set_spectrum_axis(&mut self, start_hz: u64, bin_spacing_hz: u64) {
        self.start_hz = start_hz;
        self.bin_spacing_hz = bin_spacing_hz;
    }
}

/// A pipeline stage. See the module docs and spec.md §4.3's node catalog
/// for the input/output/mutation contract of each variant.
pub enum Node<'a> {
    Gain(GainState),
    Linear(LinearState),
    Window(WindowState),
    Fft(FftState),
    Magnitude(MagnitudeState),
    LogMag,
    Phase(PhaseState),
    GroupDelay(GroupDelayState),
    Ema(EmaState),
    Ddc(DdcState),
    SParam(SParamState),
    Calibration(CalibrationState<'a>),
    WaveGen(WaveGenState),
    TraceSink(TraceSinkState<'a>),
}

impl<'a> Node<'a> {
    /// Advance this node by one block. Spec.md invariant (i): never
    /// allocates. Invariant (ii): must not touch metadata fields it
    /// doesn't consume — every arm below either forwards `input` unchanged
    /// (in-place nodes) or builds a fresh `Block` carrying `input`'s
    /// `source_id`/`sequence` over its own storage.
    pub fn process(&mut self, input: Block) -> Result<Block, Status> {
        match self {
            Node::Gain(state) => {
                let buf = input.as_real_slice_mut().map_err(|_| Status::Error)?;
                for v in buf.iter_mut() {
                    *v = *v * state.k;
                }
                Ok(input)
            }
            Node::Linear(state) => {
                let buf = input.as_real_slice_mut().map_err(|_| Status::Error)?;
                for v in buf.iter_mut() {
                    *v = *v * state.a + state.b;
                }
                Ok(input)
            }
            Node::Window(state) => {
                let buf = input.as_real_slice_mut().map_err(|_| Status::Error)?;
                window::apply_window(buf, state.kind);
                Ok(input)
            }
            Node::Fft(state) => {
                let buf = input.as_complex_slice_mut().map_err(|_| Status::Error)?;
                if state.ctx.length() != buf.len() {
                    return Err(Status::Error);
                }
                match state.ctx.exec_in_place(buf) {
                    Status::Ok => Ok(input),
                    other => Err(other),
                }
            }
            Node::Magnitude(state) => {
                let buf = input.as_complex_slice().map_err(|_| Status::Error)?;
                let n = buf.len().min(state.out.len());
                for (slot, c) in state.out[..n].iter_mut().zip(buf.iter()) {
                    *slot = c.magnitude();
                }
                state.len = n;
                Ok(Block::from_slice(input.source_id, input.sequence, &mut state.out[..n]))
            }
            Node::LogMag => {
                let buf = input.as_real_slice_mut().map_err(|_| Status::Error)?;
                for v in buf.iter_mut() {
                    *v = r_to_db_or_floor(*v);
                }
                Ok(input)
            }
            Node::Phase(state) => {
                let buf = input.as_complex_slice().map_err(|_| Status::Error)?;
                let n = buf.len().min(state.out.len());
                for (slot, c) in state.out[..n].iter_mut().zip(buf.iter()) {
                    *slot = c.argument();
                }
                state.len = n;
                Ok(Block::from_slice(input.source_id, input.sequence, &mut state.out[..n]))
            }
            Node::GroupDelay(state) => {
                let buf = input.as_real_slice_mut().map_err(|_| Status::Error)?;
                for v in buf.iter_mut() {
                    let phase = *v;
                    let delay = if state.first {
                        state.first = false;
                        R::ZERO
                    } else {
                        let delta = wrap_principal(phase - state.prev_phase);
                        -(delta / state.delta_omega)
                    };
                    state.prev_phase = phase;
                    *v = delay;
                }
                Ok(input)
            }
            Node::Ema(state) => {
                let buf = input.as_real_slice_mut().map_err(|_| Status::Error)?;
                for v in buf.iter_mut() {
                    state.current = if !state.initialized {
                        state.initialized = true;
                        *v
                    } else {
                        state.alpha * *v + (R::ONE - state.alpha) * state.current
                    };
                    *v = state.current;
                }
                Ok(input)
            }
            Node::Ddc(state) => {
                let buf = input.as_sample_slice().map_err(|_| Status::Error)?;
                match ddc::mix_down(buf, &mut state.acc, &mut state.phase_index, state.phase_step) {
                    Status::Ok => {
                        Ok(Block::from_value(input.source_id, input.sequence, &mut state.acc))
                    }
                    other => Err(other),
                }
            }
            Node::SParam(state) => {
                let acc = input.as_ddc_accum().map_err(|_| Status::Error)?;
                state.gamma = crate::dsp::gamma::gamma(acc);
                Ok(Block::from_value(input.source_id, input.sequence, &mut state.gamma))
            }
            Node::Calibration(state) => {
                let src = input.as_complex_slice().map_err(|_| Status::Error)?;
                let n = src.len().min(state.out.len());
                match state.coeffs {
                    Some(cal) => {
                        for i in 0..n {
                            state.out[i] = cal.apply(input.source_id as usize, src[i], state.transmission);
                        }
                    }
                    None => state.out[..n].copy_from_slice(&src[..n]),
                }
                state.len = n;
                Ok(Block::from_slice(input.source_id, input.sequence, &mut state.out[..n]))
            }
            Node::WaveGen(state) => {
                let n = state.len;
                let mut scratch = [0i16; MAX_NODE_LEN];
                state.phase_acc.generate(&mut scratch[..n], state.kind);
                for (slot, raw) in state.out[..n].iter_mut().zip(scratch[..n].iter()) {
                    *slot = R::from_f32(*raw as f32) / R::from_f32(i16::MAX as f32);
                }
                Ok(Block::from_slice(input.source_id, input.sequence, &mut state.out[..n]))
            }
            Node::TraceSink(state) => {
                let trace = match state.trace.as_deref_mut() {
                    Some(t) => t,
                    None => return Ok(input),
                };
                if let Ok(c) = input.as_complex_slice() {
                    if c.len() == 1 {
                        trace.push_complex_point(state.current_x_hz, c[0]);
                        return Ok(input);
                    }
                }
                if let Ok(r) = input.as_real_slice() {
                    let n = r.len().min(state.x_scratch.len());
                    for (i, slot) in state.x_scratch[..n].iter_mut().enumerate() {
                        *slot = state.start_hz + state.bin_spacing_hz * i as u64;
                    }
                    trace.set_real(&state.x_scratch[..n], &r[..n]);
                }
                Ok(input)
            }
        }
    }

    /// Reset stateful nodes to their initial condition (spec.md §8
    /// "pipeline idempotence": stateless nodes need no reset at all;
    /// stateful ones must return to a fixed starting point).
    pub fn reset(&mut self) {
        match self {
            Node::GroupDelay(state) => {
                state.prev_phase = R::ZERO;
                state.first = true;
            }
            Node::Ema(state) => {
                state.current = R::ZERO;
                state.initialized = false;
            }
            Node::Ddc(state) => {
                state.acc.reset();
                state.phase_index = 0;
            }
            Node::SParam(state) => {
                state.gamma = Complex::zero();
            }
            Node::WaveGen(state) => {
                state.phase_acc.reset();
            }
            Node::TraceSink(state) => {
                if let Some(t) = state.trace.as_deref_mut() {
                    t.clear();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_scales_in_place() {
        let mut node = Node::Gain(GainState { k: R::from_f32(2.0) });
        let mut buf = [R::from_f32(1.0), R::from_f32(2.0)];
        let block = Block::from_slice(0, 0, &mut buf);
        let out = node.process(block).unwrap();
        assert_eq!(out.as_real_slice().unwrap(), &[R::from_f32(2.0), R::from_f32(4.0)]);
    }

    #[test]
    fn log_mag_floors_non_positive_input() {
        let mut node = Node::LogMag;
        let mut buf = [R::ZERO, R::from_f32(-1.0)];
        let block = Block::from_slice(0, 0, &mut buf);
        let out = node.process(block).unwrap();
        for v in out.as_real_slice().unwrap() {
            assert_eq!(*v, R::from_f32(-140.0));
        }
    }

    #[test]
    fn group_delay_emits_zero_on_first_sample_after_reset() {
        let mut node = Node::GroupDelay(GroupDelayState::new(R::ONE));
        let mut buf = [R::from_f32(0.5)];
        let block = Block::from_slice(0, 0, &mut buf);
        let out = node.process(block).unwrap();
        assert_eq!(out.as_real_slice().unwrap()[0], R::ZERO);
    }

    #[test]
    fn calibration_with_no_reference_is_a_strict_pass_through() {
        let mut node = Node::Calibration(CalibrationState::new(None, false));
        let mut buf = [Complex::new(R::from_f32(0.3), R::from_f32(-0.2))];
        let block = Block::from_slice(3, 0, &mut buf);
        let out = node.process(block).unwrap();
        assert_eq!(out.as_complex_slice().unwrap(), &buf[..]);
    }

    #[test]
    fn ddc_then_sparam_recovers_unity_gamma_from_matched_sample_and_reference() {
        let table = crate::dsp::sine_table();
        let mut pcm = heapless::Vec::<i16, { crate::dsp::SINE_TABLE_LEN * 2 }>::new();
        for &s in table.iter() {
            pcm.push(s).unwrap();
            pcm.push(s).unwrap();
        }
        let mut ddc = Node::Ddc(DdcState::new(1));
        let block = Block::from_slice(0, 0, &mut pcm);
        let ddc_out = ddc.process(block).unwrap();

        let mut sparam = Node::SParam(SParamState::new());
        let gamma_out = sparam.process(ddc_out).unwrap();
        let g = gamma_out.as_complex_slice().unwrap()[0];
        assert!((g.magnitude() - R::ONE).fabs() < R::from_f32(1e-2));
    }

    #[test]
    fn reset_returns_stateful_nodes_to_their_initial_condition() {
        let mut node = Node::Ema(EmaState::new(R::from_f32(0.5)));
        let mut buf = [R::from_f32(10.0)];
        let block = Block::from_slice(0, 0, &mut buf);
        node.process(block).unwrap();
        node.reset();
        let mut buf2 = [R::from_f32(4.0)];
        let block2 = Block::from_slice(0, 0, &mut buf2);
        let out = node.process(block2).unwrap();
        // First sample after reset seeds the average directly.
        assert_eq!(out.as_real_slice().unwrap()[0], R::from_f32(4.0));
    }
}
