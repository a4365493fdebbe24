//! Data block descriptor carried between pipeline nodes.
//!
//! A [`Block`] never owns its buffer; it references a static, stack, or
//! DMA-backed region supplied by the caller. Nodes that need to change the
//! element type or count return a new `Block` pointing at their own output
//! storage rather than reinterpreting the bytes of an existing one in
//! place — see `SPEC_FULL.md`'s note on the source's dual-typed aliasing.

use core::mem::{align_of, size_of};
use core::slice;

use meas_kernel::Complex;

use crate::types::Status;
use crate::R;

/// A lightweight, non-owning descriptor `{source_id, sequence, size,
/// buffer}` passed by value between [`crate::node::Node::process`] calls
/// (spec.md §3).
///
/// `size` is the element count the producer wrote, not a byte count;
/// `data` points at `byte_len` bytes of backing storage. Invariant:
/// `size * element_size <= byte_len` for whichever element type the
/// current consumer expects — callers pick the matching `as_*_slice`
/// accessor themselves, since the block carries no intrinsic element type.
#[derive(Clone, Copy)]
pub struct Block {
    pub source_id: u32,
    pub sequence: u32,
    pub size: usize,
    data: *mut u8,
    byte_len: usize,
}

impl Block {
    pub fn empty() -> Self {
        Self {
            source_id: 0,
            sequence: 0,
            size: 0,
            data: core::ptr::null_mut(),
            byte_len: 0,
        }
    }

    /// Build a block describing `buf`, with `size` set to `buf.len()`
    /// elements of `T`.
    pub fn from_slice<T>(source_id: u32, sequence: u32, buf: &mut [T]) -> Self {
        Self {
            source_id,
            sequence,
            size: buf.len(),
            data: buf.as_mut_ptr() as *mut u8,
            byte_len: size_of::<T>() * buf.len(),
        }
    }

    /// Build a block pointing at a single value `T` (the DDC accumulator
    /// struct, a lone `Complex<R>` S-parameter result). `size` is `1`, not
    /// an element count of `T` repeated — this is the "output points to
    /// node state" case the node catalog describes for DDC and SParam.
    pub fn from_value<T>(source_id: u32, sequence: u32, value: &mut T) -> Self {
        Self {
            source_id,
            sequence,
            size: 1,
            data: value as *mut T as *mut u8,
            byte_len: size_of::<T>(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null() || self.size == 0
    }

    /// Reinterpret the referenced buffer as `size` elements of `R`.
    /// Returns `Status::Error` instead of panicking on a misaligned or
    /// undersized region.
    pub fn as_real_slice(&self) -> Result<&[R], Status> {
        self.checked_slice::<R>()
    }

    pub fn as_real_slice_mut(&mut self) -> Result<&mut [R], Status> {
        self.checked_slice_mut::<R>()
    }

    pub fn as_complex_slice(&self) -> Result<&[Complex<R>], Status> {
        self.checked_slice::<Complex<R>>()
    }

    pub fn as_complex_slice_mut(&mut self) -> Result<&mut [Complex<R>], Status> {
        self.checked_slice_mut::<Complex<R>>()
    }

    pub fn as_sample_slice(&self) -> Result<&[i16], Status> {
        self.checked_slice::<i16>()
    }

    fn checked_slice<T>(&self) -> Result<&[T], Status> {
        if self.data.is_null()
            || (self.data as usize) % align_of::<T>() != 0
            || self.size * size_of::<T>() > self.byte_len
        {
            return Err(Status::Error);
        }
        Ok(unsafe { slice::from_raw_parts(self.data as *const T, self.size) })
    }

    fn checked_slice_mut<T>(&mut self) -> Result<&mut [T], Status> {
        if self.data.is_null()
            || (self.data as usize) % align_of::<T>() != 0
            || self.size * size_of::<T>() > self.byte_len
        {
            return Err(Status::Error);
        }
        Ok(unsafe { slice::from_raw_parts_mut(self.data as *mut T, self.size) })
    }

    pub fn as_ddc_accum(&self) -> Result<&super::dsp::ddc::DdcAccumulators, Status> {
        use core::mem::size_of;
        use super::dsp::ddc::DdcAccumulators;
        if self.data.is_null() || self.size != 1 || size_of::<DdcAccumulators>() > self.byte_len {
            return Err(Status::Error);
        }
        Ok(unsafe { &*(self.data as *const DdcAccumulators) })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_slice_round_trips() {
        let mut buf = [1.0f32, 2.0, 3.0];
        let block = Block::from_slice(1, 0, &mut buf);
        assert_eq!(block.as_real_slice().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn oversized_claim_is_rejected() {
        let mut buf = [0u8; 4];
        let mut block = Block::from_slice(1, 0, &mut buf);
        block.size = 100;
        assert_eq!(block.as_sample_slice().err(), Some(Status::Error));
    }

    #[test]
    fn empty_block_has_no_size() {
        let block = Block::empty();
        assert!(block.is_empty());
    }

    #[test]
    fn ddc_accum_round_trips_through_a_value_block() {
        use super::super::dsp::ddc::DdcAccumulators;
        let mut acc = DdcAccumulators {
            acc_i: 1,
            acc_q: 2,
            ref_i: 3,
            ref_q: 4,
        };
        let block = Block::from_value(7, 0, &mut acc);
        let read_back = block.as_ddc_accum().unwrap();
        assert_eq!(read_back.acc_i, 1);
        assert_eq!(read_back.ref_q, 4);
    }
}
