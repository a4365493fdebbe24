//! A fixed sequence of [`Node`]s executed head-to-tail (spec.md §4.3, §9
//! "array of indices... is preferable to back-pointers").
//!
//! `Chain` is a `heapless::Vec<Node, N>` rather than a linked list of
//! `next` pointers: nodes are appended once at configuration time and
//! never reordered, so array order already *is* the link order the spec
//! describes, without the indirection (or lifetime bookkeeping) a real
//! linked list would need.

use heapless::Vec as HVec;

use crate::block::Block;
use crate::node::Node;
use crate::types::Status;

pub struct Chain<'a, const N: usize> {
    nodes: HVec<Node<'a>, N>,
}

impl<'a, const N: usize> Chain<'a, N> {
    pub fn new() -> Self {
        Self { nodes: HVec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node to the tail. Returns `Status::Error` (without
    /// modifying the chain) if the chain is already at capacity `N`.
    pub fn push(&mut self, node: Node<'a>) -> Status {
        match self.nodes.push(node) {
            Ok(()) => Status::Ok,
            Err(_) => Status::Error,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Reach a specific node by index, e.g. to update a `TraceSink`'s
    /// X-axis bookkeeping between runs without tearing the chain down.
    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node<'a>> {
        self.nodes.get_mut(index)
    }

    /// Walk the chain head to tail, feeding each node's output to the
    /// next. Stops and returns the first non-`Ok` status (spec.md §4.3);
    /// an empty chain is vacuously `Ok` and returns `input` unchanged.
    pub fn run(&mut self, input: Block) -> Result<Block, Status> {
        let mut current = input;
        for node in self.nodes.iter_mut() {
            current = node.process(current)?;
        }
        Ok(current)
    }

    /// Reset every node (spec.md §8 pipeline idempotence).
    pub fn reset(&mut self) {
        for node in self.nodes.iter_mut() {
            node.reset();
        }
    }
}

impl<'a, const N: usize> Default for Chain<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::GainState;
    use crate::R;
    use meas_kernel::Scalar;

    #[test]
    fn run_threads_output_through_every_node() {
        let mut chain: Chain<4> = Chain::new();
        chain.push(Node::Gain(GainState { k: R::from_f32(2.0) }));
        chain.push(Node::Gain(GainState { k: R::from_f32(3.0) }));

        let mut buf = [R::ONE];
        let block = Block::from_slice(0, 0, &mut buf);
        let out = chain.run(block).unwrap();
        assert_eq!(out.as_real_slice().unwrap(), &[R::from_f32(6.0)]);
    }

    #[test]
    fn push_past_capacity_is_rejected() {
        let mut chain: Chain<1> = Chain::new();
        assert_eq!(chain.push(Node::LogMag), Status::Ok);
        assert_eq!(chain.push(Node::LogMag), Status::Error);
    }

    #[test]
    fn run_stops_on_first_error() {
        let mut chain: Chain<1> = Chain::new();
        chain.push(Node::LogMag);
        // A block whose claimed size overruns its backing storage is
        // rejected by the accessor the node calls into, before any data
        // is touched.
        let mut buf = [0u8; 3];
        let mut block = Block::from_slice(0, 0, &mut buf);
        block.size = 100;
        let result = chain.run(block);
        assert!(result.is_err());
    }
}
