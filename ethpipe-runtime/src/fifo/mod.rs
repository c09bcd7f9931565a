//! Elastic buffers between a producer and a consumer that run at different rates. `FrameFifo` is
//! stepped by the same scheduler as both of its neighbours. `async_frame_fifo` splits into a writer
//! and a reader that live in different execution contexts, with a bounded concurrent queue in
//! between.
//!
//! In frame mode a frame only becomes readable once its last beat has been written. Until then
//! it can still be rewound: dropped for an error flag, for running out of room, or for being
//! larger than the whole buffer. Each frame resolves to exactly one of good, bad or overflow on
//! the write side; frames that reach the read side resolve to good or bad there.

mod frame_fifo;
pub use self::frame_fifo::*;

mod async_fifo;
pub use self::async_fifo::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FifoConfig {
    /// Capacity in beats.
    pub depth: usize,
    /// Commit whole frames only. Required by every drop option.
    pub frame_fifo: bool,
    /// Rewind frames whose last beat carries the error flag instead of passing them on.
    pub drop_bad_frame: bool,
    /// Drop the frame being written when the buffer fills up instead of blocking.
    pub drop_when_full: bool,
    /// Drop frames that could never fit, even into an empty buffer.
    pub drop_oversize_frame: bool,
}

impl FifoConfig {
    pub fn new(depth: usize) -> Self {
        FifoConfig {
            depth,
            frame_fifo: false,
            drop_bad_frame: false,
            drop_when_full: false,
            drop_oversize_frame: false,
        }
    }

    /// Frame mode with every drop option off.
    pub fn frames(depth: usize) -> Self {
        FifoConfig {
            frame_fifo: true,
            ..FifoConfig::new(depth)
        }
    }

    pub fn drop_bad_frame(self, drop_bad_frame: bool) -> Self {
        FifoConfig {
            drop_bad_frame,
            ..self
        }
    }

    pub fn drop_when_full(self, drop_when_full: bool) -> Self {
        FifoConfig {
            drop_when_full,
            ..self
        }
    }

    pub fn drop_oversize_frame(self, drop_oversize_frame: bool) -> Self {
        FifoConfig {
            drop_oversize_frame,
            ..self
        }
    }

    pub(crate) fn check(&self) {
        assert!(self.depth > 0, "FIFO depth: {} must be > 0", self.depth);
        if self.drop_bad_frame || self.drop_when_full || self.drop_oversize_frame {
            assert!(self.frame_fifo, "FIFO drop options require frame mode");
        }
    }
}

/// Status pulses raised during one step. At most one flag is set per side per step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FifoStatus {
    pub overflow: bool,
    pub bad_frame: bool,
    pub good_frame: bool,
}

/// Running totals of `FifoStatus` pulses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FifoCounters {
    pub overflow: u64,
    pub bad_frame: u64,
    pub good_frame: u64,
}

impl FifoCounters {
    pub(crate) fn record(&mut self, status: FifoStatus) {
        self.overflow += u64::from(status.overflow);
        self.bad_frame += u64::from(status.bad_frame);
        self.good_frame += u64::from(status.good_frame);
    }
}

impl FifoStatus {
    pub(crate) fn overflow() -> Self {
        FifoStatus {
            overflow: true,
            ..FifoStatus::default()
        }
    }

    /// The status of a frame that completed, good unless its last beat carried `error`.
    pub(crate) fn completed(error: bool) -> Self {
        FifoStatus {
            bad_frame: error,
            good_frame: !error,
            ..FifoStatus::default()
        }
    }
}
