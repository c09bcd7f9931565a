use crate::fifo::{FifoConfig, FifoCounters, FifoStatus};
use crate::stream::{Beat, Channel};
use tracing::{trace, warn};

/// Synchronous elastic buffer over a preallocated ring of beats.
///
/// Three pointers run around the ring: `rd_ptr` (next beat to read), `wr_commit` (end of the last
/// committed frame) and `wr_ptr` (next beat to write). In frame mode only the region up to
/// `wr_commit` is readable, and dropping a frame is a rewind of `wr_ptr` to `wr_commit`. Outside
/// frame mode every written beat is readable at once and a full buffer always blocks.
#[derive(Debug)]
pub struct FrameFifo {
    config: FifoConfig,
    ring: Vec<Beat>,
    wr_ptr: u64,
    wr_commit: u64,
    rd_ptr: u64,
    dropping: bool,
    write_status: FifoStatus,
    read_status: FifoStatus,
    write_counters: FifoCounters,
    read_counters: FifoCounters,
}

impl FrameFifo {
    pub fn new(config: FifoConfig) -> Self {
        config.check();
        FrameFifo {
            config,
            ring: vec![Beat::default(); config.depth],
            wr_ptr: 0,
            wr_commit: 0,
            rd_ptr: 0,
            dropping: false,
            write_status: FifoStatus::default(),
            read_status: FifoStatus::default(),
            write_counters: FifoCounters::default(),
            read_counters: FifoCounters::default(),
        }
    }

    pub fn config(&self) -> FifoConfig {
        self.config
    }

    /// Beats held, committed or not.
    pub fn occupancy(&self) -> usize {
        (self.wr_ptr - self.rd_ptr) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.wr_ptr == self.rd_ptr
    }

    /// Write side pulses from the most recent step.
    pub fn write_status(&self) -> FifoStatus {
        self.write_status
    }

    /// Read side pulses from the most recent step.
    pub fn read_status(&self) -> FifoStatus {
        self.read_status
    }

    pub fn write_counters(&self) -> FifoCounters {
        self.write_counters
    }

    pub fn read_counters(&self) -> FifoCounters {
        self.read_counters
    }

    pub fn step(&mut self, input: &mut Channel<Beat>, output: &mut Channel<Beat>) {
        self.write_status = FifoStatus::default();
        self.read_status = FifoStatus::default();
        self.read(output);
        self.write(input);
    }

    fn slot(&self, ptr: u64) -> usize {
        (ptr % self.config.depth as u64) as usize
    }

    fn read(&mut self, output: &mut Channel<Beat>) {
        let readable_end = if self.config.frame_fifo {
            self.wr_commit
        } else {
            self.wr_ptr
        };
        if self.rd_ptr == readable_end || !output.is_ready() {
            return;
        }

        let beat = self.ring[self.slot(self.rd_ptr)];
        self.rd_ptr += 1;
        output.fill(beat);
        if beat.last {
            self.read_status = FifoStatus::completed(beat.error);
            self.read_counters.record(self.read_status);
        }
    }

    fn write(&mut self, input: &mut Channel<Beat>) {
        let beat = match input.peek() {
            Some(beat) => *beat,
            None => return,
        };

        if self.dropping {
            input.accept();
            if beat.last {
                self.dropping = false;
                self.raise_write(FifoStatus::overflow());
            }
            return;
        }

        let depth = self.config.depth as u64;
        let full = self.wr_ptr - self.rd_ptr >= depth;
        if self.config.frame_fifo {
            let oversize = self.wr_ptr - self.wr_commit >= depth;
            if oversize || full {
                let drop = (oversize && self.config.drop_oversize_frame)
                    || (full && self.config.drop_when_full);
                if !drop {
                    return;
                }
                warn!(
                    written = self.wr_ptr - self.wr_commit,
                    oversize, "FIFO overflow, dropping frame"
                );
                input.accept();
                self.wr_ptr = self.wr_commit;
                if beat.last {
                    self.raise_write(FifoStatus::overflow());
                } else {
                    self.dropping = true;
                }
                return;
            }
        } else if full {
            return;
        }

        input.accept();
        let slot = self.slot(self.wr_ptr);
        self.ring[slot] = beat;
        self.wr_ptr += 1;
        if !beat.last {
            return;
        }

        if self.config.frame_fifo && beat.error && self.config.drop_bad_frame {
            warn!("FIFO dropping bad frame");
            self.wr_ptr = self.wr_commit;
        } else {
            trace!(len = self.wr_ptr - self.wr_commit, "FIFO frame committed");
            self.wr_commit = self.wr_ptr;
        }
        self.raise_write(FifoStatus::completed(beat.error));
    }

    fn raise_write(&mut self, status: FifoStatus) {
        self.write_status = status;
        self.write_counters.record(status);
    }
}
