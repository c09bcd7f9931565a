use crate::fifo::{FifoConfig, FifoCounters, FifoStatus};
use crate::link::utils::task_park::*;
use crate::stream::{Beat, Channel, Frame, FrameAssembler};
use crossbeam::atomic::AtomicCell;
use crossbeam::crossbeam_channel;
use crossbeam::crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use futures::prelude::*;
use futures::task::{Context, Poll, Waker};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{trace, warn};

/// State visible from both sides. The writer owns the write counters, the reader owns the read
/// counters, and both move `occupancy`.
struct Shared {
    depth: usize,
    occupancy: AtomicCell<usize>,
    write_counters: AtomicCell<FifoCounters>,
    read_counters: AtomicCell<FifoCounters>,
    task_park: Arc<AtomicCell<TaskParkState>>,
}

impl Shared {
    fn record_write(&self, status: FifoStatus) {
        let mut counters = self.write_counters.load();
        counters.record(status);
        self.write_counters.store(counters);
    }

    fn record_read(&self, status: FifoStatus) {
        let mut counters = self.read_counters.load();
        counters.record(status);
        self.read_counters.store(counters);
    }
}

/// Creates a frame-mode elastic buffer whose two ends can be driven from different execution
/// contexts. The writer stages beats until a frame is complete, then commits the whole frame to
/// the queue if it fits in the remaining capacity. The reader is a `Stream` of committed frames.
///
/// The stream ends once the writer has been dropped and every committed frame has been read.
pub fn async_frame_fifo(config: FifoConfig) -> (FifoWriter, FifoReader) {
    assert!(
        config.frame_fifo,
        "async_frame_fifo only commits whole frames, frame mode is required"
    );
    config.check();

    // A frame holds at least one beat, so `depth` frames always cover `depth` beats.
    let (to_reader, from_writer) = crossbeam_channel::bounded::<Frame>(config.depth);
    let shared = Arc::new(Shared {
        depth: config.depth,
        occupancy: AtomicCell::new(0),
        write_counters: AtomicCell::new(FifoCounters::default()),
        read_counters: AtomicCell::new(FifoCounters::default()),
        task_park: Arc::new(AtomicCell::new(TaskParkState::Empty)),
    });

    let writer = FifoWriter {
        config,
        to_reader,
        staging: FrameAssembler::new(),
        staged: 0,
        dropping: false,
        shared: Arc::clone(&shared),
    };
    let reader = FifoReader {
        from_writer,
        current: None,
        shared,
    };
    (writer, reader)
}

/// Write end of `async_frame_fifo`. Driven synchronously: `push` never blocks, it hands the
/// beat back when the FIFO has no room for it.
pub struct FifoWriter {
    config: FifoConfig,
    to_reader: Sender<Frame>,
    staging: FrameAssembler,
    staged: usize,
    dropping: bool,
    shared: Arc<Shared>,
}

impl FifoWriter {
    /// Offers one beat. `Err` returns the beat when it cannot be taken now; offer it again later.
    pub fn push(&mut self, beat: Beat) -> Result<(), Beat> {
        if self.dropping {
            if beat.last {
                self.dropping = false;
                self.shared.record_write(FifoStatus::overflow());
            }
            return Ok(());
        }

        if !beat.last && self.staged + 1 >= self.shared.depth {
            // The frame cannot fit even into an empty FIFO.
            if !(self.config.drop_oversize_frame || self.config.drop_when_full) {
                return Err(beat);
            }
            warn!(staged = self.staged, "async FIFO dropping oversize frame");
            self.staging = FrameAssembler::new();
            self.staged = 0;
            self.dropping = true;
            return Ok(());
        }

        let len = self.staged + 1;
        if beat.last && !(beat.error && self.config.drop_bad_frame) && !self.has_room(len) {
            if !self.config.drop_when_full {
                return Err(beat);
            }
            warn!(len, "async FIFO full, dropping frame");
            self.staging = FrameAssembler::new();
            self.staged = 0;
            self.shared.record_write(FifoStatus::overflow());
            return Ok(());
        }

        self.staged = len;
        if let Some(frame) = self.staging.push(beat) {
            self.staged = 0;
            self.commit(frame);
        }
        Ok(())
    }

    /// Offers a whole frame. `Err` hands it back untouched when it does not fit right now.
    pub fn push_frame(&mut self, frame: Frame) -> Result<(), Frame> {
        assert!(!frame.is_empty(), "frames carry at least one byte");
        if self.staged > 0 || self.dropping {
            return Err(frame);
        }
        if frame.len() > self.shared.depth {
            if self.config.drop_oversize_frame || self.config.drop_when_full {
                warn!(len = frame.len(), "async FIFO dropping oversize frame");
                self.shared.record_write(FifoStatus::overflow());
                return Ok(());
            }
            return Err(frame);
        }
        if !(frame.error && self.config.drop_bad_frame) && !self.has_room(frame.len()) {
            if self.config.drop_when_full {
                warn!(len = frame.len(), "async FIFO full, dropping frame");
                self.shared.record_write(FifoStatus::overflow());
                return Ok(());
            }
            return Err(frame);
        }
        self.commit(frame);
        Ok(())
    }

    /// Moves one beat from a synchronous pipeline into the FIFO.
    pub fn step(&mut self, input: &mut Channel<Beat>) {
        if let Some(beat) = input.peek().copied() {
            if self.push(beat).is_ok() {
                input.accept();
            }
        }
    }

    pub fn write_counters(&self) -> FifoCounters {
        self.shared.write_counters.load()
    }

    pub fn read_counters(&self) -> FifoCounters {
        self.shared.read_counters.load()
    }

    /// Beats committed and not yet read.
    pub fn occupancy(&self) -> usize {
        self.shared.occupancy.load()
    }

    /// Parks a task that is waiting for room; the reader wakes it after taking a frame.
    pub(crate) fn park(&self, waker: Waker) {
        park_and_wake(&self.shared.task_park, waker);
    }

    fn has_room(&self, len: usize) -> bool {
        self.shared.occupancy.load() + len <= self.shared.depth && !self.to_reader.is_full()
    }

    fn commit(&mut self, frame: Frame) {
        if frame.error && self.config.drop_bad_frame {
            warn!("async FIFO dropping bad frame");
            self.shared.record_write(FifoStatus::completed(true));
            return;
        }
        let len = frame.len();
        let error = frame.error;
        self.shared.occupancy.fetch_add(len);
        match self.to_reader.try_send(frame) {
            Ok(()) => {
                trace!(len, "async FIFO frame committed");
                self.shared.record_write(FifoStatus::completed(error));
                unpark_and_wake(&self.shared.task_park);
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                // Room was checked before staging the last beat; only a vanished reader gets here.
                self.shared.occupancy.fetch_sub(len);
                self.shared.record_write(FifoStatus::overflow());
            }
        }
    }
}

impl Drop for FifoWriter {
    fn drop(&mut self) {
        die_and_wake(&self.shared.task_park);
    }
}

/// Read end of `async_frame_fifo`, a `Stream` of committed frames.
pub struct FifoReader {
    from_writer: Receiver<Frame>,
    current: Option<(Frame, usize)>,
    shared: Arc<Shared>,
}

impl FifoReader {
    /// Takes the next committed frame without waiting.
    pub fn try_recv_frame(&mut self) -> Option<Frame> {
        let frame = self.from_writer.try_recv().ok()?;
        self.finish_read(&frame);
        Some(frame)
    }

    /// Offers committed frames to a synchronous pipeline, one beat per step.
    pub fn step(&mut self, output: &mut Channel<Beat>) {
        if self.current.is_none() {
            self.current = self.try_recv_frame().map(|frame| (frame, 0));
        }
        let mut finished = false;
        if let Some((frame, index)) = self.current.as_mut() {
            if output.offer(frame.beat(*index)).is_ok() {
                *index += 1;
                finished = *index == frame.len();
            }
        }
        if finished {
            self.current = None;
        }
    }

    pub fn write_counters(&self) -> FifoCounters {
        self.shared.write_counters.load()
    }

    pub fn read_counters(&self) -> FifoCounters {
        self.shared.read_counters.load()
    }

    fn finish_read(&self, frame: &Frame) {
        self.shared.occupancy.fetch_sub(frame.len());
        self.shared.record_read(FifoStatus::completed(frame.error));
        unpark_and_wake(&self.shared.task_park);
    }
}

impl Unpin for FifoReader {}

impl Stream for FifoReader {
    type Item = Frame;

    /// Same protocol as a queue egressor: a frame wakes the writer side in case it was waiting
    /// for room; an empty queue parks this task; a dropped writer ends the stream.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let reader = Pin::into_inner(self);
        match reader.from_writer.try_recv() {
            Ok(frame) => {
                reader.finish_read(&frame);
                Poll::Ready(Some(frame))
            }
            Err(TryRecvError::Empty) => {
                park_and_wake(&reader.shared.task_park, cx.waker().clone());
                Poll::Pending
            }
            Err(TryRecvError::Disconnected) => Poll::Ready(None),
        }
    }
}
