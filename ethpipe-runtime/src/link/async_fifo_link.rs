use crate::fifo::{async_frame_fifo, FifoConfig, FifoWriter};
use crate::link::{Link, LinkBuilder, PacketStream};
use crate::stream::Frame;
use futures::prelude::*;
use futures::ready;
use futures::task::{Context, Poll};
use std::pin::Pin;

/// A link that moves whole frames across a task boundary through an `async_frame_fifo`. The
/// FIFO's capacity, counted in bytes, bounds how far the upstream task can run ahead of the
/// downstream one; its drop options decide what happens to frames that do not fit.
#[derive(Default)]
pub struct AsyncFifoLink {
    in_stream: Option<PacketStream<Frame>>,
    config: Option<FifoConfig>,
}

impl AsyncFifoLink {
    /// Changes the FIFO configuration, default value is a 2048 byte frame FIFO that blocks.
    pub fn config(self, config: FifoConfig) -> Self {
        assert!(config.frame_fifo, "AsyncFifoLink requires a frame mode FIFO");
        AsyncFifoLink {
            in_stream: self.in_stream,
            config: Some(config),
        }
    }
}

impl LinkBuilder<Frame, Frame> for AsyncFifoLink {
    fn new() -> Self {
        AsyncFifoLink {
            in_stream: None,
            config: None,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<Frame>>) -> Self {
        assert_eq!(
            in_streams.len(),
            1,
            "AsyncFifoLink may only take 1 input stream"
        );
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<Frame>) -> Self {
        if self.in_stream.is_some() {
            panic!("AsyncFifoLink may only take 1 input stream")
        }
        AsyncFifoLink {
            in_stream: Some(in_stream),
            config: self.config,
        }
    }

    fn build_link(self) -> Link<Frame> {
        let in_stream = match self.in_stream {
            Some(in_stream) => in_stream,
            None => panic!("Cannot build link! Missing input stream"),
        };
        let config = self.config.unwrap_or_else(|| FifoConfig::frames(2048));
        let (writer, reader) = async_frame_fifo(config);
        let ingressor = FifoIngressor {
            input_stream: in_stream,
            writer: Some(writer),
            pending: None,
        };
        (vec![Box::new(ingressor)], vec![Box::new(reader)])
    }
}

/// Polls the input stream and pushes frames into the FIFO until it is full or the input has
/// nothing more, then sleeps. Finishing drops the writer, which ends the reader's stream once it
/// has drained.
pub struct FifoIngressor {
    input_stream: PacketStream<Frame>,
    writer: Option<FifoWriter>,
    pending: Option<Frame>,
}

impl Unpin for FifoIngressor {}

impl Future for FifoIngressor {
    type Output = ();

    /// #1 A frame is held from an earlier poll and still does not fit: park, the reader wakes us
    /// after it takes a frame out.
    ///
    /// #2 The input stream is not ready: sleep, whoever produced the `Pending` wakes us.
    ///
    /// #3 The input stream has ended: drop the writer and finish.
    ///
    /// #4 The input stream yields a frame: push it and keep polling.
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let ingressor = Pin::into_inner(self);
        loop {
            let writer = match ingressor.writer.as_mut() {
                Some(writer) => writer,
                None => return Poll::Ready(()),
            };
            if let Some(frame) = ingressor.pending.take() {
                if let Err(frame) = writer.push_frame(frame) {
                    ingressor.pending = Some(frame);
                    writer.park(cx.waker().clone());
                    return Poll::Pending;
                }
            }

            match ready!(Pin::new(&mut ingressor.input_stream).poll_next(cx)) {
                Some(frame) => ingressor.pending = Some(frame),
                None => {
                    ingressor.writer = None;
                    return Poll::Ready(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test::harness::{initialize_runtime, run_link};
    use crate::utils::test::packet_generators::{immediate_stream, PacketIntervalGenerator};
    use rand::{thread_rng, Rng};
    use std::time::Duration;

    fn frames(count: usize) -> Vec<Frame> {
        let mut rng = thread_rng();
        (0..count)
            .map(|n| {
                let len = rng.gen_range(1, 100);
                Frame::new((0..len).map(|i| (n + i) as u8).collect()).with_tag(n as u16)
            })
            .collect()
    }

    #[test]
    #[should_panic]
    fn panics_when_built_without_input_streams() {
        AsyncFifoLink::new().build_link();
    }

    #[test]
    #[should_panic]
    fn panics_with_two_input_streams() {
        AsyncFifoLink::new()
            .ingressor(immediate_stream(vec![]))
            .ingressor(immediate_stream(vec![]));
    }

    #[test]
    #[should_panic]
    fn panics_on_byte_mode_config() {
        AsyncFifoLink::new().config(FifoConfig::new(64));
    }

    #[test]
    fn builder_methods_work_in_any_order() {
        AsyncFifoLink::new()
            .ingressor(immediate_stream(vec![]))
            .config(FifoConfig::frames(64))
            .build_link();

        AsyncFifoLink::new()
            .config(FifoConfig::frames(64))
            .ingressor(immediate_stream(vec![]))
            .build_link();
    }

    #[test]
    fn long_stream_through_small_fifo() {
        let frames = frames(2000);

        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = AsyncFifoLink::new()
                .ingressor(immediate_stream(frames.clone()))
                .config(FifoConfig::frames(128))
                .build_link();
            run_link(link).await
        });
        assert_eq!(results[0], frames);
    }

    #[test]
    fn empty_stream() {
        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = AsyncFifoLink::new()
                .ingressor(immediate_stream(vec![]))
                .build_link();
            run_link(link).await
        });
        assert_eq!(results[0], []);
    }

    #[test]
    fn two_links() {
        let frames = frames(300);

        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let (mut runnables0, mut egressors0) = AsyncFifoLink::new()
                .ingressor(immediate_stream(frames.clone()))
                .build_link();

            let (mut runnables1, egressors1) = AsyncFifoLink::new()
                .ingressor(egressors0.remove(0))
                .config(FifoConfig::frames(100))
                .build_link();

            runnables0.append(&mut runnables1);
            run_link((runnables0, egressors1)).await
        });
        assert_eq!(results[0], frames);
    }

    #[test]
    fn wait_between_frames() {
        let frames = frames(12);

        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let generator =
                PacketIntervalGenerator::new(Duration::from_millis(10), frames.clone().into_iter());
            let link = AsyncFifoLink::new()
                .ingressor(Box::new(generator))
                .build_link();
            run_link(link).await
        });
        assert_eq!(results[0], frames);
    }

    #[test]
    fn oversize_frames_dropped_and_counted() {
        let input = vec![
            Frame::new(vec![1; 10]),
            Frame::new(vec![2; 200]),
            Frame::new(vec![3; 10]),
        ];

        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = AsyncFifoLink::new()
                .ingressor(immediate_stream(input.clone()))
                .config(FifoConfig::frames(64).drop_oversize_frame(true))
                .build_link();
            run_link(link).await
        });
        assert_eq!(results[0], vec![input[0].clone(), input[2].clone()]);
    }
}
