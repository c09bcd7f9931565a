use crate::link::PacketStream;
use crossbeam::crossbeam_channel::Sender;
use futures::prelude::*;
use futures::ready;
use futures::task::{Context, Poll};
use std::fmt::Debug;
use std::pin::Pin;
use tracing::trace;

/// Polls its stream until it ends, writing every item out to `packet_dump` so a test can
/// compare what arrived.
pub struct ExhaustiveCollector<T: Debug> {
    id: usize,
    stream: PacketStream<T>,
    packet_dump: Sender<T>,
}

impl<T: Debug> Unpin for ExhaustiveCollector<T> {}

impl<T: Debug> ExhaustiveCollector<T> {
    pub fn new(id: usize, stream: PacketStream<T>, packet_dump: Sender<T>) -> Self {
        ExhaustiveCollector {
            id,
            stream,
            packet_dump,
        }
    }
}

impl<T: Debug> Future for ExhaustiveCollector<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let collector = Pin::into_inner(self);
        loop {
            match ready!(Pin::new(&mut collector.stream).poll_next(cx)) {
                Some(value) => {
                    collector
                        .packet_dump
                        .try_send(value)
                        .expect("Exhaustive Collector: Error sending to packet dump");
                }
                None => {
                    trace!(collector = collector.id, "collector input ended");
                    return Poll::Ready(());
                }
            }
        }
    }
}
