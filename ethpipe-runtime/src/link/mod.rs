//! # What is it for?
//!
//! Links carry frames between execution contexts that are scheduled independently, such as tokio
//! tasks on different worker threads. A link is built from its input streams and produces the
//! futures that must be spawned to drive it, plus the output streams the next link consumes.
//! Inside a context, frames move through synchronous step functions; links are only needed where
//! a pipeline is split across contexts.
use futures::{Future, Stream};

mod async_fifo_link;
pub use self::async_fifo_link::*;

pub mod utils;

/// A boxed stream of frames or records flowing between links.
pub type PacketStream<Input> = Box<dyn Stream<Item = Input> + Send + Unpin>;

/// A future the runtime must spawn for a link to make progress.
pub type TokioRunnable = Box<dyn Future<Output = ()> + Send + Unpin>;

/// Runnables to spawn, and the output streams of the link.
pub type Link<Output> = (Vec<TokioRunnable>, Vec<PacketStream<Output>>);

/// `LinkBuilder` is the construction interface shared by links. Builder methods may be called in
/// any order; `build_link` panics when a required piece is missing.
pub trait LinkBuilder<Input, Output> {
    fn new() -> Self;

    fn ingressors(self, in_streams: Vec<PacketStream<Input>>) -> Self;

    fn ingressor(self, in_stream: PacketStream<Input>) -> Self;

    fn build_link(self) -> Link<Output>;
}
