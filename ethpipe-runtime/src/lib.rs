/// Streams are the single-slot channels every component is connected with. A channel holds at most
/// one unit; the producer offers into it and the consumer accepts out of it, and the handshake
/// gives backpressure for free. Payloads move one byte per `Beat`, headers move as whole records
/// on a parallel channel, and `Frame` is the host-side view of a complete payload.
pub mod stream;

/// Arbitration between competing requesters, in priority or round-robin order.
pub mod arbiter;

/// Classifiers pick an output port for a header. The demultiplexers in `switch` use them to route
/// frames by ether type or datagrams by IP protocol.
pub mod classifier;

/// Frame-level switching: merging many streams into one, splitting one stream into many, and the
/// arbitrated mux that combines both decisions per frame.
pub mod switch;

/// Byte FIFOs with optional frame mode. In frame mode a frame only becomes visible once its last
/// byte is stored, so bad or oversize frames can be dropped before anything downstream sees them.
pub mod fifo;

/// Links carry frames across tokio tasks through an asynchronous frame FIFO, for pipelines that
/// are split across execution contexts.
pub mod link;

/// Ethernet framing: splitting the 14 byte header off received frames and putting it back on
/// transmit.
pub mod eth;

/// The ARP cache, the resolver that queues datagrams until their next hop is known, and the engine
/// that answers and sends ARP packets on the wire.
pub mod arp;

/// IPv4 receive and transmit, including next-hop resolution for outgoing datagrams.
pub mod ip;

/// UDP receive and transmit, with optional checksum generation on transmit.
pub mod udp;

/// Complete per-interface pipelines built from the components above.
pub mod stack;

/// Configuration for the stacks and their components.
pub mod config;

/// Error types.
pub mod error;

/// Utility module
mod utils;
