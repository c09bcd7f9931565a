//! Address resolution for the IPv4 transmit path. `ArpResolver` is the cache state machine: it is
//! generic over the descriptor type it queues, so the transmit path can park whatever identifies
//! a buffered datagram while the next hop is being resolved. `ArpEngine` is the wire side: it
//! sends the requests the resolver asks for, answers requests for the local address and feeds
//! learned bindings back as `ArpUpdate`s.
use ethpipe_packets::MacAddr;
use std::net::Ipv4Addr;

mod cache;
pub use self::cache::*;

mod resolver;
pub use self::resolver::*;

mod engine;
pub use self::engine::*;

/// A protocol to link address binding learned from the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpUpdate {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}
