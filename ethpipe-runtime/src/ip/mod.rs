//! IPv4 encapsulation. On receive, `IpRx` validates and strips the IPv4 header of every frame the
//! Ethernet layer classified as IP. On transmit, `IpTxResolver` buffers each outgoing datagram in
//! a `PayloadPool` slot until the ARP resolver has found the next hop's link address, and `IpTx`
//! writes the header in front of the payload.
//!
//! Header records travel between layers as `IpRecord`s, which keep the Ethernet header of the
//! frame alongside the IPv4 header so upper layers can still see who sent it.
use ethpipe_packets::{EthernetHeader, Ipv4Header};

mod rx;
pub use self::rx::*;

mod tx;
pub use self::tx::*;

mod pool;
pub use self::pool::*;

mod resolve;
pub use self::resolve::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IpRecord {
    pub eth: EthernetHeader,
    pub ip: Ipv4Header,
}
