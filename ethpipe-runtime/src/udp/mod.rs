//! UDP encapsulation.
//!
//! Receive: `UdpRx` strips the UDP header and, when asked to, checks the checksum as the payload
//! streams through. Transmit: `UdpChecksumGen` buffers a payload to learn its length and checksum,
//! then `UdpTx` writes the header in front of it.
use ethpipe_packets::{EthernetHeader, Ipv4Header, UdpHeader};

mod rx;
pub use self::rx::*;

mod checksum_gen;
pub use self::checksum_gen::*;

mod tx;
pub use self::tx::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdpRecord {
    pub eth: EthernetHeader,
    pub ip: Ipv4Header,
    pub udp: UdpHeader,
}
