//! Errors reported when validating a stack configuration.

use ethpipe_packets::MacAddr;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A capacity, count or interval that has to be positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("subnet mask {0} is not contiguous")]
    SubnetMask(Ipv4Addr),

    /// The gateway has to be reachable without a gateway.
    #[error("gateway {0} is outside the local subnet")]
    GatewayOffSubnet(Ipv4Addr),

    #[error("local MAC address {0} is not a unicast address")]
    LocalMac(MacAddr),

    #[error("local IP address {0} cannot be used as a source address")]
    LocalIp(Ipv4Addr),

    /// UDP payloads are bounded by the 16 bit IPv4 total length.
    #[error("maximum payload length {0} does not fit in a UDP datagram")]
    PayloadTooLong(usize),
}
