//! Configuration is handed to components when they are built and does not change afterwards. The
//! only runtime control is clearing the ARP cache, which the stacks expose as `clear_arp_cache`.

use crate::error::ConfigError;
use ethpipe_packets::{Ipv4Header, MacAddr, UdpHeader};
use std::net::Ipv4Addr;

/// Where a datagram for a given destination has to be sent on the local link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextHop {
    /// Limited or subnet broadcast: sent to `ff:ff:ff:ff:ff:ff` without resolution.
    Broadcast,
    /// The link address of this protocol address has to be resolved. It is either the
    /// destination itself or the gateway.
    Resolve(Ipv4Addr),
    /// Off-subnet destination with no gateway configured.
    Unreachable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub local_mac: MacAddr,
    pub local_ip: Ipv4Addr,
    /// `0.0.0.0` when there is no gateway.
    pub gateway_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
}

impl InterfaceConfig {
    /// A /24 interface with no gateway.
    pub fn new(local_mac: MacAddr, local_ip: Ipv4Addr) -> Self {
        InterfaceConfig {
            local_mac,
            local_ip,
            gateway_ip: Ipv4Addr::UNSPECIFIED,
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
        }
    }

    pub fn gateway(self, gateway_ip: Ipv4Addr) -> Self {
        InterfaceConfig { gateway_ip, ..self }
    }

    pub fn subnet_mask(self, subnet_mask: Ipv4Addr) -> Self {
        InterfaceConfig {
            subnet_mask,
            ..self
        }
    }

    /// True when `ip` is in the local subnet.
    pub fn is_local(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.subnet_mask);
        (u32::from(ip) ^ u32::from(self.local_ip)) & mask == 0
    }

    /// True for the limited broadcast address and for any address whose host part is all ones.
    pub fn is_broadcast(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) | u32::from(self.subnet_mask) == u32::max_value()
    }

    pub fn next_hop(&self, destination: Ipv4Addr) -> NextHop {
        if self.is_broadcast(destination) {
            NextHop::Broadcast
        } else if self.is_local(destination) {
            NextHop::Resolve(destination)
        } else if self.gateway_ip.is_unspecified() {
            NextHop::Unreachable
        } else {
            NextHop::Resolve(self.gateway_ip)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_mac.is_multicast() || self.local_mac == MacAddr::ZERO {
            return Err(ConfigError::LocalMac(self.local_mac));
        }
        if self.local_ip.is_unspecified() || self.is_broadcast(self.local_ip) {
            return Err(ConfigError::LocalIp(self.local_ip));
        }
        let host_bits = !u32::from(self.subnet_mask);
        if host_bits & host_bits.wrapping_add(1) != 0 {
            return Err(ConfigError::SubnetMask(self.subnet_mask));
        }
        if !self.gateway_ip.is_unspecified() && !self.is_local(self.gateway_ip) {
            return Err(ConfigError::GatewayOffSubnet(self.gateway_ip));
        }
        Ok(())
    }
}

/// ARP cache and resolver parameters. Times are counted in steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpConfig {
    pub cache_capacity: usize,
    /// Descriptors that may wait on one unresolved address.
    pub max_pending_per_entry: usize,
    /// Requests sent for one address before giving up, the first one included.
    pub retry_count: u32,
    /// Steps between two requests for the same address.
    pub retry_interval: u64,
    /// Steps to wait for a reply after the last request.
    pub request_timeout: u64,
}

impl Default for ArpConfig {
    fn default() -> Self {
        ArpConfig {
            cache_capacity: 16,
            max_pending_per_entry: 8,
            retry_count: 4,
            retry_interval: 150,
            request_timeout: 150,
        }
    }
}

impl ArpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero("cache_capacity"));
        }
        if self.max_pending_per_entry == 0 {
            return Err(ConfigError::Zero("max_pending_per_entry"));
        }
        if self.retry_count == 0 {
            return Err(ConfigError::Zero("retry_count"));
        }
        if self.retry_interval == 0 {
            return Err(ConfigError::Zero("retry_interval"));
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Zero("request_timeout"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackConfig {
    pub interface: InterfaceConfig,
    pub arp: ArpConfig,
    /// Payload buffers for datagrams waiting on address resolution.
    pub payload_slots: usize,
    /// Largest UDP payload a buffered stage accepts. Longer payloads are dropped. Datagram
    /// buffers below UDP are sized with `max_ip_payload_len`.
    pub max_payload_len: usize,
    /// Check received UDP checksums and flag mismatches.
    pub verify_udp_checksum: bool,
    /// Compute UDP checksums on transmit.
    pub udp_checksum_offload: bool,
}

impl StackConfig {
    /// Largest UDP payload an IPv4 datagram can carry.
    pub const MAX_UDP_PAYLOAD: usize = 65535 - Ipv4Header::LEN - UdpHeader::LEN;

    pub fn new(interface: InterfaceConfig) -> Self {
        StackConfig {
            interface,
            arp: ArpConfig::default(),
            payload_slots: 8,
            max_payload_len: 1472,
            verify_udp_checksum: true,
            udp_checksum_offload: true,
        }
    }

    pub fn arp(self, arp: ArpConfig) -> Self {
        StackConfig { arp, ..self }
    }

    /// Largest IPv4 payload the transmit path buffers: a UDP header plus `max_payload_len`.
    pub fn max_ip_payload_len(&self) -> usize {
        UdpHeader::LEN + self.max_payload_len
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.interface.validate()?;
        self.arp.validate()?;
        if self.payload_slots == 0 {
            return Err(ConfigError::Zero("payload_slots"));
        }
        if self.max_payload_len == 0 {
            return Err(ConfigError::Zero("max_payload_len"));
        }
        if self.max_payload_len > Self::MAX_UDP_PAYLOAD {
            return Err(ConfigError::PayloadTooLong(self.max_payload_len));
        }
        Ok(())
    }
}
