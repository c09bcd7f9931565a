use crate::arbiter::ArbiterPolicy;
use crate::arp::{ArpEngine, ArpEngineCounters, ArpStats, ArpUpdate};
use crate::classifier::EtherTypeClassifier;
use crate::config::StackConfig;
use crate::error::ConfigError;
use crate::eth::{EthRx, EthRxCounters, EthTx};
use crate::ip::{
    IpRecord, IpRx, IpRxCounters, IpTx, IpTxCounters, IpTxResolver, IpTxResolverCounters,
};
use crate::stream::{Beat, Channel, LayerPort};
use crate::switch::{PortArbMux, PortDemux, SwitchCounters};
use ethpipe_packets::{EthernetHeader, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};
use std::net::Ipv4Addr;
use tracing::info;

const ARP_PORT: usize = 0;
const IP_PORT: usize = 1;

/// Busy flags and counters of every stage in an `IpStack`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IpStackStatus {
    pub eth_rx_busy: bool,
    pub eth_tx_busy: bool,
    pub arp_busy: bool,
    pub ip_rx_busy: bool,
    pub ip_tx_busy: bool,
    pub eth_rx: EthRxCounters,
    /// Frames routed by ether type; unknown ether types show up as `dropped`.
    pub eth_demux: SwitchCounters,
    pub eth_tx_frames: u64,
    pub arp: ArpEngineCounters,
    pub arp_stats: ArpStats,
    pub ip_rx: IpRxCounters,
    pub ip_tx: IpTxCounters,
    pub resolver: IpTxResolverCounters,
}

impl IpStackStatus {
    pub fn busy(&self) -> bool {
        self.eth_rx_busy || self.eth_tx_busy || self.arp_busy || self.ip_rx_busy || self.ip_tx_busy
    }
}

/// Ethernet, ARP and IPv4 for one interface.
///
/// Receive: link frames are split by `EthRx`, routed by ether type to the ARP engine or to `IpRx`,
/// and validated datagrams come out of `ip_rx`. Transmit: datagrams written to `ip_tx` wait in
/// `IpTxResolver` for their next hop, get their header from `IpTx`, and share the link with the ARP
/// engine's frames through a round-robin mux ahead of `EthTx`.
pub struct IpStack {
    config: StackConfig,
    eth_rx: EthRx,
    eth_demux: PortDemux<EtherTypeClassifier>,
    arp: ArpEngine,
    ip_rx: IpRx,
    resolver: IpTxResolver,
    ip_tx: IpTx,
    tx_mux: PortArbMux,
    eth_tx: EthTx,

    rx_frames: LayerPort<EthernetHeader>,
    rx_split: Vec<LayerPort<EthernetHeader>>,
    ip_rx_port: LayerPort<IpRecord>,
    ip_tx_port: LayerPort<IpRecord>,
    resolved: LayerPort<IpRecord>,
    tx_merge: Vec<LayerPort<EthernetHeader>>,
    tx_frames: LayerPort<EthernetHeader>,
    arp_requests: Channel<Ipv4Addr>,
    arp_updates: Channel<ArpUpdate>,
}

impl IpStack {
    pub fn new(config: StackConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(mac = %config.interface.local_mac, ip = %config.interface.local_ip, "IP stack up");

        let classifier =
            EtherTypeClassifier::new(vec![(ARP_ETHER_TYPE, ARP_PORT), (IPV4_ETHER_TYPE, IP_PORT)]);
        Ok(IpStack {
            config,
            eth_rx: EthRx::new(),
            eth_demux: PortDemux::new(classifier, 2),
            arp: ArpEngine::new(config.interface),
            ip_rx: IpRx::new(),
            resolver: IpTxResolver::new(config),
            ip_tx: IpTx::new(),
            tx_mux: PortArbMux::new(2, ArbiterPolicy::RoundRobin),
            eth_tx: EthTx::new(),

            rx_frames: LayerPort::new(),
            rx_split: vec![LayerPort::new(), LayerPort::new()],
            ip_rx_port: LayerPort::new(),
            ip_tx_port: LayerPort::new(),
            resolved: LayerPort::new(),
            tx_merge: vec![LayerPort::new(), LayerPort::new()],
            tx_frames: LayerPort::new(),
            arp_requests: Channel::new(),
            arp_updates: Channel::new(),
        })
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Validated datagrams, header record first, then the payload.
    pub fn ip_rx(&mut self) -> &mut LayerPort<IpRecord> {
        &mut self.ip_rx_port
    }

    /// Datagrams to send. The Ethernet fields are filled in here; a zero total length and an
    /// unspecified source address are too.
    pub fn ip_tx(&mut self) -> &mut LayerPort<IpRecord> {
        &mut self.ip_tx_port
    }

    /// Empties the ARP cache. Datagrams waiting on an address are dropped.
    pub fn clear_arp_cache(&mut self) {
        info!("clearing ARP cache");
        self.resolver.clear_arp_cache();
    }

    pub fn status(&self) -> IpStackStatus {
        IpStackStatus {
            eth_rx_busy: self.eth_rx.busy() || self.eth_demux.busy(),
            eth_tx_busy: self.eth_tx.busy() || self.tx_mux.active().is_some(),
            arp_busy: self.arp.busy(),
            ip_rx_busy: self.ip_rx.busy(),
            ip_tx_busy: self.resolver.busy() || self.ip_tx.busy(),
            eth_rx: self.eth_rx.counters(),
            eth_demux: self.eth_demux.counters(),
            eth_tx_frames: self.eth_tx.frames(),
            arp: self.arp.counters(),
            arp_stats: self.resolver.arp_stats(),
            ip_rx: self.ip_rx.counters(),
            ip_tx: self.ip_tx.counters(),
            resolver: self.resolver.counters(),
        }
    }

    pub fn step(&mut self, link_rx: &mut Channel<Beat>, link_tx: &mut Channel<Beat>) {
        self.eth_tx.step(&mut self.tx_frames, link_tx);
        self.tx_mux.step(&mut self.tx_merge, &mut self.tx_frames);
        self.ip_tx.step(&mut self.resolved, &mut self.tx_merge[IP_PORT]);
        self.resolver.step(
            &mut self.ip_tx_port,
            &mut self.resolved,
            &mut self.arp_requests,
            &mut self.arp_updates,
        );
        self.arp.step(
            &mut self.rx_split[ARP_PORT],
            &mut self.tx_merge[ARP_PORT],
            &mut self.arp_requests,
            &mut self.arp_updates,
        );

        self.ip_rx.step(&mut self.rx_split[IP_PORT], &mut self.ip_rx_port);
        self.eth_demux.step(&mut self.rx_frames, &mut self.rx_split);
        self.eth_rx.step(link_rx, &mut self.rx_frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArpConfig, InterfaceConfig};
    use crate::stream::{Frame, FrameSource, PortSink, PortSource};
    use ethpipe_packets::{IpProtocol, MacAddr};

    fn stack(host: u8) -> IpStack {
        // A request and its reply take a few hundred steps on a byte-wide link.
        let arp = ArpConfig {
            retry_interval: 1000,
            request_timeout: 1000,
            ..ArpConfig::default()
        };
        let interface = InterfaceConfig::new(
            MacAddr::new([2, 0, 0, 0, 0, host]),
            Ipv4Addr::new(10, 0, 0, host),
        );
        IpStack::new(StackConfig::new(interface).arp(arp)).unwrap()
    }

    fn datagram(destination: Ipv4Addr) -> IpRecord {
        let mut record = IpRecord::default();
        record.ip.protocol = IpProtocol::ICMP;
        record.ip.destination = destination;
        record
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = StackConfig::new(InterfaceConfig::new(
            MacAddr::BROADCAST,
            Ipv4Addr::new(10, 0, 0, 1),
        ));
        assert!(IpStack::new(config).is_err());
        config.interface.local_mac = MacAddr::new([2, 0, 0, 0, 0, 1]);
        config.payload_slots = 0;
        assert_eq!(
            IpStack::new(config).err(),
            Some(ConfigError::Zero("payload_slots"))
        );
    }

    #[test]
    fn back_to_back_stacks_resolve_and_deliver() {
        let (mut a, mut b) = (stack(1), stack(2));
        let (mut a_to_b, mut b_to_a) = (Channel::new(), Channel::new());
        let mut source = PortSource::new();
        for n in 1..=3u8 {
            source.push(datagram(Ipv4Addr::new(10, 0, 0, 2)), Frame::new(vec![n; 10]));
        }
        let mut sink = PortSink::new();

        for _ in 0..2000 {
            sink.step(b.ip_rx());
            a.step(&mut b_to_a, &mut a_to_b);
            b.step(&mut a_to_b, &mut b_to_a);
            source.step(a.ip_tx());
        }

        let received = sink.take_received();
        assert_eq!(received.len(), 3);
        for (n, (record, payload)) in received.iter().enumerate() {
            assert_eq!(payload, &Frame::new(vec![n as u8 + 1; 10]));
            assert_eq!(record.ip.source, Ipv4Addr::new(10, 0, 0, 1));
            assert_eq!(record.ip.protocol, IpProtocol::ICMP);
            assert_eq!(record.eth.src_mac, MacAddr::new([2, 0, 0, 0, 0, 1]));
        }

        let status = a.status();
        assert!(!status.busy());
        assert_eq!(status.arp.requests_sent, 1);
        assert_eq!(status.arp.replies_received, 1);
        assert_eq!(status.arp_stats.requests, 1);
        assert_eq!(status.resolver.frames, 3);
        assert_eq!(b.status().arp.replies_sent, 1);
        assert_eq!(b.status().ip_rx.frames, 3);
    }

    #[test]
    fn unknown_ether_types_are_dropped() {
        let mut stack = stack(1);
        let mut frame = EthernetHeader::new(
            MacAddr::BROADCAST,
            MacAddr::new([2, 0, 0, 0, 0, 9]),
            0x86DD,
        )
        .to_bytes()
        .to_vec();
        frame.extend_from_slice(&[0; 40]);
        let mut source = FrameSource::new();
        source.push(Frame::new(frame));
        let (mut link_rx, mut link_tx) = (Channel::new(), Channel::new());
        for _ in 0..100 {
            stack.step(&mut link_rx, &mut link_tx);
            source.step(&mut link_rx);
        }
        assert_eq!(stack.status().eth_demux.dropped, 1);
        assert!(!link_tx.is_valid());
    }

    #[test]
    fn clearing_the_cache_drops_waiting_datagrams() {
        let mut stack = stack(1);
        let (mut link_rx, mut link_tx) = (Channel::<Beat>::new(), Channel::new());
        let mut source = PortSource::new();
        source.push(datagram(Ipv4Addr::new(10, 0, 0, 7)), Frame::new(vec![1, 2, 3]));
        for _ in 0..20 {
            link_tx.accept();
            stack.step(&mut link_rx, &mut link_tx);
            source.step(stack.ip_tx());
        }
        assert!(stack.status().ip_tx_busy);

        stack.clear_arp_cache();
        assert_eq!(stack.status().resolver.arp_failed, 1);
        assert_eq!(stack.status().arp_stats.failures, 1);
    }
}
