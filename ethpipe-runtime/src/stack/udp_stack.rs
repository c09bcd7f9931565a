use crate::arbiter::ArbiterPolicy;
use crate::classifier::IpProtocolClassifier;
use crate::config::StackConfig;
use crate::error::ConfigError;
use crate::ip::IpRecord;
use crate::stack::{IpStack, IpStackStatus};
use crate::stream::{Beat, Channel, LayerPort};
use crate::switch::{PortArbMux, PortDemux, SwitchCounters};
use crate::udp::{
    UdpChecksumGen, UdpChecksumGenCounters, UdpRecord, UdpRx, UdpRxCounters, UdpTx, UdpTxCounters,
};
use ethpipe_packets::IpProtocol;

const UDP_PORT: usize = 0;
const RAW_PORT: usize = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdpStackStatus {
    pub ip: IpStackStatus,
    pub udp_rx_busy: bool,
    pub udp_tx_busy: bool,
    pub ip_demux: SwitchCounters,
    pub udp_rx: UdpRxCounters,
    pub udp_tx: UdpTxCounters,
    /// `None` when checksum offload is off.
    pub checksum_gen: Option<UdpChecksumGenCounters>,
}

impl UdpStackStatus {
    pub fn busy(&self) -> bool {
        self.ip.busy() || self.udp_rx_busy || self.udp_tx_busy
    }
}

/// An `IpStack` with UDP on top.
///
/// Received datagrams are routed by protocol: UDP to `UdpRx` and out of `udp_rx`, everything else
/// out of `raw_ip_rx` untouched. On transmit, `udp_tx` and `raw_ip_tx` share the IP layer through a
/// round-robin mux. With checksum offload on, UDP records only need their ports and addresses; the
/// length and checksum are computed here.
pub struct UdpStack {
    ip: IpStack,
    ip_demux: PortDemux<IpProtocolClassifier>,
    udp_rx: UdpRx,
    checksum_gen: Option<UdpChecksumGen>,
    udp_tx: UdpTx,
    ip_tx_mux: PortArbMux,

    rx_split: Vec<LayerPort<IpRecord>>,
    udp_rx_port: LayerPort<UdpRecord>,
    udp_tx_port: LayerPort<UdpRecord>,
    completed: LayerPort<UdpRecord>,
    tx_merge: Vec<LayerPort<IpRecord>>,
}

impl UdpStack {
    pub fn new(config: StackConfig) -> Result<Self, ConfigError> {
        let ip = IpStack::new(config)?;
        let checksum_gen = if config.udp_checksum_offload {
            Some(UdpChecksumGen::new(
                config.interface.local_ip,
                config.max_payload_len,
            ))
        } else {
            None
        };
        let classifier =
            IpProtocolClassifier::new(vec![(IpProtocol::UDP, UDP_PORT)], Some(RAW_PORT));

        Ok(UdpStack {
            ip,
            ip_demux: PortDemux::new(classifier, 2),
            udp_rx: UdpRx::new(config.verify_udp_checksum),
            checksum_gen,
            udp_tx: UdpTx::new(),
            ip_tx_mux: PortArbMux::new(2, ArbiterPolicy::RoundRobin),

            rx_split: vec![LayerPort::new(), LayerPort::new()],
            udp_rx_port: LayerPort::new(),
            udp_tx_port: LayerPort::new(),
            completed: LayerPort::new(),
            tx_merge: vec![LayerPort::new(), LayerPort::new()],
        })
    }

    pub fn config(&self) -> &StackConfig {
        self.ip.config()
    }

    pub fn udp_rx(&mut self) -> &mut LayerPort<UdpRecord> {
        &mut self.udp_rx_port
    }

    pub fn udp_tx(&mut self) -> &mut LayerPort<UdpRecord> {
        &mut self.udp_tx_port
    }

    /// Received datagrams of every protocol but UDP.
    pub fn raw_ip_rx(&mut self) -> &mut LayerPort<IpRecord> {
        &mut self.rx_split[RAW_PORT]
    }

    pub fn raw_ip_tx(&mut self) -> &mut LayerPort<IpRecord> {
        &mut self.tx_merge[RAW_PORT]
    }

    pub fn clear_arp_cache(&mut self) {
        self.ip.clear_arp_cache();
    }

    pub fn status(&self) -> UdpStackStatus {
        let gen_busy = self.checksum_gen.as_ref().map_or(false, |generator| generator.busy());
        UdpStackStatus {
            ip: self.ip.status(),
            udp_rx_busy: self.udp_rx.busy() || self.ip_demux.busy(),
            udp_tx_busy: gen_busy || self.udp_tx.busy() || self.ip_tx_mux.active().is_some(),
            ip_demux: self.ip_demux.counters(),
            udp_rx: self.udp_rx.counters(),
            udp_tx: self.udp_tx.counters(),
            checksum_gen: self.checksum_gen.as_ref().map(|generator| generator.counters()),
        }
    }

    pub fn step(&mut self, link_rx: &mut Channel<Beat>, link_tx: &mut Channel<Beat>) {
        self.udp_rx.step(&mut self.rx_split[UDP_PORT], &mut self.udp_rx_port);
        self.ip_demux.step(self.ip.ip_rx(), &mut self.rx_split);

        self.ip.step(link_rx, link_tx);

        self.ip_tx_mux.step(&mut self.tx_merge, self.ip.ip_tx());
        match self.checksum_gen.as_mut() {
            Some(checksum_gen) => {
                self.udp_tx.step(&mut self.completed, &mut self.tx_merge[UDP_PORT]);
                checksum_gen.step(&mut self.udp_tx_port, &mut self.completed);
            }
            None => self.udp_tx.step(&mut self.udp_tx_port, &mut self.tx_merge[UDP_PORT]),
        }
    }
}
