use crate::arp::ArpUpdate;
use crate::config::InterfaceConfig;
use crate::stream::{Channel, Frame, LayerPort, PortSource};
use ethpipe_packets::{ArpOp, ArpPacket, EthernetHeader, MacAddr, ARP_ETHER_TYPE};
use std::net::Ipv4Addr;
use tracing::{debug, trace, warn};

/// Shortest Ethernet payload; ARP packets are zero padded up to it.
const MIN_PAYLOAD: usize = 46;
const TX_QUEUE: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArpEngineCounters {
    pub requests_received: u64,
    pub replies_received: u64,
    pub requests_sent: u64,
    pub replies_sent: u64,
    /// Frames that ended early, were flagged bad, or did not parse.
    pub invalid_packets: u64,
    /// Requests for our address that could not be answered because the transmit queue was full.
    pub dropped_replies: u64,
}

/// Speaks ARP on the link for one interface.
///
/// Receive side: takes frames whose ether type is ARP, answers requests for `local_ip` and hands
/// the sender binding of every reply, and of every request addressed to us, to the resolver
/// through `updates`. Transmit side: turns each address accepted from `requests` into a broadcast
/// who-has frame.
#[derive(Debug)]
pub struct ArpEngine {
    interface: InterfaceConfig,
    rx_header: Option<EthernetHeader>,
    rx_bytes: [u8; ArpPacket::LEN],
    rx_len: usize,
    update: Option<ArpUpdate>,
    tx: PortSource<EthernetHeader>,
    counters: ArpEngineCounters,
}

impl ArpEngine {
    pub fn new(interface: InterfaceConfig) -> Self {
        ArpEngine {
            interface,
            rx_header: None,
            rx_bytes: [0; ArpPacket::LEN],
            rx_len: 0,
            update: None,
            tx: PortSource::new(),
            counters: ArpEngineCounters::default(),
        }
    }

    pub fn counters(&self) -> ArpEngineCounters {
        self.counters
    }

    pub fn busy(&self) -> bool {
        self.rx_header.is_some() || self.update.is_some() || !self.tx.is_idle()
    }

    pub fn step(
        &mut self,
        rx: &mut LayerPort<EthernetHeader>,
        tx: &mut LayerPort<EthernetHeader>,
        requests: &mut Channel<Ipv4Addr>,
        updates: &mut Channel<ArpUpdate>,
    ) {
        if let Some(update) = self.update.take() {
            if let Err(update) = updates.offer(update) {
                self.update = Some(update);
            }
        }

        if self.tx.pending() < TX_QUEUE {
            if let Some(target_ip) = requests.accept() {
                trace!(target = %target_ip, "sending ARP request");
                let packet = ArpPacket::request(
                    self.interface.local_mac,
                    self.interface.local_ip,
                    target_ip,
                );
                self.send(MacAddr::BROADCAST, &packet);
                self.counters.requests_sent += 1;
            }
        }

        // A binding waiting for the resolver holds up the receive side.
        if self.update.is_none() {
            self.receive(rx);
        }

        self.tx.step(tx);
    }

    fn receive(&mut self, rx: &mut LayerPort<EthernetHeader>) {
        if self.rx_header.is_none() {
            self.rx_header = rx.header.accept();
            self.rx_len = 0;
            return;
        }

        let beat = match rx.payload.accept() {
            Some(beat) => beat,
            None => return,
        };
        if self.rx_len < ArpPacket::LEN {
            self.rx_bytes[self.rx_len] = beat.data;
            self.rx_len += 1;
        }
        if !beat.last {
            return;
        }

        self.rx_header = None;
        if beat.error || self.rx_len < ArpPacket::LEN {
            warn!(len = self.rx_len, error = beat.error, "dropping malformed ARP frame");
            self.counters.invalid_packets += 1;
            return;
        }
        match ArpPacket::parse(&self.rx_bytes) {
            Ok(packet) => self.handle(packet),
            Err(err) => {
                warn!(error = %err, "dropping ARP frame");
                self.counters.invalid_packets += 1;
            }
        }
    }

    fn handle(&mut self, packet: ArpPacket) {
        let binding = ArpUpdate {
            ip: packet.sender_ip,
            mac: packet.sender_mac,
        };
        match packet.op {
            ArpOp::Request => {
                self.counters.requests_received += 1;
                if packet.target_ip != self.interface.local_ip {
                    return;
                }
                debug!(ip = %packet.sender_ip, mac = %packet.sender_mac, "answering ARP request");
                self.update = Some(binding);
                if self.tx.pending() < TX_QUEUE {
                    let reply = ArpPacket::reply_to(
                        &packet,
                        self.interface.local_mac,
                        self.interface.local_ip,
                    );
                    self.send(packet.sender_mac, &reply);
                    self.counters.replies_sent += 1;
                } else {
                    warn!(ip = %packet.sender_ip, "ARP transmit queue full, reply dropped");
                    self.counters.dropped_replies += 1;
                }
            }
            ArpOp::Reply => {
                debug!(ip = %packet.sender_ip, mac = %packet.sender_mac, "ARP reply");
                self.counters.replies_received += 1;
                self.update = Some(binding);
            }
        }
    }

    fn send(&mut self, dest_mac: MacAddr, packet: &ArpPacket) {
        let mut payload = packet.to_bytes().to_vec();
        payload.resize(MIN_PAYLOAD, 0);
        let header = EthernetHeader::new(dest_mac, self.interface.local_mac, ARP_ETHER_TYPE);
        self.tx.push(header, Frame::new(payload));
    }
}
