use crate::ip::IpRecord;
use crate::stream::{Cut, LayerPort, PayloadCut};
use ethpipe_packets::{Checksum, EthernetHeader, Ipv4Header};
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IpRxCounters {
    pub frames: u64,
    pub header_early_termination: u64,
    pub payload_early_termination: u64,
    /// Bad version, header length or total length, or a datagram with no payload.
    pub invalid_header: u64,
    pub invalid_checksum: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IpRxState {
    Idle,
    Header,
    Payload,
    Drop,
}

/// Strips and validates IPv4 headers.
///
/// The header checksum is summed as the header bytes arrive, so it is known as soon as the last
/// header byte is in. Options are accepted and discarded. A header that fails any check is never
/// offered downstream; its frame is consumed and counted. The payload is cut at the header's total
/// length, so link padding after it never reaches the next layer. A payload shorter than the total
/// length arrives with its last beat flagged bad.
#[derive(Debug)]
pub struct IpRx {
    state: IpRxState,
    eth: EthernetHeader,
    header: Vec<u8>,
    header_len: usize,
    checksum: Checksum,
    cut: PayloadCut,
    counters: IpRxCounters,
}

impl IpRx {
    pub fn new() -> Self {
        IpRx {
            state: IpRxState::Idle,
            eth: EthernetHeader::default(),
            header: Vec::with_capacity(Ipv4Header::MAX_LEN),
            header_len: Ipv4Header::LEN,
            checksum: Checksum::new(),
            cut: PayloadCut::default(),
            counters: IpRxCounters::default(),
        }
    }

    pub fn counters(&self) -> IpRxCounters {
        self.counters
    }

    pub fn busy(&self) -> bool {
        self.state != IpRxState::Idle
    }

    pub fn step(
        &mut self,
        input: &mut LayerPort<EthernetHeader>,
        output: &mut LayerPort<IpRecord>,
    ) {
        match self.state {
            IpRxState::Idle => {
                if let Some(eth) = input.header.accept() {
                    self.eth = eth;
                    self.header.clear();
                    self.header_len = Ipv4Header::LEN;
                    self.checksum = Checksum::new();
                    self.state = IpRxState::Header;
                }
            }
            IpRxState::Header => self.header_step(input, output),
            IpRxState::Payload => {
                let cut = self
                    .cut
                    .step(&mut input.payload, &mut output.payload, |_, _| {});
                match cut {
                    Cut::Ended => {
                        self.counters.frames += 1;
                        self.state = IpRxState::Idle;
                    }
                    Cut::Truncated => {
                        warn!("IPv4 payload shorter than total length");
                        self.counters.payload_early_termination += 1;
                        self.state = IpRxState::Idle;
                    }
                    Cut::Excess => self.counters.frames += 1,
                    Cut::Drained { last: true } => self.state = IpRxState::Idle,
                    _ => {}
                }
            }
            IpRxState::Drop => {
                if let Some(beat) = input.payload.accept() {
                    if beat.last {
                        self.state = IpRxState::Idle;
                    }
                }
            }
        }
    }

    fn header_step(
        &mut self,
        input: &mut LayerPort<EthernetHeader>,
        output: &mut LayerPort<IpRecord>,
    ) {
        if self.header.len() + 1 == self.header_len && !output.header.is_ready() {
            return;
        }
        let beat = match input.payload.accept() {
            Some(beat) => beat,
            None => return,
        };
        self.header.push(beat.data);
        self.checksum.add_byte(beat.data);

        if self.header.len() == 1 {
            match Ipv4Header::header_len(beat.data) {
                Ok(len) => self.header_len = len,
                Err(err) => return self.reject(beat.last, err.to_string()),
            }
        }

        if self.header.len() < self.header_len {
            if beat.last {
                warn!(len = self.header.len(), "frame ended inside the IPv4 header");
                self.counters.header_early_termination += 1;
                self.state = IpRxState::Idle;
            }
            return;
        }

        let ip = match Ipv4Header::parse(&self.header) {
            Ok(ip) => ip,
            Err(err) => return self.reject(beat.last, err.to_string()),
        };
        if !self.checksum.is_valid() {
            warn!(src = %ip.source, "IPv4 header checksum mismatch");
            self.counters.invalid_checksum += 1;
            self.state = if beat.last { IpRxState::Idle } else { IpRxState::Drop };
            return;
        }
        if ip.payload_len() == 0 {
            return self.reject(beat.last, "datagram without payload".to_string());
        }
        if beat.last {
            warn!(src = %ip.source, "frame ended after the IPv4 header");
            self.counters.payload_early_termination += 1;
            self.state = IpRxState::Idle;
            return;
        }

        trace!(src = %ip.source, dst = %ip.destination, protocol = ?ip.protocol, "IPv4 header");
        output.header.fill(IpRecord { eth: self.eth, ip });
        self.cut.start(Some(ip.payload_len()));
        self.state = IpRxState::Payload;
    }

    fn reject(&mut self, last: bool, reason: String) {
        warn!(reason = %reason, "invalid IPv4 header");
        self.counters.invalid_header += 1;
        self.state = if last { IpRxState::Idle } else { IpRxState::Drop };
    }
}

impl Default for IpRx {
    fn default() -> Self {
        IpRx::new()
    }
}
