use crate::ip::IpRecord;
use crate::stream::{Cut, LayerPort, PayloadCut, Prefix};
use crate::udp::UdpRecord;
use ethpipe_packets::{IpProtocol, Ipv4Header, UdpHeader};
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdpTxCounters {
    pub frames: u64,
    pub payload_early_termination: u64,
    pub payload_overrun: u64,
    /// Records whose length field leaves no room for a payload.
    pub invalid_header: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UdpTxState {
    Idle,
    Header,
    Payload,
    Drop,
}

/// Writes the eight byte UDP header in front of each payload. The length field is trusted and the
/// payload is cut to match it, the same way `IpTx` treats the IPv4 total length.
pub struct UdpTx {
    state: UdpTxState,
    prefix: Prefix,
    cut: PayloadCut,
    counters: UdpTxCounters,
}

impl UdpTx {
    pub fn new() -> Self {
        UdpTx {
            state: UdpTxState::Idle,
            prefix: Prefix::new(),
            cut: PayloadCut::default(),
            counters: UdpTxCounters::default(),
        }
    }

    pub fn counters(&self) -> UdpTxCounters {
        self.counters
    }

    pub fn busy(&self) -> bool {
        self.state != UdpTxState::Idle
    }

    pub fn step(&mut self, input: &mut LayerPort<UdpRecord>, output: &mut LayerPort<IpRecord>) {
        if self.state == UdpTxState::Idle {
            if !output.header.is_ready() {
                return;
            }
            let record = match input.header.accept() {
                Some(record) => record,
                None => return,
            };
            if usize::from(record.udp.length) <= UdpHeader::LEN {
                warn!(length = record.udp.length, "UDP record without payload");
                self.counters.invalid_header += 1;
                self.state = UdpTxState::Drop;
                return;
            }

            let mut ip = record.ip;
            ip.protocol = IpProtocol::UDP;
            ip.total_length = (Ipv4Header::LEN + usize::from(record.udp.length)) as u16;
            trace!(
                dest_port = record.udp.dest_port,
                length = record.udp.length,
                "UDP datagram out"
            );
            output.header.fill(IpRecord { eth: record.eth, ip });
            self.prefix.start(&record.udp.to_bytes());
            self.cut.start(Some(record.udp.payload_len()));
            self.state = UdpTxState::Header;
        }

        match self.state {
            UdpTxState::Header => {
                if self.prefix.step(&mut output.payload) {
                    self.state = UdpTxState::Payload;
                }
            }
            UdpTxState::Payload => {
                let cut = self.cut.step(&mut input.payload, &mut output.payload, |beat, cut| {
                    if cut == Cut::Excess {
                        beat.error = true;
                    }
                });
                match cut {
                    Cut::Ended => {
                        self.counters.frames += 1;
                        self.state = UdpTxState::Idle;
                    }
                    Cut::Truncated => {
                        warn!("UDP payload shorter than its length field");
                        self.counters.payload_early_termination += 1;
                        self.state = UdpTxState::Idle;
                    }
                    Cut::Excess => {
                        warn!("UDP payload longer than its length field");
                        self.counters.payload_overrun += 1;
                    }
                    Cut::Drained { last: true } => self.state = UdpTxState::Idle,
                    _ => {}
                }
            }
            UdpTxState::Drop => {
                if let Some(beat) = input.payload.accept() {
                    if beat.last {
                        self.state = UdpTxState::Idle;
                    }
                }
            }
            UdpTxState::Idle => {}
        }
    }
}

impl Default for UdpTx {
    fn default() -> Self {
        UdpTx::new()
    }
}
