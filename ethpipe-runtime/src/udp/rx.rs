use crate::ip::IpRecord;
use crate::stream::{Cut, LayerPort, PayloadCut};
use crate::udp::UdpRecord;
use ethpipe_packets::{Checksum, UdpHeader};
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdpRxCounters {
    pub frames: u64,
    pub header_early_termination: u64,
    pub payload_early_termination: u64,
    /// Length field below eight, or a datagram with no payload.
    pub invalid_header: u64,
    /// Datagrams forwarded with their last beat flagged because the checksum did not match.
    pub invalid_checksum: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UdpRxState {
    Idle,
    Header,
    Payload,
    Drop,
}

/// Strips UDP headers. The payload is cut at the header's length field.
///
/// With verification on, the checksum is accumulated beat by beat and checked when the payload's
/// last beat goes out; a mismatch flags that beat rather than holding the datagram back. A zero
/// checksum field is not checked.
#[derive(Debug)]
pub struct UdpRx {
    verify_checksum: bool,
    state: UdpRxState,
    ip: IpRecord,
    header: [u8; UdpHeader::LEN],
    len: usize,
    checksum: Option<Checksum>,
    cut: PayloadCut,
    counters: UdpRxCounters,
}

impl UdpRx {
    pub fn new(verify_checksum: bool) -> Self {
        UdpRx {
            verify_checksum,
            state: UdpRxState::Idle,
            ip: IpRecord::default(),
            header: [0; UdpHeader::LEN],
            len: 0,
            checksum: None,
            cut: PayloadCut::default(),
            counters: UdpRxCounters::default(),
        }
    }

    pub fn counters(&self) -> UdpRxCounters {
        self.counters
    }

    pub fn busy(&self) -> bool {
        self.state != UdpRxState::Idle
    }

    pub fn step(&mut self, input: &mut LayerPort<IpRecord>, output: &mut LayerPort<UdpRecord>) {
        match self.state {
            UdpRxState::Idle => {
                if let Some(ip) = input.header.accept() {
                    self.ip = ip;
                    self.len = 0;
                    self.state = UdpRxState::Header;
                }
            }
            UdpRxState::Header => self.header_step(input, output),
            UdpRxState::Payload => self.payload_step(input, output),
            UdpRxState::Drop => {
                if let Some(beat) = input.payload.accept() {
                    if beat.last {
                        self.state = UdpRxState::Idle;
                    }
                }
            }
        }
    }

    fn header_step(&mut self, input: &mut LayerPort<IpRecord>, output: &mut LayerPort<UdpRecord>) {
        if self.len + 1 == UdpHeader::LEN && !output.header.is_ready() {
            return;
        }
        let beat = match input.payload.accept() {
            Some(beat) => beat,
            None => return,
        };
        self.header[self.len] = beat.data;
        self.len += 1;

        if self.len < UdpHeader::LEN {
            if beat.last {
                warn!(len = self.len, "frame ended inside the UDP header");
                self.counters.header_early_termination += 1;
                self.state = UdpRxState::Idle;
            }
            return;
        }

        let next = if beat.last { UdpRxState::Idle } else { UdpRxState::Drop };
        let udp = match UdpHeader::parse(&self.header) {
            Ok(udp) if udp.payload_len() > 0 => udp,
            Ok(_) => {
                warn!("UDP datagram without payload");
                self.counters.invalid_header += 1;
                self.state = next;
                return;
            }
            Err(err) => {
                warn!(error = %err, "invalid UDP header");
                self.counters.invalid_header += 1;
                self.state = next;
                return;
            }
        };
        if beat.last {
            warn!(dest_port = udp.dest_port, "frame ended after the UDP header");
            self.counters.payload_early_termination += 1;
            self.state = UdpRxState::Idle;
            return;
        }

        self.checksum = if self.verify_checksum && udp.checksum != 0 {
            let mut running = udp.checksum_seed(self.ip.ip.source, self.ip.ip.destination);
            running.add_word(udp.checksum);
            Some(running)
        } else {
            None
        };
        trace!(
            src_port = udp.src_port,
            dest_port = udp.dest_port,
            length = udp.length,
            "UDP header"
        );
        output.header.fill(UdpRecord {
            eth: self.ip.eth,
            ip: self.ip.ip,
            udp,
        });
        self.cut.start(Some(udp.payload_len()));
        self.state = UdpRxState::Payload;
    }

    fn payload_step(&mut self, input: &mut LayerPort<IpRecord>, output: &mut LayerPort<UdpRecord>) {
        let checksum = &mut self.checksum;
        let mut mismatch = false;
        let cut = self
            .cut
            .step(&mut input.payload, &mut output.payload, |beat, cut| {
                if let Some(running) = checksum.as_mut() {
                    running.add_byte(beat.data);
                    if (cut == Cut::Ended || cut == Cut::Excess) && !running.is_valid() {
                        beat.error = true;
                        mismatch = true;
                    }
                }
            });

        if mismatch {
            warn!(src = %self.ip.ip.source, "UDP checksum mismatch");
            self.counters.invalid_checksum += 1;
        }
        match cut {
            Cut::Ended => {
                self.counters.frames += 1;
                self.state = UdpRxState::Idle;
            }
            Cut::Excess => self.counters.frames += 1,
            Cut::Truncated => {
                warn!("UDP payload shorter than its length field");
                self.counters.payload_early_termination += 1;
                self.state = UdpRxState::Idle;
            }
            Cut::Drained { last: true } => self.state = UdpRxState::Idle,
            _ => {}
        }
    }
}
